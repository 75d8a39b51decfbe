use crate::errors::CollectorError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const DEFAULT_SYS_PATH: &str = "/sys";

const AMDGPU_DRIVER: &str = "amdgpu";

/// Source of DRM card records. `SysFs` reads them from disk; tests swap in
/// in-memory records.
#[async_trait]
pub trait DrmSource: Send + Sync {
    /// All `card<N>` entries with their connector ports.
    async fn cards(&self) -> Result<Vec<DrmCard>, CollectorError>;

    /// Extended stats, one record per card. Cards not bound to amdgpu carry
    /// only their name; every other field stays at its default.
    async fn amdgpu_stats(&self) -> Result<Vec<AmdGpuStats>, CollectorError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrmCard {
    pub name: String,
    pub driver: String,
    pub enabled: bool,
    pub ports: Vec<DrmPort>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrmPort {
    /// Full connector name, e.g. `card1-DP-1`.
    pub name: String,
    pub card: String,
    pub status: PortStatus,
    pub enabled: PortEnabled,
    pub dpms: Dpms,
}

impl DrmPort {
    /// Connector name without the owning card's `"<card>-"` prefix.
    pub fn short_name(&self) -> &str {
        self.name
            .strip_prefix(self.card.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .unwrap_or(&self.name)
    }
}

/// Contents of `/sys/class/drm/card<N>/device` for an amdgpu card.
/// Not every card exposes every attribute; missing ones read as zero/empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmdGpuStats {
    pub name: String,
    pub gpu_busy_percent: u64,
    pub memory_gtt_size: u64,
    pub memory_gtt_used: u64,
    pub memory_visible_vram_size: u64,
    pub memory_visible_vram_used: u64,
    pub memory_vram_size: u64,
    pub memory_vram_used: u64,
    pub memory_vram_vendor: String,
    pub power_dpm_force_performance_level: String,
    pub unique_id: String,
}

// The three connector attributes below are free-form strings in sysfs.
// Exactly one token counts as "true"; anything else, including an empty or
// missing file, is Unknown and reported as 0.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    Connected,
    Disconnected,
    Unknown,
}

impl PortStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "connected" => Self::Connected,
            "disconnected" => Self::Disconnected,
            _ => Self::Unknown,
        }
    }

    pub fn as_gauge(self) -> f64 {
        bool_gauge(self == Self::Connected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEnabled {
    Enabled,
    Disabled,
    Unknown,
}

impl PortEnabled {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "enabled" => Self::Enabled,
            "disabled" => Self::Disabled,
            _ => Self::Unknown,
        }
    }

    pub fn as_gauge(self) -> f64 {
        bool_gauge(self == Self::Enabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dpms {
    On,
    Off,
    Unknown,
}

impl Dpms {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "On" => Self::On,
            "Off" => Self::Off,
            _ => Self::Unknown,
        }
    }

    pub fn as_gauge(self) -> f64 {
        bool_gauge(self == Self::On)
    }
}

pub(crate) fn bool_gauge(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Handle on a sysfs mount (or a fixture tree shaped like one).
#[derive(Debug, Clone)]
pub struct SysFs {
    root: PathBuf,
}

impl SysFs {
    /// Open `root`, checking that it exists and is a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, CollectorError> {
        let root = root.as_ref();
        let meta = std::fs::metadata(root).map_err(|e| CollectorError::SysfsOpen {
            path: root.display().to_string(),
            source: e,
        })?;
        if !meta.is_dir() {
            return Err(CollectorError::NotADirectory {
                path: root.display().to_string(),
            });
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn class_drm(&self) -> PathBuf {
        self.root.join("class").join("drm")
    }

    /// Card directories under class/drm, ordered by card index.
    async fn card_dirs(&self) -> Result<Vec<(String, PathBuf)>, CollectorError> {
        let dir = self.class_drm();
        let mut entries = fs::read_dir(&dir).await.map_err(|e| read_error(&dir, e))?;

        let mut cards = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| read_error(&dir, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(index) = card_index(&name) {
                cards.push((index, name, entry.path()));
            }
        }
        cards.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        Ok(cards.into_iter().map(|(_, name, path)| (name, path)).collect())
    }

    async fn read_card(&self, name: String, path: &Path) -> Result<DrmCard, CollectorError> {
        let device = path.join("device");
        let driver = match read_driver_link(&device.join("driver")).await? {
            Some(driver) => driver,
            None => read_optional(&device.join("uevent"))
                .await?
                .as_deref()
                .and_then(uevent_driver)
                .unwrap_or_default(),
        };
        let enabled = read_u64(&device.join("enable"), "enable").await? > 0;
        let ports = self.read_ports(&name, path).await?;

        Ok(DrmCard {
            name,
            driver,
            enabled,
            ports,
        })
    }

    async fn read_ports(&self, card: &str, path: &Path) -> Result<Vec<DrmPort>, CollectorError> {
        let prefix = format!("{card}-");
        let mut entries = fs::read_dir(path).await.map_err(|e| read_error(path, e))?;

        let mut ports = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| read_error(path, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) {
                continue;
            }
            let port_dir = entry.path();
            let meta = fs::metadata(&port_dir)
                .await
                .map_err(|e| read_error(&port_dir, e))?;
            if !meta.is_dir() {
                continue;
            }

            let status = read_attribute(&port_dir.join("status")).await.unwrap_or_default();
            let enabled = read_attribute(&port_dir.join("enabled")).await.unwrap_or_default();
            let dpms = read_attribute(&port_dir.join("dpms")).await.unwrap_or_default();

            ports.push(DrmPort {
                name,
                card: card.to_string(),
                status: PortStatus::parse(&status),
                enabled: PortEnabled::parse(&enabled),
                dpms: Dpms::parse(&dpms),
            });
        }
        ports.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ports)
    }

    async fn read_amdgpu(
        &self,
        name: String,
        path: &Path,
    ) -> Result<AmdGpuStats, CollectorError> {
        let device = path.join("device");
        let is_amdgpu = read_optional(&device.join("uevent"))
            .await?
            .as_deref()
            .and_then(uevent_driver)
            .is_some_and(|driver| driver == AMDGPU_DRIVER);
        if !is_amdgpu {
            return Ok(AmdGpuStats {
                name,
                ..Default::default()
            });
        }

        let num = |file: &'static str| {
            let path = device.join(file);
            async move { parse_u64(&path, file, read_attribute(&path).await) }
        };
        let text = |file: &'static str| {
            let path = device.join(file);
            async move { read_attribute(&path).await.unwrap_or_default() }
        };

        Ok(AmdGpuStats {
            name,
            gpu_busy_percent: num("gpu_busy_percent").await?,
            memory_gtt_size: num("mem_info_gtt_total").await?,
            memory_gtt_used: num("mem_info_gtt_used").await?,
            memory_visible_vram_size: num("mem_info_vis_vram_total").await?,
            memory_visible_vram_used: num("mem_info_vis_vram_used").await?,
            memory_vram_size: num("mem_info_vram_total").await?,
            memory_vram_used: num("mem_info_vram_used").await?,
            memory_vram_vendor: text("mem_info_vram_vendor").await,
            power_dpm_force_performance_level: text("power_dpm_force_performance_level").await,
            unique_id: text("unique_id").await,
        })
    }
}

#[async_trait]
impl DrmSource for SysFs {
    async fn cards(&self) -> Result<Vec<DrmCard>, CollectorError> {
        let mut cards = Vec::new();
        for (name, path) in self.card_dirs().await? {
            cards.push(self.read_card(name, &path).await?);
        }
        Ok(cards)
    }

    async fn amdgpu_stats(&self) -> Result<Vec<AmdGpuStats>, CollectorError> {
        let mut stats = Vec::new();
        for (name, path) in self.card_dirs().await? {
            stats.push(self.read_amdgpu(name, &path).await?);
        }
        Ok(stats)
    }
}

/// `card0` -> Some(0); `card1-DP-1`, `renderD128`, `version` -> None.
fn card_index(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("card")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn uevent_driver(uevent: &str) -> Option<String> {
    uevent
        .lines()
        .find_map(|line| line.trim().strip_prefix("DRIVER="))
        .map(str::to_string)
}

fn read_error(path: &Path, source: std::io::Error) -> CollectorError {
    CollectorError::ReadError {
        path: path.display().to_string(),
        source,
    }
}

/// Read and trim an attribute file; `None` if it does not exist.
async fn read_optional(path: &Path) -> Result<Option<String>, CollectorError> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(read_error(path, e)),
    }
}

/// Driver-provided attribute that some ASICs refuse to report (EINVAL,
/// ENODATA, EOPNOTSUPP, EBUSY). Any read failure counts as absent.
async fn read_attribute(path: &Path) -> Option<String> {
    match fs::read_to_string(path).await {
        Ok(content) => Some(content.trim().to_string()),
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "unreadable attribute, treating as absent");
            }
            None
        }
    }
}

/// Numeric attribute; missing or empty reads as 0, garbage is an error.
async fn read_u64(path: &Path, field: &str) -> Result<u64, CollectorError> {
    parse_u64(path, field, read_optional(path).await?)
}

fn parse_u64(path: &Path, field: &str, raw: Option<String>) -> Result<u64, CollectorError> {
    let Some(raw) = raw else {
        return Ok(0);
    };
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<u64>().map_err(|_| CollectorError::ParseError {
        path: path.display().to_string(),
        field: field.into(),
        raw,
    })
}

async fn read_driver_link(path: &Path) -> Result<Option<String>, CollectorError> {
    match fs::read_link(path).await {
        Ok(target) => Ok(target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidInput) => Ok(None),
        Err(e) => Err(read_error(path, e)),
    }
}
