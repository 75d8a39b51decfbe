use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A sysfs tree with an amdgpu card0 (full stats, no connectors) and an
/// i915 card1 with DP-1 switched off and DP-5 driving a display.
pub fn sysfs_fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    for (file, content) in [
        ("uevent", "DRIVER=amdgpu\nPCI_CLASS=30000\nPCI_ID=1002:687F\n"),
        ("enable", "1\n"),
        ("gpu_busy_percent", "4\n"),
        ("mem_info_gtt_total", "8573157376\n"),
        ("mem_info_gtt_used", "144560128\n"),
        ("mem_info_vram_total", "8573157376\n"),
        ("mem_info_vram_used", "1490378752\n"),
        ("mem_info_vis_vram_total", "8573157376\n"),
        ("mem_info_vis_vram_used", "1490378752\n"),
        ("mem_info_vram_vendor", "samsung\n"),
        ("power_dpm_force_performance_level", "manual\n"),
        ("unique_id", "0123456789abcdef\n"),
    ] {
        write(root, &format!("class/drm/card0/device/{file}"), content);
    }

    write(root, "class/drm/card1/device/uevent", "DRIVER=i915\nPCI_CLASS=30000\n");
    write(root, "class/drm/card1/device/enable", "1\n");
    for (port, status, enabled, dpms) in [
        ("card1-DP-1", "disconnected", "disabled", "Off"),
        ("card1-DP-5", "connected", "enabled", "On"),
    ] {
        write(root, &format!("class/drm/card1/{port}/status"), status);
        write(root, &format!("class/drm/card1/{port}/enabled"), enabled);
        write(root, &format!("class/drm/card1/{port}/dpms"), dpms);
    }

    write(root, "class/drm/version", "drm 1.1.0 20060810\n");
    fs::create_dir_all(root.join("class/drm/renderD128")).unwrap();

    dir
}

/// Exposition text for [`sysfs_fixture`]. card1 is not an amdgpu card, so
/// its vendor fields are empty and its memory gauges zero.
pub const EXPECTED_TEXT: &str = r#"# HELP node_drm_card_enable Indicates on whether the card is enabled (1) or disabled (0)
# TYPE node_drm_card_enable gauge
node_drm_card_enable{card="card0"} 1
node_drm_card_enable{card="card1"} 1
# HELP node_drm_card_port_status Indicates on whether the port is connected to a devices or not. connected = 1, disconnected = 0
# TYPE node_drm_card_port_status gauge
node_drm_card_port_status{card="card1",port="DP-1"} 0
node_drm_card_port_status{card="card1",port="DP-5"} 1
# HELP node_drm_card_port_enabled Indicates on whether the port is enabled or disabled. enabled = 1, disabled = 0
# TYPE node_drm_card_port_enabled gauge
node_drm_card_port_enabled{card="card1",port="DP-1"} 0
node_drm_card_port_enabled{card="card1",port="DP-5"} 1
# HELP node_drm_card_port_dpms Display Power Management Signaling state of port. Off = 0, On = 1
# TYPE node_drm_card_port_dpms gauge
node_drm_card_port_dpms{card="card1",port="DP-1"} 0
node_drm_card_port_dpms{card="card1",port="DP-5"} 1
# HELP node_drm_card_card_info Card information
# TYPE node_drm_card_card_info gauge
node_drm_card_card_info{card="card0",driver="amdgpu",memory_vendor="samsung",power_performance_level="manual",unique_id="0123456789abcdef",vendor="amd"} 1
node_drm_card_card_info{card="card1",driver="i915",memory_vendor="",power_performance_level="",unique_id="",vendor="amd"} 1
# HELP node_drm_gpu_busy_percent How busy the GPU is as a percentage.
# TYPE node_drm_gpu_busy_percent gauge
node_drm_gpu_busy_percent{card="card0"} 4
node_drm_gpu_busy_percent{card="card1"} 0
# HELP node_drm_memory_gtt_size_bytes The size of the graphics translation table (GTT) block in bytes.
# TYPE node_drm_memory_gtt_size_bytes gauge
node_drm_memory_gtt_size_bytes{card="card0"} 8573157376
node_drm_memory_gtt_size_bytes{card="card1"} 0
# HELP node_drm_memory_gtt_used_bytes The used amount of the graphics translation table (GTT) block in bytes.
# TYPE node_drm_memory_gtt_used_bytes gauge
node_drm_memory_gtt_used_bytes{card="card0"} 144560128
node_drm_memory_gtt_used_bytes{card="card1"} 0
# HELP node_drm_memory_vram_size_bytes The size of VRAM in bytes.
# TYPE node_drm_memory_vram_size_bytes gauge
node_drm_memory_vram_size_bytes{card="card0"} 8573157376
node_drm_memory_vram_size_bytes{card="card1"} 0
# HELP node_drm_memory_vram_used_bytes The used amount of VRAM in bytes.
# TYPE node_drm_memory_vram_used_bytes gauge
node_drm_memory_vram_used_bytes{card="card0"} 1490378752
node_drm_memory_vram_used_bytes{card="card1"} 0
# HELP node_drm_memory_vis_vram_size_bytes The size of visible VRAM in bytes.
# TYPE node_drm_memory_vis_vram_size_bytes gauge
node_drm_memory_vis_vram_size_bytes{card="card0"} 8573157376
node_drm_memory_vis_vram_size_bytes{card="card1"} 0
# HELP node_drm_memory_vis_vram_used_bytes The used amount of visible VRAM in bytes.
# TYPE node_drm_memory_vis_vram_used_bytes gauge
node_drm_memory_vis_vram_used_bytes{card="card0"} 1490378752
node_drm_memory_vis_vram_used_bytes{card="card1"} 0
"#;
