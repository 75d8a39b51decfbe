pub mod drm;

use crate::config::Config;
use crate::errors::CollectorError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Prefix shared by every metric this agent exposes.
pub const NAMESPACE: &str = "node";

#[async_trait]
pub trait Collector: Send + Sync {
    /// name of the collector as used in reports
    fn name(&self) -> &'static str;

    /// gather collection then return labeled samples. Either every sample of
    /// the cycle is returned or an error is.
    async fn collect(&mut self) -> Result<CollectionResult, CollectorError>;
}

/// result from any collector.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResult {
    pub collector: String,
    pub collected_at: DateTime<Utc>,
    pub latency_us: u64,
    pub samples: Vec<Sample>,
}

/// Constructor entry for one collector, consulted by [`build`].
pub struct CollectorFactory {
    pub name: &'static str,
    pub default_enabled: bool,
    pub build: fn(&Config) -> Result<Box<dyn Collector>, CollectorError>,
}

pub const FACTORIES: &[CollectorFactory] = &[CollectorFactory {
    name: drm::NAME,
    default_enabled: true,
    build: drm::build_collector,
}];

/// Instantiate every collector enabled by default or via `--enable-collector`,
/// minus those named in `--disable-collector`.
pub fn build(config: &Config) -> Result<Vec<Box<dyn Collector>>, CollectorError> {
    for name in config.enable_collectors.iter().chain(&config.disable_collectors) {
        if !FACTORIES.iter().any(|f| f.name == name.as_str()) {
            return Err(CollectorError::UnknownCollector { name: name.clone() });
        }
    }

    let mut collectors = Vec::new();
    for factory in FACTORIES {
        let enabled = (factory.default_enabled
            || config.enable_collectors.iter().any(|n| n == factory.name))
            && !config.disable_collectors.iter().any(|n| n == factory.name);
        if !enabled {
            tracing::debug!(collector = factory.name, "collector disabled");
            continue;
        }
        collectors.push((factory.build)(config)?);
        tracing::info!(collector = factory.name, "collector enabled");
    }
    Ok(collectors)
}

/// Run one collection under `timeout`, recording how long it took.
pub async fn timed_collect(
    collector: &mut dyn Collector,
    timeout: Duration,
) -> Result<CollectionResult, CollectorError> {
    let start = Instant::now();
    let mut result = tokio::time::timeout(timeout, collector.collect())
        .await
        .map_err(|_| CollectorError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        })??;
    result.latency_us = start.elapsed().as_micros() as u64;
    Ok(result)
}

/// Join the non-empty parts of a metric name with `_`.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Metric descriptor: fully qualified name, help text and label names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Desc {
    pub fq_name: String,
    pub help: &'static str,
    pub label_names: &'static [&'static str],
}

impl Desc {
    pub fn new(
        subsystem: &str,
        name: &str,
        help: &'static str,
        label_names: &'static [&'static str],
    ) -> Arc<Self> {
        Arc::new(Self {
            fq_name: build_fq_name(NAMESPACE, subsystem, name),
            help,
            label_names,
        })
    }
}

/// One gauge reading. Lives for a single collection cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub desc: Arc<Desc>,
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new<I, S>(desc: &Arc<Desc>, value: f64, label_values: I) -> Result<Self, CollectorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let label_values: Vec<String> = label_values.into_iter().map(Into::into).collect();
        if label_values.len() != desc.label_names.len() {
            return Err(CollectorError::LabelCardinality {
                metric: desc.fq_name.clone(),
                expected: desc.label_names.len(),
                got: label_values.len(),
            });
        }
        Ok(Self {
            desc: Arc::clone(desc),
            label_values,
            value,
        })
    }

    pub fn name(&self) -> &str {
        &self.desc.fq_name
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .label_names
            .iter()
            .position(|n| *n == name)
            .map(|i| self.label_values[i].as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.desc
            .label_names
            .iter()
            .copied()
            .zip(self.label_values.iter().map(String::as_str))
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if !self.label_values.is_empty() {
            f.write_str("{")?;
            for (i, (name, value)) in self.labels().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{name}=\"")?;
                for c in value.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '"' => f.write_str("\\\"")?,
                        '\n' => f.write_str("\\n")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")?;
            }
            f.write_str("}")?;
        }
        write!(f, " {}", self.value)
    }
}

/// Exposition text: a `# HELP` and `# TYPE` header per metric, then that
/// metric's samples in collection order. Metrics appear in the order their
/// first sample was collected.
pub fn render_text(samples: &[Sample]) -> String {
    let mut families: Vec<(&Desc, Vec<&Sample>)> = Vec::new();
    for sample in samples {
        match families.iter_mut().find(|(desc, _)| desc.fq_name == sample.desc.fq_name) {
            Some((_, members)) => members.push(sample),
            None => families.push((&*sample.desc, vec![sample])),
        }
    }

    let mut out = String::new();
    for (desc, members) in families {
        let help = desc.help.replace('\\', "\\\\").replace('\n', "\\n");
        out.push_str(&format!("# HELP {} {help}\n", desc.fq_name));
        out.push_str(&format!("# TYPE {} gauge\n", desc.fq_name));
        for sample in members {
            out.push_str(&format!("{sample}\n"));
        }
    }
    out
}

impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let labels: BTreeMap<&str, &str> = self.labels().collect();
        let mut state = serializer.serialize_struct("Sample", 3)?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("labels", &labels)?;
        state.serialize_field("value", &self.value)?;
        state.end()
    }
}
