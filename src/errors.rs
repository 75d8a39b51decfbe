use thiserror::Error;

//create types errors for easy testability

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("failed to open sysfs at {path}: {source}")]
    SysfsOpen {
        path: String,
        source: std::io::Error,
    },

    #[error("sysfs root {path} is not a directory")]
    NotADirectory { path: String },

    #[error("failed to read {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {field} from {path}: {raw}")]
    ParseError {
        path: String,
        field: String,
        raw: String,
    },

    #[error("metric {metric} expects {expected} label values, got {got}")]
    LabelCardinality {
        metric: String,
        expected: usize,
        got: usize,
    },

    #[error("collection timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("unknown collector {name}")]
    UnknownCollector { name: String },
}
