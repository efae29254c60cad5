use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MonitorError {
    #[error("initial capacity must be greater than zero")]
    ZeroCapacity,
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} thread panicked")]
    WorkerPanicked(String),
}
