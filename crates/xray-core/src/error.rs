use thiserror::Error;

#[derive(Debug, Error)]
pub enum XrayError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("watch page error: {0}")]
    Detect(#[from] xray_detect::DetectError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
