use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Model artifact not available at {}: {source}", path.display())]
    ArtifactUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("Invalid input shape: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Invalid network topology: {0}")]
    InvalidTopology(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Failed to save the model: {0}")]
    Persist(String),
}

pub type Result<T> = std::result::Result<T, Error>;
