//! Error types for the attention tracker library.
//!
//! Per-frame detection misses are not errors; they travel as
//! [`crate::tracker::Estimate::Unavailable`]. This enum covers runtime
//! failures of the vision stack and setup failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::OrtError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller passed something the library cannot work with
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A model file could not be loaded into a session
    #[error("Model error: {0}")]
    ModelError(String),

    /// The session reports input metadata this crate cannot feed
    #[error("Model input error: {0}")]
    ModelInputError(String),

    /// Inference produced a missing or undersized output tensor
    #[error("Model output error: {0}")]
    ModelOutputError(String),

    /// An output tensor has an unexpected rank or layout
    #[error("Model data format error: {0}")]
    ModelDataFormatError(String),

    /// Video source could not be opened or read
    #[error("Camera error: {0}")]
    CameraError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Reading or writing a configuration file failed
    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = Error::CameraError("camera 2 unavailable after 5 attempts".to_string());
        assert_eq!(err.to_string(), "Camera error: camera 2 unavailable after 5 attempts");

        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(io, Error::Io(_)));
    }
}
