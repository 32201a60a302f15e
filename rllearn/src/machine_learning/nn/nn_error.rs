use serde_json::Error as SerdeError;
use std::io::Error as IOError;

#[derive(thiserror::Error, Debug)]
pub enum NNError {
    #[error("Shape mismatch in `{op_name}`. Expected {expected:?} but received {received:?}.")]
    ShapeMismatch {
        op_name: String,
        expected: Vec<usize>,
        received: Vec<usize>,
    },
    #[error("Empty batch given to `{0}`.")]
    EmptyBatch(String),
    #[error("The network must be fitted or initialized before `{0}`.")]
    NotInitialized(String),
    #[error("Invalid samplers: {0}")]
    InvalidSamplers(String),
    #[error("Invalid layer config: {0}")]
    InvalidLayerConfig(String),
    #[error("Couldn't record the model: {0}")]
    Record(String),
    #[error("Couldn't serialize the model config.")]
    Serialization(#[from] SerdeError),
    #[error("IO error")]
    IOError(#[from] IOError),
}

pub type Result<T> = std::result::Result<T, NNError>;
