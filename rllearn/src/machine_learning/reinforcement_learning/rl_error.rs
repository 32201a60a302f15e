use serde_json::Error as SerdeError;
use std::io::Error as IOError;

use crate::machine_learning::nn::nn_error::NNError;

#[derive(thiserror::Error, Debug)]
pub enum RLError {
    #[error("Action out of range got: {value} when max action value is {max}.")]
    ActionOutOfRange { value: u32, max: u32 },
    #[error("Episode buffers differ in length: {0}")]
    EpisodeMismatch(String),
    #[error("No transitions given to `{0}`.")]
    EmptyEpisode(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Network error: {0}")]
    NNError(#[from] NNError),
    #[error("Couldn't serialize: {0}")]
    Serialization(#[from] SerdeError),
    #[error("IO error: {0}")]
    IOError(#[from] IOError),
}

pub type RLResult<T> = std::result::Result<T, RLError>;
