use burn::tensor::{activation, backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Activation {
    Relu,
    Tanh,
    Sigmoid,
    /// Normalizes each row into a probability distribution.
    Softmax,
    #[default]
    Identity,
}

impl Activation {
    pub fn forward<B: Backend>(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            Activation::Relu => activation::relu(x),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => activation::sigmoid(x),
            Activation::Softmax => activation::softmax(x, 1),
            Activation::Identity => x,
        }
    }
}
