use burn::{
    module::Param,
    nn::{Initializer, Linear, LinearConfig},
    tensor::{backend::Backend, Distribution, Tensor},
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Initialization {
    /// Weights from U(0, 1/(fan_in * width)) and biases from U(0, 1/width). Keeps the initial
    /// outputs of wide layers small and positive.
    #[default]
    ScaledUniform,
    HeUniform,
    LecunUniform,
}

impl Initialization {
    pub fn weight_range(&self, fan_in: usize, width: usize) -> (f64, f64) {
        match self {
            Initialization::ScaledUniform => (0.0, 1.0 / (fan_in * width) as f64),
            Initialization::HeUniform => {
                // this is used as a default in burn
                let limit = (3.0 / fan_in as f64).sqrt();
                (-limit, limit)
            }
            Initialization::LecunUniform => {
                let limit = (1.0 / fan_in as f64).sqrt();
                (-limit, limit)
            }
        }
    }

    pub fn bias_range(&self, fan_in: usize, width: usize) -> (f64, f64) {
        match self {
            Initialization::ScaledUniform => (0.0, 1.0 / width as f64),
            _ => self.weight_range(fan_in, width),
        }
    }

    pub fn linear<B: Backend>(
        &self,
        fan_in: usize,
        width: usize,
        use_bias: bool,
        device: &B::Device,
    ) -> Linear<B> {
        let (min, max) = self.weight_range(fan_in, width);
        let mut linear = LinearConfig::new(fan_in, width)
            .with_bias(use_bias)
            .with_initializer(Initializer::Uniform { min, max })
            .init(device);
        if use_bias {
            let (min, max) = self.bias_range(fan_in, width);
            let bias = Tensor::random([width], Distribution::Uniform(min, max), device);
            linear.bias = Some(Param::from_tensor(bias));
        }
        linear
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    #[test]
    fn test_scaled_uniform_ranges() {
        let init = Initialization::ScaledUniform;
        assert_eq!(init.weight_range(2, 200), (0.0, 1.0 / 400.0));
        assert_eq!(init.bias_range(2, 200), (0.0, 1.0 / 200.0));
    }

    #[test]
    fn test_he_uniform_is_symmetric() {
        let (min, max) = Initialization::HeUniform.weight_range(12, 5);
        assert_eq!(min, -max);
        assert!((max - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_linear_weights_within_range() {
        let device = Default::default();
        let linear = Initialization::ScaledUniform.linear::<NdArray>(4, 8, true, &device);
        let weights: Vec<f32> = linear.weight.val().to_data().iter::<f32>().collect();
        assert_eq!(weights.len(), 32);
        assert!(weights.iter().all(|w| (0.0..=1.0 / 32.0).contains(w)));
        let bias: Vec<f32> = linear
            .bias
            .as_ref()
            .map(|b| b.val().to_data().iter::<f32>().collect())
            .unwrap();
        assert_eq!(bias.len(), 8);
        assert!(bias.iter().all(|b| (0.0..=1.0 / 8.0).contains(b)));
    }

    #[test]
    fn test_linear_without_bias() {
        let device = Default::default();
        let linear = Initialization::HeUniform.linear::<NdArray>(3, 2, false, &device);
        assert!(linear.bias.is_none());
    }
}
