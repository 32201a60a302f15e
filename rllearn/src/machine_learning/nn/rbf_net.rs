use std::path::Path;

use burn::{
    module::{AutodiffModule, Ignored, Module, Param},
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{
        backend::{AutodiffBackend, Backend},
        cast::ToElement,
        Tensor, TensorData,
    },
};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    nn_error::{NNError, Result},
    optimizer::{self, BoxedOptimizer},
    rows_to_tensor, tensor_to_rows,
};

/// Where the centres of the radial units come from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub enum Samplers {
    /// One centre per input dimension, drawn from U(-1, 1).
    #[default]
    Auto,
    Count(usize),
    Explicit(Vec<Vec<f32>>),
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RbfKernel {
    /// `gamma * |x - c|`
    #[default]
    ScaledDistance,
    /// `exp(-gamma * |x - c|^2)`
    Gaussian,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RbfNetConfig {
    pub samplers: Samplers,
    pub constant_samplers: bool,
    pub constant_gammas: bool,
    pub gamma_scaler: f32,
    pub learning_rate: f64,
    pub kernel: RbfKernel,
    pub seed: Option<u64>,
}

impl Default for RbfNetConfig {
    fn default() -> Self {
        Self {
            samplers: Samplers::Auto,
            constant_samplers: true,
            constant_gammas: true,
            gamma_scaler: 0.1,
            learning_rate: 1e-2,
            kernel: RbfKernel::ScaledDistance,
            seed: None,
        }
    }
}

impl RbfNetConfig {
    pub fn with_samplers(mut self, samplers: Samplers) -> Self {
        self.samplers = samplers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_kernel(mut self, kernel: RbfKernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_trainable_centers(mut self) -> Self {
        self.constant_samplers = false;
        self
    }

    fn centers(&self, input_dims: usize, rng: &mut XorShiftRng) -> Result<Vec<Vec<f32>>> {
        let count = match &self.samplers {
            Samplers::Auto => input_dims,
            Samplers::Count(count) => *count,
            Samplers::Explicit(rows) => {
                if rows.is_empty() {
                    return Err(NNError::InvalidSamplers(
                        "explicit samplers can't be empty".to_string(),
                    ));
                }
                if let Some(row) = rows.iter().find(|row| row.len() != input_dims) {
                    return Err(NNError::InvalidSamplers(format!(
                        "sampler dimensions {} don't match with input dimensions {input_dims}",
                        row.len()
                    )));
                }
                return Ok(rows.clone());
            }
        };
        if count == 0 {
            return Err(NNError::InvalidSamplers(
                "samplers must be a positive integer".to_string(),
            ));
        }
        Ok((0..count)
            .map(|_| {
                (0..input_dims)
                    .map(|_| rng.gen_range(-1.0f32..1.0))
                    .collect()
            })
            .collect())
    }

    pub fn init<B: Backend>(
        &self,
        input_dims: usize,
        output_dims: usize,
        device: &B::Device,
    ) -> Result<RbfNet<B>> {
        if input_dims == 0 || output_dims == 0 {
            return Err(NNError::InvalidLayerConfig(format!(
                "rbf net needs non-empty input and output, got in({input_dims}) out({output_dims})"
            )));
        }
        let mut rng = XorShiftRng::seed_from_u64(self.seed.unwrap_or_else(rand::random));
        let centers = self.centers(input_dims, &mut rng)?;
        let samplers_num = centers.len();
        info!("RBF net init in({input_dims}) samplers({samplers_num}) out({output_dims})");

        let gamma_dist = Normal::new(0.2f32, self.gamma_scaler)
            .map_err(|e| NNError::InvalidLayerConfig(format!("gamma scaler: {e}")))?;
        let gammas: Vec<f32> = (0..samplers_num)
            .map(|_| gamma_dist.sample(&mut rng))
            .collect();
        let weight_limit = 1.0 / samplers_num as f32;
        let weights: Vec<f32> = (0..samplers_num * output_dims)
            .map(|_| rng.gen_range(0.0..weight_limit))
            .collect();

        let centers = rows_to_tensor("rbf init", &centers, input_dims, device)?;
        let gammas = Tensor::from_data(TensorData::new(gammas, [samplers_num]), device);
        let weights = Tensor::from_data(
            TensorData::new(weights, [samplers_num, output_dims]),
            device,
        );
        Ok(RbfNet {
            centers: Param::from_tensor(centers),
            gammas: Param::from_tensor(gammas),
            weights: Param::from_tensor(weights),
            constant_centers: Ignored(self.constant_samplers),
            constant_gammas: Ignored(self.constant_gammas),
            kernel: Ignored(self.kernel),
        })
    }
}

#[derive(Module, Debug)]
pub struct RbfNet<B: Backend> {
    centers: Param<Tensor<B, 2>>,
    gammas: Param<Tensor<B, 1>>,
    weights: Param<Tensor<B, 2>>,
    constant_centers: Ignored<bool>,
    constant_gammas: Ignored<bool>,
    kernel: Ignored<RbfKernel>,
}

impl<B: Backend> RbfNet<B> {
    /// Maps `[batch, in]` to `[batch, out]` through the radial units.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let centers = match *self.constant_centers {
            true => self.centers.val().detach(),
            false => self.centers.val(),
        };
        let gammas = match *self.constant_gammas {
            true => self.gammas.val().detach(),
            false => self.gammas.val(),
        };
        let [batch, _] = input.dims();
        let [samplers_num, _] = centers.dims();
        // [batch, 1, in] - [1, samplers, in]
        let diff = input.unsqueeze_dim::<3>(1) - centers.unsqueeze::<3>();
        let squared = diff
            .powf_scalar(2.0)
            .sum_dim(2)
            .reshape([batch, samplers_num]);
        let gammas = gammas.unsqueeze::<2>();
        let features = match *self.kernel {
            RbfKernel::ScaledDistance => squared.add_scalar(1e-12).sqrt() * gammas,
            RbfKernel::Gaussian => (squared * gammas.neg()).exp(),
        };
        features.matmul(self.weights.val())
    }

    pub fn samplers_num(&self) -> usize {
        self.centers.val().dims()[0]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RbfInfo {
    pub centers: Vec<Vec<f32>>,
    pub gammas: Vec<f32>,
    pub weights: Vec<Vec<f32>>,
}

/// An RBF network that is created from the shapes of the first training sample unless
/// [`RbfRegressor::initialize`] is called first.
pub struct RbfRegressor<B: AutodiffBackend> {
    config: RbfNetConfig,
    net: Option<RbfNet<B>>,
    optimizer: BoxedOptimizer<RbfNet<B>, B>,
    input_dims: usize,
    output_dims: usize,
    device: B::Device,
}

impl<B: AutodiffBackend> RbfRegressor<B> {
    pub fn new(config: RbfNetConfig, device: B::Device) -> Self {
        Self {
            config,
            net: None,
            optimizer: optimizer::sgd(),
            input_dims: 0,
            output_dims: 0,
            device,
        }
    }

    pub fn initialize(&mut self, input_dims: usize, output_dims: usize) -> Result<()> {
        self.net = Some(self.config.init(input_dims, output_dims, &self.device)?);
        self.input_dims = input_dims;
        self.output_dims = output_dims;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.net.is_some()
    }

    pub fn config(&self) -> &RbfNetConfig {
        &self.config
    }

    fn net(&self, op_name: &str) -> Result<&RbfNet<B>> {
        self.net
            .as_ref()
            .ok_or_else(|| NNError::NotInitialized(op_name.to_string()))
    }

    pub fn predict(&self, input: &[f32]) -> Result<Vec<f32>> {
        let mut rows = self.predict_batch(&[input])?;
        Ok(rows.pop().unwrap_or_default())
    }

    pub fn predict_batch<R: AsRef<[f32]>>(&self, rows: &[R]) -> Result<Vec<Vec<f32>>> {
        let net = self.net("predict")?.valid();
        let input = rows_to_tensor("predict", rows, self.input_dims, &self.device)?;
        Ok(tensor_to_rows(net.forward(input)))
    }

    /// One gradient descent step on the absolute error of a single sample. Returns the error
    /// before the step.
    pub fn partial_fit(&mut self, input: &[f32], target: &[f32]) -> Result<f32> {
        if self.net.is_none() {
            self.initialize(input.len(), target.len())?;
        }
        let net = self.net("partial_fit")?.clone();
        let input = rows_to_tensor::<B, _>("partial_fit", &[input], self.input_dims, &self.device)?;
        let target =
            rows_to_tensor::<B, _>("partial_fit", &[target], self.output_dims, &self.device)?;
        let loss = (net.forward(input) - target).abs().mean();
        let loss_value = loss.clone().into_scalar().to_f32();
        self.net = Some(optimizer::minimize(
            net,
            loss,
            &mut self.optimizer,
            self.config.learning_rate,
        ));
        Ok(loss_value)
    }

    pub fn info(&self) -> Result<RbfInfo> {
        let net = self.net("info")?;
        Ok(RbfInfo {
            centers: tensor_to_rows(net.centers.val()),
            gammas: net.gammas.val().into_data().iter::<f32>().collect(),
            weights: tensor_to_rows(net.weights.val()),
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.net("save")?
            .clone()
            .save_file(path.as_ref().to_path_buf(), &recorder)
            .map_err(|e| NNError::Record(format!("{e:?}")))
    }

    /// Builds a net of the given shape and overwrites its parameters from `path`.
    pub fn load<P: AsRef<Path>>(
        &mut self,
        path: P,
        input_dims: usize,
        output_dims: usize,
    ) -> Result<()> {
        self.initialize(input_dims, output_dims)?;
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let net = self
            .net("load")?
            .clone()
            .load_file(path.as_ref().to_path_buf(), &recorder, &self.device)
            .map_err(|e| NNError::Record(format!("{e:?}")))?;
        self.net = Some(net);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};
    use float_cmp::approx_eq;

    use super::*;

    type TestBackend = Autodiff<NdArray>;

    fn regressor(config: RbfNetConfig) -> RbfRegressor<TestBackend> {
        RbfRegressor::new(config, Default::default())
    }

    #[test]
    fn test_auto_samplers_match_input_dimensions() {
        let mut rbf = regressor(RbfNetConfig::default().with_seed(1));
        rbf.initialize(3, 1).unwrap();
        let info = rbf.info().unwrap();
        assert_eq!(info.centers.len(), 3);
        assert!(info
            .centers
            .iter()
            .flatten()
            .all(|c| (-1.0..1.0).contains(c)));
        assert_eq!(info.gammas.len(), 3);
        assert_eq!(info.weights.len(), 3);
        assert!(info.weights.iter().flatten().all(|w| (0.0..1.0 / 3.0).contains(w)));
    }

    #[test]
    fn test_zero_samplers_is_an_error() {
        let mut rbf = regressor(RbfNetConfig::default().with_samplers(Samplers::Count(0)));
        assert!(matches!(
            rbf.initialize(2, 1),
            Err(NNError::InvalidSamplers(_))
        ));
    }

    #[test]
    fn test_explicit_samplers_must_match_input() {
        let samplers = Samplers::Explicit(vec![vec![0.0, 0.0, 0.0]]);
        let mut rbf = regressor(RbfNetConfig::default().with_samplers(samplers));
        assert!(matches!(
            rbf.initialize(2, 1),
            Err(NNError::InvalidSamplers(_))
        ));
    }

    #[test]
    fn test_predict_before_fit() {
        let rbf = regressor(RbfNetConfig::default());
        assert!(matches!(
            rbf.predict(&[0.0, 0.0]),
            Err(NNError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_partial_fit_initializes_from_sample() {
        let mut rbf = regressor(RbfNetConfig::default().with_samplers(Samplers::Count(7)));
        rbf.partial_fit(&[0.1, 0.2], &[1.0]).unwrap();
        let info = rbf.info().unwrap();
        assert_eq!(info.centers.len(), 7);
        assert!(info.centers.iter().all(|c| c.len() == 2));
        assert_eq!(rbf.predict(&[0.1, 0.2]).unwrap().len(), 1);
        assert!(matches!(
            rbf.predict(&[0.1, 0.2, 0.3]),
            Err(NNError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_scaled_distance_forward() {
        let samplers = Samplers::Explicit(vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
        let mut rbf = regressor(
            RbfNetConfig::default()
                .with_samplers(samplers)
                .with_seed(3),
        );
        rbf.initialize(2, 1).unwrap();
        let info = rbf.info().unwrap();
        let x = [0.6f32, -0.8];
        let expected: f32 = info
            .centers
            .iter()
            .zip(&info.gammas)
            .zip(&info.weights)
            .map(|((c, g), w)| {
                let dist = ((x[0] - c[0]).powi(2) + (x[1] - c[1]).powi(2)).sqrt();
                dist * g * w[0]
            })
            .sum();
        let received = rbf.predict(&x).unwrap()[0];
        assert!(approx_eq!(f32, expected, received, epsilon = 1e-5));
    }

    #[test]
    fn test_constant_samplers_only_train_weights() {
        let mut rbf = regressor(RbfNetConfig::default().with_seed(5));
        rbf.initialize(2, 1).unwrap();
        let before = rbf.info().unwrap();
        for _ in 0..10 {
            rbf.partial_fit(&[0.3, 0.4], &[2.0]).unwrap();
        }
        let after = rbf.info().unwrap();
        assert_eq!(before.centers, after.centers);
        assert_eq!(before.gammas, after.gammas);
        assert_ne!(before.weights, after.weights);
    }

    #[test]
    fn test_trainable_centers_move() {
        let mut rbf = regressor(RbfNetConfig::default().with_seed(5).with_trainable_centers());
        rbf.initialize(2, 1).unwrap();
        let before = rbf.info().unwrap();
        for _ in 0..10 {
            rbf.partial_fit(&[0.3, 0.4], &[2.0]).unwrap();
        }
        assert_ne!(before.centers, rbf.info().unwrap().centers);
    }

    #[test]
    fn test_partial_fit_reduces_error() {
        let mut rbf = regressor(
            RbfNetConfig::default()
                .with_seed(11)
                .with_samplers(Samplers::Count(4)),
        );
        let x = [0.5f32, -0.5];
        let first_error = rbf.partial_fit(&x, &[2.0]).unwrap();
        let mut last_error = first_error;
        for _ in 0..50 {
            last_error = rbf.partial_fit(&x, &[2.0]).unwrap();
        }
        assert!(last_error < first_error);
    }

    #[test]
    fn test_gaussian_kernel_is_bounded() {
        let mut rbf = regressor(
            RbfNetConfig::default()
                .with_seed(2)
                .with_kernel(RbfKernel::Gaussian)
                .with_samplers(Samplers::Count(5)),
        );
        rbf.initialize(2, 1).unwrap();
        let info = rbf.info().unwrap();
        let weight_sum: f32 = info.weights.iter().flatten().map(|w| w.abs()).sum();
        let prediction = rbf.predict(&[10.0, -10.0]).unwrap()[0];
        assert!(prediction.abs() <= weight_sum + 1e-6);
    }

    #[test]
    fn test_partial_fit_moves_prediction_toward_target() {
        let mut rbf = regressor(RbfNetConfig::default().with_seed(5));
        rbf.initialize(2, 1).unwrap();
        let x = [0.3f32, 0.4];
        let before = rbf.predict(&x).unwrap()[0];
        for _ in 0..10 {
            rbf.partial_fit(&x, &[2.0]).unwrap();
        }
        let after = rbf.predict(&x).unwrap()[0];
        assert!((2.0 - after).abs() < (2.0 - before).abs());
    }

    #[test]
    fn test_trainable_gammas_move() {
        let config = RbfNetConfig {
            constant_gammas: false,
            ..RbfNetConfig::default().with_seed(9)
        };
        let mut rbf = regressor(config);
        rbf.initialize(2, 1).unwrap();
        let before = rbf.info().unwrap();
        for _ in 0..10 {
            rbf.partial_fit(&[0.3, 0.4], &[2.0]).unwrap();
        }
        let after = rbf.info().unwrap();
        assert_ne!(before.gammas, after.gammas);
        assert_eq!(before.centers, after.centers);
    }

    #[test]
    fn test_loaded_net_keeps_training() {
        let path = std::env::temp_dir().join("rllearn_rbf_reload_test");
        let mut rbf = regressor(RbfNetConfig::default().with_seed(3));
        rbf.initialize(2, 1).unwrap();
        rbf.save(&path).unwrap();
        let mut loaded = regressor(RbfNetConfig::default().with_seed(4));
        loaded.load(&path, 2, 1).unwrap();
        let before = loaded.info().unwrap();
        assert_eq!(before.weights, rbf.info().unwrap().weights);
        loaded.partial_fit(&[0.3, 0.4], &[2.0]).unwrap();
        assert_ne!(before.weights, loaded.info().unwrap().weights);
    }
}
