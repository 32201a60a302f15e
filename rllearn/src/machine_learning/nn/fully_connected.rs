use std::path::Path;

use burn::{
    module::{AutodiffModule, Ignored},
    nn::{
        loss::{MseLoss, Reduction},
        Dropout, DropoutConfig, Linear,
    },
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{backend::AutodiffBackend, cast::ToElement},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    activation::Activation,
    nn_error::{NNError, Result},
    optimizer::{self, BoxedOptimizer},
    rows_to_tensor, tensor_to_rows,
    weight_initialization::Initialization,
};

/// Layout and training parameters of a feed-forward network. The output layer is appended
/// after `hidden_layers` so an empty `hidden_layers` gives a single linear map.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct FullyConnectedConfig {
    pub hidden_layers: Vec<usize>,
    pub activations: Vec<Activation>,
    pub use_biases: Vec<bool>,
    pub drop_out: f64,
    pub output_activation: Activation,
    pub output_use_bias: bool,
    pub learning_rate: f64,
    pub initialization: Initialization,
}

impl Default for FullyConnectedConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![200, 100],
            activations: vec![Activation::Relu, Activation::Relu],
            use_biases: vec![true, true],
            drop_out: 0.3,
            output_activation: Activation::Identity,
            output_use_bias: false,
            learning_rate: 1e-2,
            initialization: Initialization::ScaledUniform,
        }
    }
}

impl FullyConnectedConfig {
    pub fn with_hidden_layers(mut self, hidden_layers: Vec<usize>, activation: Activation) -> Self {
        self.activations = vec![activation; hidden_layers.len()];
        self.use_biases = vec![true; hidden_layers.len()];
        self.hidden_layers = hidden_layers;
        self
    }

    pub fn with_output_activation(mut self, activation: Activation) -> Self {
        self.output_activation = activation;
        self
    }

    pub fn with_drop_out(mut self, drop_out: f64) -> Self {
        self.drop_out = drop_out;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_initialization(mut self, initialization: Initialization) -> Self {
        self.initialization = initialization;
        self
    }

    /// Width, activation and bias flag of every layer including the output layer.
    pub fn layout(&self, output_dims: usize) -> Result<Vec<(usize, Activation, bool)>> {
        if self.activations.len() != self.hidden_layers.len()
            || self.use_biases.len() != self.hidden_layers.len()
        {
            return Err(NNError::InvalidLayerConfig(format!(
                "{} hidden layers but {} activations and {} bias flags",
                self.hidden_layers.len(),
                self.activations.len(),
                self.use_biases.len()
            )));
        }
        if !(0.0..1.0).contains(&self.drop_out) {
            return Err(NNError::InvalidLayerConfig(format!(
                "drop out must be in [0, 1), got {}",
                self.drop_out
            )));
        }
        if let Some(index) = self.hidden_layers.iter().position(|width| *width == 0) {
            return Err(NNError::InvalidLayerConfig(format!(
                "hidden layer {index} has zero width"
            )));
        }
        let mut layout = self
            .hidden_layers
            .iter()
            .zip(&self.activations)
            .zip(&self.use_biases)
            .map(|((width, activation), bias)| (*width, *activation, *bias))
            .collect::<Vec<_>>();
        layout.push((output_dims, self.output_activation, self.output_use_bias));
        Ok(layout)
    }

    pub fn init<B: Backend>(
        &self,
        input_dims: usize,
        output_dims: usize,
        device: &B::Device,
    ) -> Result<FullyConnected<B>> {
        let layout = self.layout(output_dims)?;
        info!(
            "NN: in({input_dims}) layers: {:?}, activations: {:?}, biases: {:?}",
            layout.iter().map(|l| l.0).collect::<Vec<_>>(),
            layout.iter().map(|l| l.1).collect::<Vec<_>>(),
            layout.iter().map(|l| l.2).collect::<Vec<_>>()
        );
        let mut fan_in = input_dims;
        let mut layers = Vec::with_capacity(layout.len());
        for (i, (width, activation, use_bias)) in layout.into_iter().enumerate() {
            // the network input is never dropped
            let dropout = match i {
                0 => None,
                _ if self.drop_out > 0.0 => Some(DropoutConfig::new(self.drop_out).init()),
                _ => None,
            };
            layers.push(DenseLayer {
                linear: self.initialization.linear(fan_in, width, use_bias, device),
                dropout,
                activation: Ignored(activation),
            });
            fan_in = width;
        }
        Ok(FullyConnected { layers })
    }
}

#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    linear: Linear<B>,
    dropout: Option<Dropout>,
    activation: Ignored<Activation>,
}

impl<B: Backend> DenseLayer<B> {
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = match &self.dropout {
            Some(dropout) => dropout.forward(input),
            None => input,
        };
        self.activation.forward(self.linear.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct FullyConnected<B: Backend> {
    layers: Vec<DenseLayer<B>>,
}

impl<B: Backend> FullyConnected<B> {
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.layers
            .iter()
            .fold(input, |x, layer| layer.forward(x))
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

/// A feed-forward network bundled with its optimizer.
pub struct FullyConnectedRegressor<B: AutodiffBackend> {
    model: FullyConnected<B>,
    optimizer: BoxedOptimizer<FullyConnected<B>, B>,
    config: FullyConnectedConfig,
    input_dims: usize,
    output_dims: usize,
    device: B::Device,
}

impl<B: AutodiffBackend> FullyConnectedRegressor<B> {
    pub fn new(
        input_dims: usize,
        output_dims: usize,
        config: FullyConnectedConfig,
        device: B::Device,
    ) -> Result<Self> {
        let model = config.init(input_dims, output_dims, &device)?;
        Ok(Self {
            model,
            optimizer: optimizer::adam(),
            config,
            input_dims,
            output_dims,
            device,
        })
    }

    pub fn input_dims(&self) -> usize {
        self.input_dims
    }

    pub fn output_dims(&self) -> usize {
        self.output_dims
    }

    pub fn config(&self) -> &FullyConnectedConfig {
        &self.config
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn input_tensor<R: AsRef<[f32]>>(&self, op_name: &str, rows: &[R]) -> Result<Tensor<B, 2>> {
        rows_to_tensor(op_name, rows, self.input_dims, &self.device)
    }

    /// Training forward pass, dropout included.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.model.forward(input)
    }

    /// Inference without dropout or gradient tracking.
    pub fn predict<R: AsRef<[f32]>>(&self, rows: &[R]) -> Result<Vec<Vec<f32>>> {
        let input = self.input_tensor("predict", rows)?.inner();
        let output = self.model.valid().forward(input);
        Ok(tensor_to_rows(output))
    }

    /// One optimizer step on the mean squared error between the network output and `targets`.
    /// Returns the loss before the step.
    pub fn fit<R: AsRef<[f32]>, T: AsRef<[f32]>>(&mut self, rows: &[R], targets: &[T]) -> Result<f32> {
        if rows.len() != targets.len() {
            return Err(NNError::ShapeMismatch {
                op_name: "fit".to_string(),
                expected: vec![rows.len(), self.output_dims],
                received: vec![targets.len(), self.output_dims],
            });
        }
        let input = self.input_tensor("fit", rows)?;
        let targets = rows_to_tensor("fit", targets, self.output_dims, &self.device)?;
        let prediction = self.forward(input);
        let loss = MseLoss::new().forward(prediction, targets, Reduction::Mean);
        let loss_value = loss.clone().into_scalar().to_f32();
        self.minimize(loss);
        Ok(loss_value)
    }

    pub fn partial_fit(&mut self, row: &[f32], target: &[f32]) -> Result<f32> {
        self.fit(&[row], &[target])
    }

    /// Backpropagates a scalar loss built from [`Self::forward`] and steps the optimizer.
    pub fn minimize(&mut self, loss: Tensor<B, 1>) {
        self.model = optimizer::minimize(
            self.model.clone(),
            loss,
            &mut self.optimizer,
            self.config.learning_rate,
        );
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.model
            .clone()
            .save_file(path.as_ref().to_path_buf(), &recorder)
            .map_err(|e| NNError::Record(format!("{e:?}")))
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.model = self
            .model
            .clone()
            .load_file(path.as_ref().to_path_buf(), &recorder, &self.device)
            .map_err(|e| NNError::Record(format!("{e:?}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};

    use crate::machine_learning::compare_outputs;

    use super::*;

    type TestBackend = Autodiff<NdArray>;

    fn small_config() -> FullyConnectedConfig {
        FullyConnectedConfig::default()
            .with_hidden_layers(vec![16], Activation::Tanh)
            .with_drop_out(0.0)
            .with_initialization(Initialization::HeUniform)
    }

    #[test]
    fn test_default_layout() {
        let layout = FullyConnectedConfig::default().layout(3).unwrap();
        assert_eq!(
            layout,
            vec![
                (200, Activation::Relu, true),
                (100, Activation::Relu, true),
                (3, Activation::Identity, false)
            ]
        );
    }

    #[test]
    fn test_mismatched_layer_config() {
        let config = FullyConnectedConfig {
            activations: vec![Activation::Relu],
            ..Default::default()
        };
        assert!(matches!(
            config.layout(1),
            Err(NNError::InvalidLayerConfig(_))
        ));
    }

    #[test]
    fn test_predict_shape() {
        let model = FullyConnectedRegressor::<TestBackend>::new(
            2,
            3,
            FullyConnectedConfig::default(),
            Default::default(),
        )
        .unwrap();
        let prediction = model.predict(&[[0.1f32, 0.2], [0.3, -0.4]]).unwrap();
        assert_eq!(prediction.len(), 2);
        assert!(prediction.iter().all(|row| row.len() == 3));
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let model =
            FullyConnectedRegressor::<TestBackend>::new(2, 1, small_config(), Default::default())
                .unwrap();
        let result = model.predict(&[[0.1f32, 0.2, 0.3]]);
        assert!(matches!(result, Err(NNError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_fit_rejects_mismatched_rows() {
        let mut model =
            FullyConnectedRegressor::<TestBackend>::new(1, 1, small_config(), Default::default())
                .unwrap();
        let result = model.fit(&[[0.1f32], [0.2]], &[[1.0f32]]);
        assert!(matches!(result, Err(NNError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_softmax_output_is_a_distribution() {
        let config = small_config().with_output_activation(Activation::Softmax);
        let model =
            FullyConnectedRegressor::<TestBackend>::new(2, 3, config, Default::default()).unwrap();
        for row in model.predict(&[[0.5f32, -0.5], [1.0, 1.0]]).unwrap() {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_fit_reduces_loss() {
        TestBackend::seed(7);
        let mut model = FullyConnectedRegressor::<TestBackend>::new(
            1,
            1,
            small_config().with_learning_rate(1e-2),
            Default::default(),
        )
        .unwrap();
        let xs: Vec<[f32; 1]> = (0..16).map(|i| [i as f32 / 8.0 - 1.0]).collect();
        let ys: Vec<[f32; 1]> = xs.iter().map(|x| [0.5 * x[0] + 0.25]).collect();
        let first_loss = model.fit(&xs, &ys).unwrap();
        let mut last_loss = first_loss;
        for _ in 0..300 {
            last_loss = model.fit(&xs, &ys).unwrap();
        }
        assert!(last_loss < first_loss);
        assert!(last_loss < 0.01);
    }

    #[test]
    fn test_model_saving() {
        let path = std::env::temp_dir().join("rllearn_fully_connected_test");
        let model =
            FullyConnectedRegressor::<TestBackend>::new(2, 2, small_config(), Default::default())
                .unwrap();
        model.save(&path).unwrap();
        let mut loaded =
            FullyConnectedRegressor::<TestBackend>::new(2, 2, small_config(), Default::default())
                .unwrap();
        loaded.load(&path).unwrap();
        let input = [[0.3f32, -0.7]];
        let expected = model.predict(&input).unwrap();
        let received = loaded.predict(&input).unwrap();
        assert!(compare_outputs(&expected[0], &received[0]));
    }

    #[test]
    fn test_output_bias_trains() {
        let config = FullyConnectedConfig {
            hidden_layers: vec![],
            activations: vec![],
            use_biases: vec![],
            drop_out: 0.0,
            output_use_bias: true,
            learning_rate: 1e-1,
            ..Default::default()
        };
        let mut model =
            FullyConnectedRegressor::<TestBackend>::new(1, 1, config, Default::default()).unwrap();
        let before = model.predict(&[[0.0f32]]).unwrap()[0][0];
        for _ in 0..50 {
            model.fit(&[[0.0f32]], &[[5.0f32]]).unwrap();
        }
        let after = model.predict(&[[0.0f32]]).unwrap()[0][0];
        assert!(after > before + 1.0);
    }

    #[test]
    fn test_hidden_biases_train() {
        TestBackend::seed(3);
        let config = FullyConnectedConfig::default()
            .with_hidden_layers(vec![4], Activation::Identity)
            .with_drop_out(0.0)
            .with_learning_rate(1e-1);
        let mut model =
            FullyConnectedRegressor::<TestBackend>::new(1, 1, config, Default::default()).unwrap();
        let hidden_bias = |model: &FullyConnectedRegressor<TestBackend>| -> Vec<f32> {
            model.model.layers[0]
                .linear
                .bias
                .as_ref()
                .map(|bias| bias.val().into_data().iter::<f32>().collect())
                .unwrap_or_default()
        };
        let before = hidden_bias(&model);
        assert_eq!(before.len(), 4);
        for _ in 0..5 {
            model.fit(&[[0.0f32]], &[[3.0f32]]).unwrap();
        }
        assert_ne!(before, hidden_bias(&model));
    }
}
