use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer, SgdConfig},
    tensor::{backend::AutodiffBackend, Tensor},
    LearningRate,
};

/// Object safe view over a burn optimizer so that models can own one without naming the
/// adaptor types.
pub trait ModelOptimizer<M, B>: Send
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    fn step(&mut self, lr: LearningRate, module: M, grads: GradientsParams) -> M;
}

impl<M, B, O> ModelOptimizer<M, B> for O
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
    O: Optimizer<M, B>,
{
    fn step(&mut self, lr: LearningRate, module: M, grads: GradientsParams) -> M {
        Optimizer::step(self, lr, module, grads)
    }
}

pub type BoxedOptimizer<M, B> = Box<dyn ModelOptimizer<M, B>>;

pub fn adam<M, B>() -> BoxedOptimizer<M, B>
where
    M: AutodiffModule<B> + 'static,
    B: AutodiffBackend,
{
    let optimizer = AdamConfig::new().init::<B, M>();
    Box::new(optimizer)
}

pub fn sgd<M, B>() -> BoxedOptimizer<M, B>
where
    M: AutodiffModule<B> + 'static,
    B: AutodiffBackend,
{
    let optimizer = SgdConfig::new().init::<B, M>();
    Box::new(optimizer)
}

/// Backpropagates the scalar `loss` and applies one optimizer step to `module`.
pub fn minimize<M, B>(
    module: M,
    loss: Tensor<B, 1>,
    optimizer: &mut BoxedOptimizer<M, B>,
    lr: LearningRate,
) -> M
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    let grads = loss.backward();
    let gradient_params = GradientsParams::from_grads(grads, &module);
    ModelOptimizer::step(optimizer.as_mut(), lr, module, gradient_params)
}
