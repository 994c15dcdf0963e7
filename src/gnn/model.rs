//! Propagation classifier for node classification.
//!
//! Architecture: dropout → linear → ReLU, then `num_convs` propagation blocks
//! (dropout → block → ReLU), then dropout → linear to class logits.
//!
//! There is no autograd runtime, so the model records its own activations in
//! [`ForwardCache`] during training and differentiates them in [`NodeClassifier::backward`].

use crate::core::{Error, Result};
use crate::dataset::Graph;
use crate::gnn::adjacency::NormalizedAdjacency;
use crate::gnn::conv::{BlockCache, PropagationBlock};
use ndarray::{Array1, Array2, ArrayViewD, ArrayViewMutD, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Architecture hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Input feature width
    pub feature_width: usize,
    /// Number of output classes
    pub num_classes: usize,
    /// Number of propagation blocks
    pub num_convs: usize,
    /// Hidden width
    pub hidden: usize,
    /// Initial-residual weight
    pub alpha: f32,
    /// Identity-mapping strength
    pub theta: f32,
    /// Dropout probability (training only)
    pub dropout: f32,
}

impl ModelConfig {
    /// Create a config with the default smoothing and dropout settings.
    pub fn new(feature_width: usize, num_classes: usize, num_convs: usize, hidden: usize) -> Self {
        Self {
            feature_width,
            num_classes,
            num_convs,
            hidden,
            alpha: 0.5,
            theta: 0.7,
            dropout: 0.5,
        }
    }

    /// Set alpha.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set theta.
    pub fn with_theta(mut self, theta: f32) -> Self {
        self.theta = theta;
        self
    }

    /// Set dropout.
    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.feature_width == 0 || self.num_classes == 0 || self.hidden == 0 {
            return Err(Error::InvalidConfig(
                "feature_width, num_classes and hidden must be positive".to_string(),
            ));
        }
        if self.num_convs == 0 {
            return Err(Error::InvalidConfig("num_convs must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::InvalidConfig(format!("alpha {} not in [0, 1]", self.alpha)));
        }
        if self.theta <= 0.0 {
            return Err(Error::InvalidConfig(format!("theta {} must be positive", self.theta)));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::InvalidConfig(format!(
                "dropout {} not in [0, 1)",
                self.dropout
            )));
        }
        Ok(())
    }
}

/// Learnable parameters. Gradients share this shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub w_in: Array2<f32>,
    pub b_in: Array1<f32>,
    pub convs: Vec<Array2<f32>>,
    pub w_out: Array2<f32>,
    pub b_out: Array1<f32>,
}

impl ModelParams {
    /// Glorot-uniform weights and zero biases.
    pub fn init<R: Rng + ?Sized>(config: &ModelConfig, rng: &mut R) -> Self {
        let mut glorot = |rows: usize, cols: usize| {
            let limit = (6.0 / (rows + cols) as f32).sqrt();
            Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-limit..limit))
        };
        let w_in = glorot(config.feature_width, config.hidden);
        let convs = (0..config.num_convs)
            .map(|_| glorot(config.hidden, config.hidden))
            .collect();
        let w_out = glorot(config.hidden, config.num_classes);

        Self {
            w_in,
            b_in: Array1::zeros(config.hidden),
            convs,
            w_out,
            b_out: Array1::zeros(config.num_classes),
        }
    }

    /// All-zero parameters with the same shapes.
    pub fn zeros_like(&self) -> Self {
        Self {
            w_in: Array2::zeros(self.w_in.raw_dim()),
            b_in: Array1::zeros(self.b_in.raw_dim()),
            convs: self.convs.iter().map(|w| Array2::zeros(w.raw_dim())).collect(),
            w_out: Array2::zeros(self.w_out.raw_dim()),
            b_out: Array1::zeros(self.b_out.raw_dim()),
        }
    }

    /// Read-only views over every tensor, in a fixed order.
    pub fn tensors(&self) -> Vec<ArrayViewD<'_, f32>> {
        let mut views = vec![self.w_in.view().into_dyn(), self.b_in.view().into_dyn()];
        views.extend(self.convs.iter().map(|w| w.view().into_dyn()));
        views.push(self.w_out.view().into_dyn());
        views.push(self.b_out.view().into_dyn());
        views
    }

    /// Mutable views over every tensor, in the same order as [`ModelParams::tensors`].
    pub fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        let mut views = vec![
            self.w_in.view_mut().into_dyn(),
            self.b_in.view_mut().into_dyn(),
        ];
        views.extend(self.convs.iter_mut().map(|w| w.view_mut().into_dyn()));
        views.push(self.w_out.view_mut().into_dyn());
        views.push(self.b_out.view_mut().into_dyn());
        views
    }

    /// Total number of scalar parameters.
    pub fn num_parameters(&self) -> usize {
        self.tensors().iter().map(|t| t.len()).sum()
    }

    /// Whether every parameter is finite.
    pub fn is_finite(&self) -> bool {
        self.tensors().iter().all(|t| t.iter().all(|v| v.is_finite()))
    }
}

/// Activations recorded by a training forward pass.
#[derive(Clone, Debug)]
pub struct ForwardCache {
    adjacency: NormalizedAdjacency,
    input: Array2<f32>,
    pre_input: Array2<f32>,
    initial: Array2<f32>,
    blocks: Vec<BlockCache>,
    output_mask: Option<Array2<f32>>,
    last_hidden: Array2<f32>,
}

/// Deep propagation network producing per-node class logits.
#[derive(Clone, Debug)]
pub struct NodeClassifier {
    config: ModelConfig,
    params: ModelParams,
}

impl NodeClassifier {
    /// Create a model with randomly initialized parameters.
    pub fn new(config: ModelConfig) -> Result<Self> {
        Self::seeded(config, rand::thread_rng().gen())
    }

    /// Create a model with parameters drawn from a fixed seed.
    pub fn seeded(config: ModelConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let params = ModelParams::init(&config, &mut rng);
        Ok(Self { config, params })
    }

    /// Architecture of this model.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Current parameters.
    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Mutable parameters, for optimizers.
    pub fn params_mut(&mut self) -> &mut ModelParams {
        &mut self.params
    }

    /// Replace the parameters; shapes must match the architecture.
    pub fn load_params(&mut self, params: ModelParams) -> Result<()> {
        let expected = self.params.tensors();
        let given = params.tensors();
        let same_shape = expected.len() == given.len()
            && expected.iter().zip(given.iter()).all(|(a, b)| a.shape() == b.shape());
        if !same_shape {
            return Err(Error::CheckpointIo(
                "parameter shapes do not match the model architecture".to_string(),
            ));
        }
        self.params = params;
        Ok(())
    }

    /// Inference forward pass (no dropout). Returns `N x num_classes` logits.
    pub fn forward(&self, graph: &Graph) -> Result<Array2<f32>> {
        self.check_input(graph)?;
        let adjacency = NormalizedAdjacency::from_graph(graph);

        let mut pre_input = graph.features.dot(&self.params.w_in);
        pre_input += &self.params.b_in;
        let initial = relu(&pre_input);

        let mut h = initial.clone();
        for (l, weight) in self.params.convs.iter().enumerate() {
            let block = PropagationBlock::new(weight, self.config.alpha, self.config.theta, l + 1);
            let (_, z) = block.forward(&adjacency, &h, &initial);
            h = relu(&z);
        }

        let mut logits = h.dot(&self.params.w_out);
        logits += &self.params.b_out;
        Ok(logits)
    }

    /// Training forward pass with dropout; keeps activations for [`NodeClassifier::backward`].
    pub fn forward_train<R: Rng + ?Sized>(
        &self,
        graph: &Graph,
        rng: &mut R,
    ) -> Result<(Array2<f32>, ForwardCache)> {
        self.check_input(graph)?;
        let adjacency = NormalizedAdjacency::from_graph(graph);

        let input = self.dropout(&graph.features, rng).0;
        let mut pre_input = input.dot(&self.params.w_in);
        pre_input += &self.params.b_in;
        let initial = relu(&pre_input);

        let mut h = initial.clone();
        let mut blocks = Vec::with_capacity(self.params.convs.len());
        for (l, weight) in self.params.convs.iter().enumerate() {
            let (dropped, mask) = self.dropout(&h, rng);
            let block = PropagationBlock::new(weight, self.config.alpha, self.config.theta, l + 1);
            let (mixed, z) = block.forward(&adjacency, &dropped, &initial);
            h = relu(&z);
            blocks.push(BlockCache {
                mask,
                mixed,
                pre_activation: z,
            });
        }

        let (last_hidden, output_mask) = self.dropout(&h, rng);
        let mut logits = last_hidden.dot(&self.params.w_out);
        logits += &self.params.b_out;

        let cache = ForwardCache {
            adjacency,
            input,
            pre_input,
            initial,
            blocks,
            output_mask,
            last_hidden,
        };
        Ok((logits, cache))
    }

    /// Parameter gradients given `dL/dlogits` for the pass that produced `cache`.
    pub fn backward(&self, cache: &ForwardCache, dlogits: &Array2<f32>) -> ModelParams {
        let mut grads = self.params.zeros_like();

        grads.w_out = cache.last_hidden.t().dot(dlogits);
        grads.b_out = dlogits.sum_axis(Axis(0));
        let mut dh = dlogits.dot(&self.params.w_out.t());
        if let Some(mask) = &cache.output_mask {
            dh *= mask;
        }

        let mut dinitial = Array2::<f32>::zeros(cache.initial.raw_dim());
        for (l, (weight, block_cache)) in self
            .params
            .convs
            .iter()
            .zip(cache.blocks.iter())
            .enumerate()
            .rev()
        {
            let block = PropagationBlock::new(weight, self.config.alpha, self.config.theta, l + 1);
            relu_backward(&mut dh, &block_cache.pre_activation);
            let block_grads = block.backward(&cache.adjacency, &block_cache.mixed, &dh);

            grads.convs[l] = block_grads.weight;
            dinitial += &block_grads.initial;
            dh = block_grads.input;
            if let Some(mask) = &block_cache.mask {
                dh *= mask;
            }
        }

        dh += &dinitial;
        relu_backward(&mut dh, &cache.pre_input);
        grads.w_in = cache.input.t().dot(&dh);
        grads.b_in = dh.sum_axis(Axis(0));
        grads
    }

    fn check_input(&self, graph: &Graph) -> Result<()> {
        if graph.feature_width() != self.config.feature_width {
            return Err(Error::DataIntegrity(format!(
                "graph has {} features, model expects {}",
                graph.feature_width(),
                self.config.feature_width
            )));
        }
        Ok(())
    }

    fn dropout<R: Rng + ?Sized>(
        &self,
        x: &Array2<f32>,
        rng: &mut R,
    ) -> (Array2<f32>, Option<Array2<f32>>) {
        let p = self.config.dropout;
        if p <= 0.0 {
            return (x.clone(), None);
        }
        let keep = 1.0 - p;
        let mask = Array2::from_shape_fn(x.raw_dim(), |_| {
            if rng.gen::<f32>() < keep {
                1.0 / keep
            } else {
                0.0
            }
        });
        (x * &mask, Some(mask))
    }
}

impl std::fmt::Display for NodeClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NodeClassifier(in={}, hidden={}, convs={}, classes={}, ",
            self.config.feature_width,
            self.config.hidden,
            self.config.num_convs,
            self.config.num_classes,
        )?;
        write!(
            f,
            "alpha={}, theta={}, dropout={}, params={})",
            self.config.alpha,
            self.config.theta,
            self.config.dropout,
            self.params.num_parameters()
        )
    }
}

fn relu(x: &Array2<f32>) -> Array2<f32> {
    x.mapv(|v| v.max(0.0))
}

fn relu_backward(grad: &mut Array2<f32>, pre_activation: &Array2<f32>) {
    grad.zip_mut_with(pre_activation, |g, &z| {
        if z <= 0.0 {
            *g = 0.0;
        }
    });
}
