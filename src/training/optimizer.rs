//! Parameter update rules.

use crate::core::{Error, Result};
use crate::gnn::ModelParams;
use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};

/// An update rule applied once per mini-batch.
pub trait Optimizer: Send {
    /// Apply one update using `grads`.
    fn step(&mut self, params: &mut ModelParams, grads: &ModelParams) -> Result<()>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Configuration for Adadelta.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdadeltaConfig {
    pub learning_rate: f32,
    pub rho: f32,
    pub epsilon: f32,
    pub weight_decay: f32,
}

impl Default for AdadeltaConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            rho: 0.9,
            epsilon: 1e-6,
            weight_decay: 0.0,
        }
    }
}

/// Adadelta (Zeiler, 2012).
pub struct Adadelta {
    config: AdadeltaConfig,
    square_avg: Vec<ArrayD<f32>>,
    delta_avg: Vec<ArrayD<f32>>,
}

impl Adadelta {
    /// Create a new optimizer.
    pub fn new(config: AdadeltaConfig) -> Self {
        Self {
            config,
            square_avg: Vec::new(),
            delta_avg: Vec::new(),
        }
    }
}

impl Default for Adadelta {
    fn default() -> Self {
        Self::new(AdadeltaConfig::default())
    }
}

impl Optimizer for Adadelta {
    fn step(&mut self, params: &mut ModelParams, grads: &ModelParams) -> Result<()> {
        check_shapes(params, grads)?;
        if self.square_avg.is_empty() {
            self.square_avg = grads.tensors().iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
            self.delta_avg = self.square_avg.clone();
        }

        let AdadeltaConfig {
            learning_rate,
            rho,
            epsilon,
            weight_decay,
        } = self.config;

        for (((p, g), sq), acc) in params
            .tensors_mut()
            .into_iter()
            .zip(grads.tensors())
            .zip(self.square_avg.iter_mut())
            .zip(self.delta_avg.iter_mut())
        {
            Zip::from(p)
                .and(&g)
                .and(sq)
                .and(acc)
                .for_each(|p, &g, sq, acc| {
                    let g = g + weight_decay * *p;
                    *sq = rho * *sq + (1.0 - rho) * g * g;
                    let delta = ((*acc + epsilon).sqrt() / (*sq + epsilon).sqrt()) * g;
                    *acc = rho * *acc + (1.0 - rho) * delta * delta;
                    *p -= learning_rate * delta;
                });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "adadelta"
    }
}

/// Stochastic gradient descent with optional momentum.
pub struct Sgd {
    learning_rate: f32,
    momentum: f32,
    velocity: Vec<ArrayD<f32>>,
}

impl Sgd {
    /// Create a new optimizer.
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            momentum: 0.0,
            velocity: Vec::new(),
        }
    }

    /// Set momentum.
    pub fn with_momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut ModelParams, grads: &ModelParams) -> Result<()> {
        check_shapes(params, grads)?;
        if self.velocity.is_empty() {
            self.velocity = grads.tensors().iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
        }

        let (lr, momentum) = (self.learning_rate, self.momentum);
        for ((p, g), v) in params
            .tensors_mut()
            .into_iter()
            .zip(grads.tensors())
            .zip(self.velocity.iter_mut())
        {
            Zip::from(p).and(&g).and(v).for_each(|p, &g, v| {
                *v = momentum * *v + g;
                *p -= lr * *v;
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sgd"
    }
}

fn check_shapes(params: &ModelParams, grads: &ModelParams) -> Result<()> {
    let p = params.tensors();
    let g = grads.tensors();
    if p.len() != g.len() || p.iter().zip(g.iter()).any(|(a, b)| a.shape() != b.shape()) {
        return Err(Error::InvalidConfig(
            "gradient shapes do not match parameter shapes".to_string(),
        ));
    }
    Ok(())
}
