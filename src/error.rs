use std::fmt;
use thiserror::Error;

/// The two halves of an adversarial training step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Discriminator,
    Generator,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Discriminator => f.write_str("discriminator"),
            Phase::Generator => f.write_str("generator"),
        }
    }
}

/// Failures surfaced by the training engine and the sampler.
#[derive(Debug, Error)]
pub enum GanError {
    #[error("configuration error: {0}")]
    Configuration(String),
    /// `step` is the 1-based update index within `epoch`.
    #[error("{phase} loss diverged at epoch {epoch}, step {step} (loss = {loss})")]
    Divergence {
        phase: Phase,
        epoch: usize,
        step: usize,
        loss: f64,
    },
    #[error("checkpoint error: {0}")]
    Checkpoint(String),
    #[error("failed to read tensor data: {0}")]
    Tensor(String),
}

impl GanError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        GanError::Configuration(msg.into())
    }
}

pub type GanResult<T> = Result<T, GanError>;
