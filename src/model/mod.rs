pub mod discriminator;
pub mod generator;

use crate::error::{GanError, GanResult};
use burn::nn::loss::{BinaryCrossEntropyLoss, BinaryCrossEntropyLossConfig};
use burn::prelude::*;
use burn::tensor::activation::relu;

pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use generator::{Generator, GeneratorConfig};

/// Hyperparameters shared by the generator and discriminator.
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Side length of the square single-channel images.
    pub image_size: usize,
    #[config(default = 100)]
    pub latent_dim: usize,
    #[config(default = 64)]
    pub generator_dim: usize,
    #[config(default = 64)]
    pub discriminator_dim: usize,
    #[config(default = 0.2)]
    pub leaky_slope: f64,
    /// Dropout between discriminator layers; 0 disables it.
    #[config(default = 0.3)]
    pub dropout: f64,
}

impl ModelConfig {
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::new(self.latent_dim, self.generator_dim, self.image_size)
            .with_leaky_slope(self.leaky_slope)
    }

    pub fn discriminator_config(&self) -> DiscriminatorConfig {
        DiscriminatorConfig::new(self.discriminator_dim, self.image_size)
            .with_leaky_slope(self.leaky_slope)
            .with_dropout(self.dropout)
    }

    /// Reject shapes the two networks cannot agree on.
    pub fn validate(&self) -> GanResult<()> {
        if self.latent_dim == 0 || self.generator_dim == 0 || self.discriminator_dim == 0 {
            return Err(GanError::config(
                "latent_dim, generator_dim and discriminator_dim must be positive",
            ));
        }
        if self.image_size == 0 || self.image_size % 4 != 0 {
            return Err(GanError::config(format!(
                "image_size must be a positive multiple of 4, got {}",
                self.image_size
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(GanError::config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }

        let generated = self.generator_config().output_resolution();
        let accepted = self.discriminator_config().input_resolution();
        if generated != self.image_size || accepted != self.image_size {
            return Err(GanError::config(format!(
                "resolution mismatch: generator emits {generated}x{generated}, \
                 discriminator accepts {accepted}x{accepted}, images are {0}x{0}",
                self.image_size
            )));
        }
        Ok(())
    }

    pub fn init_generator<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        self.generator_config().init(device)
    }

    pub fn init_discriminator<B: Backend>(&self, device: &B::Device) -> Discriminator<B> {
        self.discriminator_config().init(device)
    }
}

/// Discriminator loss for one combined real+fake batch.
#[derive(Debug)]
pub struct DiscriminatorLoss<B: Backend> {
    pub loss: Tensor<B, 1>,
    pub logits: Tensor<B, 2>,
}

/// Score a real batch and a fake batch in a single forward pass.
///
/// Real images are stacked first, so the first `real.dims()[0]` rows of the
/// returned logits belong to real images. Hard or symmetrically smoothed
/// targets (`real_label + fake_label == 1`) go through burn's BCE loss;
/// one-sided smoothing such as 0.9 / 0.0 has no burn equivalent and uses
/// [`bce_with_logits`] on float targets.
pub fn discriminator_loss<B: Backend>(
    discriminator: &Discriminator<B>,
    real: Tensor<B, 4>,
    fake: Tensor<B, 4>,
    real_label: f64,
    fake_label: f64,
) -> DiscriminatorLoss<B> {
    let device = real.device();
    let real_count = real.dims()[0];
    let fake_count = fake.dims()[0];

    let images = Tensor::cat(vec![real, fake], 0);
    let logits = discriminator.forward_logits(images);

    let loss = match label_smoothing(real_label, fake_label) {
        Some(alpha) => {
            let targets = Tensor::cat(
                vec![
                    Tensor::<B, 1, Int>::ones([real_count], &device),
                    Tensor::<B, 1, Int>::zeros([fake_count], &device),
                ],
                0,
            );
            adversarial_loss(alpha, &device).forward(logits.clone().flatten::<1>(0, 1), targets)
        }
        None => {
            let targets = Tensor::cat(
                vec![
                    Tensor::<B, 2>::full([real_count, 1], real_label, &device),
                    Tensor::<B, 2>::full([fake_count, 1], fake_label, &device),
                ],
                0,
            );
            bce_with_logits(logits.clone(), targets)
        }
    };
    DiscriminatorLoss { loss, logits }
}

/// Non-saturating generator loss: the generator wants its fakes scored as real.
pub fn generator_loss<B: Backend>(
    generator: &Generator<B>,
    discriminator: &Discriminator<B>,
    latent: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let device = latent.device();
    let batch = latent.dims()[0];
    let fake = generator.forward(latent);
    let logits = discriminator.forward_logits(fake).flatten::<1>(0, 1);
    adversarial_loss(0.0, &device).forward(logits, Tensor::<B, 1, Int>::ones([batch], &device))
}

/// Smoothing factor `alpha` for which burn's binary targets become
/// `1 - alpha / 2` and `alpha / 2`, if the labels have that form.
pub fn label_smoothing(real_label: f64, fake_label: f64) -> Option<f32> {
    let symmetric = (real_label + fake_label - 1.0).abs() < 1e-6;
    (symmetric && real_label > fake_label).then(|| (2.0 * fake_label) as f32)
}

fn adversarial_loss<B: Backend>(alpha: f32, device: &B::Device) -> BinaryCrossEntropyLoss<B> {
    BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .with_smoothing((alpha > 0.0).then_some(alpha))
        .init(device)
}

/// Binary cross-entropy on logits against arbitrary soft targets.
///
/// Uses `max(x, 0) - x * t + log(1 + exp(-|x|))`, which stays finite for large
/// logits of either sign.
pub fn bce_with_logits<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_term = logits.clone().abs().neg().exp().log1p();
    relu(logits.clone())
        .sub(logits.mul(targets))
        .add(log_term)
        .mean()
}

/// Fraction of a stacked [real | fake] batch classified correctly.
pub fn classification_accuracy(logits: &[f32], real_count: usize) -> f64 {
    if logits.is_empty() {
        return 0.0;
    }
    let correct = logits
        .iter()
        .enumerate()
        .filter(|(idx, logit)| {
            if *idx < real_count {
                **logit > 0.0
            } else {
                **logit <= 0.0
            }
        })
        .count();
    correct as f64 / logits.len() as f64
}

pub(crate) fn conv_out(input: usize, kernel: usize, stride: usize, padding: usize) -> usize {
    (input + 2 * padding).saturating_sub(kernel) / stride + 1
}

pub(crate) fn conv_transpose_out(input: usize, kernel: usize, stride: usize, padding: usize) -> usize {
    (input.saturating_sub(1) * stride + kernel).saturating_sub(2 * padding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    fn logits(values: Vec<f32>) -> Tensor<TestBackend, 2> {
        let len = values.len();
        Tensor::from_data(TensorData::new(values, [len, 1]), &Default::default())
    }

    #[test]
    fn bce_matches_closed_form() {
        let device = Default::default();
        let loss = bce_with_logits(
            logits(vec![0.0, 2.0]),
            Tensor::<TestBackend, 2>::from_data(TensorData::new(vec![1.0f32, 0.0], [2, 1]), &device),
        );
        let expected = ((2.0f64).ln() + (1.0 + (2.0f64).exp()).ln()) / 2.0;
        let value = loss.into_scalar().elem::<f64>();
        assert!((value - expected).abs() < 1e-5, "{value} vs {expected}");
    }

    #[test]
    fn bce_stays_finite_for_extreme_logits() {
        let device = Default::default();
        let loss = bce_with_logits(
            logits(vec![-500.0, 500.0]),
            Tensor::<TestBackend, 2>::from_data(TensorData::new(vec![1.0f32, 0.0], [2, 1]), &device),
        );
        let value = loss.into_scalar().elem::<f64>();
        assert!(value.is_finite());
        assert!((value - 500.0).abs() < 1e-3);
    }

    #[test]
    fn label_smoothing_only_for_symmetric_labels() {
        assert_eq!(label_smoothing(1.0, 0.0), Some(0.0));
        let alpha = label_smoothing(0.9, 0.1).unwrap();
        assert!((alpha - 0.2).abs() < 1e-6);
        assert_eq!(label_smoothing(0.9, 0.0), None);
        assert_eq!(label_smoothing(0.5, 0.5), None);
    }

    fn small_discriminator() -> (Discriminator<TestBackend>, Tensor<TestBackend, 4>, Tensor<TestBackend, 4>) {
        let device = Default::default();
        let disc = DiscriminatorConfig::new(4, 8)
            .with_dropout(0.0)
            .init::<TestBackend>(&device);
        let real = Tensor::<TestBackend, 4>::from_data(
            TensorData::new((0..128).map(|i| (i as f32 / 64.0) - 1.0).collect::<Vec<_>>(), [2, 1, 8, 8]),
            &device,
        );
        let fake = real.clone().neg();
        (disc, real, fake)
    }

    #[test]
    fn discriminator_loss_matches_soft_target_bce() {
        let (disc, real, fake) = small_discriminator();
        for (real_label, fake_label) in [(1.0, 0.0), (0.9, 0.1), (0.9, 0.0)] {
            let DiscriminatorLoss { loss, logits } =
                discriminator_loss(&disc, real.clone(), fake.clone(), real_label, fake_label);
            let targets = Tensor::<TestBackend, 2>::from_data(
                TensorData::new(
                    vec![real_label as f32, real_label as f32, fake_label as f32, fake_label as f32],
                    [4, 1],
                ),
                &Default::default(),
            );
            let expected = bce_with_logits(logits, targets).into_scalar().elem::<f64>();
            let value = loss.into_scalar().elem::<f64>();
            assert!(
                (value - expected).abs() < 1e-5,
                "labels ({real_label}, {fake_label}): {value} vs {expected}"
            );
        }
    }

    #[test]
    fn smoothing_raises_the_loss_floor() {
        let (disc, real, fake) = small_discriminator();
        let hard = discriminator_loss(&disc, real.clone(), fake.clone(), 1.0, 0.0)
            .loss
            .into_scalar()
            .elem::<f64>();
        let soft = discriminator_loss(&disc, real, fake, 0.9, 0.1)
            .loss
            .into_scalar()
            .elem::<f64>();
        assert!(hard.is_finite() && soft.is_finite());
        assert_ne!(hard, soft);
    }

    #[test]
    fn accuracy_counts_real_then_fake() {
        // real: 1 right, 1 wrong; fake: 2 right
        let acc = classification_accuracy(&[0.3, -0.1, -2.0, -0.5], 2);
        assert!((acc - 0.75).abs() < 1e-12);
        assert_eq!(classification_accuracy(&[], 0), 0.0);
    }

    #[test]
    fn validate_rejects_non_multiple_of_four() {
        let err = ModelConfig::new(30).validate().unwrap_err();
        assert!(matches!(err, GanError::Configuration(_)));
        assert!(ModelConfig::new(28).validate().is_ok());
    }

    #[test]
    fn layer_arithmetic() {
        assert_eq!(conv_out(28, 4, 2, 1), 14);
        assert_eq!(conv_out(14, 4, 2, 1), 7);
        assert_eq!(conv_transpose_out(7, 4, 2, 1), 14);
        assert_eq!(conv_transpose_out(14, 4, 2, 1), 28);
    }
}
