use crate::data::{GlyphImages, PixelRange};
use crate::error::{GanError, GanResult};
use crate::model::Generator;
use burn::prelude::*;
use burn::tensor::TensorData;
use rand::Rng;
use rand_distr::StandardNormal;

/// Draw `count` standard-normal latent vectors as a `[count, latent_dim]` tensor.
pub fn latent_batch<B: Backend>(
    count: usize,
    latent_dim: usize,
    rng: &mut impl Rng,
    device: &B::Device,
) -> Tensor<B, 2> {
    let values: Vec<f32> = (0..count * latent_dim)
        .map(|_| rng.sample::<f32, _>(StandardNormal))
        .collect();
    Tensor::from_data(TensorData::new(values, [count, latent_dim]), device)
}

/// Latent points on the segment from `start` to `end` (both `[1, latent_dim]`).
///
/// Point `i` uses `alpha = i / (steps - 1)` and equals
/// `(1 - alpha) * start + alpha * end`, so the first point is `start` and the
/// last is `end`.
pub fn interpolate_latents<B: Backend>(
    start: Tensor<B, 2>,
    end: Tensor<B, 2>,
    steps: usize,
) -> GanResult<Tensor<B, 2>> {
    if steps < 2 {
        return Err(GanError::config(format!(
            "interpolation needs at least 2 steps, got {steps}"
        )));
    }
    if start.dims() != end.dims() || start.dims()[0] != 1 {
        return Err(GanError::config(format!(
            "interpolation endpoints must both be [1, latent_dim], got {:?} and {:?}",
            start.dims(),
            end.dims()
        )));
    }

    let last = (steps - 1) as f64;
    let points = (0..steps)
        .map(|i| lerp(start.clone(), end.clone(), i as f64 / last))
        .collect();
    Ok(Tensor::cat(points, 0))
}

fn lerp<B: Backend>(start: Tensor<B, 2>, end: Tensor<B, 2>, alpha: f64) -> Tensor<B, 2> {
    start.mul_scalar(1.0 - alpha).add(end.mul_scalar(alpha))
}

/// Latent path and the images generated along it.
#[derive(Debug, Clone)]
pub struct Interpolation<B: Backend> {
    pub latents: Tensor<B, 2>,
    pub images: Tensor<B, 4>,
}

/// Read-only view of a generator for drawing samples.
///
/// Holding a shared borrow means no optimizer step can run while sampling.
pub struct Sampler<'a, B: Backend> {
    generator: &'a Generator<B>,
}

impl<'a, B: Backend> Sampler<'a, B> {
    pub fn new(generator: &'a Generator<B>) -> Self {
        Self { generator }
    }

    /// Generate `count` images from fresh latent draws.
    pub fn sample(&self, count: usize, rng: &mut impl Rng) -> GanResult<Tensor<B, 4>> {
        if count == 0 {
            return Err(GanError::config("sample count must be positive"));
        }
        let device = self.device();
        let latent = latent_batch::<B>(count, self.generator.latent_dim(), rng, &device);
        self.generator.try_forward(latent)
    }

    /// [`Sampler::sample`], read back to the host in the network range.
    pub fn sample_images(&self, count: usize, rng: &mut impl Rng) -> GanResult<GlyphImages> {
        GlyphImages::from_tensor(self.sample(count, rng)?, PixelRange::Normalized)
    }

    /// Walk a straight line between two random latent points.
    ///
    /// The first endpoint is drawn before the second; image 0 is generated
    /// from the first draw and image `steps - 1` from the second.
    pub fn interpolate(&self, steps: usize, rng: &mut impl Rng) -> GanResult<Interpolation<B>> {
        if steps < 2 {
            return Err(GanError::config(format!(
                "interpolation needs at least 2 steps, got {steps}"
            )));
        }
        let device = self.device();
        let latent_dim = self.generator.latent_dim();
        let start = latent_batch::<B>(1, latent_dim, rng, &device);
        let end = latent_batch::<B>(1, latent_dim, rng, &device);

        let latents = interpolate_latents(start, end, steps)?;
        let images = self.generator.try_forward(latents.clone())?;
        Ok(Interpolation { latents, images })
    }

    fn device(&self) -> B::Device {
        self.generator.devices().into_iter().next().unwrap_or_default()
    }
}
