use super::conv_transpose_out;
use crate::error::{GanError, GanResult};
use burn::nn::conv::{ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::leaky_relu;

/// Configuration for the latent-to-image generator.
#[derive(Config, Debug)]
pub struct GeneratorConfig {
    pub latent_dim: usize,
    pub generator_dim: usize,
    pub image_size: usize,
    #[config(default = 0.2)]
    pub leaky_slope: f64,
}

impl GeneratorConfig {
    /// Spatial size of the projected latent before upsampling.
    pub fn base_size(&self) -> usize {
        self.image_size / 4
    }

    /// Side length of the images this stack produces.
    pub fn output_resolution(&self) -> usize {
        let mut size = self.base_size();
        size = conv_transpose_out(size, 4, 2, 1);
        conv_transpose_out(size, 4, 2, 1)
    }

    /// Initialize generator layers on the given device.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        let base_size = self.base_size();
        let base_channels = self.generator_dim * 4;

        let project =
            LinearConfig::new(self.latent_dim, base_channels * base_size * base_size).init(device);
        let project_bn = BatchNormConfig::new(base_channels).init(device);

        let up_convs = vec![
            up_conv(base_channels, self.generator_dim * 2, false, device),
            up_conv(self.generator_dim * 2, 1, true, device),
        ];
        let up_bn = BatchNormConfig::new(self.generator_dim * 2).init(device);

        Generator {
            project,
            project_bn,
            up_convs,
            up_bn,
            latent_dim: self.latent_dim,
            base_channels,
            base_size,
            leaky_slope: self.leaky_slope,
        }
    }
}

/// DCGAN-style generator: dense projection, then two transposed convolutions.
#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    project: Linear<B>,
    project_bn: BatchNorm<B>,
    up_convs: Vec<ConvTranspose2d<B>>,
    up_bn: BatchNorm<B>,
    #[module(ignore)]
    latent_dim: usize,
    #[module(ignore)]
    base_channels: usize,
    #[module(ignore)]
    base_size: usize,
    #[module(ignore)]
    leaky_slope: f64,
}

impl<B: Backend> Generator<B> {
    /// Map `[batch, latent_dim]` noise to `[batch, 1, size, size]` images in [-1, 1].
    pub fn forward(&self, latent: Tensor<B, 2>) -> Tensor<B, 4> {
        let batch = latent.dims()[0];
        let x = self.project.forward(latent).reshape([
            batch,
            self.base_channels,
            self.base_size,
            self.base_size,
        ]);
        let x = leaky_relu(self.project_bn.forward(x), self.leaky_slope);
        let x = leaky_relu(
            self.up_bn.forward(self.up_convs[0].forward(x)),
            self.leaky_slope,
        );
        self.up_convs[1].forward(x).tanh()
    }

    /// Like [`Generator::forward`], but rejects latents of the wrong width.
    pub fn try_forward(&self, latent: Tensor<B, 2>) -> GanResult<Tensor<B, 4>> {
        let [_, width] = latent.dims();
        if width != self.latent_dim {
            return Err(GanError::config(format!(
                "latent width {width} does not match the generator's latent_dim {}",
                self.latent_dim
            )));
        }
        Ok(self.forward(latent))
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    pub fn image_size(&self) -> usize {
        self.base_size * 4
    }
}

fn up_conv<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    bias: bool,
    device: &B::Device,
) -> ConvTranspose2d<B> {
    ConvTranspose2dConfig::new([in_channels, out_channels], [4, 4])
        .with_stride([2, 2])
        .with_padding([1, 1])
        .with_bias(bias)
        .init(device)
}
