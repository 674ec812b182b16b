use super::conv_out;
use crate::error::{GanError, GanResult};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{
    BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::activation::{leaky_relu, sigmoid};

/// Configuration for the convolutional real/fake classifier.
#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    pub discriminator_dim: usize,
    pub image_size: usize,
    #[config(default = 0.2)]
    pub leaky_slope: f64,
    #[config(default = 0.3)]
    pub dropout: f64,
}

impl DiscriminatorConfig {
    /// Resolution whose downsampled features exactly fill the dense head.
    pub fn input_resolution(&self) -> usize {
        self.feature_size() * 4
    }

    fn feature_size(&self) -> usize {
        let mut size = self.image_size;
        size = conv_out(size, 4, 2, 1);
        conv_out(size, 4, 2, 1)
    }

    /// Initialize the discriminator layers on the given device.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Discriminator<B> {
        let convs = vec![
            conv(1, self.discriminator_dim, true, device),
            conv(self.discriminator_dim, self.discriminator_dim * 2, false, device),
        ];
        let bn = BatchNormConfig::new(self.discriminator_dim * 2).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();

        let size = self.feature_size();
        let flat_dim = size * size * self.discriminator_dim * 2;
        let fc = LinearConfig::new(flat_dim, 1).init(device);

        Discriminator {
            convs,
            bn,
            dropout,
            fc,
            image_size: self.image_size,
            leaky_slope: self.leaky_slope,
        }
    }
}

/// Discriminator scoring how likely an image came from the real dataset.
#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    convs: Vec<Conv2d<B>>,
    bn: BatchNorm<B>,
    dropout: Dropout,
    fc: Linear<B>,
    #[module(ignore)]
    image_size: usize,
    #[module(ignore)]
    leaky_slope: f64,
}

impl<B: Backend> Discriminator<B> {
    /// Raw logits of shape `[batch, 1]`.
    pub fn forward_logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = leaky_relu(self.convs[0].forward(images), self.leaky_slope);
        x = self.dropout.forward(x);
        x = leaky_relu(self.bn.forward(self.convs[1].forward(x)), self.leaky_slope);
        x = self.dropout.forward(x);

        let [batch, channels, height, width] = x.dims();
        let flat = x.reshape([batch, channels * height * width]);
        self.fc.forward(flat)
    }

    /// Probability in [0, 1] that each image is real.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.forward_logits(images))
    }

    /// Like [`Discriminator::forward`], but rejects images of the wrong shape.
    pub fn try_forward(&self, images: Tensor<B, 4>) -> GanResult<Tensor<B, 2>> {
        self.check_input(images.dims())?;
        Ok(self.forward(images))
    }

    pub fn check_input(&self, dims: [usize; 4]) -> GanResult<()> {
        let [_, channels, height, width] = dims;
        if channels != 1 || height != self.image_size || width != self.image_size {
            return Err(GanError::config(format!(
                "discriminator expects [_, 1, {0}, {0}] images, got {dims:?}",
                self.image_size
            )));
        }
        Ok(())
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }
}

fn conv<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    bias: bool,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [4, 4])
        .with_stride([2, 2])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_bias(bias)
        .init(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn output_is_a_probability_for_each_resolution() {
        let device = Default::default();
        for size in [8, 16, 28] {
            let discriminator = DiscriminatorConfig::new(4, size).init::<TestBackend>(&device);
            let images = Tensor::<TestBackend, 4>::random(
                [5, 1, size, size],
                Distribution::Uniform(-1.0, 1.0),
                &device,
            );
            let scores = discriminator.try_forward(images).unwrap();
            assert_eq!(scores.dims(), [5, 1]);
            let values = scores.into_data().to_vec::<f32>().unwrap();
            assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn saturated_inputs_stay_in_range() {
        let device = Default::default();
        let discriminator = DiscriminatorConfig::new(4, 8).init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 4>::full([2, 1, 8, 8], 1.0e4, &device);
        let values = discriminator.forward(images).into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn rejects_mismatched_shape() {
        let device = Default::default();
        let discriminator = DiscriminatorConfig::new(4, 16).init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 4>::zeros([1, 1, 8, 8], &device);
        assert!(matches!(
            discriminator.try_forward(images),
            Err(GanError::Configuration(_))
        ));
    }
}
