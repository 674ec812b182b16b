use crate::error::{GanError, GanResult};
use crate::font::GlyphFont;
use anyhow::Result;
use burn::prelude::*;
use burn::tensor::TensorData;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Numeric convention of the pixel values held by a [`GlyphImages`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelRange {
    /// Raw 8-bit intensities in [0, 255].
    Raw,
    /// Network range [-1, 1].
    Normalized,
}

/// A batch of square single-channel images laid out as (N, H, W, 1).
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphImages {
    data: Vec<f32>,
    count: usize,
    size: usize,
    range: PixelRange,
}

impl GlyphImages {
    /// Wrap row-major pixels; `data.len()` must equal `count * size * size`.
    pub fn new(data: Vec<f32>, count: usize, size: usize, range: PixelRange) -> GanResult<Self> {
        if data.len() != count * size * size {
            return Err(GanError::config(format!(
                "expected {count}x{size}x{size}x1 = {} pixels, got {}",
                count * size * size,
                data.len()
            )));
        }
        Ok(Self {
            data,
            count,
            size,
            range,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn image_size(&self) -> usize {
        self.size
    }

    pub fn range(&self) -> PixelRange {
        self.range
    }

    /// (N, H, W, C) with C always 1.
    pub fn shape(&self) -> [usize; 4] {
        [self.count, self.size, self.size, 1]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Pixels of image `index`, row-major.
    pub fn image(&self, index: usize) -> &[f32] {
        let hw = self.size * self.size;
        &self.data[index * hw..(index + 1) * hw]
    }

    pub fn min_value(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Convert raw intensities to the network range; already-normalized
    /// images are returned unchanged.
    pub fn normalized(&self) -> Self {
        match self.range {
            PixelRange::Normalized => self.clone(),
            PixelRange::Raw => Self {
                data: self.data.iter().map(|&v| v / 127.5 - 1.0).collect(),
                count: self.count,
                size: self.size,
                range: PixelRange::Normalized,
            },
        }
    }

    /// Copy the images at `indices` into a `[batch, 1, H, W]` tensor.
    pub fn gather<B: Backend>(&self, indices: &[usize], device: &B::Device) -> Tensor<B, 4> {
        let hw = self.size * self.size;
        let mut batch = Vec::with_capacity(indices.len() * hw);
        for &idx in indices {
            batch.extend_from_slice(self.image(idx));
        }
        Tensor::from_data(
            TensorData::new(batch, [indices.len(), 1, self.size, self.size]),
            device,
        )
    }

    /// Whole set as a `[N, 1, H, W]` tensor.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        Tensor::from_data(
            TensorData::new(self.data.clone(), [self.count, 1, self.size, self.size]),
            device,
        )
    }

    /// Read a `[N, 1, H, W]` tensor back to the host.
    pub fn from_tensor<B: Backend>(tensor: Tensor<B, 4>, range: PixelRange) -> GanResult<Self> {
        let [count, channels, height, width] = tensor.dims();
        if channels != 1 || height != width {
            return Err(GanError::config(format!(
                "expected square single-channel images, got [{count}, {channels}, {height}, {width}]"
            )));
        }
        let data = tensor
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|err| GanError::Tensor(format!("{err:?}")))?;
        Self::new(data, count, height, range)
    }
}

/// Rendered glyph images with optional per-image character labels.
#[derive(Clone, Debug)]
pub struct GlyphDataset {
    pub images: GlyphImages,
    pub labels: Option<Vec<char>>,
}

impl GlyphDataset {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Render `num_samples` noisy variations of one character.
///
/// Each sample is the same centered glyph plus independent Gaussian pixel
/// noise with standard deviation `noise_level`, clipped to [0, 255].
pub fn create_letter_dataset(
    letter: char,
    img_size: usize,
    num_samples: usize,
    noise_level: f64,
    font: &GlyphFont,
    rng: &mut impl Rng,
) -> Result<GlyphDataset> {
    if img_size == 0 {
        return Err(anyhow::anyhow!("image size must be positive"));
    }
    if !(noise_level.is_finite() && noise_level >= 0.0) {
        return Err(anyhow::anyhow!(
            "noise level must be finite and non-negative, got {noise_level}"
        ));
    }
    let noise = Normal::new(0.0f32, noise_level as f32)
        .map_err(|err| anyhow::anyhow!("invalid noise level {noise_level}: {err}"))?;

    let clean = font.render(letter, img_size);
    let mut data = Vec::with_capacity(num_samples * clean.len());
    for _ in 0..num_samples {
        data.extend(
            clean
                .iter()
                .map(|&v| (v + noise.sample(rng)).clamp(0.0, 255.0)),
        );
    }

    let images = GlyphImages::new(data, num_samples, img_size, PixelRange::Raw)?;
    Ok(GlyphDataset {
        images,
        labels: Some(vec![letter; num_samples]),
    })
}

/// Render one clean image per character, labelled with that character.
pub fn render_charset(chars: &[char], img_size: usize, font: &GlyphFont) -> Result<GlyphDataset> {
    let mut data = Vec::with_capacity(chars.len() * img_size * img_size);
    for &ch in chars {
        data.extend(font.render(ch, img_size));
    }
    let images = GlyphImages::new(data, chars.len(), img_size, PixelRange::Raw)?;
    Ok(GlyphDataset {
        images,
        labels: Some(chars.to_vec()),
    })
}
