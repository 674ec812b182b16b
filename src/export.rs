//! PNG grids, interpolation strips/GIFs and training curves.

use crate::data::{GlyphImages, PixelRange};
use crate::metrics::{EpochMetrics, MetricsHistory};
use crate::training::TrainingObserver;
use anyhow::{Context, Result};
use gif::{Encoder, Frame, Repeat};
use image::{DynamicImage, GenericImage, GrayImage, Luma};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Sample grids are always 5x5; missing tiles stay black.
pub const GRID_SIDE: usize = 5;

/// Map pixel values to bytes.
///
/// Raw images are clamped as-is. Otherwise the whole batch is treated as
/// [-1, 1] when any value is negative and as [0, 1] when none is.
pub fn to_display_bytes(values: &[f32], range: PixelRange) -> Vec<u8> {
    let scale: fn(f32) -> f32 = match range {
        PixelRange::Raw => |v| v,
        PixelRange::Normalized if values.iter().any(|&v| v < 0.0) => |v| v * 127.5 + 127.5,
        PixelRange::Normalized => |v| v * 255.0,
    };
    values
        .iter()
        .map(|&v| scale(v).round().clamp(0.0, 255.0) as u8)
        .collect()
}

/// One grayscale image per glyph, scaled for display.
pub fn to_gray_images(images: &GlyphImages) -> Vec<GrayImage> {
    let size = images.image_size() as u32;
    let bytes = to_display_bytes(images.as_slice(), images.range());
    let hw = images.image_size() * images.image_size();
    (0..images.len())
        .filter_map(|i| GrayImage::from_raw(size, size, bytes[i * hw..(i + 1) * hw].to_vec()))
        .collect()
}

/// Merge images into a fixed grid (rows x cols), row-major.
pub fn merge_images(images: &[GrayImage], rows: usize, cols: usize) -> Result<GrayImage> {
    let first = images.first().context("no images to merge")?;
    let (width, height) = first.dimensions();
    let mut out = GrayImage::from_pixel(width * cols as u32, height * rows as u32, Luma([0]));

    for (idx, img) in images.iter().enumerate().take(rows * cols) {
        let row = idx / cols;
        let col = idx % cols;
        out.copy_from(img, col as u32 * width, row as u32 * height)
            .context("failed to copy image into grid")?;
    }

    Ok(out)
}

/// Concatenate images horizontally.
pub fn concat_images_horiz(images: &[GrayImage]) -> Result<GrayImage> {
    let first = images.first().context("no images to concatenate")?;
    let height = first.height();
    let total_width: u32 = images.iter().map(|img| img.width()).sum();
    let mut out = GrayImage::new(total_width, height);

    let mut offset_x = 0;
    for img in images {
        out.copy_from(img, offset_x, 0)
            .context("failed to concatenate image")?;
        offset_x += img.width();
    }

    Ok(out)
}

/// Path of the grid written for `step`: `<dir>/<prefix>_<step:04>.png`.
pub fn grid_path(output_dir: &Path, prefix: &str, step: usize) -> PathBuf {
    output_dir.join(format!("{prefix}_{step:04}.png"))
}

/// Write the first 25 images as a 5x5 grid and return the file path.
pub fn save_image_grid(
    images: &GlyphImages,
    step: usize,
    output_dir: &Path,
    prefix: &str,
) -> Result<PathBuf> {
    let tiles = to_gray_images(images);
    let grid = merge_images(&tiles, GRID_SIDE, GRID_SIDE)?;
    let path = grid_path(output_dir, prefix, step);
    save_png(&grid, &path)?;
    Ok(path)
}

/// Save an interpolation sequence as one horizontal strip.
pub fn save_interpolation_strip(images: &GlyphImages, path: &Path) -> Result<()> {
    let strip = concat_images_horiz(&to_gray_images(images))?;
    save_png(&strip, path)
}

/// Save an interpolation sequence as a looping GIF, upscaled by `scale`.
pub fn save_interpolation_gif(images: &GlyphImages, path: &Path, scale: u32) -> Result<()> {
    let frames = to_gray_images(images);
    let first = frames.first().context("no frames to encode")?;
    let scale = scale.max(1);
    let (width, height) = (first.width() * scale, first.height() * scale);
    let (gif_width, gif_height) = (
        u16::try_from(width).context("gif too wide")?,
        u16::try_from(height).context("gif too tall")?,
    );

    create_parent(path)?;
    let mut file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut encoder = Encoder::new(&mut file, gif_width, gif_height, &[])?;
    encoder.set_repeat(Repeat::Infinite)?;

    for gray in frames {
        let resized = image::imageops::resize(
            &gray,
            width,
            height,
            image::imageops::FilterType::Nearest,
        );
        let rgb = DynamicImage::ImageLuma8(resized).to_rgb8();
        let mut frame = Frame::from_rgb(gif_width, gif_height, rgb.as_raw());
        frame.delay = 10;
        encoder.write_frame(&frame)?;
    }

    Ok(())
}

/// Two panels: both losses per epoch, and discriminator accuracy per epoch.
pub fn plot_training_history(
    g_losses: &[f64],
    d_losses: &[f64],
    d_accuracies: &[f64],
    path: &Path,
) -> Result<()> {
    if g_losses.len() != d_losses.len() || d_losses.len() != d_accuracies.len() {
        anyhow::bail!(
            "history series differ in length: g={}, d={}, acc={}",
            g_losses.len(),
            d_losses.len(),
            d_accuracies.len()
        );
    }
    create_parent(path)?;

    let root = BitMapBackend::new(path, (1200, 500)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let (left, right) = root.split_horizontally(600);
    draw_panel(
        &left,
        "Training Losses",
        "Loss",
        &[("Generator Loss", g_losses, BLUE), ("Discriminator Loss", d_losses, RED)],
    )?;
    draw_panel(
        &right,
        "Discriminator Accuracy",
        "Accuracy",
        &[("Discriminator Accuracy", d_accuracies, GREEN)],
    )?;
    root.present().map_err(plot_err)?;
    Ok(())
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    title: &str,
    y_desc: &str,
    series: &[(&str, &[f64], RGBColor)],
) -> Result<()> {
    let epochs = series.iter().map(|(_, values, _)| values.len()).max().unwrap_or(0);
    let (mut lo, mut hi) = series
        .iter()
        .flat_map(|(_, values, _)| values.iter().copied())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        (lo, hi) = (0.0, 1.0);
    } else if (hi - lo).abs() < f64::EPSILON {
        (lo, hi) = (lo - 0.5, hi + 0.5);
    }

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 20))
        .margin(15)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..epochs.max(1) as f64, lo..hi)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("Epoch")
        .y_desc(y_desc)
        .draw()
        .map_err(plot_err)?;

    for &(label, values, color) in series {
        chart
            .draw_series(LineSeries::new(
                values.iter().enumerate().map(|(i, &v)| (i as f64, v)),
                &color,
            ))
            .map_err(plot_err)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;
    Ok(())
}

fn plot_err<E: std::fmt::Debug>(err: E) -> anyhow::Error {
    anyhow::anyhow!("plotting failed: {err:?}")
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn save_png(image: &GrayImage, path: &Path) -> Result<()> {
    create_parent(path)?;
    image
        .save(path)
        .with_context(|| format!("failed to save {}", path.display()))
}

/// Writes sample grids during training and the history plot at the end.
#[derive(Clone, Debug)]
pub struct FileExporter {
    pub output_dir: PathBuf,
    pub prefix: String,
    pub history_plot: Option<PathBuf>,
}

impl FileExporter {
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            history_plot: None,
        }
    }

    pub fn with_history_plot(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_plot = Some(path.into());
        self
    }
}

impl TrainingObserver for FileExporter {
    fn on_epoch(&mut self, metrics: &EpochMetrics) {
        log::debug!("epoch {} metrics: {metrics:?}", metrics.epoch);
    }

    fn on_sample(&mut self, epoch: usize, images: &GlyphImages) -> Result<()> {
        let path = save_image_grid(images, epoch, &self.output_dir, &self.prefix)?;
        log::info!("saved samples to {}", path.display());
        Ok(())
    }

    fn on_complete(&mut self, history: &MetricsHistory) -> Result<()> {
        let Some(path) = &self.history_plot else {
            return Ok(());
        };
        plot_training_history(
            &history.g_losses(),
            &history.d_losses(),
            &history.d_accuracies(),
            path,
        )?;
        log::info!("saved training history to {}", path.display());
        Ok(())
    }
}
