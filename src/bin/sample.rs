#![recursion_limit = "256"]
use anyhow::{Context, Result};
use burn::config::Config;
use clap::Parser;
use glyph_gan::backend::{self, Inference};
use glyph_gan::checkpoint::CheckpointStore;
use glyph_gan::data::{GlyphImages, PixelRange};
use glyph_gan::export::{save_image_grid, save_interpolation_gif, save_interpolation_strip};
use glyph_gan::sampling::Sampler;
use glyph_gan::training::GanConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Generate glyphs from the latest checkpoint")]
struct Args {
    #[arg(long, default_value = "models")]
    models_dir: PathBuf,
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
    /// Images in the sample grid (0 skips the grid).
    #[arg(long, default_value_t = 25)]
    count: usize,
    /// Frames in the interpolation strip (0 skips interpolation).
    #[arg(long, default_value_t = 10)]
    steps: usize,
    /// Also write the interpolation as an animated GIF with this file name.
    #[arg(long)]
    output_gif: Option<String>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let store = CheckpointStore::new(&args.models_dir);
    let config_path = store.config_path();
    let config = GanConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let device = backend::Device::default();
    let (generator, epoch) = store
        .load_latest_generator::<Inference>(&config.model, &device)
        .context("failed to load generator checkpoint")?;
    log::info!("loaded generator from epoch {epoch} ({} backend)", backend::name());

    let sampler = Sampler::new(&generator);
    let mut rng = StdRng::seed_from_u64(args.seed);

    if args.count > 0 {
        let images = sampler.sample_images(args.count, &mut rng)?;
        let path = save_image_grid(&images, epoch, &args.output_dir, "sample")?;
        log::info!("saved samples to {}", path.display());
    }

    if args.steps > 0 {
        let path = sampler.interpolate(args.steps, &mut rng)?;
        let images = GlyphImages::from_tensor(path.images, PixelRange::Normalized)?;
        let strip = args.output_dir.join("interpolation.png");
        save_interpolation_strip(&images, &strip)?;
        log::info!("saved interpolation to {}", strip.display());

        if let Some(name) = &args.output_gif {
            let gif = args.output_dir.join(name);
            save_interpolation_gif(&images, &gif, 4)?;
            log::info!("saved animation to {}", gif.display());
        }
    }

    Ok(())
}
