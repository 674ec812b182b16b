#![recursion_limit = "256"]
use anyhow::{Context, Result};
use burn::config::Config;
use clap::Parser;
use glyph_gan::backend::{self, Training};
use glyph_gan::checkpoint::CheckpointStore;
use glyph_gan::data::create_letter_dataset;
use glyph_gan::export::FileExporter;
use glyph_gan::font::GlyphFont;
use glyph_gan::model::ModelConfig;
use glyph_gan::training::{GanConfig, GanTrainer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Train a GAN to generate typographic characters")]
struct Args {
    /// Character to render for the training set.
    #[arg(long, default_value_t = 'A')]
    letter: char,
    #[arg(long, default_value_t = 28)]
    img_size: usize,
    #[arg(long, default_value_t = 1000)]
    num_samples: usize,
    #[arg(long, default_value_t = 5000)]
    epochs: usize,
    #[arg(long, default_value_t = 32)]
    batch_size: usize,
    /// Epochs between sample grids.
    #[arg(long, default_value_t = 100)]
    sample_interval: usize,
    /// Standard deviation of the per-pixel Gaussian noise, in [0, 255] units.
    #[arg(long, default_value_t = 25.0)]
    noise_level: f64,
    /// TrueType font; the built-in bitmap face is used when missing.
    #[arg(long)]
    font: Option<PathBuf>,
    #[arg(long, default_value_t = 100)]
    latent_dim: usize,
    /// Epochs between checkpoints (0 saves only the final epoch).
    #[arg(long, default_value_t = 0)]
    checkpoint_interval: usize,
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
    #[arg(long, default_value = "models")]
    models_dir: PathBuf,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Continue from the latest checkpoint in --models-dir.
    #[arg(long, default_value_t = false)]
    resume: bool,
    /// Training config JSON; overrides the model/training flags above.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => GanConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => config_from_args(&args),
    };

    let font = GlyphFont::load_or_builtin(args.font.as_deref());
    let mut rng = StdRng::seed_from_u64(config.seed);
    log::info!("creating dataset for letter '{}'", args.letter);
    let dataset = create_letter_dataset(
        args.letter,
        config.model.image_size,
        args.num_samples,
        args.noise_level,
        &font,
        &mut rng,
    )?;
    log::info!("dataset shape: {:?}", dataset.images.shape());

    let device = backend::Device::default();
    log::info!("using {} backend", backend::name());
    let store = CheckpointStore::new(&args.models_dir);
    let mut trainer = if args.resume {
        GanTrainer::<Training>::resume(config, store, device)?
    } else {
        GanTrainer::<Training>::new(config, device)?.with_checkpoints(store)?
    };

    let mut exporter = FileExporter::new(&args.output_dir, "letter")
        .with_history_plot(args.output_dir.join("training_history.png"));
    trainer.fit(&dataset, &mut rng, &mut exporter)?;

    if trainer.checkpoint_if_unsaved()? {
        log::info!(
            "saved models for epoch {} to {}",
            trainer.epoch(),
            args.models_dir.display()
        );
    }
    Ok(())
}

fn config_from_args(args: &Args) -> GanConfig {
    let model = ModelConfig::new(args.img_size).with_latent_dim(args.latent_dim);
    GanConfig::with_defaults(model, args.epochs, args.batch_size, args.sample_interval)
        .with_checkpoint_interval(args.checkpoint_interval)
        .with_seed(args.seed)
}
