use anyhow::Result;
use clap::Parser;
use glyph_gan::data::{create_letter_dataset, render_charset};
use glyph_gan::export::save_image_grid;
use glyph_gan::font::GlyphFont;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Preview the synthesized glyph dataset")]
struct Args {
    /// Render noisy variations of this character.
    #[arg(long, default_value_t = 'A')]
    letter: char,
    /// Render one clean glyph per character instead (e.g. "ABCDEFG").
    #[arg(long)]
    charset: Option<String>,
    #[arg(long, default_value_t = 28)]
    img_size: usize,
    #[arg(long, default_value_t = 25.0)]
    noise_level: f64,
    #[arg(long)]
    font: Option<PathBuf>,
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let font = GlyphFont::load_or_builtin(args.font.as_deref());
    let dataset = match &args.charset {
        Some(chars) => {
            let chars: Vec<char> = chars.chars().filter(|c| !c.is_whitespace()).collect();
            render_charset(&chars, args.img_size, &font)?
        }
        None => {
            let mut rng = StdRng::seed_from_u64(args.seed);
            create_letter_dataset(args.letter, args.img_size, 25, args.noise_level, &font, &mut rng)?
        }
    };

    if dataset.is_empty() {
        anyhow::bail!("nothing to render");
    }
    let path = save_image_grid(&dataset.images, 0, &args.output_dir, "dataset")?;
    log::info!("saved {} glyphs to {}", dataset.len().min(25), path.display());
    Ok(())
}
