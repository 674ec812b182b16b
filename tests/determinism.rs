// Kept in its own test binary: the backend RNG behind dropout is process-wide,
// so concurrent tests in the same process would interleave draws from it.

use burn::backend::{Autodiff, NdArray};
use glyph_gan::data::create_letter_dataset;
use glyph_gan::font::GlyphFont;
use glyph_gan::model::ModelConfig;
use glyph_gan::training::{GanConfig, GanTrainer};
use rand::rngs::StdRng;
use rand::SeedableRng;

type TestBackend = Autodiff<NdArray<f32>>;

#[test]
fn same_rng_same_losses_with_dropout() {
    let model = ModelConfig::new(8)
        .with_latent_dim(8)
        .with_generator_dim(4)
        .with_discriminator_dim(4);
    assert!(model.dropout > 0.0);
    let config = GanConfig::with_defaults(model, 1, 4, 0);
    let trainer = GanTrainer::<TestBackend>::new(config, Default::default()).unwrap();

    let mut rng = StdRng::seed_from_u64(1);
    let images = create_letter_dataset('A', 8, 16, 10.0, &GlyphFont::Builtin, &mut rng)
        .unwrap()
        .images
        .normalized();

    let mut first = trainer.clone();
    let mut second = trainer;
    let mut first_rng = StdRng::seed_from_u64(9);
    let mut second_rng = StdRng::seed_from_u64(9);
    for step in 1..=3 {
        let a = first.train_step(&images, 1, step, &mut first_rng).unwrap();
        let b = second.train_step(&images, 1, step, &mut second_rng).unwrap();
        assert_eq!(a, b, "step {step}");
    }
}
