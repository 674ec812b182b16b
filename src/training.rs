use crate::checkpoint::{CheckpointPart, CheckpointStore, TrainingState};
use crate::data::{GlyphDataset, GlyphImages};
use crate::error::{GanError, GanResult, Phase};
use crate::metrics::{EpochAccumulator, EpochMetrics, MetricsHistory};
use crate::model::{
    classification_accuracy, discriminator_loss, generator_loss, Discriminator, DiscriminatorLoss,
    Generator, ModelConfig,
};
use crate::sampling::{latent_batch, Sampler};
use burn::config::Config;
use burn::module::{AutodiffModule, ModuleVisitor, Param};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::Rng;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Training configuration, saved as `config.json` next to checkpoints.
#[derive(Config, Debug)]
pub struct GanConfig {
    pub model: ModelConfig,
    pub num_epochs: usize,
    pub batch_size: usize,
    /// Epochs between sample grids; 0 disables sampling.
    pub sample_interval: usize,
    pub optimizer_gen: AdamConfig,
    pub optimizer_disc: AdamConfig,
    /// Alternating D/G updates per epoch.
    #[config(default = 1)]
    pub steps_per_epoch: usize,
    #[config(default = 25)]
    pub sample_count: usize,
    /// Epochs between checkpoints; 0 disables checkpointing.
    #[config(default = 0)]
    pub checkpoint_interval: usize,
    #[config(default = 0.0002)]
    pub learning_rate: f64,
    /// Discriminator target for real images (e.g. 0.9 for one-sided smoothing).
    #[config(default = 1.0)]
    pub real_label: f64,
    #[config(default = 0.0)]
    pub fake_label: f64,
    /// Also checkpoint Adam moments, so a resumed run continues exactly.
    #[config(default = true)]
    pub persist_optimizer: bool,
    #[config(default = 42)]
    pub seed: u64,
}

impl GanConfig {
    /// Adam with the usual GAN momentum (beta_1 = 0.5).
    pub fn default_optimizer() -> AdamConfig {
        AdamConfig::new().with_beta_1(0.5)
    }

    /// Configuration with default optimizers for both networks.
    pub fn with_defaults(
        model: ModelConfig,
        num_epochs: usize,
        batch_size: usize,
        sample_interval: usize,
    ) -> Self {
        Self::new(
            model,
            num_epochs,
            batch_size,
            sample_interval,
            Self::default_optimizer(),
            Self::default_optimizer(),
        )
    }

    pub fn validate(&self) -> GanResult<()> {
        self.model.validate()?;
        if self.batch_size == 0 {
            return Err(GanError::config("batch_size must be positive"));
        }
        if self.steps_per_epoch == 0 {
            return Err(GanError::config("steps_per_epoch must be positive"));
        }
        if self.sample_interval > 0 && self.sample_count == 0 {
            return Err(GanError::config("sample_count must be positive when sampling"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(GanError::config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        for (name, label) in [("real_label", self.real_label), ("fake_label", self.fake_label)] {
            if !(0.0..=1.0).contains(&label) {
                return Err(GanError::config(format!("{name} must be in [0, 1], got {label}")));
            }
        }
        Ok(())
    }
}

/// Parameter groups that can be updated independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamGroup {
    Generator,
    Discriminator,
}

impl Phase {
    /// The only group updated during this phase; the other stays frozen.
    pub fn trainable(self) -> ParamGroup {
        match self {
            Phase::Discriminator => ParamGroup::Discriminator,
            Phase::Generator => ParamGroup::Generator,
        }
    }
}

/// Lifecycle of a [`GanTrainer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainerState {
    Uninitialized,
    Ready,
    TrainingStep { epoch: usize },
    Sampling { epoch: usize },
    Checkpointing { epoch: usize },
    Completed { epoch: usize },
    /// `phase` is `None` for failures outside a D/G update.
    Failed { phase: Option<Phase>, epoch: usize },
}

impl TrainerState {
    fn can_enter(self, next: TrainerState) -> bool {
        use TrainerState::*;
        match (self, next) {
            (_, Failed { .. }) => !matches!(self, Failed { .. } | Completed { .. }),
            (Uninitialized, Ready) => true,
            (Ready, TrainingStep { .. } | Completed { .. }) => true,
            (TrainingStep { .. }, TrainingStep { .. } | Sampling { .. } | Checkpointing { .. }) => true,
            (TrainingStep { .. }, Completed { .. }) => true,
            (Sampling { .. }, TrainingStep { .. } | Checkpointing { .. } | Completed { .. }) => true,
            (Checkpointing { .. }, TrainingStep { .. } | Completed { .. }) => true,
            _ => false,
        }
    }
}

/// Cooperative stop request, honored at the next epoch boundary.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives the trainer's periodic output.
///
/// Errors returned here are logged and never abort training.
pub trait TrainingObserver {
    fn on_epoch(&mut self, _metrics: &EpochMetrics) {}

    fn on_sample(&mut self, _epoch: usize, _images: &GlyphImages) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_complete(&mut self, _history: &MetricsHistory) -> anyhow::Result<()> {
        Ok(())
    }
}

impl TrainingObserver for () {}

/// Both networks, visited together when routing gradients.
#[derive(Module, Debug)]
pub struct GlyphGan<B: Backend> {
    pub generator: Generator<B>,
    pub discriminator: Discriminator<B>,
}

impl<B: Backend> GlyphGan<B> {
    pub fn new(config: &ModelConfig, device: &B::Device) -> Self {
        Self {
            generator: config.init_generator(device),
            discriminator: config.init_discriminator(device),
        }
    }
}

type GenOptimizer<B> = OptimizerAdaptor<Adam, Generator<B>, B>;
type DiscOptimizer<B> = OptimizerAdaptor<Adam, Discriminator<B>, B>;
type GenOptimRecord<B> = <GenOptimizer<B> as Optimizer<Generator<B>, B>>::Record;
type DiscOptimRecord<B> = <DiscOptimizer<B> as Optimizer<Discriminator<B>, B>>::Record;

/// Losses from one alternating D/G update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepLosses {
    pub d_loss: f64,
    pub d_accuracy: f64,
    pub g_loss: f64,
}

/// Owns the generator/discriminator pair and runs the alternating updates.
#[derive(Clone)]
pub struct GanTrainer<B: AutodiffBackend> {
    config: GanConfig,
    model: GlyphGan<B>,
    optim_gen: GenOptimizer<B>,
    optim_disc: DiscOptimizer<B>,
    history: MetricsHistory,
    /// Last completed epoch.
    epoch: usize,
    /// Epoch of the most recent checkpoint written or restored.
    last_checkpoint: Option<usize>,
    state: TrainerState,
    checkpoints: Option<CheckpointStore>,
    stop: StopSignal,
    device: B::Device,
}

impl<B: AutodiffBackend> GanTrainer<B> {
    /// Validate the configuration and build both networks and optimizers.
    pub fn new(config: GanConfig, device: B::Device) -> GanResult<Self> {
        config.validate()?;
        B::seed(&device, config.seed);

        let model = GlyphGan::new(&config.model, &device);
        let optim_gen = config.optimizer_gen.init::<B, Generator<B>>();
        let optim_disc = config.optimizer_disc.init::<B, Discriminator<B>>();

        let mut trainer = Self {
            config,
            model,
            optim_gen,
            optim_disc,
            history: MetricsHistory::new(),
            epoch: 0,
            last_checkpoint: None,
            state: TrainerState::Uninitialized,
            checkpoints: None,
            stop: StopSignal::new(),
            device,
        };
        trainer.transition(TrainerState::Ready)?;
        Ok(trainer)
    }

    /// Persist checkpoints into `store` (and write `config.json` there).
    pub fn with_checkpoints(mut self, store: CheckpointStore) -> GanResult<Self> {
        store.ensure_dir()?;
        let path = store.config_path();
        self.config.save(&path).map_err(|err| {
            GanError::Checkpoint(format!("failed to write {}: {err}", path.display()))
        })?;
        self.checkpoints = Some(store);
        Ok(self)
    }

    /// Build a trainer and restore the latest checkpoint in `store`, if any.
    ///
    /// Optimizer moments are restored only when they were saved and
    /// `persist_optimizer` is still enabled; otherwise Adam restarts cold.
    pub fn resume(config: GanConfig, store: CheckpointStore, device: B::Device) -> GanResult<Self> {
        let mut trainer = Self::new(config, device)?.with_checkpoints(store.clone())?;
        let Some(state) = store.read_state()? else {
            log::info!("no checkpoint in {}, starting fresh", store.dir().display());
            return Ok(trainer);
        };

        let epoch = state.epoch;
        let device = trainer.device.clone();
        let GlyphGan {
            generator,
            discriminator,
        } = trainer.model.clone();
        let generator = store.load_module(generator, CheckpointPart::Generator, epoch, &device)?;
        let discriminator =
            store.load_module(discriminator, CheckpointPart::Discriminator, epoch, &device)?;
        trainer.model = GlyphGan {
            generator,
            discriminator,
        };

        if state.optimizer_state && trainer.config.persist_optimizer {
            let record: GenOptimRecord<B> =
                store.load_record::<B, _>(CheckpointPart::GeneratorOptimizer, epoch, &device)?;
            trainer.optim_gen = trainer.optim_gen.clone().load_record(record);
            let record: DiscOptimRecord<B> =
                store.load_record::<B, _>(CheckpointPart::DiscriminatorOptimizer, epoch, &device)?;
            trainer.optim_disc = trainer.optim_disc.clone().load_record(record);
        } else {
            log::warn!("checkpoint at epoch {epoch} has no optimizer state; Adam moments restart");
        }

        trainer.epoch = epoch;
        trainer.last_checkpoint = Some(epoch);
        trainer.history = state.history;
        log::info!("resumed from epoch {epoch} in {}", store.dir().display());
        Ok(trainer)
    }

    pub fn config(&self) -> &GanConfig {
        &self.config
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// Last completed epoch (0 before training).
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Epoch of the latest checkpoint this trainer wrote or resumed from.
    pub fn last_checkpoint(&self) -> Option<usize> {
        self.last_checkpoint
    }

    pub fn history(&self) -> &MetricsHistory {
        &self.history
    }

    pub fn generator(&self) -> &Generator<B> {
        &self.model.generator
    }

    pub fn discriminator(&self) -> &Discriminator<B> {
        &self.model.discriminator
    }

    /// Inference copy of the generator (batch norm uses running statistics).
    pub fn inference_generator(&self) -> Generator<B::InnerBackend> {
        self.model.generator.valid()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Train until `num_epochs`, a stop request, or a failure.
    ///
    /// The dataset is normalized to [-1, 1] once on entry. Returns the full
    /// metrics history (including epochs restored from a checkpoint).
    pub fn fit(
        &mut self,
        dataset: &GlyphDataset,
        rng: &mut StdRng,
        observer: &mut impl TrainingObserver,
    ) -> GanResult<&MetricsHistory> {
        if self.state != TrainerState::Ready {
            return Err(GanError::config(format!(
                "trainer must be ready to fit, current state is {:?}",
                self.state
            )));
        }
        if let Err(err) = self.check_dataset(dataset) {
            self.fail(None);
            return Err(err);
        }
        let images = dataset.images.normalized();

        log::info!(
            "training on {} images of {}x{} for epochs {}..={}",
            images.len(),
            images.image_size(),
            images.image_size(),
            self.epoch + 1,
            self.config.num_epochs
        );

        for epoch in (self.epoch + 1)..=self.config.num_epochs {
            if self.stop.should_stop() {
                log::info!("stop requested, ending after epoch {}", self.epoch);
                break;
            }

            self.transition(TrainerState::TrainingStep { epoch })?;
            let metrics = match self.train_epoch(&images, epoch, rng) {
                Ok(metrics) => metrics,
                Err(err) => {
                    let phase = match &err {
                        GanError::Divergence { phase, .. } => Some(*phase),
                        _ => None,
                    };
                    self.fail(phase);
                    return Err(err);
                }
            };

            self.history.push(metrics);
            self.epoch = epoch;
            log::info!(
                "{epoch} [D loss: {:.6}, acc.: {:.2}%] [G loss: {:.6}]",
                metrics.d_loss,
                metrics.d_accuracy * 100.0,
                metrics.g_loss
            );
            observer.on_epoch(&metrics);

            if self.config.sample_interval > 0 && epoch % self.config.sample_interval == 0 {
                self.transition(TrainerState::Sampling { epoch })?;
                self.emit_samples(epoch, rng, observer);
            }

            if self.config.checkpoint_interval > 0 && epoch % self.config.checkpoint_interval == 0 {
                self.transition(TrainerState::Checkpointing { epoch })?;
                if let Err(err) = self.save_checkpoint(epoch) {
                    self.fail(None);
                    return Err(err);
                }
            }
        }

        self.transition(TrainerState::Completed { epoch: self.epoch })?;
        if let Err(err) = observer.on_complete(&self.history) {
            log::warn!("failed to export training history: {err:#}");
        }
        Ok(&self.history)
    }

    /// Checkpoint the last completed epoch unless that epoch is already on disk.
    ///
    /// Returns whether a checkpoint was written.
    pub fn checkpoint_if_unsaved(&mut self) -> GanResult<bool> {
        let epoch = self.epoch;
        if epoch == 0 || self.checkpoints.is_none() || self.last_checkpoint == Some(epoch) {
            return Ok(false);
        }
        self.save_checkpoint(epoch)?;
        Ok(true)
    }

    /// Write the current weights (and optimizer state) as epoch `epoch`.
    pub fn save_checkpoint(&mut self, epoch: usize) -> GanResult<()> {
        let Some(store) = &self.checkpoints else {
            return Ok(());
        };
        store.save_module(&self.model.generator, CheckpointPart::Generator, epoch)?;
        store.save_module(&self.model.discriminator, CheckpointPart::Discriminator, epoch)?;

        let optimizer_state = self.config.persist_optimizer;
        if optimizer_state {
            store.save_record::<B, _>(
                self.optim_gen.to_record(),
                CheckpointPart::GeneratorOptimizer,
                epoch,
            )?;
            store.save_record::<B, _>(
                self.optim_disc.to_record(),
                CheckpointPart::DiscriminatorOptimizer,
                epoch,
            )?;
        }

        store.write_state(&TrainingState {
            epoch,
            optimizer_state,
            history: self.history.clone(),
        })?;
        log::debug!("saved checkpoint for epoch {epoch} to {}", store.dir().display());
        self.last_checkpoint = Some(epoch);
        Ok(())
    }

    fn check_dataset(&self, dataset: &GlyphDataset) -> GanResult<()> {
        let size = dataset.images.image_size();
        if size != self.config.model.image_size {
            return Err(GanError::config(format!(
                "dataset images are {size}x{size}, networks expect {0}x{0}",
                self.config.model.image_size
            )));
        }
        if dataset.len() < self.config.batch_size {
            return Err(GanError::config(format!(
                "batch_size {} exceeds dataset size {}",
                self.config.batch_size,
                dataset.len()
            )));
        }
        Ok(())
    }

    fn train_epoch(
        &mut self,
        images: &GlyphImages,
        epoch: usize,
        rng: &mut StdRng,
    ) -> GanResult<EpochMetrics> {
        let mut acc = EpochAccumulator::default();
        for step in 1..=self.config.steps_per_epoch {
            let losses = self.train_step(images, epoch, step, rng)?;
            acc.add(losses.d_loss, losses.d_accuracy, losses.g_loss);
        }
        Ok(acc.finish(epoch))
    }

    /// One discriminator update followed by one generator update.
    ///
    /// `epoch` and `step` only label a divergence. Both losses are checked
    /// before their optimizer step, so a non-finite loss never reaches the
    /// parameters. The backend RNG (dropout masks) is reseeded from `rng`, so
    /// a step is fully determined by `rng` and the current weights.
    pub fn train_step(
        &mut self,
        images: &GlyphImages,
        epoch: usize,
        step: usize,
        rng: &mut StdRng,
    ) -> GanResult<StepLosses> {
        let batch_size = self.config.batch_size;
        let latent_dim = self.config.model.latent_dim;
        let image_size = self.config.model.image_size;
        if images.is_empty() || images.len() < batch_size {
            return Err(GanError::config(format!(
                "batch_size {batch_size} exceeds the {} images given",
                images.len()
            )));
        }
        if images.image_size() != image_size {
            return Err(GanError::config(format!(
                "images are {0}x{0}, networks expect {image_size}x{image_size}",
                images.image_size()
            )));
        }
        B::seed(&self.device, rng.random());

        // Discriminator phase: real batch drawn with replacement, detached fakes.
        let indices: Vec<usize> = (0..batch_size)
            .map(|_| rng.random_range(0..images.len()))
            .collect();
        let real = images.gather::<B>(&indices, &self.device);
        let latent = latent_batch::<B>(batch_size, latent_dim, rng, &self.device);
        let fake = self.model.generator.forward(latent).detach();

        let DiscriminatorLoss { loss, logits } = discriminator_loss(
            &self.model.discriminator,
            real,
            fake,
            self.config.real_label,
            self.config.fake_label,
        );
        let d_loss = finite_loss(&loss, Phase::Discriminator, epoch, step)?;
        let logits = logits
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|err| GanError::Tensor(format!("{err:?}")))?;
        let d_accuracy = classification_accuracy(&logits, batch_size);
        self.apply_gradients(Phase::Discriminator, loss.backward());

        // Generator phase: gradients flow through the frozen discriminator.
        let latent = latent_batch::<B>(batch_size, latent_dim, rng, &self.device);
        let loss = generator_loss(&self.model.generator, &self.model.discriminator, latent);
        let g_loss = finite_loss(&loss, Phase::Generator, epoch, step)?;
        self.apply_gradients(Phase::Generator, loss.backward());

        Ok(StepLosses {
            d_loss,
            d_accuracy,
            g_loss,
        })
    }

    fn apply_gradients(&mut self, phase: Phase, grads: B::Gradients) {
        let grads = GradientsParams::from_grads(grads, &self.model);
        let (gen_grads, disc_grads) = split_grads(&self.model, grads);
        let lr = self.config.learning_rate;
        let GlyphGan {
            generator,
            discriminator,
        } = self.model.clone();

        self.model = match phase.trainable() {
            ParamGroup::Generator if !gen_grads.is_empty() => GlyphGan {
                generator: self.optim_gen.step(lr, generator, gen_grads),
                discriminator,
            },
            ParamGroup::Discriminator if !disc_grads.is_empty() => GlyphGan {
                generator,
                discriminator: self.optim_disc.step(lr, discriminator, disc_grads),
            },
            _ => GlyphGan {
                generator,
                discriminator,
            },
        };
    }

    fn emit_samples(&mut self, epoch: usize, rng: &mut StdRng, observer: &mut impl TrainingObserver) {
        let generator = self.inference_generator();
        let images = match Sampler::new(&generator).sample_images(self.config.sample_count, rng) {
            Ok(images) => images,
            Err(err) => {
                log::warn!("failed to sample at epoch {epoch}: {err}");
                return;
            }
        };
        if let Err(err) = observer.on_sample(epoch, &images) {
            log::warn!("failed to export samples for epoch {epoch}: {err:#}");
        }
    }

    fn transition(&mut self, next: TrainerState) -> GanResult<()> {
        if !self.state.can_enter(next) {
            return Err(GanError::config(format!(
                "illegal trainer transition {:?} -> {next:?}",
                self.state
            )));
        }
        log::trace!("trainer {:?} -> {next:?}", self.state);
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, phase: Option<Phase>) {
        self.state = TrainerState::Failed {
            phase,
            epoch: self.epoch + 1,
        };
    }
}

fn finite_loss<B: Backend>(
    loss: &Tensor<B, 1>,
    phase: Phase,
    epoch: usize,
    step: usize,
) -> GanResult<f64> {
    let value = loss.clone().into_scalar().elem::<f64>();
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GanError::Divergence {
            phase,
            epoch,
            step,
            loss: value,
        })
    }
}

struct GradsExtractor<'a, B: AutodiffBackend> {
    source: &'a mut GradientsParams,
    target: &'a mut GradientsParams,
    _phantom: PhantomData<B>,
}

impl<'a, B: AutodiffBackend> GradsExtractor<'a, B> {
    fn new(source: &'a mut GradientsParams, target: &'a mut GradientsParams) -> Self {
        Self {
            source,
            target,
            _phantom: PhantomData,
        }
    }
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradsExtractor<'_, B> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        if let Some(grad) = self.source.remove::<B::InnerBackend, D>(param.id) {
            self.target.register::<B::InnerBackend, D>(param.id, grad);
        }
    }
}

/// Partition gradients by owning network: (generator, discriminator).
fn split_grads<B: AutodiffBackend>(
    model: &GlyphGan<B>,
    mut grads: GradientsParams,
) -> (GradientsParams, GradientsParams) {
    let mut gen_grads = GradientsParams::new();
    let mut extractor = GradsExtractor::<B>::new(&mut grads, &mut gen_grads);
    model.generator.visit(&mut extractor);

    let mut disc_grads = GradientsParams::new();
    let mut extractor = GradsExtractor::<B>::new(&mut grads, &mut disc_grads);
    model.discriminator.visit(&mut extractor);

    (gen_grads, disc_grads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{create_letter_dataset, PixelRange};
    use crate::font::GlyphFont;
    use burn::backend::{Autodiff, NdArray};
    use rand::SeedableRng;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn tiny_config(num_epochs: usize, batch_size: usize) -> GanConfig {
        let model = ModelConfig::new(8)
            .with_latent_dim(8)
            .with_generator_dim(4)
            .with_discriminator_dim(4)
            .with_dropout(0.0);
        GanConfig::with_defaults(model, num_epochs, batch_size, 0)
    }

    fn tiny_dataset(count: usize) -> GlyphDataset {
        let mut rng = StdRng::seed_from_u64(1);
        create_letter_dataset('A', 8, count, 10.0, &GlyphFont::Builtin, &mut rng).unwrap()
    }

    /// Flattened copy of every trainable parameter, in visit order.
    /// Batch-norm running statistics are skipped.
    struct Snapshot(Vec<f32>);

    impl<B: Backend> ModuleVisitor<B> for Snapshot {
        fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
            let tensor = param.val();
            if !tensor.is_require_grad() {
                return;
            }
            let values = tensor.into_data().convert::<f32>().to_vec::<f32>().unwrap();
            self.0.extend(values);
        }
    }

    fn snapshot<B: Backend, M: Module<B>>(module: &M) -> Vec<f32> {
        let mut visitor = Snapshot(Vec::new());
        module.visit(&mut visitor);
        visitor.0
    }

    #[test]
    fn new_trainer_is_ready() {
        let trainer = GanTrainer::<TestBackend>::new(tiny_config(1, 4), Default::default()).unwrap();
        assert_eq!(trainer.state(), TrainerState::Ready);
        assert_eq!(trainer.epoch(), 0);
        assert!(trainer.history().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let config = tiny_config(1, 4).with_real_label(1.5);
        assert!(matches!(
            GanTrainer::<TestBackend>::new(config, Default::default()),
            Err(GanError::Configuration(_))
        ));
        let config = tiny_config(1, 0);
        assert!(GanTrainer::<TestBackend>::new(config, Default::default()).is_err());
    }

    #[test]
    fn same_seed_same_losses() {
        let trainer = GanTrainer::<TestBackend>::new(tiny_config(1, 4), Default::default()).unwrap();
        let images = tiny_dataset(16).images.normalized();

        let mut first = trainer.clone();
        let mut second = trainer;
        let a = first.train_step(&images, 1, 1, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = second.train_step(&images, 1, 1, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a.d_accuracy));
    }

    #[test]
    fn train_step_rejects_too_few_images() {
        let mut trainer = GanTrainer::<TestBackend>::new(tiny_config(1, 4), Default::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(9);

        let empty = GlyphImages::new(Vec::new(), 0, 8, PixelRange::Normalized).unwrap();
        assert!(matches!(
            trainer.train_step(&empty, 1, 1, &mut rng),
            Err(GanError::Configuration(_))
        ));

        let short = tiny_dataset(3).images.normalized();
        assert!(matches!(
            trainer.train_step(&short, 1, 1, &mut rng),
            Err(GanError::Configuration(_))
        ));
    }

    #[test]
    fn train_step_rejects_wrong_resolution() {
        let mut trainer = GanTrainer::<TestBackend>::new(tiny_config(1, 4), Default::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let images = create_letter_dataset('A', 12, 8, 0.0, &GlyphFont::Builtin, &mut rng)
            .unwrap()
            .images
            .normalized();
        assert!(matches!(
            trainer.train_step(&images, 1, 1, &mut rng),
            Err(GanError::Configuration(_))
        ));
    }

    #[test]
    fn soft_labels_train_to_completion() {
        for (real_label, fake_label) in [(0.9, 0.1), (0.9, 0.0)] {
            let config = tiny_config(2, 4)
                .with_real_label(real_label)
                .with_fake_label(fake_label);
            let mut trainer = GanTrainer::<TestBackend>::new(config, Default::default()).unwrap();
            let mut rng = StdRng::seed_from_u64(5);
            let history = trainer.fit(&tiny_dataset(8), &mut rng, &mut ()).unwrap();
            assert_eq!(history.len(), 2);
            assert!(history
                .entries()
                .iter()
                .all(|m| m.d_loss.is_finite() && m.g_loss.is_finite()));
        }
    }

    #[test]
    fn checkpoint_if_unsaved_needs_a_store() {
        let mut trainer = GanTrainer::<TestBackend>::new(tiny_config(1, 4), Default::default()).unwrap();
        assert!(!trainer.checkpoint_if_unsaved().unwrap());
        let mut rng = StdRng::seed_from_u64(5);
        trainer.fit(&tiny_dataset(8), &mut rng, &mut ()).unwrap();
        assert!(!trainer.checkpoint_if_unsaved().unwrap());
        assert_eq!(trainer.last_checkpoint(), None);
    }

    #[test]
    fn discriminator_phase_leaves_generator_untouched() {
        let mut trainer = GanTrainer::<TestBackend>::new(tiny_config(1, 4), Default::default()).unwrap();
        let gen_before = snapshot(trainer.generator());
        let disc_before = snapshot(trainer.discriminator());

        let device = Default::default();
        let real = tiny_dataset(4).images.normalized().gather::<TestBackend>(&[0, 1, 2, 3], &device);
        let latent = latent_batch::<TestBackend>(4, 8, &mut StdRng::seed_from_u64(2), &device);
        let fake = trainer.generator().forward(latent).detach();
        let DiscriminatorLoss { loss, .. } =
            discriminator_loss(trainer.discriminator(), real, fake, 1.0, 0.0);
        trainer.apply_gradients(Phase::Discriminator, loss.backward());

        assert_eq!(snapshot(trainer.generator()), gen_before);
        assert_ne!(snapshot(trainer.discriminator()), disc_before);
    }

    #[test]
    fn generator_phase_freezes_discriminator() {
        let mut trainer = GanTrainer::<TestBackend>::new(tiny_config(1, 4), Default::default()).unwrap();
        let gen_before = snapshot(trainer.generator());
        let disc_before = snapshot(trainer.discriminator());

        let latent = latent_batch::<TestBackend>(4, 8, &mut StdRng::seed_from_u64(2), &Default::default());
        let loss = generator_loss(trainer.generator(), trainer.discriminator(), latent);
        trainer.apply_gradients(Phase::Generator, loss.backward());

        assert_ne!(snapshot(trainer.generator()), gen_before);
        assert_eq!(snapshot(trainer.discriminator()), disc_before);
    }

    #[test]
    fn sampling_does_not_mutate_parameters() {
        let trainer = GanTrainer::<TestBackend>::new(tiny_config(1, 4), Default::default()).unwrap();
        let gen_before = snapshot(trainer.generator());
        let disc_before = snapshot(trainer.discriminator());

        let generator = trainer.inference_generator();
        let images = Sampler::new(&generator)
            .sample_images(6, &mut StdRng::seed_from_u64(4))
            .unwrap();
        assert_eq!(images.len(), 6);

        assert_eq!(snapshot(trainer.generator()), gen_before);
        assert_eq!(snapshot(trainer.discriminator()), disc_before);
    }

    #[test]
    fn non_finite_loss_fails_with_phase() {
        let config = tiny_config(3, 4).with_learning_rate(f64::INFINITY);
        let mut trainer = GanTrainer::<TestBackend>::new(config, Default::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        let err = trainer.fit(&tiny_dataset(16), &mut rng, &mut ()).unwrap_err();
        match err {
            GanError::Divergence {
                phase,
                epoch,
                step,
                loss,
            } => {
                assert_eq!(phase, Phase::Generator);
                assert_eq!(epoch, 1);
                assert_eq!(step, 1);
                assert!(!loss.is_finite());
            }
            other => panic!("expected divergence, got {other:?}"),
        }
        assert_eq!(
            trainer.state(),
            TrainerState::Failed {
                phase: Some(Phase::Generator),
                epoch: 1
            }
        );
        assert!(trainer.history().is_empty());
    }

    #[test]
    fn stop_signal_ends_at_epoch_boundary() {
        let mut trainer = GanTrainer::<TestBackend>::new(tiny_config(5, 4), Default::default()).unwrap();
        trainer.stop_signal().stop();
        let mut rng = StdRng::seed_from_u64(5);
        let history = trainer.fit(&tiny_dataset(8), &mut rng, &mut ()).unwrap();
        assert!(history.is_empty());
        assert_eq!(trainer.state(), TrainerState::Completed { epoch: 0 });
    }

    #[test]
    fn fit_twice_is_rejected() {
        let mut trainer = GanTrainer::<TestBackend>::new(tiny_config(1, 4), Default::default()).unwrap();
        let dataset = tiny_dataset(8);
        let mut rng = StdRng::seed_from_u64(5);
        trainer.fit(&dataset, &mut rng, &mut ()).unwrap();
        assert!(matches!(
            trainer.fit(&dataset, &mut rng, &mut ()),
            Err(GanError::Configuration(_))
        ));
    }

    #[test]
    fn steps_per_epoch_still_yields_one_entry_per_epoch() {
        let config = tiny_config(2, 4).with_steps_per_epoch(3);
        let mut trainer = GanTrainer::<TestBackend>::new(config, Default::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let history = trainer.fit(&tiny_dataset(8), &mut rng, &mut ()).unwrap();
        let epochs: Vec<usize> = history.entries().iter().map(|m| m.epoch).collect();
        assert_eq!(epochs, vec![1, 2]);
    }

    #[test]
    fn phase_owns_exactly_one_group() {
        assert_eq!(Phase::Discriminator.trainable(), ParamGroup::Discriminator);
        assert_eq!(Phase::Generator.trainable(), ParamGroup::Generator);
    }

    #[test]
    fn illegal_transitions_are_refused() {
        assert!(!TrainerState::Completed { epoch: 1 }.can_enter(TrainerState::TrainingStep { epoch: 2 }));
        assert!(!TrainerState::Ready.can_enter(TrainerState::Sampling { epoch: 1 }));
        assert!(TrainerState::TrainingStep { epoch: 1 }.can_enter(TrainerState::Failed {
            phase: Some(Phase::Generator),
            epoch: 1
        }));
    }
}
