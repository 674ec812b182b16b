//! On-disk layout of training checkpoints.
//!
//! A checkpoint directory holds `config.json`, a `state.json` pointing at the
//! most recent saved epoch, and one record file per network (and optionally
//! per optimizer) for every saved epoch:
//!
//! ```text
//! generator-0010.mpk  discriminator-0010.mpk  optim-gen-0010.mpk  optim-disc-0010.mpk
//! ```

use crate::error::{GanError, GanResult};
use crate::metrics::MetricsHistory;
use crate::model::{Generator, ModelConfig};
use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Record, Recorder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full precision, so reloaded weights reproduce forward passes exactly.
pub type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

const STATE_FILE: &str = "state.json";
const CONFIG_FILE: &str = "config.json";
const RECORD_EXTENSION: &str = "mpk";

/// Persisted training progress.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TrainingState {
    /// Last completed epoch that has weights on disk.
    pub epoch: usize,
    /// Whether optimizer records were written alongside the weights.
    pub optimizer_state: bool,
    pub history: MetricsHistory,
}

/// Which record a checkpoint file holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckpointPart {
    Generator,
    Discriminator,
    GeneratorOptimizer,
    DiscriminatorOptimizer,
}

impl CheckpointPart {
    fn stem(self) -> &'static str {
        match self {
            CheckpointPart::Generator => "generator",
            CheckpointPart::Discriminator => "discriminator",
            CheckpointPart::GeneratorOptimizer => "optim-gen",
            CheckpointPart::DiscriminatorOptimizer => "optim-disc",
        }
    }
}

#[derive(Clone, Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
    recorder: CheckpointRecorder,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            recorder: CheckpointRecorder::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Record path without extension; the recorder appends `.mpk`.
    pub fn record_path(&self, part: CheckpointPart, epoch: usize) -> PathBuf {
        self.dir.join(format!("{}-{epoch:04}", part.stem()))
    }

    pub fn has_record(&self, part: CheckpointPart, epoch: usize) -> bool {
        self.record_path(part, epoch)
            .with_extension(RECORD_EXTENSION)
            .is_file()
    }

    pub fn ensure_dir(&self) -> GanResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|err| {
            GanError::Checkpoint(format!("failed to create {}: {err}", self.dir.display()))
        })
    }

    pub fn write_state(&self, state: &TrainingState) -> GanResult<()> {
        self.ensure_dir()?;
        let path = self.dir.join(STATE_FILE);
        let json = serde_json::to_string_pretty(state)
            .map_err(|err| GanError::Checkpoint(format!("failed to serialize state: {err}")))?;
        std::fs::write(&path, json)
            .map_err(|err| GanError::Checkpoint(format!("failed to write {}: {err}", path.display())))
    }

    /// `Ok(None)` when no checkpoint has been written yet.
    pub fn read_state(&self) -> GanResult<Option<TrainingState>> {
        let path = self.dir.join(STATE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .map_err(|err| GanError::Checkpoint(format!("failed to read {}: {err}", path.display())))?;
        let state = serde_json::from_str(&contents)
            .map_err(|err| GanError::Checkpoint(format!("failed to parse {}: {err}", path.display())))?;
        Ok(Some(state))
    }

    pub fn save_module<B: Backend, M: Module<B>>(
        &self,
        module: &M,
        part: CheckpointPart,
        epoch: usize,
    ) -> GanResult<()> {
        self.ensure_dir()?;
        let path = self.record_path(part, epoch);
        module
            .clone()
            .save_file(path.clone(), &self.recorder)
            .map_err(|err| GanError::Checkpoint(format!("failed to save {}: {err:?}", path.display())))
    }

    pub fn load_module<B: Backend, M: Module<B>>(
        &self,
        module: M,
        part: CheckpointPart,
        epoch: usize,
        device: &B::Device,
    ) -> GanResult<M> {
        let path = self.record_path(part, epoch);
        module
            .load_file(path.clone(), &self.recorder, device)
            .map_err(|err| GanError::Checkpoint(format!("failed to load {}: {err:?}", path.display())))
    }

    /// Generator weights from the most recent checkpoint, with their epoch.
    pub fn load_latest_generator<B: Backend>(
        &self,
        model: &ModelConfig,
        device: &B::Device,
    ) -> GanResult<(Generator<B>, usize)> {
        let state = self.read_state()?.ok_or_else(|| {
            GanError::Checkpoint(format!("no checkpoint in {}", self.dir.display()))
        })?;
        let generator = self.load_module(
            model.init_generator::<B>(device),
            CheckpointPart::Generator,
            state.epoch,
            device,
        )?;
        Ok((generator, state.epoch))
    }

    pub fn save_record<B: Backend, R: Record<B>>(
        &self,
        record: R,
        part: CheckpointPart,
        epoch: usize,
    ) -> GanResult<()> {
        self.ensure_dir()?;
        let path = self.record_path(part, epoch);
        <CheckpointRecorder as Recorder<B>>::record(&self.recorder, record, path.clone())
            .map_err(|err| GanError::Checkpoint(format!("failed to save {}: {err:?}", path.display())))
    }

    pub fn load_record<B: Backend, R: Record<B>>(
        &self,
        part: CheckpointPart,
        epoch: usize,
        device: &B::Device,
    ) -> GanResult<R> {
        let path = self.record_path(part, epoch);
        <CheckpointRecorder as Recorder<B>>::load(&self.recorder, path.clone(), device)
            .map_err(|err| GanError::Checkpoint(format!("failed to load {}: {err:?}", path.display())))
    }
}
