//! Training loop: shuffled SGD over single sentences with periodic reports,
//! held-out evaluation and a best-so-far checkpoint.

use std::path::Path;
use std::time::Instant;

use anyhow::Context as _;
use candle_nn::{Optimizer, SGD};
use seqtag_core::{Context, Instance, Stats, Tagger, Vocab};
use tracing::{debug, info};

use crate::checkpoint::Checkpoint;
use crate::config::TrainConfig;

pub struct Trainer {
    config: TrainConfig,
    tagger: Tagger,
    ctx: Context,
    optimizer: SGD,
    checkpoint: Checkpoint,
    samples_seen: usize,
}

impl Trainer {
    /// Allocate a fresh model for the sealed vocabularies. Parameters are
    /// drawn from a context seeded with `config.seed`.
    pub fn new(config: TrainConfig, words: Vocab, tags: Vocab) -> anyhow::Result<Self> {
        let mut ctx = Context::new(config.seed);
        let tagger = Tagger::new(config.model.clone(), words, tags, &mut ctx)?;
        Self::with_tagger(config, tagger, ctx)
    }

    /// Continue training an existing model.
    pub fn with_tagger(config: TrainConfig, tagger: Tagger, ctx: Context) -> anyhow::Result<Self> {
        let optimizer = SGD::new(tagger.trainable_vars(), config.learning_rate)?;
        Ok(Self {
            config,
            tagger,
            ctx,
            optimizer,
            checkpoint: Checkpoint::new(),
            samples_seen: 0,
        })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn tagger(&self) -> &Tagger {
        &self.tagger
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Samples processed across all epochs so far.
    pub fn samples_seen(&self) -> usize {
        self.samples_seen
    }

    /// Run epochs `1..=max_epoch`. Returns statistics summed over the run.
    pub fn train(&mut self, train: &[Instance], devel: &[Instance]) -> anyhow::Result<Stats> {
        info!(
            samples = train.len(),
            held_out = devel.len(),
            epochs = self.config.max_epoch,
            "starting training"
        );

        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut total = Stats::new();
        for epoch in 1..=self.config.max_epoch {
            let stats = self.train_epoch(epoch, train, devel, &mut order)?;
            total += &stats;
        }

        info!(
            accuracy = total.accuracy().unwrap_or(0.0),
            best_held_out = self.checkpoint.best_accuracy(),
            "training finished"
        );
        Ok(total)
    }

    /// One shuffled pass, then the epoch-level learning-rate decay.
    pub fn train_epoch(
        &mut self,
        epoch: u32,
        train: &[Instance],
        devel: &[Instance],
        order: &mut [usize],
    ) -> anyhow::Result<Stats> {
        self.ctx.shuffle(order);

        let mut epoch_stats = Stats::new();
        let mut running = Stats::new();
        let mut timer = Instant::now();

        for &index in order.iter() {
            let instance = &train[index];
            if instance.is_empty() {
                continue;
            }
            self.step(instance, &mut running)?;
            self.samples_seen += 1;

            if self.config.report_freq > 0 && self.samples_seen % self.config.report_freq == 0 {
                running.elapsed = timer.elapsed();
                report(epoch, self.samples_seen, &running);
                epoch_stats += &running;
                running.reset();
                timer = Instant::now();
            }

            if self.config.devel_freq > 0
                && self.samples_seen % self.config.devel_freq == 0
                && !devel.is_empty()
            {
                self.held_out_round(devel)?;
            }
        }

        running.elapsed = timer.elapsed();
        epoch_stats += &running;

        let lr = self.config.learning_rate_at(epoch);
        self.optimizer.set_learning_rate(lr);

        info!(
            epoch,
            loss = epoch_stats.loss,
            accuracy = epoch_stats.accuracy().unwrap_or(0.0),
            learning_rate = lr,
            "epoch complete"
        );
        Ok(epoch_stats)
    }

    /// Teacher-forced loss on a UNK-perturbed copy of the words, then one
    /// SGD update. The graph is dropped on return.
    fn step(&mut self, instance: &Instance, stats: &mut Stats) -> anyhow::Result<()> {
        let words: Vec<u32> = instance
            .words
            .iter()
            .map(|&w| self.tagger.words().substitute_unk(w, &self.config.unk, &mut self.ctx))
            .collect();

        let loss = self
            .tagger
            .loss(&words, &instance.tags, &mut self.ctx, Some(&mut *stats))?;
        stats.loss += loss.to_scalar::<f32>()? as f64;
        self.optimizer.backward_step(&loss)?;
        Ok(())
    }

    /// Inference-only accuracy over `devel`.
    pub fn evaluate(&self, devel: &[Instance]) -> anyhow::Result<Stats> {
        let start = Instant::now();
        let mut stats = Stats::new();
        for instance in devel {
            self.tagger.evaluate(&instance.words, &instance.tags, &mut stats)?;
        }
        stats.elapsed = start.elapsed();
        Ok(stats)
    }

    fn held_out_round(&mut self, devel: &[Instance]) -> anyhow::Result<()> {
        let stats = self.evaluate(devel)?;
        let Some(accuracy) = stats.accuracy() else {
            return Ok(());
        };

        let improved = self.checkpoint.improves(accuracy);
        if improved {
            self.checkpoint.offer(accuracy, self.tagger.snapshot()?);
        }
        info!(
            samples = self.samples_seen,
            accuracy,
            best = self.checkpoint.best_accuracy(),
            improved,
            "held-out evaluation"
        );
        Ok(())
    }

    /// Load the best checkpoint into the live model, if one was taken, and
    /// write it to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        match self.checkpoint.snapshot() {
            Some(best) => {
                self.tagger.restore(best)?;
                debug!(accuracy = self.checkpoint.best_accuracy(), "restored best checkpoint");
            }
            None => debug!("no checkpoint taken, saving final parameters"),
        }
        self.tagger
            .save(path)
            .with_context(|| format!("saving model to {}", path.display()))?;
        info!(path = %path.display(), "model saved");
        Ok(())
    }

    pub fn into_tagger(self) -> Tagger {
        self.tagger
    }
}

fn report(epoch: u32, samples: usize, stats: &Stats) {
    info!(
        epoch,
        samples,
        loss = stats.loss,
        accuracy = stats.accuracy().unwrap_or(0.0),
        tokens_per_sec = stats.throughput().unwrap_or(0.0),
        "progress"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::data::tests::{TRAIN, parse};
    use seqtag_core::{ModelConfig, OutputHeadKind, UnkPolicy};

    fn config() -> TrainConfig {
        TrainConfig::new()
            .with_max_epoch(3)
            .with_report_freq(2)
            .with_devel_freq(2)
            .with_learning_rate(0.1)
            .with_model(
                ModelConfig::new()
                    .with_word_dim(8)
                    .with_tag_dim(4)
                    .with_rnn(1, 8)
                    .with_tag_hidden(6),
            )
    }

    fn dataset() -> Dataset {
        Dataset::from_sentences(&parse(TRAIN), &parse(&["the_DT dog_NN sleeps_VBZ"])).unwrap()
    }

    fn trainer(config: TrainConfig) -> (Trainer, Dataset) {
        let data = dataset();
        let trainer = Trainer::new(config, data.words.clone(), data.tags.clone()).unwrap();
        (trainer, data)
    }

    fn flat(tagger: &Tagger) -> Vec<f32> {
        let snapshot = tagger.snapshot().unwrap();
        snapshot
            .iter()
            .flat_map(|(_, t)| t.flatten_all().unwrap().to_vec1::<f32>().unwrap())
            .collect()
    }

    #[test]
    fn test_training_counts_samples() {
        let (mut trainer, data) = trainer(config());
        let stats = trainer.train(&data.train, &data.devel).unwrap();
        assert_eq!(trainer.samples_seen(), 12);
        assert_eq!(stats.total, 36);
        assert!(stats.loss.is_finite());
    }

    #[test]
    fn test_checkpoint_monotonic_across_epochs() {
        let (mut trainer, data) = trainer(config().with_max_epoch(8));
        let mut order: Vec<usize> = (0..data.train.len()).collect();
        let mut previous = None;
        for epoch in 1..=8 {
            trainer.train_epoch(epoch, &data.train, &data.devel, &mut order).unwrap();
            let best = trainer.checkpoint().best_accuracy();
            assert!(best.is_some());
            if let (Some(before), Some(now)) = (previous, best) {
                assert!(now >= before);
            }
            previous = best;
        }
    }

    #[test]
    fn test_same_seed_same_model() {
        let (mut a, data) = trainer(config());
        let (mut b, _) = trainer(config());
        a.train(&data.train, &data.devel).unwrap();
        b.train(&data.train, &data.devel).unwrap();
        assert_eq!(flat(a.tagger()), flat(b.tagger()));
    }

    #[test]
    fn test_different_seed_different_model() {
        let (a, _) = trainer(config());
        let (b, _) = trainer(config().with_seed(2));
        assert_ne!(flat(a.tagger()), flat(b.tagger()));
    }

    #[test]
    fn test_no_devel_means_no_checkpoint() {
        let (mut trainer, data) = trainer(config());
        trainer.train(&data.train, &[]).unwrap();
        assert!(trainer.checkpoint().snapshot().is_none());
    }

    #[test]
    fn test_learns_training_set() {
        let config = config()
            .with_max_epoch(60)
            .with_devel_freq(0)
            .with_unk(UnkPolicy {
                frequency_threshold: 0,
                probability: 0.0,
            })
            .with_model(config().model.with_embedding_noise(0.0));
        let (mut trainer, data) = trainer(config);
        trainer.train(&data.train, &[]).unwrap();
        let stats = trainer.evaluate(&data.train).unwrap();
        assert_eq!(stats.accuracy(), Some(1.0));
    }

    #[test]
    fn test_save_writes_best_checkpoint() {
        let (mut trainer, data) = trainer(config().with_max_epoch(4));
        trainer.train(&data.train, &data.devel).unwrap();
        let best = trainer.checkpoint().snapshot().unwrap().clone();

        let path = std::env::temp_dir().join(format!("seqtag-trainer-{}.safetensors", std::process::id()));
        trainer.save(&path).unwrap();

        let loaded = Tagger::load(&path).unwrap();
        let expected: Vec<f32> = best
            .iter()
            .flat_map(|(_, t)| t.flatten_all().unwrap().to_vec1::<f32>().unwrap())
            .collect();
        assert_eq!(flat(&loaded), expected);
        assert_eq!(flat(trainer.tagger()), expected);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_crf_head_trains() {
        let config = config().with_model(config().model.with_head(OutputHeadKind::Crf));
        let (mut trainer, data) = trainer(config);
        let stats = trainer.train(&data.train, &data.devel).unwrap();
        assert!(stats.loss.is_finite());
        assert!(trainer.checkpoint().best_accuracy().is_some());
    }
}
