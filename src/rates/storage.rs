//! Storage abstraction for rolling rate samples.
//!
//! Each token owns one flat CSV file holding its most recent samples,
//! oldest first. Appending rewrites the file with only the newest
//! `max_samples` rows retained.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::rates::types::RateSample;

/// Contract for persisting rolling samples per token.
#[async_trait]
pub trait SampleStorage: Send + Sync {
    /// Append `sample`, keep the newest `max_samples` rows.
    /// Returns the number of rows stored afterwards.
    async fn append_and_cap(&self, token: &str, sample: &RateSample, max_samples: usize)
        -> Result<usize>;

    /// All stored rows for `token`, oldest first. Missing storage is empty.
    async fn load(&self, token: &str) -> Result<Vec<RateSample>>;

    /// Whether a new sample is due: nothing stored yet, or the newest row
    /// is older than `min_interval` at `now` (unix seconds).
    async fn should_fetch(&self, token: &str, min_interval: Duration, now: i64) -> Result<bool> {
        let samples = self.load(token).await?;
        Ok(match samples.last() {
            None => true,
            Some(last) => now - last.timestamp > min_interval.as_secs() as i64,
        })
    }
}

/// CSV-backed sample storage rooted at a data directory.
pub struct CsvSampleStore {
    data_dir: PathBuf,
}

impl CsvSampleStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// File holding the samples for `token`.
    pub fn sample_file(&self, token: &str) -> PathBuf {
        self.data_dir
            .join(format!("realtime_samples_{}.csv", token.to_lowercase()))
    }

    /// Rename an unreadable sample file out of the way so the next
    /// append starts a fresh one.
    async fn quarantine(&self, path: &Path) -> Result<PathBuf> {
        let corrupt_path = path.with_extension("csv.corrupt");
        tokio::fs::rename(path, &corrupt_path)
            .await
            .with_context(|| format!("Failed to move aside {}", path.display()))?;
        Ok(corrupt_path)
    }

    async fn write_all(&self, path: &Path, samples: &[RateSample]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for sample in samples {
            writer.serialize(sample).context("Failed to encode sample row")?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .context("Failed to flush sample rows")?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Readers only ever see a complete file.
        let tmp_path = path.with_extension("csv.tmp");
        tokio::fs::write(&tmp_path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

/// Parse sample rows from CSV bytes.
pub fn parse_samples(bytes: &[u8]) -> Result<Vec<RateSample>> {
    csv::Reader::from_reader(bytes)
        .deserialize()
        .collect::<Result<Vec<RateSample>, _>>()
        .context("Failed to parse sample rows")
}

#[async_trait]
impl SampleStorage for CsvSampleStore {
    #[instrument(skip(self, sample))]
    async fn append_and_cap(
        &self,
        token: &str,
        sample: &RateSample,
        max_samples: usize,
    ) -> Result<usize> {
        let path = self.sample_file(token);
        let mut samples = self.load(token).await?;
        samples.push(sample.clone());

        if samples.len() > max_samples {
            let excess = samples.len() - max_samples;
            samples.drain(..excess);
            debug!("Dropped {} old samples for {}", excess, token);
        }

        self.write_all(&path, &samples).await?;
        info!("Stored sample for {} ({} rows in {})", token, samples.len(), path.display());
        Ok(samples.len())
    }

    async fn load(&self, token: &str) -> Result<Vec<RateSample>> {
        let path = self.sample_file(token);
        match tokio::fs::read(&path).await {
            Ok(bytes) => match parse_samples(&bytes) {
                Ok(samples) => Ok(samples),
                Err(e) => {
                    let moved_to = self.quarantine(&path).await?;
                    warn!(
                        "Unreadable sample file {} ({:#}), moved to {}",
                        path.display(),
                        e,
                        moved_to.display()
                    );
                    Ok(Vec::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}
