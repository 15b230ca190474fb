//! RateSampler - the poll, compute and append loop.
//!
//! Each refresh fetches the rate history, takes a new on-chain sample when
//! the newest stored one is old enough, appends it to the capped rolling
//! file and merges history with stored samples into a dashboard snapshot.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::rates::apy::format_percent;
use crate::rates::config::{RatesConfig, MAX_HISTORY_DAYS, MIN_HISTORY_DAYS};
use crate::rates::data_sources::HistorySource;
use crate::rates::onchain::CurrentRateSource;
use crate::rates::storage::SampleStorage;
use crate::rates::types::{
    DashboardSnapshot, RateSample, SamplerCommand, SamplerCommandReceiver, SnapshotSender,
};
use crate::types::RateKind;

/// Builds rolling rate series from repeated point-in-time reads.
pub struct RateSampler {
    history: Arc<dyn HistorySource>,
    current: Arc<dyn CurrentRateSource>,
    storage: Arc<dyn SampleStorage>,
    max_samples: usize,
    min_sample_interval: Duration,
    display_offset_hours: i32,
}

impl RateSampler {
    pub fn new(
        history: Arc<dyn HistorySource>,
        current: Arc<dyn CurrentRateSource>,
        storage: Arc<dyn SampleStorage>,
        config: &RatesConfig,
    ) -> Self {
        Self {
            history,
            current,
            storage,
            max_samples: config.max_samples,
            min_sample_interval: config.min_sample_interval(),
            display_offset_hours: config.display_utc_offset_hours,
        }
    }

    /// Refresh `token` as of the current time.
    pub async fn refresh(&self, token: &str, days: usize) -> DashboardSnapshot {
        self.refresh_at(token, days, chrono::Utc::now().timestamp())
            .await
    }

    /// Refresh `token` treating `now` (unix seconds) as the current time.
    ///
    /// Failures are logged and recorded on the snapshot; whatever succeeded
    /// is still returned.
    #[instrument(skip(self))]
    pub async fn refresh_at(&self, token: &str, days: usize, now: i64) -> DashboardSnapshot {
        let mut errors = Vec::new();

        let history = match self.history.fetch_rate_history(token, days).await {
            Ok(history) => history,
            Err(e) => {
                error!("Failed to fetch rate history for {}: {:#}", token, e);
                errors.push(format!("history: {:#}", e));
                Default::default()
            }
        };
        if history.is_empty() {
            warn!("No rate history available for {}", token);
        }

        if let Err(e) = self.sample_if_due(token, now).await {
            error!("Failed to take sample for {}: {:#}", token, e);
            errors.push(format!("sample: {:#}", e));
        }

        let stored = match self.storage.load(token).await {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to load samples for {}: {:#}", token, e);
                errors.push(format!("storage: {:#}", e));
                Vec::new()
            }
        };

        let merge = |kind: RateKind| {
            history
                .side(kind)
                .iter()
                .copied()
                .chain(stored.iter().map(|s| s.point(kind)))
                .collect::<Vec<_>>()
        };

        DashboardSnapshot {
            token: token.to_string(),
            days,
            deposit: merge(RateKind::Deposit),
            borrow: merge(RateKind::Borrow),
            stored_samples: stored.len(),
            refreshed_at: now,
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
        }
    }

    /// Take and store a new sample when the newest one is stale.
    /// Returns the stored sample, or `None` when no sample was due.
    pub async fn sample_if_due(&self, token: &str, now: i64) -> anyhow::Result<Option<RateSample>> {
        if !self
            .storage
            .should_fetch(token, self.min_sample_interval, now)
            .await?
        {
            debug!("Latest sample for {} is fresh, skipping on-chain read", token);
            return Ok(None);
        }

        let current = self.current.fetch_current_rates(token).await?;
        let sample = current.into_sample(self.display_offset_hours);
        self.storage
            .append_and_cap(token, &sample, self.max_samples)
            .await?;
        Ok(Some(sample))
    }

    /// Dashboard loop: refresh the selected token on every tick and after
    /// each batch of commands, delivering snapshots until either channel
    /// closes. Commands queued during a refresh collapse into one refresh
    /// of the final selection.
    pub async fn run(
        self,
        initial_token: String,
        initial_days: usize,
        refresh_interval: Duration,
        mut commands: SamplerCommandReceiver,
        snapshots: SnapshotSender,
    ) {
        info!(
            "RateSampler is running. Refresh every {} seconds.",
            refresh_interval.as_secs()
        );

        let mut token = initial_token;
        let mut days = initial_days.clamp(MIN_HISTORY_DAYS, MAX_HISTORY_DAYS);
        let mut interval = tokio::time::interval(refresh_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {},
                command = commands.recv() => {
                    let Some(command) = command else {
                        info!("Sampler command channel closed. Shutting down.");
                        break;
                    };
                    // Coalesce whatever queued up during the last refresh
                    let mut refresh_requested = false;
                    let mut next = Some(command);
                    while let Some(command) = next {
                        match command {
                            SamplerCommand::SelectToken(selected) => token = selected,
                            SamplerCommand::SetDays(selected) => {
                                days = selected.clamp(MIN_HISTORY_DAYS, MAX_HISTORY_DAYS);
                            }
                            SamplerCommand::RefreshNow => refresh_requested = true,
                        }
                        next = commands.try_recv().ok();
                    }
                    if refresh_requested {
                        self.history.clear_cache();
                    }
                    info!("Refreshing {} over {} days on request", token, days);
                    interval.reset();
                }
            }

            let snapshot = self.refresh(&token, days).await;
            if snapshots.send(snapshot).await.is_err() {
                info!("Dashboard went away. RateSampler shutting down.");
                break;
            }
        }
    }

    /// Headless loop: refresh every token on each tick and log the latest
    /// APYs. Runs until the surrounding task is cancelled.
    pub async fn run_headless(&self, tokens: &[String], days: usize, refresh_interval: Duration) {
        info!(
            "Sampling {} tokens every {} seconds.",
            tokens.len(),
            refresh_interval.as_secs()
        );
        let mut interval = tokio::time::interval(refresh_interval);

        loop {
            interval.tick().await;
            for token in tokens {
                let snapshot = self.refresh(token, days).await;
                log_snapshot(&snapshot);
            }
        }
    }
}

/// Log the headline numbers of a snapshot.
pub fn log_snapshot(snapshot: &DashboardSnapshot) {
    let apy = |kind| {
        snapshot
            .latest(kind)
            .map(|p| format_percent(p.apy))
            .unwrap_or_else(|| "n/a".to_string())
    };
    info!(
        "{}: borrow APY {}, deposit APY {}, {} points ({} stored samples)",
        snapshot.token,
        apy(RateKind::Borrow),
        apy(RateKind::Deposit),
        snapshot.data_points(),
        snapshot.stored_samples
    );
    if let Some(err) = &snapshot.error {
        warn!("{}: {}", snapshot.token, err);
    }
}
