//! Dashboard state and key handling.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use nonempty::NonEmpty;

use crate::rates::config::{RatesConfig, MAX_HISTORY_DAYS, MIN_HISTORY_DAYS};
use crate::rates::types::{DashboardSnapshot, SamplerCommand};

/// State of the terminal dashboard.
pub struct DashboardApp {
    tokens: NonEmpty<String>,
    selected: usize,
    days: usize,
    snapshot: Option<DashboardSnapshot>,
    show_raw: bool,
    loading: bool,
    should_quit: bool,
    display_offset_hours: i32,
    refresh_interval_seconds: u64,
}

impl DashboardApp {
    pub fn new(tokens: NonEmpty<String>, config: &RatesConfig) -> Self {
        Self {
            tokens,
            selected: 0,
            days: config.history_days.clamp(MIN_HISTORY_DAYS, MAX_HISTORY_DAYS),
            snapshot: None,
            show_raw: false,
            loading: true,
            should_quit: false,
            display_offset_hours: config.display_utc_offset_hours,
            refresh_interval_seconds: config.refresh_interval_seconds,
        }
    }

    pub fn selected_token(&self) -> &str {
        // `selected` always indexes into the non-empty token list
        self.tokens.get(self.selected).unwrap_or(&self.tokens.head)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn days(&self) -> usize {
        self.days
    }

    /// Snapshot for the selected token, if one has arrived.
    pub fn snapshot(&self) -> Option<&DashboardSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn show_raw(&self) -> bool {
        self.show_raw
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn display_offset_hours(&self) -> i32 {
        self.display_offset_hours
    }

    pub fn refresh_interval_seconds(&self) -> u64 {
        self.refresh_interval_seconds
    }

    /// Accept a snapshot from the sampler. Snapshots for a token other
    /// than the selected one are stale and dropped.
    pub fn apply_snapshot(&mut self, snapshot: DashboardSnapshot) -> bool {
        if snapshot.token != self.selected_token() {
            return false;
        }
        self.snapshot = Some(snapshot);
        self.loading = false;
        true
    }

    fn select(&mut self, index: usize) -> SamplerCommand {
        self.selected = index % self.tokens.len();
        self.snapshot = None;
        self.loading = true;
        SamplerCommand::SelectToken(self.selected_token().to_string())
    }

    fn set_days(&mut self, days: usize) -> Option<SamplerCommand> {
        let days = days.clamp(MIN_HISTORY_DAYS, MAX_HISTORY_DAYS);
        if days == self.days {
            return None;
        }
        self.days = days;
        self.loading = true;
        Some(SamplerCommand::SetDays(days))
    }

    /// Terminal input is gone; nothing can reach the quit key any more.
    pub fn input_closed(&mut self) {
        self.should_quit = true;
    }

    /// Apply a key press, returning the request to forward to the sampler.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<SamplerCommand> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return None;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            KeyCode::Right | KeyCode::Tab | KeyCode::Char('l') => {
                Some(self.select(self.selected + 1))
            }
            KeyCode::Left | KeyCode::BackTab | KeyCode::Char('h') => {
                let len = self.tokens.len();
                Some(self.select(self.selected + len - 1))
            }
            KeyCode::Up | KeyCode::Char('+') | KeyCode::Char('k') => self.set_days(self.days + 1),
            KeyCode::Down | KeyCode::Char('-') | KeyCode::Char('j') => {
                self.set_days(self.days.saturating_sub(1))
            }
            KeyCode::Char('r') => {
                self.loading = true;
                Some(SamplerCommand::RefreshNow)
            }
            KeyCode::Char('d') => {
                self.show_raw = !self.show_raw;
                None
            }
            _ => None,
        }
    }
}
