//! Dashboard module - interactive terminal view of rate snapshots
//!
//! The sampler runs as a background task and pushes snapshots; this module
//! owns the terminal, turns key presses into sampler commands and renders
//! the latest snapshot.

pub mod app;
pub mod terminal;
pub mod ui;

pub use app::DashboardApp;
pub use terminal::run_dashboard;
