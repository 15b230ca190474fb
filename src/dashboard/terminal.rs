//! Terminal session management and the dashboard event loop.

use std::io::{stdout, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEvent};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::dashboard::app::DashboardApp;
use crate::dashboard::ui;
use crate::rates::config::RatesConfig;
use crate::rates::sampler::RateSampler;
use crate::rates::types::DashboardSnapshot;

const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(100);
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

/// Raw-mode, alternate-screen terminal restored on drop.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn new() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;

        let mut out = stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(err).context("Failed to enter alternate screen");
        }

        match Terminal::new(CrosstermBackend::new(out)) {
            Ok(terminal) => Ok(Self { terminal }),
            Err(err) => {
                let _ = disable_raw_mode();
                let _ = execute!(stdout(), LeaveAlternateScreen);
                Err(err).context("Failed to initialize terminal")
            }
        }
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Forward key presses from a blocking reader thread until the receiver
/// is dropped.
fn spawn_input_pump() -> mpsc::Receiver<KeyEvent> {
    let (key_sender, key_receiver) = mpsc::channel(64);
    std::thread::spawn(move || {
        while !key_sender.is_closed() {
            match event::poll(INPUT_POLL_TIMEOUT) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => {
                        if key_sender.blocking_send(key).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Failed to read terminal event: {}", e);
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to poll terminal events: {}", e);
                    break;
                }
            }
        }
    });
    key_receiver
}

/// Run the interactive dashboard until the user quits.
pub async fn run_dashboard(config: &RatesConfig, sampler: RateSampler) -> Result<()> {
    let tokens = config.token_list()?;
    let mut app = DashboardApp::new(tokens, config);

    let (command_sender, command_receiver) = mpsc::channel(16);
    let (snapshot_sender, mut snapshot_receiver) = mpsc::channel::<DashboardSnapshot>(4);

    let sampler_handle = tokio::spawn(sampler.run(
        app.selected_token().to_string(),
        app.days(),
        config.refresh_interval(),
        command_receiver,
        snapshot_sender,
    ));

    let mut session = TerminalSession::new()?;
    let mut keys = spawn_input_pump();
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);
    info!("Dashboard started for {}", app.selected_token());

    loop {
        session
            .terminal
            .draw(|frame| ui::draw(frame, &app))
            .context("Failed to draw dashboard")?;

        tokio::select! {
            key = keys.recv() => match key {
                Some(key) => {
                    if let Some(command) = app.handle_key(key) {
                        if let Err(e) = command_sender.send(command).await {
                            error!("Sampler stopped accepting commands: {}", e);
                            break;
                        }
                    }
                }
                None => {
                    warn!("Terminal input closed, leaving dashboard");
                    app.input_closed();
                }
            },
            Some(snapshot) = snapshot_receiver.recv() => {
                if !app.apply_snapshot(snapshot) {
                    info!("Dropped snapshot for a previously selected token");
                }
            }
            _ = redraw.tick() => {}
        }

        if app.should_quit() {
            break;
        }
    }

    drop(command_sender);
    sampler_handle.abort();
    info!("Dashboard closed");
    Ok(())
}
