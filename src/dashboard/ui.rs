//! Dashboard rendering.

use std::collections::BTreeMap;

use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Row, Table, Wrap};
use ratatui::Frame;

use crate::dashboard::app::DashboardApp;
use crate::rates::apy::{format_percent, format_timestamp};
use crate::rates::types::{DashboardSnapshot, RatePoint};
use crate::types::RateKind;

const BORROW_COLOR: Color = Color::Red;
const DEPOSIT_COLOR: Color = Color::Green;

/// Draw the whole dashboard.
pub fn draw(frame: &mut Frame, app: &DashboardApp) {
    let [header, body, help] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(5),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_header(frame, header, app);

    let [chart_area, side_area] =
        Layout::horizontal([Constraint::Percentage(75), Constraint::Percentage(25)]).areas(body);

    match app.snapshot() {
        Some(snapshot) if snapshot.has_data() => {
            draw_chart(frame, chart_area, snapshot, app.display_offset_hours());
        }
        Some(snapshot) => draw_no_data(frame, chart_area, snapshot.error.as_deref()),
        None => draw_loading(frame, chart_area, app.selected_token()),
    }
    draw_side_panel(frame, side_area, app);

    let help_line = Paragraph::new(
        "←/→ token   ↑/↓ days   r refresh   d raw data   q quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help_line, help);
}

fn draw_header(frame: &mut Frame, area: Rect, app: &DashboardApp) {
    let status = if app.is_loading() { "  refreshing..." } else { "" };
    let line = Line::from(vec![
        Span::styled(
            "Drift Protocol Rate History Dashboard",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "  | Token: {} [{}/{}] | Days: {} | auto-refresh {}s | UTC{:+}",
            app.selected_token(),
            app.selected_index() + 1,
            app.token_count(),
            app.days(),
            app.refresh_interval_seconds(),
            app.display_offset_hours(),
        )),
        Span::styled(status, Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn chart_data(points: &[RatePoint]) -> Vec<(f64, f64)> {
    points
        .iter()
        .map(|p| (p.timestamp as f64, p.apy * 100.0))
        .collect()
}

/// X and Y bounds covering every point, with headroom above the maximum.
pub fn chart_bounds(series: &[&[(f64, f64)]]) -> ([f64; 2], [f64; 2]) {
    let mut x = [f64::MAX, f64::MIN];
    let mut y_max: f64 = 0.0;
    let mut y_min: f64 = 0.0;
    for &(px, py) in series.iter().flat_map(|s| s.iter()) {
        x[0] = x[0].min(px);
        x[1] = x[1].max(px);
        y_max = y_max.max(py);
        y_min = y_min.min(py);
    }
    if x[0] > x[1] {
        x = [0.0, 1.0];
    } else if x[0] == x[1] {
        x = [x[0] - 1.0, x[1] + 1.0];
    }
    if y_max <= y_min {
        y_max = y_min + 1.0;
    }
    (x, [y_min, y_max * 1.1])
}

fn draw_chart(frame: &mut Frame, area: Rect, snapshot: &DashboardSnapshot, offset_hours: i32) {
    let borrow = chart_data(snapshot.series(RateKind::Borrow));
    let deposit = chart_data(snapshot.series(RateKind::Deposit));
    let (x_bounds, y_bounds) = chart_bounds(&[borrow.as_slice(), deposit.as_slice()]);

    let datasets = vec![
        Dataset::default()
            .name("Borrow APY")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(BORROW_COLOR))
            .data(&borrow),
        Dataset::default()
            .name("Deposit APY")
            .marker(Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(DEPOSIT_COLOR))
            .data(&deposit),
    ];

    let x_labels = vec![
        Span::raw(format_timestamp(x_bounds[0] as i64, offset_hours)),
        Span::raw(format_timestamp(x_bounds[1] as i64, offset_hours)),
    ];
    let y_labels = vec![
        Span::raw(format!("{:.2}%", y_bounds[0])),
        Span::raw(format!("{:.2}%", (y_bounds[0] + y_bounds[1]) / 2.0)),
        Span::raw(format!("{:.2}%", y_bounds[1])),
    ];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} Deposit & Borrow APY ", snapshot.token)),
        )
        .x_axis(
            Axis::default()
                .title("Date")
                .style(Style::default().fg(Color::Gray))
                .bounds(x_bounds)
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("APY")
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(y_labels),
        );
    frame.render_widget(chart, area);
}

fn draw_no_data(frame: &mut Frame, area: Rect, error: Option<&str>) {
    let mut lines = vec![Line::styled(
        "No data available. Please check your connection or try again later.",
        Style::default().fg(Color::Yellow),
    )];
    if let Some(error) = error {
        lines.push(Line::raw(""));
        lines.push(Line::styled(error.to_string(), Style::default().fg(Color::Red)));
    }
    let warning = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(warning, area);
}

fn draw_loading(frame: &mut Frame, area: Rect, token: &str) {
    let loading = Paragraph::new(format!("Loading {} rates...", token))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(loading, area);
}

fn latest_apy(snapshot: Option<&DashboardSnapshot>, kind: RateKind) -> String {
    snapshot
        .and_then(|s| s.latest(kind))
        .map(|p| format_percent(p.apy))
        .unwrap_or_else(|| "n/a".to_string())
}

fn draw_side_panel(frame: &mut Frame, area: Rect, app: &DashboardApp) {
    let snapshot = app.snapshot();
    let metrics_height = if snapshot.and_then(|s| s.error.as_ref()).is_some() { 14 } else { 11 };
    let [metrics_area, raw_area] =
        Layout::vertical([Constraint::Length(metrics_height), Constraint::Min(0)]).areas(area);

    let label = Style::default().fg(Color::Gray);
    let mut lines = vec![
        Line::styled("Latest Borrow APY", label),
        Line::styled(
            latest_apy(snapshot, RateKind::Borrow),
            Style::default().fg(BORROW_COLOR).add_modifier(Modifier::BOLD),
        ),
        Line::styled("Latest Deposit APY", label),
        Line::styled(
            latest_apy(snapshot, RateKind::Deposit),
            Style::default().fg(DEPOSIT_COLOR).add_modifier(Modifier::BOLD),
        ),
        Line::styled("Data Points", label),
        Line::raw(snapshot.map(|s| s.data_points()).unwrap_or(0).to_string()),
        Line::styled("Stored Samples", label),
        Line::raw(snapshot.map(|s| s.stored_samples).unwrap_or(0).to_string()),
        Line::raw(
            snapshot
                .map(|s| format!("Updated {}", format_timestamp(s.refreshed_at, app.display_offset_hours())))
                .unwrap_or_default(),
        ),
    ];
    if let Some(error) = snapshot.and_then(|s| s.error.as_ref()) {
        lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
    }

    let metrics = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Latest Data ({}) ", app.selected_token())),
    );
    frame.render_widget(metrics, metrics_area);

    if app.show_raw() {
        if let Some(snapshot) = snapshot {
            draw_raw_data(frame, raw_area, snapshot, app.display_offset_hours());
        }
    }
}

/// Rows of (timestamp, borrow APY, deposit APY), newest first.
pub fn raw_rows(snapshot: &DashboardSnapshot) -> Vec<(i64, Option<f64>, Option<f64>)> {
    let mut rows: BTreeMap<i64, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for p in snapshot.series(RateKind::Borrow) {
        rows.entry(p.timestamp).or_default().0 = Some(p.apy);
    }
    for p in snapshot.series(RateKind::Deposit) {
        rows.entry(p.timestamp).or_default().1 = Some(p.apy);
    }
    rows.into_iter()
        .rev()
        .map(|(ts, (borrow, deposit))| (ts, borrow, deposit))
        .collect()
}

fn draw_raw_data(frame: &mut Frame, area: Rect, snapshot: &DashboardSnapshot, offset_hours: i32) {
    let cell = |v: Option<f64>| v.map(format_percent).unwrap_or_else(|| "-".to_string());
    let rows = raw_rows(snapshot).into_iter().map(|(ts, borrow, deposit)| {
        Row::new(vec![
            format_timestamp(ts, offset_hours),
            cell(borrow),
            cell(deposit),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(16),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(
        Row::new(vec!["date", "borrow_apy", "deposit_apy"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(" Raw Data "));
    frame.render_widget(table, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::config::RatesConfig;
    use crate::rates::types::RatePoint;
    use nonempty::NonEmpty;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn render(app: &DashboardApp) -> String {
        let backend = TestBackend::new(140, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app() -> DashboardApp {
        DashboardApp::new(NonEmpty::new("SOL".to_string()), &RatesConfig::default())
    }

    #[test]
    fn test_renders_loading_before_first_snapshot() {
        let screen = render(&app());
        assert!(screen.contains("Drift Protocol Rate History Dashboard"));
        assert!(screen.contains("Loading SOL rates..."));
        assert!(screen.contains("Latest Data (SOL)"));
    }

    #[test]
    fn test_renders_latest_metrics() {
        let mut app = app();
        app.apply_snapshot(DashboardSnapshot {
            token: "SOL".to_string(),
            days: 30,
            deposit: vec![RatePoint { timestamp: 0, rate: 0.02, apy: 0.0202 }],
            borrow: vec![RatePoint { timestamp: 0, rate: 0.05, apy: 0.0513 }],
            stored_samples: 1,
            refreshed_at: 0,
            error: None,
        });

        let screen = render(&app);
        assert!(screen.contains("SOL Deposit & Borrow APY"));
        assert!(screen.contains("5.1300%"));
        assert!(screen.contains("2.0200%"));
    }

    #[test]
    fn test_renders_warning_without_data() {
        let mut app = app();
        app.apply_snapshot(DashboardSnapshot {
            token: "SOL".to_string(),
            error: Some("history: offline".to_string()),
            ..Default::default()
        });

        let screen = render(&app);
        assert!(screen.contains("No data available."));
        assert!(screen.contains("history: offline"));
    }

    #[test]
    fn test_raw_rows_newest_first() {
        let snapshot = DashboardSnapshot {
            deposit: vec![RatePoint::from_rate(1, 0.01), RatePoint::from_rate(2, 0.02)],
            borrow: vec![RatePoint::from_rate(2, 0.05)],
            ..Default::default()
        };
        let rows = raw_rows(&snapshot);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 2);
        assert!(rows[0].1.is_some());
        assert!(rows[1].1.is_none());
    }

    #[test]
    fn test_chart_bounds_pad_single_point() {
        let points = [(10.0, 5.0)];
        let (x, y) = chart_bounds(&[&points[..]]);
        assert_eq!(x, [9.0, 11.0]);
        assert_eq!(y[0], 0.0);
        assert!((y[1] - 5.5).abs() < 1e-12);
    }
}
