//! Terminal rendering: per-interface tables, legend and the metric graph.
//! Pure consumer of snapshots; core state is only touched via the reset key
//! handled in the event loop.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    symbols,
    text::{Line as TextLine, Span},
    widgets::{
        canvas::{Canvas, Line},
        Block, BorderType, Borders, Paragraph,
    },
    Frame,
};

use crate::stats::{InterfaceStats, SeriesView, SERIES_LEN};

/// Which of the four metric pairs the graph and legend currently show.
/// Pure UI state, switched with the p/b/e/d keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricView {
    Packets,
    Bytes,
    Errors,
    Dropped,
}

impl MetricView {
    pub fn label(self) -> &'static str {
        match self {
            MetricView::Packets => "Packets",
            MetricView::Bytes => "Bytes",
            MetricView::Errors => "Errors",
            MetricView::Dropped => "Dropped",
        }
    }

    fn pick(self, series: &SeriesView) -> (&[f64], &[f64]) {
        match self {
            MetricView::Packets => (&series.tx_packets, &series.rx_packets),
            MetricView::Bytes => (&series.tx_bytes, &series.rx_bytes),
            MetricView::Errors => (&series.tx_errors, &series.rx_errors),
            MetricView::Dropped => (&series.tx_dropped, &series.rx_dropped),
        }
    }
}

// Dim for TX, bright for RX, cycling when there are more interfaces than
// palette entries.
const PALETTE: [(Color, Color); 6] = [
    (Color::Red, Color::LightRed),
    (Color::Green, Color::LightGreen),
    (Color::Yellow, Color::LightYellow),
    (Color::Blue, Color::LightBlue),
    (Color::Magenta, Color::LightMagenta),
    (Color::Cyan, Color::LightCyan),
];

pub fn interface_colors(index: usize) -> (Color, Color) {
    PALETTE[index % PALETTE.len()]
}

pub fn draw(frame: &mut Frame, snapshots: &[InterfaceStats], view: MetricView) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(42), Constraint::Min(20)])
        .split(frame.size());

    draw_tables(frame, chunks[0], snapshots, view);
    draw_graph(frame, chunks[1], snapshots, view);
}

fn draw_tables(frame: &mut Frame, area: Rect, snapshots: &[InterfaceStats], view: MetricView) {
    let mut constraints: Vec<Constraint> = snapshots.iter().map(|_| Constraint::Length(8)).collect();
    constraints.push(Constraint::Min(3));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (i, stats) in snapshots.iter().enumerate() {
        let (dim, _) = interface_colors(i);
        let table = Paragraph::new(stats.render_table()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(dim)),
        );
        frame.render_widget(table, rows[i]);
    }

    draw_legend(frame, rows[snapshots.len()], snapshots, view);
}

fn draw_legend(frame: &mut Frame, area: Rect, snapshots: &[InterfaceStats], view: MetricView) {
    let mut lines = Vec::with_capacity(snapshots.len() * 2);
    for (i, stats) in snapshots.iter().enumerate() {
        let (dim, bright) = interface_colors(i);
        lines.push(TextLine::from(Span::styled(
            format!("TX {}: {}", view.label(), stats.name),
            Style::default().fg(dim),
        )));
        lines.push(TextLine::from(Span::styled(
            format!("RX {}: {}", view.label(), stats.name),
            Style::default().fg(bright),
        )));
    }
    let legend = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Double),
    );
    frame.render_widget(legend, area);
}

fn draw_graph(frame: &mut Frame, area: Rect, snapshots: &[InterfaceStats], view: MetricView) {
    // Shared y scale across every plotted series so the lines are comparable.
    let mut max_val = 1.0_f64;
    for stats in snapshots {
        let (tx, rx) = view.pick(&stats.series);
        for &v in tx.iter().chain(rx) {
            max_val = max_val.max(v);
        }
    }

    let title = format!(
        " {}/s  P=Packets B=Bytes E=Errors D=Dropped R=Reset Q=Quit ",
        view.label()
    );
    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(symbols::Marker::Braille)
        .x_bounds([0.0, (SERIES_LEN - 1) as f64])
        .y_bounds([0.0, max_val])
        .paint(|ctx| {
            for (i, stats) in snapshots.iter().enumerate() {
                let (dim, bright) = interface_colors(i);
                let (tx, rx) = view.pick(&stats.series);
                plot_series(ctx, tx, dim);
                plot_series(ctx, rx, bright);
            }
        });
    frame.render_widget(canvas, area);
}

// Series are newest-first; flip so time runs left to right.
fn plot_series(ctx: &mut ratatui::widgets::canvas::Context, series: &[f64], color: Color) {
    let last = series.len().saturating_sub(1);
    for i in 0..last {
        let x1 = (last - i - 1) as f64;
        let x2 = (last - i) as f64;
        ctx.draw(&Line {
            x1,
            y1: series[i + 1],
            x2,
            y2: series[i],
            color,
        });
    }
}
