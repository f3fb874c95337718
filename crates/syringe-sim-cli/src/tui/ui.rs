//! TUI rendering.
//!
//! ┌──────────────────────────────────────────────────────┐
//! │  💉 Syringe Inspection   RUNNING  batch: Batch-1  #12 │
//! ├──────────────┬───────────────────────────────────────┤
//! │  Controls    │  Defects per interval (tag-1..3)      │
//! │  ▸ speed 5s  │                                       │
//! │    flange    ├───────────────────┬───────────────────┤
//! │    ...       │  Total defects Σ  │  Inspected Σ      │
//! ├──────────────┴───────────────────┴───────────────────┤
//! │  inspected 6000   defects 192   rate 3.20%   Batch-1  │
//! ├──────────────────────────────────────────────────────┤
//! │  status                                              │
//! │  space: start/stop   s: save   b: batch   q: quit    │
//! └──────────────────────────────────────────────────────┘

use ratatui::{prelude::*, widgets::*};
use syringe_sim_core::TagId;

use super::app::{App, InputMode, Param, count_points, cumulative_points, y_upper};

pub fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(12),   // main
            Constraint::Length(3), // metrics
            Constraint::Length(1), // status
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app);
    draw_main(f, rows[1], app);
    draw_metrics(f, rows[2], app);
    draw_status(f, rows[3], app);
    draw_keys(f, rows[4], app);
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let session = app.session();
    let (state_label, state_color) = if session.state.is_running() {
        ("RUNNING", Color::Green)
    } else {
        ("STOPPED", Color::Red)
    };
    let batch = session
        .batch_name
        .unwrap_or_else(|| app.config().batch_name);
    let started = session
        .start_time
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "—".into());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(
                " 💉 Syringe Inspection ",
                Style::default().bold().fg(Color::Cyan),
            ),
            Span::styled(
                format!(" {state_label} "),
                Style::default().bold().fg(state_color),
            ),
            Span::raw("  batch: "),
            Span::styled(batch, Style::default().bold().fg(Color::Yellow)),
            Span::styled(
                format!(
                    "  started {started}  #{}  {} samples ",
                    session.intervals,
                    app.snapshot().len()
                ),
                Style::default().fg(Color::DarkGray),
            ),
        ]));

    f.render_widget(block, area);
}

fn draw_main(f: &mut Frame, area: Rect, app: &App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(40)])
        .split(area);

    draw_controls(f, cols[0], app);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(cols[1]);
    draw_defects_chart(f, right[0], app);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(right[1]);
    draw_cumulative_chart(f, bottom[0], app, TagId::TotalDefects, Color::Red);
    draw_cumulative_chart(f, bottom[1], app, TagId::Inspected, Color::Green);
}

fn draw_controls(f: &mut Frame, area: Rect, app: &App) {
    let config = app.config();

    let mut rows: Vec<Row> = Param::ALL
        .iter()
        .map(|&param| {
            let is_selected = param == app.selected();
            let pointer = if is_selected { "▸" } else { " " };
            let style = if is_selected {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            };
            Row::new(vec![
                pointer.to_string(),
                param.label().to_string(),
                param.display(&config),
            ])
            .style(style)
        })
        .collect();

    let (batch_text, batch_style) = match app.input() {
        InputMode::BatchName(buffer) => (
            format!("{buffer}▏"),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ),
        InputMode::Normal => (config.batch_name.clone(), Style::default().fg(Color::Yellow)),
    };
    rows.push(Row::new(vec![String::new(), String::new(), String::new()]));
    rows.push(Row::new(vec![" ".to_string(), "Batch".to_string(), batch_text]).style(batch_style));

    let table = Table::new(
        rows,
        [
            Constraint::Length(2),  // pointer
            Constraint::Length(14), // label
            Constraint::Min(8),     // value
        ],
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Controls (←→ adjust) "),
    );

    f.render_widget(table, area);
}

fn draw_defects_chart(f: &mut Frame, area: Rect, app: &App) {
    let snapshot = app.snapshot();
    let flange = count_points(snapshot, TagId::FlangeDefects);
    let glass = count_points(snapshot, TagId::GlassDefects);
    let wall = count_points(snapshot, TagId::WallDefects);

    if flange.is_empty() {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Defects per interval ");
        let p = Paragraph::new("Press space to start the inspection stream")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(p, area);
        return;
    }

    let x_max = (flange.len() as f64).max(10.0);
    let y_max = y_upper(&[&flange[..], &glass[..], &wall[..]], 5.0);

    let series = [
        (TagId::FlangeDefects, &flange, Color::Cyan),
        (TagId::GlassDefects, &glass, Color::Magenta),
        (TagId::WallDefects, &wall, Color::Yellow),
    ];
    let datasets: Vec<Dataset> = series
        .iter()
        .map(|(tag, data, color)| {
            let latest = data.last().map_or(0.0, |&(_, y)| y);
            Dataset::default()
                .name(format!("{} {latest:.0}", tag.label()))
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(*color))
                .data(data)
        })
        .collect();

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Defects per interval "),
        )
        .x_axis(Axis::default().bounds([1.0, x_max]).labels(vec![
            Line::from("1"),
            Line::from(format!("{}", flange.len())),
        ]))
        .y_axis(Axis::default().bounds([0.0, y_max]).labels(vec![
            Line::from("0"),
            Line::from(format!("{y_max:.0}")),
        ]));

    f.render_widget(chart, area);
}

fn draw_cumulative_chart(f: &mut Frame, area: Rect, app: &App, tag: TagId, color: Color) {
    let data = cumulative_points(app.snapshot(), tag);
    let title = format!(" Cumulative {} ", tag.label());

    if data.is_empty() {
        let block = Block::default().borders(Borders::ALL).title(title);
        let p = Paragraph::new("No data yet")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(p, area);
        return;
    }

    let latest = data.last().map_or(0.0, |&(_, y)| y);
    let x_max = (data.len() as f64).max(10.0);
    let y_max = y_upper(&[&data[..]], 10.0);

    let datasets = vec![
        Dataset::default()
            .name(format!("{latest:.0}"))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(color))
            .data(&data),
    ];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(Axis::default().bounds([1.0, x_max]).labels(vec![
            Line::from("1"),
            Line::from(format!("{}", data.len())),
        ]))
        .y_axis(Axis::default().bounds([0.0, y_max]).labels(vec![
            Line::from("0"),
            Line::from(format!("{y_max:.0}")),
        ]));

    f.render_widget(chart, area);
}

fn draw_metrics(f: &mut Frame, area: Rect, app: &App) {
    let m = app.metrics();
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().bold();

    let line = Line::from(vec![
        Span::styled(" Total inspected: ", label),
        Span::styled(m.total_inspected.to_string(), value),
        Span::styled("   Total defects: ", label),
        Span::styled(m.total_defects.to_string(), value.fg(Color::Red)),
        Span::styled("   Defect rate: ", label),
        Span::styled(m.defect_rate_display(), value.fg(Color::Yellow)),
        Span::styled("   Batch: ", label),
        Span::styled(m.batch_name, value.fg(Color::Cyan)),
    ]);

    let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL).title(" Metrics "));
    f.render_widget(p, area);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let (text, style) = match app.status() {
        Some(s) if s.is_error => (s.message.clone(), Style::default().fg(Color::Red)),
        Some(s) => (s.message.clone(), Style::default().fg(Color::Green)),
        None => (
            format!("Saving to {}", app.export_path().display()),
            Style::default().fg(Color::DarkGray),
        ),
    };
    f.render_widget(Paragraph::new(format!(" {text}")).style(style), area);
}

fn draw_keys(f: &mut Frame, area: Rect, app: &App) {
    let keys = match app.input() {
        InputMode::BatchName(_) => " type batch name   enter: apply   esc: cancel",
        InputMode::Normal => {
            " space: start/stop   s: save   tab/↑↓: select   ←→: adjust   b: batch name   q: quit"
        }
    };
    let bar = Paragraph::new(keys).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}
