//! TUI application state and event loop.
//!
//! The stream controller generates intervals on the tokio runtime. The UI
//! thread polls keys every 50ms and picks up the newest snapshot from the
//! controller's watch channel before each frame, so drawing never blocks
//! generation.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tokio::sync::watch;

use syringe_sim_core::{
    SessionState, Snapshot, StreamConfig, StreamController, SummaryMetrics, TagId,
};

// ---------------------------------------------------------------------------
// Param
// ---------------------------------------------------------------------------

/// Adjustable stream parameter (one slider in the control panel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Param {
    #[default]
    Speed,
    FlangeRate,
    GlassRate,
    WallRate,
    Inspections,
}

impl Param {
    pub const ALL: [Param; 5] = [
        Param::Speed,
        Param::FlangeRate,
        Param::GlassRate,
        Param::WallRate,
        Param::Inspections,
    ];

    pub fn next(self) -> Self {
        match self {
            Self::Speed => Self::FlangeRate,
            Self::FlangeRate => Self::GlassRate,
            Self::GlassRate => Self::WallRate,
            Self::WallRate => Self::Inspections,
            Self::Inspections => Self::Speed,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Speed => Self::Inspections,
            Self::FlangeRate => Self::Speed,
            Self::GlassRate => Self::FlangeRate,
            Self::WallRate => Self::GlassRate,
            Self::Inspections => Self::WallRate,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Speed => "Stream speed",
            Self::FlangeRate => "Flange defect",
            Self::GlassRate => "Glass defect",
            Self::WallRate => "Wall defect",
            Self::Inspections => "Inspections",
        }
    }

    /// Current value formatted for the control panel.
    pub fn display(self, config: &StreamConfig) -> String {
        match self {
            Self::Speed => format!("{}s", config.stream_speed_secs),
            Self::FlangeRate => format!("{:.1}%", config.rates.flange),
            Self::GlassRate => format!("{:.1}%", config.rates.glass),
            Self::WallRate => format!("{:.1}%", config.rates.wall),
            Self::Inspections => format!("{}", config.inspections_per_interval),
        }
    }

    /// Move the value `steps` slider notches. Range clamping happens in the controller.
    pub fn adjust(self, config: &mut StreamConfig, steps: i32) {
        let nudge_rate = |rate: f64| ((rate + 0.1 * f64::from(steps)) * 10.0).round() / 10.0;
        match self {
            Self::Speed => {
                config.stream_speed_secs = config
                    .stream_speed_secs
                    .saturating_add_signed(i64::from(steps));
            }
            Self::FlangeRate => config.rates.flange = nudge_rate(config.rates.flange),
            Self::GlassRate => config.rates.glass = nudge_rate(config.rates.glass),
            Self::WallRate => config.rates.wall = nudge_rate(config.rates.wall),
            Self::Inspections => {
                config.inspections_per_interval = config
                    .inspections_per_interval
                    .saturating_add_signed(steps.saturating_mul(INSPECTIONS_STEP));
            }
        }
    }
}

/// Slider notch for inspections per interval.
const INSPECTIONS_STEP: i32 = 50;

// ---------------------------------------------------------------------------
// Chart helpers
// ---------------------------------------------------------------------------

/// Raw per-interval counts for `tag`, indexed by interval number.
pub fn count_points(snapshot: &Snapshot, tag: TagId) -> Vec<(f64, f64)> {
    snapshot
        .series(tag)
        .filter_map(|s| s.count_value())
        .enumerate()
        .map(|(i, v)| ((i + 1) as f64, v as f64))
        .collect()
}

/// Running totals for `tag` (only tag-4 and tag-5 have any).
pub fn cumulative_points(snapshot: &Snapshot, tag: TagId) -> Vec<(f64, f64)> {
    snapshot
        .cumulative
        .series(tag)
        .iter()
        .enumerate()
        .map(|(i, p)| ((i + 1) as f64, p.total as f64))
        .collect()
}

/// Upper Y bound with a little headroom; never below `floor`.
pub fn y_upper(points: &[&[(f64, f64)]], floor: f64) -> f64 {
    let max = points
        .iter()
        .flat_map(|series| series.iter().map(|&(_, y)| y))
        .fold(0.0, f64::max);
    (max + max / 10.0).ceil().max(floor)
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Editing the batch name; holds the text typed so far.
    BatchName(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub message: String,
    pub is_error: bool,
}

pub struct App {
    controller: StreamController,
    updates: watch::Receiver<Snapshot>,
    snapshot: Snapshot,
    selected: Param,
    input: InputMode,
    status: Option<StatusLine>,
    export_path: PathBuf,
    running: bool,
}

impl App {
    pub fn new(controller: StreamController, export_path: PathBuf) -> Self {
        let updates = controller.subscribe();
        let snapshot = controller.snapshot();
        Self {
            controller,
            updates,
            snapshot,
            selected: Param::default(),
            input: InputMode::Normal,
            status: None,
            export_path,
            running: true,
        }
    }

    /// Run the TUI until the user quits.
    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            original_hook(info);
        }));

        let result = self.run_loop(&mut terminal);

        let _ = std::panic::take_hook();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        if let Some(status) = &self.status {
            println!("{}", status.message);
        }

        result
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while self.running {
            self.refresh();
            terminal.draw(|f| super::ui::draw(f, self))?;

            if event::poll(Duration::from_millis(50))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key.code);
            }
        }
        Ok(())
    }

    /// Pull the newest snapshot if the controller published one.
    pub fn refresh(&mut self) {
        if self.updates.has_changed().unwrap_or(false) {
            self.snapshot = self.updates.borrow_and_update().clone();
        }
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        if let InputMode::BatchName(buffer) = &mut self.input {
            match key {
                KeyCode::Enter => {
                    let name = std::mem::take(buffer);
                    self.input = InputMode::Normal;
                    let cfg = self.controller.modify_config(|c| c.batch_name = name);
                    self.set_status(format!("Batch name set to '{}'", cfg.batch_name), false);
                }
                KeyCode::Esc => self.input = InputMode::Normal,
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) if !c.is_control() => buffer.push(c),
                _ => {}
            }
            return;
        }

        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char(' ') | KeyCode::Enter => {
                let state = self.controller.toggle();
                self.set_status(format!("Stream {state}"), false);
            }
            KeyCode::Char('s') | KeyCode::Char('S') => self.save(),
            KeyCode::Char('b') => {
                self.input = InputMode::BatchName(self.controller.config().batch_name);
            }
            KeyCode::Tab | KeyCode::Down | KeyCode::Char('j') => {
                self.selected = self.selected.next();
            }
            KeyCode::BackTab | KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.prev();
            }
            KeyCode::Right | KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Char('l') => {
                self.adjust(1);
            }
            KeyCode::Left | KeyCode::Char('-') | KeyCode::Char('h') => self.adjust(-1),
            _ => {}
        }
    }

    fn adjust(&mut self, steps: i32) {
        let param = self.selected;
        let cfg = self.controller.modify_config(|c| param.adjust(c, steps));
        self.set_status(
            format!("{} → {} (next interval)", param.label(), param.display(&cfg)),
            false,
        );
    }

    fn save(&mut self) {
        match self.controller.export(&self.export_path) {
            Ok(summary) => self.set_status(
                format!(
                    "Saved {} samples to {}",
                    summary.rows,
                    summary.path.display()
                ),
                false,
            ),
            Err(e) => self.set_status(format!("Save failed: {e}"), true),
        }
    }

    fn set_status(&mut self, message: String, is_error: bool) {
        self.status = Some(StatusLine { message, is_error });
    }

    /// Hand the controller back for shutdown once the UI has exited.
    pub fn into_controller(self) -> StreamController {
        self.controller
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn metrics(&self) -> SummaryMetrics {
        SummaryMetrics::from_snapshot(&self.snapshot, &self.controller.config().batch_name)
    }

    pub fn session(&self) -> SessionState {
        self.controller.session()
    }

    pub fn config(&self) -> StreamConfig {
        self.controller.config()
    }

    pub fn selected(&self) -> Param {
        self.selected
    }

    pub fn input(&self) -> &InputMode {
        &self.input
    }

    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }

    pub fn export_path(&self) -> &PathBuf {
        &self.export_path
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use syringe_sim_core::{StreamState, ZeroNoise};

    use super::*;

    fn app_in(dir: &std::path::Path) -> App {
        let controller = StreamController::with_noise(StreamConfig::default(), ZeroNoise);
        App::new(controller, dir.join("inspection_data.csv"))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn test_param_cycles_through_all_variants() {
        let mut p = Param::default();
        for expected in Param::ALL.iter().skip(1) {
            p = p.next();
            assert_eq!(p, *expected);
        }
        assert_eq!(p.next(), Param::Speed);
        assert_eq!(Param::Speed.prev(), Param::Inspections);
    }

    #[test]
    fn test_param_adjust_steps() {
        let mut cfg = StreamConfig::default();
        Param::GlassRate.adjust(&mut cfg, 1);
        assert_eq!(cfg.rates.glass, 1.6);
        Param::WallRate.adjust(&mut cfg, -3);
        assert_eq!(cfg.rates.wall, 0.5);
        Param::Inspections.adjust(&mut cfg, 2);
        assert_eq!(cfg.inspections_per_interval, 600);
        Param::Speed.adjust(&mut cfg, -9);
        assert_eq!(cfg.stream_speed_secs, 0);
    }

    #[test]
    fn test_param_display() {
        let cfg = StreamConfig::default();
        assert_eq!(Param::Speed.display(&cfg), "5s");
        assert_eq!(Param::GlassRate.display(&cfg), "1.5%");
        assert_eq!(Param::Inspections.display(&cfg), "500");
    }

    #[test]
    fn test_y_upper_has_floor_and_headroom() {
        assert_eq!(y_upper(&[], 10.0), 10.0);
        let a = [(1.0, 50.0), (2.0, 100.0)];
        assert_eq!(y_upper(&[&a[..]], 10.0), 110.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_space_toggles_stream() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app_in(tmp.path());
        app.handle_key(KeyCode::Char(' '));
        assert_eq!(app.session().state, StreamState::Running);
        settle().await;

        app.refresh();
        assert_eq!(app.snapshot().len(), 6);
        assert_eq!(count_points(app.snapshot(), TagId::GlassDefects), vec![(1.0, 7.0)]);
        assert_eq!(
            cumulative_points(app.snapshot(), TagId::Inspected),
            vec![(1.0, 500.0)]
        );

        app.handle_key(KeyCode::Char(' '));
        assert_eq!(app.session().state, StreamState::Stopped);
        assert_eq!(app.metrics().defect_rate_display(), "3.20%");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slider_keys_clamp() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app_in(tmp.path());
        for _ in 0..20 {
            app.handle_key(KeyCode::Right);
        }
        assert_eq!(app.config().stream_speed_secs, 10);

        app.handle_key(KeyCode::Tab);
        assert_eq!(app.selected(), Param::FlangeRate);
        for _ in 0..20 {
            app.handle_key(KeyCode::Left);
        }
        assert_eq!(app.config().rates.flange, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_name_editing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app_in(tmp.path());
        app.handle_key(KeyCode::Char('b'));
        assert_eq!(app.input(), &InputMode::BatchName("Batch-1".into()));

        for _ in 0.."Batch-1".len() {
            app.handle_key(KeyCode::Backspace);
        }
        for c in "Lot-7".chars() {
            app.handle_key(KeyCode::Char(c));
        }
        // 'q' is text while editing, not quit
        app.handle_key(KeyCode::Char('q'));
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.input(), &InputMode::Normal);
        assert_eq!(app.config().batch_name, "Lot-7q");

        app.handle_key(KeyCode::Char(' '));
        settle().await;
        app.refresh();
        assert_eq!(app.metrics().batch_name, "Lot-7q");
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_reports_status() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app_in(tmp.path());

        app.handle_key(KeyCode::Char('s'));
        assert!(app.status().is_some_and(|s| s.is_error));

        app.handle_key(KeyCode::Char(' '));
        settle().await;
        app.handle_key(KeyCode::Char('s'));
        let status = app.status().unwrap();
        assert!(!status.is_error);
        assert!(status.message.starts_with("Saved 6 samples"));
        assert!(app.export_path().exists());
        assert_eq!(app.session().state, StreamState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_key() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app_in(tmp.path());
        app.handle_key(KeyCode::Char('q'));
        assert!(!app.running);
    }
}
