//! Top-level application state and the main event loop.
//!
//! [`App::run`] sets up the terminal, drives the event loop, and tears
//! everything down cleanly on exit or panic. Feeds poll on their own tasks;
//! the loop only reads their latest snapshots when drawing.

use std::{io, path::PathBuf, sync::Arc, thread, time::Duration};

use crossterm::{
    event::{self as ct_event, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use loglens_core::{
    config::Config,
    export::{ExportFormat, ExportOptions},
    view::{Dashboard, DeleteOutcome},
    FetchError, FilterSpec, LogBackend, Role, SourceSpec,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction as LayoutDir, Layout, Rect},
    Frame, Terminal,
};
use tokio::sync::mpsc;

use crate::{
    commands::Command,
    event::{self, AppEvent},
    theme::Theme,
    widgets::{
        anomaly_list::AnomalyList,
        command_bar::{CommandBar, CommandBarState, Submit},
        help::HelpPopup,
        level_chart::LevelChart,
        log_list::{LogList, LogListState},
        status_bar::{StatusBar, StatusMessage},
    },
};

/// Redraw cadence when no input arrives, so feed updates show up.
const TICK: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Focus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Logs,
    Anomalies,
    /// Vim-style `:` command line is active.
    Command,
}

/// Completion of a background action, delivered back to the event loop.
#[derive(Debug)]
pub enum Notice {
    /// The backend accepted switch number `.0`.
    SourceSwitched(u64, SourceSpec),
    SourceFailed(u64, SourceSpec, FetchError),
    Exported(PathBuf),
    ExportFailed(String),
    Deleted(DeleteOutcome),
}

/// A queued `POST /api/source`, tagged with its issue order.
#[derive(Debug)]
struct SourceSwitch {
    seq: u64,
    source: SourceSpec,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub focus: Focus,
    /// Focus before entering command mode, restored on exit.
    pub prev_focus: Focus,
    pub theme: Theme,
    pub show_help: bool,
    pub command_bar: CommandBarState,
    pub log_list: LogListState,
    pub message: Option<StatusMessage>,
    pub export_dir: PathBuf,
    pub chart_height_pct: u16,
    pub quit: bool,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App<B> {
    state: AppState,
    dashboard: Dashboard<B>,
    notices_tx: mpsc::UnboundedSender<Notice>,
    notices_rx: mpsc::UnboundedReceiver<Notice>,
    /// Queue of the source switch worker, spawned on first use.
    switches: Option<mpsc::UnboundedSender<SourceSwitch>>,
    /// Sequence number of the latest switch issued.
    source_seq: u64,
}

impl<B: LogBackend> App<B> {
    pub fn new(backend: Arc<B>, config: &Config, source_key: &str, role: Role, theme: Theme) -> Self {
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        let state = AppState {
            focus: Focus::Logs,
            prev_focus: Focus::Logs,
            theme,
            show_help: false,
            command_bar: CommandBarState::default(),
            log_list: LogListState::new(config.ui.show_timestamps, config.ui.timestamp_format.clone()),
            message: None,
            export_dir: config.export.directory.clone(),
            chart_height_pct: config.ui.chart_height_pct.clamp(10, 80),
            quit: false,
        };
        App {
            state,
            dashboard: Dashboard::new(backend, config, source_key, role),
            notices_tx,
            notices_rx,
            switches: None,
            source_seq: 0,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn dashboard(&self) -> &Dashboard<B> {
        &self.dashboard
    }

    /// Set up the terminal, run the event loop, and restore the terminal on exit.
    ///
    /// Must be called inside a tokio runtime: the feeds are spawned here.
    pub async fn run(mut self, initial_source: Option<SourceSpec>) -> anyhow::Result<()> {
        install_panic_hook();

        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;

        self.dashboard.start();
        if let Some(source) = initial_source {
            self.switch_source(source);
        }

        let input = spawn_input_reader();
        let result = self.event_loop(&mut terminal, input).await;

        self.dashboard.stop_all();

        // Always restore terminal, even if the loop returned an error
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = terminal.show_cursor();

        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        mut input: mpsc::UnboundedReceiver<Event>,
    ) -> anyhow::Result<()> {
        let mut tick = tokio::time::interval(TICK);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            terminal.draw(|frame| draw(frame, &self.state, &self.dashboard))?;

            if self.state.quit {
                break;
            }

            tokio::select! {
                raw = input.recv() => match raw {
                    Some(raw) => self.on_terminal_event(raw),
                    None => {
                        tracing::warn!("terminal input closed");
                        self.state.quit = true;
                    }
                },
                Some(notice) = self.notices_rx.recv() => self.apply_notice(notice),
                _ = tick.tick() => {}
            }
        }
        Ok(())
    }

    fn on_terminal_event(&mut self, raw: Event) {
        if let Event::Key(key) = raw {
            if key.kind != KeyEventKind::Press {
                return;
            }
        }
        // Use insert-mode mapping while the command bar is open
        let app_event = if self.state.focus == Focus::Command {
            event::to_app_event_insert(raw)
        } else {
            event::to_app_event(raw)
        };
        if let Some(ev) = app_event {
            tracing::debug!(focus = ?self.state.focus, event = ?ev, "key event");
            self.handle(ev);
        }
    }

    pub fn handle(&mut self, event: AppEvent) {
        // Help popup intercepts all events; only close keys pass through.
        if self.state.show_help {
            match event {
                AppEvent::Char('?') | AppEvent::Escape | AppEvent::Quit => {
                    tracing::debug!("help popup closed");
                    self.state.show_help = false;
                }
                _ => {}
            }
            return;
        }

        // Command mode intercepts all events.
        if self.state.focus == Focus::Command {
            if let Some(submit) = self.state.command_bar.handle(&event) {
                self.state.focus = self.state.prev_focus;
                if let Submit::Run(cmd) = submit {
                    self.execute(cmd);
                }
            }
            return;
        }

        match event {
            AppEvent::Char('?') => {
                tracing::debug!("help popup opened");
                self.state.show_help = true;
            }
            AppEvent::Char(':') => {
                tracing::debug!(prev_focus = ?self.state.focus, "entering command mode");
                self.state.prev_focus = self.state.focus;
                self.state.command_bar.clear();
                self.state.focus = Focus::Command;
            }
            AppEvent::Quit => {
                tracing::debug!("quit");
                self.state.quit = true;
            }
            AppEvent::FocusNext => {
                let next = match self.state.focus {
                    Focus::Logs => Focus::Anomalies,
                    Focus::Anomalies | Focus::Command => Focus::Logs,
                };
                tracing::debug!(from = ?self.state.focus, to = ?next, "focus cycle");
                self.state.focus = next;
            }
            AppEvent::Delete => self.delete_selected(),
            AppEvent::Export => self.export(ExportFormat::Csv, ExportOptions::default()),
            AppEvent::Restart => self.restart(),

            // Terminal resize is handled automatically by ratatui
            AppEvent::Resize(_, _) => {}

            other if self.state.focus == Focus::Logs => {
                let total = self.dashboard.logs.state().records.len();
                self.state.log_list.handle(&other, total);
            }
            _ => {}
        }
    }

    /// Execute a parsed [`Command`].
    fn execute(&mut self, cmd: Command) {
        match cmd {
            Command::Quit => self.state.quit = true,
            Command::Help => self.state.show_help = !self.state.show_help,
            Command::Theme(name) => self.state.theme = Theme::by_name(&name),
            Command::Timestamps => {
                self.state.log_list.show_timestamps = !self.state.log_list.show_timestamps;
            }
            Command::Newest => self.state.log_list.reset(),
            Command::Filter(field, value) => {
                let mut filter = self.dashboard.logs.filter().clone();
                field.apply(&mut filter, &value);
                self.apply_filter(filter);
            }
            Command::ClearFilter => self.apply_filter(FilterSpec::default()),
            Command::Source(source) => self.switch_source(source),
            Command::Export { format, options } => self.export(format, options),
            Command::Delete => self.delete_selected(),
            Command::Restart => self.restart(),
        }
    }

    fn apply_filter(&mut self, filter: FilterSpec) {
        tracing::debug!(filter = ?filter, "filter changed");
        self.dashboard.set_filter(filter);
        self.state.log_list.reset();
    }

    fn restart(&mut self) {
        self.dashboard.restart_all();
        self.state.message = Some(StatusMessage::Info("feeds restarted".to_string()));
    }

    /// Ask the backend to switch collectors; the feeds follow once it agrees.
    ///
    /// Switches go through one worker so the backend sees them in issue
    /// order, and only the notice for the latest switch is applied.
    fn switch_source(&mut self, source: SourceSpec) {
        self.source_seq += 1;
        self.state.message = Some(StatusMessage::Info(format!("switching to {}…", source.key())));
        let request = SourceSwitch { seq: self.source_seq, source };

        let pending = match &self.switches {
            Some(tx) => match tx.send(request) {
                Ok(()) => return,
                Err(mpsc::error::SendError(request)) => request,
            },
            None => request,
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(pending);
        tokio::spawn(run_source_switches(
            Arc::clone(self.dashboard.backend()),
            rx,
            self.notices_tx.clone(),
        ));
        self.switches = Some(tx);
    }

    fn export(&mut self, format: ExportFormat, options: ExportOptions) {
        let exporter = self.dashboard.exporter().clone();
        let filter = self.dashboard.logs.filter().clone();
        let dir = self.state.export_dir.clone();
        let tx = self.notices_tx.clone();
        self.state.message = Some(StatusMessage::Info(format!("exporting {}…", format.as_str())));
        tokio::spawn(async move {
            let notice = match exporter.export(&filter, format, options, &dir).await {
                Ok(path) => Notice::Exported(path),
                Err(err) => Notice::ExportFailed(err.to_string()),
            };
            let _ = tx.send(notice);
        });
    }

    fn delete_selected(&mut self) {
        let entry = {
            let state = self.dashboard.logs.state();
            self.state
                .log_list
                .selected(state.records.len())
                .map(|i| state.records[i].clone())
        };
        let Some(entry) = entry else {
            self.state.message = Some(StatusMessage::Error("no record selected".to_string()));
            return;
        };

        match self.dashboard.logs.delete(&entry) {
            Ok(request) => {
                let tx = self.notices_tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(Notice::Deleted(request.await));
                });
            }
            Err(err) => self.state.message = Some(StatusMessage::Error(err.to_string())),
        }
    }

    pub fn apply_notice(&mut self, notice: Notice) {
        let message = match notice {
            Notice::SourceSwitched(seq, _) | Notice::SourceFailed(seq, ..) if seq != self.source_seq => {
                tracing::debug!(seq, latest = self.source_seq, "ignoring superseded source switch");
                return;
            }
            Notice::SourceSwitched(_, source) => {
                let key = source.key();
                self.dashboard.set_source(&key);
                self.state.log_list.reset();
                StatusMessage::Info(format!("source: {key}"))
            }
            Notice::SourceFailed(_, source, err) => {
                tracing::warn!(source = %source.key(), error = %err, "source switch failed");
                StatusMessage::Error(format!("source switch failed: {err}"))
            }
            Notice::Exported(path) => StatusMessage::Info(format!("exported {}", path.display())),
            Notice::ExportFailed(err) => StatusMessage::Error(format!("export failed: {err}")),
            Notice::Deleted(outcome) => match outcome.result {
                Ok(()) => StatusMessage::Info(format!("deleted {}", outcome.id)),
                Err(err) => StatusMessage::Error(format!("delete {} failed: {err}", outcome.id)),
            },
        };
        self.state.message = Some(message);
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn draw<B: LogBackend>(frame: &mut Frame, state: &AppState, dashboard: &Dashboard<B>) {
    let area = frame.area();

    // Vertical: chart + anomalies | log list | 1-line status bar
    let vert = Layout::default()
        .direction(LayoutDir::Vertical)
        .constraints([
            Constraint::Percentage(state.chart_height_pct),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .split(area);

    let top = Layout::default()
        .direction(LayoutDir::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Fill(1)])
        .split(vert[0]);

    // Status first: it takes its own borrow of the watched state.
    {
        let status = dashboard.chart.status();
        let chart = dashboard.chart.state();
        frame.render_widget(
            LevelChart::new(&chart.records, status, chart.error, &state.theme),
            top[0],
        );
    }
    {
        let status = dashboard.anomalies.status();
        let anomalies = dashboard.anomalies.state();
        frame.render_widget(
            AnomalyList::new(
                &anomalies.records,
                status,
                anomalies.error,
                state.focus == Focus::Anomalies,
                &state.theme,
            ),
            top[1],
        );
    }
    {
        let status = dashboard.logs.status();
        let logs = dashboard.logs.state();
        frame.render_widget(
            LogList::new(
                &state.log_list,
                &logs.records,
                status,
                logs.error,
                state.focus == Focus::Logs,
                &state.theme,
            ),
            vert[1],
        );
    }

    frame.render_widget(
        StatusBar::new(
            dashboard.logs.source_key(),
            dashboard.logs.role(),
            dashboard.logs.filter(),
            state.message.as_ref(),
            dashboard.auth_required(),
            &state.theme,
        ),
        vert[2],
    );

    if state.show_help {
        frame.render_widget(HelpPopup, area);
    }

    // Command bar overlays the status row
    if state.focus == Focus::Command {
        let cmd_area = Rect { y: area.bottom().saturating_sub(1), height: 1, ..area };
        frame.render_widget(CommandBar::new(&state.command_bar, &state.theme), cmd_area);
        let col = state.command_bar.cursor_col(cmd_area);
        frame.set_cursor_position((col, cmd_area.y));
    }
}

// ---------------------------------------------------------------------------
// Terminal helpers
// ---------------------------------------------------------------------------

/// Read crossterm events on a dedicated thread so the runtime never blocks
/// on the terminal. The thread exits once the receiver is dropped.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        while !tx.is_closed() {
            match ct_event::poll(Duration::from_millis(50)) {
                Ok(true) => match ct_event::read() {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "terminal read failed");
                        break;
                    }
                },
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "terminal poll failed");
                    break;
                }
            }
        }
    });
    rx
}

/// Send queued switches one at a time. Requests superseded while an
/// earlier one was in flight are skipped, so the last POST is the latest.
async fn run_source_switches<B: LogBackend>(
    backend: Arc<B>,
    mut queue: mpsc::UnboundedReceiver<SourceSwitch>,
    notices: mpsc::UnboundedSender<Notice>,
) {
    while let Some(mut next) = queue.recv().await {
        while let Ok(newer) = queue.try_recv() {
            next = newer;
        }
        let SourceSwitch { seq, source } = next;
        let notice = match backend.switch_source(&source).await {
            Ok(()) => Notice::SourceSwitched(seq, source),
            Err(err) => Notice::SourceFailed(seq, source, err),
        };
        if notices.send(notice).is_err() {
            break;
        }
    }
}

fn install_panic_hook() {
    let original = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original(info);
    }));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use loglens_core::query::QueryParams;
    use loglens_core::{AnomalyReport, RecordId};
    use pretty_assertions::assert_eq;
    use ratatui::backend::TestBackend;
    use serde_json::Value;

    /// Backend that answers every request with an empty success.
    struct EmptyBackend;

    impl LogBackend for EmptyBackend {
        async fn fetch_logs(&self, _params: &QueryParams) -> Result<Vec<Value>, FetchError> {
            Ok(Vec::new())
        }
        async fn fetch_anomalies(&self) -> Result<AnomalyReport, FetchError> {
            Ok(AnomalyReport::default())
        }
        async fn delete_log(&self, _id: &RecordId) -> Result<(), FetchError> {
            Ok(())
        }
        async fn fetch_patterns(&self) -> Result<Vec<Value>, FetchError> {
            Ok(Vec::new())
        }
        async fn fetch_trends(&self) -> Result<Vec<Value>, FetchError> {
            Ok(Vec::new())
        }
        async fn switch_source(&self, _source: &SourceSpec) -> Result<(), FetchError> {
            Ok(())
        }
    }

    fn app(role: &str) -> App<EmptyBackend> {
        App::new(
            Arc::new(EmptyBackend),
            &Config::defaults(),
            "local",
            Role::new(role),
            Theme::load_default(),
        )
    }

    fn type_command(app: &mut App<EmptyBackend>, text: &str) {
        app.handle(AppEvent::Char(':'));
        for c in text.chars() {
            app.handle(AppEvent::Char(c));
        }
        app.handle(AppEvent::Enter);
    }

    #[tokio::test]
    async fn filter_command_updates_log_feed() {
        let mut app = app("viewer");
        type_command(&mut app, "level error");
        assert_eq!(app.state().focus, Focus::Logs);
        assert_eq!(app.dashboard().logs.filter().level, "ERROR");
        type_command(&mut app, "clear");
        assert!(app.dashboard().logs.filter().is_empty());
    }

    #[tokio::test]
    async fn viewer_delete_is_refused_locally() {
        let mut app = app("viewer");
        app.handle(AppEvent::Delete);
        assert_eq!(
            app.state().message,
            Some(StatusMessage::Error("no record selected".to_string()))
        );
    }

    #[tokio::test]
    async fn source_notice_moves_every_feed() {
        let mut app = app("admin");
        app.dashboard.start();
        type_command(&mut app, "source cloudwatch app-logs");
        let notice = app.notices_rx.recv().await.unwrap();
        app.apply_notice(notice);
        assert_eq!(app.dashboard().logs.source_key(), "cloudwatch:app-logs region=us-east-1");
        assert_eq!(
            app.state().message,
            Some(StatusMessage::Info("source: cloudwatch:app-logs region=us-east-1".to_string()))
        );
    }

    #[tokio::test]
    async fn rapid_switches_settle_on_latest() {
        let mut app = app("viewer");
        app.dashboard.start();
        type_command(&mut app, "source cloudwatch app s1");
        type_command(&mut app, "source cloudwatch app s2");

        let notice = app.notices_rx.recv().await.unwrap();
        assert!(matches!(notice, Notice::SourceSwitched(2, _)), "{notice:?}");
        app.apply_notice(notice);
        assert_eq!(app.dashboard().logs.source_key(), "cloudwatch:app stream=s2 region=us-east-1");
        tokio::task::yield_now().await;
        assert!(app.notices_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn superseded_switch_notice_is_ignored() {
        let mut app = app("viewer");
        app.dashboard.start();
        let s1 = SourceSpec::parse("cloudwatch app s1").unwrap();
        let s2 = SourceSpec::parse("cloudwatch app s2").unwrap();
        app.source_seq = 2;

        app.apply_notice(Notice::SourceSwitched(2, s2.clone()));
        app.apply_notice(Notice::SourceSwitched(1, s1.clone()));
        app.apply_notice(Notice::SourceFailed(1, s1, FetchError::from_status(500).unwrap()));

        assert_eq!(app.dashboard().logs.source_key(), s2.key());
        assert_eq!(
            app.state().message,
            Some(StatusMessage::Info(format!("source: {}", s2.key())))
        );
    }

    #[test]
    fn help_swallows_keys_until_closed() {
        let mut app = app("viewer");
        app.handle(AppEvent::Char('?'));
        assert!(app.state().show_help);
        app.handle(AppEvent::Char(':'));
        assert_eq!(app.state().focus, Focus::Logs);
        app.handle(AppEvent::Escape);
        assert!(!app.state().show_help);
    }

    #[test]
    fn draw_renders_every_pane() {
        let app = app("viewer");
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal
            .draw(|frame| draw(frame, &app.state, &app.dashboard))
            .unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("Levels"));
        assert!(text.contains("Anomalies"));
        assert!(text.contains("Logs (0)"));
        assert!(text.contains("source local"));
    }
}
