use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::Once;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use catcov::config::{self, Config};
use catcov::coverage::{CoverageMap, CoverageStatus};
use catcov::diagnostics::TracingDiagnostics;
use catcov::fragment::{HighlightState, MemoryNavigation};
use catcov::guard::{FrameQueue, SystemClock};
use catcov::layers::CoverageToggles;
use catcov::lines::LineModel;
use catcov::syntax::{HighlightSession, Tokenizer};
use catcov::viewer::{Capabilities, Viewer};
use catcov::widget::{gutter_width, rows_to_units, CoverageView};
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode, KeyEvent,
    KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use notify::{Config as WatchConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};
use ratatui::prelude::{Color, Rect, Style};
use ratatui::widgets::block::Padding;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn inset_rect(area: Rect, horizontal: u16, vertical: u16) -> Rect {
    let x = area.x.saturating_add(horizontal);
    let y = area.y.saturating_add(vertical);
    let width = area.width.saturating_sub(horizontal.saturating_mul(2));
    let height = area.height.saturating_sub(vertical.saturating_mul(2));
    Rect {
        x,
        y,
        width,
        height,
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "catcov",
    version,
    about = "Render source files with line coverage for terminal workflows"
)]
struct Cli {
    /// Source file path, optionally followed by `#L<n>`. Use '-' to read from stdin.
    input: Option<String>,

    /// Coverage JSON mapping line numbers to "H", "M" or "P".
    #[arg(short, long)]
    coverage: Option<PathBuf>,

    /// Name used to pick syntax highlighting. Defaults to the file name.
    #[arg(long)]
    name: Option<String>,

    /// Do not paint covered lines.
    #[arg(long)]
    hide_covered: bool,

    /// Do not paint partially covered lines.
    #[arg(long)]
    hide_partial: bool,

    /// Do not paint uncovered lines.
    #[arg(long)]
    hide_uncovered: bool,

    /// Force interactive viewer mode.
    #[arg(short, long)]
    interactive: bool,

    /// Force plain stdout rendering.
    #[arg(long)]
    plain: bool,

    /// Reload when the source or coverage file changes (file input only).
    #[arg(long)]
    watch: bool,

    /// Config file. Defaults to ./catcov.toml, then the user config directory.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn toggles(&self, config: &Config) -> CoverageToggles {
        let mut toggles = config.toggles();
        toggles.covered &= !self.hide_covered;
        toggles.partial &= !self.hide_partial;
        toggles.uncovered &= !self.hide_uncovered;
        toggles
    }
}

struct LoadResult {
    path: Option<PathBuf>,
    source: String,
}

enum InputSource {
    File(PathBuf),
    Stdin,
}

/// Splits `path#L12` into the path and its fragment. A path that exists as
/// given is never split.
fn split_fragment(input: &str) -> (&str, Option<&str>) {
    if Path::new(input).exists() {
        return (input, None);
    }
    match input.rfind('#') {
        Some(pos) if pos > 0 => (&input[..pos], Some(&input[pos..])),
        _ => (input, None),
    }
}

fn detect_input(cli: &Cli) -> Result<(InputSource, Option<String>)> {
    match cli.input.as_deref() {
        Some("-") => Ok((InputSource::Stdin, None)),
        Some(raw) => {
            let (path, fragment) = split_fragment(raw);
            Ok((
                InputSource::File(PathBuf::from(path)),
                fragment.map(str::to_string),
            ))
        }
        None => {
            if io::stdin().is_terminal() {
                Err(anyhow!(
                    "No input provided. Pass a source file or pipe source into stdin."
                ))
            } else {
                Ok((InputSource::Stdin, None))
            }
        }
    }
}

fn read_input(source: &InputSource) -> Result<LoadResult> {
    match source {
        InputSource::File(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(LoadResult {
                path: Some(path.clone()),
                source,
            })
        }
        InputSource::Stdin => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read source from stdin")?;
            Ok(LoadResult {
                path: None,
                source: buf,
            })
        }
    }
}

fn load_coverage(path: Option<&Path>) -> Result<CoverageMap> {
    match path {
        Some(path) => CoverageMap::load(path)
            .with_context(|| format!("Failed to load coverage from {}", path.display())),
        None => Ok(CoverageMap::new()),
    }
}

fn is_tty_stdout() -> bool {
    io::stdout().is_terminal()
}

fn default_interactive(input: &InputSource) -> bool {
    matches!(input, InputSource::File(_)) && is_tty_stdout()
}

fn coverage_marker(status: CoverageStatus, toggles: CoverageToggles) -> char {
    if !toggles.shows(status) {
        return ' ';
    }
    match status {
        CoverageStatus::Hit => '+',
        CoverageStatus::Miss => '!',
        CoverageStatus::Partial => '~',
        CoverageStatus::None => ' ',
    }
}

fn plain_render(model: &LineModel, toggles: CoverageToggles) -> String {
    let width = model.len().max(1).to_string().len();
    let mut out = String::new();
    for line in model.lines() {
        let marker = coverage_marker(line.coverage, toggles);
        out.push_str(&format!("{:>width$} {marker} {}\n", line.display_number, line.text));
    }
    out
}

fn display_name(cli: &Cli, path: Option<&Path>) -> String {
    if let Some(name) = &cli.name {
        return name.clone();
    }
    path.and_then(|p| p.file_name())
        .map_or_else(|| "stdin".to_string(), |n| n.to_string_lossy().into_owned())
}

/// Rows moved by a full-page scroll in a content area `height` rows tall.
fn page_rows(height: u16) -> isize {
    isize::try_from(height).unwrap_or(isize::MAX).max(1)
}

struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
}

struct App {
    cli: Cli,
    tokenizer: Tokenizer,
    session: HighlightSession,
    viewer: Viewer,
    path: Option<PathBuf>,
    navigation: MemoryNavigation,
    frames: FrameQueue,
    scroll_step: usize,

    content_area: Rect,
    goto_mode: bool,
    goto_query: String,
    status: String,

    watcher: Option<FileWatcher>,
    watch_requested: bool,
}

impl App {
    fn new(
        cli: Cli,
        config: &Config,
        load: LoadResult,
        coverage: &CoverageMap,
        fragment: Option<String>,
    ) -> Self {
        let tokenizer = Tokenizer::new(config.theme_name());
        let name = display_name(&cli, load.path.as_deref());
        let session = tokenizer.session(&name);
        let navigation = MemoryNavigation::new(fragment.as_deref().unwrap_or_default());
        let frames = FrameQueue::new();

        let mut options = config.viewer_options();
        options.toggles = cli.toggles(config);
        let viewer = Viewer::mount(
            LineModel::new(&load.source, coverage),
            name,
            options,
            Capabilities {
                navigation: Box::new(navigation.clone()),
                diagnostics: Box::new(TracingDiagnostics),
                frames: Box::new(frames.clone()),
                clock: Box::new(SystemClock::default()),
            },
        );

        Self {
            cli,
            tokenizer,
            session,
            viewer,
            path: load.path,
            navigation,
            frames,
            scroll_step: config.file.viewer.scroll_step.max(1),
            content_area: Rect::default(),
            goto_mode: false,
            goto_query: String::new(),
            status: String::new(),
            watcher: None,
            watch_requested: false,
        }
    }

    fn step(&self) -> isize {
        isize::try_from(self.scroll_step).unwrap_or(isize::MAX)
    }

    fn page_rows(&self) -> isize {
        page_rows(self.content_area.height)
    }

    fn row_units(&self, rows: u16) -> usize {
        rows_to_units(rows, self.viewer.viewport().line_height())
    }

    /// Fires due frame callbacks and applies navigation changes.
    fn tick(&mut self) {
        for handle in self.frames.take_due() {
            self.viewer.on_frame(handle);
        }
        self.viewer.pump_navigation();
    }

    fn reload_current(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let source = fs::read_to_string(&path)
            .with_context(|| format!("Failed to reload {}", path.display()))?;
        let coverage = load_coverage(self.cli.coverage.as_deref())?;

        self.viewer.replace_model(LineModel::new(&source, &coverage));
        self.session = self.tokenizer.session(self.viewer.display_name());
        self.status = format!("Reloaded {}", path.display());
        info!(target: "runtime", path = %path.display(), lines = self.viewer.model().len(), "reloaded");
        self.ensure_watcher()?;
        Ok(())
    }

    fn ensure_watcher(&mut self) -> Result<()> {
        if !self.cli.watch {
            self.watcher = None;
            return Ok(());
        }

        let Some(path) = self.path.clone() else {
            self.watcher = None;
            return Ok(());
        };

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            WatchConfig::default(),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        if let Some(coverage) = self.cli.coverage.as_deref() {
            watcher.watch(coverage, RecursiveMode::NonRecursive)?;
        }
        self.watcher = Some(FileWatcher {
            _watcher: watcher,
            rx,
        });
        Ok(())
    }

    fn poll_watch(&mut self) {
        if let Some(watcher) = self.watcher.as_mut() {
            while let Ok(event) = watcher.rx.try_recv() {
                if event.is_ok() {
                    self.watch_requested = true;
                }
            }
        }
    }

    fn toggle_coverage(&mut self, update: impl FnOnce(&mut CoverageToggles)) {
        let mut toggles = self.viewer.toggles();
        update(&mut toggles);
        self.viewer.set_toggles(toggles);
    }

    fn clear_highlight(&mut self) {
        if let HighlightState::Highlighted(line) = self.viewer.highlight() {
            self.viewer.click_line(line);
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let root = inset_rect(frame.size(), 1, 0);
        let chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(root);
        let body = chunks[0];
        let status = inset_rect(chunks[1], 1, 0);

        let block = Block::default()
            .title(format!(" {} ", self.viewer.display_name()))
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray))
            .padding(Padding::new(1, 1, 0, 0));
        self.content_area = block.inner(body);

        let total = self.viewer.model().len();
        let gutter = gutter_width(total).min(self.content_area.width);
        let height = self.row_units(self.content_area.height);
        self.viewer
            .on_resize(usize::from(self.content_area.width - gutter), height);

        if let Some(last) = self.viewer.visible_range().last_index() {
            self.session
                .extend_to(&self.tokenizer, self.viewer.model().lines(), last);
        }

        let layers = self.viewer.frame();
        let view = CoverageView::new(&layers, self.session.styled(), total)
            .hovered(self.viewer.hovered())
            .block(block);
        frame.render_widget(view, body);

        self.draw_status(frame, status);
    }

    fn draw_status(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let path = self
            .path
            .as_ref()
            .map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string());

        let summary = self.viewer.model().summary();
        let coverage_hint = summary.percentage().map_or_else(
            || "coverage: n/a".to_string(),
            |pct| {
                format!(
                    "coverage {pct:.1}% (H {} P {} M {})",
                    summary.hits, summary.partials, summary.misses
                )
            },
        );

        let toggles = self.viewer.toggles();
        let flag = |on: bool| if on { "on" } else { "off" };
        let toggle_hint = format!(
            "c:{} p:{} u:{}",
            flag(toggles.covered),
            flag(toggles.partial),
            flag(toggles.uncovered)
        );

        let line_hint = match self.viewer.highlight() {
            HighlightState::Highlighted(n) => format!(" L{n}"),
            HighlightState::Unhighlighted => String::new(),
        };
        let goto_hint = if self.goto_mode {
            format!(" :{}", self.goto_query)
        } else {
            String::new()
        };
        let scroll_hint = if self.viewer.is_scrolling() { " ~" } else { "" };

        let mut status_text =
            format!("{path} | {coverage_hint} | {toggle_hint}{line_hint}{goto_hint}{scroll_hint}");
        if !self.status.is_empty() {
            status_text.push_str(" | ");
            status_text.push_str(&self.status);
        }

        frame.render_widget(
            Paragraph::new(format!(" {status_text}")).style(Style::default().fg(Color::Gray)),
            area,
        );
    }

    fn handle_goto_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.goto_mode = false;
                self.goto_query.clear();
            }
            KeyCode::Enter => {
                self.goto_mode = false;
                let query = std::mem::take(&mut self.goto_query);
                if !query.is_empty() {
                    self.navigation.navigate(&format!("#L{query}"));
                }
            }
            KeyCode::Backspace => {
                self.goto_query.pop();
            }
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.goto_query.push(c);
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.goto_mode {
            self.handle_goto_input(key);
            return false;
        }

        let step = self.step();
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') | KeyCode::Down => self.viewer.scroll_by(1, 0),
            KeyCode::Char('k') | KeyCode::Up => self.viewer.scroll_by(-1, 0),
            KeyCode::Char('l') | KeyCode::Right => self.viewer.scroll_by(0, step),
            KeyCode::Char('h') | KeyCode::Left => self.viewer.scroll_by(0, -step),
            KeyCode::Char('g') | KeyCode::Home => {
                let left = self.viewer.viewport().scroll_left();
                self.viewer.on_scroll(0, left);
            }
            KeyCode::Char('G') | KeyCode::End => {
                let viewport = self.viewer.viewport();
                let (top, left) = (viewport.max_scroll_top(), viewport.scroll_left());
                self.viewer.on_scroll(top, left);
            }
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.viewer.scroll_by(self.page_rows() / 2, 0);
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.viewer.scroll_by(-(self.page_rows() / 2), 0);
            }
            KeyCode::PageDown => self.viewer.scroll_by(self.page_rows(), 0),
            KeyCode::PageUp => self.viewer.scroll_by(-self.page_rows(), 0),
            KeyCode::Char(':') => {
                self.goto_mode = true;
                self.goto_query.clear();
            }
            KeyCode::Esc => self.clear_highlight(),
            KeyCode::Char('b') => {
                if !self.navigation.back() {
                    self.status = "History is empty".to_string();
                }
            }
            KeyCode::Char('c') => self.toggle_coverage(|t| t.covered = !t.covered),
            KeyCode::Char('p') => self.toggle_coverage(|t| t.partial = !t.partial),
            KeyCode::Char('u') => self.toggle_coverage(|t| t.uncovered = !t.uncovered),
            _ => {}
        }
        false
    }

    fn content_offset(&self, column: u16, row: u16) -> Option<(u16, u16)> {
        let area = self.content_area;
        let inside = column >= area.x
            && column < area.x + area.width
            && row >= area.y
            && row < area.y + area.height;
        inside.then(|| (column - area.x, row - area.y))
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let step = self.step();
        let horizontal = mouse.modifiers.contains(KeyModifiers::SHIFT);
        match mouse.kind {
            MouseEventKind::ScrollDown if horizontal => self.viewer.scroll_by(0, step),
            MouseEventKind::ScrollUp if horizontal => self.viewer.scroll_by(0, -step),
            MouseEventKind::ScrollDown => self.viewer.scroll_by(step, 0),
            MouseEventKind::ScrollUp => self.viewer.scroll_by(-step, 0),
            MouseEventKind::ScrollRight => self.viewer.scroll_by(0, step),
            MouseEventKind::ScrollLeft => self.viewer.scroll_by(0, -step),
            MouseEventKind::Down(MouseButton::Left) => {
                let gutter = gutter_width(self.viewer.model().len());
                if let Some((x, y)) = self.content_offset(mouse.column, mouse.row) {
                    if x < gutter {
                        if let Some(line) = self.viewer.hit_test(self.row_units(y)) {
                            debug!(target: "runtime", line, "gutter_click");
                            self.viewer.click_line(line);
                        }
                    }
                }
            }
            MouseEventKind::Moved => {
                let offset = self
                    .content_offset(mouse.column, mouse.row)
                    .map(|(_, y)| self.row_units(y));
                self.viewer.on_pointer_move(offset);
            }
            _ => {}
        }
    }
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

fn run_interactive(mut app: App) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    app.ensure_watcher()?;

    let stdout = io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    loop {
        terminal.draw(|frame| app.draw(frame))?;
        app.tick();

        if app.watch_requested {
            if let Err(err) = app.reload_current() {
                app.status = format!("Reload failed: {err:#}");
            }
            app.watch_requested = false;
        }

        app.poll_watch();

        let timeout = if app.viewer.is_scrolling() {
            Duration::from_millis(16)
        } else {
            Duration::from_millis(120)
        };
        if event::poll(timeout)? {
            match event::read()? {
                CEvent::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.handle_key(key) {
                        break;
                    }
                }
                CEvent::Mouse(mouse) => app.handle_mouse(mouse),
                _ => {}
            }
        }
    }

    Ok(())
}

/// Logs go to a file; the terminal belongs to the viewer.
fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("catcov");
    fs::create_dir_all(&log_dir).ok()?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "catcov.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .ok()
        .map(|()| guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", %info, "panic");
            default_panic(info);
        }));
    });
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = configure_logging();
    install_panic_hook();

    if cli.interactive && cli.plain {
        return Err(anyhow!("--interactive and --plain cannot be used together"));
    }

    let (input, fragment) = detect_input(&cli)?;
    if cli.watch && matches!(input, InputSource::Stdin) {
        return Err(anyhow!("--watch requires file input"));
    }

    let interactive = if cli.interactive {
        true
    } else if cli.plain {
        false
    } else {
        default_interactive(&input)
    };

    let config = config::load_from(cli.config.clone()).context("Failed to load configuration")?;
    let load = read_input(&input)?;
    let coverage = load_coverage(cli.coverage.as_deref())?;
    info!(
        target: "runtime",
        interactive,
        coverage_entries = coverage.len(),
        "startup"
    );

    if !interactive {
        let model = LineModel::new(&load.source, &coverage);
        print!("{}", plain_render(&model, cli.toggles(&config)));
        return Ok(());
    }

    let app = App::new(cli, &config, load, &coverage, fragment);
    run_interactive(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catcov::coverage::Coverage;

    #[test]
    fn splits_line_fragment_from_missing_path() {
        assert_eq!(
            split_fragment("__missing__/lib.rs#L12"),
            ("__missing__/lib.rs", Some("#L12"))
        );
        assert_eq!(split_fragment("__missing__/lib.rs"), ("__missing__/lib.rs", None));
        assert_eq!(split_fragment("#L3"), ("#L3", None));
    }

    #[test]
    fn keeps_existing_path_with_hash_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd#name.rs");
        fs::write(&path, "x").unwrap();
        let raw = path.to_string_lossy().into_owned();
        assert_eq!(split_fragment(&raw), (raw.as_str(), None));
    }

    #[test]
    fn page_rows_never_stalls() {
        assert_eq!(page_rows(0), 1);
        assert_eq!(page_rows(37), 37);
        assert_eq!(page_rows(u16::MAX), isize::from(i16::MAX) * 2 + 1);
    }

    #[test]
    fn plain_render_marks_coverage() {
        let coverage: CoverageMap = [(1, Coverage::Hit), (2, Coverage::Miss), (3, Coverage::Partial)]
            .into_iter()
            .collect();
        let model = LineModel::new("a\nb\nc\nd", &coverage);
        let out = plain_render(&model, CoverageToggles::default());
        assert_eq!(out, "1 + a\n2 ! b\n3 ~ c\n4   d\n");

        let hidden = CoverageToggles {
            partial: false,
            ..CoverageToggles::default()
        };
        assert!(plain_render(&model, hidden).contains("3   c"));
    }
}
