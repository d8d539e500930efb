use std::fs;
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event;
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use refmark_core::{
    AnnouncementQueue, EngineConfig, EngineEvent, HighlightEngine, MarkerSet, Phase, Reference,
    ReferenceCatalog, ShortcutDispatcher, SurfaceProvider,
};
use refmark_render::{PdfiumTextProvider, TextSurface};
use refmark_tty::{EventMapper, Frame, RowPainter, StatusLine, TerminalViewport, UiEvent};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

const IDLE_POLL: Duration = Duration::from_millis(100);
const ANIMATION_FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Parser)]
#[command(
    name = "refmark",
    version,
    about = "Jump between the passages a reference points at in a PDF"
)]
struct Args {
    /// PDF to open
    file: PathBuf,

    /// Reference catalog (TOML or JSON); defaults to references.toml in the config directory
    #[arg(short = 'r', long = "references")]
    references: Option<PathBuf>,

    /// Reference id to highlight on startup
    #[arg(short = 's', long = "select")]
    select: Option<u32>,

    /// Engine configuration file; defaults to config.toml in the config directory
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(
            stdout,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0),
            cursor::Show
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "refmark", "refmark")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| project_dirs.config_dir().join("config.toml"));
    let config = EngineConfig::load_or_default(&config_path)
        .with_context(|| format!("failed to load config {:?}", config_path))?;
    let catalog = load_catalog(args.references.as_deref(), project_dirs.config_dir())?;
    let initial = match args.select {
        Some(id) => Some(
            catalog
                .get(id)
                .cloned()
                .ok_or_else(|| anyhow!("reference {} is not in the catalog", id))?,
        ),
        None => None,
    };
    info!(references = catalog.len(), ?config, "starting viewer");

    let surface = PdfiumTextProvider::new()
        .open(&args.file)
        .await
        .with_context(|| format!("failed to open {:?}", args.file))?;

    let (columns, rows) = terminal::size()?;
    let viewport = Arc::new(TerminalViewport::new(columns, rows, config.smooth_scroll));
    let marker = Arc::new(MarkerSet::new());
    let engine = HighlightEngine::new(
        surface.clone(),
        marker.clone(),
        viewport.clone(),
        config,
    );

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide, Clear(ClearType::All))?;

    let mut viewer = Viewer {
        engine,
        surface,
        marker,
        viewport,
        catalog,
        mapper: EventMapper::new(),
        announcements: AnnouncementQueue::new(),
        painter: RowPainter::new(stdout),
        revision: None,
    };
    if let Some(reference) = initial {
        viewer.engine.select_phrase(&reference, Instant::now());
    }
    let result = viewer.run();

    viewer.engine.teardown();
    viewer.surface.close();
    result
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

struct Viewer {
    engine: HighlightEngine,
    surface: Arc<TextSurface>,
    marker: Arc<MarkerSet>,
    viewport: Arc<TerminalViewport>,
    catalog: ReferenceCatalog,
    mapper: EventMapper,
    announcements: AnnouncementQueue,
    painter: RowPainter<Stdout>,
    revision: Option<u64>,
}

impl Viewer {
    fn run(&mut self) -> Result<()> {
        let mut dirty = true;
        loop {
            let now = Instant::now();

            let revision = self.surface.revision();
            if self.revision != Some(revision) {
                self.viewport.set_content_rows(self.surface.total_rows());
                self.revision = Some(revision);
                self.engine.rescan();
                dirty = true;
            }

            self.engine.tick(now);
            dirty |= self.viewport.advance_animation();
            dirty |= self.announcements.prune(now);
            for event in self.engine.drain_events() {
                dirty |= self.on_engine_event(event, now);
            }

            if dirty {
                self.redraw()?;
                dirty = false;
            }

            let timeout = poll_timeout(
                now,
                self.engine.next_poll_due(),
                self.viewport.is_animating(),
                self.announcements.latest().map(|a| a.expires_at),
            );
            if event::poll(timeout)? {
                let ui_event = self.mapper.map_event(event::read()?);
                match self.handle_event(ui_event)? {
                    LoopAction::ContinueRedraw => dirty = true,
                    LoopAction::Continue => {}
                    LoopAction::Quit => break,
                }
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: UiEvent) -> Result<LoopAction> {
        let now = Instant::now();
        match event {
            UiEvent::Shortcut(key) => {
                let context = self.mapper.dispatch_context();
                let Some(shortcut) =
                    ShortcutDispatcher.dispatch(key, self.catalog.as_slice(), context)
                else {
                    return Ok(LoopAction::Continue);
                };
                let reference = shortcut.reference.clone();
                self.announcements.push(shortcut.announcement, now);
                self.engine.select_phrase(&reference, now);
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::NextMatch => {
                self.engine.next();
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::PrevMatch => {
                self.engine.previous();
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::ClearHighlights => {
                self.engine.clear();
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::ScrollLines(delta) => {
                self.viewport.scroll_by(delta);
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::ScrollPages(delta) => {
                self.viewport.scroll_pages(delta);
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::Top => {
                self.viewport.scroll_to_top();
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::Bottom => {
                self.viewport.scroll_to_bottom();
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::BeginFind | UiEvent::FindQueryChanged { .. } | UiEvent::FindCancel => {
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::FindSubmit { query } => {
                if let Some(reference) = find_reference(&query) {
                    self.engine.select_phrase(&reference, now);
                }
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::Resize { columns, rows } => {
                self.viewport.resize(columns, rows);
                let mut writer = self.painter.writer();
                crossterm::execute!(&mut writer, Clear(ClearType::All))?;
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::Quit => Ok(LoopAction::Quit),
            UiEvent::None => Ok(LoopAction::Continue),
        }
    }

    fn on_engine_event(&mut self, event: EngineEvent, now: Instant) -> bool {
        debug!(?event, "engine event");
        match event {
            EngineEvent::NoMatches { reference_id } => {
                let text = match self.catalog.get(reference_id) {
                    Some(reference) => format!("No matches for reference {}", reference.id),
                    None => "No matches found".to_string(),
                };
                self.announcements.push(text, now);
                true
            }
            EngineEvent::SessionStarted { .. }
            | EngineEvent::MatchesUpdated { .. }
            | EngineEvent::CurrentMatchChanged { .. }
            | EngineEvent::SelectionCleared => true,
        }
    }

    fn redraw(&mut self) -> Result<()> {
        let rows = self.surface.rows();
        let columns = self.viewport.columns();
        let body_rows = self.viewport.body_rows();
        let pending = self.mapper.pending_input();
        let reference = self.engine.selected().map(describe_reference);
        let match_label = match (self.engine.selected(), self.engine.phase()) {
            (None, _) => None,
            (Some(_), Phase::Scanning) if self.engine.match_count() == 0 => {
                Some("searching...".to_string())
            }
            (Some(_), _) => Some(self.engine.status_label()),
        };
        let loading = (!self.surface.is_settled())
            .then(|| (self.surface.rendered_pages(), self.surface.page_count()));
        let status = StatusLine {
            pending_input: pending.as_deref(),
            announcement: self.announcements.latest().map(|a| a.text.as_str()),
            reference: reference.as_deref(),
            match_label: match_label.as_deref(),
            highlighted_pages: Some(self.engine.highlighted_pages()),
            loading,
        }
        .text();

        self.painter.begin_sync_update()?;
        self.painter.paint(
            &Frame {
                rows: &rows,
                first_row: self.viewport.first_row(),
                height: body_rows,
                width: columns,
                highlighted_pages: self.engine.highlighted_pages(),
                focused: self.viewport.focused(),
            },
            &self.marker,
        )?;
        self.painter.status(body_rows, columns, &status)?;
        self.painter.end_sync_update()?;
        Ok(())
    }
}

fn describe_reference(reference: &Reference) -> String {
    if reference.id == 0 {
        reference.description.clone()
    } else if reference.description.is_empty() {
        format!("[{}]", reference.id)
    } else {
        format!("[{}] {}", reference.id, reference.description)
    }
}

/// Free-text phrases typed at the find prompt use id 0, which no catalog
/// entry can carry.
fn find_reference(query: &str) -> Option<Reference> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    Some(Reference::new(0, format!("find \"{query}\""), query))
}

/// Sleeps until the next thing that needs the loop: a poll retry, an
/// animation frame or an announcement expiring.
fn poll_timeout(
    now: Instant,
    poll_due: Option<Instant>,
    animating: bool,
    announcement_expiry: Option<Instant>,
) -> Duration {
    let mut timeout = if animating { ANIMATION_FRAME } else { IDLE_POLL };
    for deadline in [poll_due, announcement_expiry].into_iter().flatten() {
        timeout = timeout.min(deadline.saturating_duration_since(now));
    }
    timeout
}

fn load_catalog(explicit: Option<&Path>, config_dir: &Path) -> Result<ReferenceCatalog> {
    if let Some(path) = explicit {
        return ReferenceCatalog::load(path)
            .with_context(|| format!("failed to load references from {:?}", path));
    }
    let default = config_dir.join("references.toml");
    if default.exists() {
        return ReferenceCatalog::load(&default)
            .with_context(|| format!("failed to load references from {:?}", default));
    }
    warn!(path = %default.display(), "no reference catalog found; only find is available");
    Ok(ReferenceCatalog::default())
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "refmark.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // the terminal belongs to the viewer, so only the file gets output
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
