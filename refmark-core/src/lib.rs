//! Phrase-match discovery and navigation over a progressively rendered,
//! paginated text surface.
//!
//! The engine never talks to a renderer directly. It reads the surface through
//! [`RenderSurface`], writes highlight state through [`Marker`] and scrolls
//! through [`Viewport`], so every collaborator can be swapped for an
//! in-memory fake.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

pub mod catalog;
pub mod config;
mod error;
pub mod marker;
pub mod memory;
pub mod navigation;
pub mod poller;
pub mod scanner;
pub mod shortcuts;
pub mod surface;
pub mod viewport;

pub use catalog::{Reference, ReferenceCatalog};
pub use config::EngineConfig;
pub use error::{CatalogError, ConfigError};
pub use marker::{MarkKind, Marker, MarkerSet, Marks};
pub use memory::{MemorySurface, MemoryViewport};
pub use navigation::{EngineEvent, HighlightEngine, HighlightSession, Phase};
pub use poller::{RenderPoller, RetryPolicy, ScanReport, SessionToken};
pub use scanner::{Match, Scanner};
pub use shortcuts::{Announcement, AnnouncementQueue, DispatchContext, Shortcut, ShortcutDispatcher};
pub use surface::{
    page_number_of, ContentLeaf, LeafId, PageContainer, Rect, RenderSurface, SurfaceAdapter,
    TextLeaf,
};
pub use viewport::{centered_scroll_top, CenterOptions, CenteringEngine, ScrollBehavior, Viewport};

/// Opens a document and hands back the surface its text is rendered into.
///
/// Implementations are expected to return as soon as the surface exists;
/// pages may keep arriving afterwards.
#[async_trait::async_trait]
pub trait SurfaceProvider: Send + Sync {
    type Surface: RenderSurface + 'static;

    async fn open(&self, path: &Path) -> Result<Arc<Self::Surface>>;
}
