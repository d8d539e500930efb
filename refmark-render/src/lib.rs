//! Text surfaces fed by background page extraction.

mod populate;
mod surface;

#[cfg(feature = "pdf")]
mod pdf;

pub use populate::{populate, spawn_population, split_lines, PageTextSource};
pub use surface::{SurfaceRow, TextSurface, HEADER_ROWS};

#[cfg(feature = "pdf")]
pub use pdf::{PdfiumTextProvider, PDFIUM_PATH_ENV};
