use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use refmark_core::SurfaceProvider;
use tracing::{info, instrument, warn};

use crate::populate::{populate, spawn_population, PageTextSource};
use crate::surface::TextSurface;

/// Environment variable naming a pdfium shared library to bind first.
pub const PDFIUM_PATH_ENV: &str = "REFMARK_PDFIUM_LIBRARY_PATH";

/// Opens PDFs and streams their page text into a [`TextSurface`].
///
/// `open` returns as soon as the path resolves. Binding pdfium, loading the
/// document and extracting text all happen on the blocking pool.
#[derive(Debug, Default)]
pub struct PdfiumTextProvider;

impl PdfiumTextProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SurfaceProvider for PdfiumTextProvider {
    type Surface = TextSurface;

    #[instrument(level = "debug", skip(self))]
    async fn open(&self, path: &Path) -> Result<Arc<TextSurface>> {
        let absolute = path
            .canonicalize()
            .with_context(|| format!("failed to resolve path for {:?}", path))?;
        let surface = Arc::new(TextSurface::new());
        spawn_population(Arc::clone(&surface), move |surface| {
            extract_document(&absolute, surface)
        });
        Ok(surface)
    }
}

fn extract_document(path: &Path, surface: &TextSurface) -> Result<usize> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .with_context(|| format!("failed to open {:?}", path))?;
    info!(path = %path.display(), pages = document.pages().len(), "extracting text");
    let mut pages = PdfiumPages {
        document: &document,
    };
    Ok(populate(&mut pages, surface))
}

struct PdfiumPages<'a, 'p> {
    document: &'a PdfDocument<'p>,
}

impl PageTextSource for PdfiumPages<'_, '_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_text(&mut self, index: usize) -> Result<String> {
        let page_index: PdfPageIndex = index
            .try_into()
            .map_err(|_| anyhow!("page {} is out of supported range", index))?;
        let page = self
            .document
            .pages()
            .get(page_index)
            .with_context(|| format!("page {} out of range", index))?;
        let text = page
            .text()
            .with_context(|| format!("failed to read text of page {}", index))?;
        Ok(text.all())
    }
}

fn bind_pdfium() -> Result<Pdfium> {
    let mut errors = Vec::new();

    if let Some(path) = std::env::var_os(PDFIUM_PATH_ENV).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(path);
        match Pdfium::bind_to_library(&path) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to load pdfium from {PDFIUM_PATH_ENV}");
                errors.push(format!("{}: {}", path.display(), err));
            }
        }
    }

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => errors.push(format!("{}: {}", cwd_path.display(), err)),
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; set {} or install it ({})",
                PDFIUM_PATH_ENV,
                errors.join(", ")
            ))
        }
    }
}
