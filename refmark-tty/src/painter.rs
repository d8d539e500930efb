use std::collections::BTreeSet;
use std::io::Write;

use anyhow::Result;
use crossterm::{
    cursor, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor},
    terminal::{Clear, ClearType},
};
use refmark_core::{LeafId, MarkerSet};
use refmark_render::SurfaceRow;

/// One screenful of surface rows.
pub struct Frame<'a> {
    pub rows: &'a [SurfaceRow],
    pub first_row: usize,
    pub height: u16,
    pub width: u16,
    pub highlighted_pages: &'a BTreeSet<u32>,
    pub focused: Option<LeafId>,
}

pub struct RowPainter<W: Write> {
    writer: W,
}

impl<W: Write> RowPainter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Paints the visible rows, styling leaves by their marks.
    pub fn paint(&mut self, frame: &Frame<'_>, marks: &MarkerSet) -> Result<()> {
        let width = frame.width as usize;
        for screen_row in 0..frame.height {
            queue!(
                self.writer,
                cursor::MoveTo(0, screen_row),
                Clear(ClearType::CurrentLine)
            )?;
            let Some(row) = frame.rows.get(frame.first_row + screen_row as usize) else {
                continue;
            };
            match row {
                SurfaceRow::PageHeader { page } => {
                    let flag = if frame.highlighted_pages.contains(page) {
                        " *"
                    } else {
                        ""
                    };
                    let title = truncate(&format!("-- Page {page}{flag} --"), width);
                    queue!(
                        self.writer,
                        SetAttribute(Attribute::Dim),
                        Print(title),
                        SetAttribute(Attribute::Reset)
                    )?;
                }
                SurfaceRow::Text { leaf, text } => {
                    let leaf_marks = marks.marks(*leaf);
                    let text = truncate(text, width);
                    if leaf_marks.current {
                        queue!(
                            self.writer,
                            SetAttribute(Attribute::Reverse),
                            SetAttribute(Attribute::Bold)
                        )?;
                    } else if leaf_marks.matched {
                        queue!(self.writer, SetBackgroundColor(Color::DarkYellow))?;
                    }
                    if frame.focused == Some(*leaf) {
                        queue!(self.writer, SetAttribute(Attribute::Underlined))?;
                    }
                    queue!(
                        self.writer,
                        Print(text),
                        ResetColor,
                        SetAttribute(Attribute::Reset)
                    )?;
                }
                SurfaceRow::Pending { page } => {
                    queue!(
                        self.writer,
                        SetAttribute(Attribute::Italic),
                        Print(truncate(&format!("(rendering page {page}...)"), width)),
                        SetAttribute(Attribute::Reset)
                    )?;
                }
                SurfaceRow::Failed { page } => {
                    queue!(
                        self.writer,
                        Print(truncate(&format!("(page {page} has no readable text)"), width))
                    )?;
                }
                SurfaceRow::Blank => {}
            }
        }
        Ok(())
    }

    /// Clears and writes the bottom row, then flushes the frame.
    pub fn status(&mut self, row: u16, width: u16, text: &str) -> Result<()> {
        queue!(
            self.writer,
            cursor::MoveTo(0, row),
            Clear(ClearType::CurrentLine),
            SetAttribute(Attribute::Reverse)
        )?;
        crate::write_status_line(&mut self.writer, &truncate(text, width as usize))?;
        queue!(self.writer, SetAttribute(Attribute::Reset))?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}
