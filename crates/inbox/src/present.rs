//! Rendering search results for the user

use std::io::{self, Write};

use crate::error::SearchError;
use crate::models::SearchResult;

/// Number of body characters shown per result
pub const PREVIEW_CHARS: usize = 200;

/// A user-facing surface for one search
pub trait ResultPresenter {
    /// Show that a search is running
    fn searching(&mut self) -> io::Result<()>;

    /// Show the matches; an empty slice means nothing matched
    fn present(&mut self, results: &[SearchResult]) -> io::Result<()>;

    /// Show a fatal error
    fn present_error(&mut self, error: &SearchError) -> io::Result<()>;
}

/// First [`PREVIEW_CHARS`] characters of `body`, followed by `...`
pub fn preview(body: &str) -> String {
    let mut preview: String = body.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

/// Plain-text presenter over any writer
pub struct TextPresenter<W: Write> {
    out: W,
}

impl<W: Write> TextPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultPresenter for TextPresenter<W> {
    fn searching(&mut self) -> io::Result<()> {
        writeln!(self.out, "Searching...")?;
        self.out.flush()
    }

    fn present(&mut self, results: &[SearchResult]) -> io::Result<()> {
        if results.is_empty() {
            writeln!(self.out, "No results found.")?;
            return self.out.flush();
        }

        for (i, result) in results.iter().enumerate() {
            if i > 0 {
                writeln!(self.out)?;
            }
            writeln!(self.out, "[{}] {}", result.id, result.snippet)?;
            writeln!(self.out, "    {}", preview(&result.body))?;
        }
        self.out.flush()
    }

    fn present_error(&mut self, error: &SearchError) -> io::Result<()> {
        writeln!(self.out, "Error: {}", error)?;
        self.out.flush()
    }
}
