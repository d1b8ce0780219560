//! Document engine seam.
//!
//! The viewer core never renders or parses documents itself; it drives an
//! engine through [`DocumentEngine`] and only ever consumes page counts and
//! per-page hit boxes. A plain-text implementation ([`TextDocument`]) backs
//! the test suite and the standalone binary.

use std::fs;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot open document '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Axis-aligned hit box in page coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HitBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl HitBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn area(&self) -> f64 {
        f64::from(self.x1 - self.x0) * f64::from(self.y1 - self.y0)
    }

    /// Squared distance between this box's top-left corner and `other`'s.
    pub fn origin_dist_sq(&self, other: &HitBox) -> f64 {
        let dx = f64::from(self.x0) - f64::from(other.x0);
        let dy = f64::from(self.y0) - f64::from(other.y0);
        dx * dx + dy * dy
    }

    /// Grow this box to cover `other`.
    pub fn expand_to(&mut self, other: &HitBox) {
        if other.x1 > self.x1 {
            self.x1 = other.x1;
        }
        if other.y1 > self.y1 {
            self.y1 = other.y1;
        }
        if other.x0 < self.x0 {
            self.x0 = other.x0;
        }
        if other.y0 < self.y0 {
            self.y0 = other.y0;
        }
    }
}

/// What the viewer core needs from a document backend.
pub trait DocumentEngine {
    fn page_count(&self) -> usize;

    /// Search one page for `needle`, returning at most `max_hits` bounding
    /// boxes in the engine's page coordinate space.
    fn search_page(&self, page: usize, needle: &str, max_hits: usize) -> Vec<HitBox>;

    /// Strict vs standard match behavior, if the engine distinguishes them.
    /// Default: ignored.
    fn set_strict_match(&mut self, _strict: bool) {}
}

// Synthetic page geometry for the text engine: a fixed-pitch grid in
// nominal points.
const CHAR_W: f32 = 6.0;
const LINE_H: f32 = 12.0;

/// Plain-text document: pages are separated by form-feed characters and
/// every character occupies one cell of a fixed-pitch grid. Searches are
/// case-insensitive substring matches within a line, the same granularity
/// a PDF text extractor yields for schematic labels.
pub struct TextDocument {
    pages: Vec<Vec<String>>,
}

impl TextDocument {
    pub fn from_text(text: &str) -> Self {
        let pages = text
            .split('\u{c}')
            .map(|page| page.lines().map(str::to_owned).collect())
            .collect();
        Self { pages }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| DocumentError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_text(&text))
    }
}

impl DocumentEngine for TextDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn search_page(&self, page: usize, needle: &str, max_hits: usize) -> Vec<HitBox> {
        let mut hits = Vec::new();
        if needle.is_empty() {
            return hits;
        }
        let Some(lines) = self.pages.get(page) else {
            return hits;
        };
        let needle_lower = needle.to_lowercase();

        'page: for (row, line) in lines.iter().enumerate() {
            let line_lower = line.to_lowercase();
            let mut from = 0;
            while let Some(pos) = line_lower[from..].find(&needle_lower) {
                let col = line_lower[..from + pos].chars().count();
                let len = needle_lower.chars().count();
                let y0 = row as f32 * LINE_H;
                hits.push(HitBox::new(
                    col as f32 * CHAR_W,
                    y0,
                    (col + len) as f32 * CHAR_W,
                    y0 + LINE_H,
                ));
                if hits.len() >= max_hits {
                    break 'page;
                }
                from += pos + needle_lower.len();
            }
        }
        hits
    }
}
