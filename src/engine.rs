//! Page scan engine.
//!
//! [`advance_search`] drives an active [`SearchState`] across the document
//! synchronously until it resolves to a navigation target, wraps at a
//! document boundary, or exhausts the document. Documents are modest in
//! page count, so the scan runs to completion on the calling thread; the
//! only cancellation point is clearing the state before the next call.
//!
//! [`headless_scan`] is the single-shot variant used when the process runs
//! as a search oracle: no index bookkeeping, no navigation, just a count.

use log::{debug, warn};

use crate::document::DocumentEngine;
use crate::search::{
    merge_compound_hits, sort_hits_by_area, CompoundConfig, SearchMode, SearchState,
    MAX_PAGE_HITS,
};

/// Canvas geometry needed to center a hit in the viewport. Offsets are in
/// page units: `(canvas_px / 2) * 72 / zoom`.
#[derive(Debug, Clone, Copy)]
pub struct CanvasMetrics {
    pub canvas_w: f32,
    pub canvas_h: f32,
    pub zoom: f32,
}

impl Default for CanvasMetrics {
    fn default() -> Self {
        Self {
            canvas_w: 100.0,
            canvas_h: 100.0,
            zoom: 96.0,
        }
    }
}

impl CanvasMetrics {
    fn half_page_offset(&self) -> (f32, f32) {
        (
            (self.canvas_w / 2.0) * 72.0 / self.zoom,
            (self.canvas_h / 2.0) * 72.0 / self.zoom,
        )
    }
}

/// What a scan step resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Nothing to do: no active search, empty term, or bad direction.
    Inactive,
    /// A hit was selected; navigate so (x, y) lands centered.
    Jump { page: usize, x: f32, y: f32 },
    /// Hit the document boundary with earlier hits on record: the page
    /// wrapped to the opposite end and the scan deactivated. The next
    /// explicit next/prev trigger resumes from there.
    WrapStop,
    /// The whole document was exhausted without a single hit.
    NotFound,
    /// In-page search finished its one attempt with this many hits.
    InPage(usize),
}

fn clamp_page(page: i32, page_count: usize) -> i32 {
    page.clamp(0, page_count.saturating_sub(1) as i32)
}

/// Search one page for the primary term, falling back to the heuristic
/// alternate once if the literal term missed.
fn search_page_with_alt(
    doc: &dyn DocumentEngine,
    page: usize,
    search: &SearchState,
) -> Vec<crate::document::HitBox> {
    let hits = doc.search_page(page, &search.a, MAX_PAGE_HITS);
    debug!(
        "'{}': {} hit(s) on page {}",
        search.a,
        hits.len(),
        page + 1
    );
    if !hits.is_empty() || search.alt.is_empty() {
        return hits;
    }
    let hits = doc.search_page(page, &search.alt, MAX_PAGE_HITS);
    debug!(
        "alternate '{}': {} hit(s) on page {}",
        search.alt,
        hits.len(),
        page + 1
    );
    hits
}

/// Run the compound merge for the page the primary term anchored.
fn compound_page_hits(
    doc: &dyn DocumentEngine,
    page: usize,
    search: &SearchState,
    cfg: &CompoundConfig,
) -> Vec<crate::document::HitBox> {
    let a_hits = doc.search_page(page, &search.a, MAX_PAGE_HITS);
    if a_hits.is_empty() {
        return a_hits;
    }
    let b_hits = if search.b.is_empty() {
        Vec::new()
    } else {
        doc.search_page(page, &search.b, MAX_PAGE_HITS)
    };
    let c_hits = if search.c.is_empty() {
        Vec::new()
    } else {
        doc.search_page(page, &search.c, MAX_PAGE_HITS)
    };
    merge_compound_hits(
        &a_hits,
        &b_hits,
        &c_hits,
        !search.b.is_empty(),
        !search.c.is_empty(),
        cfg,
    )
}

/// Advance an active search until it resolves.
///
/// A prior failed search is snapshotted into `prior` when the document is
/// exhausted without any hit, for diagnostic reuse.
pub fn advance_search(
    search: &mut SearchState,
    prior: &mut SearchState,
    doc: &dyn DocumentEngine,
    cfg: &CompoundConfig,
    canvas: CanvasMetrics,
    heuristics: bool,
) -> SearchOutcome {
    if !search.active || search.mode == SearchMode::None || search.a.is_empty() {
        return SearchOutcome::Inactive;
    }
    let page_count = doc.page_count();
    if page_count == 0 {
        search.active = false;
        return SearchOutcome::Inactive;
    }

    search.refresh_alt(heuristics);

    if search.mode == SearchMode::InPage {
        search.inpage_index = 0;
        let page = clamp_page(search.page, page_count);
        search.page = page;
        search.hits = search_page_with_alt(doc, page as usize, search);
        if !search.hits.is_empty() {
            search.has_hits = true;
        }
        // One attempt only, never advances to another page.
        search.active = false;
        return SearchOutcome::InPage(search.hits.len());
    }

    while search.active {
        search.page = clamp_page(search.page, page_count);
        let page = search.page as usize;

        search.hits = match search.mode {
            SearchMode::Compound => compound_page_hits(doc, page, search, cfg),
            _ => search_page_with_alt(doc, page, search),
        };
        if !search.hits.is_empty() {
            search.has_hits = true;
        }

        if search.hits.is_empty() {
            match search.direction {
                1 => {
                    search.inpage_index = -1;
                    search.page += 1;
                    if search.page >= page_count as i32 {
                        if search.has_hits {
                            debug!("end of document, wrapping to start");
                            search.page = 0;
                            search.active = false;
                            return SearchOutcome::WrapStop;
                        }
                        debug!("end of document, no hits for '{}'", search.a);
                        *prior = search.clone();
                        search.not_found = true;
                        search.active = false;
                        return SearchOutcome::NotFound;
                    }
                }
                -1 => {
                    search.inpage_index = -1;
                    search.page -= 1;
                    if search.page < 0 {
                        if search.has_hits {
                            debug!("start of document, wrapping to end");
                            search.page = page_count as i32 - 1;
                            search.active = false;
                            return SearchOutcome::WrapStop;
                        }
                        debug!("start of document, no hits for '{}'", search.a);
                        *prior = search.clone();
                        search.not_found = true;
                        search.active = false;
                        return SearchOutcome::NotFound;
                    }
                }
                d => {
                    warn!("search direction {d} is invalid, deactivating");
                    search.active = false;
                    return SearchOutcome::Inactive;
                }
            }
            continue;
        }

        // Hits on this page: pick an index if none was chosen yet, order
        // the set largest-first and resolve to a centered jump target.
        if search.inpage_index < 0 {
            search.inpage_index = if search.direction == -1 {
                search.hits.len() as i32 - 1
            } else {
                0
            };
        }

        sort_hits_by_area(&mut search.hits);
        let idx = (search.inpage_index.max(0) as usize).min(search.hits.len() - 1);
        let bb = search.hits[idx];
        let (half_w, half_h) = canvas.half_page_offset();
        search.active = false;
        debug!(
            "resolved to page {} hit {} at ({}, {})",
            page + 1,
            idx,
            bb.x0,
            bb.y0
        );
        return SearchOutcome::Jump {
            page,
            x: bb.x0 - half_w,
            y: bb.y0 - half_h,
        };
    }

    SearchOutcome::Inactive
}

/// Single-shot compound scan: walk the document start to end once and
/// report the accepted hit count of the first page with any.
///
/// Short-circuits the way the controlling application expects: a lone
/// primary term reports its raw page count immediately, and a required
/// cross-term with zero hits on the anchored page aborts the whole run
/// with zero.
pub fn headless_scan(
    search: &mut SearchState,
    doc: &dyn DocumentEngine,
    cfg: &CompoundConfig,
) -> usize {
    if search.mode != SearchMode::Compound {
        return 0;
    }
    let page_count = doc.page_count();
    search.page = 0;
    search.direction = 1;

    while (search.page as usize) < page_count {
        let page = clamp_page(search.page, page_count) as usize;
        let a_hits = doc.search_page(page, &search.a, MAX_PAGE_HITS);

        if !a_hits.is_empty() {
            debug!(
                "'{}': {} hit(s) on page {}, cross-checking '{}' / '{}'",
                search.a,
                a_hits.len(),
                page + 1,
                search.b,
                search.c
            );

            // A single-term request is often a bare part code; its count
            // is the answer.
            if search.b.is_empty() {
                return a_hits.len();
            }

            let b_hits = doc.search_page(page, &search.b, MAX_PAGE_HITS);
            if b_hits.is_empty() {
                return 0;
            }

            let c_hits = if search.c.is_empty() {
                Vec::new()
            } else {
                let hits = doc.search_page(page, &search.c, MAX_PAGE_HITS);
                if hits.is_empty() {
                    return 0;
                }
                hits
            };

            let accepted = merge_compound_hits(
                &a_hits,
                &b_hits,
                &c_hits,
                true,
                !search.c.is_empty(),
                cfg,
            );
            if !accepted.is_empty() {
                debug!("{} accepted triple(s) on page {}", accepted.len(), page + 1);
                return accepted.len();
            }
        }

        search.page += 1;
    }

    0
}
