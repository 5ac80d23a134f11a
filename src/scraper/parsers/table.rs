//! Starter-grid location inside a race card page.
//!
//! The page carries several tables (navigation, tool bars, banners); the
//! entry grid is found by scoring every table fragment and keeping the
//! first maximum in document order.

use scraper::{ElementRef, Html, Selector};

use super::element_text;

/// Primary data-grid marker class
const PRIMARY_MARKER: &str = "f_fs12";

/// Secondary marker class
const SECONDARY_MARKER: &str = "table_bd";

/// Bilingual starter-grid keywords; one hit is enough for the content bonus.
pub const GRID_KEYWORDS: [&str; 15] = [
    "近績",
    "馬名",
    "排位體重",
    "負磅",
    "練馬師",
    "騎師",
    "馬號",
    "出馬表",
    "Horse No.",
    "Last 6 Runs",
    "Horse Wt.",
    "Trainer",
    "Jockey",
    "Draw",
    "Rtg",
];

/// Cheap plausibility probe: does this page even carry a starter grid?
/// Applied to raw markup before parsing, so a missing or error variant can
/// be discarded without building a parse tree.
pub fn looks_like_race_card(html: &str) -> bool {
    !html.is_empty() && GRID_KEYWORDS.iter().any(|kw| html.contains(kw))
}

/// Locate the starter grid in a parsed page.
///
/// Scoring per table: +40 primary marker class, +30 secondary marker class,
/// +25 when any grid keyword appears in the fragment text, plus 1.1 per row
/// capped at 40. Ties break to the first maximum in document order. Returns
/// `None` when the page has no tables at all; no partial grid is ever
/// synthesized from multiple fragments.
pub fn locate_starter_table(doc: &Html) -> Option<ElementRef<'_>> {
    let table_sel = Selector::parse("table").unwrap();
    let tr_sel = Selector::parse("tr").unwrap();

    let mut best: Option<ElementRef<'_>> = None;
    let mut best_score = f64::MIN;

    for table in doc.select(&table_sel) {
        let mut score = 0.0;

        let classes: Vec<_> = table.value().classes().collect();
        if classes.iter().any(|c| *c == PRIMARY_MARKER) {
            score += 40.0;
        }
        if classes.iter().any(|c| *c == SECONDARY_MARKER) {
            score += 30.0;
        }

        let text = element_text(table);
        if GRID_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            score += 25.0;
        }

        let rows = table.select(&tr_sel).count();
        score += (rows as f64 * 1.1).min(40.0);

        if score > best_score {
            best_score = score;
            best = Some(table);
        }
    }

    best
}
