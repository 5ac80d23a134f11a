//! Field-typed cell extraction rules.
//!
//! Each canonical column has a rule for digging its value out of a grid
//! cell: the silks column prefers an embedded image reference, the declared
//! weight column splits "1080 (+5)" into magnitude and delta, the jockey
//! column drops the overweight annotation, and the horse name column reads
//! the detail-page anchor (retrying across the whole row when the indexed
//! cell holds a bare placeholder number).

use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::debug;

use super::{element_text, Field, RawEntry};
use crate::scraper::absolute_url;
use crate::scraper::parsers::header::HeaderMap;

/// Extract one row into raw canonical columns using the resolved header
/// map. Missing or out-of-range indexes yield empty strings.
pub fn extract_row(row: ElementRef<'_>, cells: &[ElementRef<'_>], map: &HeaderMap) -> RawEntry {
    let mut raw = RawEntry::default();
    for field in Field::ALL {
        let Some(&j) = map.get(&field) else {
            continue;
        };
        if j >= cells.len() {
            continue;
        }
        let value = extract_cell(field, cells[j], row);
        raw.set(field, value);
    }
    raw
}

fn extract_cell(field: Field, cell: ElementRef<'_>, row: ElementRef<'_>) -> String {
    match field {
        Field::Silks => image_reference(cell),
        Field::Jockey => strip_person_annotation(&element_text(cell)),
        Field::HorseName => anchor_identity(cell, row),
        Field::DeclaredWt => paired_numeric(&element_text(cell)).0,
        Field::DeclaredWtDelta => paired_numeric(&element_text(cell)).1,
        _ => element_text(cell),
    }
}

/// Visual-identifier rule: first `<img>` `data-src`/`src` qualified against
/// the site base, else the image's alternate text, else the cell text.
pub fn image_reference(cell: ElementRef<'_>) -> String {
    let img_sel = Selector::parse("img").unwrap();
    if let Some(img) = cell.select(&img_sel).next() {
        if let Some(src) = img
            .value()
            .attr("data-src")
            .or_else(|| img.value().attr("src"))
        {
            return absolute_url(src);
        }
        if let Some(alt) = img.value().attr("alt") {
            return super::normalize_ws(alt);
        }
    }
    element_text(cell)
}

/// Paired-numeric rule: "1080 (+5)" → ("1080", "+5"); "1080" → ("1080", "");
/// anything that does not match degrades to the raw text in the magnitude
/// slot with an empty delta.
pub fn paired_numeric(text: &str) -> (String, String) {
    let re = Regex::new(r"(\d{2,4})\s*(?:\(\s*([+-]?\d+)\s*\))?").unwrap();
    match re.captures(text) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
        ),
        None => (text.to_string(), String::new()),
    }
}

/// Annotated-person rule: drop a trailing parenthesized signed number
/// (an overweight / claiming annotation) from the display text.
pub fn strip_person_annotation(text: &str) -> String {
    let re = Regex::new(r"\((?:[-+]?\d+)\)").unwrap();
    super::normalize_ws(&re.replace_all(text, ""))
}

/// Link-bearing identity rule: prefer the text of an anchor pointing at the
/// horse detail page. When the indexed cell only holds a bare short numeric
/// placeholder, retry across the entire row before falling back to the raw
/// cell text.
pub fn anchor_identity(cell: ElementRef<'_>, row: ElementRef<'_>) -> String {
    let anchor_sel = Selector::parse(r#"a[href*="Horse"]"#).unwrap();

    if let Some(a) = cell.select(&anchor_sel).next() {
        let name = element_text(a);
        if !name.is_empty() {
            return name;
        }
    }

    let cell_text = element_text(cell);
    let bare_placeholder =
        cell_text.chars().all(|c| c.is_ascii_digit()) || cell_text.chars().count() <= 2;
    if bare_placeholder {
        if let Some(a) = row.select(&anchor_sel).next() {
            let name = element_text(a);
            if !name.is_empty() {
                return name;
            }
        }
    }

    cell_text
}

/// Numeric coercion: strip everything but digits and minus signs, then
/// parse. Failure leaves the field unset; it is never fatal.
pub fn coerce_int(text: &str) -> Option<i64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    if digits.is_empty() {
        return None;
    }
    match digits.parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) => {
            debug!(raw = text, "numeric coercion failed");
            None
        }
    }
}

pub fn coerce_u32(text: &str) -> Option<u32> {
    coerce_int(text).and_then(|n| u32::try_from(n).ok())
}

pub fn coerce_i32(text: &str) -> Option<i32> {
    coerce_int(text).and_then(|n| i32::try_from(n).ok())
}
