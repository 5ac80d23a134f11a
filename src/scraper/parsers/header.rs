//! Header-row selection and canonical column mapping.
//!
//! The grid's header drifts between languages and revisions: sometimes a
//! grouping row sits above the real per-column header, sometimes the header
//! repeats mid-table, sometimes it is missing outright. Resolution scores
//! candidate rows, descends past grouping rows, maps cells to canonical
//! fields through bilingual alias lists, and falls back to a fixed
//! positional template when nothing maps.

use std::collections::HashMap;

use super::{normalize_for_match, Field};

/// Keywords that mark a row as a header candidate.
pub const HEADER_KEYWORDS: [&str; 9] = [
    "馬名", "近績", "騎師", "練馬師", "檔", "檔位", "Draw", "Rtg", "Horse Wt.",
];

/// Leaf-column keywords: a real per-column header names at least one of
/// these; a grouping row does not.
const LEAF_KEYWORDS: [&str; 12] = [
    "馬名",
    "檔位",
    "排位體重",
    "評分",
    "騎師",
    "練馬師",
    "Horse",
    "Draw",
    "Horse Wt.",
    "Jockey",
    "Trainer",
    "Rtg",
];

/// How many leading rows are scanned for the header.
const HEADER_SCAN_ROWS: usize = 8;

/// How many rows below a grouping header are scanned for the leaf header.
const LEAF_DESCENT_ROWS: usize = 3;

/// Canonical field → source column index.
pub type HeaderMap = HashMap<Field, usize>;

/// One grid row as seen by the resolver: cell texts plus the count of
/// header-tagged (`<th>`) cells.
#[derive(Debug, Clone, Default)]
pub struct RowData {
    pub texts: Vec<String>,
    pub th_count: usize,
}

impl RowData {
    pub fn joined(&self) -> String {
        self.texts.join("|")
    }

    /// Number of header keywords appearing in the row's concatenated text.
    pub fn header_keyword_hits(&self) -> usize {
        let joined = self.joined();
        HEADER_KEYWORDS.iter().filter(|kw| joined.contains(*kw)).count()
    }
}

/// Pick the header row: scan the first 8 rows, score each by
/// (header-keyword hits × 10) + (th cell count), first maximum wins. If the
/// winner is a grouping row (no leaf keyword in any cell), adopt the first
/// leaf-bearing row among the next 3 instead. Returns `None` only for an
/// empty grid.
pub fn select_header_row(rows: &[RowData]) -> Option<usize> {
    if rows.is_empty() {
        return None;
    }

    let mut best_i = 0;
    let mut best_score = -1i64;
    for (i, row) in rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let score = (row.header_keyword_hits() * 10 + row.th_count) as i64;
        if score > best_score {
            best_score = score;
            best_i = i;
        }
    }

    if !has_leaf_cell(&rows[best_i]) {
        for j in best_i + 1..(best_i + 1 + LEAF_DESCENT_ROWS).min(rows.len()) {
            if has_leaf_cell(&rows[j]) {
                return Some(j);
            }
        }
    }

    Some(best_i)
}

fn has_leaf_cell(row: &RowData) -> bool {
    row.texts
        .iter()
        .any(|cell| LEAF_KEYWORDS.iter().any(|kw| cell.contains(kw)))
}

/// Map header cells to canonical fields.
///
/// Matching is case-insensitive, whitespace-stripped, bidirectional
/// substring against the field's label and alias list. The first cell to
/// match a field claims it; later cells cannot reassign it. One cell may
/// claim several fields.
pub fn map_header(header_cells: &[String]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (i, cell) in header_cells.iter().enumerate() {
        let cell_norm = normalize_for_match(cell);
        if cell_norm.is_empty() {
            continue;
        }
        for field in Field::ALL {
            if map.contains_key(&field) {
                continue;
            }
            let matched = std::iter::once(field.label())
                .chain(field.aliases().iter().copied())
                .any(|cand| {
                    let cand_norm = normalize_for_match(cand);
                    cell_norm.contains(&cand_norm) || cand_norm.contains(&cell_norm)
                });
            if matched {
                map.insert(field, i);
            }
        }
    }
    map
}

/// Fixed positional template: canonical column order, defined independently
/// of any page. Used when no header row produces a mapping.
pub fn positional_map() -> HeaderMap {
    Field::ALL.iter().map(|f| (*f, f.default_index())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(texts: &[&str], th_count: usize) -> RowData {
        RowData {
            texts: texts.iter().map(|s| s.to_string()).collect(),
            th_count,
        }
    }

    #[test]
    fn test_select_header_row_by_keywords() {
        let rows = vec![
            row(&["即時賠率", "貼士指數"], 0),
            row(&["馬匹編號", "馬名", "騎師", "檔位", "練馬師"], 5),
            row(&["1", "好馬", "潘頓", "3", "呂健威"], 0),
        ];
        assert_eq!(select_header_row(&rows), Some(1));
    }

    #[test]
    fn test_grouping_row_descends_to_leaf_row() {
        // A grouping banner wins on keyword+th score but names no leaf
        // column; the first leaf-bearing row below it is adopted instead
        let rows = vec![
            row(&["近績", "檔"], 8),
            row(&["馬號", "馬名"], 0),
            row(&["1", "好馬"], 0),
        ];
        assert_eq!(select_header_row(&rows), Some(1));
    }

    #[test]
    fn test_map_header_chinese() {
        let cells: Vec<String> = ["馬號", "6次近績", "綵衣", "馬名", "檔位", "練馬師"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let map = map_header(&cells);
        assert_eq!(map.get(&Field::HorseNo), Some(&0));
        assert_eq!(map.get(&Field::Last6), Some(&1));
        assert_eq!(map.get(&Field::Silks), Some(&2));
        assert_eq!(map.get(&Field::HorseName), Some(&3));
        assert_eq!(map.get(&Field::Draw), Some(&4));
        assert_eq!(map.get(&Field::Trainer), Some(&5));
    }

    #[test]
    fn test_map_header_language_parity() {
        // Equivalent alias coverage in both languages yields identical maps
        let zh: Vec<String> = ["馬號", "馬名", "負磅", "騎師", "檔位", "練馬師"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let en: Vec<String> = ["No.", "Horse Name", "Handicap", "Jockey", "Draw", "Trainer"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let zh_map = map_header(&zh);
        let en_map = map_header(&en);
        assert_eq!(zh_map, en_map);
        assert_eq!(zh_map.get(&Field::HorseName), Some(&1));
        assert_eq!(zh_map.get(&Field::Draw), Some(&4));
    }

    #[test]
    fn test_first_cell_claims_field_permanently() {
        let cells: Vec<String> = ["評分", "評分"].iter().map(|s| s.to_string()).collect();
        let map = map_header(&cells);
        assert_eq!(map.get(&Field::Rating), Some(&0));
    }

    #[test]
    fn test_unrecognized_header_maps_nothing() {
        let cells: Vec<String> = ["天氣", "跑道"].iter().map(|s| s.to_string()).collect();
        assert!(map_header(&cells).is_empty());
    }

    #[test]
    fn test_positional_template_shape() {
        let map = positional_map();
        assert_eq!(map.len(), Field::COUNT);
        assert_eq!(map.get(&Field::HorseNo), Some(&0));
        assert_eq!(map.get(&Field::Draw), Some(&7));
        assert_eq!(map.get(&Field::ImportCat), Some(&23));
    }
}
