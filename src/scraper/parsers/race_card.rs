//! Race card parser for racing.hkjc.com.
//!
//! Turns one race's page markup (either language variant) into a canonical
//! `Race` with its entries and reserves. The starter grid is located and
//! its header resolved first; remaining rows are classified, extracted
//! per-column, and reconciled.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

use super::fields::{self, extract_row};
use super::header::{self, RowData};
use super::reconcile::reconcile;
use super::table::locate_starter_table;
use super::{element_text, has_word_char, row_cells, Field, RawEntry};
use crate::types::{Entry, OffTime, Race};

/// Rows carrying any of these phrases are tool bars or banners, not data.
const NON_DATA_PHRASES: [&str; 10] = [
    "我的排位表",
    "下載排位資料",
    "統計資料",
    "晨操片段",
    "即時賠率",
    "貼士指數",
    "天氣及跑道狀況",
    "My Race Card",
    "Download",
    "Statistics",
];

/// A row whose concatenated text hits 3+ of these is a repeated or
/// secondary header, not data.
const REPEAT_HEADER_KEYWORDS: [&str; 10] = [
    "馬名",
    "近績",
    "騎師",
    "練馬師",
    "Draw",
    "Horse",
    "Jockey",
    "Trainer",
    "Rtg",
    "Horse Wt.",
];

/// Marker heading for the reserve (standby) block.
const RESERVE_MARKER: &str = "後備馬匹";

/// Surface words seen in the race header line.
const SURFACE_WORDS: [&str; 7] = [
    "草地",
    "全天候",
    "全天侯",
    "AWT",
    "泥地",
    "All Weather",
    "Turf",
];

/// Going words, checked in order; the first present wins.
const GOING_WORDS: [&str; 13] = [
    "好地",
    "好至快",
    "快地",
    "黏地",
    "軟地",
    "濕軟",
    "Good",
    "Good to Firm",
    "Firm",
    "Yielding",
    "Soft",
    "Good to Yielding",
    "Sloppy",
];

/// Parser for race card pages.
pub struct RaceCardParser;

impl RaceCardParser {
    /// Parse one race from its two language variants.
    ///
    /// The local (Chinese) variant is preferred for the grid; when it is
    /// missing or yields no table, the pipeline degrades to the foreign
    /// (English) variant. Returns `None` when neither variant holds a grid.
    pub fn parse(
        html_local: Option<&str>,
        html_foreign: Option<&str>,
        meeting_date: Option<NaiveDate>,
    ) -> Option<Race> {
        let doc_local = html_local.map(Html::parse_document);
        let doc_foreign = html_foreign.map(Html::parse_document);

        // Prefer the local variant; degrade to the other when the preferred
        // one fails the plausibility probe or holds no grid at all.
        let grid_doc = usable_grid(html_local, doc_local.as_ref())
            .or_else(|| usable_grid(html_foreign, doc_foreign.as_ref()))?;

        let table = locate_starter_table(grid_doc)?;
        let entries = Self::parse_entries(table);
        let reserves = Self::parse_reserves(grid_doc);

        let mut race = Self::extract_race_meta(
            doc_local.as_ref(),
            doc_foreign.as_ref(),
            grid_doc,
            meeting_date,
        );
        race.entries = entries;
        race.reserves = reserves;
        Some(race)
    }

    /// Extract all accepted data rows from the located grid.
    fn parse_entries(table: ElementRef<'_>) -> Vec<Entry> {
        let tr_sel = Selector::parse("tr").unwrap();
        let rows: Vec<ElementRef<'_>> = table.select(&tr_sel).collect();

        let row_data: Vec<RowData> = rows
            .iter()
            .map(|row| {
                let cells = row_cells(*row);
                RowData {
                    texts: cells.iter().map(|c| element_text(*c)).collect(),
                    th_count: cells
                        .iter()
                        .filter(|c| c.value().name() == "th")
                        .count(),
                }
            })
            .collect();

        let Some(header_idx) = header::select_header_row(&row_data) else {
            return Vec::new();
        };

        let mut map = header::map_header(&row_data[header_idx].texts);
        if map.is_empty() {
            debug!("no header mapping; using positional template");
            map = header::positional_map();
        }

        let mut entries = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            if i == header_idx {
                continue;
            }
            let cells = row_cells(*row);
            if cells.is_empty() || !Self::is_data_row(*row, &row_data[i].texts) {
                continue;
            }

            let mut raw = extract_row(*row, &cells, &map);
            reconcile(&mut raw);
            let entry = entry_from_raw(raw, false);
            if has_word_char(&entry.horse_name) {
                entries.push(entry);
            }
        }
        entries
    }

    /// Row classification: everything not rejected here is data.
    fn is_data_row(row: ElementRef<'_>, texts: &[String]) -> bool {
        let row_text = element_text(row);
        if NON_DATA_PHRASES.iter().any(|p| row_text.contains(p)) {
            return false;
        }

        let checkbox_sel = Selector::parse(r#"input[type="checkbox"]"#).unwrap();
        if row.select(&checkbox_sel).next().is_some() {
            return false;
        }

        let empty = texts.iter().filter(|t| t.trim().is_empty()).count();
        if empty >= 2.max(texts.len().saturating_sub(2)) {
            return false;
        }

        let joined = texts.join("|");
        let header_hits = REPEAT_HEADER_KEYWORDS
            .iter()
            .filter(|kw| joined.contains(*kw))
            .count();
        if header_hits >= 3 {
            return false;
        }

        true
    }

    /// Parse the reserve (standby) block: the first table following the
    /// reserve marker heading. Cells map positionally onto the first ten
    /// canonical columns; the leading header row is skipped.
    fn parse_reserves(doc: &Html) -> Vec<Entry> {
        let Some(table) = table_after_marker(doc, RESERVE_MARKER) else {
            return Vec::new();
        };

        let tr_sel = Selector::parse("tr").unwrap();
        let mut reserves = Vec::new();
        for row in table.select(&tr_sel).skip(1) {
            let cells = row_cells(row);
            if cells.is_empty() {
                continue;
            }
            let mut raw = RawEntry::default();
            for (field, cell) in Field::ALL.iter().take(10).zip(cells.iter()) {
                raw.set(*field, element_text(*cell));
            }
            reconcile(&mut raw);
            let entry = entry_from_raw(raw, true);
            if has_word_char(&entry.horse_name) {
                reserves.push(entry);
            }
        }
        reserves
    }

    /// Race-level metadata: bilingual names, off time, distance, surface,
    /// course configuration, going, class and handicap flag.
    fn extract_race_meta(
        doc_local: Option<&Html>,
        doc_foreign: Option<&Html>,
        grid_doc: &Html,
        meeting_date: Option<NaiveDate>,
    ) -> Race {
        let name_local = doc_local
            .and_then(|doc| heading_text(doc))
            .map(|h| strip_race_prefix(&h, r"^第\s*\d+\s*場\s*[-–—]\s*"))
            .unwrap_or_default();
        let name_foreign = doc_foreign
            .and_then(|doc| heading_text(doc))
            .map(|h| strip_race_prefix(&h, r"^Race\s*\d+\s*[-–—]\s*"))
            .unwrap_or_default();

        let text = element_text(grid_doc.root_element());

        let surface = SURFACE_WORDS
            .iter()
            .find(|w| text.contains(*w))
            .map(|w| {
                if w.contains("AWT") || w.contains("全天") || w.contains("All Weather") {
                    "AWT".to_string()
                } else {
                    "草地".to_string()
                }
            })
            .unwrap_or_default();

        let course_config = Regex::new(r#"["“]([ABC](?:\+\d)?)["”]\s*賽道"#)
            .unwrap()
            .captures(&text)
            .map(|c| c[1].to_string())
            .unwrap_or_default();

        let distance_m = Regex::new(r"(\d{3,4})\s*米")
            .unwrap()
            .captures(&text)
            .or_else(|| Regex::new(r"(\d{3,4})\s*[mM]\b").unwrap().captures(&text))
            .and_then(|c| c[1].parse().ok());

        let going = GOING_WORDS
            .iter()
            .find(|w| text.contains(*w))
            .map(|w| w.to_string())
            .unwrap_or_default();

        let class_text = Regex::new(r"(?i)(第[一二三四五六七八九十]+班|Class\s*\d+|Group\s*\d+)")
            .unwrap()
            .captures(&text)
            .map(|c| c[1].to_string())
            .unwrap_or_default();

        let handicap = name_local.contains("讓賽") || name_foreign.contains("Handicap");

        let off_local = extract_off_time_local(grid_doc)
            .or_else(|| doc_local.and_then(extract_off_time_local))
            .unwrap_or_default();
        let off_time = OffTime::compose(meeting_date, &off_local);

        Race {
            race_no: 0,
            name_local,
            name_foreign,
            off_time,
            distance_m,
            surface,
            course_config,
            going,
            class_text,
            handicap,
            entries: Vec::new(),
            reserves: Vec::new(),
        }
    }
}

fn usable_grid<'a>(html: Option<&str>, doc: Option<&'a Html>) -> Option<&'a Html> {
    let doc = doc?;
    if super::table::looks_like_race_card(html?) && locate_starter_table(doc).is_some() {
        Some(doc)
    } else {
        None
    }
}

fn entry_from_raw(mut raw: RawEntry, is_reserve: bool) -> Entry {
    Entry {
        horse_no: fields::coerce_u32(raw.get(Field::HorseNo)),
        last6: raw.take(Field::Last6),
        silks: raw.take(Field::Silks),
        horse_name: raw.take(Field::HorseName),
        brand_no: raw.take(Field::BrandNo),
        weight_lb: fields::coerce_u32(raw.get(Field::WeightLb)),
        jockey: raw.take(Field::Jockey),
        draw: fields::coerce_u32(raw.get(Field::Draw)).filter(|n| (1..=20).contains(n)),
        trainer: raw.take(Field::Trainer),
        rating: fields::coerce_i32(raw.get(Field::Rating)),
        rating_delta: raw.take(Field::RatingDelta),
        declared_wt: fields::coerce_u32(raw.get(Field::DeclaredWt)),
        declared_wt_delta: raw.take(Field::DeclaredWtDelta),
        age: fields::coerce_u32(raw.get(Field::Age)),
        allowance: raw.take(Field::Allowance),
        sex: raw.take(Field::Sex),
        season_stakes: raw.take(Field::SeasonStakes),
        priority: raw.take(Field::Priority),
        days_since_last_run: raw.take(Field::DaysSinceLastRun),
        gear: raw.take(Field::Gear),
        owner: raw.take(Field::Owner),
        sire: raw.take(Field::Sire),
        dam: raw.take(Field::Dam),
        import_cat: raw.take(Field::ImportCat),
        is_reserve,
    }
}

/// Text of the first `<h1>` on the page.
fn heading_text(doc: &Html) -> Option<String> {
    let sel = Selector::parse("h1").unwrap();
    doc.select(&sel).next().map(element_text)
}

fn strip_race_prefix(heading: &str, prefix: &str) -> String {
    Regex::new(prefix).unwrap().replace(heading, "").trim().to_string()
}

/// First "H:MM"/"HH:MM" token not embedded in a longer digit run. Scans the
/// page headings first, then the text before the control panel.
pub fn extract_off_time_local(doc: &Html) -> Option<String> {
    for tag in ["h1", "h2"] {
        let sel = Selector::parse(tag).unwrap();
        if let Some(el) = doc.select(&sel).next() {
            if let Some(t) = first_clock_time(&element_text(el)) {
                return Some(t);
            }
        }
    }

    let text = element_text(doc.root_element());
    let cut = text
        .split("設定我的排位表")
        .next()
        .and_then(|t| t.split("My Race Card").next())
        .unwrap_or(&text);
    first_clock_time(cut)
}

fn first_clock_time(text: &str) -> Option<String> {
    let re = Regex::new(r"\d{1,2}:\d{2}").unwrap();
    for m in re.find_iter(text) {
        let before_ok = text[..m.start()]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_ascii_digit());
        let after_ok = text[m.end()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_digit());
        if before_ok && after_ok {
            return Some(m.as_str().to_string());
        }
    }
    None
}

/// First table element after a text marker, in document order.
fn table_after_marker<'a>(doc: &'a Html, marker: &str) -> Option<ElementRef<'a>> {
    let mut seen_marker = false;
    for node in doc.root_element().descendants() {
        match node.value() {
            Node::Text(text) if text.contains(marker) => seen_marker = true,
            Node::Element(el) if seen_marker && el.name() == "table" => {
                return ElementRef::wrap(node);
            }
            _ => {}
        }
    }
    None
}

/// Meeting-level date and venue label gleaned from page text, used to
/// correct autodetected meeting metadata.
pub fn detect_meeting_info(doc: &Html) -> (Option<NaiveDate>, Option<&'static str>) {
    let text = element_text(doc.root_element());

    let date = Regex::new(r"(\d{4})年(\d{1,2})月(\d{1,2})日")
        .unwrap()
        .captures(&text)
        .and_then(|c| {
            NaiveDate::from_ymd_opt(
                c[1].parse().ok()?,
                c[2].parse().ok()?,
                c[3].parse().ok()?,
            )
        });

    let venue = if text.contains("跑馬地") {
        Some("跑馬地")
    } else if text.contains("沙田") {
        Some("沙田")
    } else {
        None
    };

    (date, venue)
}
