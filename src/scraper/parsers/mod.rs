//! Parsers that turn race card markup and odds JSON into canonical records.

pub mod fields;
pub mod header;
pub mod odds;
pub mod race_card;
pub mod reconcile;
pub mod table;

pub use header::HeaderMap;
pub use odds::{build_odds_map, PoolOdds};
pub use race_card::RaceCardParser;

use scraper::{ElementRef, Node};

/// Canonical entry-grid columns, in the fixed output (and positional
/// fallback) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    HorseNo,
    Last6,
    Silks,
    HorseName,
    BrandNo,
    WeightLb,
    Jockey,
    Draw,
    Trainer,
    Rating,
    RatingDelta,
    DeclaredWt,
    DeclaredWtDelta,
    Age,
    Allowance,
    Sex,
    SeasonStakes,
    Priority,
    DaysSinceLastRun,
    Gear,
    Owner,
    Sire,
    Dam,
    ImportCat,
}

impl Field {
    pub const COUNT: usize = 24;

    pub const ALL: [Field; Field::COUNT] = [
        Field::HorseNo,
        Field::Last6,
        Field::Silks,
        Field::HorseName,
        Field::BrandNo,
        Field::WeightLb,
        Field::Jockey,
        Field::Draw,
        Field::Trainer,
        Field::Rating,
        Field::RatingDelta,
        Field::DeclaredWt,
        Field::DeclaredWtDelta,
        Field::Age,
        Field::Allowance,
        Field::Sex,
        Field::SeasonStakes,
        Field::Priority,
        Field::DaysSinceLastRun,
        Field::Gear,
        Field::Owner,
        Field::Sire,
        Field::Dam,
        Field::ImportCat,
    ];

    /// Column index in the fixed positional template, used when no header
    /// row produces any alias mapping.
    pub fn default_index(&self) -> usize {
        Field::ALL.iter().position(|f| f == self).unwrap()
    }

    /// Canonical header label on the Chinese page.
    pub fn label(&self) -> &'static str {
        match self {
            Field::HorseNo => "馬匹編號",
            Field::Last6 => "6次近績",
            Field::Silks => "綵衣",
            Field::HorseName => "馬名",
            Field::BrandNo => "烙號",
            Field::WeightLb => "負磅",
            Field::Jockey => "騎師",
            Field::Draw => "檔位",
            Field::Trainer => "練馬師",
            Field::Rating => "評分",
            Field::RatingDelta => "評分+/-",
            Field::DeclaredWt => "排位體重",
            Field::DeclaredWtDelta => "排位體重+/-",
            Field::Age => "馬齡",
            Field::Allowance => "分齡讓磅",
            Field::Sex => "性別",
            Field::SeasonStakes => "今季獎金",
            Field::Priority => "優先參賽次序",
            Field::DaysSinceLastRun => "上賽距今日數",
            Field::Gear => "配備",
            Field::Owner => "馬主",
            Field::Sire => "父系",
            Field::Dam => "母系",
            Field::ImportCat => "進口類別",
        }
    }

    /// Bilingual header aliases seen across page revisions.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::HorseNo => &["序號", "馬號", "No", "Number"],
            Field::Last6 => &["近績", "Last 6 Runs", "Form"],
            Field::Silks => &["Silks", "Colours", "Colors", "Jersey", "絲衣", "絲衫", "絲褸"],
            Field::HorseName => &["Horse", "Horse Name", "馬匹"],
            Field::BrandNo => &["Brand No.", "Brand No", "烙號/編號", "編號"],
            Field::WeightLb => &["Handicap", "Wt", "Weight", "負磅(磅)"],
            Field::Jockey => &["Jockey", "騎師(可能超磅)"],
            Field::Draw => &["Draw", "Gate", "Barrier", "檔"],
            Field::Trainer => &["Trainer", "Trainers", "練者"],
            Field::Rating => &["Rtg", "Rating", "評分(Rtg)"],
            Field::RatingDelta => &["Rtg+/-", "+/-", "Rating+/-", "評分變動"],
            Field::DeclaredWt => &["Horse Wt.", "Declared Wt.", "體重", "宣告體重"],
            Field::DeclaredWtDelta => &["Wt+/-", "體重增減"],
            Field::Age => &["Age"],
            Field::Allowance => &["WFA", "Weight For Age", "Allow", "Allowance"],
            Field::Sex => &["Sex", "G"],
            Field::SeasonStakes => &["Season Stakes", "季內獎金"],
            Field::Priority => &["Priority", "優先序"],
            Field::DaysSinceLastRun => &["Days Since Last Run", "DSLR", "上次出賽日數"],
            Field::Gear => &["Gear", "Equip"],
            Field::Owner => &["Owner"],
            Field::Sire => &["Sire"],
            Field::Dam => &["Dam"],
            Field::ImportCat => &["Import Cat.", "Import", "Import Category", "來港類別"],
        }
    }
}

/// One extracted grid row: raw text per canonical column, before
/// reconciliation and numeric coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    values: [String; Field::COUNT],
}

impl RawEntry {
    pub fn get(&self, field: Field) -> &str {
        &self.values[field.default_index()]
    }

    pub fn set(&mut self, field: Field, value: String) {
        self.values[field.default_index()] = value;
    }

    pub fn take(&mut self, field: Field) -> String {
        std::mem::take(&mut self.values[field.default_index()])
    }
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized form used for header alias matching: case-insensitive,
/// whitespace-stripped.
pub fn normalize_for_match(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Visible text of an element, with `<br>` line breaks rendered as " / "
/// (multi-line cells such as the last-six-runs column keep their shape)
/// and whitespace normalized.
pub fn element_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if e.name() == "br" => out.push_str(" / "),
            _ => {}
        }
    }
    normalize_ws(&out)
}

/// Direct `td`/`th` children of a row element, in document order. Nested
/// tables inside a cell do not contribute extra cells.
pub fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
        .collect()
}

/// True when the text contains at least one letter or CJK character, i.e.
/// could plausibly be a name.
pub fn has_word_char(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_ascii_alphabetic() || is_cjk(c))
}

pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}
