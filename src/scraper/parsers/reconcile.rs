//! Best-effort correction of swapped or misaligned columns.
//!
//! Header drift occasionally lands the barrier draw in the trainer column
//! or vice versa; a bare 1..=20 integer is unambiguously a draw, and
//! letter-bearing text is unambiguously a trainer name. The identity column
//! also picks up control-panel artifacts that must be blanked.

use super::{has_word_char, Field, RawEntry};

/// Control-panel marker that leaks into the identity column.
const MY_CARD_MARKER: &str = "我的排位表";

/// Apply the per-row corrections, in documented order:
/// 1. empty draw + bare 1..=20 integer in the trainer column → move it to
///    draw and clear the trainer;
/// 2. otherwise, empty trainer + letter-bearing text in the draw column →
///    move it to trainer and clear the draw;
/// 3. blank the identity when it is a known non-data marker or purely
///    numeric.
pub fn reconcile(raw: &mut RawEntry) {
    let draw = raw.get(Field::Draw).to_string();
    let trainer = raw.get(Field::Trainer).to_string();

    if draw.is_empty() && is_draw_number(&trainer) {
        raw.set(Field::Draw, trainer);
        raw.set(Field::Trainer, String::new());
    } else if trainer.is_empty() && !draw.is_empty() && has_word_char(&draw) && !is_draw_number(&draw)
    {
        raw.set(Field::Trainer, draw);
        raw.set(Field::Draw, String::new());
    }

    let name = raw.get(Field::HorseName);
    let name_norm: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    if name_norm.contains(MY_CARD_MARKER)
        || (!name_norm.is_empty() && name_norm.chars().all(|c| c.is_ascii_digit()))
    {
        raw.set(Field::HorseName, String::new());
    }
}

/// A bare one- or two-digit integer in the valid barrier range.
fn is_draw_number(text: &str) -> bool {
    if text.is_empty() || text.len() > 2 || !text.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    matches!(text.parse::<u32>(), Ok(n) if (1..=20).contains(&n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with(draw: &str, trainer: &str, name: &str) -> RawEntry {
        let mut raw = RawEntry::default();
        raw.set(Field::Draw, draw.to_string());
        raw.set(Field::Trainer, trainer.to_string());
        raw.set(Field::HorseName, name.to_string());
        raw
    }

    #[test]
    fn test_draw_recovered_from_trainer_column() {
        let mut raw = raw_with("", "7", "和諧大師");
        reconcile(&mut raw);
        assert_eq!(raw.get(Field::Draw), "7");
        assert_eq!(raw.get(Field::Trainer), "");
    }

    #[test]
    fn test_trainer_recovered_from_draw_column() {
        let mut raw = raw_with("呂健威", "", "和諧大師");
        reconcile(&mut raw);
        assert_eq!(raw.get(Field::Trainer), "呂健威");
        assert_eq!(raw.get(Field::Draw), "");
    }

    #[test]
    fn test_out_of_range_integer_not_a_draw() {
        let mut raw = raw_with("", "21", "和諧大師");
        reconcile(&mut raw);
        assert_eq!(raw.get(Field::Draw), "");
        assert_eq!(raw.get(Field::Trainer), "21");
    }

    #[test]
    fn test_rules_do_not_both_fire() {
        // Both populated and plausible: nothing moves
        let mut raw = raw_with("7", "呂健威", "和諧大師");
        reconcile(&mut raw);
        assert_eq!(raw.get(Field::Draw), "7");
        assert_eq!(raw.get(Field::Trainer), "呂健威");
    }

    #[test]
    fn test_identity_marker_blanked() {
        let mut raw = raw_with("7", "呂健威", "設定我的排位表");
        reconcile(&mut raw);
        assert_eq!(raw.get(Field::HorseName), "");
    }

    #[test]
    fn test_identity_pure_number_blanked() {
        let mut raw = raw_with("7", "呂健威", "128");
        reconcile(&mut raw);
        assert_eq!(raw.get(Field::HorseName), "");
    }

    #[test]
    fn test_identity_short_real_name_kept() {
        let mut raw = raw_with("7", "呂健威", "好馬");
        reconcile(&mut raw);
        assert_eq!(raw.get(Field::HorseName), "好馬");
    }
}
