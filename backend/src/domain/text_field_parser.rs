//! Decoding of the compact, human-typed transaction strings.
//!
//! Amounts are typed in units of ten thousand, so every parsed integer is
//! multiplied by [`TEXT_UNIT`]. Malformed input never fails: anything that
//! cannot be read as a non-negative amount decodes to zero here, and nowhere
//! else in the chain has to care.

use once_cell::sync::Lazy;
use regex::Regex;
use shared::ChargeWithdraw;

/// Minor units represented by one typed unit
pub const TEXT_UNIT: i64 = 10_000;

/// Marks a charge inside free-text notes ("10충")
pub const CHARGE_MARKER: char = '충';
/// Marks a withdraw inside free-text notes ("5환")
pub const WITHDRAW_MARKER: char = '환';

static SLOT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+)(?:\s+([0-9]+))?").expect("slot pattern is valid"));

static NOTES_CHARGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"([0-9]{{1,3}}){}", CHARGE_MARKER)).expect("charge pattern is valid")
});

static NOTES_WITHDRAW_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"([0-9]{{1,3}}){}", WITHDRAW_MARKER)).expect("withdraw pattern is valid")
});

/// Convert a run of ASCII digits to minor units, or zero if it does not fit
fn to_minor_units(digits: &str) -> i64 {
    digits
        .parse::<i64>()
        .ok()
        .and_then(|value| value.checked_mul(TEXT_UNIT))
        .unwrap_or(0)
}

/// Add a term, dropping it if the sum would not be representable
pub(crate) fn accumulate(total: i64, term: i64) -> i64 {
    total.checked_add(term).unwrap_or(total)
}

/// Decode one slot: the first integer is the charge, an optional second
/// whitespace-separated integer is the withdraw.
///
/// Legacy (`site1..4`) and explicit (`charge_withdraw1..4`) slots share this
/// grammar; they only differ in which record field supplies the text.
pub fn parse_slot(input: Option<&str>) -> ChargeWithdraw {
    let Some(text) = input else {
        return ChargeWithdraw::default();
    };

    match SLOT_PATTERN.captures(text) {
        Some(captures) => ChargeWithdraw {
            charge: captures.get(1).map_or(0, |m| to_minor_units(m.as_str())),
            withdraw: captures.get(2).map_or(0, |m| to_minor_units(m.as_str())),
        },
        None => ChargeWithdraw::default(),
    }
}

/// Decode all four slots of one encoding
pub fn parse_slots(inputs: [Option<&str>; 4]) -> [ChargeWithdraw; 4] {
    inputs.map(parse_slot)
}

/// Sum every "NN충" into charge and every "NN환" into withdraw.
///
/// Only the 1-3 digits directly in front of a marker count, so "1500충"
/// contributes 500. Repeated markers accumulate.
pub fn parse_notes_adjustments(input: Option<&str>) -> ChargeWithdraw {
    let Some(text) = input else {
        return ChargeWithdraw::default();
    };

    let sum = |pattern: &Regex| {
        pattern
            .captures_iter(text)
            .filter_map(|captures| captures.get(1))
            .map(|m| to_minor_units(m.as_str()))
            .fold(0, accumulate)
    };

    ChargeWithdraw {
        charge: sum(&*NOTES_CHARGE_PATTERN),
        withdraw: sum(&*NOTES_WITHDRAW_PATTERN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cw(charge: i64, withdraw: i64) -> ChargeWithdraw {
        ChargeWithdraw { charge, withdraw }
    }

    #[test]
    fn test_parse_slot_charge_and_withdraw() {
        assert_eq!(parse_slot(Some("10 20")), cw(100_000, 200_000));
    }

    #[test]
    fn test_parse_slot_empty_and_absent() {
        assert_eq!(parse_slot(Some("")), cw(0, 0));
        assert_eq!(parse_slot(None), cw(0, 0));
    }

    #[test]
    fn test_parse_slot_non_numeric() {
        assert_eq!(parse_slot(Some("abc")), cw(0, 0));
    }

    #[test]
    fn test_parse_slot_charge_only() {
        assert_eq!(parse_slot(Some("7")), cw(70_000, 0));
        assert_eq!(parse_slot(Some("  7  ")), cw(70_000, 0));
    }

    #[test]
    fn test_parse_slot_finds_first_integer_after_text() {
        assert_eq!(parse_slot(Some("site 3 4")), cw(30_000, 40_000));
    }

    #[test]
    fn test_parse_slot_extra_integers_are_ignored() {
        assert_eq!(parse_slot(Some("1 2 3")), cw(10_000, 20_000));
    }

    #[test]
    fn test_parse_slot_overflow_decodes_to_zero() {
        let huge = "99999999999999999999999";
        assert_eq!(parse_slot(Some(huge)), cw(0, 0));
        // fits in i64 but not after scaling
        assert_eq!(parse_slot(Some("922337203685478 1")), cw(0, 10_000));
    }

    #[test]
    fn test_parse_slot_ignores_fullwidth_digits() {
        assert_eq!(parse_slot(Some("１０ 20")), cw(200_000, 0));
        assert_eq!(parse_slot(Some("１２")), cw(0, 0));
    }

    #[test]
    fn test_parse_slots_decodes_each_slot() {
        let slots = parse_slots([Some("1 2"), None, Some("x"), Some("3")]);
        assert_eq!(slots, [cw(10_000, 20_000), cw(0, 0), cw(0, 0), cw(30_000, 0)]);
    }

    #[test]
    fn test_notes_charge_and_withdraw() {
        assert_eq!(parse_notes_adjustments(Some("10충/5환")), cw(100_000, 50_000));
    }

    #[test]
    fn test_notes_repeated_markers_accumulate() {
        assert_eq!(parse_notes_adjustments(Some("10충/20충")), cw(300_000, 0));
    }

    #[test]
    fn test_notes_absent_or_plain_text() {
        assert_eq!(parse_notes_adjustments(None), cw(0, 0));
        assert_eq!(parse_notes_adjustments(Some("nothing to see")), cw(0, 0));
        assert_eq!(parse_notes_adjustments(Some("10 충")), cw(0, 0));
    }

    #[test]
    fn test_notes_ignore_fullwidth_digits() {
        assert_eq!(parse_notes_adjustments(Some("１０충/5환")), cw(0, 50_000));
        assert_eq!(parse_notes_adjustments(Some("1０충")), cw(0, 0));
    }

    #[test]
    fn test_notes_only_three_digits_before_marker_count() {
        assert_eq!(parse_notes_adjustments(Some("1500충")), cw(5_000_000, 0));
    }
}
