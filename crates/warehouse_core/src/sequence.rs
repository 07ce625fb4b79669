//! crates/warehouse_core/src/sequence.rs
//!
//! Human-readable document codes: `TYPE + DDMMYY + sequence`, e.g. `PNK10102501`.

use crate::domain::DocumentKind;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

fn suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{1,3})$").expect("static regex"))
}

/// `PNK` + `DDMMYY`.
pub fn date_prefix(kind: DocumentKind, date: NaiveDate) -> String {
    format!("{}{}", kind.prefix(), date.format("%d%m%y"))
}

/// Highest sequence number already used under `prefix`, or 0.
///
/// Suffixes are parsed as 1–3 digits while new codes are padded to 2, so a
/// 100th document on one date still counts toward the maximum.
pub fn max_sequence<'a, I>(prefix: &str, codes: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    codes
        .into_iter()
        .filter_map(|code| code.trim().strip_prefix(prefix))
        .filter_map(|suffix| suffix_pattern().captures(suffix))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// Computes the next code for `date` from the codes currently in the table.
pub fn next_code<'a, I>(kind: DocumentKind, date: NaiveDate, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = date_prefix(kind, date);
    let next = max_sequence(&prefix, existing) + 1;
    format!("{}{:02}", prefix, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 10).unwrap()
    }

    #[test]
    fn first_code_of_the_day_is_01() {
        assert_eq!(next_code(DocumentKind::Inbound, day(), Vec::<&str>::new()), "PNK10102501");
        assert_eq!(next_code(DocumentKind::Outbound, day(), Vec::<&str>::new()), "PXK10102501");
    }

    #[test]
    fn ignores_other_dates_and_other_kinds() {
        let existing = ["PNK09102507", "PXK10102509", "PNK10102503", "PNK10102501"];
        assert_eq!(
            next_code(DocumentKind::Inbound, day(), existing),
            "PNK10102504"
        );
    }

    #[test]
    fn skips_suffixes_that_are_not_one_to_three_digits() {
        let existing = ["PNK101025A1", "PNK1010251234", "PNK10102505"];
        assert_eq!(
            next_code(DocumentKind::Inbound, day(), existing),
            "PNK10102506"
        );
    }

    #[test]
    fn grows_past_two_digits() {
        let existing = ["PNK10102599"];
        assert_eq!(
            next_code(DocumentKind::Inbound, day(), existing),
            "PNK101025100"
        );
        assert_eq!(max_sequence("PNK101025", ["PNK101025100"]), 100);
    }

    #[test]
    fn sequential_codes_are_contiguous_and_distinct() {
        let mut codes: Vec<String> = Vec::new();
        for _ in 0..12 {
            let code = next_code(
                DocumentKind::Inbound,
                day(),
                codes.iter().map(String::as_str),
            );
            codes.push(code);
        }
        let expected: Vec<String> = (1..=12).map(|n| format!("PNK101025{:02}", n)).collect();
        assert_eq!(codes, expected);
    }
}
