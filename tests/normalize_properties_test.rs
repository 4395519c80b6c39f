use chrono::{Duration, NaiveDate};
use ops_reports::pipeline::processing::normalize::{
    normalize_date, normalize_date_with_epoch, normalize_duration, normalize_time_of_day,
};
use ops_reports::pipeline::processing::pivot::{ChildRecord, GroupKey, SlotPart, SlotPivot};
use ops_reports::types::RawValue;
use proptest::prelude::*;
use regex::Regex;

fn parse_hms(text: &str) -> i64 {
    let (sign, body) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text),
    };
    let parts: Vec<i64> = body.split(':').map(|p| p.parse().unwrap()).collect();
    sign * (parts[0] * 3600 + parts[1] * 60 + parts[2])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn time_of_day_in_range_is_canonical(seconds in 0i64..86_400) {
        let pattern = Regex::new(r"^\d{2}:\d{2}:\d{2}$").unwrap();
        let text = normalize_time_of_day(&RawValue::Integer(seconds)).unwrap();
        prop_assert!(pattern.is_match(&text), "{} is not HH:MM:SS", text);
        prop_assert_eq!(parse_hms(&text), seconds);
    }

    #[test]
    fn time_of_day_out_of_range_is_stringified(seconds in prop_oneof![i64::MIN..0i64, 86_400i64..i64::MAX]) {
        let text = normalize_time_of_day(&RawValue::Integer(seconds));
        prop_assert_eq!(text, Some(seconds.to_string()));
    }

    #[test]
    fn duration_reads_back_to_the_same_seconds(seconds in -10_000_000i64..10_000_000) {
        let pattern = Regex::new(r"^-?\d{2,}:\d{2}:\d{2}$").unwrap();
        let from_integer = normalize_duration(&RawValue::Integer(seconds)).unwrap();
        prop_assert!(pattern.is_match(&from_integer));
        prop_assert_eq!(parse_hms(&from_integer), seconds);

        let from_interval = normalize_duration(&RawValue::NativeInterval(Duration::seconds(seconds)));
        prop_assert_eq!(from_interval, Some(from_integer));
    }

    #[test]
    fn positive_ordinals_count_days_from_the_epoch(ordinal in 1i64..3_000_000) {
        let epoch = NaiveDate::from_ymd_opt(1, 1, 1).unwrap();
        let text = normalize_date(&RawValue::Integer(ordinal)).unwrap();
        let parsed = NaiveDate::parse_from_str(&text, "%Y-%m-%d").unwrap();
        prop_assert_eq!((parsed - epoch).num_days() + 1, ordinal);
    }

    #[test]
    fn non_positive_ordinals_are_stringified(ordinal in i64::MIN..=0i64) {
        let epoch = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
        prop_assert_eq!(
            normalize_date_with_epoch(&RawValue::Integer(ordinal), epoch),
            Some(ordinal.to_string())
        );
    }

    #[test]
    fn slots_hold_the_lowest_ranks(names in prop::collection::vec("[A-Z]{1,6}", 0..12)) {
        let key = GroupKey::new("7", "70");
        let children = names
            .iter()
            .map(|name| ChildRecord::new(key.clone(), name.clone(), Some(format!("{name} desc"))));
        let table = SlotPivot::new(6).assemble(children);
        let assignment = table.assignment(Some(&key));

        let mut sorted = names.clone();
        sorted.sort();
        for position in 1..=6 {
            prop_assert_eq!(
                assignment.value(position, SlotPart::Rank),
                sorted.get(position - 1).map(String::as_str)
            );
        }
        prop_assert_eq!(assignment.dropped(), names.len().saturating_sub(6));
        let expected_primary = sorted.first().map(|n| format!("{n} desc"));
        prop_assert_eq!(assignment.primary(), expected_primary.as_deref());
    }
}

#[test]
fn eight_children_fill_six_slots_and_drop_two() {
    let key = GroupKey::new("1", "2");
    let children = ["H", "G", "F", "E", "D", "C", "B", "A"]
        .into_iter()
        .map(|rank| ChildRecord::new(key.clone(), rank, Some(rank.to_lowercase())));
    let table = SlotPivot::new(6).assemble(children);
    let assignment = table.assignment(Some(&key));

    let slots: Vec<_> = assignment
        .named_slots()
        .into_iter()
        .map(|(name, value)| (name, value.unwrap_or_default()))
        .collect();
    assert_eq!(
        slots,
        vec![
            ("SLOT_1".to_string(), "a".to_string()),
            ("SLOT_2".to_string(), "b".to_string()),
            ("SLOT_3".to_string(), "c".to_string()),
            ("SLOT_4".to_string(), "d".to_string()),
            ("SLOT_5".to_string(), "e".to_string()),
            ("SLOT_6".to_string(), "f".to_string()),
        ]
    );
    assert_eq!(assignment.dropped(), 2);
    assert_eq!(table.dropped_total(), 2);
    assert_eq!(assignment.primary(), Some("a"));
}
