//! Temporal normalizers.
//!
//! The legacy store hands back dates, times of day and durations in several
//! shapes: native temporal values, integer counts, intervals. Each function
//! here turns one [`RawValue`] into its canonical display text. All of them
//! are total: a shape a normalizer does not understand is stringified, and
//! `Null` stays `None`.

use chrono::{Datelike, Days, NaiveDate};
use tracing::trace;

use crate::constants::{DEFAULT_ORDINAL_EPOCH, MAX_ISO_YEAR, SECONDS_PER_DAY};
use crate::types::{NormalizedField, RawValue};

/// Format a signed second count as `[-]HH:MM:SS`.
///
/// Every field is zero-padded to two digits; hours keep growing past 99.
pub(crate) fn format_seconds(total_seconds: i64) -> String {
    let sign = if total_seconds < 0 { "-" } else { "" };
    let magnitude = total_seconds.unsigned_abs();

    let hours = magnitude / 3600;
    let minutes = (magnitude % 3600) / 60;
    let seconds = magnitude % 60;
    format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
}

/// Day 1 of integer-encoded dates unless configured otherwise.
pub fn default_ordinal_epoch() -> NaiveDate {
    let (year, month, day) = DEFAULT_ORDINAL_EPOCH;
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// Normalize an interval or a signed integer second count to `[-]HH:MM:SS`.
///
/// Intervals are truncated to whole seconds toward zero.
pub fn normalize_duration(value: &RawValue) -> NormalizedField {
    match value {
        RawValue::Null => None,
        RawValue::NativeInterval(interval) => Some(format_seconds(interval.num_seconds())),
        RawValue::Integer(seconds) => Some(format_seconds(*seconds)),
        other => {
            trace!(tag = other.tag(), "duration value stringified");
            other.to_text()
        }
    }
}

/// Normalize a date-like value to `YYYY-MM-DD` using the default epoch.
pub fn normalize_date(value: &RawValue) -> NormalizedField {
    normalize_date_with_epoch(value, default_ordinal_epoch())
}

/// Normalize a date-like value to `YYYY-MM-DD`.
///
/// A positive integer is an ordinal day count where `1` is `epoch`.
/// Zero and negative integers are not ordinals and are stringified as-is, as
/// are ordinals whose date cannot be represented.
pub fn normalize_date_with_epoch(value: &RawValue, epoch: NaiveDate) -> NormalizedField {
    match value {
        RawValue::Null => None,
        RawValue::Integer(ordinal) if *ordinal > 0 => match ordinal_to_date(*ordinal, epoch) {
            Some(date) => Some(iso_date(date)),
            None => {
                trace!(ordinal, "ordinal date out of range, stringified");
                Some(ordinal.to_string())
            }
        },
        RawValue::Integer(other) => Some(other.to_string()),
        RawValue::NativeDate(date) => Some(iso_date(*date)),
        RawValue::NativeDateTime(date_time) => Some(iso_date(date_time.date())),
        other => {
            trace!(tag = other.tag(), "date value stringified");
            other.to_text()
        }
    }
}

/// Normalize a time of day to `HH:MM:SS`.
///
/// Integers are seconds since midnight and only accepted in `[0, 86400)`;
/// anything outside that range is stringified. Fractional seconds of native
/// times are dropped.
pub fn normalize_time_of_day(value: &RawValue) -> NormalizedField {
    match value {
        RawValue::Null => None,
        RawValue::NativeTime(time) => Some(time.format("%H:%M:%S").to_string()),
        RawValue::Integer(seconds) if (0..SECONDS_PER_DAY).contains(seconds) => {
            Some(format_seconds(*seconds))
        }
        other => {
            trace!(tag = other.tag(), "time of day value stringified");
            other.to_text()
        }
    }
}

fn ordinal_to_date(ordinal: i64, epoch: NaiveDate) -> Option<NaiveDate> {
    let offset = u64::try_from(ordinal.checked_sub(1)?).ok()?;
    epoch
        .checked_add_days(Days::new(offset))
        .filter(|date| date.year() <= MAX_ISO_YEAR)
}

fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
