use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::pipeline::processing::normalize::format_seconds;

/// A single column value as handed over by a query source.
///
/// Every value is resolved to exactly one tag when the row is ingested, so
/// the normalizers only ever match on the tag and never inspect shapes again.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Integer(i64),
    Decimal(f64),
    NativeDate(NaiveDate),
    NativeTime(NaiveTime),
    NativeDateTime(NaiveDateTime),
    NativeInterval(Duration),
    String(String),
    Null,
}

static NULL_VALUE: RawValue = RawValue::Null;

impl RawValue {
    /// Resolve text coming from a store without native temporal types.
    ///
    /// ISO dates, times of day and date-times are promoted to their native
    /// tags; anything else stays a string. Digit-only text is left alone so
    /// zero-padded identifiers survive untouched.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.len() >= 8 {
            for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                    return RawValue::NativeDateTime(dt);
                }
            }
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                return RawValue::NativeDate(date);
            }
            if let Ok(time) = NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f") {
                return RawValue::NativeTime(time);
            }
        }
        RawValue::String(text.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Name of the tag, used in diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            RawValue::Integer(_) => "integer",
            RawValue::Decimal(_) => "decimal",
            RawValue::NativeDate(_) => "date",
            RawValue::NativeTime(_) => "time",
            RawValue::NativeDateTime(_) => "datetime",
            RawValue::NativeInterval(_) => "interval",
            RawValue::String(_) => "string",
            RawValue::Null => "null",
        }
    }

    /// String coercion used as the single fallback policy of the normalizers.
    /// `Null` has no text form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            RawValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Integer(v) => write!(f, "{v}"),
            RawValue::Decimal(v) => write!(f, "{v}"),
            RawValue::NativeDate(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            RawValue::NativeTime(t) => write!(f, "{t}"),
            RawValue::NativeDateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            RawValue::NativeInterval(d) => f.write_str(&format_seconds(d.num_seconds())),
            RawValue::String(s) => f.write_str(s),
            RawValue::Null => Ok(()),
        }
    }
}

impl Serialize for RawValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawValue::Integer(v) => serializer.serialize_i64(*v),
            RawValue::Decimal(v) => serializer.serialize_f64(*v),
            RawValue::String(s) => serializer.serialize_str(s),
            RawValue::Null => serializer.serialize_none(),
            other => serializer.collect_str(other),
        }
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Integer(v)
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        RawValue::Integer(i64::from(v))
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Decimal(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::String(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::String(v)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(v: NaiveDate) -> Self {
        RawValue::NativeDate(v)
    }
}

impl From<NaiveTime> for RawValue {
    fn from(v: NaiveTime) -> Self {
        RawValue::NativeTime(v)
    }
}

impl From<NaiveDateTime> for RawValue {
    fn from(v: NaiveDateTime) -> Self {
        RawValue::NativeDateTime(v)
    }
}

impl From<Duration> for RawValue {
    fn from(v: Duration) -> Self {
        RawValue::NativeInterval(v)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(RawValue::Null)
    }
}

/// One column of a raw row. `source` keeps the text a promoted temporal
/// value was parsed from.
#[derive(Debug, Clone, PartialEq)]
struct RawColumn {
    name: String,
    value: RawValue,
    source: Option<String>,
}

/// One row of a query result: column names in select order with their values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    columns: Vec<RawColumn>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<RawValue>) {
        self.columns.push(RawColumn {
            name: column.into(),
            value: value.into(),
            source: None,
        });
    }

    /// Push text from a store without temporal types. The value is resolved
    /// with [`RawValue::from_text`]; the original text is kept for verbatim
    /// and text columns.
    pub fn push_text(&mut self, column: impl Into<String>, text: &str) {
        let value = RawValue::from_text(text);
        let source = match value {
            RawValue::String(_) => None,
            _ => Some(text.to_string()),
        };
        self.columns.push(RawColumn {
            name: column.into(),
            value,
            source,
        });
    }

    /// Builder-style variant of [`RawRow::push`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.push(column, value);
        self
    }

    /// Builder-style variant of [`RawRow::push_text`].
    pub fn with_text(mut self, column: impl Into<String>, text: &str) -> Self {
        self.push_text(column, text);
        self
    }

    fn column(&self, column: &str) -> Option<&RawColumn> {
        self.columns.iter().find(|c| c.name == column)
    }

    /// Value of `column`; a missing column reads as `Null`. With duplicate
    /// names the first occurrence wins.
    pub fn get(&self, column: &str) -> &RawValue {
        self.column(column).map(|c| &c.value).unwrap_or(&NULL_VALUE)
    }

    /// Value of `column` as the store handed it over: promoted text comes
    /// back as the original string.
    pub fn verbatim(&self, column: &str) -> RawValue {
        match self.column(column) {
            Some(RawColumn {
                source: Some(text), ..
            }) => RawValue::String(text.clone()),
            Some(c) => c.value.clone(),
            None => RawValue::Null,
        }
    }

    /// Text of `column`, preferring the original text of promoted values.
    pub fn text(&self, column: &str) -> Option<String> {
        let c = self.column(column)?;
        match &c.source {
            Some(text) => Some(text.clone()),
            None => c.value.to_text(),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.column(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.columns.iter().map(|c| (c.name.as_str(), &c.value))
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (k, v) in iter {
            row.push(k, v);
        }
        row
    }
}

/// Canonical display form of a raw value after one normalizer.
pub type NormalizedField = Option<String>;

/// Value of one report column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Output of a normalizer, a sentinel, or a slot.
    Normalized(NormalizedField),
    /// Parent field copied as-is from the raw row.
    Verbatim(RawValue),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Normalized(value) => value.clone(),
            FieldValue::Verbatim(value) => value.to_text(),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Normalized(value) => value.is_none(),
            FieldValue::Verbatim(value) => value.is_null(),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Normalized(Some(text)) => serializer.serialize_str(text),
            FieldValue::Normalized(None) => serializer.serialize_none(),
            FieldValue::Verbatim(value) => value.serialize(serializer),
        }
    }
}

/// One assembled report record. Columns keep their declared order and every
/// declared column is present, possibly null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportRow {
    fields: Vec<(String, FieldValue)>,
}

impl ReportRow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: FieldValue) {
        self.fields.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Text of `column`, `None` when the column is null or undeclared.
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(FieldValue::as_text)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for ReportRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Offset/limit pagination forwarded to the query source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    /// Page with `limit` held to `1..=MAX_PAGE_LIMIT`.
    pub fn clamped(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// A request for one page of a named report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub report: String,
    #[serde(default)]
    pub page: Page,
}

impl ReportRequest {
    pub fn new(report: impl Into<String>) -> Self {
        Self {
            report: report.into(),
            page: Page::default(),
        }
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }
}

/// Everything one upstream call returns for a report: the parent rows and,
/// for pivoted reports, the child rows to collapse into slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBatch {
    pub rows: Vec<RawRow>,
    pub children: Vec<RawRow>,
}

impl RowBatch {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<RawRow>) -> Self {
        self.children = children;
        self
    }
}
