//! Raw CSV token cleaning.
//!
//! Every parser here is total: malformed input yields `None` rather than an
//! error. [`FieldCleaner`] additionally remembers which columns held
//! malformed tokens so the importer can report them.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

static PLAIN_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+(\.\d+)?$").expect("static regex"));

/// Longest first, so `zł/m²` is removed before `zł`.
const UNIT_SUFFIXES: &[&str] = &[
    "zł/m²", "zł/m2", "zl/m²", "zl/m2", "pln/m²", "pln/m2", "/m²", "/m2", "zł", "zl", "pln", "m²", "m2",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

const TRUTHY: &[&str] = &["true", "t", "yes", "y", "1", "tak"];
const FALSY: &[&str] = &["false", "f", "no", "n", "0", "nie", "brak"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Decimal,
    Integer,
    Date,
    Boolean,
    Text,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Decimal => "decimal",
            FieldKind::Integer => "integer",
            FieldKind::Date => "date",
            FieldKind::Boolean => "boolean",
            FieldKind::Text => "text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Absent,
    Decimal(Decimal),
    Integer(i64),
    Date(NaiveDate),
    Boolean(bool),
    Text(String),
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

/// A non-empty token that could not be read as its column's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedField {
    pub column: &'static str,
    pub kind: FieldKind,
    pub raw: String,
}

/// Converts a raw token into `kind`. Empty, absent and malformed tokens all
/// come back as [`FieldValue::Absent`].
pub fn normalize(raw: Option<&str>, kind: FieldKind) -> FieldValue {
    let Some(token) = present(raw) else {
        return FieldValue::Absent;
    };
    let value = match kind {
        FieldKind::Decimal => parse_decimal(token).map(FieldValue::Decimal),
        FieldKind::Integer => parse_integer(token).map(FieldValue::Integer),
        FieldKind::Date => parse_date(token).map(FieldValue::Date),
        FieldKind::Boolean => parse_bool(token).map(FieldValue::Boolean),
        FieldKind::Text => Some(FieldValue::Text(token.to_string())),
    };
    value.unwrap_or(FieldValue::Absent)
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Parses Polish-formatted amounts such as `450 000,50 zł` or `9 000 zł/m²`.
pub fn parse_decimal(token: &str) -> Option<Decimal> {
    let mut cleaned = token.trim().to_lowercase();
    if let Some(stripped) = UNIT_SUFFIXES.iter().find_map(|suffix| cleaned.strip_suffix(*suffix)) {
        cleaned = stripped.to_string();
    }
    let mut number: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();

    match (number.rfind(','), number.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => {
            number = number.replace('.', "").replace(',', ".");
        }
        (Some(_), Some(_)) => {
            number = number.replace(',', "");
        }
        (Some(_), None) => {
            number = if number.matches(',').count() == 1 {
                number.replace(',', ".")
            } else {
                number.replace(',', "")
            };
        }
        (None, Some(_)) if number.matches('.').count() > 1 => {
            number = number.replace('.', "");
        }
        _ => {}
    }

    if !PLAIN_NUMBER.is_match(&number) {
        return None;
    }
    Decimal::from_str(&number).ok()
}

/// Whole numbers, including decimal tokens with a zero fraction (`"3.0"`).
pub fn parse_integer(token: &str) -> Option<i64> {
    let value = parse_decimal(token)?;
    if value.fract().is_zero() {
        value.to_i64()
    } else {
        None
    }
}

pub fn parse_date(token: &str) -> Option<NaiveDate> {
    let token = token.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(token, format).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(token).ok().map(|dt| dt.date_naive()))
}

pub fn parse_bool(token: &str) -> Option<bool> {
    let token = token.trim().to_lowercase();
    if TRUTHY.contains(&token.as_str()) {
        Some(true)
    } else if FALSY.contains(&token.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Per-row cleaner that records malformed tokens as it goes.
#[derive(Debug, Default)]
pub struct FieldCleaner {
    malformed: Vec<MalformedField>,
}

impl FieldCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, raw: Option<&str>) -> Option<String> {
        match normalize(raw, FieldKind::Text) {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn decimal(&mut self, column: &'static str, raw: Option<&str>) -> Option<Decimal> {
        match self.clean(column, FieldKind::Decimal, raw) {
            FieldValue::Decimal(value) => Some(value),
            _ => None,
        }
    }

    pub fn integer(&mut self, column: &'static str, raw: Option<&str>) -> Option<i64> {
        match self.clean(column, FieldKind::Integer, raw) {
            FieldValue::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn date(&mut self, column: &'static str, raw: Option<&str>) -> Option<NaiveDate> {
        match self.clean(column, FieldKind::Date, raw) {
            FieldValue::Date(value) => Some(value),
            _ => None,
        }
    }

    pub fn boolean(&mut self, column: &'static str, raw: Option<&str>) -> Option<bool> {
        match self.clean(column, FieldKind::Boolean, raw) {
            FieldValue::Boolean(value) => Some(value),
            _ => None,
        }
    }

    pub fn malformed(&self) -> &[MalformedField] {
        &self.malformed
    }

    /// Normalizes `raw` and records it when a present token comes back absent.
    fn clean(&mut self, column: &'static str, kind: FieldKind, raw: Option<&str>) -> FieldValue {
        let value = normalize(raw, kind);
        if value.is_absent() {
            if let Some(token) = present(raw) {
                self.malformed.push(MalformedField {
                    column,
                    kind,
                    raw: token.to_string(),
                });
            }
        }
        value
    }
}
