//! Record normalization.
//!
//! Two passes: [`merge`] folds one adapter result into its seeded record as rows come
//! in, and [`normalize_table`] coerces the whole aggregate into typed output rows once
//! the run is over.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::TransformError;
use crate::record::{CanonicalRecord, Field, RawRecord};

/// External column names, in output order.
pub const HEADER: [&str; 11] = [
    "Date",
    "Product Name",
    "Pharmacy",
    "Price",
    "Lab",
    "Is-Bioequivalent",
    "In-Stock",
    "Active Principle",
    "SKU",
    "Web-Reported Name",
    "URL",
];

/// Text the sites (and older datasets) use for "nothing here".
const NULL_SENTINELS: &[&str] = &["None", "null", "nan", "NaN", "N/A"];

/// A fully typed output row. Field order matches [`HEADER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    #[serde(rename = "Date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "Product Name")]
    pub declared_product_name: String,
    #[serde(rename = "Pharmacy")]
    pub declared_source_name: String,
    #[serde(rename = "Price")]
    pub price: Option<i64>,
    #[serde(rename = "Lab")]
    pub lab_name: Option<String>,
    #[serde(rename = "Is-Bioequivalent")]
    pub bioequivalent: Option<bool>,
    #[serde(rename = "In-Stock")]
    pub is_available: Option<bool>,
    #[serde(rename = "Active Principle")]
    pub active_principle: Option<String>,
    #[serde(rename = "SKU")]
    pub sku: Option<String>,
    #[serde(rename = "Web-Reported Name")]
    pub web_name: Option<String>,
    #[serde(rename = "URL")]
    pub url: String,
}

/// Merge a raw adapter result into its seeded record. Absent fields stay null.
pub fn merge(seed: CanonicalRecord, raw: RawRecord) -> CanonicalRecord {
    CanonicalRecord {
        date: unify(seed.date),
        price: unify(raw.price),
        lab_name: unify(raw.lab_name).map(|s| title_case(&s)),
        bioequivalent: raw.bioequivalent,
        is_available: raw.is_available,
        active_principle: unify(raw.active_principle).map(|s| title_case(&s)),
        sku: unify(raw.sku),
        web_name: unify(raw.web_name),
        ..seed
    }
}

/// Batch pass over the aggregate. Rows whose price cannot be coerced are returned as
/// errors and left out of the output.
pub fn normalize_table(
    records: impl IntoIterator<Item = CanonicalRecord>,
) -> (Vec<OutputRow>, Vec<TransformError>) {
    let mut rows = Vec::new();
    let mut dropped = Vec::new();
    for record in records {
        match normalize_record(record) {
            Ok(row) => rows.push(row),
            Err(e) => dropped.push(e),
        }
    }
    (rows, dropped)
}

pub fn normalize_record(record: CanonicalRecord) -> Result<OutputRow, TransformError> {
    let price = match unify(record.price) {
        None => None,
        Some(text) => Some(clean_price(&text).ok_or_else(|| TransformError {
            field: Field::Price,
            value: text.clone(),
            url: record.url.clone(),
        })?),
    };

    Ok(OutputRow {
        date: unify(record.date).and_then(|d| parse_date(&d)),
        declared_product_name: record.declared_product_name,
        declared_source_name: record.declared_source_name,
        price,
        lab_name: unify(record.lab_name).map(|s| title_case(&s)),
        bioequivalent: record.bioequivalent,
        is_available: record.is_available,
        active_principle: unify(record.active_principle).map(|s| title_case(&s)),
        sku: unify(record.sku),
        web_name: unify(record.web_name),
        url: record.url,
    })
}

/// Trim, and collapse blanks and sentinel strings to `None`.
fn unify(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() || NULL_SENTINELS.contains(&trimmed.as_str()) {
        None
    } else {
        Some(trimmed)
    }
}

/// CLP price text to an integer amount.
///
/// `"$12.990"` → 12990, `"$1.234,0"` → 1234, `"12990.0"` → 12990. Currency
/// symbol, whitespace and thousands separators go; a zero-only fractional
/// remainder is dropped. Anything else left over makes the value unparseable.
pub fn clean_price(text: &str) -> Option<i64> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '$')
        .collect();
    let whole = [".00", ",00", ".0", ",0"]
        .iter()
        .find_map(|suffix| compact.strip_suffix(suffix))
        .unwrap_or(&compact);
    let digits: String = whole.chars().filter(|c| *c != '.' && *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Upper-case the first letter of every word, lower-case the rest. A word starts
/// after any non-letter.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(c);
            prev_letter = false;
        }
    }
    out
}

/// `None` for anything that is not a date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}
