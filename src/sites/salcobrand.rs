use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use serde_json::Value;

use super::html::{first, json_bool, json_path, json_text, meta_property, next_sibling, select, select_in, text};
use crate::record::RawRecord;

static TRACKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var product_traker_data = (\{.*\});").unwrap());
static PRINCIPLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Principio Activo: ([^|]+)").unwrap());

/// The inline analytics tracker carries name, price, stock and bioequivalence.
/// Without it nothing required can be read and validation rejects the page.
pub(super) fn parse(doc: &Html) -> RawRecord {
    let mut raw = RawRecord {
        active_principle: meta_property(doc, "og:description").and_then(|d| active_principle(&d)),
        sku: sku(doc),
        lab_name: lab_name(doc),
        ..Default::default()
    };

    if let Some(data) = tracker(doc) {
        raw.web_name = json_text(data.get("name"));
        raw.is_available = json_bool(data.get("isAvailable"));
        raw.price = json_text(data.get("price")).map(|p| format!("${}", p));
        raw.bioequivalent = data
            .get("products")
            .and_then(Value::as_object)
            .and_then(|products| products.values().next())
            .and_then(|first| json_bool(json_path(first, &["params", "bioequivalent"])));
    }

    raw
}

fn tracker(doc: &Html) -> Option<Value> {
    select(doc, "script").into_iter().find_map(|script| {
        let body: String = script.text().collect();
        let caps = TRACKER_RE.captures(&body)?;
        serde_json::from_str(&caps[1]).ok()
    })
}

/// "… | Principio Activo: Rosuvastatina / Rosuvastatina Cálcica | …" → "Rosuvastatina"
fn active_principle(description: &str) -> Option<String> {
    let caps = PRINCIPLE_RE.captures(description)?;
    caps[1]
        .split('/')
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn sku(doc: &Html) -> Option<String> {
    let span = first(doc, "span.sku")?;
    let body: String = span.text().collect();
    let last = body.lines().map(str::trim).filter(|l| !l.is_empty()).last()?;
    let value = match last.split_once(':') {
        Some((_, v)) => v.trim(),
        None => last,
    };
    Some(value.to_string()).filter(|v| !v.is_empty())
}

fn lab_name(doc: &Html) -> Option<String> {
    let area = first(doc, "div.description-area")?;
    let heading = select_in(area, "h4")
        .into_iter()
        .find(|h| text(*h) == "Laboratorio")?;
    next_sibling(heading, "p")
        .or_else(|| next_sibling(heading, "div"))
        .map(text)
        .filter(|t| !t.is_empty())
}
