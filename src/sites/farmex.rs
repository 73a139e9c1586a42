use scraper::Html;

use super::html::{after_colon, first, first_in, json_path, json_text, script_json, text};
use crate::record::RawRecord;

pub(super) fn parse(doc: &Html) -> RawRecord {
    let ld = script_json(doc, r#"script[type="application/ld+json"]"#);
    let price_box = first(doc, "div.product-price");

    RawRecord {
        web_name: first(doc, "h1.page-heading")
            .map(|h| text(h).trim_matches('"').trim().to_string())
            .filter(|n| !n.is_empty()),
        price: price_box
            .and_then(|b| first_in(b, "div.detail-price"))
            .map(text)
            .filter(|p| !p.is_empty()),
        // "Stock: N"
        is_available: price_box
            .and_then(|b| first_in(b, "pre"))
            .and_then(|pre| after_colon(&text(pre)))
            .and_then(|n| n.parse::<i64>().ok())
            .map(|n| n > 0),
        sku: ld.as_ref().and_then(|v| json_text(v.get("sku"))),
        lab_name: ld
            .as_ref()
            .and_then(|v| json_text(json_path(v, &["brand", "name"]))),
        ..Default::default()
    }
}
