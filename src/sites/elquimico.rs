use scraper::Html;

use super::html::{first, first_in, first_text, select, text};
use crate::record::RawRecord;

/// Subtotal is filled in client-side.
pub(super) const WAIT_FOR: &str = "span.money-subtotal";

const INFO_VALUE: &str = r#"span[class="productView-info-value"]"#;

pub(super) fn parse(doc: &Html) -> RawRecord {
    let info_values: Vec<String> = select(doc, INFO_VALUE).into_iter().map(text).collect();

    RawRecord {
        price: first_text(doc, WAIT_FOR),
        web_name: first_text(doc, "h1.productView-title"),
        is_available: info_values
            .iter()
            .find(|v| v.contains("En stock") || v.contains("Agotado"))
            .map(|v| v == "En stock"),
        // second info value is the SKU, the first one is the vendor
        sku: info_values.get(1).cloned().filter(|s| !s.is_empty()),
        active_principle: first(doc, "div.tab-popup-content")
            .and_then(|c| first_in(c, "strong"))
            .map(text)
            .filter(|s| !s.is_empty()),
        lab_name: first(doc, "div.productView-info-item")
            .and_then(|item| first_in(item, "span.productView-info-value"))
            .map(text)
            .filter(|s| !s.is_empty()),
        ..Default::default()
    }
}
