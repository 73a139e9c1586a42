use scraper::Html;

use super::html::{after_colon, json_path, json_text, script_json, select, text};
use crate::record::RawRecord;

pub(super) fn parse(doc: &Html) -> RawRecord {
    let ld = script_json(doc, r#"script[type="application/ld+json"]"#);
    let ld = ld.as_ref();

    RawRecord {
        sku: ld.and_then(|v| json_text(v.get("sku"))),
        price: ld
            .and_then(|v| json_text(json_path(v, &["offers", "lowPrice"])))
            .map(|p| format!("${}", p)),
        lab_name: ld.and_then(|v| json_text(json_path(v, &["brand", "name"]))),
        web_name: ld.and_then(|v| json_text(v.get("name"))),
        is_available: Some(in_stock(doc)),
        ..Default::default()
    }
}

/// Any variant with units left. Variant spans win over the single-product paragraph.
fn in_stock(doc: &Html) -> bool {
    let mut counters = select(doc, "span.units-in-stock");
    if counters.is_empty() {
        counters = select(doc, "p.units-in-stock");
    }
    counters.into_iter().any(|c| {
        after_colon(&text(c))
            .and_then(|n| n.parse::<i64>().ok())
            .is_some_and(|n| n > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::fixture;

    #[test]
    fn parses_json_ld_and_variants() {
        let raw = parse(&Html::parse_document(&fixture("knop")));
        assert_eq!(raw.sku.as_deref(), Some("KN-3301"));
        assert_eq!(raw.price.as_deref(), Some("$6490"));
        assert_eq!(raw.lab_name.as_deref(), Some("Knop"));
        assert_eq!(raw.web_name.as_deref(), Some("Valeriana Comprimidos 100 mg"));
        assert_eq!(raw.is_available, Some(true));
    }

    #[test]
    fn paragraph_counter_and_missing_counter() {
        let single = Html::parse_document(r#"<p class="units-in-stock">Unidades: 0</p>"#);
        assert!(!in_stock(&single));
        assert!(!in_stock(&Html::parse_document("<div></div>")));
    }
}
