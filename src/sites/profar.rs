use scraper::Html;

use super::html::{attr, find_by_text, first, first_text, next_sibling, select, text};
use crate::record::RawRecord;

pub(super) fn parse(doc: &Html) -> RawRecord {
    // "<name> <sku> - Profar"
    let title = first_text(doc, "title").unwrap_or_default();
    let mut words = title.split_whitespace();
    let name = words.next().map(str::to_string);
    let sku = words.next().map(str::to_string);

    let mut price = None;
    let mut lab_name = None;
    for meta in select(doc, r#"meta[data-react-helmet="true"]"#) {
        match meta.value().attr("property") {
            Some("product:price:amount") => {
                price = attr(meta, "content").filter(|c| !c.is_empty()).map(|c| format!("${}", c))
            }
            Some("product:brand") => lab_name = attr(meta, "content").filter(|c| !c.is_empty()),
            _ => {}
        }
    }

    RawRecord {
        active_principle: first(doc, r#"td[data-specification="Principio Activo"]"#)
            .and_then(|td| next_sibling(td, "td"))
            .map(text)
            .filter(|t| !t.is_empty()),
        web_name: name,
        sku,
        price,
        lab_name,
        is_available: Some(
            find_by_text(doc, "button", "Comprar")
                .is_some_and(|b| b.value().attr("disabled").is_none()),
        ),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::fixture;

    #[test]
    fn parses_title_and_helmet_meta() {
        let raw = parse(&Html::parse_document(&fixture("profar")));
        assert_eq!(raw.web_name.as_deref(), Some("Rosuvastatina"));
        assert_eq!(raw.sku.as_deref(), Some("88123"));
        assert_eq!(raw.price.as_deref(), Some("$3990"));
        assert_eq!(raw.lab_name.as_deref(), Some("Recalcine"));
        assert_eq!(raw.active_principle.as_deref(), Some("Rosuvastatina"));
        assert_eq!(raw.is_available, Some(true));
    }

    #[test]
    fn disabled_buy_button() {
        let doc = Html::parse_document(r#"<button disabled>Comprar</button>"#);
        assert_eq!(parse(&doc).is_available, Some(false));
    }
}
