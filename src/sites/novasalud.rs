use scraper::Html;

use super::html::{first, first_in, first_text, table_value, text};
use crate::record::RawRecord;

pub(super) fn parse(doc: &Html) -> RawRecord {
    RawRecord {
        web_name: first_text(doc, r#"span.base[itemprop="name"]"#),
        sku: first_text(doc, r#"div.value[itemprop="sku"]"#),
        price: first_text(doc, "span.price"),
        is_available: first(doc, r#"div[class="stock available"]"#)
            .and_then(|d| first_in(d, "span"))
            .map(|s| text(s) == "En stock"),
        active_principle: table_value(doc, "Principio Activo (DCI)"),
        lab_name: table_value(doc, "Laboratorio"),
        ..Default::default()
    }
}
