use scraper::Html;

use super::html::{first, first_text, select, text};
use crate::record::RawRecord;

const PRINCIPLE_LABEL: &str = "Principios Activos:";

pub(super) fn parse(doc: &Html) -> RawRecord {
    RawRecord {
        price: first_text(doc, "bdi"),
        is_available: availability(doc),
        sku: first_text(doc, "span.sku"),
        active_principle: select(doc, "li")
            .into_iter()
            .map(text)
            .find(|t| t.contains(PRINCIPLE_LABEL))
            .and_then(|t| t.split_once(": ").map(|(_, v)| v.trim().to_string()))
            .filter(|v| !v.is_empty()),
        // "Losartán 50 mg (Genérico)" → "Losartán 50 mg"
        web_name: first(doc, r#"h1[class="product_title entry-title"]"#)
            .map(text)
            .and_then(|t| t.split('(').next().map(|s| s.trim().to_string()))
            .filter(|n| !n.is_empty()),
        ..Default::default()
    }
}

/// Stock paragraph when the theme prints one, otherwise the cart button label.
fn availability(doc: &Html) -> Option<bool> {
    if let Some(stock) = first(doc, r#"p[class*="stock"]"#) {
        return Some(text(stock) != "Sin existencias");
    }
    Some(
        first(doc, r#"button[class="single_add_to_cart_button button alt"]"#)
            .is_some_and(|b| text(b).contains("Añadir al carrito")),
    )
}
