use scraper::Html;

use super::html::{first, first_int, first_text, text};
use crate::record::RawRecord;

pub(super) fn parse(doc: &Html) -> RawRecord {
    RawRecord {
        web_name: first_text(doc, "h1.product-meta__title"),
        lab_name: first_text(doc, "a.product-meta__vendor"),
        // the visible amount follows a hidden "Precio de venta" label
        price: first(doc, "span.price").and_then(|span| {
            span.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .last()
                .map(str::to_string)
        }),
        is_available: first(doc, "span.product-form__inventory").map(|s| in_stock(&text(s))),
        ..Default::default()
    }
}

/// "Date prisa, quedan 3 unidades" → true; any zero or missing count → false.
fn in_stock(label: &str) -> bool {
    label.contains("quedan") && first_int(label).is_some_and(|n| n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::fixture;

    #[test]
    fn parses_shopify_page() {
        let raw = parse(&Html::parse_document(&fixture("mercadofarma")));
        assert_eq!(raw.web_name.as_deref(), Some("Hormogel Gel 80 g"));
        assert_eq!(raw.lab_name.as_deref(), Some("Silesia"));
        assert_eq!(raw.price.as_deref(), Some("$17.990"));
        assert_eq!(raw.is_available, Some(true));
    }

    #[test]
    fn inventory_counts() {
        assert!(in_stock("quedan 10 unidades"));
        assert!(in_stock("Date prisa, quedan 3 unidades"));
        assert!(!in_stock("quedan 0 unidades"));
        assert!(!in_stock("Agotado"));
    }
}
