use scraper::Html;

use super::html::{first, first_text, table_value, text};
use crate::record::RawRecord;

pub(super) fn parse(doc: &Html) -> RawRecord {
    RawRecord {
        active_principle: table_value(doc, "Principio Activo"),
        lab_name: table_value(doc, "Laboratorio"),
        web_name: first_text(doc, "h1.product-name"),
        price: first_text(doc, r#"span[class="value d-flex align-items-center"]"#),
        // the cart button reads "Agregar al carrito" only while there is stock
        is_available: first(doc, r#"button[class="add-to-cart btn btn-primary"]"#)
            .map(|b| text(b).contains("Agregar al carrito")),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::fixture;

    #[test]
    fn parses_product_page() {
        let raw = parse(&Html::parse_document(&fixture("ahumada")));
        assert_eq!(raw.web_name.as_deref(), Some("Rosuvastatina 10 mg 30 Comprimidos"));
        assert_eq!(raw.price.as_deref(), Some("$ 4.990"));
        assert_eq!(raw.lab_name.as_deref(), Some("MINTLAB"));
        assert_eq!(raw.active_principle.as_deref(), Some("ROSUVASTATINA"));
        assert_eq!(raw.is_available, Some(true));
    }

    #[test]
    fn notify_button_means_no_stock() {
        let doc = Html::parse_document(
            r#"<button class="add-to-cart btn btn-primary">Avísame cuando llegue</button>"#,
        );
        assert_eq!(parse(&doc).is_available, Some(false));
    }
}
