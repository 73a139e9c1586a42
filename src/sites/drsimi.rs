use scraper::Html;

use super::html::{first, first_text, select_in, text};
use crate::record::RawRecord;

const SELLING_PRICE: &str = "span.vtex-product-price-1-x-sellingPriceValue";
const PRICE_PARTS: &str = "span.vtex-product-price-1-x-currencyCode, \
     span.vtex-product-price-1-x-currencyInteger, \
     span.vtex-product-price-1-x-currencyGroup, \
     span.vtex-product-price-1-x-currencyDecimal";

/// VTEX renders the enabled cart button with this exact class list.
const ADD_TO_CART: &str = r#"button[class="vtex-button bw1 ba fw5 v-mid relative pa0 lh-solid br2 min-h-regular t-action bg-action-primary b--action-primary c-on-action-primary hover-bg-action-primary hover-b--action-primary hover-c-on-action-primary pointer w-100"]"#;

pub(super) fn parse(doc: &Html) -> RawRecord {
    RawRecord {
        price: selling_price(doc),
        sku: first_text(doc, "span.vtex-product-identifier-0-x-product-identifier__value"),
        web_name: first_text(
            doc,
            r#"span[class="vtex-store-components-3-x-productBrand vtex-store-components-3-x-productBrand--quickview"]"#,
        ),
        bioequivalent: Some(
            first(doc, "p.farmaciasdeldrsimicl-theme-2-x-bioequivalenteText")
                .is_some_and(|p| text(p).contains("es bioequivalente")),
        ),
        active_principle: first_text(
            doc,
            "td.vtex-store-components-3-x-specificationItemSpecifications--principioActivo",
        ),
        is_available: Some(first(doc, ADD_TO_CART).is_some()),
        ..Default::default()
    }
}

/// The selling price is split into currency, integer, group and decimal spans.
fn selling_price(doc: &Html) -> Option<String> {
    let container = first(doc, SELLING_PRICE)?;
    let price: String = select_in(container, PRICE_PARTS).into_iter().map(text).collect();
    Some(price).filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::fixture;

    #[test]
    fn parses_vtex_page() {
        let raw = parse(&Html::parse_document(&fixture("drsimi")));
        // list price is ignored
        assert_eq!(raw.price.as_deref(), Some("$2.490"));
        assert_eq!(raw.sku.as_deref(), Some("100234"));
        assert_eq!(raw.web_name.as_deref(), Some("Rosuvastatina 10 mg x 30 comprimidos"));
        assert_eq!(raw.bioequivalent, Some(true));
        assert_eq!(raw.active_principle.as_deref(), Some("Rosuvastatina"));
        assert_eq!(raw.is_available, Some(true));
    }

    #[test]
    fn missing_badge_and_button() {
        let raw = parse(&Html::parse_document("<div></div>"));
        assert_eq!(raw.bioequivalent, Some(false));
        assert_eq!(raw.is_available, Some(false));
        assert!(raw.price.is_none());
    }
}
