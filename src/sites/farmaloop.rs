use scraper::Html;

use super::html::{first, first_in, text};
use crate::record::RawRecord;

pub(super) const WAIT_FOR: &str = "#__next h1";

const NAME: &str = r#"h1[class="MuiTypography-root MuiTypography-h1 mui-style-1i0nuda"]"#;
const STOCK_NOTICE: &str = r#"p[class="MuiTypography-root MuiTypography-body1 mui-style-ryncay"]"#;
const PRICE: &str = r#"p[class="MuiTypography-root MuiTypography-body1 mui-style-1gx7bde"]"#;
const LAB: &str = r#"p[class="MuiTypography-root MuiTypography-body1 mui-style-t9bb1s"]"#;
const COMPOUND: &str = r#"p[class="MuiTypography-root MuiTypography-body1 mui-style-y9lxiw"]"#;

/// Out-of-stock products hide their price, so availability follows the price.
pub(super) fn parse(doc: &Html) -> RawRecord {
    let Some(app) = first(doc, "div#__next") else {
        return RawRecord::default();
    };
    let lookup = |css: &str| first_in(app, css).map(text).filter(|t| !t.is_empty());

    let sold_out = first_in(app, STOCK_NOTICE)
        .is_some_and(|p| text(p).contains("Producto actualmente sin stock."));
    let price = if sold_out { None } else { lookup(PRICE) };

    RawRecord {
        web_name: lookup(NAME),
        is_available: Some(price.is_some()),
        price,
        lab_name: lookup(LAB),
        active_principle: lookup(COMPOUND),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::fixture;

    #[test]
    fn parses_rendered_page() {
        let raw = parse(&Html::parse_document(&fixture("farmaloop")));
        assert_eq!(raw.web_name.as_deref(), Some("Eutirox 100 mcg 50 comprimidos"));
        assert_eq!(raw.price.as_deref(), Some("$5.990"));
        assert_eq!(raw.lab_name.as_deref(), Some("Merck"));
        assert_eq!(raw.active_principle.as_deref(), Some("Levotiroxina"));
        assert_eq!(raw.is_available, Some(true));
    }

    #[test]
    fn sold_out_notice_hides_price() {
        let doc = Html::parse_document(
            r#"<div id="__next">
                 <h1 class="MuiTypography-root MuiTypography-h1 mui-style-1i0nuda">Eutirox</h1>
                 <p class="MuiTypography-root MuiTypography-body1 mui-style-ryncay">Producto actualmente sin stock.</p>
                 <p class="MuiTypography-root MuiTypography-body1 mui-style-1gx7bde">$5.990</p>
               </div>"#,
        );
        let raw = parse(&doc);
        assert_eq!(raw.price, None);
        assert_eq!(raw.is_available, Some(false));
        assert_eq!(raw.web_name.as_deref(), Some("Eutirox"));
    }
}
