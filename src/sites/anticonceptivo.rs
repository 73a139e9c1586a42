use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use super::html::{after_colon, first, first_text};
use crate::record::RawRecord;

/// Product title, filled in by the React app.
pub(super) const WAIT_FOR: &str = r#"h1[class="font-poppins medium font-27 bold text-black"]"#;

// the price span carries trailing labels like "c/u"
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\s?[\d.,]+").unwrap());

pub(super) fn parse(doc: &Html) -> RawRecord {
    let cart = first(doc, r#"button[class="btn btn-outline-bicolor btn-add-cart btn-block px-1"]"#);

    RawRecord {
        web_name: first_text(doc, WAIT_FOR),
        price: first_text(doc, r#"span[class="font-poppins font-36 bold color-009BE8"]"#)
            .and_then(|p| PRICE_RE.find(&p).map(|m| m.as_str().to_string())),
        sku: first_text(doc, r#"span[class="font-poppins font-16 color-009BE8"]"#)
            .and_then(|s| after_colon(&s)),
        lab_name: first_text(doc, r#"span[class="font-poppins font-14 medium font-italic color-585858"]"#),
        // no cart button at all leaves availability unknown
        is_available: cart.map(|b| b.value().attr("disabled").is_none()),
        active_principle: first_text(doc, r#"div[class="font-poppins font-12 compoundProduct"]"#),
        ..Default::default()
    }
}
