use scraper::Html;

use super::html::{first, first_text, text};
use crate::record::RawRecord;

/// The Angular shell is served empty; the product title shows up once the app boots.
pub(super) const WAIT_FOR: &str = "app-root h1";

pub(super) fn parse(doc: &Html) -> RawRecord {
    RawRecord {
        price: first_text(doc, r#"span[class="font-bold text-prices text-16"]"#),
        lab_name: first_text(
            doc,
            r#"span[class="text-12 uppercase italic cursor-pointer hover:text-accent"]"#,
        ),
        web_name: first(doc, r#"h1[class="text-18 leading-22 font-bold w-3/4 mb-5"]"#)
            .map(|h| text(h).trim_matches('"').trim().to_string())
            .filter(|n| !n.is_empty()),
        ..Default::default()
    }
}
