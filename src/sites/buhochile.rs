use scraper::Html;

use super::html::{json_bool, json_path, json_text, meta_property, script_json};
use crate::record::RawRecord;

/// Next.js page; the product sits in `__NEXT_DATA__`, stock in an OpenGraph meta tag.
pub(super) fn parse(doc: &Html) -> RawRecord {
    let product = script_json(doc, "script#__NEXT_DATA__")
        .and_then(|v| json_path(&v, &["props", "pageProps", "product"]).cloned());

    let mut raw = RawRecord {
        is_available: meta_property(doc, "product:availability").map(|c| c == "in stock"),
        ..Default::default()
    };

    if let Some(p) = product {
        raw.web_name = json_text(p.get("name")).map(|name| {
            [
                Some(name),
                json_text(p.get("tablets")),
                json_text(p.get("pharmaceuticForm")),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
        });
        raw.active_principle = json_text(p.get("activePrinciple"));
        raw.price = json_text(p.get("minPrice")).map(|p| format!("${}", p));
        raw.bioequivalent = json_bool(p.get("bioequivalent"));
        raw.lab_name = json_text(json_path(&p, &["laboratory", "name"]));
    }

    raw
}
