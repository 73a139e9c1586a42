use scraper::Html;

use super::html::{json_bool, json_path, json_text, script_json, select, text};
use crate::record::RawRecord;

const DELIVERY_NOTE: &str =
    r#"p[class="MuiTypography-root MuiTypography-body1 mui-style-m99pms"]"#;

pub(super) fn parse(doc: &Html) -> RawRecord {
    let next_data = script_json(doc, r#"script#__NEXT_DATA__[type="application/json"]"#);
    let product = next_data
        .as_ref()
        .and_then(|v| json_path(v, &["props", "pageProps", "initialProduct"]));

    RawRecord {
        bioequivalent: product.and_then(|p| json_bool(p.get("isBioequivalent"))),
        active_principle: product.and_then(|p| json_text(p.get("activePrinciple"))),
        lab_name: product.and_then(|p| json_text(p.get("laboratory"))),
        web_name: product.and_then(|p| json_text(p.get("name"))),
        price: product.and_then(|p| json_text(p.get("price"))),
        // only stocked products advertise next-day delivery
        is_available: Some(select(doc, DELIVERY_NOTE).into_iter().any(|p| {
            let t = text(p);
            t.contains("Recibe") && t.contains("mañana")
        })),
        ..Default::default()
    }
}
