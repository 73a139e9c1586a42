use scraper::Html;

use super::html::{first_in, first_text, select, select_in, text};
use crate::record::RawRecord;

/// Product title, rendered by the Ant Design app.
pub(super) const WAIT_FOR: &str = "h1.ph-product-detail-quote-title-info-main-title";

const DESCRIPTION_ROW: &str =
    r#"div[class="ant-row ph-product-detail-quote-description-title-container"]"#;

pub(super) fn parse(doc: &Html) -> RawRecord {
    RawRecord {
        web_name: first_text(doc, WAIT_FOR),
        lab_name: first_text(doc, "div.ph-product-detail-quote-title-info-main-subtitle")
            .map(|l| l.replace("Laboratorio:", "").trim().to_string())
            .filter(|l| !l.is_empty()),
        price: first_text(doc, "div.ph-product-detail-detailpharmacy-info-final-price"),
        active_principle: active_principle(doc),
        is_available: Some(
            select(doc, r#"button[class="ant-btn button-primary"] span"#)
                .into_iter()
                .any(|s| text(s) == "Agregar"),
        ),
        bioequivalent: Some(
            select(doc, "div.ph-product-detail-type-recepit-title")
                .into_iter()
                .any(|d| text(d) == "Producto Bioequivalente"),
        ),
        ..Default::default()
    }
}

/// Description rows pair a title with a value; the value lives in the row titled "Principio activo".
fn active_principle(doc: &Html) -> Option<String> {
    let row = select(doc, DESCRIPTION_ROW).into_iter().find(|row| {
        select_in(*row, "h3.ph-product-detail-quote-description-title")
            .into_iter()
            .any(|h| text(h).contains("Principio activo"))
    })?;
    first_in(row, "h3.ph-product-detail-quote-description-subtitle")
        .map(text)
        .filter(|t| !t.is_empty())
}
