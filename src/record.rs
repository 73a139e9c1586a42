use std::fmt;

use serde::{Deserialize, Serialize};

/// The seven canonical fields a site adapter can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Price,
    LabName,
    Bioequivalent,
    IsAvailable,
    ActivePrinciple,
    Sku,
    WebName,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Price,
        Field::LabName,
        Field::Bioequivalent,
        Field::IsAvailable,
        Field::ActivePrinciple,
        Field::Sku,
        Field::WebName,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Price => "price",
            Field::LabName => "lab_name",
            Field::Bioequivalent => "bioequivalent",
            Field::IsAvailable => "is_available",
            Field::ActivePrinciple => "active_principle",
            Field::Sku => "sku",
            Field::WebName => "web_name",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the input file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputDescriptor {
    pub url: String,
    #[serde(rename = "product_name", alias = "declared_product_name", alias = "product")]
    pub declared_product_name: String,
    #[serde(rename = "pharmacy", alias = "declared_source_name", alias = "source")]
    pub declared_source_name: String,
}

/// What a site parser pulled off the page. Every field is optional; which ones a
/// site is expected to fill is declared on [`crate::sites::Site`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawRecord {
    pub price: Option<String>,
    pub lab_name: Option<String>,
    pub bioequivalent: Option<bool>,
    pub is_available: Option<bool>,
    pub active_principle: Option<String>,
    pub sku: Option<String>,
    pub web_name: Option<String>,
}

impl RawRecord {
    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::Price => self.price.is_some(),
            Field::LabName => self.lab_name.is_some(),
            Field::Bioequivalent => self.bioequivalent.is_some(),
            Field::IsAvailable => self.is_available.is_some(),
            Field::ActivePrinciple => self.active_principle.is_some(),
            Field::Sku => self.sku.is_some(),
            Field::WebName => self.web_name.is_some(),
        }
    }

    /// Fields that are populated, in canonical order.
    pub fn populated(&self) -> Vec<Field> {
        Field::ALL.into_iter().filter(|f| self.has(*f)).collect()
    }
}

/// Context fields plus every canonical field, null-complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalRecord {
    pub date: Option<String>,
    pub declared_product_name: String,
    pub declared_source_name: String,
    pub price: Option<String>,
    pub lab_name: Option<String>,
    pub bioequivalent: Option<bool>,
    pub is_available: Option<bool>,
    pub active_principle: Option<String>,
    pub sku: Option<String>,
    pub web_name: Option<String>,
    pub url: String,
}

impl CanonicalRecord {
    /// Fresh record for one descriptor, seeded with the context fields only.
    pub fn seed(descriptor: &InputDescriptor, date: &str) -> Self {
        Self {
            date: Some(date.to_string()),
            declared_product_name: descriptor.declared_product_name.clone(),
            declared_source_name: descriptor.declared_source_name.clone(),
            price: None,
            lab_name: None,
            bioequivalent: None,
            is_available: None,
            active_principle: None,
            sku: None,
            web_name: None,
            url: descriptor.url.clone(),
        }
    }

    /// Aggregate-table key.
    pub fn key(&self) -> (String, String) {
        (
            self.declared_product_name.clone(),
            self.declared_source_name.clone(),
        )
    }
}
