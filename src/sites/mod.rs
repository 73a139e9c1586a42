pub mod html;

mod ahumada;
mod anticonceptivo;
mod buhochile;
mod cruzverde;
mod drsimi;
mod ecofarmacias;
mod elquimico;
mod farmaciajvf;
mod farmaloop;
mod farmex;
mod knop;
mod mercadofarma;
mod meki;
mod novasalud;
mod profar;
mod salcobrand;

use std::fmt;
use std::time::Duration;

use scraper::Html;
use serde::Serialize;

use crate::error::ScrapeError;
use crate::fetch::{self, PageSource, RetryPolicy, Style, WaitSpec};
use crate::record::Field::*;
use crate::record::{Field, RawRecord};

/// One adapter per pharmacy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    BuhoChile,
    Ahumada,
    Farmex,
    ElQuimico,
    Salcobrand,
    NovaSalud,
    DrSimi,
    EcoFarmacias,
    MercadoFarma,
    Meki,
    CruzVerde,
    Profar,
    Knop,
    FarmaciaJvf,
    Anticonceptivo,
    Farmaloop,
}

impl Site {
    pub fn id(self) -> &'static str {
        match self {
            Site::BuhoChile => "buhochile",
            Site::Ahumada => "ahumada",
            Site::Farmex => "farmex",
            Site::ElQuimico => "elquimico",
            Site::Salcobrand => "salcobrand",
            Site::NovaSalud => "novasalud",
            Site::DrSimi => "drsimi",
            Site::EcoFarmacias => "ecofarmacias",
            Site::MercadoFarma => "mercadofarma",
            Site::Meki => "meki",
            Site::CruzVerde => "cruzverde",
            Site::Profar => "profar",
            Site::Knop => "knop",
            Site::FarmaciaJvf => "farmaciajvf",
            Site::Anticonceptivo => "anticonceptivo",
            Site::Farmaloop => "farmaloop",
        }
    }

    pub fn style(self) -> Style {
        let rendered = |selector: &'static str, secs: u64| {
            Style::Rendered(WaitSpec {
                selector,
                timeout: Duration::from_secs(secs),
            })
        };
        match self {
            Site::ElQuimico => rendered(elquimico::WAIT_FOR, 10),
            Site::CruzVerde => rendered(cruzverde::WAIT_FOR, 30),
            Site::FarmaciaJvf => rendered(farmaciajvf::WAIT_FOR, 10),
            Site::Anticonceptivo => rendered(anticonceptivo::WAIT_FOR, 10),
            Site::Farmaloop => rendered(farmaloop::WAIT_FOR, 10),
            _ => Style::Static,
        }
    }

    /// Fields whose absence means the page changed shape.
    pub fn required(self) -> &'static [Field] {
        match self {
            Site::BuhoChile => &[Price, LabName, Bioequivalent, IsAvailable, ActivePrinciple, WebName],
            Site::Ahumada => &[Price, LabName, IsAvailable, ActivePrinciple, WebName],
            Site::Farmex => &[Price, LabName, IsAvailable, Sku, WebName],
            Site::ElQuimico => &[Price, LabName, IsAvailable, ActivePrinciple, Sku, WebName],
            Site::Salcobrand => &[Price, Bioequivalent, IsAvailable, WebName],
            Site::NovaSalud => &[Price, LabName, IsAvailable, ActivePrinciple, Sku, WebName],
            Site::DrSimi => &[Price, Bioequivalent, IsAvailable, Sku, WebName],
            Site::EcoFarmacias => &[Price, IsAvailable, Sku, WebName],
            Site::MercadoFarma => &[Price, LabName, IsAvailable, WebName],
            Site::Meki => &[Price, LabName, Bioequivalent, IsAvailable, ActivePrinciple, WebName],
            Site::CruzVerde => &[Price, LabName, WebName],
            Site::Profar => &[Price, LabName, IsAvailable, ActivePrinciple, Sku, WebName],
            Site::Knop => &[Price, LabName, IsAvailable, Sku, WebName],
            Site::FarmaciaJvf | Site::Anticonceptivo | Site::Farmaloop => &[WebName],
        }
    }

    /// Every field the site can populate. A superset of [`Site::required`].
    pub fn capabilities(self) -> &'static [Field] {
        match self {
            Site::Salcobrand => &[Price, LabName, Bioequivalent, IsAvailable, ActivePrinciple, Sku, WebName],
            Site::DrSimi => &[Price, Bioequivalent, IsAvailable, ActivePrinciple, Sku, WebName],
            Site::EcoFarmacias => &[Price, IsAvailable, ActivePrinciple, Sku, WebName],
            Site::FarmaciaJvf => &[Price, LabName, Bioequivalent, IsAvailable, ActivePrinciple, WebName],
            Site::Anticonceptivo => &[Price, LabName, IsAvailable, ActivePrinciple, Sku, WebName],
            Site::Farmaloop => &[Price, LabName, IsAvailable, ActivePrinciple, WebName],
            other => other.required(),
        }
    }

    /// Parse stage: markup to raw fields. Pure.
    pub fn parse(self, markup: &str, url: &str) -> RawRecord {
        let doc = Html::parse_document(markup);
        let raw = match self {
            Site::BuhoChile => buhochile::parse(&doc),
            Site::Ahumada => ahumada::parse(&doc),
            Site::Farmex => farmex::parse(&doc),
            Site::ElQuimico => elquimico::parse(&doc),
            Site::Salcobrand => salcobrand::parse(&doc),
            Site::NovaSalud => novasalud::parse(&doc),
            Site::DrSimi => drsimi::parse(&doc),
            Site::EcoFarmacias => ecofarmacias::parse(&doc),
            Site::MercadoFarma => mercadofarma::parse(&doc),
            Site::Meki => meki::parse(&doc),
            Site::CruzVerde => cruzverde::parse(&doc),
            Site::Profar => profar::parse(&doc),
            Site::Knop => knop::parse(&doc),
            Site::FarmaciaJvf => farmaciajvf::parse(&doc),
            Site::Anticonceptivo => anticonceptivo::parse(&doc),
            Site::Farmaloop => farmaloop::parse(&doc),
        };
        let stray: Vec<Field> = raw
            .populated()
            .into_iter()
            .filter(|f| !self.capabilities().contains(f))
            .collect();
        if !stray.is_empty() {
            tracing::debug!(site = %self, url, ?stray, "Parser filled fields outside its capability set");
        }
        raw
    }

    /// Validate stage.
    pub fn validate(self, raw: &RawRecord) -> Result<(), ScrapeError> {
        let missing: Vec<Field> = self
            .required()
            .iter()
            .copied()
            .filter(|f| !raw.has(*f))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ScrapeError::Validation {
                site: self,
                missing,
            })
        }
    }

    /// acquire → parse → validate.
    pub async fn scrape<S: PageSource>(
        self,
        source: &S,
        url: &str,
        retry: RetryPolicy,
    ) -> Result<RawRecord, ScrapeError> {
        let markup = fetch::with_retry(retry, url, || fetch::acquire(source, self.style(), url))
            .await
            .map_err(|source| ScrapeError::Retrieval {
                site: self,
                url: url.to_string(),
                source,
            })?;
        let raw = self.parse(&markup, url);
        self.validate(&raw)?;
        Ok(raw)
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.id())
    }
}

/// Host fragments in precedence order.
const DEFAULT_ROUTES: &[(&str, Site)] = &[
    ("buhochile.com", Site::BuhoChile),
    ("farmaciasahumada.cl", Site::Ahumada),
    ("farmex.cl", Site::Farmex),
    ("farmaciaelquimico.cl", Site::ElQuimico),
    ("salcobrand.cl", Site::Salcobrand),
    ("novasalud.cl", Site::NovaSalud),
    ("drsimi.cl", Site::DrSimi),
    ("ecofarmacias.cl", Site::EcoFarmacias),
    ("mercadofarma.cl", Site::MercadoFarma),
    ("farmaciameki.cl", Site::Meki),
    ("cruzverde.cl", Site::CruzVerde),
    ("profar.cl", Site::Profar),
    ("farmaciasknop.com", Site::Knop),
    ("farmaciajvf", Site::FarmaciaJvf),
    ("anticonceptivo.cl", Site::Anticonceptivo),
    ("farmaloop.cl", Site::Farmaloop),
];

/// Ordered host-fragment → adapter table. First match wins.
#[derive(Debug, Clone)]
pub struct Registry {
    routes: Vec<(&'static str, Site)>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            routes: DEFAULT_ROUTES.to_vec(),
        }
    }
}

impl Registry {
    #[cfg(test)]
    pub fn new(routes: Vec<(&'static str, Site)>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[(&'static str, Site)] {
        &self.routes
    }

    pub fn dispatch(&self, url: &str) -> Result<Site, ScrapeError> {
        let unrecognized = || ScrapeError::UnrecognizedSource {
            url: url.to_string(),
        };
        let parsed = reqwest::Url::parse(url).map_err(|_| unrecognized())?;
        let host = parsed.host_str().ok_or_else(unrecognized)?;
        self.routes
            .iter()
            .find(|(fragment, _)| host.contains(fragment))
            .map(|(_, site)| *site)
            .ok_or_else(unrecognized)
    }
}

#[cfg(test)]
pub(crate) fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}.html", name))
        .unwrap_or_else(|e| panic!("fixture {}: {}", name, e))
}
