//! The sequential run: dispatch, scrape, merge, aggregate, then one batch
//! normalization and a single append at the end.

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::aggregate::AggregateTable;
use crate::error::{ScrapeError, SinkError, TransformError};
use crate::fetch::{PageSource, RetryPolicy};
use crate::normalize;
use crate::record::{CanonicalRecord, InputDescriptor};
use crate::sink;
use crate::sites::Registry;

/// A descriptor that did not make it into the table.
#[derive(Debug)]
pub struct Failure {
    pub url: String,
    pub error: ScrapeError,
}

/// Result of the scrape phase.
#[derive(Debug, Default)]
pub struct RunReport {
    pub table: AggregateTable,
    pub failures: Vec<Failure>,
    pub total: usize,
}

impl RunReport {
    pub fn scraped(&self) -> usize {
        self.total - self.failures.len()
    }

    /// Failure counts per error kind, in first-seen order.
    pub fn failure_kinds(&self) -> Vec<(&'static str, usize)> {
        let mut kinds: Vec<(&'static str, usize)> = Vec::new();
        for f in &self.failures {
            match kinds.iter_mut().find(|(k, _)| *k == f.error.kind()) {
                Some((_, n)) => *n += 1,
                None => kinds.push((f.error.kind(), 1)),
            }
        }
        kinds
    }
}

/// Result of the write phase.
#[derive(Debug)]
pub struct Outcome {
    pub written: usize,
    pub dropped: Vec<TransformError>,
}

/// One descriptor through dispatch → acquire → parse → validate → merge.
pub async fn scrape_one<S: PageSource>(
    registry: &Registry,
    source: &S,
    descriptor: &InputDescriptor,
    date: &str,
    retry: RetryPolicy,
) -> Result<CanonicalRecord, ScrapeError> {
    let site = registry.dispatch(&descriptor.url)?;
    let raw = site.scrape(source, &descriptor.url, retry).await?;
    Ok(normalize::merge(CanonicalRecord::seed(descriptor, date), raw))
}

/// Process every descriptor in order, one at a time. Per-row failures are logged and
/// collected; they never stop the run.
pub async fn run<S: PageSource>(
    registry: &Registry,
    source: &S,
    descriptors: &[InputDescriptor],
    date: &str,
    retry: RetryPolicy,
) -> RunReport {
    let pb = ProgressBar::new(descriptors.len() as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    let mut report = RunReport {
        total: descriptors.len(),
        ..Default::default()
    };

    for descriptor in descriptors {
        match scrape_one(registry, source, descriptor, date, retry).await {
            Ok(record) => {
                if report.table.insert(record).is_some() {
                    warn!(
                        product = %descriptor.declared_product_name,
                        pharmacy = %descriptor.declared_source_name,
                        url = %descriptor.url,
                        "Duplicate product/pharmacy pair, keeping the later row"
                    );
                }
            }
            Err(e) => {
                warn!(url = %descriptor.url, error = %e, kind = e.kind(), "Skipping descriptor");
                report.failures.push(Failure {
                    url: descriptor.url.clone(),
                    error: e,
                });
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        rows = report.table.len(),
        "Scraped {} descriptors ({} ok, {} skipped)",
        report.total,
        report.scraped(),
        report.failures.len()
    );
    report
}

/// Batch-normalize the table and append it to `output`. Rows that fail coercion are
/// logged and left out; sink errors are fatal.
pub fn finalize(table: AggregateTable, output: &Path) -> Result<Outcome, SinkError> {
    let (rows, dropped) = normalize::normalize_table(table.into_records());
    for e in &dropped {
        error!(url = %e.url, error = %e, "Dropping row");
    }
    let written = sink::append(output, &rows)?;
    Ok(Outcome { written, dropped })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::error::RetrievalError;
    use crate::fetch::{self, Session};
    use crate::sites::{fixture, Site};

    const DATE: &str = "2024-05-01";

    /// In-memory pages; renders only succeed when the wait selector is present.
    #[derive(Default)]
    struct FakeSource {
        pages: Arc<HashMap<String, String>>,
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    impl FakeSource {
        fn new(pages: &[(&str, String)]) -> Self {
            Self {
                pages: Arc::new(
                    pages
                        .iter()
                        .map(|(url, html)| (url.to_string(), html.clone()))
                        .collect(),
                ),
                ..Default::default()
            }
        }

        fn sessions(&self) -> (usize, usize) {
            (
                self.opened.load(Ordering::SeqCst),
                self.closed.load(Ordering::SeqCst),
            )
        }
    }

    struct FakeSession {
        pages: Arc<HashMap<String, String>>,
        url: Option<String>,
        closed: Arc<AtomicUsize>,
    }

    impl PageSource for FakeSource {
        type Session = FakeSession;

        async fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
            self.pages
                .get(url)
                .cloned()
                .ok_or(RetrievalError::HttpStatus {
                    status: reqwest::StatusCode::NOT_FOUND,
                })
        }

        async fn open_session(&self) -> Result<FakeSession, RetrievalError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSession {
                pages: Arc::clone(&self.pages),
                url: None,
                closed: Arc::clone(&self.closed),
            })
        }
    }

    impl Session for FakeSession {
        async fn navigate(&mut self, url: &str) -> Result<(), RetrievalError> {
            self.url = Some(url.to_string());
            Ok(())
        }

        async fn wait_for(
            &mut self,
            selector: &str,
            timeout: Duration,
        ) -> Result<String, RetrievalError> {
            self.url
                .as_ref()
                .and_then(|u| self.pages.get(u))
                .filter(|html| fetch::markup_matches(html, selector))
                .cloned()
                .ok_or_else(|| RetrievalError::WaitTimeout {
                    selector: selector.to_string(),
                    timeout,
                })
        }

        async fn close(self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Log sink shared with a scoped subscriber.
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn descriptor(url: &str, product: &str, pharmacy: &str) -> InputDescriptor {
        InputDescriptor {
            url: url.into(),
            declared_product_name: product.into(),
            declared_source_name: pharmacy.into(),
        }
    }

    const FARMEX: &str = "https://www.farmex.cl/products/hormogel";
    const CRUZVERDE: &str = "https://www.cruzverde.cl/hormogel-gel/123.html";
    const AMAZON: &str = "https://www.amazon.com/dp/B000";

    #[tokio::test]
    async fn two_recognized_one_unrecognized() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let source = FakeSource::new(&[(FARMEX, fixture("farmex")), (CRUZVERDE, fixture("cruzverde"))]);
        let descriptors = vec![
            descriptor(FARMEX, "Hormogel", "Farmex"),
            descriptor(AMAZON, "Hormogel", "Amazon"),
            descriptor(CRUZVERDE, "Hormogel", "Cruz Verde"),
        ];

        let report = run(&Registry::default(), &source, &descriptors, DATE, RetryPolicy::none()).await;
        assert_eq!(report.total, 3);
        assert_eq!(report.scraped(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].url, AMAZON);

        let logged = log.contents();
        let skipped: Vec<&str> = logged
            .lines()
            .filter(|l| l.contains("Skipping descriptor"))
            .collect();
        assert_eq!(skipped.len(), 1, "{}", logged);
        assert!(skipped[0].contains("WARN"));
        assert!(skipped[0].contains("unrecognized_source"));
        assert!(skipped[0].contains(AMAZON));
        assert!(matches!(
            &report.failures[0].error,
            ScrapeError::UnrecognizedSource { url } if url == AMAZON
        ));
        assert_eq!(report.failure_kinds(), vec![("unrecognized_source", 1)]);
        assert_eq!(source.sessions(), (1, 1));

        let cruzverde = report.table.get("Hormogel", "Cruz Verde").unwrap();
        assert_eq!(cruzverde.lab_name.as_deref(), Some("Silesia"));
        assert_eq!(cruzverde.is_available, None);

        let dir = std::env::temp_dir().join(format!("pharma_scraper_pipeline_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let out = dir.join("out.csv");
        let outcome = finalize(report.table, &out).unwrap();
        assert_eq!(outcome.written, 2);
        assert!(outcome.dropped.is_empty());

        let written = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("2024-05-01,Hormogel,Farmex,18490,Silesia,"));
        assert!(lines[2].starts_with("2024-05-01,Hormogel,Cruz Verde,19990,Silesia,"));
        assert!(!written.contains("amazon"));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn validation_failure_keeps_row_out_of_table() {
        let url = "https://salcobrand.cl/products/rosuvastatina";
        let source = FakeSource::new(&[(url, "<html><body>Mantención</body></html>".to_string())]);
        let report = run(
            &Registry::default(),
            &source,
            &[descriptor(url, "Rosuvastatina", "Salcobrand")],
            DATE,
            RetryPolicy::none(),
        )
        .await;

        assert!(report.table.is_empty());
        match &report.failures[0].error {
            ScrapeError::Validation { site, missing } => {
                assert_eq!(*site, Site::Salcobrand);
                assert!(!missing.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn sessions_are_closed_on_every_path() {
        let elquimico = "https://www.farmaciaelquimico.cl/hormogel/";
        let farmaloop = "https://farmaloop.cl/producto/eutirox";
        let source = FakeSource::new(&[
            (CRUZVERDE, fixture("cruzverde")),
            // wait selector present but nothing else: validation fails
            (elquimico, r#"<span class="money-subtotal">$1</span>"#.to_string()),
            // wait selector never shows up
            (farmaloop, "<div id=\"__next\"></div>".to_string()),
        ]);
        let retry = RetryPolicy {
            max_retries: 1,
            base_backoff: Duration::from_millis(1),
        };
        let report = run(
            &Registry::default(),
            &source,
            &[
                descriptor(CRUZVERDE, "Hormogel", "Cruz Verde"),
                descriptor(elquimico, "Hormogel", "El Químico"),
                descriptor(farmaloop, "Eutirox", "Farmaloop"),
            ],
            DATE,
            retry,
        )
        .await;

        assert_eq!(report.table.len(), 1);
        assert_eq!(report.failure_kinds(), vec![("validation", 1), ("retrieval", 1)]);
        // the timed-out render is retried once in a fresh session
        assert_eq!(source.sessions(), (4, 4));
        assert!(matches!(
            &report.failures[1].error,
            ScrapeError::Retrieval { source: RetrievalError::WaitTimeout { .. }, .. }
        ));
    }

    #[tokio::test]
    async fn duplicate_key_keeps_last_row() {
        let other = "https://www.farmex.cl/products/hormogel-80";
        let cheaper = fixture("farmex").replace("$18.490", "$15.990");
        let source = FakeSource::new(&[(FARMEX, fixture("farmex")), (other, cheaper)]);
        let report = run(
            &Registry::default(),
            &source,
            &[
                descriptor(FARMEX, "Hormogel", "Farmex"),
                descriptor(other, "Hormogel", "Farmex"),
            ],
            DATE,
            RetryPolicy::none(),
        )
        .await;

        assert_eq!(report.table.len(), 1);
        let kept = report.table.get("Hormogel", "Farmex").unwrap();
        assert_eq!(kept.price.as_deref(), Some("$15.990"));
        assert_eq!(kept.url, other);
    }

    #[tokio::test]
    async fn single_url_scrape_outside_a_run() {
        let source = FakeSource::new(&[(FARMEX, fixture("farmex"))]);
        let record = scrape_one(
            &Registry::default(),
            &source,
            &descriptor(FARMEX, "", ""),
            DATE,
            RetryPolicy::none(),
        )
        .await
        .unwrap();
        assert_eq!(record.sku.as_deref(), Some("FX-20931"));
        assert_eq!(record.lab_name.as_deref(), Some("Silesia"));
        assert_eq!(source.sessions(), (0, 0));
    }
}
