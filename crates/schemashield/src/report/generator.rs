//! Full-log aggregation and report persistence.

use super::document::SchemaDocument;
use crate::capture::{Capture, CaptureStore, StoreError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to serialize schema document: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("failed to write schema document to {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("report task failed: {0}")]
    Task(String),
}

/// Fold a capture sequence into a fresh document.
pub fn aggregate<I>(captures: I) -> Result<SchemaDocument, StoreError>
where
    I: IntoIterator<Item = Result<Capture, StoreError>>,
{
    let mut doc = SchemaDocument::new();
    let mut scanned = 0usize;
    for capture in captures {
        let capture = capture?;
        doc.observe(
            &capture.exchange.path,
            &capture.exchange.method,
            capture.exchange.status,
        );
        scanned += 1;
    }
    debug!(
        "Aggregated {} captures into {} paths",
        scanned,
        doc.endpoint_count()
    );
    Ok(doc)
}

/// Write `doc` as YAML to `path`, replacing any previous file.
///
/// The document is written to a sibling temp file and renamed into place, so
/// readers never see a half-written report.
pub fn write_document(doc: &SchemaDocument, path: &Path) -> Result<(), ReportError> {
    let yaml = doc.to_yaml()?;
    let persist_err = |source: std::io::Error| ReportError::Persist {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(persist_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path).map_err(persist_err)?;
    file.write_all(yaml.as_bytes()).map_err(persist_err)?;
    file.sync_all().map_err(persist_err)?;
    drop(file);
    fs::rename(&tmp_path, path).map_err(persist_err)?;
    Ok(())
}

/// Recomputes and persists the schema document on demand.
pub struct ReportGenerator {
    store: Arc<CaptureStore>,
    report_path: PathBuf,
}

impl ReportGenerator {
    pub fn new(store: Arc<CaptureStore>, report_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            report_path: report_path.into(),
        }
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    /// Scan every capture, build the document, and overwrite the report file.
    pub fn generate_report(&self) -> Result<SchemaDocument, ReportError> {
        let doc = aggregate(self.store.list_all())?;
        write_document(&doc, &self.report_path)?;
        info!(
            "Wrote schema report with {} paths to {:?}",
            doc.endpoint_count(),
            self.report_path
        );
        Ok(doc)
    }

    /// [`ReportGenerator::generate_report`] on the blocking pool.
    pub async fn generate_report_async(self: &Arc<Self>) -> Result<SchemaDocument, ReportError> {
        let generator = Arc::clone(self);
        tokio::task::spawn_blocking(move || generator.generate_report())
            .await
            .map_err(|e| ReportError::Task(e.to_string()))?
    }
}
