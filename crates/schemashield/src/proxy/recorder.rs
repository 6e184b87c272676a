//! Background capture recording.
//!
//! The forwarder hands every completed exchange to a [`CaptureRecorder`],
//! which queues it on a bounded channel and returns immediately. A single
//! worker task drains the queue and submits each capture to a
//! [`CaptureSink`] under a timeout. Nothing on this path is ever reported
//! back to the proxy's client.

use crate::capture::{CaptureStore, NewCapture};
use crate::config::RecorderConfig;
use crate::metrics;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Failures while recording a capture. Contained within the proxy.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("capture submission failed: {0}")]
    CaptureSubmissionFailed(String),
    #[error("capture submission timed out after {0:?}")]
    Timeout(Duration),
    #[error("capture queue is full")]
    QueueFull,
    #[error("capture recorder has shut down")]
    Closed,
}

impl RecordError {
    fn metric_label(&self) -> &'static str {
        match self {
            RecordError::CaptureSubmissionFailed(_) => "failed",
            RecordError::Timeout(_) => "timeout",
            RecordError::QueueFull => "queue_full",
            RecordError::Closed => "closed",
        }
    }
}

/// Destination for captured exchanges
#[async_trait]
pub trait CaptureSink: Send + Sync {
    /// Persist one capture, returning the id assigned by the store.
    async fn submit(&self, capture: NewCapture) -> Result<i64, RecordError>;
}

/// Submits captures to a core API over HTTP (`POST <base>/capture`).
pub struct HttpCaptureSink {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct IngestResponse {
    id: i64,
}

impl HttpCaptureSink {
    pub fn new(ingest_base_url: &str, timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/capture", ingest_base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CaptureSink for HttpCaptureSink {
    async fn submit(&self, capture: NewCapture) -> Result<i64, RecordError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&capture)
            .send()
            .await
            .map_err(|e| RecordError::CaptureSubmissionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecordError::CaptureSubmissionFailed(format!(
                "ingest returned {status}: {body}"
            )));
        }

        response
            .json::<IngestResponse>()
            .await
            .map(|r| r.id)
            .map_err(|e| RecordError::CaptureSubmissionFailed(e.to_string()))
    }
}

/// Appends captures straight into an in-process store.
pub struct StoreCaptureSink {
    store: Arc<CaptureStore>,
}

impl StoreCaptureSink {
    pub fn new(store: Arc<CaptureStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CaptureSink for StoreCaptureSink {
    async fn submit(&self, capture: NewCapture) -> Result<i64, RecordError> {
        let id = self
            .store
            .append_async(capture)
            .await
            .map_err(|e| RecordError::CaptureSubmissionFailed(e.to_string()))?;
        metrics::record_capture_stored();
        Ok(id)
    }
}

/// Non-blocking handle for queueing captures.
#[derive(Clone)]
pub struct CaptureRecorder {
    tx: mpsc::Sender<NewCapture>,
}

impl CaptureRecorder {
    /// Start the worker task and return the queueing handle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(sink: Arc<dyn CaptureSink>, config: &RecorderConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let timeout = Duration::from_millis(config.submit_timeout_ms);
        tokio::spawn(run_worker(sink, rx, timeout));
        Self { tx }
    }

    /// Queue a capture without waiting. Fails if the queue is full or closed.
    pub fn record(&self, capture: NewCapture) -> Result<(), RecordError> {
        self.tx.try_send(capture).map_err(|e| {
            let err = match e {
                mpsc::error::TrySendError::Full(_) => RecordError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => RecordError::Closed,
            };
            metrics::record_capture_submission(err.metric_label());
            err
        })
    }
}

async fn run_worker(
    sink: Arc<dyn CaptureSink>,
    mut rx: mpsc::Receiver<NewCapture>,
    timeout: Duration,
) {
    while let Some(capture) = rx.recv().await {
        let method = capture.method.clone();
        let path = capture.path.clone();

        let result = match tokio::time::timeout(timeout, sink.submit(capture)).await {
            Ok(result) => result,
            Err(_) => Err(RecordError::Timeout(timeout)),
        };

        match result {
            Ok(id) => {
                metrics::record_capture_submission("ok");
                debug!("Recorded capture {} for {} {}", id, method, path);
            }
            Err(e) => {
                metrics::record_capture_submission(e.metric_label());
                warn!("Dropped capture for {} {}: {}", method, path, e);
            }
        }
    }
    info!("Capture recorder stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::HeaderFields;
    use parking_lot::Mutex;

    fn capture(path: &str) -> NewCapture {
        NewCapture {
            method: "GET".to_string(),
            path: path.to_string(),
            status: 200,
            req_headers: HeaderFields::new(),
            req_body: None,
            res_headers: HeaderFields::new(),
            res_body: None,
            latency_ms: 1,
        }
    }

    fn config(queue_size: usize, submit_timeout_ms: u64) -> RecorderConfig {
        RecorderConfig {
            queue_size,
            submit_timeout_ms,
            ..Default::default()
        }
    }

    /// Sink that records paths, optionally failing or stalling
    struct TestSink {
        seen: Mutex<Vec<String>>,
        fail: bool,
        stall: Option<Duration>,
    }

    #[async_trait]
    impl CaptureSink for TestSink {
        async fn submit(&self, capture: NewCapture) -> Result<i64, RecordError> {
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            if self.fail {
                return Err(RecordError::CaptureSubmissionFailed("boom".into()));
            }
            let mut seen = self.seen.lock();
            seen.push(capture.path);
            Ok(seen.len() as i64)
        }
    }

    fn sink(fail: bool, stall: Option<Duration>) -> Arc<TestSink> {
        Arc::new(TestSink {
            seen: Mutex::new(Vec::new()),
            fail,
            stall,
        })
    }

    async fn wait_for(sink: &TestSink, count: usize) {
        for _ in 0..200 {
            if sink.seen.lock().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("sink never saw {count} captures");
    }

    #[tokio::test]
    async fn test_records_in_queue_order() {
        let sink = sink(false, None);
        let recorder = CaptureRecorder::spawn(sink.clone(), &config(16, 1000));

        recorder.record(capture("/a")).unwrap();
        recorder.record(capture("/b")).unwrap();
        wait_for(&sink, 2).await;

        assert_eq!(*sink.seen.lock(), vec!["/a".to_string(), "/b".to_string()]);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_worker() {
        let failing = sink(true, None);
        let recorder = CaptureRecorder::spawn(failing.clone(), &config(4, 1000));
        recorder.record(capture("/x")).unwrap();
        recorder.record(capture("/y")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Worker is still draining: the queue accepts more work
        assert!(recorder.record(capture("/z")).is_ok());
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let stalled = sink(false, Some(Duration::from_secs(5)));
        let recorder = CaptureRecorder::spawn(stalled, &config(1, 10_000));

        // First item is taken by the worker, second fills the queue
        recorder.record(capture("/1")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        recorder.record(capture("/2")).unwrap();

        assert!(matches!(
            recorder.record(capture("/3")),
            Err(RecordError::QueueFull)
        ));
    }

    #[tokio::test]
    async fn test_slow_sink_is_timed_out() {
        let slow = sink(false, Some(Duration::from_millis(500)));
        let recorder = CaptureRecorder::spawn(slow.clone(), &config(4, 20));
        recorder.record(capture("/slow")).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Timed out before the sink finished
        assert!(slow.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_store_sink_appends() {
        let store = Arc::new(CaptureStore::open_in_memory().unwrap());
        let sink = StoreCaptureSink::new(Arc::clone(&store));
        let id = sink.submit(capture("/stored")).await.unwrap();
        let found = store.latest_by_path("/stored").unwrap().unwrap();
        assert_eq!(found.id, id);
    }

    #[tokio::test]
    async fn test_http_sink_unreachable_is_submission_failure() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let sink =
            HttpCaptureSink::new("http://127.0.0.1:9/", Duration::from_millis(500)).unwrap();
        assert_eq!(sink.endpoint(), "http://127.0.0.1:9/capture");
        let err = sink.submit(capture("/nowhere")).await.unwrap_err();
        assert!(matches!(err, RecordError::CaptureSubmissionFailed(_)));
    }
}
