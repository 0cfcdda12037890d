//! In-memory test helpers.
//!
//! Not a public API surface for production use; kept in-tree so integration
//! tests and downstream adapter crates can assert on exported spans without a
//! backend.
use crate::sdk::export::{ExportResult, SpanData, SpanExporter};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

/// A [`SpanExporter`] that forwards every finished span over a channel.
#[derive(Debug)]
pub struct TestExporter {
    tx_export: Mutex<Sender<SpanData>>,
}

impl TestExporter {
    /// Create an exporter and the receiving end for its spans.
    pub fn new() -> (TestExporter, Receiver<SpanData>) {
        let (tx_export, rx_export) = channel();
        (
            TestExporter {
                tx_export: Mutex::new(tx_export),
            },
            rx_export,
        )
    }
}

impl SpanExporter for TestExporter {
    fn export(&self, batch: Vec<SpanData>) -> ExportResult {
        let sender = match self.tx_export.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for span_data in batch {
            sender
                .send(span_data)
                .map_err(|err| crate::trace::TraceError::Other(Box::new(err)))?;
        }
        Ok(())
    }
}
