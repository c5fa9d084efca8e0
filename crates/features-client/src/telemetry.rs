//! Fire-and-forget delivery of request telemetry records.

use std::sync::Mutex;

use tracing::info;

use features_protocol::TelemetryRecord;

/// Receives one record per successful API call. Must not block.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, record: TelemetryRecord);
}

/// Emits records as `tracing` events on the `telemetry` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, record: TelemetryRecord) {
        match serde_json::to_string(&record) {
            Ok(details) => info!(target: "telemetry", details = %details, "Request details"),
            Err(e) => info!(target: "telemetry", error = %e, "Request details not serialisable"),
        }
    }
}

/// Drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn record(&self, _record: TelemetryRecord) {}
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, record: TelemetryRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
