use std::sync::Arc;

use parking_lot::RwLock;
use regalia_core::{DecodeError, TelemetryObject};

/// The last telemetry object the relay managed to decode.
///
/// Every successful decode replaces the stored object wholesale; keys missing
/// from the newest message are not carried over. Clones share the same cell,
/// so the relay loop can write while HTTP handlers read.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCache {
    latest: Arc<RwLock<Option<TelemetryObject>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `payload` and, if it is an object, stores it in place of the
    /// previous snapshot. On failure the cache is left untouched.
    pub fn on_message(&self, payload: &str) -> Result<(), DecodeError> {
        let decoded = TelemetryObject::decode(payload)?;
        self.replace(decoded);
        Ok(())
    }

    pub fn replace(&self, snapshot: TelemetryObject) {
        *self.latest.write() = Some(snapshot);
    }

    /// Current snapshot, or an empty object before the first decode.
    pub fn get(&self) -> TelemetryObject {
        self.latest.read().clone().unwrap_or_default()
    }

    pub fn is_populated(&self) -> bool {
        self.latest.read().is_some()
    }
}
