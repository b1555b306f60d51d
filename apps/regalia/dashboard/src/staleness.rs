use std::time::{Duration, Instant};

pub const DEFAULT_TICK: Duration = Duration::from_millis(500);

const NO_DATA: &str = "no data yet";

/// Tracks how old the newest received frame is.
///
/// Recomputed on every tick; it observes receipts and never touches cards or
/// the transport.
#[derive(Debug, Clone)]
pub struct StalenessMonitor {
    last_receipt: Option<Instant>,
    rendered: String,
}

impl StalenessMonitor {
    pub fn new() -> Self {
        Self {
            last_receipt: None,
            rendered: NO_DATA.to_string(),
        }
    }

    pub fn record_receipt(&mut self, at: Instant) {
        self.last_receipt = Some(at);
    }

    pub fn last_receipt(&self) -> Option<Instant> {
        self.last_receipt
    }

    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.last_receipt
            .map(|received| now.saturating_duration_since(received))
    }

    /// Recomputes the displayed age.
    pub fn tick(&mut self, now: Instant) -> &str {
        self.rendered = match self.age(now) {
            Some(age) => format!("last update {} ago", format_age(age)),
            None => NO_DATA.to_string(),
        };
        &self.rendered
    }

    /// Text as of the last tick.
    pub fn rendered(&self) -> &str {
        &self.rendered
    }
}

impl Default for StalenessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        format!("{:.1} s", age.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}
