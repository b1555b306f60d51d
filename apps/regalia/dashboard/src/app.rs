//! Dashboard state and its single-threaded event loop.
//!
//! Transport events, staleness ticks and key presses are handled one at a
//! time by one task, so cards are always updated in the order frames arrived.

use std::{collections::VecDeque, time::Instant};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{backend::Backend, Terminal};
use regalia_core::{FieldCatalog, TelemetryObject};
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    bootstrap::fetch_snapshot,
    cards::CardRegistry,
    config::DashboardSettings,
    sort::SortPolicy,
    staleness::StalenessMonitor,
    transport::{spawn_transport, ConnectionStatus, TransportEvent},
    ui,
};

pub struct DashboardState {
    pub status: ConnectionStatus,
    pub registry: CardRegistry,
    pub staleness: StalenessMonitor,
    pub sort: SortPolicy,
    raw_log: VecDeque<String>,
    raw_log_lines: usize,
}

impl DashboardState {
    pub fn new(catalog: FieldCatalog, sort: SortPolicy, raw_log_lines: usize) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            registry: CardRegistry::new(catalog),
            staleness: StalenessMonitor::new(),
            sort,
            raw_log: VecDeque::with_capacity(raw_log_lines),
            raw_log_lines,
        }
    }

    pub fn on_transport_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Status(status) => {
                if status != self.status {
                    info!(status = status.label(), "relay status changed");
                }
                self.status = status;
            }
            TransportEvent::Frame(payload) => self.on_frame(payload, now),
        }
    }

    fn on_frame(&mut self, payload: String, now: Instant) {
        self.staleness.record_receipt(now);
        match self.registry.apply_payload(&payload, now) {
            Ok(summary) => {
                if !summary.created.is_empty() {
                    debug!(keys = ?summary.created, "new telemetry keys");
                }
                if self.sort.auto {
                    self.registry.sort(self.sort.mode);
                }
            }
            Err(err) => debug!(error = %err, "frame shown raw only"),
        }
        self.push_raw(payload);
    }

    /// Seeds the cards from the relay's cached snapshot.
    pub fn apply_snapshot(&mut self, snapshot: &TelemetryObject, now: Instant) {
        self.registry.apply_object(snapshot, now);
        if self.sort.auto {
            self.registry.sort(self.sort.mode);
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.staleness.tick(now);
    }

    /// Moves to the next sort mode and applies it.
    pub fn cycle_sort(&mut self) {
        self.sort.mode = self.sort.mode.next();
        self.registry.sort(self.sort.mode);
    }

    pub fn raw_log(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.raw_log.iter().map(String::as_str)
    }

    pub fn raw_log_enabled(&self) -> bool {
        self.raw_log_lines > 0
    }

    fn push_raw(&mut self, payload: String) {
        if self.raw_log_lines == 0 {
            return;
        }
        while self.raw_log.len() >= self.raw_log_lines {
            self.raw_log.pop_front();
        }
        self.raw_log.push_back(payload);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    CycleSort,
    Ignore,
}

pub fn key_action(key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char('s') => KeyAction::CycleSort,
        _ => KeyAction::Ignore,
    }
}

/// Runs the dashboard until the user quits.
pub async fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    settings: DashboardSettings,
    mut keys: mpsc::UnboundedReceiver<KeyEvent>,
) -> Result<()> {
    let mut state =
        DashboardState::new(FieldCatalog::builtin(), settings.sort, settings.raw_log_lines);

    if let Some(url) = &settings.snapshot_url {
        let client = reqwest::Client::new();
        match fetch_snapshot(&client, url).await {
            Ok(snapshot) => state.apply_snapshot(&snapshot, Instant::now()),
            Err(err) => warn!(error = %err, "starting without relay snapshot"),
        }
    }

    let (transport, mut events) = spawn_transport(settings.url.clone(), settings.retry_delay);
    let mut ticker = tokio::time::interval(settings.tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut keys_open = true;

    loop {
        terminal.draw(|frame| ui::render(frame, &state))?;

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => state.on_transport_event(event, Instant::now()),
                None => {
                    warn!("transport task ended");
                    break;
                }
            },
            _ = ticker.tick() => state.on_tick(Instant::now()),
            key = keys.recv(), if keys_open => match key.map(key_action) {
                Some(KeyAction::Quit) => break,
                Some(KeyAction::CycleSort) => state.cycle_sort(),
                Some(KeyAction::Ignore) => {}
                // No input source; keep running as an unattended display.
                None => keys_open = false,
            },
        }
    }

    transport.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortMode;
    use std::time::Duration;

    fn state(sort: SortPolicy) -> DashboardState {
        DashboardState::new(FieldCatalog::builtin(), sort, 3)
    }

    fn frame(text: &str) -> TransportEvent {
        TransportEvent::Frame(text.to_string())
    }

    #[test_timeout::timeout]
    fn end_to_end_frames_update_only_their_cards() {
        let mut state = state(SortPolicy::default());
        let t0 = Instant::now();
        state.on_transport_event(TransportEvent::Status(ConnectionStatus::Connected), t0);
        state.on_transport_event(frame(r#"{"kmph": 42, "v": 12.3}"#), t0);

        let t1 = t0 + Duration::from_secs(1);
        state.on_transport_event(frame(r#"{"kmph": 50}"#), t1);

        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.registry.keys(), vec!["kmph", "v"]);
        let speed = state.registry.get("kmph").unwrap();
        assert_eq!((speed.value.as_str(), speed.updated_at), ("50", Some(t1)));
        let volts = state.registry.get("v").unwrap();
        assert_eq!((volts.value.as_str(), volts.updated_at), ("12.3", Some(t0)));
    }

    #[test_timeout::timeout]
    fn raw_frames_are_logged_and_counted_for_staleness() {
        let mut state = state(SortPolicy::default());
        let t0 = Instant::now();
        state.on_transport_event(frame("boot ok"), t0);

        assert!(state.registry.is_empty());
        assert_eq!(state.staleness.last_receipt(), Some(t0));
        assert_eq!(state.raw_log().collect::<Vec<_>>(), vec!["boot ok"]);
    }

    #[test_timeout::timeout]
    fn raw_log_is_bounded() {
        let mut state = state(SortPolicy::default());
        let now = Instant::now();
        for i in 0..5 {
            state.on_transport_event(frame(&format!(r#"{{"lc": {i}}}"#)), now);
        }
        assert_eq!(
            state.raw_log().collect::<Vec<_>>(),
            vec![r#"{"lc": 2}"#, r#"{"lc": 3}"#, r#"{"lc": 4}"#]
        );
    }

    #[test_timeout::timeout]
    fn auto_sort_reorders_after_each_frame() {
        let mut state = state(SortPolicy {
            mode: SortMode::Recency,
            auto: true,
        });
        let t0 = Instant::now();
        state.on_transport_event(frame(r#"{"b": 1, "a": 2, "c": 3}"#), t0);
        state.on_transport_event(frame(r#"{"c": 4}"#), t0 + Duration::from_millis(10));
        assert_eq!(state.registry.keys()[0], "c");
    }

    #[test_timeout::timeout]
    fn manual_sort_waits_for_the_key_press() {
        let mut state = state(SortPolicy::default());
        let now = Instant::now();
        state.on_transport_event(frame(r#"{"b": 1, "a": 2}"#), now);
        assert_eq!(state.registry.keys(), vec!["b", "a"]);

        state.cycle_sort();
        assert_eq!(state.sort.mode, SortMode::Key);
        assert_eq!(state.registry.keys(), vec!["a", "b"]);
    }

    #[test_timeout::timeout]
    fn snapshot_seeds_cards_without_marking_a_receipt() {
        let mut state = state(SortPolicy::default());
        let snapshot = TelemetryObject::decode(r#"{"lc": 12, "ttime": "58:10"}"#).unwrap();
        state.apply_snapshot(&snapshot, Instant::now());

        assert_eq!(state.registry.keys(), vec!["lc", "ttime"]);
        assert!(state.staleness.last_receipt().is_none());
    }

    #[test_timeout::timeout]
    fn tick_refreshes_the_staleness_text() {
        let mut state = state(SortPolicy::default());
        let t0 = Instant::now();
        state.on_tick(t0);
        assert_eq!(state.staleness.rendered(), "no data yet");
        state.on_transport_event(frame(r#"{"v": 48.1}"#), t0);
        state.on_tick(t0 + Duration::from_millis(500));
        assert_eq!(state.staleness.rendered(), "last update 0.5 s ago");
    }

    #[test_timeout::timeout]
    fn key_bindings() {
        let press = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(key_action(press(KeyCode::Char('q'))), KeyAction::Quit);
        assert_eq!(key_action(press(KeyCode::Esc)), KeyAction::Quit);
        assert_eq!(
            key_action(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyAction::Quit
        );
        assert_eq!(key_action(press(KeyCode::Char('s'))), KeyAction::CycleSort);
        assert_eq!(key_action(press(KeyCode::Char('x'))), KeyAction::Ignore);
    }
}
