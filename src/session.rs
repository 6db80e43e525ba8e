//! Print session tracking driven by the printer's status reports.
//!
//! Reports arrive as partial updates: a message may carry only progress, only
//! AMS data, or only a state change. [`PrintSession`] folds them in arrival
//! order and hands back a [`SessionEnd`] exactly once per print when the
//! printer reaches a terminal state.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_json::Value;

use crate::error::TelemetryError;
use crate::tray::{self, TrayMap};

/// Printer-reported lifecycle state of the current job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GcodeState {
    #[default]
    Idle,
    Prepare,
    Running,
    Finish,
    Failed,
    /// Any other vendor state (PAUSE, SLICING, ...), passed through untouched.
    Other(String),
}

impl GcodeState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "IDLE" => Self::Idle,
            "PREPARE" => Self::Prepare,
            "RUNNING" => Self::Running,
            "FINISH" => Self::Finish,
            "FAILED" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "IDLE",
            Self::Prepare => "PREPARE",
            Self::Running => "RUNNING",
            Self::Finish => "FINISH",
            Self::Failed => "FAILED",
            Self::Other(raw) => raw,
        }
    }

    fn starts_print(&self) -> bool {
        matches!(self, Self::Prepare | Self::Running)
    }

    fn outcome(&self) -> Option<PrintOutcome> {
        match self {
            Self::Finish => Some(PrintOutcome::Finished),
            Self::Failed => Some(PrintOutcome::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for GcodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a print session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOutcome {
    Finished,
    Failed,
}

impl PrintOutcome {
    pub fn state(&self) -> GcodeState {
        match self {
            Self::Finished => GcodeState::Finish,
            Self::Failed => GcodeState::Failed,
        }
    }
}

/// Everything the reconciler needs about a session that just ended.
///
/// This is an owned copy so reconciliation can run in the background while
/// the session keeps consuming telemetry.
#[derive(Debug, Clone)]
pub struct SessionEnd {
    pub outcome: PrintOutcome,
    /// Slots seen feeding the toolhead, in first-use order.
    pub active_slots: Vec<u8>,
    pub trays_at_start: TrayMap,
    /// Most recent tray snapshot seen during the session, if any.
    pub trays_at_end: Option<TrayMap>,
    pub last_progress: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
}

impl SessionEnd {
    pub fn duration_minutes(&self) -> i64 {
        self.started_at
            .map(|start| (self.ended_at - start).num_seconds())
            .map_or(0, |secs| (secs as f64 / 60.0).round() as i64)
    }
}

/// State reported by the liveness endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Liveness {
    pub print_state: String,
    pub print_running: bool,
}

/// Session state for one printer.
#[derive(Debug, Default)]
pub struct PrintSession {
    gcode_state: GcodeState,
    previous_gcode_state: GcodeState,
    print_running: bool,
    active_slots: Vec<u8>,
    current_slot: Option<u8>,
    started_at: Option<DateTime<Utc>>,
    trays_at_start: TrayMap,
    latest_trays: Option<TrayMap>,
    last_progress: f64,
    milestones_emitted: BTreeSet<u32>,
}

/// Decode a raw broker payload into its `print` status object.
pub fn decode_status(payload: &[u8]) -> Result<Value, TelemetryError> {
    let mut message: Value =
        serde_json::from_slice(payload).map_err(|e| TelemetryError::InvalidJson {
            reason: e.to_string(),
        })?;

    match message.get_mut("print").map(Value::take) {
        Some(status @ Value::Object(_)) => Ok(status),
        _ => Err(TelemetryError::MissingStatus),
    }
}

impl PrintSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw broker payload. Undecodable payloads are dropped.
    pub fn handle_payload(&mut self, payload: &[u8]) -> Option<SessionEnd> {
        self.handle_payload_at(payload, Utc::now())
    }

    pub fn handle_payload_at(&mut self, payload: &[u8], now: DateTime<Utc>) -> Option<SessionEnd> {
        match decode_status(payload) {
            Ok(status) => self.apply(&status, now),
            Err(e) => {
                debug!("Ignoring telemetry message: {}", e);
                None
            }
        }
    }

    /// Fold one `print` status object into the session.
    pub fn apply(&mut self, status: &Value, now: DateTime<Utc>) -> Option<SessionEnd> {
        let progress = status.get("mc_percent").and_then(Value::as_f64);
        let ams = status.get("ams").filter(|ams| ams.is_object());
        let reported_slot = ams.and_then(tray::active_slot);
        let trays = ams.map(tray::parse_trays).filter(|trays| !trays.is_empty());

        if let Some(progress) = progress {
            self.last_progress = progress;
        }

        if let Some(slot) = reported_slot {
            if self.current_slot != Some(slot) {
                info!("Active tray changed: {} -> {}", slot_label(self.current_slot), slot);
                self.current_slot = Some(slot);
            }
            if self.print_running {
                self.record_slot(slot);
            }
        }

        if self.print_running {
            if let Some(trays) = &trays {
                if self.trays_at_start.is_empty() {
                    info!("AMS tray snapshot captured: {}", describe(trays));
                    self.trays_at_start = trays.clone();
                }
                self.latest_trays = Some(trays.clone());
            }
        }

        let mut ended = None;
        if let Some(raw) = status.get("gcode_state").and_then(Value::as_str) {
            let next = GcodeState::parse(raw);
            if next != self.gcode_state {
                info!("Print state: {} -> {}", self.gcode_state, next);
                self.previous_gcode_state = std::mem::replace(&mut self.gcode_state, next);

                if self.gcode_state.starts_print() && !self.print_running {
                    self.start(trays.as_ref(), reported_slot, now);
                } else if let Some(outcome) = self.gcode_state.outcome() {
                    if self.print_running {
                        ended = Some(self.finish(outcome, now));
                    }
                }
            }
        }

        if let Some(progress) = progress {
            self.track_milestone(progress);
        }

        ended
    }

    fn start(&mut self, trays: Option<&TrayMap>, slot: Option<u8>, now: DateTime<Utc>) {
        self.print_running = true;
        self.started_at = Some(now);
        self.active_slots.clear();
        self.milestones_emitted.clear();
        self.last_progress = 0.0;

        match trays {
            Some(trays) => {
                info!("Print started, captured AMS tray snapshot: {}", describe(trays));
                self.trays_at_start = trays.clone();
                self.latest_trays = Some(trays.clone());
            }
            None => {
                info!("Print started, AMS data will be captured from a later message");
                self.trays_at_start.clear();
                self.latest_trays = None;
            }
        }

        if let Some(slot) = slot {
            self.record_slot(slot);
            self.current_slot = Some(slot);
        }
    }

    fn finish(&mut self, outcome: PrintOutcome, now: DateTime<Utc>) -> SessionEnd {
        self.print_running = false;

        let end = SessionEnd {
            outcome,
            active_slots: self.active_slots.clone(),
            trays_at_start: self.trays_at_start.clone(),
            trays_at_end: self.latest_trays.clone(),
            last_progress: self.last_progress,
            started_at: self.started_at,
            ended_at: now,
        };

        info!(
            "Print {} after ~{} minutes",
            outcome.state().as_str().to_lowercase(),
            end.duration_minutes()
        );
        end
    }

    fn record_slot(&mut self, slot: u8) {
        if !self.active_slots.contains(&slot) {
            self.active_slots.push(slot);
        }
    }

    fn track_milestone(&mut self, progress: f64) {
        if !self.print_running {
            return;
        }
        if progress == 0.0 {
            self.milestones_emitted.clear();
            return;
        }
        if progress < 0.0 || progress > 100.0 || progress % 25.0 != 0.0 {
            return;
        }
        if self.milestones_emitted.insert(progress as u32) {
            info!("Print progress: {}%", progress);
        }
    }

    pub fn gcode_state(&self) -> &GcodeState {
        &self.gcode_state
    }

    pub fn previous_gcode_state(&self) -> &GcodeState {
        &self.previous_gcode_state
    }

    pub fn is_print_running(&self) -> bool {
        self.print_running
    }

    pub fn active_slots(&self) -> &[u8] {
        &self.active_slots
    }

    pub fn current_slot(&self) -> Option<u8> {
        self.current_slot
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn trays_at_start(&self) -> &TrayMap {
        &self.trays_at_start
    }

    pub fn last_progress(&self) -> f64 {
        self.last_progress
    }

    pub fn milestones_emitted(&self) -> &BTreeSet<u32> {
        &self.milestones_emitted
    }

    pub fn liveness(&self) -> Liveness {
        Liveness {
            print_state: self.gcode_state.to_string(),
            print_running: self.print_running,
        }
    }
}

fn slot_label(slot: Option<u8>) -> String {
    slot.map_or_else(|| "none".to_string(), |s| s.to_string())
}

fn describe(trays: &TrayMap) -> String {
    serde_json::to_string(trays).unwrap_or_else(|_| format!("{} tray(s)", trays.len()))
}
