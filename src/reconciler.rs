//! Turns a finished print session into inventory deductions.
//!
//! Two strategies exist and a deployment uses exactly one:
//!
//! * [`UsageStrategy::CloudTask`] asks the vendor cloud for the slicer's
//!   per-filament estimate of the job that just ended.
//! * [`UsageStrategy::LocalDelta`] compares the AMS tray readings from the
//!   start and end of the session.
//!
//! Missing data never raises: the affected slot (or the whole session) is
//! skipped with a warning.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{error, info, warn};
use tokio::task::JoinHandle;

use crate::cloud::{CloudTask, FilamentUsage, TASK_STATUS_FAILED, TaskSource};
use crate::config::constants::DEFAULT_SPOOL_WEIGHT_GRAMS;
use crate::inventory::{UsageRecord, UsageSink};
use crate::naming::FilamentNaming;
use crate::session::{PrintOutcome, SessionEnd};
use crate::tray::{TraySnapshot, UNKNOWN};

/// Where usage figures come from.
#[derive(Clone)]
pub enum UsageStrategy {
    CloudTask(Arc<dyn TaskSource>),
    LocalDelta,
}

impl UsageStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            UsageStrategy::CloudTask(_) => "cloud task lookup",
            UsageStrategy::LocalDelta => "local tray deltas",
        }
    }
}

/// Computes and submits filament usage for ended sessions.
pub struct Reconciler {
    strategy: UsageStrategy,
    sink: Arc<dyn UsageSink>,
    naming: FilamentNaming,
    grace_period: Duration,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when a reconciliation finishes, panics included.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Reconciler {
    pub fn new(
        strategy: UsageStrategy,
        sink: Arc<dyn UsageSink>,
        naming: FilamentNaming,
        grace_period: Duration,
    ) -> Self {
        Self {
            strategy,
            sink,
            naming,
            grace_period,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn strategy(&self) -> &UsageStrategy {
        &self.strategy
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Reconcile a session in the background.
    ///
    /// Returns `None` without doing anything if a previous reconciliation is
    /// still running. The returned task never propagates a failure; panics
    /// inside it are logged here at the task boundary.
    pub fn spawn(self: &Arc<Self>, end: SessionEnd) -> Option<JoinHandle<()>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous print is still being reconciled, skipping this session");
            return None;
        }

        let reconciler = Arc::clone(self);
        Some(tokio::spawn(async move {
            let worker = Arc::clone(&reconciler);
            let result = tokio::spawn(async move {
                let _guard = InFlight(&worker.in_flight);
                worker.reconcile(&end).await
            })
            .await;

            if let Err(e) = result {
                error!("Error handling print end: {}", e);
                reconciler.in_flight.store(false, Ordering::Release);
            }
        }))
    }

    /// Compute usage for one session and submit every record.
    ///
    /// Returns the records that were submitted, successful or not.
    pub async fn reconcile(&self, end: &SessionEnd) -> Vec<UsageRecord> {
        let records = match &self.strategy {
            UsageStrategy::CloudTask(tasks) => {
                info!(
                    "Print {}, fetching usage from the cloud task record",
                    outcome_label(end.outcome)
                );
                if !self.grace_period.is_zero() {
                    tokio::time::sleep(self.grace_period).await;
                }

                match tasks.latest_task().await {
                    Ok(task) => self.plan_from_task(end, &task),
                    Err(e) => {
                        error!("Could not fetch task data, skipping deduction: {}", e);
                        return Vec::new();
                    }
                }
            }
            UsageStrategy::LocalDelta => {
                info!(
                    "Print {}, computing usage from tray readings",
                    outcome_label(end.outcome)
                );
                self.plan_from_deltas(end)
            }
        };

        let mut succeeded = 0;
        for record in &records {
            if self.sink.submit(record).await.is_success() {
                succeeded += 1;
            }
        }

        info!(
            "Print filament deductions complete: {}/{} succeeded",
            succeeded,
            records.len()
        );
        records
    }

    /// Strategy A: derive records from the cloud's task record.
    pub fn plan_from_task(&self, end: &SessionEnd, task: &CloudTask) -> Vec<UsageRecord> {
        info!(
            "Task: \"{}\", status: {}, total weight: {}g",
            task.display_title(),
            task.status,
            task.total_weight_grams
        );

        if end.outcome == PrintOutcome::Failed && task.status != TASK_STATUS_FAILED {
            warn!(
                "Print failed but task status is {}, scaling the slicer estimate by progress anyway",
                task.status
            );
        }

        if task.filament_usage.is_empty() {
            warn!("No AMS detail mapping in task, attempting single deduction with total weight");
            return self.plan_from_total(end, task).into_iter().collect();
        }

        info!(
            "Processing {} filament(s) from slicer data",
            task.filament_usage.len()
        );

        let single_filament = task.filament_usage.len() == 1;
        task.filament_usage
            .iter()
            .filter_map(|usage| self.record_for_filament(end, usage, single_filament))
            .collect()
    }

    fn plan_from_total(&self, end: &SessionEnd, task: &CloudTask) -> Option<UsageRecord> {
        let grams = scaled_grams(task.total_weight_grams, end);
        if grams <= 0.0 {
            info!("Task reports no usable total weight, nothing to deduct");
            return None;
        }

        let Some(&slot) = end.active_slots.first() else {
            warn!("No active tray was seen during the print, skipping deduction");
            return None;
        };
        let Some(tray) = end.trays_at_start.get(&slot) else {
            warn!("No tray data for slot {}, skipping deduction", slot_name(slot));
            return None;
        };

        let record = self.record(
            slot,
            known(&tray.sub_brand),
            known(&tray.filament_type),
            &tray.color_code,
            grams,
        );
        info!(
            "Tray {} ({}): {}g {} ({}), source: task total",
            slot,
            slot_name(slot),
            record.grams_used,
            record.filament_type,
            record.brand
        );
        Some(record)
    }

    fn record_for_filament(
        &self,
        end: &SessionEnd,
        usage: &FilamentUsage,
        single_filament: bool,
    ) -> Option<UsageRecord> {
        let grams = scaled_grams(usage.weight_grams, end);
        if end.outcome == PrintOutcome::Failed {
            info!(
                "Failed print, scaling {} weight by {}%: {}g",
                usage.filament_type, end.last_progress, grams
            );
        }
        if grams <= 0.0 {
            info!("Skipping {}, 0g used", usage.filament_type);
            return None;
        }

        let cloud_slot = usage.slot_index();

        // A reprint may run on a different spool than the one it was sliced for.
        let telemetry_slot = match end.active_slots.as_slice() {
            [only] if single_filament => Some(*only),
            _ => None,
        };

        let (slot, tray, color) = match telemetry_slot {
            Some(slot) => {
                if i64::from(slot) != cloud_slot {
                    info!(
                        "Using telemetry active tray {} ({}) instead of cloud tray {} (A{})",
                        slot,
                        slot_name(slot),
                        cloud_slot,
                        cloud_slot + 1
                    );
                }
                let tray = end.trays_at_start.get(&slot);
                let color = tray
                    .and_then(|t| known(&t.color_code))
                    .or(known(&usage.source_color_code))
                    .unwrap_or(UNKNOWN);
                (slot, tray, color)
            }
            None => {
                let Ok(slot) = u8::try_from(cloud_slot) else {
                    warn!("Cloud reports invalid tray {}, skipping", usage.ams_slot);
                    return None;
                };
                let tray = end.trays_at_start.get(&slot);
                let color = known(&usage.source_color_code)
                    .or(tray.and_then(|t| known(&t.color_code)))
                    .unwrap_or(UNKNOWN);
                (slot, tray, color)
            }
        };

        if tray.is_none() {
            warn!(
                "No tray snapshot for slot {}, using cloud filament details only",
                slot_name(slot)
            );
        }

        let sub_brand = tray
            .and_then(|t| known(&t.sub_brand))
            .or(known(&usage.filament_type));
        let filament_type = known(&usage.filament_type).or(tray.and_then(|t| known(&t.filament_type)));

        let record = self.record(slot, sub_brand, filament_type, color, grams);
        info!(
            "Tray {} ({}): {}g {} ({}), source: slicer estimate",
            slot,
            slot_name(slot),
            record.grams_used,
            record.filament_type,
            record.brand
        );
        Some(record)
    }

    /// Strategy B: derive records from start/end tray readings.
    pub fn plan_from_deltas(&self, end: &SessionEnd) -> Vec<UsageRecord> {
        let Some(trays_at_end) = &end.trays_at_end else {
            warn!("No end-of-session tray snapshot was captured, skipping deduction");
            return Vec::new();
        };

        if end.active_slots.is_empty() {
            warn!("No active tray was seen during the print, skipping deduction");
        }

        end.active_slots
            .iter()
            .filter_map(|&slot| {
                let (Some(start), Some(finish)) =
                    (end.trays_at_start.get(&slot), trays_at_end.get(&slot))
                else {
                    warn!("Missing tray data for slot {}, skipping", slot_name(slot));
                    return None;
                };

                let Some(grams) = measured_usage(start, finish) else {
                    info!("No measurable usage for slot {}", slot_name(slot));
                    return None;
                };

                let record = self.record(
                    slot,
                    known(&start.sub_brand),
                    known(&start.filament_type),
                    &start.color_code,
                    grams,
                );
                info!(
                    "Tray {} ({}): {}g {} ({}), source: tray delta",
                    slot,
                    slot_name(slot),
                    record.grams_used,
                    record.filament_type,
                    record.brand
                );
                Some(record)
            })
            .collect()
    }

    fn record(
        &self,
        slot: u8,
        sub_brand: Option<&str>,
        filament_type: Option<&str>,
        color: &str,
        grams: f64,
    ) -> UsageRecord {
        let normalized = self
            .naming
            .normalize(sub_brand.unwrap_or(""), filament_type.unwrap_or(""));
        let color = self.naming.color(color, &normalized.filament_type);

        UsageRecord {
            brand: normalized.brand,
            filament_type: normalized.filament_type,
            color,
            grams_used: grams,
            slot_index: slot,
        }
    }
}

/// Grams used between two readings of the same spool, if measurable.
///
/// Prefers the weight delta; falls back to the remaining-percentage delta
/// applied to the starting weight (or a nominal 1 kg spool).
pub fn measured_usage(start: &TraySnapshot, end: &TraySnapshot) -> Option<f64> {
    let by_weight = match (start.spool_weight_grams, end.spool_weight_grams) {
        (Some(before), Some(after)) if before > after => Some(before - after),
        _ => None,
    };

    let by_percent = || match (start.remain_percent, end.remain_percent) {
        (Some(before), Some(after)) if before > after => {
            let nominal = start
                .spool_weight_grams
                .filter(|w| *w > 0.0)
                .unwrap_or(DEFAULT_SPOOL_WEIGHT_GRAMS);
            Some((before - after) / 100.0 * nominal)
        }
        _ => None,
    };

    by_weight
        .or_else(by_percent)
        .map(round2)
        .filter(|grams| *grams > 0.0)
}

fn scaled_grams(grams: f64, end: &SessionEnd) -> f64 {
    match end.outcome {
        PrintOutcome::Finished => grams,
        PrintOutcome::Failed => round2(grams * (end.last_progress / 100.0)),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Tray fields default to "Unknown"; treat that like an empty value.
fn known(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty() && value != UNKNOWN).then_some(value)
}

fn slot_name(slot: u8) -> String {
    format!("A{}", u16::from(slot) + 1)
}

fn outcome_label(outcome: PrintOutcome) -> &'static str {
    match outcome {
        PrintOutcome::Finished => "completed",
        PrintOutcome::Failed => "failed/cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::DeductionResult;
    use crate::tray::TrayMap;
    use crate::error::FilamentSyncError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    struct RecordingSink(Mutex<Vec<UsageRecord>>);

    #[async_trait]
    impl UsageSink for RecordingSink {
        async fn submit(&self, usage: &UsageRecord) -> DeductionResult {
            self.0.lock().unwrap().push(usage.clone());
            DeductionResult::Success(serde_json::Value::Null)
        }
    }

    /// Holds the task lookup open until released.
    #[derive(Default)]
    struct HeldTask {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl TaskSource for HeldTask {
        async fn latest_task(&self) -> Result<CloudTask, FilamentSyncError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(CloudTask {
                total_weight_grams: 10.0,
                ..CloudTask::default()
            })
        }
    }

    struct PanickingTask;

    #[async_trait]
    impl TaskSource for PanickingTask {
        async fn latest_task(&self) -> Result<CloudTask, FilamentSyncError> {
            panic!("task lookup blew up");
        }
    }

    fn tray(slot: u8, sub_brand: &str, kind: &str, color: &str, weight: Option<f64>) -> TraySnapshot {
        TraySnapshot {
            slot_index: slot,
            filament_type: kind.to_string(),
            sub_brand: sub_brand.to_string(),
            color_code: color.to_string(),
            spool_weight_grams: weight,
            remain_percent: None,
        }
    }

    fn end(outcome: PrintOutcome, slots: &[u8], trays: Vec<TraySnapshot>, progress: f64) -> SessionEnd {
        SessionEnd {
            outcome,
            active_slots: slots.to_vec(),
            trays_at_start: trays.into_iter().map(|t| (t.slot_index, t)).collect(),
            trays_at_end: None,
            last_progress: progress,
            started_at: None,
            ended_at: Utc::now(),
        }
    }

    fn usage(ams: i64, kind: &str, color: &str, grams: f64) -> FilamentUsage {
        FilamentUsage {
            ams_slot: ams,
            filament_type: kind.to_string(),
            source_color_code: color.to_string(),
            weight_grams: grams,
        }
    }

    fn reconciler(strategy: UsageStrategy) -> (Arc<Reconciler>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let reconciler = Reconciler::new(
            strategy,
            sink.clone(),
            FilamentNaming::new("Bambu Lab", false),
            Duration::ZERO,
        );
        (Arc::new(reconciler), sink)
    }

    #[test]
    fn single_filament_trusts_telemetry_slot() {
        let (r, _) = reconciler(UsageStrategy::LocalDelta);
        let session = end(
            PrintOutcome::Finished,
            &[0],
            vec![
                tray(0, "PLA Matte", "PLA", "000000FF", None),
                tray(1, "PLA Basic", "PLA", "FFFFFFFF", None),
            ],
            100.0,
        );
        let task = CloudTask {
            filament_usage: vec![usage(2, "PLA", "FFFFFFFF", 20.0)],
            ..CloudTask::default()
        };

        let records = r.plan_from_task(&session, &task);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].slot_index, 0);
        assert_eq!(records[0].filament_type, "PLA Matte");
        assert_eq!(records[0].color, "000000FF");
        assert_eq!(records[0].grams_used, 20.0);
    }

    #[test]
    fn multi_filament_uses_cloud_slots_and_skips_zero() {
        let (r, _) = reconciler(UsageStrategy::LocalDelta);
        let session = end(
            PrintOutcome::Finished,
            &[0, 1],
            vec![
                tray(0, "PLA Basic", "PLA", "FFFFFFFF", None),
                tray(1, "PETG HF", "PETG", "000000FF", None),
            ],
            100.0,
        );
        let task = CloudTask {
            filament_usage: vec![
                usage(1, "PLA", "FFFFFFFF", 0.0),
                usage(2, "PETG", "0A2989FF", 7.25),
            ],
            ..CloudTask::default()
        };

        let records = r.plan_from_task(&session, &task);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].slot_index, 1);
        assert_eq!(records[0].filament_type, "PETG HF");
        assert_eq!(records[0].color, "0A2989FF");
    }

    #[test]
    fn failed_print_scales_by_progress() {
        let (r, _) = reconciler(UsageStrategy::LocalDelta);
        let session = end(
            PrintOutcome::Failed,
            &[2],
            vec![tray(2, "PLA Basic", "PLA", "FFFFFFFF", None)],
            40.0,
        );
        let task = CloudTask {
            status: TASK_STATUS_FAILED,
            filament_usage: vec![usage(3, "PLA", "FFFFFFFF", 33.333)],
            ..CloudTask::default()
        };

        let records = r.plan_from_task(&session, &task);
        assert_eq!(records[0].grams_used, 13.33);
        assert_eq!(records[0].filament_type, "PLA");
    }

    #[test]
    fn total_weight_fallback_uses_first_active_slot() {
        let (r, _) = reconciler(UsageStrategy::LocalDelta);
        let session = end(
            PrintOutcome::Failed,
            &[1, 0],
            vec![
                tray(0, "PLA Basic", "PLA", "FFFFFFFF", None),
                tray(1, "", "ABS", "C12E1FFF", None),
            ],
            50.0,
        );
        let task = CloudTask {
            status: 2,
            total_weight_grams: 30.0,
            ..CloudTask::default()
        };

        let records = r.plan_from_task(&session, &task);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].slot_index, 1);
        assert_eq!(records[0].filament_type, "ABS");
        assert_eq!(records[0].grams_used, 15.0);
    }

    #[test]
    fn total_weight_fallback_needs_tray_data() {
        let (r, _) = reconciler(UsageStrategy::LocalDelta);
        let task = CloudTask {
            total_weight_grams: 30.0,
            ..CloudTask::default()
        };

        let no_slot = end(PrintOutcome::Finished, &[], vec![], 100.0);
        assert!(r.plan_from_task(&no_slot, &task).is_empty());

        let no_tray = end(PrintOutcome::Finished, &[3], vec![], 100.0);
        assert!(r.plan_from_task(&no_tray, &task).is_empty());
    }

    #[test]
    fn weight_delta_then_percent_delta() {
        let mut start = tray(0, "PLA Basic", "PLA", "FFFFFFFF", Some(800.0));
        let mut finish = tray(0, "PLA Basic", "PLA", "FFFFFFFF", Some(750.0));
        assert_eq!(measured_usage(&start, &finish), Some(50.0));

        finish.spool_weight_grams = Some(800.0);
        start.remain_percent = Some(80.0);
        finish.remain_percent = Some(75.0);
        assert_eq!(measured_usage(&start, &finish), Some(40.0));

        start.spool_weight_grams = None;
        assert_eq!(measured_usage(&start, &finish), Some(50.0));

        finish.remain_percent = Some(80.0);
        assert_eq!(measured_usage(&start, &finish), None);
    }

    #[test]
    fn deltas_skip_slots_without_readings() {
        let (r, _) = reconciler(UsageStrategy::LocalDelta);
        let mut session = end(
            PrintOutcome::Finished,
            &[0, 1, 2],
            vec![
                tray(0, "PLA Basic", "PLA", "FFFFFFFF", Some(800.0)),
                tray(1, "PETG HF", "PETG", "000000FF", Some(500.0)),
            ],
            100.0,
        );
        assert!(r.plan_from_deltas(&session).is_empty());

        let trays_at_end: TrayMap = [
            tray(0, "PLA Basic", "PLA", "FFFFFFFF", Some(750.0)),
            tray(1, "PETG HF", "PETG", "000000FF", Some(500.0)),
        ]
        .into_iter()
        .map(|t| (t.slot_index, t))
        .collect();
        session.trays_at_end = Some(trays_at_end);

        let records = r.plan_from_deltas(&session);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].slot_index, 0);
        assert_eq!(records[0].grams_used, 50.0);
        assert_eq!(records[0].filament_type, "PLA");
    }

    #[tokio::test]
    async fn local_strategy_submits_records() {
        let (r, sink) = reconciler(UsageStrategy::LocalDelta);
        let mut session = end(
            PrintOutcome::Finished,
            &[0],
            vec![tray(0, "PLA Basic", "PLA", "FFFFFFFF", Some(800.0))],
            100.0,
        );
        session.trays_at_end = Some(
            [(0, tray(0, "PLA Basic", "PLA", "FFFFFFFF", Some(790.5)))]
                .into_iter()
                .collect(),
        );

        let handle = r.spawn(session).expect("nothing else in flight");
        handle.await.unwrap();

        let submitted = sink.0.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].grams_used, 9.5);
        assert!(!r.is_in_flight());
    }

    #[tokio::test]
    async fn overlapping_spawn_is_dropped() {
        let tasks = Arc::new(HeldTask::default());
        let (r, sink) = reconciler(UsageStrategy::CloudTask(tasks.clone()));
        let session = || {
            end(
                PrintOutcome::Finished,
                &[0],
                vec![tray(0, "PLA Basic", "PLA", "FFFFFFFF", None)],
                100.0,
            )
        };

        let first = r.spawn(session()).expect("nothing else in flight");
        tasks.entered.notified().await;
        assert!(r.is_in_flight());
        assert!(r.spawn(session()).is_none());

        tasks.release.notify_one();
        first.await.unwrap();

        assert!(!r.is_in_flight());
        assert_eq!(sink.0.lock().unwrap().len(), 1);

        let second = r.spawn(session()).expect("flag cleared after the first run");
        tasks.release.notify_one();
        second.await.unwrap();
        assert_eq!(sink.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn panicking_reconciliation_clears_flag() {
        let (r, sink) = reconciler(UsageStrategy::CloudTask(Arc::new(PanickingTask)));
        let session = end(PrintOutcome::Finished, &[0], vec![], 100.0);

        let handle = r.spawn(session.clone()).expect("nothing else in flight");
        handle.await.expect("panic stays inside the worker task");

        assert!(!r.is_in_flight());
        assert!(sink.0.lock().unwrap().is_empty());
        assert!(r.spawn(session).is_some());
    }

    #[test]
    fn null_cloud_fields_fall_back_to_tray() {
        let (r, _) = reconciler(UsageStrategy::LocalDelta);
        let session = end(
            PrintOutcome::Finished,
            &[0, 1],
            vec![
                tray(0, "PLA Matte", "PLA", "000000FF", None),
                tray(1, "PETG HF", "PETG", "FFFFFFFF", None),
            ],
            100.0,
        );
        let task: CloudTask = serde_json::from_value(serde_json::json!({
            "status": 2,
            "weight": 18.0,
            "amsDetailMapping": [
                {"ams": null, "filamentType": null, "sourceColor": null, "weight": 12.0},
                {"ams": 2, "filamentType": "PETG", "sourceColor": null, "weight": 6.0}
            ]
        }))
        .unwrap();

        let records = r.plan_from_task(&session, &task);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].slot_index, 0);
        assert_eq!(records[0].filament_type, "PLA Matte");
        assert_eq!(records[0].color, "000000FF");
        assert_eq!(records[0].grams_used, 12.0);
        assert_eq!(records[1].slot_index, 1);
        assert_eq!(records[1].filament_type, "PETG HF");
        assert_eq!(records[1].color, "FFFFFFFF");
    }

    #[test]
    fn missing_tray_snapshot_uses_cloud_details() {
        let (r, _) = reconciler(UsageStrategy::LocalDelta);
        let session = end(PrintOutcome::Finished, &[0, 3], vec![], 100.0);
        let task = CloudTask {
            filament_usage: vec![
                usage(1, "PLA", "FFFFFFFF", 4.0),
                usage(4, "PETG", "000000FF", 2.5),
            ],
            ..CloudTask::default()
        };

        let records = r.plan_from_task(&session, &task);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].slot_index, 3);
        assert_eq!(records[1].filament_type, "PETG");
        assert_eq!(records[1].color, "000000FF");
        assert_eq!(records[1].grams_used, 2.5);
    }
}
