use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::config::constants::AMS_SLOT_COUNT;

/// Spool attributes reported for one AMS slot at a point in time.
///
/// Snapshots are rebuilt from every telemetry payload that carries AMS data
/// and are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraySnapshot {
    pub slot_index: u8,
    pub filament_type: String,
    pub sub_brand: String,
    pub color_code: String,
    pub spool_weight_grams: Option<f64>,
    pub remain_percent: Option<f64>,
}

/// Tray snapshots keyed by 0-indexed slot.
pub type TrayMap = BTreeMap<u8, TraySnapshot>;

pub const UNKNOWN: &str = "Unknown";

const FIELDS: [&str; 5] = ["tray_type", "tray_sub_brands", "tray_color", "tray_weight", "remain"];

impl TraySnapshot {
    /// Build a snapshot from a single tray entry, or `None` if the slot is empty.
    pub fn from_json(slot_index: u8, tray: &Value) -> Option<Self> {
        let tray = tray.as_object()?;
        if !FIELDS.iter().any(|field| tray.contains_key(*field)) {
            return None;
        }

        Some(Self {
            slot_index,
            filament_type: text(tray.get("tray_type")),
            sub_brand: text(tray.get("tray_sub_brands")),
            color_code: text(tray.get("tray_color")),
            spool_weight_grams: number(tray.get("tray_weight")),
            remain_percent: number(tray.get("remain")).filter(|remain| *remain >= 0.0),
        })
    }
}

/// Extract per-slot snapshots from the `print.ams` object of a report.
///
/// Only the first AMS unit is read. Anything malformed yields an empty map.
pub fn parse_trays(ams: &Value) -> TrayMap {
    let Some(trays) = ams
        .get("ams")
        .and_then(Value::as_array)
        .and_then(|units| units.first())
        .and_then(|unit| unit.get("tray"))
        .and_then(Value::as_array)
    else {
        return TrayMap::new();
    };

    trays
        .iter()
        .take(AMS_SLOT_COUNT as usize)
        .enumerate()
        .filter_map(|(i, tray)| TraySnapshot::from_json(i as u8, tray))
        .map(|snapshot| (snapshot.slot_index, snapshot))
        .collect()
}

/// The slot currently feeding the toolhead, if it is an AMS slot.
///
/// The printer reports `tray_now` either as a number or a numeric string, and
/// uses values like 254/255 for the external spool or "no tray".
pub fn active_slot(ams: &Value) -> Option<u8> {
    let raw = match ams.get("tray_now")? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (0..AMS_SLOT_COUNT as i64)
        .contains(&raw)
        .then_some(raw as u8)
}

fn text(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
