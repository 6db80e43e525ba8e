//! Filament Sync - automatic filament inventory deductions from printer telemetry.
//!
//! This library listens to a 3D printer's MQTT status reports, follows each print
//! from start to finish, works out how many grams of filament every AMS slot
//! consumed and posts those figures to an external inventory service.
//!
//! # Core Components
//!
//! * [`tray`] - AMS tray snapshot parsing
//! * [`naming`] - Vendor filament vocabulary to inventory vocabulary
//! * [`session`] - Print session state machine
//! * [`reconciler`] - Usage computation from cloud task data or tray deltas
//! * [`cloud`] - Vendor cloud task lookups
//! * [`inventory`] - Inventory deduction client
//! * [`listener`] - MQTT subscription, reconnects and dispatch
//! * [`health`] - Liveness endpoint
//! * [`config`] - Environment configuration
//! * [`error`] - Error types
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use filament_sync::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = Config::load()?;
//! let inventory = InventoryClient::new(config.tracker_api_url.clone(), config.tracker_api_key.clone())?;
//! let reconciler = Reconciler::new(
//!     UsageStrategy::LocalDelta,
//!     Arc::new(inventory),
//!     FilamentNaming::new(config.filament_brand.clone(), config.translate_color_names),
//!     Duration::from_secs(5),
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cloud;
pub mod config;
pub mod error;
pub mod health;
pub mod inventory;
pub mod listener;
pub mod naming;
pub mod reconciler;
pub mod session;
pub mod tray;

// Re-export commonly used types for convenience
pub use cloud::{CloudTask, CloudTaskClient, TaskSource};
pub use config::{BrokerMode, Config};
pub use error::FilamentSyncError;
pub use inventory::{DeductionResult, InventoryClient, UsageRecord, UsageSink};
pub use listener::TelemetryListener;
pub use naming::FilamentNaming;
pub use reconciler::{Reconciler, UsageStrategy};
pub use session::{GcodeState, PrintSession, SessionEnd};
pub use tray::TraySnapshot;
