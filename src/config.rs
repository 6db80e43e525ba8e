use crate::error::ConfigError;

/// How the listener reaches the printer's telemetry stream.
///
/// Both modes deliver the same report topic; they only differ in which host
/// we dial and which credentials we present.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerMode {
    /// Direct LAN connection to the printer's built-in broker.
    Local { ip: String, access_code: String },

    /// The vendor's cloud relay, authenticated as the owning user.
    Cloud {
        server: String,
        uid: String,
        token: String,
    },
}

impl BrokerMode {
    pub fn host(&self) -> &str {
        match self {
            BrokerMode::Local { ip, .. } => ip,
            BrokerMode::Cloud { server, .. } => server,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BrokerMode::Local { .. } => "LOCAL",
            BrokerMode::Cloud { .. } => "CLOUD",
        }
    }
}

/// Configuration for the filament sync service loaded from environment variables.
///
/// One instance describes one printer. A multi-printer deployment runs one
/// process (or one listener) per device.
#[derive(Debug, Clone)]
pub struct Config {
    /// Printer serial number, used for the report topic and cloud task lookups.
    /// Environment variable: `PRINTER_SERIAL`
    pub printer_serial: String,

    /// Broker connection parameters.
    ///
    /// Environment variables: `PRINTER_IP`, `PRINTER_ACCESS_CODE`,
    /// `CLOUD_MQTT_ENABLED`, `CLOUD_MQTT_SERVER`, `CLOUD_MQTT_UID`, `CLOUD_MQTT_TOKEN`
    pub broker: BrokerMode,

    /// Bearer token for the vendor cloud API. When present, usage is taken
    /// from the cloud's task record; otherwise it is derived locally from
    /// tray weight deltas.
    /// Environment variable: `CLOUD_MQTT_TOKEN`
    pub cloud_token: Option<String>,

    /// Base URL of the vendor cloud API.
    /// Environment variable: `CLOUD_API_URL`
    pub cloud_api_url: String,

    /// Base URL of the inventory service.
    /// Environment variable: `TRACKER_API_URL`
    pub tracker_api_url: String,

    /// API key sent with every deduction.
    /// Environment variable: `TRACKER_API_KEY`
    pub tracker_api_key: String,

    /// Port for the liveness endpoint.
    /// Environment variable: `HEALTH_PORT`
    pub health_port: u16,

    /// Brand label the inventory files this vendor's spools under.
    /// Environment variable: `FILAMENT_BRAND`
    pub filament_brand: String,

    /// Translate vendor hex colors to human color names before deducting.
    /// Environment variable: `TRANSLATE_COLOR_NAMES`
    pub translate_color_names: bool,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `PRINTER_SERIAL` is unset or a numeric/boolean
    /// variable cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let var_or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let printer_serial = var("PRINTER_SERIAL").ok_or_else(|| ConfigError::MissingEnvVar {
            var_name: "PRINTER_SERIAL".to_string(),
        })?;

        let cloud_enabled = parse_bool("CLOUD_MQTT_ENABLED", var("CLOUD_MQTT_ENABLED"))?;
        let cloud_uid = var("CLOUD_MQTT_UID");
        let cloud_token = var("CLOUD_MQTT_TOKEN");

        let broker = match (cloud_enabled, &cloud_uid, &cloud_token) {
            (true, Some(uid), Some(token)) => BrokerMode::Cloud {
                server: var_or("CLOUD_MQTT_SERVER", "us.mqtt.bambulab.com"),
                uid: uid.clone(),
                token: token.clone(),
            },
            _ => BrokerMode::Local {
                ip: var_or("PRINTER_IP", "192.168.1.100"),
                access_code: var_or("PRINTER_ACCESS_CODE", ""),
            },
        };

        let health_port = match var("HEALTH_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                field: "HEALTH_PORT".to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => constants::DEFAULT_HEALTH_PORT,
        };

        Ok(Config {
            printer_serial,
            broker,
            cloud_token,
            cloud_api_url: trim_base(var_or("CLOUD_API_URL", "https://api.bambulab.com")),
            tracker_api_url: trim_base(var_or("TRACKER_API_URL", "http://localhost:3000")),
            tracker_api_key: var_or("TRACKER_API_KEY", ""),
            health_port,
            filament_brand: var_or("FILAMENT_BRAND", constants::DEFAULT_FILAMENT_BRAND),
            translate_color_names: parse_bool(
                "TRANSLATE_COLOR_NAMES",
                var("TRANSLATE_COLOR_NAMES"),
            )?,
        })
    }

    /// MQTT topic carrying this printer's status reports.
    pub fn report_topic(&self) -> String {
        format!("device/{}/report", self.printer_serial)
    }
}

fn parse_bool(field: &str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw {
        None => Ok(false),
        Some(value) => value
            .trim()
            .to_ascii_lowercase()
            .parse::<bool>()
            .map_err(|e| ConfigError::InvalidValue {
                field: field.to_string(),
                value,
                reason: format!("must be 'true' or 'false' ({})", e),
            }),
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Application constants used throughout the system.
pub mod constants {
    /// Port the printer (and the cloud relay) expose MQTT over TLS on.
    pub const MQTT_PORT: u16 = 8883;

    /// MQTT keep-alive interval in seconds.
    pub const MQTT_KEEP_ALIVE_SECONDS: u64 = 30;

    /// Username the printer's LAN broker expects.
    pub const LOCAL_MQTT_USERNAME: &str = "bblp";

    /// First reconnect delay in seconds.
    pub const RECONNECT_BASE_SECONDS: u64 = 5;

    /// Upper bound for the reconnect delay in seconds.
    pub const RECONNECT_MAX_SECONDS: u64 = 60;

    /// Time given to the cloud backend to register a finished task.
    pub const CLOUD_GRACE_PERIOD_SECONDS: u64 = 5;

    /// Timeout for the cloud task lookup.
    pub const CLOUD_TIMEOUT_SECONDS: u64 = 15;

    /// Timeout for a single deduction POST.
    pub const DEDUCTION_TIMEOUT_SECONDS: u64 = 10;

    /// How long shutdown waits for a clean broker disconnect.
    pub const SHUTDOWN_GRACE_SECONDS: u64 = 5;

    /// Spool weight assumed when a tray reports percentages but no weight.
    pub const DEFAULT_SPOOL_WEIGHT_GRAMS: f64 = 1000.0;

    pub const DEFAULT_HEALTH_PORT: u16 = 3001;

    pub const DEFAULT_FILAMENT_BRAND: &str = "Bambu Lab";

    /// Number of slots in one AMS unit.
    pub const AMS_SLOT_COUNT: u8 = 4;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn serial_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar { .. }));
    }

    #[test]
    fn defaults_to_local_broker() {
        let config = Config::from_lookup(lookup(&[
            ("PRINTER_SERIAL", "01P00A000000001"),
            ("PRINTER_IP", "10.0.0.7"),
        ]))
        .unwrap();

        assert_eq!(config.broker.label(), "LOCAL");
        assert_eq!(config.broker.host(), "10.0.0.7");
        assert_eq!(config.health_port, 3001);
        assert_eq!(config.filament_brand, "Bambu Lab");
        assert!(config.cloud_token.is_none());
        assert!(!config.translate_color_names);
        assert_eq!(config.report_topic(), "device/01P00A000000001/report");
    }

    #[test]
    fn cloud_mode_needs_uid_and_token() {
        let half = Config::from_lookup(lookup(&[
            ("PRINTER_SERIAL", "X1"),
            ("CLOUD_MQTT_ENABLED", "true"),
            ("CLOUD_MQTT_TOKEN", "tok"),
        ]))
        .unwrap();
        assert_eq!(half.broker.label(), "LOCAL");
        assert_eq!(half.cloud_token.as_deref(), Some("tok"));

        let full = Config::from_lookup(lookup(&[
            ("PRINTER_SERIAL", "X1"),
            ("CLOUD_MQTT_ENABLED", "TRUE"),
            ("CLOUD_MQTT_UID", "42"),
            ("CLOUD_MQTT_TOKEN", "tok"),
        ]))
        .unwrap();
        assert_eq!(
            full.broker,
            BrokerMode::Cloud {
                server: "us.mqtt.bambulab.com".to_string(),
                uid: "42".to_string(),
                token: "tok".to_string(),
            }
        );
    }

    #[test]
    fn rejects_bad_port_and_bool() {
        let port = Config::from_lookup(lookup(&[("PRINTER_SERIAL", "X1"), ("HEALTH_PORT", "http")]));
        assert!(matches!(port, Err(ConfigError::InvalidValue { .. })));

        let flag = Config::from_lookup(lookup(&[
            ("PRINTER_SERIAL", "X1"),
            ("TRANSLATE_COLOR_NAMES", "yes"),
        ]));
        assert!(matches!(flag, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn strips_trailing_slash_from_urls() {
        let config = Config::from_lookup(lookup(&[
            ("PRINTER_SERIAL", "X1"),
            ("TRACKER_API_URL", "https://inventory.example/"),
        ]))
        .unwrap();
        assert_eq!(config.tracker_api_url, "https://inventory.example");
    }
}
