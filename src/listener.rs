//! MQTT subscription and supervision for one printer.
//!
//! Messages are processed on the listener task strictly in arrival order;
//! only reconciliation runs elsewhere.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, TlsConfiguration,
    Transport,
};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::constants::{
    LOCAL_MQTT_USERNAME, MQTT_KEEP_ALIVE_SECONDS, MQTT_PORT, RECONNECT_BASE_SECONDS,
    RECONNECT_MAX_SECONDS,
};
use crate::config::{BrokerMode, Config};
use crate::error::NetworkError;
use crate::reconciler::Reconciler;
use crate::session::{Liveness, PrintSession};

/// Full status pushes from the printer are far larger than rumqttc's default limit.
const MAX_PACKET_BYTES: usize = 512 * 1024;

/// Exponential reconnect delay with an upper bound.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base: Duration,
    cap: Duration,
    attempts: u32,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(RECONNECT_BASE_SECONDS),
            Duration::from_secs(RECONNECT_MAX_SECONDS),
        )
    }
}

impl ReconnectBackoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempts: 0,
        }
    }

    /// Count a failed attempt and return how long to wait before the next one.
    pub fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        let factor = 2u32.saturating_pow(self.attempts - 1);
        self.base.saturating_mul(factor).min(self.cap)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Build broker connection options for the configured mode.
pub fn mqtt_options(config: &Config) -> MqttOptions {
    let client_id = format!(
        "filament_sync_{}_{}",
        config.printer_serial,
        chrono::Utc::now().timestamp_millis()
    );
    let mut options = MqttOptions::new(client_id, config.broker.host(), MQTT_PORT);
    options.set_keep_alive(Duration::from_secs(MQTT_KEEP_ALIVE_SECONDS));
    options.set_clean_session(true);
    options.set_max_packet_size(MAX_PACKET_BYTES, MAX_PACKET_BYTES);

    let tls = match &config.broker {
        BrokerMode::Local { access_code, .. } => {
            options.set_credentials(LOCAL_MQTT_USERNAME, access_code);
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(PrinterCertificate))
                .with_no_client_auth()
        }
        BrokerMode::Cloud { uid, token, .. } => {
            options.set_credentials(format!("u_{}", uid), token);
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth()
        }
    };
    options.set_transport(Transport::tls_with_config(TlsConfiguration::Rustls(
        Arc::new(tls),
    )));

    options
}

/// Printers serve a self-signed certificate on the LAN; accept it as-is.
#[derive(Debug)]
struct PrinterCertificate;

impl ServerCertVerifier for PrinterCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

/// Feeds one printer's report stream into its session.
pub struct TelemetryListener {
    topic: String,
    host: String,
    session: PrintSession,
    reconciler: Arc<Reconciler>,
    liveness: watch::Sender<Liveness>,
}

impl TelemetryListener {
    pub fn new(
        topic: String,
        host: String,
        reconciler: Arc<Reconciler>,
        liveness: watch::Sender<Liveness>,
    ) -> Self {
        Self {
            topic,
            host,
            session: PrintSession::new(),
            reconciler,
            liveness,
        }
    }

    pub fn session(&self) -> &PrintSession {
        &self.session
    }

    /// Apply one report payload, starting reconciliation if a print just ended.
    pub fn handle_message(&mut self, payload: &[u8]) -> Option<JoinHandle<()>> {
        let ended = self.session.handle_payload(payload);

        let current = self.session.liveness();
        self.liveness.send_if_modified(|published| {
            if *published == current {
                false
            } else {
                *published = current;
                true
            }
        });

        ended.and_then(|end| self.reconciler.spawn(end))
    }

    /// Run until `shutdown` flips, reconnecting with backoff on broker errors.
    pub async fn run(mut self, options: MqttOptions, mut shutdown: watch::Receiver<bool>) {
        let (client, mut event_loop) = AsyncClient::new(options, 100);
        let mut backoff = ReconnectBackoff::default();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = event_loop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        backoff.reset();
                        info!("Connected to MQTT broker");
                        match client.subscribe(self.topic.as_str(), QoS::AtMostOnce).await {
                            Ok(()) => info!("Subscribed to topic: {}", self.topic),
                            Err(e) => error!("Failed to subscribe to topic: {}", e),
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if publish.topic == self.topic {
                            self.handle_message(&publish.payload);
                        } else {
                            debug!("Ignoring message on topic {}", publish.topic);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let err = NetworkError::BrokerUnavailable {
                            host: self.host.clone(),
                            reason: e.to_string(),
                        };
                        warn!("MQTT connection closed: {}", err);

                        let delay = backoff.next_delay();
                        info!(
                            "Reconnecting to MQTT (attempt {}, next delay ~{}s)",
                            backoff.attempts(),
                            delay.as_secs()
                        );
                        tokio::select! {
                            _ = shutdown.changed() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                },
            }
        }

        disconnect(client, event_loop).await;
    }
}

async fn disconnect(client: AsyncClient, mut event_loop: EventLoop) {
    info!("Disconnecting from MQTT broker");
    if let Err(e) = client.disconnect().await {
        warn!("Could not queue MQTT disconnect: {}", e);
        return;
    }

    loop {
        match event_loop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("MQTT disconnected");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("MQTT event loop closed during disconnect: {}", e);
                return;
            }
        }
    }
}
