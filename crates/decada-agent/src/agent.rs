// ============================================
// File: crates/decada-agent/src/agent.rs
// ============================================
//! # Agent Orchestrator
//!
//! ## Creation Reason
//! Wires provisioning, the broker session and the steady-state tasks
//! together and owns the agent lifecycle.
//!
//! ## Main Functionality
//! - `AgentDeps`: every external dependency, injected
//! - `Agent::run()`: boot sequence, steady-state consumer loop, teardown
//! - Fatal errors escalate to exactly one `Restarter::restart`
//!
//! ## Boot Sequence
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ 1. seed key generator from entropy                           │
//! │ 2. key pair + CSR ─► sign_csr ─► None? ──► restart           │
//! │ 3. install CA (tag 1), client cert + key (tag 2)             │
//! │ 4. ensure_registered ─► device secret                        │
//! │ 5. derive session credentials                                │
//! │ 6. connect (3 × 5 s) ─► failed? ──► restart                  │
//! │ 7. subscribe command topic, start dispatcher                 │
//! │ 8. consumer loop: mailbox ─► publish ─► failed? ──► restart  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tasks
//! ```text
//! ┌─────────────────┐ mailbox ┌──────────────────┐
//! │ telemetry task  │────────►│ consumer (run)   │──► SessionManager
//! └─────────────────┘         └──────────────────┘        │
//! ┌─────────────────┐   mpsc<InboundMessage>               │
//! │ dispatcher task │◄─────────────────────────────────────┘
//! └─────────────────┘
//! ┌─────────────────┐
//! │ watchdog super. │──starved──► Restarter
//! └─────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Watchdog channels are installed before the supervisor starts
//! - The telemetry task starts at boot and waits for CONNECTED
//! - Configuration errors are returned, not restarted on
//!
//! ## Last Modified
//! v0.1.0 - Initial agent orchestrator

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use decada_common::{Clock, DeviceSecret, DeviceUuid, SystemClock};
use decada_core::protocol::TopicSet;
use decada_transport::{
    CredentialKind, CredentialStore, DnsResolver, EntropySource, HttpTransport, OsEntropy,
    ReqwestTransport, Resolver, SecureTransport, TlsTransport, CA_CERTS_TAG, CLIENT_CERTS_TAG,
};

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::handlers::{CommandHandler, Dispatcher, SetPointTable};
use crate::provisioning::{
    CertificateAuthority, CertificateIssuer, CloudClient, DeviceRegistration, IssuerSettings,
};
use crate::services::{
    mailbox, FileStore, MailboxReceiver, MemoryStore, PersistStore, Restarter, SoftwareWatchdog,
    TelemetryProducer, Watchdog, WatchdogHandle,
};
use crate::session::{InboundMessage, Publisher, SessionCredentials, SessionManager};

/// Grace period for background tasks at teardown.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// AgentDeps
// ============================================

/// External dependencies of the agent.
pub struct AgentDeps {
    /// HTTPS client for the REST API.
    pub http: Arc<dyn HttpTransport>,
    /// Broker host resolution.
    pub resolver: Arc<dyn Resolver>,
    /// TLS sockets to the broker.
    pub transport: Arc<dyn SecureTransport>,
    /// Seed for the key generator.
    pub entropy: Arc<dyn EntropySource>,
    /// Wall clock.
    pub clock: Arc<dyn Clock>,
    /// Persistent storage.
    pub store: Arc<dyn PersistStore>,
    /// Watchdog the agent's channels are installed on.
    pub watchdog: Arc<dyn Watchdog>,
    /// Supervisor started once channels are installed.
    pub supervisor: Option<Arc<SoftwareWatchdog>>,
    /// Restart hook for fatal errors.
    pub restarter: Arc<dyn Restarter>,
    /// Inbound command handling.
    pub handler: Arc<dyn CommandHandler>,
}

impl AgentDeps {
    /// Builds the production dependency set from `config`.
    ///
    /// # Errors
    /// Returns an error if the API CA file cannot be read or the HTTP
    /// client cannot be built.
    pub async fn production(config: &AgentConfig, restarter: Arc<dyn Restarter>) -> Result<Self> {
        let api_ca = match &config.cloud.api_ca_cert_path {
            Some(path) => Some(
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| AgentError::config_load(path, e.to_string()))?,
            ),
            None => None,
        };
        let http = ReqwestTransport::new(config.cloud.request_timeout(), api_ca.as_deref())?;

        let store: Arc<dyn PersistStore> = match &config.store.path {
            Some(path) => Arc::new(FileStore::new(path)),
            None => Arc::new(MemoryStore::new()),
        };

        let watchdog = Arc::new(SoftwareWatchdog::new(config.watchdog.window()));
        let supervisor = config.watchdog.enabled.then(|| Arc::clone(&watchdog));

        Ok(Self {
            http: Arc::new(http),
            resolver: Arc::new(DnsResolver::new(
                config.session.dns_attempts,
                config.session.dns_timeout(),
                config.session.dns_retry_delay(),
            )),
            transport: Arc::new(TlsTransport::new(config.session.connect_timeout())),
            entropy: Arc::new(OsEntropy),
            clock: Arc::new(SystemClock::new()),
            store,
            watchdog,
            supervisor,
            restarter,
            handler: Arc::new(SetPointTable::new(config.commands.accepted_keys.iter().cloned())),
        })
    }
}

impl std::fmt::Debug for AgentDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDeps")
            .field("supervised", &self.supervisor.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================
// Agent
// ============================================

/// The provisioning agent for one device.
///
/// # Lifecycle
/// 1. Create with `Agent::new(config, uuid, deps, shutdown)`
/// 2. Run with `agent.run().await`
/// 3. Stop by cancelling `shutdown`; a fatal error stops it too
pub struct Agent {
    config: AgentConfig,
    uuid: DeviceUuid,
    deps: AgentDeps,
    shutdown: CancellationToken,
}

/// Background tasks of one run.
struct Background {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Background {
    async fn join(self) {
        for (name, task) in self.tasks {
            match tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => debug!("Task '{}' completed", name),
                Ok(Err(e)) => warn!("Task '{}' failed: {}", name, e),
                Err(_) => warn!("Task '{}' timed out during shutdown", name),
            }
        }
    }
}

impl Agent {
    /// Creates an agent for device `uuid`.
    pub fn new(config: AgentConfig, uuid: DeviceUuid, deps: AgentDeps, shutdown: CancellationToken) -> Self {
        Self {
            config,
            uuid,
            deps,
            shutdown,
        }
    }

    /// Device this agent acts for.
    #[must_use]
    pub const fn uuid(&self) -> &DeviceUuid {
        &self.uuid
    }

    /// Runs until `shutdown` is cancelled or a fatal error occurs.
    ///
    /// # Errors
    /// Returns the error that ended the run. Fatal errors have already
    /// been reported to the restarter.
    pub async fn run(&self) -> Result<()> {
        info!(uuid = %self.uuid, "Starting DECADA agent v{}", env!("CARGO_PKG_VERSION"));
        self.config.cloud.ensure_credentials()?;

        let communications = WatchdogHandle::install(Arc::clone(&self.deps.watchdog), "communications")?;
        let telemetry_channel = WatchdogHandle::install(Arc::clone(&self.deps.watchdog), "telemetry")?;

        let credentials = Arc::new(CredentialStore::new());
        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.commands.inbound_queue);
        let session = SessionManager::new(
            self.config.session.clone(),
            Arc::clone(&self.deps.resolver),
            Arc::clone(&self.deps.transport),
            Arc::clone(&credentials),
            inbound_tx,
        );
        let (mail_tx, mail_rx) = mailbox(self.config.telemetry.mailbox_capacity);

        let tasks = self.shutdown.child_token();
        let mut background = Background { tasks: Vec::new() };

        if let Some(supervisor) = &self.deps.supervisor {
            let handle = supervisor.spawn_supervisor(Arc::clone(&self.deps.restarter), tasks.clone());
            background.tasks.push(("watchdog", handle));
        }

        let producer = TelemetryProducer::new(
            &self.config.telemetry,
            self.uuid.clone(),
            Arc::clone(&self.deps.clock),
            mail_tx,
            telemetry_channel,
        );
        let states = session.watch_state();
        let producer_cancel = tasks.clone();
        background.tasks.push((
            "telemetry",
            tokio::spawn(async move {
                if let Err(e) = producer.run(states, producer_cancel).await {
                    warn!(error = %e, "Telemetry producer ended");
                }
            }),
        ));

        let result = tokio::select! {
            result = self.serve(&session, &credentials, inbound_rx, mail_rx, &communications, &tasks, &mut background) => result,
            () = self.shutdown.cancelled() => {
                info!("Shutdown requested");
                Ok(())
            }
        };

        if let Err(e) = &result {
            if e.is_fatal() {
                error!(error = %e, "Fatal error");
                self.deps.restarter.restart(&e.to_string());
            } else {
                error!(error = %e, "Agent failed");
            }
        }

        tasks.cancel();
        if let Err(e) = session.disconnect().await {
            warn!(error = %e, "Disconnect failed");
        }
        background.join().await;
        info!("Agent stopped");
        result
    }

    /// Boot sequence followed by the consumer loop.
    #[allow(clippy::too_many_arguments)]
    async fn serve(
        &self,
        session: &Arc<SessionManager>,
        credentials: &CredentialStore,
        inbound: mpsc::Receiver<InboundMessage>,
        mailbox: MailboxReceiver,
        watchdog: &WatchdogHandle,
        tasks: &CancellationToken,
        background: &mut Background,
    ) -> Result<()> {
        let client = Arc::new(
            CloudClient::new(
                self.config.cloud.clone(),
                self.uuid.clone(),
                Arc::clone(&self.deps.http),
                Arc::clone(&self.deps.clock),
            )
            .with_watchdog(watchdog.clone()),
        );

        self.install_client_identity(&client, credentials, watchdog).await?;

        let mut registration =
            DeviceRegistration::new(client, &self.uuid, self.config.registration.clone());
        let secret = registration.ensure_registered(watchdog).await?;

        self.connect(session, &secret, watchdog).await?;

        let topics = TopicSet::new(&self.config.cloud.product_key, self.uuid.as_str());
        if let Err(e) = session.subscribe(&topics.subscriptions()).await {
            warn!(error = %e, "Command subscription failed, continuing without commands");
        }

        let publisher: Arc<dyn Publisher> = Arc::clone(session) as Arc<dyn Publisher>;
        let dispatcher = Dispatcher::new(Arc::clone(&self.deps.handler), publisher);
        background
            .tasks
            .push(("dispatcher", tokio::spawn(dispatcher.run(inbound, tasks.clone()))));

        self.consume(session, mailbox, &topics.measurepoint_post(), watchdog)
            .await
    }

    /// Steps 1-3: fresh key pair, signed certificate, credential install.
    async fn install_client_identity(
        &self,
        client: &Arc<CloudClient>,
        credentials: &CredentialStore,
        watchdog: &WatchdogHandle,
    ) -> Result<()> {
        let settings = IssuerSettings {
            algorithm: self.config.identity.key_algorithm,
            subject: self.config.identity.subject.clone(),
            valid_days: self.config.identity.cert_valid_days,
        };
        let authority: Arc<dyn CertificateAuthority> = Arc::clone(client) as _;
        let issuer = CertificateIssuer::new(
            authority,
            self.deps.entropy.as_ref(),
            settings,
            self.uuid.clone(),
            Arc::clone(&self.deps.clock),
            Arc::clone(&self.deps.store),
        )?;

        let issued = issuer
            .request_certificate(watchdog)
            .await
            .ok_or(AgentError::NoCertificate)?;

        let ca_path = &self.config.credentials.ca_cert_path;
        let ca_pem = tokio::fs::read_to_string(ca_path)
            .await
            .map_err(|e| AgentError::config_load(ca_path, e.to_string()))?;
        credentials.install(CA_CERTS_TAG, CredentialKind::CaCertificate, ca_pem)?;
        issued.install(credentials, CLIENT_CERTS_TAG)?;
        Ok(())
    }

    /// Steps 5-6.
    async fn connect(
        &self,
        session: &Arc<SessionManager>,
        secret: &DeviceSecret,
        watchdog: &WatchdogHandle,
    ) -> Result<()> {
        let timestamp = self.deps.clock.timestamp_ms_string();
        let session_credentials = SessionCredentials::derive(
            &self.uuid,
            &self.config.cloud.product_key,
            secret,
            &self.config.broker,
            &timestamp,
        );

        watchdog.feed();
        let result = session.connect(&session_credentials).await;
        watchdog.feed();
        result
    }

    /// Step 8: forwards produced readings to the broker.
    async fn consume(
        &self,
        session: &SessionManager,
        mut mailbox: MailboxReceiver,
        topic: &str,
        watchdog: &WatchdogHandle,
    ) -> Result<()> {
        let feed_every = (self.config.watchdog.window() / 2).max(Duration::from_millis(1));
        info!(topic, "Entering steady state");

        loop {
            let next = tokio::time::timeout(feed_every, mailbox.recv()).await;
            watchdog.feed();

            let payload = match next {
                Err(_) => continue,
                Ok(Ok(payload)) => payload,
                Ok(Err(AgentError::LengthMismatch { .. })) => continue,
                Ok(Err(e)) => return Err(e),
            };

            session.publish(topic, payload).await?;
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("uuid", &self.uuid)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::restart::CountingRestarter;
    use crate::services::watchdog::CountingWatchdog;
    use bytes::{Bytes, BytesMut};
    use decada_common::ManualClock;
    use decada_core::crypto::KeyAlgorithm;
    use decada_core::protocol::{Codec, Packet, PacketCodec, Publish};
    use decada_transport::mock::{
        MockHttpTransport, MockLink, MockReply, MockResolver, MockTransport, SequenceEntropy,
    };
    use decada_transport::HttpMethod;
    use std::net::{IpAddr, Ipv4Addr};

    const TOKEN_OK: &str = r#"{"data":{"accessToken":"tok-1"}}"#;
    const CERT_OK: &str = r#"{"data":{"cert":"-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n","certSN":"7f"}}"#;
    const DEVICE_OK: &str = r#"{"data":{"deviceSecret":"ds-1"}}"#;
    const UUID: &str = "000000010000000200000003";

    struct Harness {
        agent: Arc<Agent>,
        link: Arc<MockLink>,
        http: Arc<MockHttpTransport>,
        restarter: Arc<CountingRestarter>,
        shutdown: CancellationToken,
        _ca_dir: tempfile::TempDir,
    }

    fn config(ca_path: &str) -> AgentConfig {
        let mut config = AgentConfig::default();
        config.cloud.ou_id = "ou-1".into();
        config.cloud.access_key = "ak-1".into();
        config.cloud.access_secret = "as-1".into();
        config.cloud.product_key = "pk-1".into();
        config.credentials.ca_cert_path = ca_path.to_string();
        config.identity.key_algorithm = KeyAlgorithm::EcdsaP256;
        config.registration.backoff_ms = 1;
        config.session.loop_period_ms = 20;
        config.telemetry.period_secs = 1;
        config.watchdog.enabled = false;
        config
    }

    fn harness(http: MockHttpTransport) -> Harness {
        let ca_dir = tempfile::tempdir().unwrap();
        let ca_path = ca_dir.path().join("ca.pem");
        std::fs::write(&ca_path, "-----BEGIN CERTIFICATE-----\nCA\n-----END CERTIFICATE-----\n").unwrap();

        let transport = MockTransport::new();
        let link = transport.link();
        link.set_responder(|frame| match frame.first().map(|b| b >> 4) {
            Some(1) => vec![vec![0x20, 0x02, 0x00, 0x00]],
            Some(8) => vec![vec![0x90, 0x03, frame[2], frame[3], 0x00]],
            _ => Vec::new(),
        });

        let http = Arc::new(http);
        let restarter = Arc::new(CountingRestarter::default());
        let shutdown = CancellationToken::new();
        let deps = AgentDeps {
            http: http.clone(),
            resolver: Arc::new(
                MockResolver::new().with("mqtt.decada.gov.sg", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            ),
            transport: Arc::new(transport),
            entropy: Arc::new(SequenceEntropy::new()),
            clock: Arc::new(ManualClock::from_secs(1_700_000_000)),
            store: Arc::new(MemoryStore::new()),
            watchdog: Arc::new(CountingWatchdog::default()),
            supervisor: None,
            restarter: restarter.clone(),
            handler: Arc::new(SetPointTable::new(["chronos_s"])),
        };
        let agent = Agent::new(
            config(&ca_path.display().to_string()),
            DeviceUuid::from_words([1, 2, 3]),
            deps,
            shutdown.clone(),
        );
        Harness {
            agent: Arc::new(agent),
            link,
            http,
            restarter,
            shutdown,
            _ca_dir: ca_dir,
        }
    }

    fn cloud() -> MockHttpTransport {
        MockHttpTransport::new()
            .route(HttpMethod::Post, "/token/get", vec![MockReply::ok(TOKEN_OK)])
            .route(HttpMethod::Post, "/certificates", vec![MockReply::ok(CERT_OK)])
            .route(HttpMethod::Get, "/devices", vec![MockReply::ok(DEVICE_OK)])
    }

    fn spawn(h: &Harness) -> JoinHandle<Result<()>> {
        let agent = Arc::clone(&h.agent);
        tokio::spawn(async move { agent.run().await })
    }

    /// Collects written packets until `done` matches one of them.
    async fn wait_for_packet(link: &MockLink, seen: &mut Vec<Packet>, done: impl Fn(&Packet) -> bool) {
        let codec = PacketCodec::new();
        tokio::time::timeout(Duration::from_secs(20), async {
            loop {
                for frame in link.take_written() {
                    seen.push(codec.decode(&mut Bytes::from(frame)).unwrap());
                }
                if seen.iter().any(&done) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
    }

    fn is_post(packet: &Packet) -> bool {
        matches!(packet, Packet::Publish(p) if p.topic == format!("/sys/pk-1/{UUID}/thing/measurepoint/post"))
    }

    #[tokio::test]
    async fn test_boot_to_steady_state_publishes_reading() {
        let h = harness(cloud());
        let task = spawn(&h);

        let mut seen = Vec::new();
        wait_for_packet(&h.link, &mut seen, is_post).await;

        let Some(Packet::Connect(connect)) = seen.first() else {
            panic!("first packet must be CONNECT");
        };
        assert_eq!(connect.username.as_deref(), Some(format!("{UUID}&pk-1").as_str()));
        assert!(seen.iter().any(|p| matches!(
            p,
            Packet::Subscribe { topics, .. } if topics == &[format!("/sys/pk-1/{UUID}/thing/service/measurepoint/set")]
        )));

        let Some(Packet::Publish(post)) = seen.iter().find(|p| is_post(p)) else {
            unreachable!();
        };
        let json: serde_json::Value = serde_json::from_slice(&post.payload).unwrap();
        assert_eq!(json["params"]["measurepoints"]["chronos_s"], "1700000000");
        assert_eq!(json["id"], UUID);

        let creds = h.link.last_credentials().unwrap();
        assert!(creds.has_client_identity());
        assert_eq!(h.http.count(HttpMethod::Post, "/devices"), 0);

        h.shutdown.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(h.restarter.count(), 0);
        assert!(h.link.closed_by_client());
    }

    #[tokio::test]
    async fn test_publish_failure_restarts_once() {
        let h = harness(cloud());
        let task = spawn(&h);

        let mut seen = Vec::new();
        wait_for_packet(&h.link, &mut seen, is_post).await;
        h.link.set_fail_sends(true);

        let err = tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, AgentError::PublishFailed { .. }));
        assert_eq!(h.restarter.count(), 1);
    }

    #[tokio::test]
    async fn test_missing_certificate_restarts_before_connecting() {
        let http = MockHttpTransport::new()
            .route(HttpMethod::Post, "/token/get", vec![MockReply::ok(TOKEN_OK)])
            .route(HttpMethod::Post, "/certificates", vec![MockReply::ok(r#"{"data":{"certSN":"7f"}}"#)]);
        let h = harness(http);

        let err = h.agent.run().await.unwrap_err();
        assert!(matches!(err, AgentError::NoCertificate));
        assert_eq!(h.restarter.count(), 1);
        assert_eq!(h.link.opens(), 0);
        assert_eq!(h.http.count(HttpMethod::Get, "/devices"), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_restarts() {
        let h = harness(cloud());
        h.link.fail_next_opens(3);

        let err = h.agent.run().await.unwrap_err();
        assert!(matches!(err, AgentError::ConnectFailed { attempts: 3, .. }));
        assert_eq!(h.restarter.count(), 1);
    }

    #[tokio::test]
    async fn test_registers_new_device() {
        let http = MockHttpTransport::new()
            .route(HttpMethod::Post, "/token/get", vec![MockReply::ok(TOKEN_OK)])
            .route(HttpMethod::Post, "/certificates", vec![MockReply::ok(CERT_OK)])
            .route(HttpMethod::Get, "/devices", vec![MockReply::ok(r#"{"data":null}"#)])
            .route(
                HttpMethod::Post,
                "/devices",
                vec![MockReply::status(500, ""), MockReply::ok(DEVICE_OK)],
            );
        let h = harness(http);
        let task = spawn(&h);

        let mut seen = Vec::new();
        wait_for_packet(&h.link, &mut seen, |p| matches!(p, Packet::Connect(_))).await;
        assert_eq!(h.http.count(HttpMethod::Post, "/devices"), 2);

        h.shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_inbound_command_acknowledged() {
        let h = harness(cloud());
        let task = spawn(&h);

        let mut seen = Vec::new();
        wait_for_packet(&h.link, &mut seen, |p| matches!(p, Packet::Subscribe { .. })).await;

        let set_topic = format!("/sys/pk-1/{UUID}/thing/service/measurepoint/set");
        let mut buf = BytesMut::new();
        PacketCodec::new()
            .encode(
                &Packet::Publish(Publish::at_most_once(
                    set_topic.as_str(),
                    Bytes::from_static(br#"{"id":"9","method":"thing.service.measurepoint.set","version":"1.0","params":{"chronos_s":"5"}}"#),
                )),
                &mut buf,
            )
            .unwrap();
        h.link.inject(buf.to_vec());

        let reply_topic = format!("{set_topic}_reply");
        wait_for_packet(&h.link, &mut seen, |p| matches!(p, Packet::Publish(p) if p.topic == reply_topic)).await;

        h.shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_missing_cloud_credentials_not_restarted() {
        let h = harness(cloud());
        let mut config = h.agent.config.clone();
        config.cloud.access_key.clear();
        let deps = AgentDeps {
            http: h.http.clone(),
            resolver: Arc::new(MockResolver::new()),
            transport: Arc::new(MockTransport::new()),
            entropy: Arc::new(SequenceEntropy::new()),
            clock: Arc::new(ManualClock::from_secs(0)),
            store: Arc::new(MemoryStore::new()),
            watchdog: Arc::new(CountingWatchdog::default()),
            supervisor: None,
            restarter: h.restarter.clone(),
            handler: Arc::new(SetPointTable::default()),
        };
        let agent = Agent::new(config, DeviceUuid::from_words([1, 2, 3]), deps, CancellationToken::new());

        let err = agent.run().await.unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(h.restarter.count(), 0);
        assert_eq!(h.http.requests().len(), 0);
    }
}
