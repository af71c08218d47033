//! In-crate fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::bus::{Broker, Message, Subscription};
use crate::discovery::{InstanceId, MemoryRegistry, Registry};
use crate::error::Error;
use crate::gateway::{UserConnection, UserConnector, UserDetails, UserDirectory, UserRecord};
use crate::notification::{EmailMessage, Mailer, Sender, TaskNotifier};

/// Polls `check` for up to two seconds.
pub(crate) async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Shared buffer receiving formatted log lines.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Routes this thread's events into a fresh buffer until the guard drops.
    pub(crate) fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    /// Everything logged so far.
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// One-shot HTTP server answering the first request with a canned response.
///
/// Returns the bound address and a handle yielding the raw request text.
#[cfg(feature = "http")]
pub(crate) async fn serve_once(
    status: &'static str,
    body: &'static str,
) -> (String, tokio::task::JoinHandle<String>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut chunk = [0_u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(end) = text.find("\r\n\r\n") {
                let expected = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= end + 4 + expected {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
        String::from_utf8_lossy(&raw).into_owned()
    });
    (addr, handle)
}

/// [`MemoryRegistry`] with switchable failures and call counters.
pub(crate) struct FlakyRegistry {
    inner: MemoryRegistry,
    fail_register: AtomicBool,
    fail_deregister: AtomicBool,
    hang_deregister: AtomicBool,
    fail_resolve: AtomicBool,
    fail_health: AtomicBool,
    hang_health: AtomicBool,
    deregistrations: AtomicUsize,
    health_reports: AtomicUsize,
}

impl FlakyRegistry {
    pub(crate) fn new(inner: MemoryRegistry) -> Self {
        Self {
            inner,
            fail_register: AtomicBool::new(false),
            fail_deregister: AtomicBool::new(false),
            hang_deregister: AtomicBool::new(false),
            fail_resolve: AtomicBool::new(false),
            fail_health: AtomicBool::new(false),
            hang_health: AtomicBool::new(false),
            deregistrations: AtomicUsize::new(0),
            health_reports: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_register(&self, on: bool) {
        self.fail_register.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_deregister(&self, on: bool) {
        self.fail_deregister.store(on, Ordering::SeqCst);
    }

    pub(crate) fn hang_deregister(&self, on: bool) {
        self.hang_deregister.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_resolve(&self, on: bool) {
        self.fail_resolve.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_health(&self, on: bool) {
        self.fail_health.store(on, Ordering::SeqCst);
    }

    pub(crate) fn hang_health(&self, on: bool) {
        self.hang_health.store(on, Ordering::SeqCst);
    }

    /// Deregistration attempts, successful or not.
    pub(crate) fn deregistrations(&self) -> usize {
        self.deregistrations.load(Ordering::SeqCst)
    }

    /// Health report attempts, successful or not.
    pub(crate) fn health_reports(&self) -> usize {
        self.health_reports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for FlakyRegistry {
    async fn register(
        &self,
        instance_id: &InstanceId,
        service_name: &str,
        address: &str,
    ) -> Result<(), Error> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(Error::transport("registry", "connection refused"));
        }
        self.inner.register(instance_id, service_name, address).await
    }

    async fn deregister(&self, instance_id: &InstanceId, service_name: &str) -> Result<(), Error> {
        self.deregistrations.fetch_add(1, Ordering::SeqCst);
        if self.hang_deregister.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_deregister.load(Ordering::SeqCst) {
            return Err(Error::transport("registry", "connection refused"));
        }
        self.inner.deregister(instance_id, service_name).await
    }

    async fn service_addresses(&self, service_name: &str) -> Result<Vec<String>, Error> {
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(Error::transport("registry", "connection refused"));
        }
        self.inner.service_addresses(service_name).await
    }

    async fn report_health_state(
        &self,
        _instance_id: &InstanceId,
        _service_name: &str,
    ) -> Result<(), Error> {
        self.health_reports.fetch_add(1, Ordering::SeqCst);
        if self.hang_health.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(Error::transport("registry", "connection refused"));
        }
        Ok(())
    }
}

/// User service double answering from a fixed table.
#[derive(Default)]
pub(crate) struct ScriptedConnector {
    users: Mutex<HashMap<String, UserRecord>>,
    connected: Mutex<Vec<String>>,
    open: Arc<AtomicUsize>,
    fail_connect: AtomicBool,
    fail_calls: AtomicBool,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_user(&self, id: &str, username: &str, email: &str) {
        self.users.lock().unwrap().insert(
            id.to_string(),
            UserRecord {
                username: username.to_string(),
                email: email.to_string(),
            },
        );
    }

    pub(crate) fn fail_connect(&self, on: bool) {
        self.fail_connect.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_calls(&self, on: bool) {
        self.fail_calls.store(on, Ordering::SeqCst);
    }

    /// Addresses of every connection attempt, in order.
    pub(crate) fn connected(&self) -> Vec<String> {
        self.connected.lock().unwrap().clone()
    }

    /// Connections opened and not yet closed.
    pub(crate) fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserConnector for ScriptedConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn UserConnection>, Error> {
        self.connected.lock().unwrap().push(address.to_string());
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::transport(address, "connection refused"));
        }
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConnection {
            users: self.users.lock().unwrap().clone(),
            fail: self.fail_calls.load(Ordering::SeqCst),
            open: self.open.clone(),
            closed: false,
        }))
    }
}

struct ScriptedConnection {
    users: HashMap<String, UserRecord>,
    fail: bool,
    open: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl UserConnection for ScriptedConnection {
    async fn get_by_id(&mut self, user_id: &str) -> Result<Option<UserRecord>, Error> {
        if self.fail {
            return Err(Error::transport("user service", "internal error"));
        }
        Ok(self.users.get(user_id).cloned())
    }

    async fn close(&mut self) -> Result<(), Error> {
        if !self.closed {
            self.closed = true;
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Sender recording every attempt.
#[derive(Default)]
pub(crate) struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingSender {
    /// Attempts as `(recipient, message)`, failed ones included.
    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn fail(&self, on: bool) {
        self.fail.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl Sender for RecordingSender {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), Error> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Delivery {
                recipient: recipient.to_string(),
                reason: "mailbox unavailable".into(),
            });
        }
        Ok(())
    }
}

/// Mailer keeping delivered messages in memory.
#[derive(Default)]
pub(crate) struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub(crate) fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn fail(&self, on: bool) {
        self.fail.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::transport("relay", "connection refused"));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Directory over a fixed set of users.
pub(crate) struct StaticDirectory {
    users: HashMap<Uuid, UserDetails>,
}

impl StaticDirectory {
    pub(crate) fn with(user: UserDetails) -> Self {
        Self {
            users: HashMap::from([(user.user_id, user)]),
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            users: HashMap::new(),
        }
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn get_user_details(&self, user_id: Uuid) -> Result<UserDetails, Error> {
        self.users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("user {user_id}")))
    }
}

/// Notifier recording calls, optionally forwarding to a real one.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    calls: Mutex<Vec<(Uuid, Uuid)>>,
    outcomes: Mutex<Vec<Result<(), &'static str>>>,
    inner: Option<Arc<dyn TaskNotifier>>,
    gate: Option<Arc<Semaphore>>,
    fail_next: AtomicUsize,
    panic_next: AtomicBool,
}

impl RecordingNotifier {
    /// Forwards every call to `inner` and records the root-cause label of its outcome.
    pub(crate) fn wrapping(inner: Arc<dyn TaskNotifier>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::default()
        }
    }

    /// Every call waits for one permit of the returned semaphore before completing.
    pub(crate) fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let notifier = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (notifier, gate)
    }

    /// The next `n` calls fail with a delivery error.
    pub(crate) fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// The next call panics.
    pub(crate) fn panic_next(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    /// Calls as `(user_id, task_id)`, in arrival order.
    pub(crate) fn calls(&self) -> Vec<(Uuid, Uuid)> {
        self.calls.lock().unwrap().clone()
    }

    /// Outcomes of completed calls.
    pub(crate) fn outcomes(&self) -> Vec<Result<(), &'static str>> {
        self.outcomes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskNotifier for RecordingNotifier {
    async fn notify_user_to_complete_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<(), Error> {
        self.calls.lock().unwrap().push((user_id, task_id));

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("notifier exploded");
        }

        let res = if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            Err(Error::Delivery {
                recipient: user_id.to_string(),
                reason: "mailbox unavailable".into(),
            })
        } else if let Some(inner) = &self.inner {
            inner.notify_user_to_complete_task(user_id, task_id).await
        } else {
            Ok(())
        };

        self.outcomes
            .lock()
            .unwrap()
            .push(res.as_ref().map(|_| ()).map_err(|e| e.root_cause().as_label()));
        res
    }
}

/// How a [`StalledBroker`] subscription behaves on confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stall {
    /// Never confirms.
    Hang,
    /// Confirmation is rejected.
    Reject,
}

/// Broker whose subscriptions never become active.
pub(crate) struct StalledBroker {
    mode: Stall,
    releases: Arc<AtomicUsize>,
}

impl StalledBroker {
    pub(crate) fn new(mode: Stall) -> Self {
        Self {
            mode,
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many subscriptions were closed.
    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broker for StalledBroker {
    async fn publish(&self, _topic: &str, _payload: &str) -> Result<usize, Error> {
        Ok(0)
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>, Error> {
        Ok(Box::new(StalledSubscription {
            topic: topic.to_string(),
            mode: self.mode,
            releases: self.releases.clone(),
        }))
    }
}

struct StalledSubscription {
    topic: String,
    mode: Stall,
    releases: Arc<AtomicUsize>,
}

#[async_trait]
impl Subscription for StalledSubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn confirm(&mut self) -> Result<(), Error> {
        match self.mode {
            Stall::Hang => std::future::pending().await,
            Stall::Reject => Err(Error::not_found(format!("topic {}", self.topic))),
        }
    }

    async fn next_message(&mut self) -> Option<Message> {
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
