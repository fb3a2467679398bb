//! Scripted registry adapters and a pipeline harness.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use kyb_config::KybConfig;
use kyb_core::entities::{Counterparty, MonitoringJob, NewCounterparty};
use kyb_core::enums::Source;
use kyb_core::record::NormalizedRecord;
use kyb_db::KybService;
use kyb_monitor::{Clock, Monitor, Scheduler};
use kyb_registry::{AdapterError, AdapterRegistry, Identifier, RegistryAdapter};
use tokio::sync::Notify;

/// Clock moved only by the test and by adapter latency.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(at)))
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// One scripted registry answer.
#[derive(Clone)]
pub enum Reply {
    Record(NormalizedRecord),
    Unavailable,
    Format,
    RateLimited(u64),
    Invalid,
    /// Sleep longer than any test timeout, then answer.
    Hang(NormalizedRecord),
    /// Wait for the gate to open, then answer.
    Gate(Arc<Notify>, NormalizedRecord),
}

pub struct FakeAdapter {
    source: Source,
    min_interval: Duration,
    timeout: Duration,
    script: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Reply>,
    calls: AtomicUsize,
    latency: Option<(Arc<ManualClock>, TimeDelta)>,
}

impl FakeAdapter {
    pub fn new(source: Source, fallback: NormalizedRecord) -> Self {
        Self {
            source,
            min_interval: Duration::ZERO,
            timeout: Duration::from_secs(5),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Reply::Record(fallback)),
            calls: AtomicUsize::new(0),
            latency: None,
        }
    }

    /// Each fetch moves `clock` forward by `by`.
    #[must_use]
    pub fn with_latency(mut self, clock: Arc<ManualClock>, by: TimeDelta) -> Self {
        self.latency = Some((clock, by));
        self
    }

    #[must_use]
    pub const fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Queue replies; once drained the fallback answers.
    pub fn script(&self, replies: impl IntoIterator<Item = Reply>) {
        self.script.lock().unwrap().extend(replies);
    }

    pub fn set_fallback(&self, reply: Reply) {
        *self.fallback.lock().unwrap() = reply;
    }

    /// Remote calls made (identifier validation passed).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Reply {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }
}

#[async_trait]
impl RegistryAdapter for FakeAdapter {
    fn source(&self) -> Source {
        self.source
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn validate(&self, identifier: &Identifier) -> Result<(), AdapterError> {
        identifier.validate()
    }

    async fn fetch(&self, identifier: &Identifier) -> Result<NormalizedRecord, AdapterError> {
        self.validate(identifier)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((clock, by)) = &self.latency {
            clock.advance(*by);
        }
        match self.next_reply() {
            Reply::Record(record) => Ok(record),
            Reply::Unavailable => Err(AdapterError::SourceUnavailable("HTTP 503".into())),
            Reply::Format => Err(AdapterError::SourceFormat("missing isValid".into())),
            Reply::RateLimited(secs) => Err(AdapterError::RateLimited {
                retry_after_secs: secs,
            }),
            Reply::Invalid => Err(AdapterError::InvalidIdentifier("INVALID_INPUT".into())),
            Reply::Hang(record) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(record)
            }
            Reply::Gate(gate, record) => {
                gate.notified().await;
                Ok(record)
            }
        }
    }
}

pub fn vies(valid: bool) -> NormalizedRecord {
    NormalizedRecord::new()
        .with("valid", valid)
        .with("name", "ACME GMBH")
        .with("address", "HAUPTSTR. 1, 10115 BERLIN")
        .with("country_code", "DE")
        .with("vat_number", "123456789")
}

pub fn gleif(status: &str) -> NormalizedRecord {
    NormalizedRecord::new()
        .with("status", status)
        .with("legal_name", "ACME GmbH")
        .with("entity_category", "GENERAL")
        .with("entity_status", "ACTIVE")
        .with("country", "DE")
}

pub fn sanctions(matched: bool, score: f64) -> NormalizedRecord {
    let record = NormalizedRecord::new()
        .with("matched", matched)
        .with("match_score", score);
    if matched {
        record
            .with("list_name", "EU")
            .with("matched_name", "ACME GmbH")
            .with("entry_id", "eu-fsf-1234")
    } else {
        record
            .with("list_name", serde_json::Value::Null)
            .with("matched_name", serde_json::Value::Null)
            .with("entry_id", serde_json::Value::Null)
    }
}

pub fn insolvency(active: bool) -> NormalizedRecord {
    let record = NormalizedRecord::new().with("proceeding_active", active);
    if active {
        record
            .with("case_number", "36s IN 1234/26")
            .with("court", "AG Charlottenburg")
            .with("proceeding_type", "Eröffnung")
    } else {
        record
    }
}

fn clean_reply(source: Source) -> NormalizedRecord {
    match source {
        Source::Vies => vies(true),
        Source::Gleif => gleif("ISSUED"),
        Source::InsolvencyDe => insolvency(false),
        Source::SanctionsEu | Source::SanctionsOfac | Source::SanctionsUk => sanctions(false, 0.0),
    }
}

pub struct Harness {
    pub monitor: Arc<Monitor>,
    pub scheduler: Scheduler,
    pub fakes: HashMap<Source, Arc<FakeAdapter>>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(KybConfig::default(), |adapter| adapter).await
    }

    /// Build with a config and a hook to customize each fake.
    pub async fn with(config: KybConfig, customize: impl Fn(FakeAdapter) -> FakeAdapter) -> Self {
        let mut registry = AdapterRegistry::new();
        let mut fakes = HashMap::new();
        for source in Source::ALL {
            let fake = Arc::new(customize(FakeAdapter::new(source, clean_reply(source))));
            registry.insert(fake.clone());
            fakes.insert(source, fake);
        }
        let service = KybService::new_local(":memory:").await.unwrap();
        let monitor = Arc::new(Monitor::new(Arc::new(service), registry, config));
        let scheduler = Scheduler::new(monitor.clone());
        Self {
            monitor,
            scheduler,
            fakes,
        }
    }

    pub fn fake(&self, source: Source) -> &FakeAdapter {
        &self.fakes[&source]
    }

    pub fn service(&self) -> &KybService {
        self.monitor.service()
    }

    pub async fn register(&self, vat: Option<&str>, lei: Option<&str>, now: DateTime<Utc>) -> Counterparty {
        let new = NewCounterparty {
            display_name: "ACME GmbH".into(),
            country_code: "DE".into(),
            vat_number: vat.map(String::from),
            lei_code: lei.map(String::from),
        };
        self.monitor
            .register_counterparty("tenant-a", &new, now)
            .await
            .unwrap()
            .counterparty
    }

    pub async fn job(&self, counterparty_id: &str, source: Source) -> MonitoringJob {
        self.service()
            .find_job(counterparty_id, source)
            .await
            .unwrap()
            .unwrap()
    }

    /// Tick at the moment the job becomes due.
    pub async fn run_when_due(&self, counterparty_id: &str, source: Source) -> kyb_monitor::TickReport {
        let due = self.job(counterparty_id, source).await.next_due_at;
        self.scheduler.tick(due).await
    }

    pub async fn counterparty(&self, id: &str) -> Counterparty {
        self.service().get_counterparty(id).await.unwrap()
    }
}

pub fn t0() -> DateTime<Utc> {
    "2026-03-02T08:00:00Z".parse().unwrap()
}
