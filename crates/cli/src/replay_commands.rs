//! `courier replay`: run recorded deliveries through the intake dispatcher.
//!
//! Input is newline-delimited JSON, one delivery per line:
//!
//! ```json
//! {"attributes": {"priority": "10", "google.message_id": "m1"}, "payload": {"image": "https://..."}, "ordered": true}
//! ```
//!
//! Each line produces one JSON record on stdout. Execution channels only log
//! what they would have done.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex},
};

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    courier_config::CourierConfig,
    courier_intake::{
        AdmissionRejected, Channels, ConsensusResult, ConsensusSignal, ConsumerId, DispatchOutcome,
        DispatchSettings, Dispatcher, EventRelay, FallbackWorker, HostEnvironment,
        InMemoryConsumerRegistry, InlineProcessor, JobAdmission, NormalizeError, OrderedDelivery,
        PayloadNormalizer, ProcessedResult, RawEvent, ScheduledJob, TaskPayload, UnorderedDelivery,
        WorkerRejection, disable_competing_consumers, event::RECEIVE_ACTION,
    },
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tracing::{debug, info, warn},
};

/// Attribute carrying the transport's message id, used for duplicate checks.
const MESSAGE_ID_KEY: &str = "google.message_id";
/// Payload key that marks a message as belonging to courier's own domain.
const DOMAIN_MARKER: &str = "courier";
/// Payload keys whose URL values must be fetched before display.
const REMOTE_KEYS: &[&str] = &["image", "media_url", "icon"];
/// Payload flag for messages that are fully handled on arrival.
const SILENT_KEY: &str = "silent";

/// One recorded delivery.
#[derive(Debug, Deserialize)]
pub struct ReplayEvent {
    #[serde(default = "receive_action")]
    action: String,
    #[serde(default)]
    attributes: Option<HashMap<String, String>>,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    ordered: bool,
}

fn receive_action() -> String {
    RECEIVE_ACTION.into()
}

impl ReplayEvent {
    fn into_raw(self) -> (RawEvent, bool) {
        let payload = match self.payload {
            Value::Null => Vec::new(),
            Value::String(s) => s.into_bytes(),
            other => other.to_string().into_bytes(),
        };
        let event = RawEvent {
            action: self.action,
            attributes: self.attributes,
            payload: payload.into(),
        };
        (event, self.ordered)
    }
}

/// Output record for one input line.
#[derive(Debug, Serialize)]
pub struct ReplayRecord {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DispatchOutcome>,
    /// What an ordered delivery was told; absent for unordered ones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signaled: Option<ConsensusResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ── Collaborators ───────────────────────────────────────────────────────────

/// Normalizer for replayed JSON payloads. Remembers message ids it has seen.
#[derive(Default)]
pub struct ReplayNormalizer {
    seen: Mutex<HashSet<String>>,
}

impl ReplayNormalizer {
    fn body(event: &RawEvent) -> Result<serde_json::Map<String, Value>, NormalizeError> {
        if event.payload.is_empty() {
            return Ok(serde_json::Map::new());
        }
        match serde_json::from_slice::<Value>(&event.payload)? {
            Value::Object(map) => Ok(map),
            _ => Err(NormalizeError::Unrecognized),
        }
    }
}

#[async_trait]
impl PayloadNormalizer for ReplayNormalizer {
    async fn normalize(&self, event: &RawEvent) -> Result<ProcessedResult, NormalizeError> {
        let body = Self::body(event)?;
        let is_duplicate = match event.attribute(MESSAGE_ID_KEY) {
            Some(id) => {
                let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
                !seen.insert(id.to_string())
            },
            None => false,
        };
        let needs_remote_resource = REMOTE_KEYS.iter().any(|key| {
            body.get(*key)
                .and_then(Value::as_str)
                .is_some_and(|url| url.starts_with("http://") || url.starts_with("https://"))
        });
        let silent = body.get(SILENT_KEY).and_then(Value::as_bool).unwrap_or(false);

        Ok(ProcessedResult {
            is_duplicate,
            has_competing_consumer: false,
            fully_handled: is_duplicate || silent,
            needs_remote_resource,
            is_domain_payload: body.contains_key(DOMAIN_MARKER),
        })
    }

    async fn canonical_payload(&self, event: &RawEvent) -> Result<Value, NormalizeError> {
        Ok(serde_json::json!({
            "attributes": event.attributes,
            "data": Self::body(event)?,
        }))
    }
}

/// Channels that log the hand-off instead of running anything.
pub struct LoggingChannels;

#[async_trait]
impl InlineProcessor for LoggingChannels {
    async fn process(&self, task: &TaskPayload) -> Result<()> {
        info!(timestamp = task.timestamp, payload = %task.json_payload, "processed inline");
        Ok(())
    }
}

#[async_trait]
impl JobAdmission for LoggingChannels {
    async fn schedule(&self, job: ScheduledJob) -> Result<(), AdmissionRejected> {
        info!(task_id = job.task_id, deadline = ?job.deadline, "scheduled job admitted");
        Ok(())
    }
}

#[async_trait]
impl FallbackWorker for LoggingChannels {
    async fn start(&self, task: &TaskPayload) -> Result<(), WorkerRejection> {
        info!(timestamp = task.timestamp, "fallback worker started");
        Ok(())
    }
}

struct LoggingRelay;

#[async_trait]
impl EventRelay for LoggingRelay {
    async fn relay(&self, event: &RawEvent) -> Result<()> {
        debug!(action = %event.action, bytes = event.payload.len(), "relayed to proxied listeners");
        Ok(())
    }
}

// ── Command ─────────────────────────────────────────────────────────────────

/// Options for `courier replay`.
pub struct ReplayOptions<'a> {
    pub file: &'a Path,
    /// Other consumer ids to register as competing.
    pub competitors: Vec<String>,
    /// Disable registered competitors before replaying.
    pub disable_competitors: bool,
}

/// Build a dispatcher from `config` with replay collaborators.
pub async fn build_dispatcher(
    config: &CourierConfig,
    host: HostEnvironment,
    competitors: &[String],
    disable_competitors: bool,
) -> Result<Dispatcher> {
    let own_id = ConsumerId::new(config.intake.consumer_id.clone());
    let registry = Arc::new(InMemoryConsumerRegistry::new(own_id.clone()));
    registry.register(own_id.clone());
    for id in competitors {
        registry.register(ConsumerId::new(id.as_str()));
    }
    if disable_competitors {
        let disabled = disable_competing_consumers(registry.as_ref(), &own_id).await?;
        info!(disabled, "competing consumers disabled");
    }

    let channels = Arc::new(LoggingChannels);
    let inline: Arc<dyn InlineProcessor> = channels.clone();
    let jobs: Arc<dyn JobAdmission> = channels.clone();
    let worker: Arc<dyn FallbackWorker> = channels;

    Ok(Dispatcher::new(
        DispatchSettings::from(&config.intake),
        host,
        Arc::new(ReplayNormalizer::default()),
        Channels::new(inline, jobs, worker),
    )
    .with_consumer_registry(registry)
    .with_relay(Arc::new(LoggingRelay)))
}

/// Dispatch every line of `input` in order.
pub async fn replay(dispatcher: &Dispatcher, input: &str) -> Vec<ReplayRecord> {
    let mut records = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: ReplayEvent = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping unreadable line");
                records.push(ReplayRecord {
                    line: line_no,
                    outcome: None,
                    signaled: None,
                    error: Some(format!("invalid event: {e}")),
                });
                continue;
            },
        };
        let (event, ordered) = parsed.into_raw();

        let ordered_signal = OrderedDelivery::new();
        let signal: &dyn ConsensusSignal = if ordered {
            &ordered_signal
        } else {
            &UnorderedDelivery
        };
        let result = dispatcher.dispatch(&event, signal).await;
        let signaled = ordered.then(|| ordered_signal.result()).flatten();

        records.push(match result {
            Ok(outcome) => ReplayRecord {
                line: line_no,
                outcome: Some(outcome),
                signaled,
                error: None,
            },
            Err(e) => ReplayRecord {
                line: line_no,
                outcome: None,
                signaled,
                error: Some(e.to_string()),
            },
        });
    }
    records
}

pub async fn handle_replay(config: &CourierConfig, options: ReplayOptions<'_>) -> Result<()> {
    let host = *HostEnvironment::init(config.intake.platform_version);
    let dispatcher = build_dispatcher(
        config,
        host,
        &options.competitors,
        options.disable_competitors,
    )
    .await?;

    let input = tokio::fs::read_to_string(options.file)
        .await
        .with_context(|| format!("failed to read {}", options.file.display()))?;

    let records = replay(&dispatcher, &input).await;
    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    info!(events = records.len(), "replay finished");
    Ok(())
}
