//! Scenario replay
//!
//! A scenario seeds the cache with records, then runs a list of mutations
//! through the engine. Each step answers from its own scripted responses; a
//! step whose script runs out echoes the payload back as the server record.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use resman_core::{
    CacheData, CacheEntry, CacheKey, ChannelNotifier, EngineConfig, Error, LogNotifier,
    MetricsSummary, MutationDescriptor, MutationEngine, MutationKind, Notification, Notifier,
    RecordId, RemoteError, RemoteOperation, ResourceRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A scenario file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    /// Records per resource type, seeded as an unfiltered list plus details
    #[serde(default)]
    pub seed: BTreeMap<String, Vec<ResourceRecord>>,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

/// One mutation to run
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioStep {
    pub kind: MutationKind,
    pub resource: String,
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub payload: ResourceRecord,
    /// Replies for successive remote attempts
    #[serde(default)]
    pub responses: Vec<ScriptedResponse>,
    #[serde(default)]
    pub success_message: Option<String>,
    #[serde(default)]
    pub failure_message: Option<String>,
}

/// A scripted remote reply: `{"ok": record}` or `{"err": {code, message}}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptedResponse {
    Ok(Option<ResourceRecord>),
    Err(RemoteError),
}

impl Scenario {
    /// Read a scenario from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    /// Parse a scenario from JSON text
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse scenario JSON")
    }
}

impl ScenarioStep {
    fn descriptor(&self) -> MutationDescriptor {
        let remote = ScriptedRemote::new(self.responses.iter().cloned());
        let mut descriptor = MutationDescriptor::new(
            self.kind,
            &self.resource,
            self.id.clone(),
            self.payload.clone(),
            remote,
        );
        if let Some(message) = &self.success_message {
            descriptor = descriptor.with_success_message(message.clone());
        }
        if let Some(message) = &self.failure_message {
            descriptor = descriptor.with_failure_message(message.clone());
        }
        descriptor
    }
}

/// Remote operation answering from a fixed script
pub struct ScriptedRemote {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    calls: AtomicU32,
}

impl ScriptedRemote {
    pub fn new(responses: impl IntoIterator<Item = ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of calls received so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteOperation for ScriptedRemote {
    async fn call(&self, payload: &ResourceRecord) -> Result<Option<ResourceRecord>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(ScriptedResponse::Ok(record)) => Ok(record),
            Some(ScriptedResponse::Err(err)) => Err(err),
            None => Ok(Some(payload.clone())),
        }
    }
}

/// Forwards notifications into the report channel and optionally the log
struct ScenarioNotifier {
    channel: ChannelNotifier,
    echo: bool,
}

impl Notifier for ScenarioNotifier {
    fn notify(&self, notification: Notification) {
        if self.echo {
            LogNotifier.notify(notification.clone());
        }
        self.channel.notify(notification);
    }
}

/// Result of one step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub operation: String,
    pub success: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a scenario run produced
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub steps: Vec<StepReport>,
    pub notifications: Vec<Notification>,
    pub cache: Vec<CacheEntry>,
    pub metrics: MetricsSummary,
}

impl ScenarioReport {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|step| !step.success).count()
    }
}

/// Run every step of `scenario` in order against a fresh engine
pub async fn run(
    scenario: &Scenario,
    config: EngineConfig,
    log_notifications: bool,
) -> Result<ScenarioReport> {
    let (channel, mut receiver) = ChannelNotifier::new(scenario.steps.len().max(1));
    let notifier = ScenarioNotifier {
        channel,
        echo: log_notifications,
    };
    let engine = MutationEngine::builder()
        .config(config)
        .notifier(Arc::new(notifier))
        .build()
        .context("Invalid engine configuration")?;

    seed(&engine, &scenario.seed);

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let descriptor = step.descriptor();
        let operation = descriptor.operation();
        debug!("step {index}: {operation}");

        let report = match engine.execute(descriptor).await {
            Ok(outcome) => StepReport {
                index,
                operation,
                success: true,
                attempts: outcome.attempts,
                id: outcome.id,
                error: None,
            },
            Err(err) => StepReport {
                index,
                operation,
                success: false,
                attempts: failed_attempts(&err),
                id: step.id.clone(),
                error: Some(err.to_string()),
            },
        };
        steps.push(report);
    }

    let mut notifications = Vec::new();
    while let Ok(notification) = receiver.try_recv() {
        notifications.push(notification);
    }

    Ok(ScenarioReport {
        steps,
        notifications,
        cache: engine.store().entries(),
        metrics: engine.metrics().summary(),
    })
}

fn seed(engine: &MutationEngine, seed: &BTreeMap<String, Vec<ResourceRecord>>) {
    let store = engine.store();
    for (resource_type, records) in seed {
        store.set(
            CacheKey::list(resource_type, Vec::<(String, String)>::new()),
            CacheData::List(records.clone()),
        );
        for record in records {
            if let Some(id) = record.id() {
                store.set(
                    CacheKey::detail(resource_type, id),
                    CacheData::Item(record.clone()),
                );
            }
        }
    }
}

fn failed_attempts(err: &Error) -> u32 {
    match err {
        Error::Mutation(err) => err.attempts(),
        Error::Remote(_) => 1,
        Error::Config(_) => 0,
    }
}
