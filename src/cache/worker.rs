//! Cache worker lifecycle and its actor task.
//!
//! [`CacheWorker`] holds the lifecycle state machine. It is owned by a
//! spawned task and driven through a [`WorkerHandle`]; events are processed
//! one at a time, each to completion.

use super::network::{CacheRequest, CachedResponse, Network};
use super::storage::CacheStorage;
use super::{cache_name, CacheError};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Offline fallback served for failed navigations.
const OFFLINE_PAGE: &str = "/index.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Created, not installed yet.
    #[default]
    Parsed,
    Installing,
    /// Installed and waiting for activation.
    Installed,
    Active,
    /// Discarded after a failed install.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Worker state persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub version: String,
    pub state: WorkerState,
    pub skip_waiting: bool,
}

/// Messages accepted by the worker, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    SkipWaiting,
    GetVersion,
    CacheUrls { urls: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerReply {
    Version { version: String },
}

/// Static settings of a worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub origin: Url,
    pub version: String,
    pub preload: Vec<String>,
}

pub struct CacheWorker {
    storage: CacheStorage,
    network: Arc<dyn Network>,
    settings: WorkerSettings,
    state: WorkerState,
    skip_waiting: bool,
    clients_claimed: bool,
}

impl CacheWorker {
    /// Create a worker, resuming the persisted state of the same version.
    pub async fn load(
        storage: CacheStorage,
        network: Arc<dyn Network>,
        settings: WorkerSettings,
    ) -> Result<Self, CacheError> {
        let (state, skip_waiting) = match storage.load_registration().await? {
            Some(reg) if reg.version == settings.version => (reg.state, reg.skip_waiting),
            _ => (WorkerState::Parsed, false),
        };
        debug!("Cache worker {} starts {}", settings.version, state);

        Ok(Self {
            storage,
            network,
            settings,
            state,
            skip_waiting,
            clients_claimed: state == WorkerState::Active,
        })
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn version(&self) -> &str {
        &self.settings.version
    }

    pub fn cache_name(&self) -> String {
        cache_name(&self.settings.version)
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed
    }

    fn resolve(&self, input: &str) -> Result<Url, CacheError> {
        self.settings
            .origin
            .join(input)
            .map_err(|source| CacheError::InvalidUrl {
                input: input.to_string(),
                source,
            })
    }

    async fn persist(&self) -> Result<(), CacheError> {
        self.storage
            .save_registration(&Registration {
                version: self.settings.version.clone(),
                state: self.state,
                skip_waiting: self.skip_waiting,
            })
            .await
    }

    /// Fetch every URL and store all of them in the current bucket, or
    /// store nothing if any fetch fails or answers with a non-OK status.
    async fn add_all(&self, inputs: &[String]) -> Result<usize, CacheError> {
        let urls = inputs
            .iter()
            .map(|input| self.resolve(input))
            .collect::<Result<Vec<_>, _>>()?;

        let fetches = urls.iter().map(|url| async move {
            let response = self
                .network
                .fetch(&CacheRequest::get(url.clone()))
                .await
                .map_err(|e| CacheError::AddAll {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            if !response.ok() {
                return Err(CacheError::AddAll {
                    url: url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            Ok::<_, CacheError>((url, response))
        });

        let fetched = join_all(fetches)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let name = self.cache_name();
        let fresh = !self.storage.has(&name).await;
        self.storage.open(&name).await?;

        let mut written = Vec::with_capacity(fetched.len());
        for (url, response) in &fetched {
            written.push(url.as_str());
            if let Err(e) = self.storage.put(&name, url.as_str(), response).await {
                self.discard(&name, &written, fresh).await;
                return Err(e);
            }
        }
        Ok(fetched.len())
    }

    /// Undo a partially written `add_all`.
    async fn discard(&self, name: &str, written: &[&str], fresh: bool) {
        if fresh {
            if let Err(e) = self.storage.delete(name).await {
                warn!("Could not delete partial cache {}: {}", name, e);
            }
            return;
        }
        for url in written {
            if let Err(e) = self.storage.remove(name, url).await {
                warn!("Could not remove partial entry {}: {}", url, e);
            }
        }
    }

    /// Preload the static assets, then skip waiting.
    pub async fn install(&mut self) -> Result<(), CacheError> {
        if self.state == WorkerState::Redundant {
            return Err(CacheError::InvalidState {
                state: self.state,
                action: "install",
            });
        }

        info!("Installing cache {}", self.cache_name());
        self.state = WorkerState::Installing;

        let preload = self.settings.preload.clone();
        match self.add_all(&preload).await {
            Ok(count) => {
                info!("Cached {} static assets", count);
                self.state = WorkerState::Installed;
                self.skip_waiting = true;
                self.persist().await
            }
            Err(e) => {
                warn!("Cache install failed: {}", e);
                self.state = WorkerState::Redundant;
                Err(e)
            }
        }
    }

    /// Delete every bucket but the current one and take control.
    /// Returns the deleted bucket names.
    pub async fn activate(&mut self) -> Result<Vec<String>, CacheError> {
        match self.state {
            WorkerState::Active => {}
            WorkerState::Installed if self.skip_waiting => {}
            state => {
                return Err(CacheError::InvalidState {
                    state,
                    action: "activate",
                })
            }
        }

        let current = self.cache_name();
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if name != current {
                info!("Deleting old cache {}", name);
                self.storage.delete(&name).await?;
                deleted.push(name);
            }
        }

        self.state = WorkerState::Active;
        self.clients_claimed = true;
        self.persist().await?;
        info!("Cache {} active", current);
        Ok(deleted)
    }

    /// Install, then activate.
    pub async fn register(&mut self) -> Result<Vec<String>, CacheError> {
        self.install().await?;
        self.activate().await
    }

    /// Serve a request: cache first, then network.
    pub async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, CacheError> {
        if !request.is_get() || self.state != WorkerState::Active {
            return self.network.fetch(request).await;
        }

        let key = request.url.as_str();
        match self.storage.match_any(key).await {
            Ok(Some(hit)) => {
                debug!("Serving {} from cache", key);
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => warn!("Cache lookup for {} failed: {}", key, e),
        }

        debug!("Fetching {} from network", key);
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.cacheable() {
                    if let Err(e) = self.storage.put(&self.cache_name(), key, &response).await {
                        warn!("Could not cache {}: {}", key, e);
                    }
                }
                Ok(response)
            }
            Err(e) if request.navigate => {
                warn!("Fetch of {} failed: {}", key, e);
                let fallback = self.resolve(OFFLINE_PAGE)?;
                match self.storage.match_any(fallback.as_str()).await {
                    Ok(Some(page)) => Ok(page),
                    _ => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn message(&mut self, message: WorkerMessage) -> Result<Option<WorkerReply>, CacheError> {
        match message {
            WorkerMessage::SkipWaiting => {
                debug!("Received SKIP_WAITING");
                self.skip_waiting = true;
                if self.state == WorkerState::Installed {
                    self.activate().await?;
                }
                Ok(None)
            }
            WorkerMessage::GetVersion => Ok(Some(WorkerReply::Version {
                version: self.settings.version.clone(),
            })),
            WorkerMessage::CacheUrls { urls } => {
                let count = self.add_all(&urls).await?;
                info!("Cached {} URLs on request", count);
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

enum Event {
    Install(oneshot::Sender<Result<(), CacheError>>),
    Activate(oneshot::Sender<Result<Vec<String>, CacheError>>),
    Register(oneshot::Sender<Result<Vec<String>, CacheError>>),
    Fetch(CacheRequest, oneshot::Sender<Result<CachedResponse, CacheError>>),
    Message(
        WorkerMessage,
        oneshot::Sender<Result<Option<WorkerReply>, CacheError>>,
    ),
    State(oneshot::Sender<WorkerState>),
}

/// Mailbox handle to a running worker. Cloning shares the worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Event>,
}

impl WorkerHandle {
    /// Spawn the worker on its own task. The task ends once every handle
    /// is dropped and the in-flight event has finished.
    pub fn spawn(worker: CacheWorker) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(32);
        let task = tokio::spawn(run(worker, rx));
        (Self { tx }, task)
    }

    async fn call<T>(&self, event: impl FnOnce(oneshot::Sender<T>) -> Event) -> Result<T, CacheError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(event(reply_tx))
            .await
            .map_err(|_| CacheError::WorkerGone)?;
        reply_rx.await.map_err(|_| CacheError::WorkerGone)
    }

    pub async fn install(&self) -> Result<(), CacheError> {
        self.call(Event::Install).await?
    }

    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        self.call(Event::Activate).await?
    }

    /// Install, then activate, as one mailbox event.
    pub async fn register(&self) -> Result<Vec<String>, CacheError> {
        self.call(Event::Register).await?
    }

    pub async fn fetch(&self, request: CacheRequest) -> Result<CachedResponse, CacheError> {
        self.call(|reply| Event::Fetch(request, reply)).await?
    }

    pub async fn post_message(&self, message: WorkerMessage) -> Result<Option<WorkerReply>, CacheError> {
        self.call(|reply| Event::Message(message, reply)).await?
    }

    /// Post a JSON message; the reply, if any, comes back as JSON.
    pub async fn post_json(&self, json: &str) -> Result<Option<String>, CacheError> {
        let message: WorkerMessage = serde_json::from_str(json)?;
        match self.post_message(message).await? {
            Some(reply) => Ok(Some(serde_json::to_string(&reply)?)),
            None => Ok(None),
        }
    }

    pub async fn state(&self) -> Result<WorkerState, CacheError> {
        self.call(Event::State).await
    }
}

async fn run(mut worker: CacheWorker, mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        // A dropped reply receiver only means the caller stopped waiting.
        match event {
            Event::Install(reply) => {
                let _ = reply.send(worker.install().await);
            }
            Event::Activate(reply) => {
                let _ = reply.send(worker.activate().await);
            }
            Event::Register(reply) => {
                let _ = reply.send(worker.register().await);
            }
            Event::Fetch(request, reply) => {
                let _ = reply.send(worker.fetch(&request).await);
            }
            Event::Message(message, reply) => {
                let _ = reply.send(worker.message(message).await);
            }
            Event::State(reply) => {
                let _ = reply.send(worker.state());
            }
        }
    }
    debug!(
        "Cache worker {} stopped (controlling clients: {})",
        worker.version(),
        worker.clients_claimed()
    );
}
