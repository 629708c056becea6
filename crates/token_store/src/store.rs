use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::TokenStoreError;
use crate::policy::TokenPolicy;
use crate::record::{CredentialRecord, TokenStoreEvent};

pub(crate) type Subscriber = Box<dyn Fn(&TokenStoreEvent) + Send + Sync>;

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub records: BTreeMap<String, CredentialRecord>,
    pub last_active: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    last_active: Option<String>,
    records: Vec<CredentialRecord>,
}

/// Keyed map of backend-service credentials.
///
/// One instance is injected into every call site that needs a token; there
/// is no process-global store. Mutations persist to disk (when a path is
/// configured) and notify subscribers. Refresh/verify upkeep lives in
/// `refresh.rs` and serializes in-flight work per service id.
pub struct TokenStore {
    path: Option<PathBuf>,
    policy: TokenPolicy,
    pub(crate) state: Mutex<StoreState>,
    subscribers: Mutex<Vec<Subscriber>>,
    pub(crate) refreshing: Mutex<HashSet<String>>,
    pub(crate) last_checked: Mutex<HashMap<String, OffsetDateTime>>,
}

impl TokenStore {
    /// Store backed by a JSON document at `path`. A missing file starts an
    /// empty store; a corrupt one is a construction-time error.
    pub fn open(path: &Path, policy: TokenPolicy) -> Result<Self, TokenStoreError> {
        let state = match fs::read_to_string(path) {
            Ok(raw) => {
                let document: StoreDocument = serde_json::from_str(&raw).map_err(|source| {
                    TokenStoreError::Parse {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                if document.version != 1 {
                    return Err(TokenStoreError::UnsupportedVersion {
                        path: path.to_path_buf(),
                        found: document.version,
                    });
                }
                StoreState {
                    records: document
                        .records
                        .into_iter()
                        .map(|record| (record.service_id.clone(), record))
                        .collect(),
                    last_active: document.last_active,
                }
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(source) => {
                return Err(TokenStoreError::io("reading token store", path, source));
            }
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            policy,
            state: Mutex::new(state),
            subscribers: Mutex::new(Vec::new()),
            refreshing: Mutex::new(HashSet::new()),
            last_checked: Mutex::new(HashMap::new()),
        })
    }

    /// Volatile store for tests and short-lived surfaces.
    #[must_use]
    pub fn in_memory(policy: TokenPolicy) -> Self {
        Self {
            path: None,
            policy,
            state: Mutex::new(StoreState::default()),
            subscribers: Mutex::new(Vec::new()),
            refreshing: Mutex::new(HashSet::new()),
            last_checked: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    #[must_use]
    pub fn get(&self, service_id: &str) -> Option<CredentialRecord> {
        lock_unpoisoned(&self.state).records.get(service_id).cloned()
    }

    #[must_use]
    pub fn service_ids(&self) -> Vec<String> {
        lock_unpoisoned(&self.state).records.keys().cloned().collect()
    }

    /// UI convenience pointer; carries no correctness obligation.
    #[must_use]
    pub fn last_active(&self) -> Option<String> {
        lock_unpoisoned(&self.state).last_active.clone()
    }

    /// Upsert by service id and move the last-active pointer to it.
    pub fn set(&self, record: CredentialRecord) -> Result<(), TokenStoreError> {
        let service_id = record.service_id.clone();
        {
            let mut state = lock_unpoisoned(&self.state);
            state.last_active = Some(service_id.clone());
            state.records.insert(service_id.clone(), record);
        }
        self.save()?;
        self.notify(&TokenStoreEvent::Updated { service_id });
        Ok(())
    }

    /// Delete the record; clears the last-active pointer when it pointed at
    /// the removed id. Returns whether a record existed.
    pub fn remove(&self, service_id: &str) -> Result<bool, TokenStoreError> {
        let removed = {
            let mut state = lock_unpoisoned(&self.state);
            let removed = state.records.remove(service_id).is_some();
            if removed && state.last_active.as_deref() == Some(service_id) {
                state.last_active = None;
            }
            removed
        };

        if removed {
            self.save()?;
            self.notify(&TokenStoreEvent::Removed {
                service_id: service_id.to_owned(),
            });
        }
        Ok(removed)
    }

    /// Hard-ceiling expiry check against the current clock.
    #[must_use]
    pub fn is_expired(&self, record: &CredentialRecord) -> bool {
        self.policy.is_expired(record, OffsetDateTime::now_utc())
    }

    /// Soft-threshold refresh-ahead check against the current clock.
    #[must_use]
    pub fn should_refresh(&self, record: &CredentialRecord) -> bool {
        self.policy.should_refresh(record, OffsetDateTime::now_utc())
    }

    /// Register a mutation observer. Callbacks run synchronously after each
    /// applied mutation, outside the state lock.
    pub fn subscribe(&self, subscriber: impl Fn(&TokenStoreEvent) + Send + Sync + 'static) {
        lock_unpoisoned(&self.subscribers).push(Box::new(subscriber));
    }

    pub(crate) fn notify(&self, event: &TokenStoreEvent) {
        let subscribers = lock_unpoisoned(&self.subscribers);
        for subscriber in subscribers.iter() {
            subscriber(event);
        }
    }

    pub(crate) fn save(&self) -> Result<(), TokenStoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let document = {
            let state = lock_unpoisoned(&self.state);
            StoreDocument {
                version: 1,
                last_active: state.last_active.clone(),
                records: state.records.values().cloned().collect(),
            }
        };

        let raw = serde_json::to_string_pretty(&document).map_err(|source| {
            TokenStoreError::Serialize {
                path: path.clone(),
                source,
            }
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| TokenStoreError::io("creating token store dir", parent, source))?;
        }
        fs::write(path, raw)
            .map_err(|source| TokenStoreError::io("writing token store", path, source))
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
