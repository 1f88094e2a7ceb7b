//! Mutation bookkeeping: one record per invocation.

use crate::options::MutationOptions;
use crate::state::{MutationState, MutationStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use openq_core::QueryKey;
use std::sync::{Arc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// One mutation invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub id: Uuid,
    pub key: QueryKey,
    pub status: MutationStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Every mutation invocation made through a client.
///
/// Invocations never share a record, even when key and variables are equal.
/// Settled records stay until [`remove_settled`](Self::remove_settled) or
/// [`clear`](Self::clear); an invocation dropped before it settles removes
/// its own record.
#[derive(Clone, Default)]
pub struct MutationCache {
    records: Arc<DashMap<Uuid, MutationRecord>>,
}

impl MutationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending invocation and return its ID
    pub(crate) fn register(&self, key: &QueryKey) -> Uuid {
        let id = Uuid::new_v4();
        self.records.insert(
            id,
            MutationRecord {
                id,
                key: key.clone(),
                status: MutationStatus::Pending,
                submitted_at: Utc::now(),
            },
        );
        id
    }

    pub(crate) fn update(&self, id: Uuid, status: MutationStatus) {
        if let Some(mut record) = self.records.get_mut(&id) {
            record.status = status;
        }
    }

    pub(crate) fn remove(&self, id: Uuid) {
        self.records.remove(&id);
    }

    pub fn get(&self, id: Uuid) -> Option<MutationRecord> {
        self.records.get(&id).map(|r| r.clone())
    }

    /// Records under `key`, oldest first
    pub fn find_all(&self, key: &QueryKey) -> Vec<MutationRecord> {
        let mut records: Vec<MutationRecord> = self
            .records
            .iter()
            .filter(|r| &r.key == key)
            .map(|r| r.clone())
            .collect();
        records.sort_by_key(|r| r.submitted_at);
        records
    }

    /// Number of invocations still running
    pub fn pending(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == MutationStatus::Pending)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record that is no longer pending. Returns how many were dropped.
    pub fn remove_settled(&self) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, record| record.status == MutationStatus::Pending);
        before.saturating_sub(self.records.len())
    }

    pub fn clear(&self) {
        self.records.clear();
    }
}

struct Latest<V, T, E> {
    id: Option<Uuid>,
    state: MutationState<V, T, E>,
}

/// Forgets an invocation whose future is dropped before it settles.
struct Unsettled<'a, V, T, E> {
    id: Uuid,
    cache: &'a MutationCache,
    latest: &'a RwLock<Latest<V, T, E>>,
    settled: bool,
}

impl<V, T, E> Drop for Unsettled<'_, V, T, E> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        debug!("Mutation {} dropped before settling", self.id);
        self.cache.remove(self.id);
        let mut latest = self.latest.write().unwrap();
        if latest.id == Some(self.id) {
            latest.id = None;
            latest.state = MutationState::default();
        }
    }
}

/// Runs a mutation and tracks its most recent invocation.
pub struct MutationObserver<V, T, E> {
    options: MutationOptions<V, T, E>,
    cache: MutationCache,
    latest: Arc<RwLock<Latest<V, T, E>>>,
}

impl<V, T, E> MutationObserver<V, T, E>
where
    V: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(options: MutationOptions<V, T, E>, cache: MutationCache) -> Self {
        Self {
            options,
            cache,
            latest: Arc::new(RwLock::new(Latest {
                id: None,
                state: MutationState::default(),
            })),
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.options.key
    }

    /// Invoke the mutation with `variables`.
    pub async fn mutate(&self, variables: V) -> Result<T, E> {
        let id = self.cache.register(&self.options.key);
        debug!("Mutation {} started for {}", id, self.options.key);

        {
            let mut latest = self.latest.write().unwrap();
            latest.id = Some(id);
            latest.state = MutationState {
                status: MutationStatus::Pending,
                variables: Some(variables.clone()),
                data: None,
                error: None,
                submitted_at: Some(Utc::now()),
            };
        }

        let mut unsettled = Unsettled {
            id,
            cache: &self.cache,
            latest: &self.latest,
            settled: false,
        };
        let result = (self.options.mutation_fn)(variables.clone()).await;
        unsettled.settled = true;

        let status = match &result {
            Ok(data) => {
                if let Some(on_success) = &self.options.policy.on_success {
                    on_success(data, &variables);
                }
                MutationStatus::Success
            }
            Err(error) => {
                if let Some(on_error) = &self.options.policy.on_error {
                    on_error(error, &variables);
                }
                MutationStatus::Error
            }
        };
        self.cache.update(id, status);
        debug!("Mutation {} finished: {:?}", id, status);

        let mut latest = self.latest.write().unwrap();
        if latest.id == Some(id) {
            latest.state.status = status;
            match &result {
                Ok(data) => latest.state.data = Some(data.clone()),
                Err(error) => latest.state.error = Some(error.clone()),
            }
        }

        result
    }

    /// State of the most recent invocation.
    pub fn state(&self) -> MutationState<V, T, E> {
        self.latest.read().unwrap().state.clone()
    }

    /// Forget the most recent invocation; a still running one no longer updates the state.
    pub fn reset(&self) {
        let mut latest = self.latest.write().unwrap();
        latest.id = None;
        latest.state = MutationState::default();
    }
}
