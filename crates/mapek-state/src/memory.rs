//! In-process store with the same key layout as the shared Redis store.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use mapek_protocol::{keys, ExecutionInterval, SubjectId};

use crate::store::{CurrentExecutionRaw, ExecutionStore, StoreError};

#[derive(Default)]
struct Inner {
    strings: HashMap<String, String>,
    lists: HashMap<String, VecDeque<String>>,
}

/// String and list keys held in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, key: &str, value: impl ToString) {
        self.lock().strings.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().strings.get(key).cloned()
    }

    pub fn del(&self, key: &str) {
        let mut inner = self.lock();
        inner.strings.remove(key);
        inner.lists.remove(key);
    }

    pub fn rpush(&self, key: &str, value: impl ToString) {
        self.lock()
            .lists
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_string());
    }

    pub fn lpush(&self, key: &str, value: impl ToString) {
        self.lock()
            .lists
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
    }

    /// Whole list, front to back.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.lock()
            .lists
            .get(key)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Keep only the first `len` elements.
    pub fn truncate_list(&self, key: &str, len: usize) {
        if let Some(list) = self.lock().lists.get_mut(key) {
            list.truncate(len);
        }
    }

    /// Register a device and its nodes the way the producer does.
    pub fn add_subject(&self, subject: &SubjectId) {
        if !self.list(keys::DEVICES_LIST).contains(&subject.device) {
            self.rpush(keys::DEVICES_LIST, &subject.device);
        }
        let nodes_key = keys::device_nodes(&subject.device);
        if !self.list(&nodes_key).contains(&subject.node) {
            self.rpush(&nodes_key, &subject.node);
        }
    }

    fn subjects_now(&self) -> Vec<SubjectId> {
        self.list(keys::DEVICES_LIST)
            .into_iter()
            .flat_map(|device| {
                self.list(&keys::device_nodes(&device))
                    .into_iter()
                    .map(move |node| SubjectId::new(device.clone(), node))
            })
            .collect()
    }

    fn current_now(&self, subject: &SubjectId) -> CurrentExecutionRaw {
        let status = self.get(&keys::status(subject));
        if let Some(start) = self.get(&keys::start_execution(subject)) {
            return CurrentExecutionRaw {
                execution_time: self.get(&keys::execution_time(subject)),
                start_execution: Some(start),
                status,
            };
        }
        CurrentExecutionRaw {
            execution_time: self.get(&keys::legacy_execution_time(&subject.node)),
            start_execution: self.get(&keys::legacy_start_execution(&subject.node)),
            status,
        }
    }
}

impl ExecutionStore for MemoryStore {
    fn subjects(&self) -> impl Future<Output = Result<Vec<SubjectId>, StoreError>> + Send {
        std::future::ready(Ok(self.subjects_now()))
    }

    fn execution_history(
        &self,
        subject: &SubjectId,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send {
        std::future::ready(Ok(self.list(&keys::execution_history(subject))))
    }

    fn current_execution(
        &self,
        subject: &SubjectId,
    ) -> impl Future<Output = Result<CurrentExecutionRaw, StoreError>> + Send {
        std::future::ready(Ok(self.current_now(subject)))
    }

    fn push_history(
        &self,
        interval: &ExecutionInterval,
        cap: usize,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        let result = interval
            .encode_history_entry()
            .map_err(|e| StoreError::Encoding(e.to_string()))
            .map(|entry| {
                let key = keys::execution_history(&interval.subject);
                self.lpush(&key, entry);
                self.truncate_list(&key, cap);
            });
        std::future::ready(result)
    }
}
