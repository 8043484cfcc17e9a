//! Read/write surface the timeline aggregator needs from the shared store.

use std::future::Future;

use mapek_protocol::{ExecutionInterval, SubjectId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store transport error: {0}")]
    Transport(String),
    #[error("store encoding error: {0}")]
    Encoding(String),
}

/// Current-execution fields exactly as read from the store.
///
/// Values stay unparsed so a malformed field only costs its own subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentExecutionRaw {
    pub execution_time: Option<String>,
    pub start_execution: Option<String>,
    pub status: Option<String>,
}

pub trait ExecutionStore: Send + Sync {
    /// Every known device/node pair.
    fn subjects(&self) -> impl Future<Output = Result<Vec<SubjectId>, StoreError>> + Send;

    /// Stored history entries, newest first.
    fn execution_history(
        &self,
        subject: &SubjectId,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Current-execution pair, namespaced keys first, legacy keys second.
    fn current_execution(
        &self,
        subject: &SubjectId,
    ) -> impl Future<Output = Result<CurrentExecutionRaw, StoreError>> + Send;

    /// Push `interval` to the front of the subject's history and trim it to `cap`.
    fn push_history(
        &self,
        interval: &ExecutionInterval,
        cap: usize,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
