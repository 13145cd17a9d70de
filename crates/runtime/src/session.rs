use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::events::{EventSender, SearchEvent, StatusKind};
use crate::ticker::TickerSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Idle,
    Running,
    Cancelled,
    Succeeded,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Succeeded | Self::Failed)
    }
}

/// Point-in-time copy of a session, safe to hand out of the lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub query: String,
    pub source_scope: Vec<String>,
    pub status: SessionStatus,
    pub elapsed_seconds: u64,
    pub progress_count: u64,
    pub cancel_requested: bool,
    pub started_at: DateTime<Utc>,
}

/// One search request from start to its terminal state.
///
/// Lives behind a `tokio::sync::Mutex`; every event is published while that
/// lock is held, so a session that has left `Running` can never publish
/// again.
pub struct SearchSession {
    pub(crate) id: Uuid,
    pub(crate) query: String,
    pub(crate) source_scope: Vec<String>,
    pub(crate) status: SessionStatus,
    pub(crate) elapsed_seconds: u64,
    pub(crate) progress_count: u64,
    pub(crate) cancel_requested: bool,
    started_at: DateTime<Utc>,
    tickers: TickerSet,
    events: EventSender,
}

impl SearchSession {
    pub(crate) fn new(query: String, source_scope: Vec<String>, events: EventSender) -> Self {
        Self {
            id: Uuid::new_v4(),
            query,
            source_scope,
            status: SessionStatus::Running,
            elapsed_seconds: 0,
            progress_count: 0,
            cancel_requested: false,
            started_at: Utc::now(),
            tickers: TickerSet::default(),
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            query: self.query.clone(),
            source_scope: self.source_scope.clone(),
            status: self.status,
            elapsed_seconds: self.elapsed_seconds,
            progress_count: self.progress_count,
            cancel_requested: self.cancel_requested,
            started_at: self.started_at,
        }
    }

    pub(crate) fn attach_tickers(&mut self, tickers: TickerSet) {
        self.tickers = tickers;
    }

    pub(crate) fn emit(&self, event: SearchEvent) {
        // A dropped receiver just means nobody is rendering anymore.
        if self.events.send(event).is_err() {
            debug!(session = %self.id, "event receiver gone");
        }
    }

    pub(crate) fn emit_status(&self, kind: StatusKind, message: &str) {
        self.emit(SearchEvent::Status {
            session: self.id,
            kind,
            message: message.to_string(),
        });
    }

    pub(crate) fn emit_progress(&self) {
        self.emit(SearchEvent::Progress {
            session: self.id,
            elapsed_seconds: self.elapsed_seconds,
            progress_count: self.progress_count,
        });
    }

    /// Move to a terminal status: stop the tickers, then restore the idle
    /// affordance.  Returns `false` if the session already finished.
    pub(crate) fn finish(&mut self, status: SessionStatus) -> bool {
        debug_assert!(status.is_terminal());
        if !self.is_running() {
            return false;
        }
        self.tickers.stop();
        self.status = status;
        debug!(session = %self.id, ?status, elapsed = self.elapsed_seconds, "search finished");
        self.emit(SearchEvent::Idle { session: self.id });
        true
    }
}
