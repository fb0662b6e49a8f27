//! User-facing notices ("toasts") raised by catalog mutations.
//!
//! The coordinator only knows the [`Notifier`] trait. The admin server keeps
//! recent notices on a [`NoticeBoard`] so the products page can show them;
//! the CLI uses [`TracingNotifier`].

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// How many notices the board keeps.
const DEFAULT_NOTICE_CAPACITY: usize = 20;

/// Sink for success and error messages.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        info!(notice = %message, "Catalog notice");
    }

    fn error(&self, message: &str) {
        warn!(notice = %message, "Catalog error");
    }
}

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// One message shown to the admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Bounded list of the most recent notices, newest last.
#[derive(Debug)]
pub struct NoticeBoard {
    capacity: usize,
    notices: Mutex<VecDeque<Notice>>,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_NOTICE_CAPACITY)
    }
}

impl NoticeBoard {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            notices: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Snapshot of the board.
    #[must_use]
    pub fn recent(&self) -> Vec<Notice> {
        self.lock().iter().cloned().collect()
    }

    /// Remove and return every notice.
    pub fn drain(&self) -> Vec<Notice> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Notice>> {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, level: NoticeLevel, message: &str) {
        let mut notices = self.lock();
        if notices.len() == self.capacity {
            notices.pop_front();
        }
        notices.push_back(Notice {
            level,
            message: message.to_string(),
            at: Utc::now(),
        });
    }
}

impl Notifier for NoticeBoard {
    fn success(&self, message: &str) {
        TracingNotifier.success(message);
        self.push(NoticeLevel::Success, message);
    }

    fn error(&self, message: &str) {
        TracingNotifier.error(message);
        self.push(NoticeLevel::Error, message);
    }
}
