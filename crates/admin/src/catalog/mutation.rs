//! Lifecycle of a single optimistic mutation.
//!
//! ```text
//! Idle -> Speculating -> SettledSuccess -> Reconciled
//!                     \-> SettledFailure -/
//! ```
//!
//! `Reconciled` means the authoritative refresh was requested, not that it
//! has completed.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

/// Which write a mutation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    /// Message shown when the remote error carries none.
    #[must_use]
    pub const fn failure_message(&self) -> &'static str {
        match self {
            Self::Create => "Failed to create product",
            Self::Update => "Failed to update product",
            Self::Delete => "Failed to delete product",
        }
    }

    /// Message shown when the remote call succeeds.
    #[must_use]
    pub const fn success_message(&self) -> &'static str {
        match self {
            Self::Create => "Product created",
            Self::Update => "Product updated",
            Self::Delete => "Product removed",
        }
    }

    pub(crate) const COUNT: usize = 3;

    /// Position of this kind in per-kind counters.
    pub(crate) const fn slot(self) -> usize {
        match self {
            Self::Create => 0,
            Self::Update => 1,
            Self::Delete => 2,
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Where a mutation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    Idle,
    Speculating,
    SettledSuccess,
    SettledFailure,
    Reconciled,
}

impl MutationStatus {
    /// Whether `self -> next` is a legal step.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Speculating)
                | (Self::Speculating, Self::SettledSuccess | Self::SettledFailure)
                | (Self::SettledSuccess | Self::SettledFailure, Self::Reconciled)
        )
    }

    /// Whether the remote call has resolved.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(
            self,
            Self::SettledSuccess | Self::SettledFailure | Self::Reconciled
        )
    }
}

/// Identity and status of one mutation instance.
#[derive(Debug, Clone)]
pub struct MutationState {
    id: Uuid,
    kind: MutationKind,
    status: MutationStatus,
}

impl MutationState {
    #[must_use]
    pub fn new(kind: MutationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status: MutationStatus::Idle,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> MutationKind {
        self.kind
    }

    #[must_use]
    pub const fn status(&self) -> MutationStatus {
        self.status
    }

    /// Move to `next`. Illegal steps are logged and ignored.
    pub fn advance(&mut self, next: MutationStatus) -> bool {
        if !self.status.can_advance_to(next) {
            warn!(
                mutation_id = %self.id,
                kind = %self.kind,
                from = ?self.status,
                to = ?next,
                "Ignoring illegal mutation transition"
            );
            return false;
        }
        debug!(
            mutation_id = %self.id,
            kind = %self.kind,
            from = ?self.status,
            to = ?next,
            "Mutation transition"
        );
        self.status = next;
        true
    }
}
