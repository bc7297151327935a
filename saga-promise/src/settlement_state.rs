use crate::action::AnyAction;
use crate::error::Rejection;
use crate::factory::PromiseAction;
use std::any::Any;

/// Lifecycle of a promise action family as seen by a reducer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Settlement<V> {
    Idle,
    Pending,
    Resolved { value: V },
    Rejected { error: Rejection },
}

impl<V> Settlement<V> {
    pub fn is_idle(&self) -> bool {
        matches!(self, Settlement::Idle)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Settlement::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Settlement::Resolved { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Settlement::Rejected { .. })
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Settlement::Resolved { .. } | Settlement::Rejected { .. })
    }

    pub fn value_ref(&self) -> Option<&V> {
        match self {
            Settlement::Resolved { value } => Some(value),
            _ => None,
        }
    }

    pub fn value(self) -> Option<V> {
        match self {
            Settlement::Resolved { value } => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Rejection> {
        match self {
            Settlement::Rejected { error } => Some(error),
            _ => None,
        }
    }

    pub fn resolved(value: V) -> Self {
        Settlement::Resolved { value }
    }

    pub fn rejected(error: Rejection) -> Self {
        Settlement::Rejected { error }
    }
}

impl<V> Settlement<V>
where
    V: Any + Clone + Send + Sync,
{
    /// Advances the lifecycle for `family`'s trigger and companion actions.
    /// Any other action leaves it unchanged.
    pub fn reduce<P, A>(self, family: &PromiseAction<V, P, A>, action: &AnyAction) -> Self
    where
        P: Any + Send + Sync,
    {
        if family.matches(action) {
            Settlement::Pending
        } else if let Some(value) = family.resolved().match_payload(action) {
            Settlement::resolved(value.clone())
        } else if let Some(error) = family.rejected().match_payload(action) {
            Settlement::rejected(error.clone())
        } else {
            self
        }
    }
}

impl<V> Default for Settlement<V> {
    fn default() -> Self {
        Settlement::Idle
    }
}
