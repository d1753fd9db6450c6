//! Typed errors for the dispatcher.

use thiserror::Error;

use crate::dispatcher::DispatchToken;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// `dispatch` was called while another action was still being applied.
    #[error("cannot dispatch {action_type:?} in the middle of a dispatch")]
    AlreadyDispatching { action_type: String },

    /// A registered handler failed; the remaining handlers were skipped.
    #[error("handler {token} failed on {action_type:?}: {source}")]
    Handler {
        token: DispatchToken,
        action_type: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// The underlying handler failure, for callers that want to downcast it.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            DispatchError::Handler { source, .. } => Some(source),
            DispatchError::AlreadyDispatching { .. } => None,
        }
    }
}

pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
