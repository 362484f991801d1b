//! Request verbs and the per-request context threaded through a view.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumIter, EnumString};
use tokio_util::sync::CancellationToken;

/// The REST verbs a view serves.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Verb {
    Get,
    List,
    Watch,
    Create,
    Update,
    Delete,
    #[serde(rename = "deletecollection")]
    #[strum(serialize = "deletecollection")]
    DeleteCollection,
}

impl Verb {
    /// Verbs that change stored state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Verb::Create | Verb::Update | Verb::Delete | Verb::DeleteCollection
        )
    }
}

/// Who is asking, plus the request's cancellation signal.
///
/// The consumer is the workspace the request addresses through the view.
/// Cancelling the token tears down any watch opened under this context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    consumer: String,
    cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(consumer: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an existing cancellation token, e.g. one tied to a connection.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
