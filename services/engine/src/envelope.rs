//! Command envelope and execution result types.

use matching_engine::{CommandResult, OrderSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use types::order::{CancelOrderRequest, PlaceOrderRequest, QueryOrderRequest};

/// The kind of command carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandKind {
    Place,
    Cancel,
    Query,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Place => "PLACE",
            CommandKind::Cancel => "CANCEL",
            CommandKind::Query => "QUERY",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed command payload. The variant must agree with the envelope's kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandPayload {
    Place(PlaceOrderRequest),
    Cancel(CancelOrderRequest),
    Query(QueryOrderRequest),
}

impl CommandPayload {
    pub fn kind(&self) -> CommandKind {
        match self {
            CommandPayload::Place(_) => CommandKind::Place,
            CommandPayload::Cancel(_) => CommandKind::Cancel,
            CommandPayload::Query(_) => CommandKind::Query,
        }
    }
}

/// A command plus the metadata the dispatcher needs to route, deduplicate
/// and audit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub command_id: String,
    pub command_kind: CommandKind,
    /// Caller-provided token scoping retries of the same logical command.
    pub idempotency_key: String,
    pub symbol: String,
    pub account_id: String,
    /// SHA-256 over the canonical payload serialization.
    pub payload_fingerprint: String,
    pub payload: CommandPayload,
    /// Unix nanos, observational.
    pub created_at: i64,
}

/// Command execution error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    None,
    DuplicateRequest,
    InvalidArgument,
    InternalError,
    OrderNotFound,
    OrderAlreadyFilled,
    OrderAlreadyCanceled,
    Unauthorized,
}

/// Successful payload of a command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// Place/cancel: status changes, trades and events.
    Execution(CommandResult),
    /// Query: one order's snapshot.
    Order(OrderSnapshot),
}

impl CommandOutcome {
    pub fn as_execution(&self) -> Option<&CommandResult> {
        match self {
            CommandOutcome::Execution(result) => Some(result),
            CommandOutcome::Order(_) => None,
        }
    }

    pub fn as_order(&self) -> Option<&OrderSnapshot> {
        match self {
            CommandOutcome::Order(snapshot) => Some(snapshot),
            CommandOutcome::Execution(_) => None,
        }
    }
}

/// What the shard replies with for one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandExecResult {
    pub outcome: Option<CommandOutcome>,
    pub error_code: ErrorCode,
    pub error: Option<String>,
}

impl CommandExecResult {
    pub fn ok(outcome: CommandOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            error_code: ErrorCode::None,
            error: None,
        }
    }

    pub fn failed(error_code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            outcome: None,
            error_code,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error_code == ErrorCode::None
    }
}
