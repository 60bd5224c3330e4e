//! Error taxonomy for payload building, submission and polling.

use serde::Serialize;
use thiserror::Error;

use crate::model::OrderId;
use crate::validation::ValidationIssue;

/// Input that makes an optimization run meaningless. Never submitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("no warehouses available for optimization")]
    NoWarehouses,

    #[error("no orders available for optimization")]
    NoOrders,

    #[error("all {excluded} orders lack client coordinates")]
    NoLocatableOrders { excluded: usize },

    #[error("{entity} {id} has malformed coordinates ({lat}, {lng})")]
    MalformedCoordinate {
        entity: &'static str,
        id: u64,
        lat: f64,
        lng: f64,
    },
}

/// Structural payload defects found before submission.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("payload failed validation: {}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The request never produced a usable HTTP success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// A success status whose body is not JSON. The controller reports this
    /// as [`SolverLogicError::UnreadableResponse`].
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("could not encode request body: {message}")]
    Encode { message: String },
}

/// The network worked but the solver answered with something unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverLogicError {
    #[error("solver response missing job_id: {body}")]
    MissingJobId { body: String },

    #[error("solver reported done without a result")]
    MissingResult,

    #[error("solver reported unknown status '{status}'")]
    UnknownStatus { status: String },

    #[error("solver result could not be decoded: {message}")]
    MalformedResult { message: String },

    #[error("solver at {url} answered with an unreadable body: {message}")]
    UnreadableResponse { url: String, message: String },
}

impl TransportError {
    /// Split off the one transport outcome where the solver did answer.
    pub fn into_solver_logic(self) -> Result<SolverLogicError, TransportError> {
        match self {
            Self::Decode { url, message } => Ok(SolverLogicError::UnreadableResponse { url, message }),
            other => Err(other),
        }
    }
}

/// The injected data-access collaborator failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("data access failed: {0}")]
pub struct DataAccessError(pub String);

/// Everything that can stop a submission.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    SolverLogic(#[from] SolverLogicError),

    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
}

/// Non-fatal data problems. Processing continues with a documented fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// Still included, with an all-zero demand vector.
    #[error("order {order_id} has no line items")]
    OrderWithoutItems { order_id: OrderId },

    /// Scored without a delivery-time bonus.
    #[error("order {order_id} has unparsable delivery time '{raw}'")]
    UnparsableDeliveryTime { order_id: OrderId, raw: String },

    /// Scored without a delivery-time bonus.
    #[error("order {order_id} has no delivery time")]
    MissingDeliveryTime { order_id: OrderId },

    /// Excluded from the payload.
    #[error("order {order_id} has no client coordinates")]
    UnlocatableOrder { order_id: OrderId },
}
