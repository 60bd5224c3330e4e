//! Optimization job lifecycle: validate, submit, poll and enrich.
//!
//! A job moves `validating -> submitted -> running -> {done, error}`. The first
//! two steps happen synchronously inside [`JobController::submit`]; everything
//! after is observed only by polling. There is no cancellation call on the
//! solver side: a caller that loses interest simply stops polling.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::cache::SubmissionMetadata;
use crate::enrich::{enrich_status, EnrichedStatus};
use crate::error::{DataAccessError, SolverLogicError, SubmitError, TransportError};
use crate::model::{FleetSnapshot, OrderId, WarehouseId};
use crate::ortools::SolverConfig;
use crate::payload::{prepare_run, OptimizationPayload, PayloadOptions, PreparedRun};
use crate::traits::{FleetDataSource, MetadataCache, SolverTransport};
use crate::validation::{validate_payload, ValidationIssue};

/// Coarse lifecycle state of a job as seen by callers.
///
/// Validation runs inside [`JobController::submit`] and is never observable,
/// so it has no state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Submitted,
    Running,
    Done,
    Error,
}

/// Where a failed job went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The caller passed something unusable, e.g. an empty job id.
    Input,
    /// Timeout, connection failure or non-success HTTP status.
    Transport,
    /// The solver answered, but not with anything we can read.
    SolverLogic,
    /// The solver reported the job itself as failed.
    Solver,
}

/// One stop on a vehicle route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub location_index: usize,
    /// Cumulative load on arrival.
    #[serde(default)]
    pub load: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An order the solver left unrouted, either as a bare index or with details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnassignedOrder {
    Index(usize),
    Detailed {
        order_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_id: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl UnassignedOrder {
    /// Position in the payload's order array.
    pub fn order_index(&self) -> usize {
        match self {
            Self::Index(index) => *index,
            Self::Detailed { order_index, .. } => *order_index,
        }
    }
}

/// Per-vehicle summary some solver strategies return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDetail {
    pub vehicle_id: usize,
    #[serde(default)]
    pub route: Vec<RouteStop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_load: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct ResultView {
    #[serde(default)]
    routes: Vec<Vec<RouteStop>>,
    #[serde(default)]
    unassigned_orders: Vec<UnassignedOrder>,
    #[serde(default)]
    route_details: Option<Vec<RouteDetail>>,
}

/// Terminal solver output.
///
/// Serializes as exactly the JSON the solver sent. The typed accessors are a
/// read-only view decoded from that JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverResult {
    raw: Value,
    view: ResultView,
}

impl SolverResult {
    /// Decode the typed view of a raw `result` object, keeping the original.
    pub fn from_value(raw: Value) -> Result<Self, serde_json::Error> {
        if !raw.is_object() {
            return Err(serde_json::Error::custom("solver result is not an object"));
        }
        let view = ResultView::deserialize(&raw)?;
        Ok(Self { raw, view })
    }

    /// The result exactly as the solver sent it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    pub fn routes(&self) -> &[Vec<RouteStop>] {
        &self.view.routes
    }

    pub fn unassigned_orders(&self) -> &[UnassignedOrder] {
        &self.view.unassigned_orders
    }

    pub fn route_details(&self) -> Option<&[RouteDetail]> {
        self.view.route_details.as_deref()
    }

    /// Stop sequences per vehicle, from `routes` or else from `route_details`.
    pub fn stop_sequences(&self) -> Vec<&[RouteStop]> {
        if !self.view.routes.is_empty() {
            return self.view.routes.iter().map(Vec::as_slice).collect();
        }
        self.view
            .route_details
            .iter()
            .flatten()
            .map(|detail| detail.route.as_slice())
            .collect()
    }
}

impl Serialize for SolverResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SolverResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Self::from_value(raw).map_err(D::Error::custom)
    }
}

/// Job status as decoded from the solver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Running {
        progress: u8,
    },
    Done {
        result: SolverResult,
        /// Advisory; absent when the cache lost or never had the entry.
        metadata: Option<SubmissionMetadata>,
    },
    Error {
        message: String,
        kind: FailureKind,
    },
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
}

fn text_of(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

fn progress_of(progress: Option<f64>) -> u8 {
    progress
        .filter(|value| value.is_finite())
        .map_or(0, |value| value.clamp(0.0, 100.0).round() as u8)
}

impl JobStatus {
    pub fn state(&self) -> JobState {
        match self {
            Self::Submitted => JobState::Submitted,
            Self::Running { .. } => JobState::Running,
            Self::Done { .. } => JobState::Done,
            Self::Error { .. } => JobState::Error,
        }
    }

    pub fn progress(&self) -> u8 {
        match self {
            Self::Submitted => 0,
            Self::Running { progress } => *progress,
            Self::Done { .. } | Self::Error { .. } => 100,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    fn logic_error(error: SolverLogicError) -> Self {
        tracing::error!(error = %error, "solver returned an unusable status");
        Self::Error {
            message: error.to_string(),
            kind: FailureKind::SolverLogic,
        }
    }

    /// Decode a status response body. Never fails: anything unreadable
    /// becomes an [`JobStatus::Error`] with [`FailureKind::SolverLogic`].
    pub fn from_solver(body: Value) -> Self {
        let body: StatusBody = match serde_json::from_value(body) {
            Ok(body) => body,
            Err(err) => {
                return Self::logic_error(SolverLogicError::MalformedResult {
                    message: err.to_string(),
                });
            }
        };

        let Some(status) = body.status else {
            return Self::logic_error(SolverLogicError::UnknownStatus {
                status: "<missing>".to_string(),
            });
        };

        match status.trim().to_ascii_lowercase().as_str() {
            "submitted" | "queued" | "pending" => Self::Submitted,
            "running" | "processing" => Self::Running {
                progress: progress_of(body.progress),
            },
            "done" | "completed" => match body.result {
                Some(result) if !result.is_null() => match SolverResult::from_value(result) {
                    Ok(result) => Self::Done {
                        result,
                        metadata: None,
                    },
                    Err(err) => Self::logic_error(SolverLogicError::MalformedResult {
                        message: err.to_string(),
                    }),
                },
                _ => Self::logic_error(SolverLogicError::MissingResult),
            },
            "error" | "failed" => Self::Error {
                message: text_of(body.error)
                    .or_else(|| text_of(body.message))
                    .unwrap_or_else(|| "solver reported an error".to_string()),
                kind: FailureKind::Solver,
            },
            _ => Self::logic_error(SolverLogicError::UnknownStatus { status }),
        }
    }
}

/// A job the solver accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    pub job_id: String,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    /// Non-fatal validation findings, e.g. orders with no line items.
    pub warnings: Vec<ValidationIssue>,
}

/// A submitted job together with the run it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub handle: JobHandle,
    pub run: PreparedRun,
}

/// Caller-facing answer to a submission: a job id, or no job id and an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResponse {
    pub job_id: Option<String>,
    pub status: JobState,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

impl SubmissionResponse {
    pub fn from_result(result: &Result<JobHandle, SubmitError>) -> Self {
        match result {
            Ok(handle) => Self {
                job_id: Some(handle.job_id.clone()),
                status: handle.state,
                error: None,
                issues: handle.warnings.clone(),
            },
            Err(err) => Self {
                job_id: None,
                status: JobState::Error,
                error: Some(err.to_string()),
                issues: match err {
                    SubmitError::Validation(validation) => validation.issues.clone(),
                    _ => Vec::new(),
                },
            },
        }
    }
}

/// Caller-facing answer to a poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResponse {
    pub status: JobState,
    pub progress: u8,
    pub result: Option<SolverResult>,
    pub error: Option<String>,
    pub metadata: Option<SubmissionMetadata>,
}

impl From<JobStatus> for PollResponse {
    fn from(status: JobStatus) -> Self {
        let state = status.state();
        let progress = status.progress();
        match status {
            JobStatus::Done { result, metadata } => Self {
                status: state,
                progress,
                result: Some(result),
                error: None,
                metadata,
            },
            JobStatus::Error { message, .. } => Self {
                status: state,
                progress,
                result: None,
                error: Some(message),
                metadata: None,
            },
            JobStatus::Submitted | JobStatus::Running { .. } => Self {
                status: state,
                progress,
                result: None,
                error: None,
                metadata: None,
            },
        }
    }
}

/// Solver liveness report from its health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverHealth {
    pub status: String,
    #[serde(default)]
    pub jobs_count: usize,
    #[serde(default)]
    pub active_jobs: usize,
}

fn extract_job_id(response: &Value) -> Option<String> {
    match response.get("job_id")? {
        Value::String(job_id) if !job_id.trim().is_empty() => Some(job_id.clone()),
        Value::Number(job_id) => Some(job_id.to_string()),
        _ => None,
    }
}

fn is_path_safe(job_id: &str) -> bool {
    !job_id.chars().all(|c| c == '.')
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Owns the submit/poll/enrich cycle against one solver.
///
/// Holds no per-job state of its own; every call is independent apart from
/// best-effort reads and writes of the metadata cache, so one controller can
/// serve concurrent callers.
#[derive(Debug)]
pub struct JobController<D, T, C> {
    data: D,
    transport: T,
    cache: C,
    config: SolverConfig,
}

impl<D, T, C> JobController<D, T, C>
where
    D: FleetDataSource,
    T: SolverTransport,
    C: MetadataCache,
{
    pub fn new(data: D, transport: T, cache: C, config: SolverConfig) -> Self {
        Self {
            data,
            transport,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Live snapshot of what the next optimization run would read.
    pub fn current_input(&self) -> Result<FleetSnapshot, DataAccessError> {
        self.data.snapshot()
    }

    /// Build the payload for the current snapshot without submitting it.
    pub fn prepare(&self, options: &PayloadOptions) -> Result<PreparedRun, SubmitError> {
        let snapshot = self.current_input()?;
        Ok(prepare_run(
            &snapshot.warehouses,
            &snapshot.inventory,
            &snapshot.orders,
            options,
        )?)
    }

    /// Build from the current snapshot and submit.
    pub fn dispatch(&self, options: &PayloadOptions) -> Result<Dispatch, SubmitError> {
        let run = self.prepare(options)?;
        let handle = self.submit_run(&run)?;
        Ok(Dispatch { handle, run })
    }

    /// Re-optimize only the selected orders of the current snapshot.
    pub fn dispatch_selected(
        &self,
        order_ids: &[OrderId],
        options: &PayloadOptions,
    ) -> Result<Dispatch, SubmitError> {
        let snapshot = self.current_input()?.restrict_to_orders(order_ids);
        let run = prepare_run(
            &snapshot.warehouses,
            &snapshot.inventory,
            &snapshot.orders,
            options,
        )?;
        let handle = self.submit_run(&run)?;
        Ok(Dispatch { handle, run })
    }

    /// Submit a prepared run, remembering its entity ids for enrichment.
    pub fn submit_run(&self, run: &PreparedRun) -> Result<JobHandle, SubmitError> {
        self.submit_with_ids(&run.payload, &run.warehouse_ids, &run.order_ids)
    }

    /// Validate and submit a bare payload.
    ///
    /// Validation failures never reach the solver. Metadata is cached only
    /// once the solver has issued a job id.
    pub fn submit(&self, payload: &OptimizationPayload) -> Result<JobHandle, SubmitError> {
        self.submit_with_ids(payload, &[], &[])
    }

    fn submit_with_ids(
        &self,
        payload: &OptimizationPayload,
        warehouse_ids: &[WarehouseId],
        order_ids: &[OrderId],
    ) -> Result<JobHandle, SubmitError> {
        let warnings = validate_payload(payload)
            .into_result()
            .inspect_err(|err| tracing::warn!(error = %err, "payload rejected before submission"))?;
        for warning in &warnings {
            tracing::warn!(%warning, "submitting payload with warning");
        }

        let body = serde_json::to_value(payload).map_err(|err| TransportError::Encode {
            message: err.to_string(),
        })?;
        let path = self.config.api.submit_path();
        let response = self
            .config
            .retry
            .run(|| self.transport.post_json(path, &body, self.config.submit_timeout))
            .map_err(|err| match err.into_solver_logic() {
                Ok(logic) => SubmitError::from(logic),
                Err(transport) => SubmitError::from(transport),
            })
            .inspect_err(|err| tracing::error!(error = %err, "solver submission failed"))?;

        let job_id = extract_job_id(&response)
            .ok_or_else(|| SolverLogicError::MissingJobId {
                body: response.to_string(),
            })
            .inspect_err(|err| tracing::error!(error = %err, "solver accepted request without a job"))?;

        let submitted_at = Utc::now();
        self.cache.put(
            &job_id,
            SubmissionMetadata {
                warehouses_count: payload.depot_count(),
                orders_count: payload.order_count(),
                submitted_at,
                warehouse_ids: warehouse_ids.to_vec(),
                order_ids: order_ids.to_vec(),
            },
            self.config.metadata_ttl,
        );
        tracing::info!(
            %job_id,
            depots = payload.depot_count(),
            orders = payload.order_count(),
            "optimization job submitted"
        );

        Ok(JobHandle {
            job_id,
            state: JobState::Submitted,
            submitted_at,
            warnings,
        })
    }

    /// Ask the solver where a job stands.
    ///
    /// Safe to call repeatedly and concurrently; the only side effect is a
    /// cache read when the job is done.
    pub fn poll(&self, job_id: &str) -> JobStatus {
        if !is_path_safe(job_id) {
            return JobStatus::Error {
                message: format!("invalid job id '{job_id}'"),
                kind: FailureKind::Input,
            };
        }

        let path = self.config.api.status_path(job_id);
        let status = match self
            .config
            .retry
            .run(|| self.transport.get_json(&path, self.config.poll_timeout))
        {
            Ok(body) => JobStatus::from_solver(body),
            Err(err) => match err.into_solver_logic() {
                Ok(logic) => JobStatus::logic_error(logic),
                Err(err) => {
                    tracing::error!(%job_id, error = %err, "solver status request failed");
                    JobStatus::Error {
                        message: err.to_string(),
                        kind: FailureKind::Transport,
                    }
                }
            },
        };
        tracing::debug!(%job_id, state = ?status.state(), progress = status.progress(), "polled job");

        match status {
            JobStatus::Done { result, .. } => JobStatus::Done {
                result,
                metadata: self.cache.get(job_id),
            },
            other => other,
        }
    }

    /// Attach current warehouse and order detail to a finished job.
    pub fn enrich(&self, status: JobStatus) -> EnrichedStatus {
        enrich_status(status, || self.data.snapshot())
    }

    /// [`Self::poll`] followed by [`Self::enrich`].
    pub fn poll_enriched(&self, job_id: &str) -> EnrichedStatus {
        self.enrich(self.poll(job_id))
    }

    /// Ask the solver's health endpoint whether it is up.
    pub fn solver_health(&self) -> Result<SolverHealth, TransportError> {
        let path = self.config.api.health_path();
        let body = self.transport.get_json(path, self.config.poll_timeout)?;
        serde_json::from_value(body).map_err(|err| TransportError::Decode {
            url: path.to_string(),
            message: err.to_string(),
        })
    }
}
