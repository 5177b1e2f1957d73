//! Defines the data transfer objects exchanged between the pipeline stages,
//! the stores, and the HTTP facade, so serialization stays consistent across
//! the stack.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// Job lifecycle states. Transitions are monotone along
/// `Received -> Queued -> Processing -> {Completed -> Approved | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Received,
    Queued,
    Processing,
    Completed,
    Failed,
    Approved,
}

/// Durable job record owned exclusively by the job state store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub filename: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub approved_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub ocr_conf_mean: Option<f64>,
    #[serde(default)]
    pub preview_ready: bool,
    #[serde(default)]
    pub csv_ready: bool,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Lighter-weight view returned by `GET /jobs/`.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub filename: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub error: Option<String>,
    pub ocr_conf_mean: Option<f64>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        JobSummary {
            job_id: job.job_id.clone(),
            status: job.status,
            filename: job.filename.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            error: job.error.clone(),
            ocr_conf_mean: job.ocr_conf_mean,
        }
    }
}

/// One line-delimited entry appended to the file queue on enqueue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub job_id: String,
    pub filename: String,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

/// Canonical output columns, in CSV/preview header order.
pub const CANONICAL_COLUMNS: [&str; 10] = [
    "DTMNFR",
    "ORGAO",
    "TIPO",
    "SIGLA",
    "SIMBOLO",
    "NOME_LISTA",
    "NUM_ORDEM",
    "NOME_CANDIDATO",
    "PARTIDO_PROPONENTE",
    "INDEPENDENTE",
];

/// A record as produced by the extractor, before normalization. Keyed by
/// canonical column name, plus two shadow fields carrying the pre-normalized
/// text the validator and normalizer need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub columns: HashMap<String, String>,
    #[serde(default)]
    pub raw_lista: String,
    #[serde(default)]
    pub raw_sigla: String,
}

impl RawRecord {
    pub fn get(&self, column: &str) -> &str {
        self.columns.get(column).map(|s| s.as_str()).unwrap_or("")
    }

    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        self.columns.insert(column.to_string(), value.into());
    }

    pub fn any_of(&self, columns: &[&str]) -> bool {
        columns.iter().any(|c| !self.get(c).is_empty())
    }
}

/// A fully normalized output row, one-to-one with a CSV line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub dtmnfr: String,
    pub orgao: String,
    pub tipo: String,
    pub sigla: String,
    pub simbolo: String,
    pub nome_lista: String,
    pub num_ordem: String,
    pub nome_candidato: String,
    pub partido_proponente: String,
    pub independente: String,
}

impl CanonicalRecord {
    /// Returns the row's fields in `CANONICAL_COLUMNS` order.
    pub fn as_columns(&self) -> [&str; 10] {
        [
            &self.dtmnfr,
            &self.orgao,
            &self.tipo,
            &self.sigla,
            &self.simbolo,
            &self.nome_lista,
            &self.num_ordem,
            &self.nome_candidato,
            &self.partido_proponente,
            &self.independente,
        ]
    }
}

/// Acronym catalogue entry. Stored one-per-file under the master directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterRecord {
    pub sigla: String,
    pub descricao: String,
    pub codigo: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MasterDataResponse {
    pub records: Vec<MasterRecord>,
}

/// Lifecycle state of a model registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Candidate,
    Production,
    Archived,
}

/// One append-only record in the versioned model registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    pub model_name: String,
    pub version: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub status: ModelStatus,
    #[serde(default)]
    pub metrics: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelHistoryResponse {
    pub items: Vec<ModelRecord>,
}

/// Per-field validation severity. Ordered `Ok < Aviso < Erro`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BadgeStatus {
    Ok,
    Aviso,
    Erro,
}

/// A single field's validation verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationBadge {
    pub field: String,
    pub status: BadgeStatus,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRow {
    pub columns: Vec<String>,
    pub validations: Vec<ValidationBadge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub job_id: String,
    pub headers: Vec<String>,
    pub rows: Vec<PreviewRow>,
    pub total_rows: usize,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalRequest {
    pub approver: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalResponse {
    pub job_id: String,
    pub approved: bool,
    pub approved_at: chrono::DateTime<chrono::Utc>,
    pub notes: Option<String>,
}

/// `meta.json` written alongside each approved artifact set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalMeta {
    pub job: Job,
    pub artifacts: ApprovalArtifacts,
    pub versions: ApprovalVersions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalArtifacts {
    pub csv: String,
    #[serde(default)]
    pub preview: Option<String>,
    pub incoming: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalVersions {
    pub model: ModelVersionRef,
    pub master_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersionRef {
    pub name: String,
    pub version: String,
    pub status: ModelStatus,
}

/// Event payload delivered to `result.approved` subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalEvent {
    pub meta: ApprovalMeta,
    pub path: String,
}

/// A single OCR'd line with a heuristic confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    pub confidence: f64,
}

/// One OCR line tagged with its section and original position.
#[derive(Debug, Clone)]
pub struct LayoutEntry {
    pub index: usize,
    pub content: String,
    pub section: Section,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    Body,
}

/// `Job` unique opaque id generator: 32 lowercase hex characters, matching
/// `uuid.uuid4().hex` in the Python reference.
pub fn new_job_id() -> String {
    Uuid::new_v4().simple().to_string()
}
