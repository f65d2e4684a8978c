use pipeline_core::{ActionAck, Job, PipelineVariant, StageAction, TargetSelection};
use pipeline_logging::pipeline_warn;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use crate::{DispatchError, EngineSettings, FailureKind, FetchError};

/// The remote collaborator the engine reads from and dispatches to.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Raw status payload; `None` when the backend reports the feature absent.
    async fn fetch_status(&self) -> Result<Option<Value>, FetchError>;

    async fn list_jobs(&self, offset: u32, limit: u32) -> Result<Vec<Job>, FetchError>;

    async fn dispatch(
        &self,
        action: StageAction,
        selection: &TargetSelection,
    ) -> Result<ActionAck, DispatchError>;
}

/// Endpoint layout per pipeline variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Routes {
    status: &'static str,
    jobs: &'static str,
    actions: &'static str,
}

impl Routes {
    fn for_variant(variant: PipelineVariant) -> Self {
        match variant {
            PipelineVariant::Website => Self {
                status: "api/pipeline/status",
                jobs: "api/jobs",
                actions: "api/pipeline/",
            },
            PipelineVariant::Social => Self {
                status: "api/social/pipeline/status",
                jobs: "api/social/jobs",
                actions: "api/social/pipeline/",
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    base: Url,
    routes: Routes,
}

impl ReqwestBackend {
    pub fn new(settings: &EngineSettings) -> Result<Self, FetchError> {
        let base = settings
            .base()
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            client,
            base,
            routes: Routes::for_variant(settings.variant),
        })
    }

    fn url(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))
    }
}

#[async_trait::async_trait]
impl Backend for ReqwestBackend {
    async fn fetch_status(&self) -> Result<Option<Value>, FetchError> {
        let response = self
            .client
            .get(self.url(self.routes.status)?)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                // The normalizer treats an unreadable payload as an absent feature.
                pipeline_warn!("Status payload is not JSON: {}", err);
                Ok(None)
            }
        }
    }

    async fn list_jobs(&self, offset: u32, limit: u32) -> Result<Vec<Job>, FetchError> {
        let mut url = self.url(self.routes.jobs)?;
        url.query_pairs_mut()
            .append_pair("skip", &offset.to_string())
            .append_pair("limit", &limit.to_string());

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let value: Value = serde_json::from_slice(&body)
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
        parse_jobs(value)
    }

    async fn dispatch(
        &self,
        action: StageAction,
        selection: &TargetSelection,
    ) -> Result<ActionAck, DispatchError> {
        let url = self.url(&format!("{}{}", self.routes.actions, action.endpoint()))?;
        let body = serde_json::to_vec(selection)
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let payload = serde_json::from_slice::<Value>(&body).ok();

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                message: rejection_message(payload.as_ref(), &text, status),
            });
        }

        Ok(parse_ack(payload.as_ref()))
    }
}

/// Extracts the job array from a bare list or a `jobs`/`data`/`items` envelope.
/// Malformed entries are skipped.
pub fn parse_jobs(value: Value) -> Result<Vec<Job>, FetchError> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut object) => ["jobs", "data", "items"]
            .iter()
            .find_map(|key| match object.remove(*key) {
                Some(Value::Array(entries)) => Some(entries),
                _ => None,
            })
            .ok_or_else(|| FetchError::new(FailureKind::Decode, "no job list in response"))?,
        other => {
            return Err(FetchError::new(
                FailureKind::Decode,
                format!("expected a job list, got {other}"),
            ))
        }
    };

    let jobs = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Job>(entry) {
            Ok(job) => Some(job),
            Err(err) => {
                pipeline_warn!("Skipping unreadable job record: {}", err);
                None
            }
        })
        .collect();
    Ok(jobs)
}

fn parse_ack(payload: Option<&Value>) -> ActionAck {
    let Some(object) = payload.and_then(Value::as_object) else {
        return ActionAck::default();
    };

    let job_id = ["job_id", "id"].iter().find_map(|key| match object.get(*key) {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    });
    let affected = ["count", "affected", "queued", "prospects_count", "profiles_count"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_u64));
    let message = object
        .get("message")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);

    ActionAck {
        job_id,
        affected,
        message,
    }
}

/// The backend's own explanation, forwarded as-is.
fn rejection_message(payload: Option<&Value>, raw: &str, status: StatusCode) -> String {
    let from_payload = payload.and_then(Value::as_object).and_then(|object| {
        ["detail", "message", "error"]
            .iter()
            .find_map(|key| match object.get(*key) {
                Some(Value::String(text)) => Some(text.clone()),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
    });
    if let Some(message) = from_payload {
        return message;
    }
    let raw = raw.trim();
    if raw.is_empty() {
        status.to_string()
    } else {
        raw.to_string()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return FetchError::new(FailureKind::Decode, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
