//! Workflow API request/response types (Coze workflows).

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Execution status reported by the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Success,
    Failed,
    Running,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Success => write!(f, "success"),
            WorkflowStatus::Failed => write!(f, "failed"),
            WorkflowStatus::Running => write!(f, "running"),
        }
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(WorkflowStatus::Success),
            "failed" => Ok(WorkflowStatus::Failed),
            "running" => Ok(WorkflowStatus::Running),
            other => Err(format!("invalid workflow status: '{other}'")),
        }
    }
}

/// Input handed to the workflow gateway for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowInvocation {
    pub input: String,
    pub context_id: String,
    pub stream: bool,
}

/// `parameters` object of an execute request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowParameters {
    pub input: String,
}

/// Body of `POST /v1/workflow/execute` and `/v1/workflow/stream_execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub workflow_id: String,
    pub parameters: WorkflowParameters,
    pub context_id: String,
    pub stream: bool,
}

impl WorkflowRequest {
    pub fn new(workflow_id: &str, invocation: &WorkflowInvocation) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            parameters: WorkflowParameters {
                input: invocation.input.clone(),
            },
            context_id: invocation.context_id.clone(),
            stream: invocation.stream,
        }
    }
}

/// The `data` object of an execute response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub output: Option<serde_json::Map<String, serde_json::Value>>,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub error: Option<String>,
}

/// Envelope of every workflow API response: `{code, msg, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEnvelope<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// `data` object of `POST /v1/conversation/create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationCreated {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let invocation = WorkflowInvocation {
            input: "hello".into(),
            context_id: "ctx-1".into(),
            stream: false,
        };
        let req = WorkflowRequest::new("wf-1", &invocation);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["workflow_id"], "wf-1");
        assert_eq!(json["parameters"]["input"], "hello");
        assert_eq!(json["context_id"], "ctx-1");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_response_parses_with_output() {
        let raw = r#"{"code":0,"msg":"","data":{"workflow_id":"wf","context_id":"c","output":{"result":"hi!"},"status":"success"}}"#;
        let env: WorkflowEnvelope<WorkflowResult> = serde_json::from_str(raw).unwrap();
        let data = env.data.unwrap();
        assert_eq!(data.status, WorkflowStatus::Success);
        assert_eq!(data.output.unwrap()["result"], "hi!");
    }

    #[test]
    fn test_response_parses_failed_without_output() {
        let raw = r#"{"code":0,"msg":"","data":{"status":"failed","error":"boom"}}"#;
        let env: WorkflowEnvelope<WorkflowResult> = serde_json::from_str(raw).unwrap();
        let data = env.data.unwrap();
        assert_eq!(data.status, WorkflowStatus::Failed);
        assert!(data.output.is_none());
        assert_eq!(data.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("RUNNING".parse::<WorkflowStatus>().unwrap(), WorkflowStatus::Running);
        assert!("unknown".parse::<WorkflowStatus>().is_err());
    }
}
