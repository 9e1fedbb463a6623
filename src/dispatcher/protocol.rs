// src/dispatcher/protocol.rs

//! Wire messages exchanged over the dispatcher endpoint.
//!
//! Each frame is one JSON document terminated by `\n`. A connection
//! carries one request from the client followed by the server's
//! responses.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{OpenGeError, Result};
use crate::types::{BuildResultStatus, JobCompletionStatus, OutputStream};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Ping,
    SubmitJob(SubmitJobRequest),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    /// The job document (TOML).
    pub job_document: String,
    pub working_directory: String,
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    /// Node-selection hint; informational on a single-node dispatcher.
    #[serde(default)]
    pub build_node_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobResponse {
    Pong,
    JobParsed {
        total_tasks: usize,
    },
    TaskStarted {
        id: String,
        display_name: String,
    },
    TaskOutput {
        id: String,
        line: String,
        stream: OutputStream,
    },
    TaskCompleted {
        id: String,
        status: BuildResultStatus,
        exit_code: i32,
        total_seconds: f64,
    },
    JobComplete {
        status: JobCompletionStatus,
        exit_code: i32,
        total_seconds: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl JobResponse {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobResponse::JobComplete { .. } | JobResponse::Pong)
    }
}

pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let mut frame = serde_json::to_vec(message)?;
    frame.push(b'\n');
    Ok(frame)
}

pub fn decode_frame<T: DeserializeOwned>(line: &str) -> Result<T> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(OpenGeError::Other(anyhow::anyhow!("empty protocol frame")));
    }
    Ok(serde_json::from_str(trimmed)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_frames_are_tagged() {
        let frame = encode_frame(&ClientRequest::Ping).unwrap();
        assert_eq!(frame, b"{\"type\":\"ping\"}\n");

        let submit = ClientRequest::SubmitJob(SubmitJobRequest {
            job_document: "[projects]".into(),
            working_directory: "/w".into(),
            ..Default::default()
        });
        let line = String::from_utf8(encode_frame(&submit).unwrap()).unwrap();
        assert!(line.starts_with("{\"type\":\"submit_job\""));
        assert_eq!(decode_frame::<ClientRequest>(&line).unwrap(), submit);
    }

    #[test]
    fn completion_message_is_optional() {
        let parsed: JobResponse = decode_frame(
            r#"{"type":"job_complete","status":"cancelled_due_to_failure","exit_code":1,"total_seconds":0.5}"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            JobResponse::JobComplete {
                status: JobCompletionStatus::CancelledDueToFailure,
                exit_code: 1,
                total_seconds: 0.5,
                message: None,
            }
        );
        assert!(parsed.is_terminal());
    }

    #[test]
    fn blank_line_is_rejected() {
        assert!(decode_frame::<ClientRequest>("  \n").is_err());
    }
}
