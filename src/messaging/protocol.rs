//! Message contract between the extension's contexts
//!
//! Requests are tagged by `type`; responses are bare payloads distinguished by
//! shape; pushes carry their payload under `data`.

use crate::error::{BrowserError, Result};
use crate::extract::JobRecord;
use crate::settings::Settings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    ScrapeJobDetails,
    AutoApply,
    #[serde(rename_all = "camelCase")]
    ApplyToAllVisibleJobs {
        #[serde(default)]
        resume_text: String,
        threshold: u8,
    },
    #[serde(rename_all = "camelCase")]
    ExtractResumeText {
        /// Standard base64 of the PDF bytes
        pdf_base64: String,
    },
    GetSettings,
}

impl Request {
    /// Wire name of the request type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ScrapeJobDetails => "SCRAPE_JOB_DETAILS",
            Self::AutoApply => "AUTO_APPLY",
            Self::ApplyToAllVisibleJobs { .. } => "APPLY_TO_ALL_VISIBLE_JOBS",
            Self::ExtractResumeText { .. } => "EXTRACT_RESUME_TEXT",
            Self::GetSettings => "GET_SETTINGS",
        }
    }
}

/// Reply to a [`Request`]; exactly one per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Response {
    Error {
        error: String,
    },
    Applied {
        success: bool,
    },
    #[serde(rename_all = "camelCase")]
    AppliedCount {
        applied_count: u32,
    },
    ResumeText {
        text: String,
    },
    Job(JobRecord),
    Settings(Settings),
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { error: message.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Turn an `{error}` reply into [`BrowserError::Rejected`]
    pub fn into_result(self) -> Result<Self> {
        match self {
            Self::Error { error } => Err(BrowserError::Rejected(error)),
            other => Ok(other),
        }
    }
}

impl From<BrowserError> for Response {
    fn from(err: BrowserError) -> Self {
        Self::error(err.to_string())
    }
}

/// Unsolicited notification from the content side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Push {
    ContentScriptReady,
    JobContentUpdated(JobRecord),
}

/// Anything the content side writes to the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum Outbound {
    Push(Push),
    Response(Response),
}

/// JSON schemas of the whole contract, keyed by message kind
pub fn contract_schema() -> serde_json::Value {
    serde_json::json!({
        "request": schemars::schema_for!(Request),
        "response": schemars::schema_for!(Response),
        "push": schemars::schema_for!(Push),
        "settings": schemars::schema_for!(Settings),
    })
}
