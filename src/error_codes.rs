use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use anyhow::Error;
use serde::Serialize;
use serde_json::{json, Value};

use crate::render::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodedErrorKind {
    Usage,
    Forbidden,
    Timeout,
    Internal,
}

impl CodedErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            Self::Usage => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodedError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
    pub kind: CodedErrorKind,
}

impl CodedError {
    pub fn usage(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(CodedErrorKind::Usage, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(CodedErrorKind::Internal, code, message)
    }

    fn new(kind: CodedErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            kind,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: self.code.to_owned(),
                message: self.message.clone(),
                details: self.details.clone(),
            },
        }
    }
}

impl From<RenderError> for CodedError {
    fn from(error: RenderError) -> Self {
        let message = error.to_string();
        match error {
            RenderError::Invocation {
                renderer,
                status,
                stderr,
            } => Self::internal("render_failed", message).with_details(json!({
                "renderer": renderer,
                "status": status,
                "stderr": stderr,
            })),
            RenderError::Spawn { program, .. } => Self::internal("renderer_unavailable", message)
                .with_details(json!({ "program": program })),
            RenderError::Timeout { timeout } => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                Self::new(CodedErrorKind::Timeout, "render_timeout", message)
                    .with_details(json!({ "timeout_ms": timeout_ms }))
            }
            RenderError::MissingOutput { .. } => Self::internal("missing_output", message),
            RenderError::ScriptOverrideRejected => {
                Self::new(CodedErrorKind::Forbidden, "script_override_disabled", message)
            }
            RenderError::Sandbox(_) => Self::internal("sandbox_violation", message),
            RenderError::InvalidPath(_) => Self::internal("invalid_path", message),
            RenderError::Io(_) => Self::internal("render_io", message),
            RenderError::Other(error) => Self::internal("render_io", format!("{error:#}")),
        }
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CodedError {}

impl ResponseError for CodedError {
    fn status_code(&self) -> StatusCode {
        self.kind.status()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.envelope())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub fn find_coded_error(error: &Error) -> Option<&CodedError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CodedError>())
}
