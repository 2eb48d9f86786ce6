use std::fmt;
use thiserror::Error;

/// Failure of a single pipeline stage. Terminal for the current pass only.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no locality found: {0}")]
    NotFound(String),

    #[error("weather request failed: {0}")]
    Fetch(#[source] FetchFailure),

    #[error("weather response does not match the expected schema: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("weather response contained no hourly readings")]
    EmptySeries,

    #[error("hourly reading {index} has a non-numeric {field}: {value:?}")]
    MalformedReading { index: usize, field: &'static str, value: String },
}

/// Transport side of [`PipelineError::Fetch`].
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("server answered {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },
}

impl From<FetchFailure> for PipelineError {
    fn from(value: FetchFailure) -> Self {
        PipelineError::Fetch(value)
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::NotFound(_) => ErrorKind::NotFound,
            PipelineError::Fetch(_) => ErrorKind::Fetch,
            PipelineError::Decode(_) => ErrorKind::Decode,
            PipelineError::EmptySeries => ErrorKind::EmptySeries,
            PipelineError::MalformedReading { .. } => ErrorKind::MalformedReading,
        }
    }
}

/// Diagnostic category of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Fetch,
    Decode,
    EmptySeries,
    MalformedReading,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Fetch => "fetch",
            ErrorKind::Decode => "decode",
            ErrorKind::EmptySeries => "empty_series",
            ErrorKind::MalformedReading => "malformed_reading",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shorten a response body for error messages.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
