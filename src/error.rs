use std::fmt;

/// Broad failure category, so callers can tell retryable failures apart from
/// ones that need a different request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Protocol,
    Decode,
    Precondition,
    Incompatibility,
}

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Status { uri: String, status: u16 },
    Auth(String),
    Decode { uri: String, source: serde_json::Error },
    MissingField(&'static str),
    InvalidField { field: &'static str, value: serde_json::Value },
    Rejected { action: &'static str, body: String },
    Incompatible { api_ver: u64, min: u64 },
    NotLoaded(&'static str),
    InvalidSetpoints { heat: f64, cool: f64, delta: f64 },
    AwayActive,
    Unsupported(&'static str),
    InvalidConfig(String),
    Io(std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) | Error::Io(_) => ErrorKind::Transport,
            Error::Status { .. } | Error::Auth(_) | Error::Rejected { .. } => ErrorKind::Protocol,
            Error::Decode { .. } | Error::MissingField(_) | Error::InvalidField { .. } => {
                ErrorKind::Decode
            }
            Error::Incompatible { .. } => ErrorKind::Incompatibility,
            Error::NotLoaded(_)
            | Error::InvalidSetpoints { .. }
            | Error::AwayActive
            | Error::Unsupported(_)
            | Error::InvalidConfig(_) => ErrorKind::Precondition,
        }
    }

    /// Transport failures and server-side (5xx) statuses may succeed on a
    /// later attempt; everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Status { uri, status } => write!(f, "{uri} returned status {status}"),
            Error::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Error::Decode { uri, source } => write!(f, "invalid JSON from {uri}: {source}"),
            Error::MissingField(field) => write!(f, "response is missing field: {field}"),
            Error::InvalidField { field, value } => {
                write!(f, "unexpected value for {field}: {value}")
            }
            Error::Rejected { action, body } => write!(f, "{action} rejected by thermostat: {body}"),
            Error::Incompatible { api_ver, min } => {
                write!(f, "API version {api_ver} is older than the supported minimum {min}")
            }
            Error::NotLoaded(what) => write!(f, "{what} not loaded; call update_info first"),
            Error::InvalidSetpoints { heat, cool, delta } => write!(
                f,
                "in auto mode the cool setpoint ({cool}) must be at least {delta} above the heat setpoint ({heat})"
            ),
            Error::AwayActive => write!(f, "cannot change schedule while away is active"),
            Error::Unsupported(what) => write!(f, "not supported by this thermostat: {what}"),
            Error::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Decode { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
