use serde::Serialize;
use thiserror::Error;

/// Why a request's parameters cannot be served. Each variant has one fixed
/// user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterProblem {
    MissingUsername,
    MissingCategory { accepted: Vec<String> },
    UnknownCategory { category: String, accepted: Vec<String> },
    RatingUnsupported { category: String },
    RatingsDisabled,
    ListsDisabled,
    UnknownList { list: String },
}

impl ParameterProblem {
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingUsername => "Please provide a Plex username.".to_string(),
            Self::MissingCategory { accepted } => {
                format!("Please include a category: '{}'.", accepted.join("', '"))
            }
            Self::UnknownCategory { accepted, .. } => {
                format!("Please try again, indicating '{}'.", accepted.join("', '"))
            }
            Self::RatingUnsupported { .. } => {
                "Sorry, rating filters only work for movies and TV shows.".to_string()
            }
            Self::RatingsDisabled => "Rating lookups are not configured.".to_string(),
            Self::ListsDisabled => "Curated lists are not configured.".to_string(),
            Self::UnknownList { list } => format!("I don't know a list called '{list}'."),
        }
    }
}

impl std::fmt::Display for ParameterProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingUsername => f.write_str("missing username"),
            Self::MissingCategory { .. } => f.write_str("missing category"),
            Self::UnknownCategory { category, .. } => write!(f, "unknown category {category}"),
            Self::RatingUnsupported { category } => {
                write!(f, "rating filter unsupported for {category}")
            }
            Self::RatingsDisabled => f.write_str("no rating provider configured"),
            Self::ListsDisabled => f.write_str("no list provider configured"),
            Self::UnknownList { list } => write!(f, "unknown list {list}"),
        }
    }
}

/// Typed outcome of a failed pick.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PickError {
    /// Nothing in scope at all. A content or configuration problem.
    #[error("no candidates in scope")]
    EmptyScope,

    /// The history provider does not know the user.
    #[error("unknown user")]
    UnknownUser,

    /// The retry budget ran out without a qualifying candidate.
    #[error("gave up after {attempts} attempts")]
    TooManyAttempts { attempts: u32 },

    #[error("parameter error: {0}")]
    Parameter(ParameterProblem),

    /// A collaborator failed before any candidate could be drawn.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("index error: {0}")]
    Index(String),
}

impl PickError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyScope => "empty_scope",
            Self::UnknownUser => "unknown_user",
            Self::TooManyAttempts { .. } => "too_many_attempts",
            Self::Parameter(_) => "bad_request",
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::Index(_) => "internal_error",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyScope => {
                "There's nothing in that library yet. Please try again later.".to_string()
            }
            Self::UnknownUser => "I couldn't find that Plex username.".to_string(),
            Self::TooManyAttempts { .. } => {
                "Sorry, it took too long to find something for you.".to_string()
            }
            Self::Parameter(problem) => problem.user_message(),
            Self::ProviderUnavailable(_) | Self::Index(_) => {
                "Something went wrong. Please try again later.".to_string()
            }
        }
    }
}

/// Unified API error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    EmptyScope(String),

    #[error("{0}")]
    UnknownUser(String),

    #[error("{0}")]
    TooManyAttempts(String),

    #[error("{0}")]
    ProviderUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::EmptyScope(_) => "empty_scope",
            Self::UnknownUser(_) => "unknown_user",
            Self::TooManyAttempts(_) => "too_many_attempts",
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// The message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::NotFound(m)
            | Self::EmptyScope(m)
            | Self::UnknownUser(m)
            | Self::TooManyAttempts(m)
            | Self::ProviderUnavailable(m)
            | Self::Internal(m) => m,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) | Self::EmptyScope(_) | Self::UnknownUser(_) => 404,
            Self::TooManyAttempts(_) => 422,
            Self::ProviderUnavailable(_) => 502,
            Self::Internal(_) => 500,
        }
    }
}

impl From<PickError> for ApiError {
    fn from(e: PickError) -> Self {
        let message = e.user_message();
        match e {
            PickError::EmptyScope => Self::EmptyScope(message),
            PickError::UnknownUser => Self::UnknownUser(message),
            PickError::TooManyAttempts { .. } => Self::TooManyAttempts(message),
            PickError::Parameter(_) => Self::BadRequest(message),
            PickError::ProviderUnavailable(_) => Self::ProviderUnavailable(message),
            PickError::Index(_) => Self::Internal(message),
        }
    }
}

/// JSON error envelope: `{ "error": { "code": "…", "message": "…", "details": {} } }`
#[derive(Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl From<&ApiError> for ErrorEnvelope {
    fn from(e: &ApiError) -> Self {
        Self {
            error: ErrorBody {
                code: e.code().to_string(),
                message: e.message().to_string(),
                details: serde_json::Value::Object(serde_json::Map::new()),
            },
        }
    }
}
