use serde::Serialize;
use thiserror::Error;

/// Errors raised while compiling or executing a dataview request
#[derive(Debug, Error)]
pub enum DataviewError {
    #[error("Dataview '{0}' does not exist")]
    UnknownDataview(String),

    #[error("Both own_filter and no_filters cannot be sent in the same request")]
    ConflictingFilterFlags,

    #[error("Invalid number format for parameter '{param}'")]
    InvalidNumber { param: String },

    #[error("Invalid bbox filter, expected format \"west,south,east,north\"")]
    InvalidBbox(String),

    #[error("Invalid filters: {0}")]
    InvalidFilters(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Strategy-level validation failure (bins range, aggregation names, ...)
    #[error("{0}")]
    InvalidOption(String),

    #[error("Map configuration '{0}' not found")]
    MapConfigNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Database(String),

    #[error("Query timed out: {0}")]
    Timeout(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DataviewError {
    /// Create a new UnknownDataview error
    pub fn unknown_dataview(name: impl Into<String>) -> Self {
        Self::UnknownDataview(name.into())
    }

    /// Create a new InvalidNumber error naming the offending parameter
    pub fn invalid_number(param: impl Into<String>) -> Self {
        Self::InvalidNumber {
            param: param.into(),
        }
    }

    pub fn invalid_bbox(raw: impl Into<String>) -> Self {
        Self::InvalidBbox(raw.into())
    }

    pub fn invalid_filters(message: impl Into<String>) -> Self {
        Self::InvalidFilters(message.into())
    }

    pub fn invalid_identifier(name: impl Into<String>) -> Self {
        Self::InvalidIdentifier(name.into())
    }

    /// Create a new InvalidOption error (raised by dataview strategies)
    pub fn invalid_option(message: impl Into<String>) -> Self {
        Self::InvalidOption(message.into())
    }

    pub fn map_config_not_found(token: impl Into<String>) -> Self {
        Self::MapConfigNotFound(token.into())
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Get the error kind reported to API clients
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownDataview(_)
            | Self::ConflictingFilterFlags
            | Self::InvalidNumber { .. }
            | Self::InvalidBbox(_)
            | Self::InvalidFilters(_)
            | Self::InvalidIdentifier(_)
            | Self::InvalidOption(_) => ErrorKind::Dataview,
            Self::MapConfigNotFound(_) => ErrorKind::MapConfig,
            Self::Configuration(_) | Self::Json(_) => ErrorKind::Configuration,
            Self::Database(_) | Self::Timeout(_) => ErrorKind::Database,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Dataview => 400,
            ErrorKind::MapConfig => 404,
            ErrorKind::Configuration | ErrorKind::Database => 500,
        }
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }

    /// Check if this error is a server error (5xx category)
    pub fn is_server_error(&self) -> bool {
        self.http_status() >= 500
    }

    /// Body sent back to API clients: `{ message, type, http_status }`
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            message: self.to_string(),
            kind: self.kind(),
            http_status: self.http_status(),
        }
    }
}

/// Error kinds exposed in the `type` field of error responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Dataview,
    MapConfig,
    Configuration,
    Database,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dataview => write!(f, "dataview"),
            Self::MapConfig => write!(f, "mapconfig"),
            Self::Configuration => write!(f, "configuration"),
            Self::Database => write!(f, "database"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub http_status: u16,
}

/// Convenience result type for dataview operations
pub type Result<T> = std::result::Result<T, DataviewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_dataview_error() {
        let err = DataviewError::unknown_dataview("pop_max");
        assert_eq!(err.to_string(), "Dataview 'pop_max' does not exist");
        assert_eq!(err.kind(), ErrorKind::Dataview);
        assert_eq!(err.http_status(), 400);
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_conflicting_flags_message() {
        let err = DataviewError::ConflictingFilterFlags;
        assert_eq!(
            err.to_string(),
            "Both own_filter and no_filters cannot be sent in the same request"
        );
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_invalid_number_names_parameter() {
        let err = DataviewError::invalid_number("start");
        assert_eq!(err.to_string(), "Invalid number format for parameter 'start'");
        assert_eq!(err.kind(), ErrorKind::Dataview);
    }

    #[test]
    fn test_database_errors_are_server_errors() {
        let err = DataviewError::database("relation \"foo\" does not exist");
        assert_eq!(err.kind(), ErrorKind::Database);
        assert!(err.is_server_error());

        let err = DataviewError::timeout("canceling statement due to statement timeout");
        assert_eq!(err.kind(), ErrorKind::Database);
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn test_map_config_not_found() {
        let err = DataviewError::map_config_not_found("abc123");
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.kind().to_string(), "mapconfig");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err: DataviewError = json_err.into();
        assert!(matches!(err, DataviewError::Json(_)));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_error_body_serialization() {
        let body = DataviewError::unknown_dataview("nope").to_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["message"], "Dataview 'nope' does not exist");
        assert_eq!(json["type"], "dataview");
        assert_eq!(json["http_status"], 400);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::Dataview.to_string(), "dataview");
        assert_eq!(ErrorKind::Configuration.to_string(), "configuration");
        assert_eq!(ErrorKind::Database.to_string(), "database");
    }
}
