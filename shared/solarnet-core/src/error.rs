//! Error types for datum query planning

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatumError>;

#[derive(Error, Debug)]
pub enum DatumError {
    #[error("Invalid date range: {message} ({criteria})")]
    InvalidRange { message: String, criteria: String },

    #[error("Aggregation {coarse} does not contain {fine}")]
    InvalidLevelOrder { coarse: String, fine: String },

    #[error("Absolute and local date criteria cannot be combined ({criteria})")]
    MixedDateCriteria { criteria: String },

    #[error("Statement binds both absolute and local timestamps: {query}")]
    MixedDateTyping { query: String },

    #[error("Missing required filter: {filter} ({criteria})")]
    MissingFilter { filter: &'static str, criteria: String },

    #[error("Unsupported combining type: {0}")]
    UnsupportedCombiningType(String),

    #[error("Unsupported aggregation: {0}")]
    UnsupportedAggregation(String),

    #[error("Unsupported auxiliary datum type: {0}")]
    UnsupportedAuxiliaryType(String),

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DatumError {
    pub fn invalid_range(message: impl Into<String>, criteria: impl ToString) -> Self {
        Self::InvalidRange {
            message: message.into(),
            criteria: criteria.to_string(),
        }
    }

    pub fn missing_filter(filter: &'static str, criteria: impl ToString) -> Self {
        Self::MissingFilter {
            filter,
            criteria: criteria.to_string(),
        }
    }

    /// True for errors caused by the caller's input rather than the environment.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidRange { .. }
                | Self::InvalidLevelOrder { .. }
                | Self::MixedDateCriteria { .. }
                | Self::MissingFilter { .. }
                | Self::InvalidIdentifier(_)
        )
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRange { .. }
            | Self::InvalidLevelOrder { .. }
            | Self::MixedDateCriteria { .. }
            | Self::MissingFilter { .. }
            | Self::UnsupportedCombiningType(_)
            | Self::UnsupportedAggregation(_)
            | Self::UnsupportedAuxiliaryType(_)
            | Self::InvalidIdentifier(_) => 400,
            _ => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRange { .. } => "INVALID_RANGE",
            Self::InvalidLevelOrder { .. } => "INVALID_LEVEL_ORDER",
            Self::MixedDateCriteria { .. } => "MIXED_DATE_CRITERIA",
            Self::MixedDateTyping { .. } => "MIXED_DATE_TYPING",
            Self::MissingFilter { .. } => "MISSING_FILTER",
            Self::UnsupportedCombiningType(_) => "UNSUPPORTED_COMBINING_TYPE",
            Self::UnsupportedAggregation(_) => "UNSUPPORTED_AGGREGATION",
            Self::UnsupportedAuxiliaryType(_) => "UNSUPPORTED_AUXILIARY_TYPE",
            Self::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}
