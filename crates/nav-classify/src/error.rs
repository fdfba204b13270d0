use serde::Serialize;
use thiserror::Error;

/// A raw record that cannot be turned into an event at all. The record is
/// rejected; the rest of the batch continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("raw {record_type} record has empty external_id")]
    EmptyExternalId { record_type: &'static str },

    #[error("record '{external_id}': cannot parse {field} from '{raw}'")]
    InvalidDecimal {
        external_id: String,
        field: &'static str,
        raw: String,
    },

    #[error("record '{external_id}': quantity '{raw}' is not a whole number")]
    InvalidQuantity { external_id: String, raw: String },

    #[error("record '{external_id}': cannot parse timestamp '{raw}'")]
    InvalidTimestamp { external_id: String, raw: String },

    #[error("record '{external_id}': invalid instrument: {reason}")]
    InvalidInstrument { external_id: String, reason: String },
}

/// Non-fatal findings. The event is still produced and stored, carrying the
/// matching flag, so that reconciliation can explain the drift it causes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ClassificationIssue {
    /// A book entry matched neither the option nor the equity branch.
    ClassificationAmbiguity { external_id: String, reason: String },
    /// A cash transfer arrived without its amount.
    MissingAmountData { external_id: String },
}

impl ClassificationIssue {
    pub fn external_id(&self) -> &str {
        match self {
            ClassificationIssue::ClassificationAmbiguity { external_id, .. }
            | ClassificationIssue::MissingAmountData { external_id } => external_id,
        }
    }
}

impl std::fmt::Display for ClassificationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClassificationAmbiguity {
                external_id,
                reason,
            } => write!(f, "record '{external_id}' is ambiguous: {reason}"),
            Self::MissingAmountData { external_id } => {
                write!(f, "record '{external_id}' has no transaction amount")
            }
        }
    }
}
