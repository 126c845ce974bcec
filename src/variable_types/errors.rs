//! Erreurs de conversion des valeurs UPnP.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateValueError {
    #[error("unknown UPnP data type token: {0}")]
    UnknownType(String),

    #[error("cannot parse {value:?} as {type_token}: {reason}")]
    InvalidValue {
        type_token: &'static str,
        value: String,
        reason: String,
    },
}

impl StateValueError {
    pub(crate) fn invalid(
        type_token: &'static str,
        value: &str,
        reason: impl Into<String>,
    ) -> Self {
        StateValueError::InvalidValue {
            type_token,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
