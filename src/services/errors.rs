//! Erreurs liées aux services.

use thiserror::Error;

use crate::actions::ActionError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("service {0} carries a malformed service id: {1}")]
    UnknownServiceId(String, String),

    #[error(transparent)]
    Action(#[from] ActionError),
}
