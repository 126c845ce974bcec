//! Erreurs du catalogue d'actions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action {0} already exists")]
    AlreadyExists(String),

    #[error("action {0} declares more than one retval argument")]
    MultipleRetVals(String),

    #[error("action {0}: retval must be the first out argument")]
    RetValNotFirst(String),
}
