//! Erreurs liées aux devices.

use thiserror::Error;

use crate::services::ServiceError;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device {device}: required field {field} is empty")]
    Validation { device: String, field: &'static str },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Store(#[from] crate::devices::store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize description XML: {0}")]
    Xml(#[from] xmltree::Error),
}
