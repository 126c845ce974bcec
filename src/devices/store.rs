//! Persistance des devices.
//!
//! Un device est sérialisé en YAML sous
//! `<upnp-home>/<type>/<friendly_name>` : un enregistrement versionné
//! portant l'identité (UUID), les champs descriptifs, les sous-devices
//! (récursivement, le parent est implicite dans l'imbrication) et les
//! services (type + identifiant). Aucun état d'exécution n'est écrit ;
//! recharger produit un arbre sans serveur qu'il faut relancer.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Version courante du format d'enregistrement.
pub const STORE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error reading or writing device record: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed device record: {0}")]
    Format(#[from] serde_yaml::Error),

    #[error("unsupported device record version {0} (expected {STORE_VERSION})")]
    UnsupportedVersion(u32),
}

/// Enregistrement racine écrit sur disque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDevice {
    pub version: u32,
    pub device: DeviceRecord,
}

/// Un device sérialisé.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_type: String,
    pub friendly_name: String,

    /// UUID du device, sans le préfixe `uuid:`
    pub name: String,

    pub manufacturer: String,
    pub model_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upc: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_devices: Vec<DeviceRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceRecord>,
}

/// Un service sérialisé : seuls le type et l'identifiant survivent, les
/// catalogues d'actions et de variables viennent du code appelant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub service_type: String,
    pub service_id: String,
}

/// Écrit l'enregistrement d'un device (répertoires parents créés).
pub fn save(path: &Path, record: DeviceRecord) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let stored = StoredDevice {
        version: STORE_VERSION,
        device: record,
    };
    let yaml = serde_yaml::to_string(&stored)?;
    fs::write(path, yaml)?;
    debug!("Device record written to {}", path.display());
    Ok(())
}

/// Relit l'enregistrement d'un device.
///
/// # Errors
///
/// Retourne une erreur si le fichier est illisible, mal formé, ou d'une
/// version de format inconnue.
pub fn load(path: &Path) -> Result<DeviceRecord, StoreError> {
    let text = fs::read_to_string(path)?;
    let stored: StoredDevice = serde_yaml::from_str(&text)?;
    if stored.version != STORE_VERSION {
        return Err(StoreError::UnsupportedVersion(stored.version));
    }
    Ok(stored.device)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> DeviceRecord {
        DeviceRecord {
            device_type: "MediaServer".to_string(),
            friendly_name: "Salon".to_string(),
            name: "0e042ba4-82f1-4531-bd35-b455efebc627".to_string(),
            manufacturer: "Example Corp".to_string(),
            model_name: "Shelf-1".to_string(),
            manufacturer_url: None,
            model_description: Some("Test shelf".to_string()),
            model_number: None,
            model_url: None,
            serial_number: None,
            upc: None,
            sub_devices: vec![],
            services: vec![ServiceRecord {
                service_type: "ContentDirectory".to_string(),
                service_id: "urn:upnp-org:serviceId:ContentDirectory".to_string(),
            }],
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MediaServer").join("Salon");

        save(&path, sample_record()).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.name, "0e042ba4-82f1-4531-bd35-b455efebc627");
        assert_eq!(loaded.model_description.as_deref(), Some("Test shelf"));
        assert_eq!(loaded.services.len(), 1);
        assert_eq!(loaded.services[0].service_type, "ContentDirectory");
    }

    #[test]
    fn test_unknown_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record");

        let stored = StoredDevice {
            version: 99,
            device: sample_record(),
        };
        std::fs::write(&path, serde_yaml::to_string(&stored).unwrap()).unwrap();

        assert!(matches!(
            load(&path),
            Err(StoreError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_runtime_state_not_serialized() {
        let yaml = serde_yaml::to_string(&StoredDevice {
            version: STORE_VERSION,
            device: sample_record(),
        })
        .unwrap();
        // Rien d'autre que le modèle ne doit apparaître
        assert!(!yaml.contains("socket"));
        assert!(!yaml.contains("server"));
        assert!(!yaml.contains("thread"));
    }
}
