//! # Module devices - Devices UPnP
//!
//! Modèle hiérarchique d'un device racine, de ses sous-devices et de
//! ses services, selon la UPnP Device Architecture 1.0.
//!
//! La définition ([`Device`]) se construit (ou se recharge depuis le
//! cache persistant avec le même UDN), puis se fige en une
//! [`DeviceInstance`] au démarrage ; le [`DeviceRuntime`] attache
//! ensuite le serveur HTTP et les annonces SSDP.
//!
//! # Exemple
//!
//! ```ignore
//! use upnp_runtime::devices::Device;
//! use upnp_runtime::services::Service;
//!
//! let device = Device::create("MediaServer", "Salon", |d| {
//!     d.set_manufacturer("Example Corp");
//!     d.set_model_name("Shelf-1");
//!     d.add_service(Service::new("ContentDirectory"));
//! })?;
//! # Ok::<(), upnp_runtime::devices::DeviceError>(())
//! ```

mod device_instance;
mod errors;
mod runtime;
pub mod store;

use std::path::Path;

use tracing::{debug, info};

use crate::config;
use crate::services::Service;
use crate::uuidgen;

pub use device_instance::DeviceInstance;
pub use errors::DeviceError;
pub use runtime::{DeviceRuntime, RuntimeConfig};

use store::{DeviceRecord, ServiceRecord};

/// Définition d'un device UPnP.
///
/// Le device racine possède tout le sous-arbre ; les champs descriptifs
/// se modifient librement jusqu'au passage en instance.
#[derive(Debug, Clone)]
pub struct Device {
    device_type: String,
    version: u8,
    friendly_name: String,

    /// UUID du device (forme avec tirets, sans le préfixe `uuid:`)
    name: String,

    manufacturer: String,
    model_name: String,
    manufacturer_url: Option<String>,
    model_description: Option<String>,
    model_number: Option<String>,
    model_url: Option<String>,
    serial_number: Option<String>,
    upc: Option<String>,

    devices: Vec<Device>,
    services: Vec<Service>,
}

impl Device {
    /// Construit un device neuf avec un UUID fraîchement généré.
    pub fn new(device_type: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
            version: 1,
            friendly_name: friendly_name.into(),
            name: uuidgen::generate().hyphenated().to_string(),
            manufacturer: String::new(),
            model_name: String::new(),
            manufacturer_url: None,
            model_description: None,
            model_number: None,
            model_url: None,
            serial_number: None,
            upc: None,
            devices: Vec::new(),
            services: Vec::new(),
        }
    }

    /// Construit ou recharge un device depuis le cache par défaut.
    ///
    /// Si un enregistrement existe pour ce couple `(type, friendly
    /// name)`, il est rechargé (même UDN) puis la closure est appliquée
    /// pour surcharger les champs. Sinon un device neuf est construit,
    /// la closure appliquée, et l'enregistrement écrit.
    pub fn create<F>(
        device_type: &str,
        friendly_name: &str,
        f: F,
    ) -> Result<Device, DeviceError>
    where
        F: FnOnce(&mut Device),
    {
        Self::create_in(&config::upnp_home(), device_type, friendly_name, f)
    }

    /// Variante de [`Device::create`] avec un répertoire de cache explicite.
    pub fn create_in<F>(
        base: &Path,
        device_type: &str,
        friendly_name: &str,
        f: F,
    ) -> Result<Device, DeviceError>
    where
        F: FnOnce(&mut Device),
    {
        let path = config::device_cache_path_in(base, device_type, friendly_name);

        if path.exists() {
            let record = store::load(&path)?;
            let mut device = Device::from_record(record);
            f(&mut device);
            info!(
                "✅ Device {}/{} reloaded from {}",
                device_type,
                friendly_name,
                path.display()
            );
            Ok(device)
        } else {
            let mut device = Device::new(device_type, friendly_name);
            f(&mut device);
            store::save(&path, device.to_record())?;
            info!(
                "✅ Device {}/{} created, record written to {}",
                device_type,
                friendly_name,
                path.display()
            );
            Ok(device)
        }
    }

    /// Réécrit l'enregistrement de ce device dans le cache par défaut.
    pub fn dump(&self) -> Result<(), DeviceError> {
        self.dump_in(&config::upnp_home())
    }

    /// Réécrit l'enregistrement de ce device dans un cache explicite.
    pub fn dump_in(&self, base: &Path) -> Result<(), DeviceError> {
        let path = config::device_cache_path_in(base, &self.device_type, &self.friendly_name);
        store::save(&path, self.to_record())?;
        Ok(())
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    /// URN complet du type de device.
    ///
    /// Format: `urn:schemas-upnp-org:device:{type}:{version}`
    pub fn type_urn(&self) -> String {
        format!(
            "urn:schemas-upnp-org:device:{}:{}",
            self.device_type, self.version
        )
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// UUID du device, sans préfixe.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// UDN du device : `uuid:{uuid}`.
    pub fn udn(&self) -> String {
        format!("uuid:{}", self.name)
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn set_friendly_name(&mut self, value: impl Into<String>) {
        self.friendly_name = value.into();
    }

    pub fn set_manufacturer(&mut self, value: impl Into<String>) {
        self.manufacturer = value.into();
    }

    pub fn set_model_name(&mut self, value: impl Into<String>) {
        self.model_name = value.into();
    }

    pub fn set_manufacturer_url(&mut self, value: impl Into<String>) {
        self.manufacturer_url = Some(value.into());
    }

    pub fn set_model_description(&mut self, value: impl Into<String>) {
        self.model_description = Some(value.into());
    }

    pub fn set_model_number(&mut self, value: impl Into<String>) {
        self.model_number = Some(value.into());
    }

    pub fn set_model_url(&mut self, value: impl Into<String>) {
        self.model_url = Some(value.into());
    }

    pub fn set_serial_number(&mut self, value: impl Into<String>) {
        self.serial_number = Some(value.into());
    }

    pub fn set_upc(&mut self, value: impl Into<String>) {
        self.upc = Some(value.into());
    }

    pub fn manufacturer_url(&self) -> Option<&str> {
        self.manufacturer_url.as_deref()
    }

    pub fn model_description(&self) -> Option<&str> {
        self.model_description.as_deref()
    }

    pub fn model_number(&self) -> Option<&str> {
        self.model_number.as_deref()
    }

    pub fn model_url(&self) -> Option<&str> {
        self.model_url.as_deref()
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn upc(&self) -> Option<&str> {
        self.upc.as_deref()
    }

    /// Ajoute un sous-device, de façon idempotente sur le couple
    /// `(type, friendly name)` : si un enfant correspondant existe déjà
    /// il est retourné tel quel, aucun nouveau device n'est créé.
    pub fn add_device(
        &mut self,
        device_type: &str,
        friendly_name: &str,
    ) -> &mut Device {
        let position = self
            .devices
            .iter()
            .position(|d| d.device_type == device_type && d.friendly_name == friendly_name);

        match position {
            Some(index) => &mut self.devices[index],
            None => {
                self.devices.push(Device::new(device_type, friendly_name));
                self.devices.last_mut().unwrap()
            }
        }
    }

    /// Ajoute un service, de façon idempotente sur le type : si un
    /// service du même type existe déjà (typiquement une coquille
    /// rechargée du cache), il absorbe les catalogues et handlers
    /// fournis au lieu d'être dupliqué.
    pub fn add_service(&mut self, service: Service) -> &mut Service {
        let position = self
            .services
            .iter()
            .position(|s| s.service_type() == service.service_type());

        match position {
            Some(index) => {
                debug!(
                    "Service {} already declared, merging catalogs",
                    service.service_type()
                );
                self.services[index].absorb(service);
                &mut self.services[index]
            }
            None => {
                self.services.push(service);
                self.services.last_mut().unwrap()
            }
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn get_service(&self, service_type: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| s.service_type() == service_type)
    }

    /// Vérifie récursivement que les champs obligatoires sont remplis.
    ///
    /// # Errors
    ///
    /// Retourne la première violation rencontrée : `friendly_name`,
    /// `manufacturer` ou `model_name` vide, ou UUID absent.
    pub fn validate(&self) -> Result<(), DeviceError> {
        let label = format!("{}/{}", self.device_type, self.friendly_name);

        if self.name.is_empty() {
            return Err(DeviceError::Validation {
                device: label,
                field: "name",
            });
        }
        if self.friendly_name.is_empty() {
            return Err(DeviceError::Validation {
                device: label,
                field: "friendly_name",
            });
        }
        if self.manufacturer.is_empty() {
            return Err(DeviceError::Validation {
                device: label,
                field: "manufacturer",
            });
        }
        if self.model_name.is_empty() {
            return Err(DeviceError::Validation {
                device: label,
                field: "model_name",
            });
        }

        for child in &self.devices {
            child.validate()?;
        }
        Ok(())
    }

    fn to_record(&self) -> DeviceRecord {
        DeviceRecord {
            device_type: self.device_type.clone(),
            friendly_name: self.friendly_name.clone(),
            name: self.name.clone(),
            manufacturer: self.manufacturer.clone(),
            model_name: self.model_name.clone(),
            manufacturer_url: self.manufacturer_url.clone(),
            model_description: self.model_description.clone(),
            model_number: self.model_number.clone(),
            model_url: self.model_url.clone(),
            serial_number: self.serial_number.clone(),
            upc: self.upc.clone(),
            sub_devices: self.devices.iter().map(Device::to_record).collect(),
            services: self
                .services
                .iter()
                .map(|s| ServiceRecord {
                    service_type: s.service_type().to_string(),
                    service_id: s.service_id().to_string(),
                })
                .collect(),
        }
    }

    fn from_record(record: DeviceRecord) -> Device {
        let services = record
            .services
            .into_iter()
            .map(|r| {
                let mut service = Service::new(r.service_type);
                service.set_service_id(r.service_id);
                service
            })
            .collect();

        Device {
            device_type: record.device_type,
            version: 1,
            friendly_name: record.friendly_name,
            name: record.name,
            manufacturer: record.manufacturer,
            model_name: record.model_name,
            manufacturer_url: record.manufacturer_url,
            model_description: record.model_description,
            model_number: record.model_number,
            model_url: record.model_url,
            serial_number: record.serial_number,
            upc: record.upc,
            devices: record.sub_devices.into_iter().map(Device::from_record).collect(),
            services,
        }
    }
}
