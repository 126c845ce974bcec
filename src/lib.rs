//! # upnp-runtime - Runtime UPnP 1.0
//!
//! Ce crate implémente le cœur d'un runtime UPnP 1.0 côté device et côté
//! control point : découverte SSDP, modèle de devices/services avec
//! persistance, documents de description XML, et contrôle SOAP.
//!
//! ## Fonctionnalités
//!
//! - ✅ Annonces SSDP alive/byebye en multicast et réponses aux M-SEARCH
//! - ✅ Recherche SSDP côté control point avec file d'événements
//! - ✅ Modèle hiérarchique device/service avec UDN persistant
//! - ✅ Génération des documents description et SCPD (UPnP 1.0)
//! - ✅ Dispatch SOAP des actions avec conversion typée des arguments
//! - ✅ Serveur HTTP Axum avec enregistrement dynamique des routes
//!
//! ## Architecture
//!
//! - [`devices`] : modèle de device, instances, persistance, runtime
//! - [`services`] : modèle de service, SCPD, dispatch SOAP
//! - [`actions`] / [`state_variables`] : catalogue d'actions et table d'état
//! - [`variable_types`] : registre des types de données UPnP
//! - [`ssdp`] : moteur SSDP (serveur et client)
//! - [`soap`] : codec d'enveloppes SOAP et client `ureq`
//! - [`description`] : parseur des documents distants (control point)
//! - [`server`] : hôte HTTP
//!
//! ## Example
//!
//! ```rust,no_run
//! use upnp_runtime::devices::{Device, DeviceRuntime, RuntimeConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let device = Device::create("MediaServer", "Salon", |d| {
//!     d.set_manufacturer("Example Corp");
//!     d.set_model_name("Shelf-1");
//! })?;
//!
//! let mut runtime = DeviceRuntime::start(&device, RuntimeConfig::default()).await?;
//! runtime.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod config;
pub mod description;
pub mod devices;
pub mod server;
pub mod services;
pub mod soap;
pub mod ssdp;
pub mod state_variables;
pub mod uuidgen;
pub mod value_ranges;
pub mod variable_types;

pub use crate::devices::{Device, DeviceError, DeviceInstance, DeviceRuntime, RuntimeConfig};
pub use crate::services::{Service, ServiceError, ServiceInstance};
pub use crate::soap::UpnpFault;

/// Identité produit annoncée dans les en-têtes `SERVER`.
pub const PRODUCT: &str = "upnp-runtime";

/// Version du produit annoncée dans les en-têtes `SERVER`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Construit la chaîne `SERVER` UPnP : `<os-info> UPnP/1.0 <product-info>`.
pub fn server_header() -> String {
    format!(
        "{}/{} UPnP/1.0 {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        PRODUCT,
        VERSION
    )
}

/// Vérifie qu'un identifiant UPnP ne contient que des caractères de mot
/// (`\w`). Utilisé pour se prémunir des injections SOAP lors du parsing
/// des documents distants.
pub(crate) fn valid_identifier(s: &str) -> bool {
    s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_header_shape() {
        let header = server_header();
        assert!(header.contains(" UPnP/1.0 "));
        assert!(header.contains(PRODUCT));
    }

    #[test]
    fn test_valid_identifier() {
        assert!(valid_identifier("GetVolume"));
        assert!(valid_identifier("A_ARG_TYPE_InstanceID"));
        assert!(valid_identifier(""));
        assert!(!valid_identifier("Get Volume"));
        assert!(!valid_identifier("<script>"));
    }
}
