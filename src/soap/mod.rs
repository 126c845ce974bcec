//! # Module soap - Simple Object Access Protocol
//!
//! Codec SOAP 1.1 pour le contrôle UPnP : décodage des enveloppes
//! entrantes et des appels d'action, construction des requêtes,
//! réponses et faults, et client HTTP pour invoquer les actions d'un
//! service distant.
//!
//! ## Fonctionnalités
//!
//! - ✅ Décodage d'enveloppes et d'appels d'action (arguments ordonnés)
//! - ✅ Construction de requêtes et de réponses SOAP
//! - ✅ Faults UPnP (`UPnPError` avec code et description)
//! - ✅ Client `ureq` avec en-tête `SOAPAction`
//!
//! ## Example
//!
//! ```ignore
//! use upnp_runtime::soap::ActionCall;
//!
//! let body = r#"<?xml version="1.0"?>
//! <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
//!   <s:Body>
//!     <u:Play xmlns:u="urn:schemas-upnp-org:service:AVTransport:1">
//!       <InstanceID>0</InstanceID>
//!     </u:Play>
//!   </s:Body>
//! </s:Envelope>"#;
//!
//! let call = ActionCall::parse(body.as_bytes()).unwrap();
//! assert_eq!(call.name, "Play");
//! assert_eq!(call.arg("InstanceID"), Some("0"));
//! ```

pub mod client;

mod builder;
mod fault;
mod parser;

pub use builder::{build_soap_request, build_soap_response};
pub use fault::{build_soap_fault, parse_upnp_fault, UpnpFault};
pub use parser::{ActionCall, SoapEnvelope, SoapParseError};

/// Namespace de l'enveloppe SOAP 1.1.
pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Style d'encodage SOAP annoncé par UPnP.
pub const SOAP_ENCODING: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Namespace du détail d'erreur UPnP.
pub const UPNP_CONTROL_NS: &str = "urn:schemas-upnp-org:control-1-0";
