//! SOAP Faults UPnP
//!
//! Le fault UPnP est la seule erreur qui traverse le câble sous forme
//! structurée : `faultcode s:Client`, `faultstring UPnPError`, et le
//! détail `<UPnPError>` portant le couple code/description.

use xmltree::{Element, XMLNode};

use super::parser::child_ending_with;
use super::{SoapEnvelope, UPNP_CONTROL_NS};

/// Erreur d'action UPnP, propagée telle quelle à travers la frontière SOAP.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("UPnP error {code}: {description}")]
pub struct UpnpFault {
    /// Code d'erreur UPnP (401, 402, 501, 600-699)
    pub code: u16,

    /// Description lisible de l'erreur
    pub description: String,
}

impl UpnpFault {
    pub fn new(code: u16, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// `401 Invalid Action` : action inconnue du service.
    pub fn invalid_action() -> Self {
        Self::new(401, "Invalid Action")
    }

    /// `402 Invalid Args` : argument manquant ou inconvertible.
    pub fn invalid_args() -> Self {
        Self::new(402, "Invalid Args")
    }

    /// `501 Action Failed` : l'action a échoué en cours d'exécution.
    pub fn action_failed() -> Self {
        Self::new(501, "Action Failed")
    }
}

/// Construit l'enveloppe SOAP complète d'un fault UPnP.
pub fn build_soap_fault(fault: &UpnpFault) -> Result<String, xmltree::Error> {
    let mut fault_elem = Element::new("s:Fault");

    let mut faultcode = Element::new("faultcode");
    faultcode
        .children
        .push(XMLNode::Text("s:Client".to_string()));
    fault_elem.children.push(XMLNode::Element(faultcode));

    let mut faultstring = Element::new("faultstring");
    faultstring
        .children
        .push(XMLNode::Text("UPnPError".to_string()));
    fault_elem.children.push(XMLNode::Element(faultstring));

    let mut detail = Element::new("detail");

    let mut upnp_error = Element::new("UPnPError");
    upnp_error
        .attributes
        .insert("xmlns".to_string(), UPNP_CONTROL_NS.to_string());

    let mut error_code = Element::new("errorCode");
    error_code
        .children
        .push(XMLNode::Text(fault.code.to_string()));
    upnp_error.children.push(XMLNode::Element(error_code));

    let mut error_description = Element::new("errorDescription");
    error_description
        .children
        .push(XMLNode::Text(fault.description.clone()));
    upnp_error.children.push(XMLNode::Element(error_description));

    detail.children.push(XMLNode::Element(upnp_error));
    fault_elem.children.push(XMLNode::Element(detail));

    super::builder::wrap_in_envelope(fault_elem)
}

/// Extrait le fault UPnP d'une enveloppe de réponse, s'il y en a un.
pub fn parse_upnp_fault(envelope: &SoapEnvelope) -> Option<UpnpFault> {
    let fault = envelope.body_child_ending_with("Fault")?;
    let detail = child_ending_with(fault, "detail")?;
    let upnp_error = child_ending_with(detail, "UPnPError")?;

    let code = child_ending_with(upnp_error, "errorCode")?
        .get_text()?
        .trim()
        .parse::<u16>()
        .ok()?;

    let description = child_ending_with(upnp_error, "errorDescription")
        .and_then(|e| e.get_text().map(|t| t.trim().to_string()))
        .unwrap_or_default();

    Some(UpnpFault { code, description })
}
