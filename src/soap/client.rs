//! Client SOAP pour invoquer les actions d'un service UPnP distant.
//!
//! Compose la requête miroir de celle que le dispatcher sert, la poste
//! sur l'URL de contrôle du service, puis décode la réponse : soit la
//! liste ordonnée des paramètres de sortie, soit un [`UpnpFault`] typé.

use std::time::Duration;

use tracing::{debug, trace, warn};
use ureq::Agent;
use xmltree::XMLNode;

use super::{build_soap_request, parse_upnp_fault, SoapEnvelope, SoapParseError, UpnpFault};

/// Erreur d'un appel d'action côté control point.
#[derive(Debug, thiserror::Error)]
pub enum SoapClientError {
    #[error("failed to build SOAP request: {0}")]
    Build(#[from] xmltree::Error),

    #[error("HTTP error calling control URL: {0}")]
    Http(#[from] ureq::Error),

    #[error("failed to parse SOAP response: {0}")]
    Parse(#[from] SoapParseError),

    #[error("response envelope carries no {0}Response element")]
    MissingResponse(String),

    #[error(transparent)]
    Fault(#[from] UpnpFault),
}

/// Invoque une action UPnP sur une URL de contrôle.
///
/// # Arguments
///
/// * `control_url` - URL HTTP complète de l'endpoint de contrôle
/// * `service_urn` - URN du type de service
/// * `action` - Nom de l'action
/// * `args` - Arguments d'entrée `(nom, valeur)` dans l'ordre déclaré
///
/// # Returns
///
/// Les paramètres de sortie `(nom, valeur)` dans l'ordre de la réponse.
pub fn call_action(
    control_url: &str,
    service_urn: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<Vec<(String, String)>, SoapClientError> {
    call_action_with_timeout(control_url, service_urn, action, args, None)
}

/// Variante de [`call_action`] avec un timeout global côté client.
pub fn call_action_with_timeout(
    control_url: &str,
    service_urn: &str,
    action: &str,
    args: &[(&str, &str)],
    timeout: Option<Duration>,
) -> Result<Vec<(String, String)>, SoapClientError> {
    let body_xml = build_soap_request(service_urn, action, args)?;

    debug!(
        url = control_url,
        action = action,
        service_urn = service_urn,
        "Sending SOAP request"
    );
    trace!(body = body_xml.as_str(), "SOAP request body");

    let mut builder = Agent::config_builder();
    builder = builder.http_status_as_error(false);
    if let Some(duration) = timeout {
        builder = builder.timeout_global(Some(duration));
    }
    let agent: Agent = builder.build().into();

    let soap_action_header = format!(r#""{}#{}""#, service_urn, action);

    let mut response = agent
        .post(control_url)
        .header("Content-Type", r#"text/xml; charset="utf-8""#)
        .header("SOAPAction", &soap_action_header)
        .send(body_xml)?;

    let status = response.status();
    debug!(status = status.as_u16(), "SOAP response received");

    let raw_body = response.body_mut().read_to_string()?;

    let envelope = SoapEnvelope::parse(raw_body.as_bytes())?;

    // Un fault prime sur le code HTTP : certains devices répondent 200
    if let Some(fault) = parse_upnp_fault(&envelope) {
        warn!(
            url = control_url,
            action = action,
            code = fault.code,
            description = fault.description.as_str(),
            "SOAP call returned a UPnP fault"
        );
        return Err(SoapClientError::Fault(fault));
    }

    let response_elem = envelope
        .body_child_ending_with(&format!("{}Response", action))
        .ok_or_else(|| SoapClientError::MissingResponse(action.to_string()))?;

    let outs = response_elem
        .children
        .iter()
        .filter_map(|node| match node {
            XMLNode::Element(elem) => Some((
                elem.name.clone(),
                elem.get_text().unwrap_or_default().trim().to_string(),
            )),
            _ => None,
        })
        .collect();

    Ok(outs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soap_action_header_format() {
        // La convention UPnP met l'URN et le nom d'action entre guillemets
        let header = format!(
            r#""{}#{}""#,
            "urn:schemas-upnp-org:service:AVTransport:1", "Play"
        );
        assert_eq!(
            header,
            r#""urn:schemas-upnp-org:service:AVTransport:1#Play""#
        );
    }

    #[test]
    fn test_fault_error_carries_code_and_description() {
        let err = SoapClientError::Fault(UpnpFault::new(718, "Invalid InstanceID"));
        assert_eq!(err.to_string(), "UPnP error 718: Invalid InstanceID");
    }
}
