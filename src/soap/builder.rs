//! Construction de requêtes et de réponses SOAP
//!
//! Les arguments sont portés par des listes ordonnées : UPnP exige que
//! les paramètres de sortie apparaissent dans l'ordre déclaré par le
//! SCPD, un dictionnaire ne suffit donc pas.

use xmltree::{Element, XMLNode};

use super::{SOAP_ENCODING, SOAP_ENVELOPE_NS};

/// Construit une requête SOAP UPnP.
///
/// # Arguments
///
/// * `service_urn` - URN du service (ex: "urn:schemas-upnp-org:service:AVTransport:1")
/// * `action` - Nom de l'action (ex: "Play")
/// * `args` - Arguments `(nom, valeur)` dans l'ordre déclaré
pub fn build_soap_request(
    service_urn: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<String, xmltree::Error> {
    let mut action_elem = Element::new(&format!("u:{}", action));
    action_elem
        .attributes
        .insert("xmlns:u".to_string(), service_urn.to_string());

    for (name, value) in args {
        let mut child = Element::new(name);
        child.children.push(XMLNode::Text(value.to_string()));
        action_elem.children.push(XMLNode::Element(child));
    }

    wrap_in_envelope(action_elem)
}

/// Construit une réponse SOAP UPnP.
///
/// Format : `<u:ActionResponse xmlns:u="service-urn">` avec un enfant
/// par paramètre de sortie, dans l'ordre fourni.
pub fn build_soap_response(
    service_urn: &str,
    action: &str,
    values: &[(String, String)],
) -> Result<String, xmltree::Error> {
    let mut response_elem = Element::new(&format!("u:{}Response", action));
    response_elem
        .attributes
        .insert("xmlns:u".to_string(), service_urn.to_string());

    for (name, value) in values {
        let mut child = Element::new(name);
        child.children.push(XMLNode::Text(value.clone()));
        response_elem.children.push(XMLNode::Element(child));
    }

    wrap_in_envelope(response_elem)
}

/// Emballe un élément dans `<s:Envelope><s:Body>` et sérialise.
pub(crate) fn wrap_in_envelope(payload: Element) -> Result<String, xmltree::Error> {
    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(payload));

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), SOAP_ENVELOPE_NS.to_string());
    envelope
        .attributes
        .insert("s:encodingStyle".to_string(), SOAP_ENCODING.to_string());
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = xmltree::EmitterConfig::new()
        .perform_indent(true)
        .indent_string("  ");
    envelope.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8_lossy(&buf).to_string())
}
