//! Lecture des enveloppes SOAP entrantes.
//!
//! Les devices du commerce préfixent `Envelope`, `Body` ou l'action
//! avec des préfixes de namespace variés ; tout le décodage se fait
//! donc par nom local, via [`child_ending_with`]. Le corps et
//! l'en-tête sont conservés en éléments bruts, l'appel d'action est
//! extrait avec ses arguments **dans l'ordre du document**.

use std::io::BufReader;

use xmltree::{Element, XMLNode};

/// Erreur de lecture d'une enveloppe SOAP.
#[derive(Debug, thiserror::Error)]
pub enum SoapParseError {
    #[error("unreadable XML: {0}")]
    Xml(#[from] xmltree::ParseError),

    #[error("document root {0:?} is not a SOAP envelope")]
    NotAnEnvelope(String),

    #[error("envelope carries no Body")]
    BodyMissing,

    #[error("envelope body carries no element")]
    EmptyBody,
}

/// Enveloppe SOAP 1.1 décodée : un corps obligatoire, un en-tête
/// facultatif.
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    header: Option<Element>,
    body: Element,
}

impl SoapEnvelope {
    /// Décode une enveloppe depuis des bytes XML.
    pub fn parse(xml: &[u8]) -> Result<Self, SoapParseError> {
        let root = Element::parse(BufReader::new(xml))?;
        if !root.name.ends_with("Envelope") {
            return Err(SoapParseError::NotAnEnvelope(root.name));
        }

        let mut header = None;
        let mut body = None;
        for node in root.children {
            let XMLNode::Element(elem) = node else { continue };
            if header.is_none() && elem.name.ends_with("Header") {
                header = Some(elem);
            } else if body.is_none() && elem.name.ends_with("Body") {
                body = Some(elem);
            }
        }

        Ok(Self {
            header,
            body: body.ok_or(SoapParseError::BodyMissing)?,
        })
    }

    /// En-tête brut, s'il était présent.
    pub fn header(&self) -> Option<&Element> {
        self.header.as_ref()
    }

    /// Corps brut de l'enveloppe.
    pub fn body(&self) -> &Element {
        &self.body
    }

    /// Premier élément du corps dont le nom local se termine par
    /// `suffix` (ex: `GetVolumeResponse`, `Fault`).
    pub fn body_child_ending_with(&self, suffix: &str) -> Option<&Element> {
        child_ending_with(&self.body, suffix)
    }
}

/// Appel d'action extrait d'une requête de contrôle.
///
/// Format attendu dans le corps :
/// `<u:ActionName xmlns:u="service-urn">...</u:ActionName>`
#[derive(Debug, Clone)]
pub struct ActionCall {
    /// Nom local de l'action (ex: "Play")
    pub name: String,

    /// Namespace de l'action, l'URN du type de service
    pub namespace: Option<String>,

    args: Vec<(String, String)>,
}

impl ActionCall {
    /// Décode l'appel d'action d'une requête de contrôle complète.
    pub fn parse(xml: &[u8]) -> Result<Self, SoapParseError> {
        Self::from_envelope(&SoapEnvelope::parse(xml)?)
    }

    /// Extrait l'appel d'action du corps d'une enveloppe déjà décodée.
    pub fn from_envelope(envelope: &SoapEnvelope) -> Result<Self, SoapParseError> {
        let action = envelope
            .body()
            .children
            .iter()
            .find_map(|n| n.as_element())
            .ok_or(SoapParseError::EmptyBody)?;

        let args = action
            .children
            .iter()
            .filter_map(|n| n.as_element())
            .map(|e| {
                (
                    e.name.clone(),
                    e.get_text().unwrap_or_default().to_string(),
                )
            })
            .collect();

        Ok(Self {
            name: action.name.clone(),
            namespace: action.namespace.clone(),
            args,
        })
    }

    /// Valeur d'un argument, par nom.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Arguments `(nom, valeur)` dans l'ordre du document.
    pub fn args(&self) -> &[(String, String)] {
        &self.args
    }
}

/// Premier élément enfant dont le nom local se termine par `suffix`.
pub(crate) fn child_ending_with<'a>(parent: &'a Element, suffix: &str) -> Option<&'a Element> {
    parent.children.iter().find_map(|node| match node {
        XMLNode::Element(elem) if elem.name.ends_with(suffix) => Some(elem),
        _ => None,
    })
}
