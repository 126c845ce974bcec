//! Plages de valeurs autorisées (`<allowedValueRange>`).

use xmltree::{Element, XMLNode};

use crate::variable_types::StateValue;

/// Plage numérique autorisée pour une variable d'état.
#[derive(Debug, Clone)]
pub struct ValueRange {
    min: StateValue,
    max: StateValue,
    step: Option<StateValue>,
}

impl ValueRange {
    pub fn new(min: StateValue, max: StateValue) -> Self {
        Self {
            min,
            max,
            step: None,
        }
    }

    pub fn with_step(min: StateValue, max: StateValue, step: StateValue) -> Self {
        Self {
            min,
            max,
            step: Some(step),
        }
    }

    pub fn min(&self) -> &StateValue {
        &self.min
    }

    pub fn max(&self) -> &StateValue {
        &self.max
    }

    pub fn step(&self) -> Option<&StateValue> {
        self.step.as_ref()
    }

    /// Génère l'élément `<allowedValueRange>` du SCPD.
    pub fn to_xml_element(&self) -> Element {
        let mut elem = Element::new("allowedValueRange");

        let mut minimum = Element::new("minimum");
        minimum.children.push(XMLNode::Text(self.min.to_string()));
        elem.children.push(XMLNode::Element(minimum));

        let mut maximum = Element::new("maximum");
        maximum.children.push(XMLNode::Text(self.max.to_string()));
        elem.children.push(XMLNode::Element(maximum));

        if let Some(step) = &self.step {
            let mut step_elem = Element::new("step");
            step_elem.children.push(XMLNode::Text(step.to_string()));
            elem.children.push(XMLNode::Element(step_elem));
        }

        elem
    }
}
