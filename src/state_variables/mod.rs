//! # Module state_variables - Table d'état UPnP
//!
//! Variables d'état d'un service : nom, type de données, valeur par
//! défaut, valeurs ou plage autorisées, et drapeau d'événement. Les
//! variables fournissent leur type aux arguments d'action qui les
//! référencent, et s'émettent dans la `<serviceStateTable>` du SCPD.

mod macros;

use std::sync::Arc;

use xmltree::{Element, XMLNode};

use crate::value_ranges::ValueRange;
use crate::variable_types::{StateValue, StateValueError, StateVarType};

/// Variable d'état d'un service UPnP.
#[derive(Debug, Clone)]
pub struct StateVariable {
    name: String,
    data_type: StateVarType,
    default_value: Option<StateValue>,
    allowed_values: Option<Vec<String>>,
    allowed_range: Option<ValueRange>,
    send_events: bool,
}

impl StateVariable {
    pub fn new(name: impl Into<String>, data_type: StateVarType) -> Self {
        Self {
            name: name.into(),
            data_type,
            default_value: None,
            allowed_values: None,
            allowed_range: None,
            send_events: false,
        }
    }

    /// Définit la valeur par défaut à partir de sa forme câble.
    ///
    /// # Errors
    ///
    /// Retourne une erreur si la chaîne ne se convertit pas vers le type
    /// de la variable.
    pub fn with_default(mut self, raw: &str) -> Result<Self, StateValueError> {
        self.default_value = Some(self.data_type.parse_value(raw)?);
        Ok(self)
    }

    /// Définit la liste des valeurs autorisées (énumération discrète).
    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Définit la plage de valeurs autorisées.
    pub fn with_range(mut self, range: ValueRange) -> Self {
        self.allowed_range = Some(range);
        self
    }

    /// Active ou non l'éventement GENA (préservé dans le SCPD,
    /// inutilisé par ce runtime).
    pub fn evented(mut self, send_events: bool) -> Self {
        self.send_events = send_events;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> StateVarType {
        self.data_type
    }

    pub fn default_value(&self) -> Option<&StateValue> {
        self.default_value.as_ref()
    }

    pub fn allowed_values(&self) -> Option<&[String]> {
        self.allowed_values.as_deref()
    }

    pub fn allowed_range(&self) -> Option<&ValueRange> {
        self.allowed_range.as_ref()
    }

    pub fn send_events(&self) -> bool {
        self.send_events
    }

    /// Génère l'élément `<stateVariable>` du SCPD.
    pub fn to_xml_element(&self) -> Element {
        let mut elem = Element::new("stateVariable");
        elem.attributes.insert(
            "sendEvents".to_string(),
            if self.send_events { "yes" } else { "no" }.to_string(),
        );

        let mut name = Element::new("name");
        name.children.push(XMLNode::Text(self.name.clone()));
        elem.children.push(XMLNode::Element(name));

        let mut data_type = Element::new("dataType");
        data_type
            .children
            .push(XMLNode::Text(self.data_type.to_string()));
        elem.children.push(XMLNode::Element(data_type));

        if let Some(default) = &self.default_value {
            let mut default_elem = Element::new("defaultValue");
            default_elem
                .children
                .push(XMLNode::Text(default.to_string()));
            elem.children.push(XMLNode::Element(default_elem));
        }

        if let Some(values) = &self.allowed_values {
            let mut list = Element::new("allowedValueList");
            for value in values {
                let mut allowed = Element::new("allowedValue");
                allowed.children.push(XMLNode::Text(value.clone()));
                list.children.push(XMLNode::Element(allowed));
            }
            elem.children.push(XMLNode::Element(list));
        }

        if let Some(range) = &self.allowed_range {
            elem.children.push(XMLNode::Element(range.to_xml_element()));
        }

        elem
    }
}

/// Table d'état d'un service, dans l'ordre de déclaration.
#[derive(Debug, Clone, Default)]
pub struct StateVariableSet {
    variables: Vec<Arc<StateVariable>>,
}

impl StateVariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insère une variable ; une variable déjà présente sous le même nom
    /// est laissée en place.
    pub fn insert(&mut self, variable: Arc<StateVariable>) {
        if self.get_by_name(variable.name()).is_none() {
            self.variables.push(variable);
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Arc<StateVariable>> {
        self.variables.iter().find(|v| v.name() == name)
    }

    pub fn all(&self) -> &[Arc<StateVariable>] {
        &self.variables
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Génère l'élément `<serviceStateTable>` du SCPD, dans l'ordre de
    /// déclaration.
    pub fn to_xml_element(&self) -> Element {
        let mut elem = Element::new("serviceStateTable");
        for variable in &self.variables {
            elem.children
                .push(XMLNode::Element(variable.to_xml_element()));
        }
        elem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_variable_emission() {
        let var = StateVariable::new("Volume", StateVarType::UI2)
            .with_default("50")
            .unwrap()
            .with_range(ValueRange::new(StateValue::UI2(0), StateValue::UI2(100)))
            .evented(true);

        let elem = var.to_xml_element();
        assert_eq!(elem.attributes.get("sendEvents").unwrap(), "yes");
        assert_eq!(elem.get_child("name").unwrap().get_text().unwrap(), "Volume");
        assert_eq!(elem.get_child("dataType").unwrap().get_text().unwrap(), "ui2");
        assert_eq!(
            elem.get_child("defaultValue").unwrap().get_text().unwrap(),
            "50"
        );
        assert!(elem.get_child("allowedValueRange").is_some());
    }

    #[test]
    fn test_bad_default_rejected() {
        assert!(StateVariable::new("Volume", StateVarType::UI2)
            .with_default("loud")
            .is_err());
    }

    #[test]
    fn test_set_keeps_declaration_order() {
        let mut set = StateVariableSet::new();
        set.insert(Arc::new(StateVariable::new("Zulu", StateVarType::String)));
        set.insert(Arc::new(StateVariable::new("Alpha", StateVarType::String)));
        set.insert(Arc::new(StateVariable::new("Zulu", StateVarType::UI4)));

        let names: Vec<_> = set.all().iter().map(|v| v.name().to_string()).collect();
        assert_eq!(names, ["Zulu", "Alpha"]);
        // Le doublon n'a pas remplacé la première déclaration
        assert_eq!(
            set.get_by_name("Zulu").unwrap().data_type(),
            StateVarType::String
        );
    }
}
