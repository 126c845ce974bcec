//! # Module actions - Actions UPnP
//!
//! Catalogue des actions d'un service : chaque action porte une liste
//! ordonnée d'arguments, chacun avec sa direction (`in`, `out`,
//! `retval`), son nom et la variable d'état qui fournit son type.
//! Les actions s'émettent dans l'`<actionList>` du SCPD.

mod errors;
mod macros;

use std::sync::Arc;

use xmltree::{Element, XMLNode};

use crate::state_variables::StateVariable;

pub use errors::ActionError;

/// Direction d'un argument d'action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    /// Valeur de retour : émise comme `out` dans le SCPD, la convention
    /// UPnP la place toujours première parmi les sorties.
    RetVal,
}

impl Direction {
    pub fn is_in(&self) -> bool {
        matches!(self, Direction::In)
    }

    pub fn is_out(&self) -> bool {
        matches!(self, Direction::Out | Direction::RetVal)
    }
}

/// Argument d'une action UPnP.
#[derive(Debug, Clone)]
pub struct Argument {
    name: String,
    direction: Direction,
    related_state_variable: String,
}

impl Argument {
    pub fn new(
        name: impl Into<String>,
        direction: Direction,
        related: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            related_state_variable: related.into(),
        }
    }

    pub fn new_in(name: impl Into<String>, variable: &Arc<StateVariable>) -> Self {
        Self::new(name, Direction::In, variable.name())
    }

    pub fn new_out(name: impl Into<String>, variable: &Arc<StateVariable>) -> Self {
        Self::new(name, Direction::Out, variable.name())
    }

    pub fn new_retval(name: impl Into<String>, variable: &Arc<StateVariable>) -> Self {
        Self::new(name, Direction::RetVal, variable.name())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Nom de la variable d'état qui fournit le type de cet argument.
    pub fn related_state_variable(&self) -> &str {
        &self.related_state_variable
    }

    /// Génère l'élément `<argument>` du SCPD : exactement `<direction>`,
    /// `<name>` et `<relatedStateVariable>`.
    pub fn to_xml_element(&self) -> Element {
        let mut elem = Element::new("argument");

        let mut direction = Element::new("direction");
        direction.children.push(XMLNode::Text(
            if self.direction.is_in() { "in" } else { "out" }.to_string(),
        ));
        elem.children.push(XMLNode::Element(direction));

        let mut name = Element::new("name");
        name.children.push(XMLNode::Text(self.name.clone()));
        elem.children.push(XMLNode::Element(name));

        let mut related = Element::new("relatedStateVariable");
        related
            .children
            .push(XMLNode::Text(self.related_state_variable.clone()));
        elem.children.push(XMLNode::Element(related));

        elem
    }
}

/// Action UPnP : un nom et une liste ordonnée d'arguments.
#[derive(Debug, Clone)]
pub struct Action {
    name: String,
    arguments: Vec<Argument>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn add_argument(&mut self, argument: Argument) {
        self.arguments.push(argument);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Arguments d'entrée, dans l'ordre de déclaration.
    pub fn in_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|a| a.direction().is_in())
    }

    /// Arguments de sortie (retval compris), dans l'ordre de déclaration.
    pub fn out_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|a| a.direction().is_out())
    }

    /// Vérifie les contraintes structurelles de l'action : au plus un
    /// `retval`, et s'il existe il doit être la première sortie.
    pub fn validate(&self) -> Result<(), ActionError> {
        let retval_count = self
            .arguments
            .iter()
            .filter(|a| a.direction() == Direction::RetVal)
            .count();
        if retval_count > 1 {
            return Err(ActionError::MultipleRetVals(self.name.clone()));
        }
        if retval_count == 1 {
            let first_out = self.out_arguments().next();
            if !matches!(first_out.map(Argument::direction), Some(Direction::RetVal)) {
                return Err(ActionError::RetValNotFirst(self.name.clone()));
            }
        }
        Ok(())
    }

    /// Génère l'élément `<action>` du SCPD.
    pub fn to_xml_element(&self) -> Element {
        let mut elem = Element::new("action");

        let mut name = Element::new("name");
        name.children.push(XMLNode::Text(self.name.clone()));
        elem.children.push(XMLNode::Element(name));

        if !self.arguments.is_empty() {
            let mut list = Element::new("argumentList");
            for argument in &self.arguments {
                list.children.push(XMLNode::Element(argument.to_xml_element()));
            }
            elem.children.push(XMLNode::Element(list));
        }

        elem
    }
}

/// Catalogue des actions d'un service.
#[derive(Debug, Clone, Default)]
pub struct ActionSet {
    actions: Vec<Action>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insère une action après validation structurelle.
    ///
    /// # Errors
    ///
    /// Retourne une erreur si une action du même nom existe déjà ou si
    /// l'action est mal formée.
    pub fn insert(&mut self, action: Action) -> Result<(), ActionError> {
        action.validate()?;
        if self.get_by_name(action.name()).is_some() {
            return Err(ActionError::AlreadyExists(action.name().to_string()));
        }
        self.actions.push(action);
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name() == name)
    }

    pub fn all(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Génère l'élément `<actionList>` du SCPD, actions triées par nom.
    pub fn to_xml_element(&self) -> Element {
        let mut sorted: Vec<&Action> = self.actions.iter().collect();
        sorted.sort_by(|a, b| a.name().cmp(b.name()));

        let mut elem = Element::new("actionList");
        for action in sorted {
            elem.children.push(XMLNode::Element(action.to_xml_element()));
        }
        elem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable_types::StateVarType;

    fn var(name: &str) -> Arc<StateVariable> {
        Arc::new(StateVariable::new(name, StateVarType::String))
    }

    #[test]
    fn test_argument_order_preserved() {
        let mut action = Action::new("Browse");
        action.add_argument(Argument::new_in("ObjectID", &var("A_ARG_TYPE_ObjectID")));
        action.add_argument(Argument::new_in("BrowseFlag", &var("A_ARG_TYPE_BrowseFlag")));
        action.add_argument(Argument::new_out("Result", &var("A_ARG_TYPE_Result")));

        let names: Vec<_> = action.arguments().iter().map(|a| a.name()).collect();
        assert_eq!(names, ["ObjectID", "BrowseFlag", "Result"]);
    }

    #[test]
    fn test_retval_must_be_first_out() {
        let mut ok = Action::new("GetTime");
        ok.add_argument(Argument::new_retval("CurrentTime", &var("Time")));
        ok.add_argument(Argument::new_out("Offset", &var("Offset")));
        assert!(ok.validate().is_ok());

        let mut bad = Action::new("GetTime");
        bad.add_argument(Argument::new_out("Offset", &var("Offset")));
        bad.add_argument(Argument::new_retval("CurrentTime", &var("Time")));
        assert!(matches!(
            bad.validate(),
            Err(ActionError::RetValNotFirst(_))
        ));
    }

    #[test]
    fn test_action_list_sorted() {
        let mut set = ActionSet::new();
        set.insert(Action::new("Stop")).unwrap();
        set.insert(Action::new("Play")).unwrap();
        set.insert(Action::new("Pause")).unwrap();

        let elem = set.to_xml_element();
        let names: Vec<String> = elem
            .children
            .iter()
            .filter_map(|n| n.as_element())
            .map(|a| a.get_child("name").unwrap().get_text().unwrap().to_string())
            .collect();
        assert_eq!(names, ["Pause", "Play", "Stop"]);
    }

    #[test]
    fn test_duplicate_action_rejected() {
        let mut set = ActionSet::new();
        set.insert(Action::new("Play")).unwrap();
        assert!(matches!(
            set.insert(Action::new("Play")),
            Err(ActionError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_retval_emitted_as_plain_out() {
        let mut action = Action::new("GetTime");
        action.add_argument(Argument::new_retval("CurrentTime", &var("Time")));
        let elem = action.to_xml_element();
        let arg = elem
            .get_child("argumentList")
            .unwrap()
            .get_child("argument")
            .unwrap();
        assert_eq!(arg.get_child("direction").unwrap().get_text().unwrap(), "out");

        // Trois enfants, rien de plus : direction, name, relatedStateVariable
        let children: Vec<&str> = arg
            .children
            .iter()
            .filter_map(|n| n.as_element())
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(children, ["direction", "name", "relatedStateVariable"]);
    }
}
