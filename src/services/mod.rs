//! # Module services - Services UPnP
//!
//! Un service regroupe un catalogue d'actions, une table de variables
//! d'état et un registre de handlers. La définition ([`Service`]) est
//! construite puis figée en une [`ServiceInstance`] au démarrage du
//! device : c'est l'instance qui sert le SCPD et dispatche les appels
//! SOAP entrants.
//!
//! ## Architecture
//!
//! - [`Service`] : définition (catalogues + handlers)
//! - [`ServiceInstance`] : instance figée, routes et dispatch
//! - [`ServiceError`](errors::ServiceError) : erreurs liées aux services

mod errors;
mod service_instance;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::actions::{Action, ActionSet};
use crate::soap::UpnpFault;
use crate::state_variables::{StateVariable, StateVariableSet};
use crate::variable_types::StateValue;

pub use errors::ServiceError;
pub use service_instance::{ControlOutcome, ServiceInstance};

/// Handler d'action : reçoit les arguments d'entrée coercés dans l'ordre
/// déclaré et retourne les sorties dans l'ordre déclaré (retval en tête)
/// ou un fault UPnP typé.
pub type ActionHandler =
    Arc<dyn Fn(&[StateValue]) -> Result<Vec<StateValue>, UpnpFault> + Send + Sync>;

/// Définition d'un service UPnP.
#[derive(Clone)]
pub struct Service {
    service_type: String,
    version: u8,
    service_id: String,
    actions: ActionSet,
    state_table: StateVariableSet,
    handlers: HashMap<String, ActionHandler>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("service_type", &self.service_type)
            .field("version", &self.version)
            .field("service_id", &self.service_id)
            .field("actions", &self.actions)
            .field("state_table", &self.state_table)
            .field("handlers", &self.handlers.keys())
            .finish()
    }
}

impl Service {
    /// Crée une définition de service pour un type court (ex:
    /// "ContentDirectory"). L'identifiant de service par défaut dérive
    /// du type dans le domaine `upnp-org`.
    pub fn new(service_type: impl Into<String>) -> Self {
        let service_type = service_type.into();
        let service_id = format!("urn:upnp-org:serviceId:{}", service_type);
        Self {
            service_type,
            version: 1,
            service_id,
            actions: ActionSet::new(),
            state_table: StateVariableSet::new(),
            handlers: HashMap::new(),
        }
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn set_version(&mut self, version: u8) {
        self.version = version.max(1);
    }

    /// URN complet du type de service.
    ///
    /// Format: `urn:schemas-upnp-org:service:{type}:{version}`
    pub fn type_urn(&self) -> String {
        format!(
            "urn:schemas-upnp-org:service:{}:{}",
            self.service_type, self.version
        )
    }

    /// Identifiant du service.
    ///
    /// Format: `urn:{domaine-points-remplacés-par-tirets}:serviceId:{id}`
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Remplace l'identifiant du service par un identifiant complet.
    pub fn set_service_id(&mut self, id: impl Into<String>) {
        self.service_id = id.into();
    }

    /// Construit l'identifiant depuis un domaine et un id court ; les
    /// points du domaine deviennent des tirets.
    pub fn set_service_id_for_domain(&mut self, domain: &str, id: &str) {
        self.service_id = format!("urn:{}:serviceId:{}", domain.replace('.', "-"), id);
    }

    /// Ajoute une variable à la table d'état (sans effet si une variable
    /// du même nom existe déjà).
    pub fn add_variable(&mut self, variable: Arc<StateVariable>) {
        self.state_table.insert(variable);
    }

    /// Ajoute une action sans handler (elle répondra `602`).
    pub fn add_action(&mut self, action: Action) -> Result<(), ServiceError> {
        self.actions.insert(action)?;
        Ok(())
    }

    /// Enregistre une action et son handler.
    ///
    /// # Errors
    ///
    /// Retourne une erreur si l'action est mal formée ou déjà présente.
    pub fn register_action<F>(&mut self, action: Action, handler: F) -> Result<(), ServiceError>
    where
        F: Fn(&[StateValue]) -> Result<Vec<StateValue>, UpnpFault> + Send + Sync + 'static,
    {
        let name = action.name().to_string();
        self.actions.insert(action)?;
        self.handlers.insert(name, Arc::new(handler));
        Ok(())
    }

    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    pub fn state_table(&self) -> &StateVariableSet {
        &self.state_table
    }

    pub(crate) fn handler(&self, action: &str) -> Option<&ActionHandler> {
        self.handlers.get(action)
    }

    /// Fusionne les catalogues d'une autre définition du même type.
    /// Utilisé par l'ajout idempotent côté device : la définition
    /// rechargée depuis le cache ne porte que le type et l'identifiant,
    /// les catalogues viennent du code appelant.
    pub(crate) fn absorb(&mut self, other: Service) {
        self.version = other.version;
        if !other.actions.is_empty() || !other.state_table.is_empty() {
            self.actions = other.actions;
            self.state_table = other.state_table;
            self.handlers = other.handlers;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, Argument};
    use crate::variable_types::StateVarType;

    #[test]
    fn test_default_service_id() {
        let service = Service::new("ContentDirectory");
        assert_eq!(
            service.service_id(),
            "urn:upnp-org:serviceId:ContentDirectory"
        );
    }

    #[test]
    fn test_service_id_for_domain() {
        let mut service = Service::new("SwitchPower");
        service.set_service_id_for_domain("example.com", "SwitchPower.0001");
        assert_eq!(
            service.service_id(),
            "urn:example-com:serviceId:SwitchPower.0001"
        );
    }

    #[test]
    fn test_type_urn() {
        let service = Service::new("AVTransport");
        assert_eq!(
            service.type_urn(),
            "urn:schemas-upnp-org:service:AVTransport:1"
        );
    }

    #[test]
    fn test_register_action() {
        let mut service = Service::new("Clock");
        let time_var = Arc::new(StateVariable::new("CurrentTime", StateVarType::Time));
        service.add_variable(time_var.clone());

        let mut action = Action::new("GetTime");
        action.add_argument(Argument::new_retval("Time", &time_var));

        service
            .register_action(action, |_args| Ok(vec![]))
            .unwrap();

        assert!(service.actions().get_by_name("GetTime").is_some());
        assert!(service.handler("GetTime").is_some());
    }
}
