//! Implémentation de ServiceInstance.
//!
//! L'instance est la forme figée d'une définition de service : routes
//! calculées depuis la position du device dans l'arbre, table de
//! dispatch SOAP résolue (types des arguments, handlers), et génération
//! du SCPD.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, info, warn};
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::actions::Direction;
use crate::server::Server;
use crate::services::{ActionHandler, Service, ServiceError};
use crate::soap::{build_soap_fault, build_soap_response, ActionCall, UpnpFault};
use crate::variable_types::{StateValue, StateVarType};

/// Entrée de la table de dispatch : une action avec ses types résolus.
#[derive(Clone)]
struct DispatchEntry {
    name: String,
    soap_action: String,
    in_params: Vec<(String, StateVarType)>,
    out_params: Vec<String>,
    handler: Option<ActionHandler>,
}

/// Résultat du dispatch d'une requête de contrôle.
#[derive(Debug, Clone)]
pub struct ControlOutcome {
    /// Code de statut HTTP (200, 400 ou 500)
    pub status: u16,

    /// Corps de la réponse (enveloppe SOAP, vide pour un 400)
    pub body: String,
}

/// Instance d'un service UPnP, attachée à un device qui tourne.
#[derive(Clone)]
pub struct ServiceInstance {
    model: Service,
    device_path: String,
    udn: String,
    dispatch: Vec<DispatchEntry>,
}

impl std::fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("service_type", &self.model.service_type())
            .field("device_path", &self.device_path)
            .field("udn", &self.udn)
            .finish()
    }
}

impl Service {
    /// Fige la définition en une instance rattachée à un device.
    ///
    /// La table de dispatch est construite ici : chaque argument est
    /// résolu vers le type de sa variable d'état associée. Une action
    /// qui référence une variable absente est écartée.
    ///
    /// # Errors
    ///
    /// Retourne une erreur si l'identifiant de service est mal formé.
    pub fn create_instance(
        &self,
        device_path: &str,
        udn: &str,
    ) -> Result<ServiceInstance, ServiceError> {
        if !self.service_id().starts_with("urn:") || !self.service_id().contains(":serviceId:") {
            return Err(ServiceError::UnknownServiceId(
                self.service_type().to_string(),
                self.service_id().to_string(),
            ));
        }

        let type_urn = self.type_urn();
        let mut dispatch = Vec::new();

        for action in self.actions().all() {
            let mut in_params = Vec::new();
            let mut out_params = Vec::new();
            let mut missing_vars = Vec::new();

            for argument in action.arguments() {
                let related = argument.related_state_variable();
                match self.state_table().get_by_name(related) {
                    Some(variable) => match argument.direction() {
                        Direction::In => {
                            in_params.push((argument.name().to_string(), variable.data_type()));
                        }
                        Direction::Out | Direction::RetVal => {
                            out_params.push(argument.name().to_string());
                        }
                    },
                    None => missing_vars.push(related.to_string()),
                }
            }

            if !missing_vars.is_empty() {
                error!(
                    "❌ Action '{}' references missing state variables: {:?}",
                    action.name(),
                    missing_vars
                );
                continue;
            }

            dispatch.push(DispatchEntry {
                name: action.name().to_string(),
                soap_action: format!("{}#{}", type_urn, action.name()),
                in_params,
                out_params,
                handler: self.handler(action.name()).cloned(),
            });
        }

        Ok(ServiceInstance {
            model: self.clone(),
            device_path: device_path.to_string(),
            udn: udn.to_string(),
            dispatch,
        })
    }
}

impl ServiceInstance {
    pub fn service_type(&self) -> &str {
        self.model.service_type()
    }

    /// URN complet du type de service.
    pub fn type_urn(&self) -> String {
        self.model.type_urn()
    }

    pub fn service_id(&self) -> &str {
        self.model.service_id()
    }

    /// UDN du device qui porte ce service.
    pub fn udn(&self) -> &str {
        &self.udn
    }

    /// USN des annonces SSDP de ce service.
    pub fn usn(&self) -> String {
        format!("{}::{}", self.udn, self.type_urn())
    }

    /// Route du SCPD : `<device-path>/<service-type>`.
    pub fn scpd_url(&self) -> String {
        format!("{}/{}", self.device_path, self.model.service_type())
    }

    /// Route de contrôle SOAP.
    pub fn control_url(&self) -> String {
        format!("{}/control", self.scpd_url())
    }

    /// Route réservée aux abonnements GENA.
    pub fn event_sub_url(&self) -> String {
        format!("{}/event_sub", self.scpd_url())
    }

    /// En-tête `SOAPAction` d'une action de ce service.
    pub fn soap_action(&self, action: &str) -> Option<&str> {
        self.dispatch
            .iter()
            .find(|e| e.name == action)
            .map(|e| e.soap_action.as_str())
    }

    /// Génère l'élément `<service>` de la description du device.
    pub fn to_xml_element(&self) -> Element {
        let mut elem = Element::new("service");

        let mut service_type = Element::new("serviceType");
        service_type.children.push(XMLNode::Text(self.type_urn()));
        elem.children.push(XMLNode::Element(service_type));

        let mut service_id = Element::new("serviceId");
        service_id
            .children
            .push(XMLNode::Text(self.service_id().to_string()));
        elem.children.push(XMLNode::Element(service_id));

        let mut scpd_url = Element::new("SCPDURL");
        scpd_url.children.push(XMLNode::Text(self.scpd_url()));
        elem.children.push(XMLNode::Element(scpd_url));

        let mut control_url = Element::new("controlURL");
        control_url.children.push(XMLNode::Text(self.control_url()));
        elem.children.push(XMLNode::Element(control_url));

        let mut event_sub_url = Element::new("eventSubURL");
        event_sub_url
            .children
            .push(XMLNode::Text(self.event_sub_url()));
        elem.children.push(XMLNode::Element(event_sub_url));

        elem
    }

    /// Génère l'élément racine du SCPD.
    pub fn scpd_element(&self) -> Element {
        let mut elem = Element::new("scpd");
        elem.attributes.insert(
            "xmlns".to_string(),
            "urn:schemas-upnp-org:service-1-0".to_string(),
        );

        // specVersion
        let mut spec = Element::new("specVersion");
        let mut major = Element::new("major");
        major.children.push(XMLNode::Text("1".to_string()));
        spec.children.push(XMLNode::Element(major));

        let mut minor = Element::new("minor");
        minor.children.push(XMLNode::Text("0".to_string()));
        spec.children.push(XMLNode::Element(minor));

        elem.children.push(XMLNode::Element(spec));

        if !self.model.actions().is_empty() {
            elem.children
                .push(XMLNode::Element(self.model.actions().to_xml_element()));
        }

        if !self.model.state_table().is_empty() {
            elem.children
                .push(XMLNode::Element(self.model.state_table().to_xml_element()));
        }

        elem
    }

    /// Sérialise le SCPD complet.
    pub fn scpd_xml(&self) -> Result<String, xmltree::Error> {
        let config = EmitterConfig::new()
            .perform_indent(true)
            .indent_string("  ")
            .write_document_declaration(false);

        let mut buf = Vec::new();
        self.scpd_element().write_with_config(&mut buf, config)?;

        let mut xml = String::from_utf8_lossy(&buf).to_string();
        xml.insert_str(0, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        Ok(xml)
    }

    /// Dispatche une requête de contrôle SOAP.
    ///
    /// 1. Enveloppe illisible → HTTP 400.
    /// 2. Action inconnue du service → fault `401 Invalid Action`.
    /// 3. Argument manquant ou inconvertible → fault `402 Invalid Args`.
    /// 4. Le handler reçoit les entrées coercées dans l'ordre déclaré et
    ///    rend les sorties dans l'ordre déclaré, ou un fault typé.
    pub fn dispatch_control(&self, body: &[u8]) -> ControlOutcome {
        let call = match ActionCall::parse(body) {
            Ok(call) => call,
            Err(e) => {
                warn!("❌ Unreadable SOAP request for {}: {}", self.scpd_url(), e);
                return ControlOutcome {
                    status: 400,
                    body: String::new(),
                };
            }
        };

        debug!(
            service = self.model.service_type(),
            action = call.name.as_str(),
            "Control request"
        );

        let type_urn = self.type_urn();
        let entry = self.dispatch.iter().find(|e| {
            e.name == call.name
                && call
                    .namespace
                    .as_ref()
                    .map(|ns| ns == &type_urn)
                    .unwrap_or(true)
        });

        let entry = match entry {
            Some(entry) => entry,
            None => {
                info!(
                    "❌ Unknown action {} on {}",
                    call.name,
                    self.model.service_type()
                );
                return self.fault_outcome(&UpnpFault::invalid_action());
            }
        };

        // Extraction des arguments d'entrée, dans l'ordre déclaré
        let mut inputs: Vec<StateValue> = Vec::with_capacity(entry.in_params.len());
        for (name, var_type) in &entry.in_params {
            let raw = match call.arg(name) {
                Some(raw) => raw,
                None => {
                    info!("❌ Missing argument {} for {}", name, entry.name);
                    return self.fault_outcome(&UpnpFault::invalid_args());
                }
            };
            match var_type.parse_value(raw) {
                Ok(value) => inputs.push(value),
                Err(e) => {
                    info!("❌ Argument {} of {} rejected: {}", name, entry.name, e);
                    return self.fault_outcome(&UpnpFault::invalid_args());
                }
            }
        }

        let handler = match &entry.handler {
            Some(handler) => handler,
            None => {
                return self.fault_outcome(&UpnpFault::new(
                    602,
                    "Optional Action Not Implemented",
                ));
            }
        };

        let outputs = match handler(&inputs) {
            Ok(outputs) => outputs,
            Err(fault) => return self.fault_outcome(&fault),
        };

        if outputs.len() != entry.out_params.len() {
            error!(
                "❌ Handler for {} returned {} values, {} declared",
                entry.name,
                outputs.len(),
                entry.out_params.len()
            );
            return self.fault_outcome(&UpnpFault::action_failed());
        }

        let values: Vec<(String, String)> = entry
            .out_params
            .iter()
            .cloned()
            .zip(outputs.iter().map(StateValue::to_string))
            .collect();

        match build_soap_response(&type_urn, &entry.name, &values) {
            Ok(xml) => ControlOutcome {
                status: 200,
                body: xml,
            },
            Err(e) => {
                error!("Failed to serialize SOAP response for {}: {}", entry.name, e);
                ControlOutcome {
                    status: 500,
                    body: String::new(),
                }
            }
        }
    }

    fn fault_outcome(&self, fault: &UpnpFault) -> ControlOutcome {
        match build_soap_fault(fault) {
            Ok(xml) => ControlOutcome {
                status: 500,
                body: xml,
            },
            Err(e) => {
                error!("Failed to serialize SOAP fault: {}", e);
                ControlOutcome {
                    status: 500,
                    body: String::new(),
                }
            }
        }
    }

    /// Enregistre les routes du service dans le serveur HTTP.
    pub async fn register_urls(self: &Arc<Self>, server: &mut Server) {
        info!(
            "✅ Service {} available at {} (control: {})",
            self.model.service_type(),
            self.scpd_url(),
            self.control_url(),
        );

        // SCPD
        let instance_scpd = Arc::clone(self);
        server
            .add_get(&self.scpd_url(), move || {
                let instance = Arc::clone(&instance_scpd);
                async move { instance.scpd_handler().await }
            })
            .await;

        // Contrôle SOAP : seul POST est admis, le reste vaut 400
        let instance_control = Arc::clone(self);
        server
            .add_request_handler(&self.control_url(), move |method: Method, body: String| {
                let instance = Arc::clone(&instance_control);
                async move {
                    if method != Method::POST {
                        warn!(
                            "❌ {} request on control URL {}",
                            method,
                            instance.control_url()
                        );
                        return StatusCode::BAD_REQUEST.into_response();
                    }
                    instance.control_handler(body).await
                }
            })
            .await;

        // Événements GENA, hors périmètre de ce runtime
        let service_type = self.model.service_type().to_string();
        server
            .add_any(&self.event_sub_url(), move || {
                let service_type = service_type.clone();
                async move {
                    warn!("Event subscription requested on {} (unimplemented)", service_type);
                    StatusCode::NOT_IMPLEMENTED.into_response()
                }
            })
            .await;
    }

    async fn scpd_handler(&self) -> Response {
        match self.scpd_xml() {
            Ok(xml) => (
                StatusCode::OK,
                [(axum::http::header::CONTENT_TYPE, "text/xml; charset=\"utf-8\"")],
                xml,
            )
                .into_response(),
            Err(e) => {
                error!("Failed to serialize SCPD XML: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    async fn control_handler(&self, body: String) -> Response {
        let outcome = self.dispatch_control(body.as_bytes());
        let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(axum::http::header::CONTENT_TYPE, "text/xml; charset=\"utf-8\"")],
            outcome.body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, Argument};
    use crate::soap::build_soap_request;
    use crate::state_variables::StateVariable;
    use std::sync::Arc as StdArc;

    fn clock_service() -> Service {
        let mut service = Service::new("Clock");

        let time_var = StdArc::new(StateVariable::new("CurrentTime", StateVarType::String));
        let offset_var = StdArc::new(StateVariable::new("Offset", StateVarType::I4));
        service.add_variable(time_var.clone());
        service.add_variable(offset_var.clone());

        let mut get_time = Action::new("GetTime");
        get_time.add_argument(Argument::new_in("Offset", &offset_var));
        get_time.add_argument(Argument::new_retval("Time", &time_var));
        get_time.add_argument(Argument::new_out("Zone", &time_var));

        service
            .register_action(get_time, |args| {
                let offset = match &args[0] {
                    StateValue::I4(v) => *v,
                    _ => return Err(UpnpFault::invalid_args()),
                };
                if offset < 0 {
                    return Err(UpnpFault::new(701, "Offset out of range"));
                }
                Ok(vec![
                    StateValue::String(format!("12:00:{:02}", offset)),
                    StateValue::String("UTC".to_string()),
                ])
            })
            .unwrap();

        service
    }

    fn instance() -> ServiceInstance {
        clock_service()
            .create_instance("/TestDevice", "uuid:0e042ba4-82f1-4531-bd35-b455efebc627")
            .unwrap()
    }

    #[test]
    fn test_routes_derive_from_device_path() {
        let instance = instance();
        assert_eq!(instance.scpd_url(), "/TestDevice/Clock");
        assert_eq!(instance.control_url(), "/TestDevice/Clock/control");
        assert_eq!(instance.event_sub_url(), "/TestDevice/Clock/event_sub");
    }

    #[test]
    fn test_soap_action_header_registered() {
        let instance = instance();
        assert_eq!(
            instance.soap_action("GetTime").unwrap(),
            "urn:schemas-upnp-org:service:Clock:1#GetTime"
        );
    }

    #[test]
    fn test_dispatch_success_ordered_outs() {
        let instance = instance();
        let request = build_soap_request(
            "urn:schemas-upnp-org:service:Clock:1",
            "GetTime",
            &[("Offset", "5")],
        )
        .unwrap();

        let outcome = instance.dispatch_control(request.as_bytes());
        assert_eq!(outcome.status, 200);
        assert!(outcome.body.contains("<u:GetTimeResponse"));
        // Le retval précède la seconde sortie
        let time = outcome.body.find("<Time>12:00:05</Time>").unwrap();
        let zone = outcome.body.find("<Zone>UTC</Zone>").unwrap();
        assert!(time < zone);
    }

    #[test]
    fn test_dispatch_unknown_action() {
        let instance = instance();
        let request = build_soap_request(
            "urn:schemas-upnp-org:service:Clock:1",
            "SelfDestruct",
            &[],
        )
        .unwrap();

        let outcome = instance.dispatch_control(request.as_bytes());
        assert_eq!(outcome.status, 500);
        assert!(outcome.body.contains("<errorCode>401</errorCode>"));
        assert!(outcome
            .body
            .contains("<errorDescription>Invalid Action</errorDescription>"));
    }

    #[test]
    fn test_dispatch_wrong_namespace() {
        let instance = instance();
        let request = build_soap_request(
            "urn:schemas-upnp-org:service:SomethingElse:1",
            "GetTime",
            &[("Offset", "5")],
        )
        .unwrap();

        let outcome = instance.dispatch_control(request.as_bytes());
        assert!(outcome.body.contains("<errorCode>401</errorCode>"));
    }

    #[test]
    fn test_dispatch_bad_argument() {
        let instance = instance();
        let request = build_soap_request(
            "urn:schemas-upnp-org:service:Clock:1",
            "GetTime",
            &[("Offset", "not-a-number")],
        )
        .unwrap();

        let outcome = instance.dispatch_control(request.as_bytes());
        assert_eq!(outcome.status, 500);
        assert!(outcome.body.contains("<errorCode>402</errorCode>"));
    }

    #[test]
    fn test_dispatch_missing_argument() {
        let instance = instance();
        let request =
            build_soap_request("urn:schemas-upnp-org:service:Clock:1", "GetTime", &[]).unwrap();

        let outcome = instance.dispatch_control(request.as_bytes());
        assert!(outcome.body.contains("<errorCode>402</errorCode>"));
    }

    #[test]
    fn test_dispatch_handler_fault() {
        let instance = instance();
        let request = build_soap_request(
            "urn:schemas-upnp-org:service:Clock:1",
            "GetTime",
            &[("Offset", "-1")],
        )
        .unwrap();

        let outcome = instance.dispatch_control(request.as_bytes());
        assert!(outcome.body.contains("<errorCode>701</errorCode>"));
        assert!(outcome
            .body
            .contains("<errorDescription>Offset out of range</errorDescription>"));
    }

    #[test]
    fn test_dispatch_malformed_envelope() {
        let instance = instance();
        let outcome = instance.dispatch_control(b"this is not soap");
        assert_eq!(outcome.status, 400);
    }

    #[test]
    fn test_action_without_handler() {
        let mut service = Service::new("Clock");
        service.add_action(Action::new("Optional")).unwrap();
        let instance = service.create_instance("/TestDevice", "uuid:x").unwrap();

        let request = build_soap_request(
            "urn:schemas-upnp-org:service:Clock:1",
            "Optional",
            &[],
        )
        .unwrap();
        let outcome = instance.dispatch_control(request.as_bytes());
        assert!(outcome.body.contains("<errorCode>602</errorCode>"));
    }

    #[test]
    fn test_scpd_contains_catalogs() {
        let instance = instance();
        let xml = instance.scpd_xml().unwrap();
        assert!(xml.contains("urn:schemas-upnp-org:service-1-0"));
        assert!(xml.contains("<name>GetTime</name>"));
        assert!(xml.contains("<name>CurrentTime</name>"));
    }

    #[test]
    fn test_malformed_service_id_rejected() {
        let mut service = Service::new("Clock");
        service.set_service_id("ClockService");
        assert!(matches!(
            service.create_instance("/TestDevice", "uuid:x"),
            Err(ServiceError::UnknownServiceId(_, _))
        ));
    }
}
