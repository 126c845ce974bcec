//! # Module description - Parseur des documents distants
//!
//! Côté control point : parsing des documents de description de device
//! et des SCPD récupérés sur le réseau. Le parseur est tolérant aux
//! blancs autour du texte, vérifie le namespace et la version du
//! schéma, et rejette les identifiants hors `\w` pour se prémunir des
//! injections dans les requêtes SOAP construites ensuite.
//!
//! Les SCPD se parsent vers les mêmes types de modèle que côté serveur
//! ([`Action`], [`StateVariable`]) : un type de service inconnu se
//! découvre par ses capacités, sans code dédié.

use std::io::BufReader;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use xmltree::Element;

use crate::actions::{Action, ActionError, Argument, Direction};
use crate::state_variables::StateVariable;
use crate::value_ranges::ValueRange;
use crate::variable_types::{StateValueError, StateVarType};

/// Namespace du document de description de device.
pub const DEVICE_NS: &str = "urn:schemas-upnp-org:device-1-0";

/// Namespace du SCPD.
pub const SERVICE_NS: &str = "urn:schemas-upnp-org:service-1-0";

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("XML parse error: {0}")]
    Xml(#[from] xmltree::ParseError),

    #[error("wrong document namespace: expected {expected}, found {found}")]
    WrongNamespace { expected: &'static str, found: String },

    #[error("unsupported spec version {0}")]
    UnsupportedVersion(String),

    #[error("missing element {0}")]
    MissingElement(&'static str),

    #[error("identifier rejected: {0:?}")]
    InvalidIdentifier(String),

    #[error("allowedValueRange on non-numeric variable {0}")]
    NonNumericRange(String),

    #[error(transparent)]
    Value(#[from] StateValueError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Description d'un device distant.
#[derive(Debug, Clone)]
pub struct DeviceDescription {
    pub device_type: String,
    pub udn: String,
    pub friendly_name: String,
    pub manufacturer: String,
    pub model_name: String,
    pub manufacturer_url: Option<String>,
    pub model_description: Option<String>,
    pub model_number: Option<String>,
    pub model_url: Option<String>,
    pub serial_number: Option<String>,
    pub upc: Option<String>,
    pub services: Vec<ServiceDescription>,
    pub sub_devices: Vec<DeviceDescription>,
}

/// Entrée de service dans une description de device.
#[derive(Debug, Clone)]
pub struct ServiceDescription {
    pub service_type: String,
    pub service_id: String,
    pub scpd_url: String,
    pub control_url: String,
    pub event_sub_url: String,
}

/// SCPD parsé : catalogue d'actions et table d'état.
#[derive(Debug, Clone)]
pub struct Scpd {
    pub actions: Vec<Action>,
    pub variables: Vec<Arc<StateVariable>>,
}

impl Scpd {
    pub fn get_action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name() == name)
    }

    pub fn get_variable(&self, name: &str) -> Option<&Arc<StateVariable>> {
        self.variables.iter().find(|v| v.name() == name)
    }
}

/// Parse un document de description de device.
pub fn parse_device_description(xml: &[u8]) -> Result<DeviceDescription, DescriptionError> {
    let root = Element::parse(BufReader::new(xml))?;
    check_namespace(&root, DEVICE_NS)?;
    check_spec_version(&root)?;

    let device = root
        .get_child("device")
        .ok_or(DescriptionError::MissingElement("device"))?;
    parse_device_element(device)
}

fn parse_device_element(elem: &Element) -> Result<DeviceDescription, DescriptionError> {
    let mut services = Vec::new();
    if let Some(list) = elem.get_child("serviceList") {
        for child in list.children.iter().filter_map(|n| n.as_element()) {
            if child.name == "service" {
                services.push(parse_service_entry(child)?);
            }
        }
    }

    let mut sub_devices = Vec::new();
    if let Some(list) = elem.get_child("deviceList") {
        for child in list.children.iter().filter_map(|n| n.as_element()) {
            if child.name == "device" {
                sub_devices.push(parse_device_element(child)?);
            }
        }
    }

    Ok(DeviceDescription {
        device_type: required_text(elem, "deviceType")?,
        udn: required_text(elem, "UDN")?,
        friendly_name: required_text(elem, "friendlyName")?,
        manufacturer: required_text(elem, "manufacturer")?,
        model_name: required_text(elem, "modelName")?,
        manufacturer_url: child_text(elem, "manufacturerURL"),
        model_description: child_text(elem, "modelDescription"),
        model_number: child_text(elem, "modelNumber"),
        model_url: child_text(elem, "modelURL"),
        serial_number: child_text(elem, "serialNumber"),
        upc: child_text(elem, "UPC"),
        services,
        sub_devices,
    })
}

fn parse_service_entry(elem: &Element) -> Result<ServiceDescription, DescriptionError> {
    Ok(ServiceDescription {
        service_type: required_text(elem, "serviceType")?,
        service_id: required_text(elem, "serviceId")?,
        scpd_url: required_text(elem, "SCPDURL")?,
        control_url: required_text(elem, "controlURL")?,
        event_sub_url: required_text(elem, "eventSubURL")?,
    })
}

/// Parse un document SCPD.
pub fn parse_scpd(xml: &[u8]) -> Result<Scpd, DescriptionError> {
    let root = Element::parse(BufReader::new(xml))?;
    check_namespace(&root, SERVICE_NS)?;
    check_spec_version(&root)?;

    let mut actions = Vec::new();
    if let Some(list) = root.get_child("actionList") {
        for child in list.children.iter().filter_map(|n| n.as_element()) {
            if child.name == "action" {
                actions.push(parse_action(child)?);
            }
        }
    }

    let mut variables = Vec::new();
    if let Some(table) = root.get_child("serviceStateTable") {
        for child in table.children.iter().filter_map(|n| n.as_element()) {
            if child.name == "stateVariable" {
                variables.push(Arc::new(parse_state_variable(child)?));
            }
        }
    }

    Ok(Scpd { actions, variables })
}

fn parse_action(elem: &Element) -> Result<Action, DescriptionError> {
    let name = checked_identifier(required_text(elem, "name")?)?;
    let mut action = Action::new(name);

    if let Some(list) = elem.get_child("argumentList") {
        for child in list.children.iter().filter_map(|n| n.as_element()) {
            if child.name != "argument" {
                continue;
            }
            let arg_name = checked_identifier(required_text(child, "name")?)?;
            let related = checked_identifier(required_text(child, "relatedStateVariable")?)?;
            let direction_raw = required_text(child, "direction")?;
            // Le SCPD ne distingue pas retval : seule la position d'une
            // sortie (première ou non) porte cette convention
            let direction = match direction_raw.as_str() {
                "in" => Direction::In,
                "out" => Direction::Out,
                other => return Err(DescriptionError::InvalidIdentifier(other.to_string())),
            };
            action.add_argument(Argument::new(arg_name, direction, related));
        }
    }

    action.validate()?;
    Ok(action)
}

fn parse_state_variable(elem: &Element) -> Result<StateVariable, DescriptionError> {
    let name = checked_identifier(required_text(elem, "name")?)?;
    let data_type = StateVarType::from_str(&required_text(elem, "dataType")?)?;

    let send_events = elem
        .attributes
        .get("sendEvents")
        .map(|v| v.trim() == "yes")
        .unwrap_or(true);

    let mut variable = StateVariable::new(name, data_type).evented(send_events);

    if let Some(default) = child_text(elem, "defaultValue") {
        checked_identifier(default.clone())?;
        variable = variable.with_default(&default)?;
    }

    if let Some(list) = elem.get_child("allowedValueList") {
        let mut values = Vec::new();
        for child in list.children.iter().filter_map(|n| n.as_element()) {
            if child.name == "allowedValue" {
                let value = child
                    .get_text()
                    .map(|t| t.trim().to_string())
                    .unwrap_or_default();
                values.push(checked_identifier(value)?);
            }
        }
        variable = variable.with_allowed_values(values);
    }

    if let Some(range) = elem.get_child("allowedValueRange") {
        if !data_type.is_numeric() {
            return Err(DescriptionError::NonNumericRange(
                variable.name().to_string(),
            ));
        }
        let min = data_type.parse_value(&required_text(range, "minimum")?)?;
        let max = data_type.parse_value(&required_text(range, "maximum")?)?;
        variable = match child_text(range, "step") {
            Some(step) => {
                variable.with_range(ValueRange::with_step(min, max, data_type.parse_value(&step)?))
            }
            None => variable.with_range(ValueRange::new(min, max)),
        };
    }

    Ok(variable)
}

fn check_namespace(root: &Element, expected: &'static str) -> Result<(), DescriptionError> {
    match root.namespace.as_deref() {
        Some(ns) if ns == expected => Ok(()),
        other => Err(DescriptionError::WrongNamespace {
            expected,
            found: other.unwrap_or("<none>").to_string(),
        }),
    }
}

fn check_spec_version(root: &Element) -> Result<(), DescriptionError> {
    let spec = root
        .get_child("specVersion")
        .ok_or(DescriptionError::MissingElement("specVersion"))?;
    let major = required_text(spec, "major")?;
    if major != "1" {
        return Err(DescriptionError::UnsupportedVersion(major));
    }
    Ok(())
}

fn child_text(elem: &Element, name: &str) -> Option<String> {
    elem.get_child(name)
        .and_then(|c| c.get_text())
        .map(|t| t.trim().to_string())
}

fn required_text(elem: &Element, name: &'static str) -> Result<String, DescriptionError> {
    child_text(elem, name).ok_or(DescriptionError::MissingElement(name))
}

/// Garde anti-injection : seuls les caractères de mot sont admis.
fn checked_identifier(value: String) -> Result<String, DescriptionError> {
    if crate::valid_identifier(&value) {
        Ok(value)
    } else {
        Err(DescriptionError::InvalidIdentifier(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::Device;
    use crate::services::Service;
    use crate::variable_types::StateValue;

    fn emitted_description() -> String {
        let mut device = Device::new("TestDevice", "test");
        device.set_manufacturer("M");
        device.set_model_name("X");
        device.set_model_description("A test device");

        let mut service = Service::new("TestService");
        let var = Arc::new(StateVariable::new("TestVar", StateVarType::String));
        service.add_variable(var.clone());
        let mut action = Action::new("TestAction");
        action.add_argument(Argument::new_in("TestInput", &var));
        service.add_action(action).unwrap();
        device.add_service(service);

        device
            .create_instance()
            .unwrap()
            .description_xml()
            .unwrap()
    }

    #[test]
    fn test_parse_emitted_description() {
        let xml = emitted_description();
        let parsed = parse_device_description(xml.as_bytes()).unwrap();

        assert_eq!(
            parsed.device_type,
            "urn:schemas-upnp-org:device:TestDevice:1"
        );
        assert_eq!(parsed.friendly_name, "test");
        assert_eq!(parsed.manufacturer, "M");
        assert_eq!(parsed.model_name, "X");
        assert_eq!(parsed.model_description.as_deref(), Some("A test device"));
        assert_eq!(parsed.upc, None);
        assert!(parsed.udn.starts_with("uuid:"));

        assert_eq!(parsed.services.len(), 1);
        let service = &parsed.services[0];
        assert_eq!(
            service.service_type,
            "urn:schemas-upnp-org:service:TestService:1"
        );
        assert_eq!(service.scpd_url, "/TestDevice/TestService");
        assert_eq!(service.control_url, "/TestDevice/TestService/control");
        assert_eq!(service.event_sub_url, "/TestDevice/TestService/event_sub");
    }

    #[test]
    fn test_parse_emitted_scpd() {
        let mut service = Service::new("Dimmer");
        let level = Arc::new(
            StateVariable::new("LoadLevelTarget", StateVarType::UI1)
                .with_default("0")
                .unwrap()
                .with_range(ValueRange::new(StateValue::UI1(0), StateValue::UI1(100))),
        );
        service.add_variable(level.clone());
        let mut action = Action::new("SetLoadLevelTarget");
        action.add_argument(Argument::new_in("NewLoadLevelTarget", &level));
        service.add_action(action).unwrap();

        let instance = service.create_instance("/Dimmable", "uuid:x").unwrap();
        let xml = instance.scpd_xml().unwrap();

        let scpd = parse_scpd(xml.as_bytes()).unwrap();
        assert_eq!(scpd.actions.len(), 1);
        let action = scpd.get_action("SetLoadLevelTarget").unwrap();
        assert_eq!(action.arguments()[0].name(), "NewLoadLevelTarget");
        assert_eq!(
            action.arguments()[0].related_state_variable(),
            "LoadLevelTarget"
        );

        let variable = scpd.get_variable("LoadLevelTarget").unwrap();
        assert_eq!(variable.data_type(), StateVarType::UI1);
        assert_eq!(variable.default_value().unwrap().to_string(), "0");
        assert!(variable.allowed_range().is_some());
    }

    #[test]
    fn test_retval_reads_back_as_out() {
        let mut service = Service::new("Clock");
        let time = Arc::new(StateVariable::new("CurrentTime", StateVarType::String));
        service.add_variable(time.clone());
        let mut action = Action::new("GetTime");
        action.add_argument(Argument::new_retval("Time", &time));
        action.add_argument(Argument::new_out("Zone", &time));
        service.add_action(action).unwrap();

        let xml = service
            .create_instance("/Clock", "uuid:x")
            .unwrap()
            .scpd_xml()
            .unwrap();

        // Pas de syntaxe retval sur le câble : la convention est
        // positionnelle, la première sortie décodée reste un `out`
        assert!(!xml.contains("retval"));
        let scpd = parse_scpd(xml.as_bytes()).unwrap();
        let action = scpd.get_action("GetTime").unwrap();
        assert_eq!(action.arguments()[0].direction(), Direction::Out);
        assert_eq!(action.arguments()[0].name(), "Time");
        assert_eq!(action.arguments()[1].direction(), Direction::Out);
    }

    #[test]
    fn test_range_on_non_numeric_type_rejected() {
        let xml = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <serviceStateTable>
    <stateVariable sendEvents="no">
      <name>Label</name>
      <dataType>string</dataType>
      <allowedValueRange><minimum>0</minimum><maximum>9</maximum></allowedValueRange>
    </stateVariable>
  </serviceStateTable>
</scpd>"#;
        assert!(matches!(
            parse_scpd(xml.as_bytes()),
            Err(DescriptionError::NonNumericRange(_))
        ));
    }

    #[test]
    fn test_wrong_namespace_rejected() {
        let xml = r#"<?xml version="1.0"?>
<root xmlns="urn:example-org:wrong-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device/>
</root>"#;
        assert!(matches!(
            parse_device_description(xml.as_bytes()),
            Err(DescriptionError::WrongNamespace { .. })
        ));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let xml = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>2</major><minor>0</minor></specVersion>
</scpd>"#;
        assert!(matches!(
            parse_scpd(xml.as_bytes()),
            Err(DescriptionError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_injection_guard_on_action_name() {
        let xml = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action>
      <name>Bad&lt;/name&gt;Action</name>
    </action>
  </actionList>
</scpd>"#;
        assert!(matches!(
            parse_scpd(xml.as_bytes()),
            Err(DescriptionError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_whitespace_tolerated() {
        let xml = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>
    1
  </major><minor>0</minor></specVersion>
  <serviceStateTable>
    <stateVariable sendEvents="no">
      <name>
        Volume
      </name>
      <dataType>  ui2  </dataType>
    </stateVariable>
  </serviceStateTable>
</scpd>"#;
        let scpd = parse_scpd(xml.as_bytes()).unwrap();
        let variable = scpd.get_variable("Volume").unwrap();
        assert_eq!(variable.data_type(), StateVarType::UI2);
        assert!(!variable.send_events());
    }
}
