//! Implémentation de DeviceInstance.
//!
//! L'instance est l'arbre figé servi par le runtime : routes calculées,
//! services instanciés, liens parent en `Weak` (le device racine
//! possède seul le sous-arbre).

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock, Weak};

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::{error, info};
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::devices::{Device, DeviceError};
use crate::server::Server;
use crate::services::ServiceInstance;

/// Instance d'un device UPnP.
pub struct DeviceInstance {
    device_type: String,
    version: u8,
    friendly_name: String,
    udn: String,

    manufacturer: String,
    model_name: String,
    manufacturer_url: Option<String>,
    model_description: Option<String>,
    model_number: Option<String>,
    model_url: Option<String>,
    serial_number: Option<String>,
    upc: Option<String>,

    /// Chemin HTTP du device : `/` + types jusqu'à la racine, racine en
    /// dernier (le chemin d'un enfant préfixe celui de son parent).
    path: String,

    /// Lien vers le parent, consultation seule
    parent: RwLock<Weak<DeviceInstance>>,

    devices: Vec<Arc<DeviceInstance>>,
    services: Vec<Arc<ServiceInstance>>,
}

impl std::fmt::Debug for DeviceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceInstance")
            .field("device_type", &self.device_type)
            .field("friendly_name", &self.friendly_name)
            .field("udn", &self.udn)
            .field("path", &self.path)
            .field("devices", &self.devices)
            .field("services", &self.services)
            .finish()
    }
}

impl Device {
    /// Fige la définition en un arbre d'instances.
    ///
    /// Le device est validé, chaque service instancié avec ses types
    /// résolus, et les liens parent posés. L'arbre retourné est en
    /// lecture seule : la structure ne change plus une fois le runtime
    /// démarré.
    pub fn create_instance(&self) -> Result<Arc<DeviceInstance>, DeviceError> {
        self.validate()?;
        instantiate(self, "")
    }
}

fn instantiate(def: &Device, parent_path: &str) -> Result<Arc<DeviceInstance>, DeviceError> {
    let path = format!("/{}{}", def.device_type(), parent_path);
    let udn = def.udn();

    let mut services = Vec::with_capacity(def.services().len());
    for service in def.services() {
        services.push(Arc::new(service.create_instance(&path, &udn)?));
    }

    let mut devices = Vec::with_capacity(def.devices().len());
    for child in def.devices() {
        devices.push(instantiate(child, &path)?);
    }

    let node = Arc::new(DeviceInstance {
        device_type: def.device_type().to_string(),
        version: 1,
        friendly_name: def.friendly_name().to_string(),
        udn,
        manufacturer: def.manufacturer().to_string(),
        model_name: def.model_name().to_string(),
        manufacturer_url: def.manufacturer_url().map(str::to_string),
        model_description: def.model_description().map(str::to_string),
        model_number: def.model_number().map(str::to_string),
        model_url: def.model_url().map(str::to_string),
        serial_number: def.serial_number().map(str::to_string),
        upc: def.upc().map(str::to_string),
        path,
        parent: RwLock::new(Weak::new()),
        devices,
        services,
    });

    for child in &node.devices {
        *child.parent.write().unwrap() = Arc::downgrade(&node);
    }

    Ok(node)
}

impl DeviceInstance {
    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    /// URN complet du type de device.
    pub fn type_urn(&self) -> String {
        format!(
            "urn:schemas-upnp-org:device:{}:{}",
            self.device_type, self.version
        )
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// UDN du device : `uuid:{uuid}`.
    pub fn udn(&self) -> &str {
        &self.udn
    }

    /// Chemin HTTP du device.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Device parent, `None` pour la racine.
    pub fn parent(&self) -> Option<Arc<DeviceInstance>> {
        self.parent.read().unwrap().upgrade()
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    pub fn devices(&self) -> &[Arc<DeviceInstance>] {
        &self.devices
    }

    pub fn services(&self) -> &[Arc<ServiceInstance>] {
        &self.services
    }

    /// Couples `(NT, USN)` annoncés en SSDP pour tout l'arbre, dans
    /// l'ordre : `upnp:rootdevice`, puis pour chaque device son UUID,
    /// son type, puis les types de ses services.
    pub fn announcements(&self) -> Vec<(String, String)> {
        let root_udn = self.udn.clone();
        let mut keys = vec![(
            "upnp:rootdevice".to_string(),
            format!("{}::upnp:rootdevice", root_udn),
        )];
        self.collect_announcements(&root_udn, &mut keys);
        keys
    }

    fn collect_announcements(&self, root_udn: &str, keys: &mut Vec<(String, String)>) {
        // Un NT uuid: porte son propre nom en USN
        keys.push((self.udn.clone(), self.udn.clone()));

        let type_urn = self.type_urn();
        keys.push((type_urn.clone(), format!("{}::{}", root_udn, type_urn)));

        for service in &self.services {
            let service_urn = service.type_urn();
            keys.push((service_urn.clone(), format!("{}::{}", root_udn, service_urn)));
        }

        for child in &self.devices {
            child.collect_announcements(root_udn, keys);
        }
    }

    /// Génère l'élément `<device>` de la description.
    ///
    /// Les champs optionnels absents sont omis, jamais rendus vides.
    pub fn to_xml_element(&self) -> Element {
        let mut elem = Element::new("device");

        push_text(&mut elem, "deviceType", &self.type_urn());
        push_text(&mut elem, "UDN", &self.udn);
        push_text(&mut elem, "friendlyName", &self.friendly_name);
        push_text(&mut elem, "manufacturer", &self.manufacturer);
        push_opt(&mut elem, "manufacturerURL", self.manufacturer_url.as_deref());
        push_opt(&mut elem, "modelDescription", self.model_description.as_deref());
        push_text(&mut elem, "modelName", &self.model_name);
        push_opt(&mut elem, "modelNumber", self.model_number.as_deref());
        push_opt(&mut elem, "modelURL", self.model_url.as_deref());
        push_opt(&mut elem, "serialNumber", self.serial_number.as_deref());
        push_opt(&mut elem, "UPC", self.upc.as_deref());

        if !self.services.is_empty() {
            let mut service_list = Element::new("serviceList");
            for service in &self.services {
                service_list
                    .children
                    .push(XMLNode::Element(service.to_xml_element()));
            }
            elem.children.push(XMLNode::Element(service_list));
        }

        if !self.devices.is_empty() {
            let mut device_list = Element::new("deviceList");
            for child in &self.devices {
                device_list
                    .children
                    .push(XMLNode::Element(child.to_xml_element()));
            }
            elem.children.push(XMLNode::Element(device_list));
        }

        elem
    }

    /// Génère le document de description complet du device racine.
    pub fn description_element(&self) -> Element {
        let mut root = Element::new("root");
        root.attributes.insert(
            "xmlns".to_string(),
            "urn:schemas-upnp-org:device-1-0".to_string(),
        );

        let mut spec = Element::new("specVersion");
        let mut major = Element::new("major");
        major.children.push(XMLNode::Text("1".to_string()));
        spec.children.push(XMLNode::Element(major));

        let mut minor = Element::new("minor");
        minor.children.push(XMLNode::Text("0".to_string()));
        spec.children.push(XMLNode::Element(minor));

        root.children.push(XMLNode::Element(spec));
        root.children.push(XMLNode::Element(self.to_xml_element()));

        root
    }

    /// Sérialise le document de description. La sortie est déterministe
    /// pour un arbre inchangé.
    pub fn description_xml(&self) -> Result<String, xmltree::Error> {
        let config = EmitterConfig::new()
            .perform_indent(true)
            .indent_string("  ")
            .write_document_declaration(false);

        let mut buf = Vec::new();
        self.description_element().write_with_config(&mut buf, config)?;

        let mut xml = String::from_utf8_lossy(&buf).to_string();
        xml.insert_str(0, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        Ok(xml)
    }

    /// Page d'index lisible listant les devices et leurs services.
    pub fn index_html(&self) -> String {
        let mut html = String::from("<html><head><title>");
        html.push_str(&self.friendly_name);
        html.push_str("</title></head><body>\n");
        self.index_section(&mut html);
        html.push_str("</body></html>\n");
        html
    }

    fn index_section(&self, html: &mut String) {
        html.push_str(&format!(
            "<h1>{} ({})</h1>\n<p><a href=\"/description\">description</a></p>\n",
            self.friendly_name, self.device_type
        ));
        if !self.services.is_empty() {
            html.push_str("<ul>\n");
            for service in &self.services {
                html.push_str(&format!(
                    "<li><a href=\"{}\">{}</a></li>\n",
                    service.scpd_url(),
                    service.service_type()
                ));
            }
            html.push_str("</ul>\n");
        }
        for child in &self.devices {
            child.index_section(html);
        }
    }

    /// Enregistre toutes les routes du device et de ses services.
    ///
    /// La racine publie `/` (index) et `/description` ; chaque service
    /// publie son SCPD, son URL de contrôle et son URL d'événements.
    pub fn register_urls<'a>(
        self: &'a Arc<Self>,
        server: &'a mut Server,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if self.is_root() {
                info!(
                    "✅ Device description for {} available at /description",
                    self.friendly_name
                );

                let instance_index = Arc::clone(self);
                server
                    .add_get("/", move || {
                        let instance = Arc::clone(&instance_index);
                        async move { Html(instance.index_html()).into_response() }
                    })
                    .await;

                let instance_desc = Arc::clone(self);
                server
                    .add_get("/description", move || {
                        let instance = Arc::clone(&instance_desc);
                        async move { instance.description_handler().await }
                    })
                    .await;
            }

            for service in &self.services {
                service.register_urls(server).await;
            }

            for child in &self.devices {
                child.register_urls(server).await;
            }
        })
    }

    async fn description_handler(&self) -> Response {
        match self.description_xml() {
            Ok(xml) => (
                StatusCode::OK,
                [(axum::http::header::CONTENT_TYPE, "text/xml; charset=\"utf-8\"")],
                xml,
            )
                .into_response(),
            Err(e) => {
                error!("Failed to serialize device description XML: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

fn push_text(parent: &mut Element, name: &str, text: &str) {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(text.to_string()));
    parent.children.push(XMLNode::Element(elem));
}

fn push_opt(parent: &mut Element, name: &str, text: Option<&str>) {
    if let Some(text) = text {
        push_text(parent, name, text);
    }
}
