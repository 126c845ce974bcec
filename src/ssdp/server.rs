//! Serveur SSDP : annonces d'un arbre de devices.
//!
//! Deux activités partagent la socket UDP : la boucle de NOTIFY
//! périodiques (un thread), et le répondeur de M-SEARCH adossé au
//! thread de réception ; chaque recherche acceptée est servie par un
//! thread éphémère. Seul le thread de réception lit la socket, les
//! autres ne font qu'écrire.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, trace, warn};

use super::advertisement::{Advertisement, Notification, Search, SearchResponse, NTS_ALIVE, NTS_BYEBYE};
use super::SsdpConfig;
use crate::devices::DeviceInstance;

/// État partagé entre les threads d'annonce.
struct ServerState {
    config: SsdpConfig,
    hosts: Vec<Ipv4Addr>,
    http_port: u16,
    server_header: String,

    /// Couples `(NT, USN)` dans l'ordre d'annonce
    announcements: Vec<(String, String)>,
}

impl ServerState {
    fn group_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.config.group), self.config.port)
    }

    fn location(&self, host: Ipv4Addr) -> String {
        format!("http://{}:{}/description", host, self.http_port)
    }

    /// Clés répondant à une cible de recherche : `upnp:rootdevice`, un
    /// URN de type de device hébergé, ou tout (derrière `answer_all`).
    fn keys_for_target(&self, target: &str) -> Vec<&(String, String)> {
        if target == "ssdp:all" {
            if self.config.answer_all {
                return self.announcements.iter().collect();
            }
            return Vec::new();
        }
        if target != "upnp:rootdevice" && !target.starts_with("urn:schemas-upnp-org:device:") {
            return Vec::new();
        }
        self.announcements
            .iter()
            .filter(|(nt, _)| nt == target)
            .collect()
    }
}

/// Serveur SSDP gérant annonces et réponses aux recherches.
pub struct SsdpServer {
    config: SsdpConfig,
    socket: Option<Arc<UdpSocket>>,
    state: Option<Arc<ServerState>>,
    running: Arc<AtomicBool>,
    notify_handle: Option<JoinHandle<()>>,
    listener_handle: Option<JoinHandle<()>>,
}

impl SsdpServer {
    /// Crée un serveur SSDP non démarré.
    pub fn new(config: SsdpConfig) -> Self {
        Self {
            config,
            socket: None,
            state: None,
            running: Arc::new(AtomicBool::new(false)),
            notify_handle: None,
            listener_handle: None,
        }
    }

    /// Démarre les annonces pour un arbre de devices.
    ///
    /// # Arguments
    ///
    /// * `root` - Instance racine, référence partagée en lecture seule
    /// * `http_port` - Port du serveur HTTP servant `/description`
    pub fn start(&mut self, root: Arc<DeviceInstance>, http_port: u16) -> std::io::Result<()> {
        let socket = self.open_socket()?;
        let socket = Arc::new(socket);
        self.socket = Some(Arc::clone(&socket));

        let hosts = local_ipv4_addresses();
        if hosts.is_empty() {
            warn!("No usable IPv4 interface found, SSDP announcements disabled");
        }

        let state = Arc::new(ServerState {
            config: self.config.clone(),
            hosts,
            http_port,
            server_header: crate::server_header(),
            announcements: root.announcements(),
        });
        self.state = Some(Arc::clone(&state));

        self.running.store(true, Ordering::SeqCst);

        info!(
            "✅ SSDP server started on {}:{} ({} announcement keys)",
            self.config.group,
            self.config.port,
            state.announcements.len()
        );

        self.start_notify_loop(Arc::clone(&socket), Arc::clone(&state));
        self.start_listener(socket, state);

        Ok(())
    }

    fn open_socket(&self) -> std::io::Result<UdpSocket> {
        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket2.set_reuse_address(true)?;
        let bind_addr: SocketAddr =
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.config.port);
        socket2.bind(&bind_addr.into())?;

        let socket: UdpSocket = socket2.into();
        socket.join_multicast_v4(&self.config.group, &Ipv4Addr::UNSPECIFIED)?;
        socket.set_multicast_loop_v4(self.config.multicast_loop)?;
        socket.set_multicast_ttl_v4(self.config.ttl)?;
        socket.set_ttl(self.config.ttl)?;
        // Timeout court : les boucles observent le drapeau d'arrêt
        socket.set_read_timeout(Some(Duration::from_secs(1)))?;
        Ok(socket)
    }

    /// Boucle de NOTIFY périodiques.
    fn start_notify_loop(&mut self, socket: Arc<UdpSocket>, state: Arc<ServerState>) {
        let running = Arc::clone(&self.running);
        let interval = state.config.notify_interval;

        let handle = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                send_all_alive(&socket, &state);

                // Sommeil par pas d'une seconde pour réagir à l'arrêt
                let mut slept = Duration::ZERO;
                while slept < interval && running.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_secs(1));
                    slept += Duration::from_secs(1);
                }
            }
        });
        self.notify_handle = Some(handle);
    }

    /// Réception : parse les datagrammes et répond aux M-SEARCH.
    fn start_listener(&mut self, socket: Arc<UdpSocket>, state: Arc<ServerState>) {
        let running = Arc::clone(&self.running);

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 1024];
            while running.load(Ordering::SeqCst) {
                match socket.recv_from(&mut buf) {
                    Ok((n, src)) => {
                        let data = String::from_utf8_lossy(&buf[..n]).to_string();
                        match Advertisement::parse(&data) {
                            Ok(Advertisement::Search(search)) => {
                                handle_search(&socket, &state, search, src);
                            }
                            Ok(_) => {
                                // Annonces d'autres devices : rien à faire côté serveur
                            }
                            Err(e) => {
                                trace!("Unparseable SSDP datagram from {}: {}", src, e);
                            }
                        }
                    }
                    Err(e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        continue;
                    }
                    Err(e) => {
                        warn!("❌ SSDP read error: {}", e);
                    }
                }
            }
        });
        self.listener_handle = Some(handle);
    }

    /// Arrête les annonces : les threads se terminent, puis un byebye
    /// part pour chaque clé annoncée, dans l'ordre des alive.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.notify_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.listener_handle.take() {
            let _ = handle.join();
        }

        if let (Some(socket), Some(state)) = (self.socket.take(), self.state.take()) {
            info!("👋 SSDP server stopping, sending byebye for all announcements");
            send_all_byebye(&socket, &state);
        }
    }
}

impl Drop for SsdpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Envoie un tour complet de NOTIFY alive : pour chaque interface, pour
/// chaque clé d'annonce.
fn send_all_alive(socket: &UdpSocket, state: &ServerState) {
    debug!("Sending alive notifications");
    for host in &state.hosts {
        for (nt, usn) in &state.announcements {
            let notification = Notification {
                date: Utc::now(),
                host: state.config.group.to_string(),
                port: state.config.port,
                location: Some(state.location(*host)),
                max_age: Some(state.config.max_age),
                nt: nt.clone(),
                nts: NTS_ALIVE.to_string(),
                server: Some(state.server_header.clone()),
                usn: usn.clone(),
            };
            match socket.send_to(notification.to_wire().as_bytes(), state.group_addr()) {
                Ok(_) => trace!("NOTIFY alive: {} (NT={})", usn, nt),
                Err(e) => warn!("❌ Failed to send NOTIFY alive for {}: {}", usn, e),
            }
        }
    }
}

/// Envoie les NOTIFY byebye, une fois par clé, dans l'ordre des alive.
/// Un byebye ne porte ni LOCATION ni SERVER, inutile de le répéter par
/// interface.
fn send_all_byebye(socket: &UdpSocket, state: &ServerState) {
    for (nt, usn) in &state.announcements {
        let notification = Notification {
            date: Utc::now(),
            host: state.config.group.to_string(),
            port: state.config.port,
            location: None,
            max_age: None,
            nt: nt.clone(),
            nts: NTS_BYEBYE.to_string(),
            server: None,
            usn: usn.clone(),
        };
        match socket.send_to(notification.to_wire().as_bytes(), state.group_addr()) {
            Ok(_) => trace!("NOTIFY byebye: {} (NT={})", usn, nt),
            Err(e) => warn!("❌ Failed to send NOTIFY byebye for {}: {}", usn, e),
        }
    }
}

/// Sert un M-SEARCH : les cibles reconnues reçoivent une réponse
/// unicast par clé correspondante, depuis un thread éphémère.
fn handle_search(socket: &Arc<UdpSocket>, state: &Arc<ServerState>, search: Search, src: SocketAddr) {
    let responses = build_search_responses(state, &search, &src);
    if responses.is_empty() {
        info!("M-SEARCH for {} from {}: no matching target", search.st, src);
        return;
    }

    debug!(
        "M-SEARCH for {} from {}: answering with {} key(s)",
        search.st,
        src,
        responses.len()
    );

    let socket = Arc::clone(socket);
    std::thread::spawn(move || {
        for response in responses {
            if let Err(e) = socket.send_to(response.to_wire().as_bytes(), src) {
                warn!("❌ Failed to send M-SEARCH response to {}: {}", src, e);
            }
        }
    });
}

/// Construit les réponses pour une recherche, sans les envoyer.
fn build_search_responses(
    state: &ServerState,
    search: &Search,
    src: &SocketAddr,
) -> Vec<SearchResponse> {
    let host = local_ipv4_for(src).or_else(|| state.hosts.first().copied());
    let host = match host {
        Some(host) => host,
        None => return Vec::new(),
    };

    state
        .keys_for_target(&search.st)
        .into_iter()
        .map(|(nt, usn)| SearchResponse {
            date: Utc::now(),
            max_age: Some(state.config.max_age),
            location: Some(state.location(host)),
            server: Some(state.server_header.clone()),
            st: nt.clone(),
            usn: usn.clone(),
            ext: true,
        })
        .collect()
}

/// Adresses IPv4 non loopback de la machine.
fn local_ipv4_addresses() -> Vec<Ipv4Addr> {
    let mut addresses = Vec::new();
    match get_if_addrs::get_if_addrs() {
        Ok(interfaces) => {
            for iface in interfaces {
                if let IpAddr::V4(ipv4) = iface.ip() {
                    if !ipv4.is_loopback() {
                        addresses.push(ipv4);
                    }
                }
            }
        }
        Err(e) => warn!("❌ Failed to enumerate interfaces: {}", e),
    }
    addresses
}

/// Adresse locale que le noyau choisirait pour joindre `dest`.
fn local_ipv4_for(dest: &SocketAddr) -> Option<Ipv4Addr> {
    let probe = UdpSocket::bind("0.0.0.0:0").ok()?;
    probe.connect(dest).ok()?;
    match probe.local_addr().ok()?.ip() {
        IpAddr::V4(ipv4) => Some(ipv4),
        IpAddr::V6(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssdp::DEFAULT_MAX_AGE;

    fn test_state() -> ServerState {
        ServerState {
            config: SsdpConfig::default(),
            hosts: vec![Ipv4Addr::new(192, 0, 2, 5)],
            http_port: 8080,
            server_header: "OS/5 UPnP/1.0 product/7".to_string(),
            announcements: vec![
                (
                    "upnp:rootdevice".to_string(),
                    "uuid:abc::upnp:rootdevice".to_string(),
                ),
                ("uuid:abc".to_string(), "uuid:abc".to_string()),
                (
                    "urn:schemas-upnp-org:device:TestDevice:1".to_string(),
                    "uuid:abc::urn:schemas-upnp-org:device:TestDevice:1".to_string(),
                ),
                (
                    "urn:schemas-upnp-org:service:TestService:1".to_string(),
                    "uuid:abc::urn:schemas-upnp-org:service:TestService:1".to_string(),
                ),
            ],
        }
    }

    fn search(st: &str) -> Search {
        Search {
            date: Utc::now(),
            st: st.to_string(),
            mx: 1,
        }
    }

    #[test]
    fn test_rootdevice_search_gets_one_response() {
        let state = test_state();
        let src: SocketAddr = "192.0.2.99:5000".parse().unwrap();

        let responses = build_search_responses(&state, &search("upnp:rootdevice"), &src);
        assert_eq!(responses.len(), 1);

        let response = &responses[0];
        assert_eq!(response.st, "upnp:rootdevice");
        assert_eq!(response.usn, "uuid:abc::upnp:rootdevice");
        assert_eq!(response.max_age, Some(DEFAULT_MAX_AGE));
        assert!(response
            .location
            .as_deref()
            .unwrap()
            .ends_with(":8080/description"));

        let wire = response.to_wire();
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("NTS: ssdp:alive\r\n"));
        assert!(wire.contains("Content-Length: 0\r\n"));
        assert!(wire.contains("EXT:\r\n"));
    }

    #[test]
    fn test_device_type_search_matches() {
        let state = test_state();
        let src: SocketAddr = "192.0.2.99:5000".parse().unwrap();

        let responses = build_search_responses(
            &state,
            &search("urn:schemas-upnp-org:device:TestDevice:1"),
            &src,
        );
        assert_eq!(responses.len(), 1);
        assert_eq!(
            responses[0].usn,
            "uuid:abc::urn:schemas-upnp-org:device:TestDevice:1"
        );
    }

    #[test]
    fn test_unknown_target_ignored() {
        let state = test_state();
        let src: SocketAddr = "192.0.2.99:5000".parse().unwrap();

        // Cible de service : non couverte, ignorée
        let responses = build_search_responses(
            &state,
            &search("urn:schemas-upnp-org:service:TestService:1"),
            &src,
        );
        assert!(responses.is_empty());

        let responses = build_search_responses(&state, &search("uuid:abc"), &src);
        assert!(responses.is_empty());
    }

    #[test]
    fn test_ssdp_all_behind_flag() {
        let mut state = test_state();
        let src: SocketAddr = "192.0.2.99:5000".parse().unwrap();

        assert!(build_search_responses(&state, &search("ssdp:all"), &src).is_empty());

        state.config.answer_all = true;
        let responses = build_search_responses(&state, &search("ssdp:all"), &src);
        assert_eq!(responses.len(), state.announcements.len());
    }
}
