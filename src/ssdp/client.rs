//! Client SSDP pour la découverte des devices UPnP.
//!
//! Le client est un *control point* : il ne doit **pas** se lier au
//! port UDP 1900. Le serveur SSDP (mode device) écoute 0.0.0.0:1900
//! pour les M-SEARCH ; le client n'a besoin que d'émettre des M-SEARCH
//! et de recevoir les réponses unicast sur un port éphémère. Si les
//! deux se lient au 1900 (même avec SO_REUSEPORT), le noyau répartit
//! les datagrammes entrants entre les sockets et le client perd des
//! messages au hasard.

use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, trace, warn};

use super::advertisement::{Advertisement, Search};
use super::SsdpConfig;

/// Cible d'une recherche SSDP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTarget {
    /// `ssdp:all` : tout ce qui s'annonce
    All,

    /// `upnp:rootdevice` : les devices racine
    Root,

    /// Un type de device, version comprise (ex: `MediaServer:1`)
    Device(String),

    /// Un type de service, version comprise (ex: `ContentDirectory:1`)
    Service(String),

    /// Cible littérale passée telle quelle (`urn:...`, `uuid:...`,
    /// `ssdp:...`)
    Literal(String),
}

impl std::fmt::Display for SearchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchTarget::All => f.write_str("ssdp:all"),
            SearchTarget::Root => f.write_str("upnp:rootdevice"),
            SearchTarget::Device(spec) => {
                write!(f, "urn:schemas-upnp-org:device:{}", spec)
            }
            SearchTarget::Service(spec) => {
                write!(f, "urn:schemas-upnp-org:service:{}", spec)
            }
            SearchTarget::Literal(target) => f.write_str(target),
        }
    }
}

impl SearchTarget {
    /// Interprète une cible littérale : `urn:`, `uuid:` et `ssdp:`
    /// passent telles quelles.
    pub fn literal(target: impl Into<String>) -> Option<SearchTarget> {
        let target = target.into();
        if target.starts_with("urn:") || target.starts_with("uuid:") || target.starts_with("ssdp:")
        {
            Some(SearchTarget::Literal(target))
        } else {
            None
        }
    }
}

/// File d'écoute : thread de réception + canal de sortie.
struct ListenerState {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
    queue: Receiver<Advertisement>,
}

/// Client SSDP : recherches actives et écoute passive.
pub struct SsdpClient {
    config: SsdpConfig,
    socket: Arc<UdpSocket>,
    listener: Option<ListenerState>,
}

impl SsdpClient {
    /// Crée un client SSDP sur un port éphémère, abonné au groupe
    /// multicast sur chaque interface IPv4.
    pub fn new(config: SsdpConfig) -> std::io::Result<Self> {
        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket2.set_reuse_address(true)?;

        let bind_addr: SocketAddr = "0.0.0.0:0".parse().expect("static address");
        socket2.bind(&bind_addr.into())?;

        let socket: UdpSocket = socket2.into();
        socket.set_read_timeout(Some(Duration::from_secs(1)))?;
        socket.set_multicast_loop_v4(config.multicast_loop)?;
        socket.set_multicast_ttl_v4(config.ttl)?;

        for iface in get_if_addrs::get_if_addrs()? {
            if let IpAddr::V4(ipv4) = iface.ip() {
                if !ipv4.is_loopback() {
                    match socket.join_multicast_v4(&config.group, &ipv4) {
                        Ok(()) => debug!("SSDP: joined {} on {}", config.group, ipv4),
                        Err(e) => {
                            warn!("SSDP: failed to join {} on {}: {}", config.group, ipv4, e)
                        }
                    }
                }
            }
        }

        info!("✅ SSDP client ready on {}", socket.local_addr()?);

        Ok(Self {
            config,
            socket: Arc::new(socket),
            listener: None,
        })
    }

    /// Envoie un M-SEARCH par cible puis collecte les réponses pendant
    /// `timeout` secondes.
    ///
    /// Sans cible, la recherche porte sur `ssdp:all`. Tout datagramme
    /// parsé pendant la fenêtre est retourné, réponses comme annonces.
    pub fn search(
        &self,
        targets: &[SearchTarget],
        timeout: u32,
    ) -> std::io::Result<Vec<Advertisement>> {
        let timeout = timeout.max(1);
        let group_addr = SocketAddr::new(IpAddr::V4(self.config.group), self.config.port);

        let all = [SearchTarget::All];
        let targets: &[SearchTarget] = if targets.is_empty() { &all } else { targets };

        for target in targets {
            let search = Search {
                date: Utc::now(),
                st: target.to_string(),
                mx: timeout,
            };
            self.socket
                .send_to(search.to_wire().as_bytes(), group_addr)?;
            info!("📤 M-SEARCH sent (ST={}, MX={})", search.st, timeout);
        }

        let deadline = Instant::now() + Duration::from_secs(timeout.into());
        let mut collected = Vec::new();
        let mut buf = [0u8; 1024];

        while Instant::now() < deadline {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    let data = String::from_utf8_lossy(&buf[..n]).to_string();
                    match Advertisement::parse(&data) {
                        Ok(advertisement) => {
                            debug!("📥 SSDP message from {}", from);
                            collected.push(advertisement);
                        }
                        Err(e) => trace!("Unparseable SSDP datagram from {}: {}", from, e),
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(collected)
    }

    /// Démarre l'écoute passive : un thread lit la socket et pousse
    /// chaque annonce parsée dans la file. Les erreurs de parsing sont
    /// journalisées et jetées, jamais remontées au thread.
    pub fn start_listening(&mut self) {
        if self.listener.is_some() {
            return;
        }

        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx): (Sender<Advertisement>, Receiver<Advertisement>) = unbounded();

        let socket = Arc::clone(&self.socket);
        let thread_running = Arc::clone(&running);
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 1024];
            while thread_running.load(Ordering::SeqCst) {
                match socket.recv_from(&mut buf) {
                    Ok((n, from)) => {
                        let data = String::from_utf8_lossy(&buf[..n]).to_string();
                        match Advertisement::parse(&data) {
                            Ok(advertisement) => {
                                if tx.send(advertisement).is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                trace!("Unparseable SSDP datagram from {}: {}", from, e);
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
                        warn!("❌ SSDP client read error: {}", e);
                    }
                }
            }
        });

        self.listener = Some(ListenerState {
            handle,
            running,
            queue: rx,
        });
        info!("✅ SSDP listener started");
    }

    /// Draine la file des annonces reçues depuis le dernier appel.
    pub fn advertisements(&self) -> Vec<Advertisement> {
        match &self.listener {
            Some(listener) => listener.queue.try_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Arrête l'écoute passive ; la file est remplacée par une file
    /// vide au prochain démarrage.
    pub fn stop_listening(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.running.store(false, Ordering::SeqCst);
            let _ = listener.handle.join();
            info!("✅ SSDP listener stopped");
        }
    }
}

impl Drop for SsdpClient {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_formatting() {
        assert_eq!(SearchTarget::All.to_string(), "ssdp:all");
        assert_eq!(SearchTarget::Root.to_string(), "upnp:rootdevice");
        assert_eq!(
            SearchTarget::Device("MediaServer:1".to_string()).to_string(),
            "urn:schemas-upnp-org:device:MediaServer:1"
        );
        assert_eq!(
            SearchTarget::Service("ContentDirectory:1".to_string()).to_string(),
            "urn:schemas-upnp-org:service:ContentDirectory:1"
        );
    }

    #[test]
    fn test_literal_targets() {
        assert_eq!(
            SearchTarget::literal("uuid:0e042ba4").unwrap().to_string(),
            "uuid:0e042ba4"
        );
        assert_eq!(
            SearchTarget::literal("urn:schemas-upnp-org:device:Dimmer:1")
                .unwrap()
                .to_string(),
            "urn:schemas-upnp-org:device:Dimmer:1"
        );
        assert_eq!(
            SearchTarget::literal("ssdp:all").unwrap().to_string(),
            "ssdp:all"
        );
        assert!(SearchTarget::literal("MediaServer").is_none());
    }

    #[test]
    fn test_msearch_wire_format() {
        let search = Search {
            date: Utc::now(),
            st: SearchTarget::Root.to_string(),
            mx: 2,
        };
        let wire = search.to_wire();
        assert!(wire.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(wire.contains("HOST: 239.255.255.250:1900\r\n"));
        assert!(wire.contains("MAN: \"ssdp:discover\"\r\n"));
        assert!(wire.contains("MX: 2\r\n"));
        assert!(wire.contains("ST: upnp:rootdevice\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }
}
