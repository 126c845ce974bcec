//! # Module SSDP - Simple Service Discovery Protocol
//!
//! Ce module implémente le protocole SSDP pour UPnP : découverte
//! automatique des devices sur le réseau par UDP multicast.
//!
//! ## Fonctionnalités
//!
//! - ✅ Envoi de NOTIFY alive/byebye en multicast
//! - ✅ Réponse aux M-SEARCH en unicast
//! - ✅ Annonces périodiques automatiques, arrêt propre avec byebye
//! - ✅ Recherche côté control point avec file d'événements
//! - ✅ Codec des trois formes d'annonces (NOTIFY, réponse, M-SEARCH)
//!
//! ## Architecture
//!
//! - [`advertisement`] : parsing et émission des datagrammes
//! - [`SsdpServer`] : annonces d'un arbre de devices
//! - [`SsdpClient`] : M-SEARCH et écoute des annonces
//!
//! ## Constantes SSDP
//!
//! - **Adresse multicast** : 239.255.255.250:1900
//! - **Max-Age** : 120 secondes
//! - **Période d'annonce** : 60 secondes

pub mod advertisement;

mod client;
mod server;

use std::net::Ipv4Addr;
use std::time::Duration;

pub use client::{SearchTarget, SsdpClient};
pub use server::SsdpServer;

/// Adresse multicast SSDP
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Port SSDP
pub const SSDP_PORT: u16 = 1900;

/// TTL multicast par défaut
pub const DEFAULT_TTL: u32 = 4;

/// Durée de validité des annonces (secondes)
pub const DEFAULT_MAX_AGE: u32 = 120;

/// Période des annonces NOTIFY.
///
/// UPnP conseille `max_age / 2` avec gigue ; cette implémentation garde
/// la période fixe de 60 s.
pub const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration du moteur SSDP.
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    /// Groupe multicast
    pub group: Ipv4Addr,

    /// Port SSDP
    pub port: u16,

    /// TTL multicast et IP
    pub ttl: u32,

    /// `max-age` annoncé dans CACHE-CONTROL
    pub max_age: u32,

    /// Période des NOTIFY périodiques
    pub notify_interval: Duration,

    /// Répondre à `ssdp:all` avec le jeu complet d'annonces
    pub answer_all: bool,

    /// Boucle multicast locale (utile en développement)
    pub multicast_loop: bool,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            group: SSDP_MULTICAST_ADDR,
            port: SSDP_PORT,
            ttl: DEFAULT_TTL,
            max_age: DEFAULT_MAX_AGE,
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
            answer_all: false,
            multicast_loop: false,
        }
    }
}
