//! Runtime d'un device : serveur HTTP + annonces SSDP.
//!
//! `start` fige l'arbre, démarre l'hôte HTTP sur un port éphémère,
//! enregistre toutes les routes puis lance les annonces SSDP depuis
//! chaque interface. `wait` bloque jusqu'à un signal d'arrêt (INT ou
//! TERM) ; l'arrêt envoie les byebye avant d'éteindre le serveur HTTP.

use std::sync::Arc;

use tracing::info;

use crate::devices::{Device, DeviceError, DeviceInstance};
use crate::server::Server;
use crate::ssdp::{SsdpConfig, SsdpServer};

/// Configuration d'exécution d'un device.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Port HTTP, `0` pour un port éphémère
    pub http_port: u16,

    /// Configuration du moteur SSDP
    pub ssdp: SsdpConfig,
}

/// Runtime attaché à un arbre de devices qui tourne.
pub struct DeviceRuntime {
    root: Arc<DeviceInstance>,
    http: Server,
    ssdp: SsdpServer,
}

impl DeviceRuntime {
    /// Démarre le runtime d'un device.
    ///
    /// L'arbre est validé puis figé ; la structure ne change plus tant
    /// que le runtime tourne.
    pub async fn start(device: &Device, config: RuntimeConfig) -> Result<Self, DeviceError> {
        let root = device.create_instance()?;

        let mut http = Server::new(crate::PRODUCT, config.http_port);
        root.register_urls(&mut http).await;
        http.start().await?;

        // Un réseau sans multicast ne condamne pas le device : le
        // serveur HTTP reste joignable par adresse directe.
        let mut ssdp = SsdpServer::new(config.ssdp);
        if let Err(e) = ssdp.start(Arc::clone(&root), http.port()) {
            tracing::warn!("❌ SSDP announcements unavailable: {}", e);
        }

        info!(
            "✅ {} running: http port {}, {} service(s)",
            root.friendly_name(),
            http.port(),
            root.services().len()
        );

        Ok(Self { root, http, ssdp })
    }

    /// Instance racine (lecture seule).
    pub fn root(&self) -> &Arc<DeviceInstance> {
        &self.root
    }

    /// Port HTTP réellement lié.
    pub fn http_port(&self) -> u16 {
        self.http.port()
    }

    /// Bloque jusqu'à SIGINT ou SIGTERM, puis arrête proprement.
    pub async fn wait(&mut self) {
        wait_for_shutdown_signal().await;
        self.shutdown().await;
    }

    /// Arrêt propre : byebye SSDP puis extinction du serveur HTTP.
    pub async fn shutdown(&mut self) {
        info!("👋 Shutting down {}", self.root.friendly_name());
        self.ssdp.stop();
        self.http.stop().await;
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(e) => {
            tracing::error!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        _ = terminate.recv() => info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl+C");
}
