//! # Module server - Hôte HTTP
//!
//! Serveur Axum unique portant toutes les routes d'un device : index,
//! description, SCPD, contrôle SOAP et événements. Les routes sont
//! enregistrées dynamiquement avant le démarrage, le port est éphémère
//! par défaut, et l'arrêt est gracieux via un token d'annulation.
//!
//! ## Fonctionnalités
//!
//! - ✅ Enregistrement dynamique de handlers GET/POST/any
//! - ✅ Port éphémère relu après le bind
//! - ✅ En-têtes `SERVER` et `EXT:` estampillés sur chaque réponse
//! - ✅ Arrêt gracieux (CancellationToken)

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Serveur HTTP du runtime.
pub struct Server {
    name: String,
    http_port: u16,
    router: Arc<RwLock<Router>>,
    bound_addr: Option<SocketAddr>,
    join_handle: Option<JoinHandle<()>>,
    shutdown_token: CancellationToken,
}

impl Server {
    /// Crée un serveur non démarré.
    ///
    /// # Arguments
    ///
    /// * `name` - Nom du serveur (pour les logs)
    /// * `http_port` - Port d'écoute, `0` pour un port éphémère
    pub fn new(name: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            http_port,
            router: Arc::new(RwLock::new(Router::new())),
            bound_addr: None,
            join_handle: None,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token d'arrêt gracieux, à partager avec les composants qui
    /// doivent observer la fin de vie du serveur.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Ajoute un handler GET sur un chemin exact.
    pub async fn add_get<F, Fut>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let handler = move || {
            let f = f.clone();
            async move { f().await }
        };
        let mut router = self.router.write().await;
        *router = std::mem::take(&mut *router).route(path, get(handler));
    }

    /// Ajoute un handler recevant la méthode et le corps de la requête,
    /// pour toutes les méthodes. Le handler décide lui-même du sort des
    /// méthodes qu'il n'admet pas.
    pub async fn add_request_handler<F, Fut>(&mut self, path: &str, f: F)
    where
        F: Fn(Method, String) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let handler = move |method: Method, body: String| {
            let f = f.clone();
            async move { f(method, body).await }
        };
        let mut router = self.router.write().await;
        *router = std::mem::take(&mut *router).route(path, any(handler));
    }

    /// Ajoute un handler acceptant toutes les méthodes.
    pub async fn add_any<F, Fut>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let handler = move || {
            let f = f.clone();
            async move { f().await }
        };
        let mut router = self.router.write().await;
        *router = std::mem::take(&mut *router).route(path, any(handler));
    }

    /// Démarre le serveur sur toutes les interfaces.
    ///
    /// Le port réellement lié est relu sur le listener et disponible
    /// via [`Server::port`].
    pub async fn start(&mut self) -> std::io::Result<()> {
        let router = self
            .router
            .read()
            .await
            .clone()
            .fallback(|| async { StatusCode::NOT_FOUND.into_response() })
            .layer(middleware::from_fn(stamp_upnp_headers));

        let listener = TcpListener::bind(("0.0.0.0", self.http_port)).await?;
        let addr = listener.local_addr()?;
        self.bound_addr = Some(addr);

        info!("✅ HTTP server {} listening on {}", self.name, addr);

        let token = self.shutdown_token.clone();
        let handle = tokio::spawn(async move {
            let shutdown = async move { token.cancelled().await };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("❌ HTTP server error: {}", e);
            }
        });
        self.join_handle = Some(handle);

        Ok(())
    }

    /// Port réellement lié, `0` tant que le serveur n'a pas démarré.
    pub fn port(&self) -> u16 {
        self.bound_addr.map(|a| a.port()).unwrap_or(0)
    }

    /// Arrête le serveur gracieusement.
    pub async fn stop(&mut self) {
        self.shutdown_token.cancel();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
        info!("✅ HTTP server {} stopped", self.name);
    }
}

/// Estampille chaque réponse avec les en-têtes imposés par UPnP.
async fn stamp_upnp_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&crate::server_header()) {
        headers.insert(axum::http::header::SERVER, value);
    }
    headers.insert(HeaderName::from_static("ext"), HeaderValue::from_static(""));
    response
}
