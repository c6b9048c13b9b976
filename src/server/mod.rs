pub mod api;
pub mod relay;

use crate::cli::ServeArgs;
use crate::llm::chat::ChatClient;
use self::api::{ router, AppState };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use log::{ error, info };

pub struct Server {
    addr: SocketAddr,
    client: Arc<dyn ChatClient>,
    args: ServeArgs,
}

impl Server {
    pub fn new(addr: SocketAddr, client: Arc<dyn ChatClient>, args: ServeArgs) -> Self {
        Self { addr, client, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let app = router(AppState { client: self.client.clone() });

        if self.args.enable_tls {
            let (cert_path, key_path) = match (&self.args.tls_cert_path, &self.args.tls_key_path) {
                (Some(cert), Some(key)) => (cert, key),
                _ => {
                    error!("--enable-tls requires both --tls-cert-path and --tls-key-path.");
                    return Err("TLS enabled without cert/key".into());
                }
            };
            info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
            let tls_config = axum_server::tls_rustls::RustlsConfig
                ::from_pem_file(cert_path, key_path).await?;

            info!("Chat relay listening on: https://{}", self.addr);
            axum_server::bind_rustls(self.addr, tls_config).serve(app.into_make_service()).await?;
        } else {
            let listener = tokio::net::TcpListener::bind(self.addr).await.map_err(|e| {
                error!("Failed to bind chat relay to {}: {}. Try a different port.", self.addr, e);
                e
            })?;
            info!("Chat relay listening on: http://{}", self.addr);
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal()).await?;
        }

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
