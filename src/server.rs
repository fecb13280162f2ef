use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::session::handle_session;
use crate::store::Store;
use crate::Error;

pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let store = Arc::new(Store::new(config.database_shards, config.user_shards));
    let admission = Arc::new(Semaphore::new(config.max_clients));

    info!(
        "Key-value server listening on {} (max clients: {}, database shards: {}, user shards: {})",
        listener.local_addr()?,
        config.max_clients,
        config.database_shards,
        config.user_shards
    );

    loop {
        // Admission control: hold the accept until a client slot is free.
        // The permit travels into the session task and is released when the
        // session ends, which is what wakes this loop back up.
        let permit = admission.clone().acquire_owned().await?;

        let (socket, client_address) = listener.accept().await?;
        let store = store.clone();
        info!(
            "Client connected from {:?}. Available slots: {}",
            client_address,
            admission.available_permits()
        );

        tokio::spawn(async move {
            if let Err(e) = handle_session(socket, client_address, store).await {
                error!("session error: {}", e);
            }
            drop(permit);
            info!("Client disconnected: {:?}", client_address);
        });
    }
}
