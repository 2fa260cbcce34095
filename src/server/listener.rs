//! Accept loop: binds the service's single port and spawns one task per
//! connection, handing each its role, supervisor, chain map snapshot and
//! fd cache (spec §5, §9).

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::chain::map::{ChainMap, Role};
use crate::chain::supervisor::Supervisor;
use crate::storage::FdCache;

use super::connection::{self, ConnectionContext};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Runs the accept loop until `shutdown` resolves. Each accepted
/// connection is handled on its own task; a connection failing never
/// brings down the listener.
pub async fn serve(
    addr: SocketAddr,
    role: Role,
    supervisor: Arc<Supervisor>,
    chain_map: Arc<ChainMap>,
    fd_cache: Arc<FdCache>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(), Error> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;
    info!(%addr, ?role, "listening");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                if let Err(e) = stream.set_nodelay(true) {
                    error!(error = %e, %peer, "failed to set TCP_NODELAY");
                }

                let ctx = ConnectionContext {
                    role,
                    supervisor: Arc::clone(&supervisor),
                    chain_map: chain_map.snapshot(),
                    fd_cache: Arc::clone(&fd_cache),
                };

                tokio::spawn(async move {
                    connection::handle(stream, peer, ctx).await;
                });
            }
            _ = &mut shutdown => {
                info!("shutdown requested, no longer accepting connections");
                return Ok(());
            }
        }
    }
}
