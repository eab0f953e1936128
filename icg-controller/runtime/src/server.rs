use crate::{api::Api, core::ConfigStore};
use anyhow::Result;
use hyper::server::conn::http1;
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, debug_span, info, instrument, warn, Instrument};

/// Serves the API over HTTP/1 until `drain` is signaled.
///
/// On shutdown the listener is closed and open connections finish their
/// in-flight requests before they are released.
#[instrument(skip_all, fields(port = %addr.port()))]
pub async fn serve<S>(addr: SocketAddr, api: Api<S>, drain: drain::Watch) -> Result<()>
where
    S: ConfigStore + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "traffic API server listening");

    let shutdown = drain.clone().signaled();
    tokio::pin!(shutdown);

    loop {
        let (io, peer) = tokio::select! {
            res = listener.accept() => match res {
                Ok(conn) => conn,
                Err(error) => {
                    warn!(%error, "Failed to accept connection");
                    continue;
                }
            },
            _ = &mut shutdown => {
                info!("traffic API server shutting down");
                return Ok(());
            }
        };

        let svc = TowerToHyperService::new(api.clone());
        let drain = drain.clone();
        tokio::spawn(
            async move {
                let conn = http1::Builder::new().serve_connection(TokioIo::new(io), svc);
                tokio::pin!(conn);
                let res = tokio::select! {
                    res = conn.as_mut() => res,
                    handle = drain.signaled() => {
                        conn.as_mut().graceful_shutdown();
                        handle.release_after(conn).await
                    }
                };
                if let Err(error) = res {
                    debug!(%error, "Connection closed");
                }
            }
            .instrument(debug_span!("conn", %peer)),
        );
    }
}
