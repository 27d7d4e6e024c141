use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, body::Incoming};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;

pub(crate) struct Server;

impl Server {
    pub async fn bind<F, Fut>(
        addr: SocketAddr,
        service: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Fn(Request<Incoming>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<Response<Full<Bytes>>, Infallible>> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;

        let mut shutdown = tokio::spawn(async {
            if let Err(e) = signal::ctrl_c().await {
                log::error!("failed to listen for ctrl_c: {}", e);
                return;
            }
            log::info!("Received Ctrl+C, shutting down server...");
        });

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            log::warn!("accept failed: {}", e);
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let service = service_fn(service.clone());

                    tokio::spawn(async move {
                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                            log::error!("Connection error from {}: {}", peer, err);
                        }
                    });
                }
                _ = &mut shutdown => {
                    break;
                }
            }
        }

        Ok(())
    }
}
