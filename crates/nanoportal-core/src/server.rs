//! HTTP server implementation

use crate::app::Portal;
use crate::error::PortalError;
use crate::request::Request;
use crate::response::{error_response, HttpResponse};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Largest request body accepted (1 MiB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Internal server struct
pub(crate) struct Server {
    portal: Arc<Portal>,
}

impl Server {
    pub fn new(portal: Portal) -> Self {
        Self {
            portal: Arc::new(portal),
        }
    }

    /// Bind `addr` and run the server
    pub async fn run(self, addr: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = addr.parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accept connections from an already bound listener
    pub async fn serve(
        self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(addr = %listener.local_addr()?, "nanoPortal listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let portal = self.portal.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<Incoming>| {
                    let portal = portal.clone();
                    async move {
                        let response = handle_request(&portal, req, remote_addr).await;
                        Ok::<_, Infallible>(response)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(%remote_addr, "Connection error: {}", err);
                }
            });
        }
    }
}

/// Read the body, build a [`Request`] and hand it to the portal
async fn handle_request(
    portal: &Portal,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> HttpResponse {
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, DEFAULT_BODY_LIMIT).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            let rejection = if err.downcast_ref::<LengthLimitError>().is_some() {
                PortalError::new(
                    http::StatusCode::PAYLOAD_TOO_LARGE,
                    "payload_too_large",
                    format!("Request body exceeds {} bytes", DEFAULT_BODY_LIMIT),
                )
            } else {
                PortalError::bad_request("Failed to read request body")
            };
            warn!(path = %parts.uri.path(), error = %err, "Rejecting request body");
            return error_response(&rejection, portal.context().environment());
        }
    };

    portal.handle(Request::from_http(&parts, &body, Some(remote_addr)))
}
