//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or Ctrl-C the server:
//! 1. Stops `listener.accept()` immediately, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.
//!
//! # Port
//!
//! [`Server::from_env`] binds `0.0.0.0` on `SERVICE_PORT` when it is set and
//! on the development port otherwise.

use std::convert::Infallible;
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http::header::SERVER;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::service_router::App;

const SERVICE_PORT: &str = "SERVICE_PORT";

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use restkit::Server;
    /// let server = Server::bind("0.0.0.0:3000").unwrap();
    /// assert_eq!(server.addr().port(), 3000);
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr
            .parse()
            .map_err(|source| Error::InvalidAddress { addr: addr.to_owned(), source })?;
        Ok(Self { addr })
    }

    /// Binds all interfaces on `SERVICE_PORT`, or on `development_port` when
    /// the variable is unset.
    pub fn from_env(development_port: u16) -> Result<Self, Error> {
        let configured = env::var(SERVICE_PORT).ok();
        let port = port_from(configured.as_deref(), development_port)?;
        Ok(Self { addr: SocketAddr::from(([0, 0, 0, 0], port)) })
    }

    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Starts accepting connections and dispatching them through `app`.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve<P>(self, app: App<P>) -> Result<(), Error>
    where
        P: Send + Sync + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        let app = Arc::new(app);

        info!(addr = %self.addr, "restkit listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown first, so a SIGTERM stops accepting even with a backlog.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { dispatch(&app, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("restkit stopped");
        Ok(())
    }
}

/// The listening port: `configured` if present, otherwise `development_port`.
pub(crate) fn port_from(configured: Option<&str>, development_port: u16) -> Result<u16, Error> {
    match configured {
        None => Ok(development_port),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|source| Error::InvalidServicePort { value: value.to_owned(), source }),
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Collects the body and runs the chain. A body that cannot be read is a 400
/// that never reaches the chain.
async fn dispatch<P, B>(
    app: &App<P>,
    req: http::Request<B>,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    P: Send + 'static,
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("request body read failed: {e}");
            return Ok(into_wire(Response::status(StatusCode::BAD_REQUEST)));
        }
    };

    let request = Request::from_http(http::Request::from_parts(parts, body));
    Ok(into_wire(app.handle(request).await))
}

/// The wire response, without server identification.
fn into_wire(mut response: Response) -> http::Response<Full<Bytes>> {
    response.headers_mut().remove(SERVER);
    response.into_http()
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C. A signal that cannot be
/// installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use http::{HeaderValue, Method};
    use hyper::body::Frame;

    use crate::principal::{AuthService, GetPrincipalDeviation};
    use crate::service_router::ServiceRouter;

    struct Anonymous;

    impl AuthService<()> for Anonymous {
        async fn get_principal(&self, _req: &Request) -> Result<Option<()>, GetPrincipalDeviation> {
            Ok(None)
        }
    }

    /// Fails on the first read, like a connection reset mid-upload.
    struct ResetBody;

    impl Body for ResetBody {
        type Data = Bytes;
        type Error = io::Error;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
            Poll::Ready(Some(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))))
        }
    }

    fn app() -> App<()> {
        let service = ServiceRouter::builder(Anonymous, |_: &()| (), |_| {
            Response::status(StatusCode::SERVICE_UNAVAILABLE)
        })
        .build();
        service.routing_handler(|routes| {
            routes.route(Method::POST, "/echo", |req: Request| async move {
                Response::builder()
                    .header(SERVER, HeaderValue::from_static("restkit/0.1"))
                    .text(String::from_utf8_lossy(req.body()).into_owned())
            });
        })
    }

    #[tokio::test]
    async fn dispatch_strips_server_header() {
        let req = http::Request::post("/echo").body(Full::new(Bytes::from_static(b"hello"))).unwrap();
        let res = dispatch(&app(), req).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(SERVER).is_none());
        assert!(res.headers().contains_key("x-request-id-chain"));
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn unreadable_body_is_bad_request() {
        let req = http::Request::post("/echo").body(ResetBody).unwrap();
        let res = dispatch(&app(), req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.headers().get(SERVER).is_none());
    }

    #[test]
    fn into_wire_removes_server_identification() {
        let res = Response::builder()
            .header(SERVER, HeaderValue::from_static("hyper"))
            .text("ok");
        let wire = into_wire(res);
        assert!(wire.headers().get(SERVER).is_none());
        assert_eq!(wire.headers()[http::header::CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[test]
    fn port_defaults_to_development_port() {
        assert_eq!(port_from(None, 8080).unwrap(), 8080);
    }

    #[test]
    fn service_port_overrides() {
        assert_eq!(port_from(Some("9000"), 8080).unwrap(), 9000);
    }

    #[test]
    fn invalid_service_port_is_an_error() {
        let err = port_from(Some("http"), 8080).unwrap_err();
        assert!(matches!(err, Error::InvalidServicePort { ref value, .. } if value == "http"));
    }

    #[test]
    fn bind_rejects_bad_addresses() {
        assert!(matches!(Server::bind("localhost"), Err(Error::InvalidAddress { .. })));
    }
}
