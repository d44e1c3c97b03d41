// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Admin HTTP endpoint: liveness probe and the shutdown hook.
//!
//! - `GET /healthz` answers `ok`
//! - `POST /delete-all-and-quit` stops the controller; 409 if it is already shutting down

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use bytes::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::controllers::IngressController;

pub const HEALTH_PATH: &str = "/healthz";
pub const QUIT_PATH: &str = "/delete-all-and-quit";

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("failed to bind admin server to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Health,
    Quit,
    MethodNotAllowed,
    NotFound,
}

fn route(method: &Method, path: &str) -> Route {
    match path {
        HEALTH_PATH if *method == Method::GET => Route::Health,
        QUIT_PATH if *method == Method::POST => Route::Quit,
        HEALTH_PATH | QUIT_PATH => Route::MethodNotAllowed,
        _ => Route::NotFound,
    }
}

/// Handle for a running admin server
pub struct AdminHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    join_handle: tokio::task::JoinHandle<()>,
}

impl AdminHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.join_handle.await;
    }
}

pub struct AdminServer {
    bind_addr: SocketAddr,
    controller: Arc<IngressController>,
}

impl AdminServer {
    pub fn new(bind_addr: SocketAddr, controller: Arc<IngressController>) -> Self {
        Self {
            bind_addr,
            controller,
        }
    }

    /// Bind and serve in the background
    pub async fn start(self) -> Result<AdminHandle, AdminError> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .map_err(|e| AdminError::Bind {
                addr: self.bind_addr,
                source: e,
            })?;
        let local_addr = listener.local_addr().map_err(|e| AdminError::Bind {
            addr: self.bind_addr,
            source: e,
        })?;

        info!(addr = %local_addr, "Admin server listening");

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let controller = self.controller;

        let join_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => match result {
                        Ok((stream, remote_addr)) => {
                            let controller = controller.clone();
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    handle_request(req, controller.clone(), remote_addr)
                                });
                                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                                    debug!(error = %err, "Error serving admin connection");
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "Error accepting admin connection"),
                    },
                    _ = &mut shutdown_rx => {
                        info!("Admin server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(AdminHandle {
            local_addr,
            shutdown_tx,
            join_handle,
        })
    }
}

fn respond(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    controller: Arc<IngressController>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!(method = %method, path = %path, remote = %remote_addr, "Admin request");

    let response = match route(&method, &path) {
        Route::Health => respond(StatusCode::OK, "ok"),
        Route::Quit => {
            info!(remote = %remote_addr, "Shutdown requested through the admin endpoint");
            match controller.stop().await {
                Ok(()) => respond(StatusCode::OK, "ok"),
                Err(e) => {
                    warn!("Shutdown request rejected: {}", e);
                    respond(StatusCode::CONFLICT, e.to_string())
                }
            }
        }
        Route::MethodNotAllowed => respond(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
        Route::NotFound => respond(StatusCode::NOT_FOUND, "Not found"),
    };

    Ok(response)
}
