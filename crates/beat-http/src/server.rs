use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::HttpConfig;
use crate::error::{HttpError, HttpResult};
use crate::mount::MountTable;
use crate::router::build_router;

/// HTTP front end over a mount table.
pub struct ContentServer {
    config: HttpConfig,
    mounts: Arc<MountTable>,
}

impl ContentServer {
    pub fn new(config: HttpConfig, mounts: MountTable) -> Self {
        Self {
            config,
            mounts: Arc::new(mounts),
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> Router {
        build_router(self.mounts.clone())
    }

    /// Bind the configured address without serving yet.
    pub async fn bind(self) -> HttpResult<BoundServer> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| HttpError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        Ok(BoundServer {
            listener,
            local_addr,
            router: self.router(),
        })
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> HttpResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.bind().await?.serve(shutdown).await
    }
}

/// A server holding its listening socket.
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
}

impl BoundServer {
    /// The address actually bound; differs from the configured one when
    /// port `0` was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn serve<F>(self, shutdown: F) -> HttpResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("hyperbeat HTTP bridge listening on http://{}", self.local_addr);
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| HttpError::Serve(e.to_string()))?;
        tracing::info!(addr = %self.local_addr, "HTTP bridge stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::mount::Mount;

    #[test]
    fn server_construction() {
        let server = ContentServer::new(HttpConfig::default(), MountTable::new());
        assert_eq!(server.config().bind_addr.port(), 3030);
    }

    #[tokio::test]
    async fn serves_until_shutdown() {
        let assets = tempfile::tempdir().unwrap();
        std::fs::write(assets.path().join("ping.txt"), "pong").unwrap();
        let config = HttpConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            assets_dir: None,
        };
        let bound = ContentServer::new(config, MountTable::new().with(Mount::assets("/", assets.path())))
            .bind()
            .await
            .unwrap();
        let addr = bound.local_addr();
        assert_ne!(addr.port(), 0);

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(bound.serve(async {
            let _ = stopped.await;
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /ping.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200"));
        assert!(raw.ends_with("pong"));

        stop.send(()).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = HttpConfig {
            bind_addr: taken.local_addr().unwrap(),
            assets_dir: None,
        };
        let err = ContentServer::new(config, MountTable::new()).bind().await;
        assert!(matches!(err, Err(HttpError::Bind { .. })));
    }
}
