use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HttpResult<T> = Result<T, HttpError>;
