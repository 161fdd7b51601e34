use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3030;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listens on every interface unless set; use `127.0.0.1` to keep a
    /// share private to this machine.
    pub bind_addr: SocketAddr,
    /// Local directory mounted behind the live tree.
    pub assets_dir: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            assets_dir: None,
        }
    }
}

impl HttpConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }
}

/// Browsable URL for a listener; a wildcard bind is shown as `localhost`.
pub fn url_for(addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() {
        format!("http://localhost:{}/", addr.port())
    } else {
        format!("http://{addr}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = HttpConfig::default();
        assert_eq!(c.bind_addr, "0.0.0.0:3030".parse::<SocketAddr>().unwrap());
        assert!(c.assets_dir.is_none());
    }

    #[test]
    fn port_override_keeps_host() {
        let c = HttpConfig {
            bind_addr: "0.0.0.0:80".parse().unwrap(),
            assets_dir: None,
        }
        .with_port(8080);
        assert_eq!(c.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn wildcard_url_names_localhost() {
        assert_eq!(url_for("0.0.0.0:3030".parse().unwrap()), "http://localhost:3030/");
        assert_eq!(url_for("[::]:80".parse().unwrap()), "http://localhost:80/");
        assert_eq!(url_for("127.0.0.1:9000".parse().unwrap()), "http://127.0.0.1:9000/");
        assert_eq!(url_for("[::1]:9000".parse().unwrap()), "http://[::1]:9000/");
    }
}
