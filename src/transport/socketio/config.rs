//! Socket.IO transport configuration

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use url::Url;

/// Engine.IO protocol revision spoken by this client
pub const ENGINE_IO_VERSION: &str = "4";

/// Socket.IO transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketIoConfig {
    /// Server path of the Engine.IO endpoint (default: `/socket.io/`)
    #[serde(default = "default_path")]
    pub path: String,

    /// Socket.IO namespace to join (default: `/`)
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Extra query parameters appended to the handshake URL
    #[serde(default)]
    pub query: Vec<(String, String)>,
}

fn default_path() -> String {
    "/socket.io/".to_string()
}

fn default_namespace() -> String {
    "/".to_string()
}

impl Default for SocketIoConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            namespace: default_namespace(),
            query: Vec::new(),
        }
    }
}

impl SocketIoConfig {
    /// Build the WebSocket URL for a backend endpoint
    ///
    /// `http://host:5000` becomes
    /// `ws://host:5000/socket.io/?EIO=4&transport=websocket`. An endpoint
    /// with a non-root path keeps its path.
    pub fn websocket_url(&self, endpoint: &str) -> Result<Url> {
        let mut url = Url::parse(endpoint)
            .map_err(|e| SessionError::Config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(SessionError::Config(format!(
                    "Unsupported endpoint scheme '{}'",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| SessionError::Config(format!("Cannot use scheme {} for {}", scheme, endpoint)))?;

        if url.path().is_empty() || url.path() == "/" {
            url.set_path(&self.path);
        }

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("EIO", ENGINE_IO_VERSION);
            pairs.append_pair("transport", "websocket");
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Namespace in canonical form (`/` for the default namespace)
    pub fn namespace(&self) -> &str {
        if self.namespace.is_empty() {
            "/"
        } else {
            &self.namespace
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_endpoint() {
        let url = SocketIoConfig::default()
            .websocket_url("http://localhost:5000")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_https_endpoint_with_query() {
        let config = SocketIoConfig {
            query: vec![("lang".to_string(), "pl".to_string())],
            ..Default::default()
        };
        let url = config.websocket_url("https://bot.example.edu").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/socket.io/");
        assert_eq!(url.query(), Some("EIO=4&transport=websocket&lang=pl"));
    }

    #[test]
    fn test_custom_path_is_kept() {
        let url = SocketIoConfig::default()
            .websocket_url("ws://localhost:5000/chat-io/")
            .unwrap();
        assert_eq!(url.path(), "/chat-io/");
    }

    #[test]
    fn test_invalid_endpoints() {
        let config = SocketIoConfig::default();
        assert!(matches!(config.websocket_url("not a url"), Err(SessionError::Config(_))));
        assert!(matches!(config.websocket_url("ftp://host"), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_namespace_canonical() {
        let config = SocketIoConfig {
            namespace: String::new(),
            ..Default::default()
        };
        assert_eq!(config.namespace(), "/");
    }
}
