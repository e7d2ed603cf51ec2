//! Engine.IO v4 / Socket.IO v5 text packet codec
//!
//! Engine.IO wire format: `<type digit><data>`, e.g. `2` (ping),
//! `0{"sid":...}` (open), `4<socket.io packet>` (message).
//!
//! Socket.IO packet inside a message:
//! `<type digit>[/namespace,][ack id][json]`, e.g. `2["chatbot_message",{...}]`.
//! Binary packets are not supported.

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Engine.IO handshake data sent with the open packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    /// Milliseconds to wait past the interval before giving up
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

/// Engine.IO packet
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// Socket.IO packet carried in an Engine.IO message
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        message: String,
    },
}

impl SocketPacket {
    /// Event on `namespace` with a single payload argument
    pub fn event(namespace: &str, name: impl Into<String>, payload: Value) -> Self {
        SocketPacket::Event {
            namespace: namespace.to_string(),
            ack_id: None,
            name: name.into(),
            args: vec![payload],
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }
}

impl EnginePacket {
    /// Encode to the text wire format
    pub fn encode(&self) -> Result<String> {
        let text = match self {
            EnginePacket::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(packet) => format!("4{}", encode_socket(packet)?),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        };
        Ok(text)
    }

    /// Decode a text frame
    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| SessionError::Protocol("Empty engine.io packet".to_string()))?;
        let rest = chars.as_str();

        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(rest).map_err(|e| {
                SessionError::Protocol(format!("Invalid handshake: {}", e))
            })?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(rest.to_string())),
            '3' => Ok(EnginePacket::Pong(rest.to_string())),
            '4' => Ok(EnginePacket::Message(decode_socket(rest)?)),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(SessionError::Protocol(format!(
                "Unknown engine.io packet type: {}",
                other
            ))),
        }
    }
}

fn encode_socket(packet: &SocketPacket) -> Result<String> {
    let mut out = String::new();
    let (kind, namespace) = match packet {
        SocketPacket::Connect { namespace, .. } => ('0', namespace),
        SocketPacket::Disconnect { namespace } => ('1', namespace),
        SocketPacket::Event { namespace, .. } => ('2', namespace),
        SocketPacket::Ack { namespace, .. } => ('3', namespace),
        SocketPacket::ConnectError { namespace, .. } => ('4', namespace),
    };
    out.push(kind);
    if !namespace.is_empty() && namespace != "/" {
        out.push_str(namespace);
        out.push(',');
    }

    match packet {
        SocketPacket::Connect { data, .. } => {
            if let Some(data) = data {
                out.push_str(&serde_json::to_string(data)?);
            }
        }
        SocketPacket::Disconnect { .. } => {}
        SocketPacket::Event {
            ack_id, name, args, ..
        } => {
            if let Some(id) = ack_id {
                out.push_str(&id.to_string());
            }
            let mut body = Vec::with_capacity(args.len() + 1);
            body.push(Value::String(name.clone()));
            body.extend(args.iter().cloned());
            out.push_str(&serde_json::to_string(&body)?);
        }
        SocketPacket::Ack { ack_id, args, .. } => {
            out.push_str(&ack_id.to_string());
            out.push_str(&serde_json::to_string(args)?);
        }
        SocketPacket::ConnectError { message, .. } => {
            out.push_str(&serde_json::to_string(&serde_json::json!({ "message": message }))?);
        }
    }
    Ok(out)
}

fn decode_socket(text: &str) -> Result<SocketPacket> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| SessionError::Protocol("Empty socket.io packet".to_string()))?;
    let mut rest = chars.as_str();

    let mut namespace = "/".to_string();
    if rest.starts_with('/') {
        let end = rest.find(',').unwrap_or(rest.len());
        namespace = rest[..end].to_string();
        rest = rest.get(end + 1..).unwrap_or("");
    }

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let ack_id = if digits > 0 {
        Some(rest[..digits].parse::<u64>().map_err(|e| {
            SessionError::Protocol(format!("Invalid ack id: {}", e))
        })?)
    } else {
        None
    };
    let body = &rest[digits..];
    let json = if body.is_empty() {
        None
    } else {
        Some(serde_json::from_str::<Value>(body).map_err(|e| {
            SessionError::Protocol(format!("Invalid socket.io payload: {}", e))
        })?)
    };

    match kind {
        '0' => Ok(SocketPacket::Connect {
            namespace,
            data: json,
        }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let Some(Value::Array(mut items)) = json else {
                return Err(SessionError::Protocol(
                    "Event packet without argument array".to_string(),
                ));
            };
            if items.is_empty() {
                return Err(SessionError::Protocol("Event packet without name".to_string()));
            }
            let name = match items.remove(0) {
                Value::String(name) => name,
                other => {
                    return Err(SessionError::Protocol(format!(
                        "Event name must be a string, got {}",
                        other
                    )))
                }
            };
            Ok(SocketPacket::Event {
                namespace,
                ack_id,
                name,
                args: items,
            })
        }
        '3' => {
            let ack_id = ack_id
                .ok_or_else(|| SessionError::Protocol("Ack packet without id".to_string()))?;
            let args = match json {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            Ok(SocketPacket::Ack {
                namespace,
                ack_id,
                args,
            })
        }
        '4' => {
            let message = match json {
                Some(Value::Object(obj)) => obj
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("connect error")
                    .to_string(),
                Some(Value::String(s)) => s,
                _ => "connect error".to_string(),
            };
            Ok(SocketPacket::ConnectError { namespace, message })
        }
        '5' | '6' => Err(SessionError::Protocol(
            "Binary socket.io packets are not supported".to_string(),
        )),
        other => Err(SessionError::Protocol(format!(
            "Unknown socket.io packet type: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        let EnginePacket::Open(handshake) = packet else {
            panic!("expected open");
        };
        assert_eq!(handshake.sid, "abc");
        assert_eq!(handshake.ping_interval, 25_000);
        assert_eq!(handshake.max_payload, Some(1_000_000));
    }

    #[test]
    fn test_ping_pong() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(EnginePacket::Pong(String::new()).encode().unwrap(), "3");
    }

    #[test]
    fn test_encode_connect_default_namespace() {
        let packet = EnginePacket::Message(SocketPacket::Connect {
            namespace: "/".to_string(),
            data: None,
        });
        assert_eq!(packet.encode().unwrap(), "40");
    }

    #[test]
    fn test_encode_connect_with_namespace_and_auth() {
        let packet = EnginePacket::Message(SocketPacket::Connect {
            namespace: "/chat".to_string(),
            data: Some(json!({"token": "t"})),
        });
        assert_eq!(packet.encode().unwrap(), r#"40/chat,{"token":"t"}"#);
    }

    #[test]
    fn test_encode_event() {
        let packet = EnginePacket::Message(SocketPacket::event(
            "/",
            "user_message",
            json!({"message": "Hello"}),
        ));
        assert_eq!(
            packet.encode().unwrap(),
            r#"42["user_message",{"message":"Hello"}]"#
        );
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack() {
        let packet = EnginePacket::decode(r#"42/chat,17["bot_typing",{"typing":true}]"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Event {
                namespace: "/chat".to_string(),
                ack_id: Some(17),
                name: "bot_typing".to_string(),
                args: vec![json!({"typing": true})],
            })
        );
    }

    #[test]
    fn test_decode_connect_ack_and_error() {
        let packet = EnginePacket::decode(r#"40{"sid":"xyz"}"#).unwrap();
        assert!(matches!(
            packet,
            EnginePacket::Message(SocketPacket::Connect { ref namespace, data: Some(_) }) if namespace == "/"
        ));

        let packet = EnginePacket::decode(r#"44{"message":"Not authorized"}"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::ConnectError {
                namespace: "/".to_string(),
                message: "Not authorized".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_disconnect_namespace_only() {
        assert_eq!(
            EnginePacket::decode("41/chat,").unwrap(),
            EnginePacket::Message(SocketPacket::Disconnect {
                namespace: "/chat".to_string()
            })
        );
        assert_eq!(
            EnginePacket::decode("41/chat").unwrap(),
            EnginePacket::Message(SocketPacket::Disconnect {
                namespace: "/chat".to_string()
            })
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(EnginePacket::decode("").is_err());
        assert!(EnginePacket::decode("9").is_err());
        assert!(EnginePacket::decode("42").is_err());
        assert!(EnginePacket::decode("42[]").is_err());
        assert!(EnginePacket::decode("42[1,2]").is_err());
        assert!(EnginePacket::decode(r#"45-["bin"]"#).is_err());
    }
}
