use serde::{Deserialize, Serialize};
use swarm_store::ConfigDocument;

/// Messages exchanged between swarm nodes.
///
/// On the wire every message is a JSON object discriminated by `"type"`;
/// a `SYNC_RES` carries the document fields flattened into the same object:
///
/// ```json
/// {"type":"SYNC_RES","version":5,"networks":[{"ssid":"Y","pass":"b"}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireMessage", into = "WireMessage")]
pub enum SyncMessage {
    /// Ask reachable always-on peers for their document.
    SyncRequest,
    /// A full document, either answering a request or pushed after a local edit.
    SyncResponse(ConfigDocument),
    /// Attention command with no document payload.
    Signal(Signal),
}

/// Commands carried by `Signal` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Every node that hears this blinks its indicator.
    FindMe,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::FindMe => f.write_str("find-me"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
enum WireMessage {
    #[serde(rename = "SYNC_REQ")]
    SyncReq,
    #[serde(rename = "SYNC_RES")]
    SyncRes(ConfigDocument),
    #[serde(rename = "BLINK_CMD")]
    BlinkCmd,
}

impl From<WireMessage> for SyncMessage {
    fn from(wire: WireMessage) -> Self {
        match wire {
            WireMessage::SyncReq => SyncMessage::SyncRequest,
            WireMessage::SyncRes(doc) => SyncMessage::SyncResponse(doc),
            WireMessage::BlinkCmd => SyncMessage::Signal(Signal::FindMe),
        }
    }
}

impl From<SyncMessage> for WireMessage {
    fn from(msg: SyncMessage) -> Self {
        match msg {
            SyncMessage::SyncRequest => WireMessage::SyncReq,
            SyncMessage::SyncResponse(doc) => WireMessage::SyncRes(doc),
            SyncMessage::Signal(Signal::FindMe) => WireMessage::BlinkCmd,
        }
    }
}

impl SyncMessage {
    pub fn encode(&self) -> swarm_core::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a payload. Unknown or missing discriminators are errors.
    pub fn decode(bytes: &[u8]) -> swarm_core::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::SyncRequest => "SYNC_REQ",
            SyncMessage::SyncResponse(_) => "SYNC_RES",
            SyncMessage::Signal(Signal::FindMe) => "BLINK_CMD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_store::Credential;

    #[test]
    fn test_request_wire_shape() {
        let json = serde_json::to_value(SyncMessage::SyncRequest).unwrap();
        assert_eq!(json, serde_json::json!({"type": "SYNC_REQ"}));
    }

    #[test]
    fn test_response_flattens_document() {
        let msg = SyncMessage::SyncResponse(ConfigDocument {
            version: 5,
            networks: vec![Credential::new("Y", "b")],
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "SYNC_RES",
                "version": 5,
                "networks": [{"ssid": "Y", "pass": "b"}]
            })
        );
    }

    #[test]
    fn test_blink_decodes_to_find_me() {
        let msg = SyncMessage::decode(br#"{"type":"BLINK_CMD"}"#).unwrap();
        assert_eq!(msg, SyncMessage::Signal(Signal::FindMe));
    }

    #[test]
    fn test_response_without_networks_defaults() {
        let msg = SyncMessage::decode(br#"{"type":"SYNC_RES","version":2}"#).unwrap();
        assert_eq!(
            msg,
            SyncMessage::SyncResponse(ConfigDocument {
                version: 2,
                networks: vec![]
            })
        );
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        assert!(SyncMessage::decode(b"not json").is_err());
        assert!(SyncMessage::decode(br#"{"version":3}"#).is_err());
        assert!(SyncMessage::decode(br#"{"type":"SELF_DESTRUCT"}"#).is_err());
    }
}
