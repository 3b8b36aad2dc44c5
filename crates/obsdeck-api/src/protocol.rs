//! obs-websocket v5 framing.
//!
//! Every frame is `{ "op": <u8>, "d": { ... } }`. Only the op codes the
//! control dashboard needs are modeled here.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

/// RPC version negotiated in `Identify`.
pub const RPC_VERSION: u32 = 1;

/// obs-websocket op codes.
pub mod op {
    pub const HELLO: u8 = 0;
    pub const IDENTIFY: u8 = 1;
    pub const IDENTIFIED: u8 = 2;
    pub const EVENT: u8 = 5;
    pub const REQUEST: u8 = 6;
    pub const REQUEST_RESPONSE: u8 = 7;
}

/// Raw frame envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
}

/// `Hello` payload (server → client).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub obs_web_socket_version: Option<String>,
    #[serde(default)]
    pub rpc_version: Option<u32>,
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

/// Authentication challenge carried by `Hello`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

/// `RequestResponse` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u16,
    #[serde(default)]
    pub comment: Option<String>,
}

/// `Event` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrame {
    pub event_type: String,
    #[serde(default)]
    pub event_data: Option<Value>,
}

/// Build the `Identify` frame, answering the challenge when present.
pub fn identify(authentication: Option<String>) -> Frame {
    let d = match authentication {
        Some(auth) => json!({ "rpcVersion": RPC_VERSION, "authentication": auth }),
        None => json!({ "rpcVersion": RPC_VERSION }),
    };
    Frame { op: op::IDENTIFY, d }
}

/// Build a `Request` frame.
pub fn request(request_type: &str, request_id: &str, request_data: Option<Value>) -> Frame {
    let mut d = json!({
        "requestType": request_type,
        "requestId": request_id,
    });
    if let Some(data) = request_data {
        d["requestData"] = data;
    }
    Frame { op: op::REQUEST, d }
}

/// Compute the authentication string:
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`.
pub fn auth_string(password: &str, challenge: &str, salt: &str) -> String {
    let engine = base64::engine::general_purpose::STANDARD;
    let secret = engine.encode(Sha256::digest(format!("{password}{salt}").as_bytes()));
    engine.encode(Sha256::digest(format!("{secret}{challenge}").as_bytes()))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn auth_string_is_base64_sha256() {
        let auth = auth_string("supersecret", "challenge-1", "salt");
        // 32 bytes of SHA-256, base64 with padding
        assert_eq!(auth.len(), 44);
        assert!(auth.ends_with('='));
        assert_eq!(auth, auth_string("supersecret", "challenge-1", "salt"));
    }

    #[test]
    fn auth_string_depends_on_every_input() {
        let base = auth_string("pw", "c", "s");
        assert_ne!(base, auth_string("pw2", "c", "s"));
        assert_ne!(base, auth_string("pw", "c2", "s"));
        assert_ne!(base, auth_string("pw", "c", "s2"));
    }

    #[test]
    fn request_frame_omits_absent_data() {
        let frame = request("GetSceneList", "7", None);
        assert_eq!(frame.op, op::REQUEST);
        assert_eq!(frame.d["requestType"], "GetSceneList");
        assert_eq!(frame.d["requestId"], "7");
        assert!(frame.d.get("requestData").is_none());
    }

    #[test]
    fn request_frame_carries_data() {
        let frame = request(
            "SetInputMute",
            "8",
            Some(json!({ "inputName": "Mic", "inputMuted": true })),
        );
        assert_eq!(frame.d["requestData"]["inputName"], "Mic");
    }

    #[test]
    fn identify_with_and_without_auth() {
        assert!(identify(None).d.get("authentication").is_none());
        assert_eq!(identify(Some("abc".into())).d["authentication"], "abc");
        assert_eq!(identify(None).d["rpcVersion"], RPC_VERSION);
    }

    #[test]
    fn decode_hello_with_challenge() {
        let raw = r#"{"op":0,"d":{"obsWebSocketVersion":"5.5.0","rpcVersion":1,
            "authentication":{"challenge":"abc","salt":"xyz"}}}"#;
        let frame: Frame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.op, op::HELLO);
        let hello: Hello = serde_json::from_value(frame.d).unwrap();
        let auth = hello.authentication.unwrap();
        assert_eq!(auth.challenge, "abc");
        assert_eq!(auth.salt, "xyz");
    }

    #[test]
    fn decode_failed_response() {
        let raw = r#"{"requestType":"StopStream","requestId":"3",
            "requestStatus":{"result":false,"code":501,"comment":"not active"}}"#;
        let resp: RequestResponse = serde_json::from_str(raw).unwrap();
        assert!(!resp.request_status.result);
        assert_eq!(resp.request_status.code, 501);
        assert!(resp.response_data.is_none());
    }
}
