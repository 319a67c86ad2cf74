//! Wire Protocol
//!
//! Bridge traffic shares the surface's one string channel with ordinary
//! application messages. A bridge frame is a JSON object carrying the
//! discriminator field:
//!
//! ```text
//! { "___magic___": true, "type": 2, "interop": "{\"source\":\"wtjs\",\"target\":\"add\",\"parameters\":[1,2],\"callbackId\":\"1-...\"}" }
//! ```
//!
//! Decoding happens in two stages. The raw text is first parsed as a plain
//! JSON object and checked for the discriminator; only then is it decoded as
//! a typed frame. Anything that is not an object, or lacks the field, is an
//! ordinary notification and never reaches the call path.

use crate::core::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::convert::TryFrom;

/// Discriminator field that marks bridge traffic
pub const MAGIC_FIELD: &str = "___magic___";

/// Call kind, the `type` field of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CallKind {
    /// Reserved, plain application message
    Notify = 0,
    InvokeVoid = 1,
    InvokeWithReturn = 2,
    ReadProperty = 3,
    WriteProperty = 4,
}

impl CallKind {
    /// Whether the script side is waiting on a pending entry for this call
    pub fn expects_reply(self) -> bool {
        matches!(self, CallKind::InvokeWithReturn | CallKind::ReadProperty)
    }
}

impl TryFrom<u8> for CallKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CallKind::Notify),
            1 => Ok(CallKind::InvokeVoid),
            2 => Ok(CallKind::InvokeWithReturn),
            3 => Ok(CallKind::ReadProperty),
            4 => Ok(CallKind::WriteProperty),
            other => Err(format!("unknown call kind {}", other)),
        }
    }
}

impl From<CallKind> for u8 {
    fn from(kind: CallKind) -> Self {
        kind as u8
    }
}

/// A decoded bridge call
#[derive(Debug, Clone, PartialEq)]
pub struct CallEnvelope {
    pub kind: CallKind,
    /// Registration name
    pub source: String,
    /// Member name
    pub target: String,
    pub parameters: Vec<Value>,
    /// Present for `InvokeWithReturn` and `ReadProperty`
    pub callback_id: Option<String>,
}

impl CallEnvelope {
    pub fn invoke(source: &str, target: &str, parameters: Vec<Value>) -> Self {
        Self::new(CallKind::InvokeVoid, source, target, parameters, None)
    }

    pub fn invoke_with_return(
        source: &str,
        target: &str,
        parameters: Vec<Value>,
        callback_id: &str,
    ) -> Self {
        Self::new(
            CallKind::InvokeWithReturn,
            source,
            target,
            parameters,
            Some(callback_id.to_string()),
        )
    }

    pub fn read_property(source: &str, target: &str, callback_id: &str) -> Self {
        Self::new(
            CallKind::ReadProperty,
            source,
            target,
            Vec::new(),
            Some(callback_id.to_string()),
        )
    }

    pub fn write_property(source: &str, target: &str, value: Value) -> Self {
        Self::new(CallKind::WriteProperty, source, target, vec![value], None)
    }

    fn new(
        kind: CallKind,
        source: &str,
        target: &str,
        parameters: Vec<Value>,
        callback_id: Option<String>,
    ) -> Self {
        Self {
            kind,
            source: source.to_string(),
            target: target.to_string(),
            parameters,
            callback_id,
        }
    }
}

/// The `interop` payload, as the script stub writes it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Interop {
    source: String,
    target: String,
    #[serde(default)]
    parameters: Vec<Value>,
    #[serde(rename = "callbackId", default, skip_serializing_if = "Option::is_none")]
    callback_id: Option<String>,
}

/// `interop` arrives as JSON text; an inline object is accepted as well
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InteropField {
    Encoded(String),
    Inline(Interop),
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    kind: CallKind,
    interop: InteropField,
}

#[derive(Serialize)]
struct OutgoingFrame<'a> {
    #[serde(rename = "___magic___")]
    magic: bool,
    #[serde(rename = "type")]
    kind: CallKind,
    interop: &'a str,
}

/// Result of decoding one raw channel message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Ordinary application message, passed through untouched
    Notification(String),
    Call(CallEnvelope),
}

/// Decode a raw channel message
///
/// Non-bridge traffic is `Ok(Inbound::Notification)`. A message that carries
/// the discriminator but is otherwise malformed is `Err(BridgeError::Decode)`.
pub fn decode(raw: &str) -> BridgeResult<Inbound> {
    let mut object = match discriminated_object(raw) {
        Some(object) => object,
        None => return Ok(Inbound::Notification(raw.to_string())),
    };
    object.remove(MAGIC_FIELD);

    let frame: WireFrame =
        serde_json::from_value(Value::Object(object)).map_err(decode_error)?;
    if frame.kind == CallKind::Notify {
        return Ok(Inbound::Notification(raw.to_string()));
    }

    let interop = match frame.interop {
        InteropField::Encoded(text) => serde_json::from_str::<Interop>(&text).map_err(decode_error)?,
        InteropField::Inline(interop) => interop,
    };

    if frame.kind.expects_reply() && interop.callback_id.as_deref().map_or(true, str::is_empty) {
        return Err(BridgeError::Decode(format!(
            "{:?} call to '{}' has no callbackId",
            frame.kind, interop.target
        )));
    }

    Ok(Inbound::Call(CallEnvelope {
        kind: frame.kind,
        source: interop.source,
        target: interop.target,
        parameters: interop.parameters,
        callback_id: interop.callback_id,
    }))
}

/// Whether `raw` is ordinary (non-bridge) traffic
pub fn is_notification(raw: &str) -> bool {
    discriminated_object(raw).is_none()
}

/// Encode a call exactly as the script-side channel wrapper would
pub fn encode(envelope: &CallEnvelope) -> BridgeResult<String> {
    let interop = Interop {
        source: envelope.source.clone(),
        target: envelope.target.clone(),
        parameters: envelope.parameters.clone(),
        callback_id: envelope.callback_id.clone(),
    };
    let interop = serde_json::to_string(&interop)
        .map_err(|e| BridgeError::Serialization(e.to_string()))?;
    serde_json::to_string(&OutgoingFrame {
        magic: true,
        kind: envelope.kind,
        interop: &interop,
    })
    .map_err(|e| BridgeError::Serialization(e.to_string()))
}

/// The message as a JSON object, if and only if it carries a non-null
/// discriminator
fn discriminated_object(raw: &str) -> Option<Map<String, Value>> {
    let object = serde_json::from_str::<Map<String, Value>>(raw).ok()?;
    match object.get(MAGIC_FIELD) {
        None | Some(Value::Null) => None,
        Some(_) => Some(object),
    }
}

fn decode_error(error: serde_json::Error) -> BridgeError {
    BridgeError::Decode(error.to_string())
}
