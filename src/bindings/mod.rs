//! Script Binding Layer
//!
//! Everything that crosses the string channel between host and script is
//! built here; nothing in this module touches a surface.
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Script (surface)                        │
//! │  ┌──────────────┐   calls    ┌──────────────────────────┐   │
//! │  │ window[name] │ ─────────> │ channel wrapper          │   │
//! │  │ (stub)       │            │ window.external.notify   │   │
//! │  └──────▲───────┘            └────────────┬─────────────┘   │
//! │         │ resolve/reject snippets         │ framed string   │
//! └─────────┼─────────────────────────────────┼─────────────────┘
//!           │                                 v
//! ┌─────────┼─────────────────────────────────────────────────────┐
//! │         │              Host (bridge)                          │
//! │  ┌──────┴───────┐   ┌───────────┐   ┌──────────┐   ┌────────┐ │
//! │  │ correlator   │<──│ dispatch  │<──│ coercion │<──│protocol│ │
//! │  └──────────────┘   └─────┬─────┘   └──────────┘   └────────┘ │
//! │                           v                                   │
//! │                  capability table -> host object              │
//! └───────────────────────────────────────────────────────────────┘
//! ```

pub mod capability;
pub mod channel;
pub mod coercion;
pub mod correlator;
pub mod protocol;
pub mod stub;

#[cfg(test)]
mod property_tests;

pub use capability::{
    Arguments, BridgeType, CapabilityDescriptor, CapabilityTable, CapabilityTableBuilder,
    Exposed, IntWidth, MemberKind, MemberSchema, ValueType, RESERVED_MEMBERS,
};
pub use coercion::{coerce, coerce_all};
pub use protocol::{decode, encode, is_notification, CallEnvelope, CallKind, Inbound, MAGIC_FIELD};

/// Quote `text` as a script string literal
pub(crate) fn js_literal(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}
