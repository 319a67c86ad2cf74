//! # WebView Interop
//!
//! A bidirectional remote-call bridge between host objects and the scripts
//! running inside an embedded web surface, built on nothing more than the
//! surface's one-way string channel and its script-evaluation primitive.
//!
//! ## Features
//!
//! - **Exposure**: publish a host object under a global name; scripts call its
//!   methods and read or write its properties as if it were local
//! - **Promises**: calls that return a value resolve a script-side promise
//!   when the host replies, and reject when the host cannot serve them
//! - **Coexistence**: ordinary application messages share the channel and
//!   reach the host untouched
//! - **Coercion**: weakly typed script values are narrowed to the declared
//!   argument types (enums, UUIDs, every integer width)
//!
//! ## Architecture Design
//!
//! - **Bindings**: pure protocol pieces (capability tables, coercion, wire
//!   codec, generated scripts)
//! - **Bridge**: the host-owned context that registers objects and routes
//!   calls
//! - **Surface**: the script host the bridge attaches to
//!
//! ### Example
//!
//! ```ignore
//! use webview_interop::{Bridge, CapabilityTable, Exposed, BridgeResult, QuickJsSurface};
//!
//! impl Exposed for AppWindow {
//!     fn capabilities() -> BridgeResult<CapabilityTable<Self>> {
//!         CapabilityTable::builder()
//!             .method("setTitle", |w: &AppWindow, (title,): (String,)| w.set_title(title))
//!             .getter("title", |w: &AppWindow| w.title())
//!             .build()
//!     }
//! }
//!
//! let surface = Arc::new(QuickJsSurface::new()?);
//! let bridge = Bridge::new(Arc::clone(&surface));
//! bridge.expose("wtjs", &window)?;
//! surface.navigate("wtjs.setTitle('Hello');")?;
//! surface.pump();
//! ```
//!
//! ## Modules
//!
//! - [`bindings`]: capability tables, coercion, wire protocol, script generation
//! - [`bridge`]: registration and dispatch
//! - [`surface`]: surface abstraction and implementations
//! - [`config`]: configuration
//! - [`core`]: errors, logging, macros

/// Errors, logging and shared macros
#[macro_use]
pub mod core;
/// Capability tables, coercion, wire protocol and generated scripts
pub mod bindings;
/// Host-owned bridge context
pub mod bridge;
/// Bridge configuration
pub mod config;
/// Script hosts
pub mod surface;

pub use bindings::{
    BridgeType, CallEnvelope, CallKind, CapabilityTable, CapabilityTableBuilder, Exposed, Inbound,
    MemberKind, MemberSchema, ValueType,
};
pub use bridge::{Bridge, NotificationHandler};
pub use config::{BridgeConfig, LogLevel, LoggingConfig};
pub use core::{init_logging, BridgeError, BridgeResult, CoercionError, SurfaceError, SurfaceResult};
pub use surface::{HandlerId, MemorySurface, QuickJsSurface, Surface};
