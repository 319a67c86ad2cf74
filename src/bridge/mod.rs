//! Bridge context
//!
//! [`Bridge`] is owned by the host and attached to one surface. It holds
//! the registry of exposed objects and connects, per registration, a
//! navigation-completed handler (install channel wrapper, inject stub). A
//! single message handler decodes each message once: ordinary notifications
//! go to the host, calls go to the registration named by their `source`, and
//! calls addressed to names nobody registered are rejected.
//!
//! ```ignore
//! let surface = Arc::new(QuickJsSurface::new()?);
//! let bridge = Bridge::new(Arc::clone(&surface));
//! bridge.expose("wtjs", &window)?;
//! surface.navigate(page)?;
//! surface.pump();
//! ```

mod dispatch;
mod registry;

use crate::bindings::capability::{CapabilityTable, Exposed, MemberSchema};
use crate::bindings::protocol::{decode, CallEnvelope, Inbound};
use crate::bindings::stub::{generate_stub, removal_script};
use crate::config::BridgeConfig;
use crate::core::error::{BridgeError, BridgeResult};
use crate::surface::{HandlerId, Surface};
use registry::{RegisteredObject, Registration, Registry};
use std::sync::{Arc, PoisonError, RwLock};

/// Receives every non-bridge message posted by scripts
pub type NotificationHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// State shared with the handlers connected to the surface
struct Shared {
    registry: Registry,
    config: BridgeConfig,
    notification: RwLock<Option<NotificationHandler>>,
}

impl Shared {
    fn notify_host(&self, message: &str) {
        let handler = self
            .notification
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match handler {
            Some(handler) => handler(message),
            None => tracing::debug!(target: "bridge", "Notification without handler: {}", message),
        }
    }

    /// Full routing of one raw message
    fn route(&self, surface: &dyn Surface, raw: &str) {
        match decode(raw) {
            Ok(Inbound::Notification(message)) => self.notify_host(&message),
            Ok(Inbound::Call(envelope)) => match self.registry.get(&envelope.source) {
                Some(registration) => {
                    dispatch::dispatch(surface, registration.as_ref(), &envelope, &self.config)
                }
                None => self.reject_orphan(surface, &envelope),
            },
            Err(e) => tracing::debug!(target: "bridge", "Dropping malformed bridge message: {}", e),
        }
    }

    /// Calls to a name with no registration
    fn reject_orphan(&self, surface: &dyn Surface, envelope: &CallEnvelope) {
        let error = BridgeError::UnknownName(envelope.source.clone());
        dispatch::settle(surface, envelope, Err(error), &self.config);
    }
}

/// Host-owned bridge attached to one surface
pub struct Bridge<S: Surface + 'static> {
    surface: Arc<S>,
    shared: Arc<Shared>,
    router: HandlerId,
}

impl<S: Surface + 'static> Bridge<S> {
    /// Attach with the default configuration
    pub fn new(surface: Arc<S>) -> Self {
        Self::with_config(surface, BridgeConfig::default())
    }

    pub fn with_config(surface: Arc<S>, config: BridgeConfig) -> Self {
        let shared = Arc::new(Shared {
            registry: Registry::new(),
            config,
            notification: RwLock::new(None),
        });

        let router_state = Arc::clone(&shared);
        let router = surface.connect_message_received(Arc::new(move |surface: &dyn Surface, raw: &str| {
            router_state.route(surface, raw)
        }));

        tracing::debug!(target: "bridge", "Bridge attached");
        Self {
            surface,
            shared,
            router,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    pub fn surface(&self) -> &Arc<S> {
        &self.surface
    }

    /// Expose `target` to scripts as `window[name]`
    ///
    /// The stub is injected on the next navigation-completed signal, or
    /// right away through [`Bridge::handle_navigation_completed`]. The
    /// bridge holds the target weakly.
    pub fn expose<T: Exposed>(&self, name: &str, target: &Arc<T>) -> BridgeResult<()> {
        Self::check_name(name)?;
        let table = T::capabilities()?;
        self.expose_with(name, target, table)
    }

    /// Expose `target` with an explicitly built table
    pub fn expose_with<T: Exposed>(
        &self,
        name: &str,
        target: &Arc<T>,
        table: CapabilityTable<T>,
    ) -> BridgeResult<()> {
        Self::check_name(name)?;
        let stub = generate_stub(name, table.schema(), &self.shared.config);
        let registration: Arc<dyn RegisteredObject> =
            Arc::new(Registration::new(name, target, table, stub));

        let surface = &self.surface;
        let shared = &self.shared;
        self.shared.registry.insert_with(registration, |registration| {
            let injected = Arc::clone(registration);
            let shared = Arc::clone(shared);
            let navigation = surface.connect_navigation_completed(Arc::new(move |surface: &dyn Surface| {
                if let Err(e) = dispatch::inject(surface, injected.as_ref(), &shared.config) {
                    tracing::warn!(
                        target: "bridge",
                        "Failed to inject '{}': {}",
                        injected.name(),
                        e
                    );
                }
            }));
            registration.set_handler(navigation);
        })?;

        tracing::info!(target: "bridge", "Exposed '{}'", name);
        Ok(())
    }

    /// Withdraw a registration and remove its global from the page
    ///
    /// Returns whether `name` was registered; revoking an absent name does
    /// nothing.
    pub fn revoke(&self, name: &str) -> bool {
        let registration = match self.shared.registry.remove(name) {
            Some(registration) => registration,
            None => return false,
        };
        self.detach(registration.as_ref());

        if let Err(e) = self.surface.evaluate_script(&removal_script(name)) {
            tracing::warn!(target: "bridge", "Failed to remove window['{}']: {}", name, e);
        }
        tracing::info!(target: "bridge", "Revoked '{}'", name);
        true
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.shared.registry.names()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shared.registry.contains(name)
    }

    pub fn len(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Script-visible members of a registration
    pub fn schema(&self, name: &str) -> Option<Vec<MemberSchema>> {
        self.shared
            .registry
            .get(name)
            .map(|registration| registration.schema().to_vec())
    }

    /// Receive every ordinary (non-bridge) message, replacing any earlier
    /// handler
    pub fn on_notification<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self
            .shared
            .notification
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Route one raw message without going through the surface's signal
    pub fn handle_message(&self, raw: &str) {
        self.shared.route(self.surface.as_ref(), raw);
    }

    /// Install the channel wrapper and inject every stub now
    pub fn handle_navigation_completed(&self) {
        for registration in self.shared.registry.snapshot() {
            if let Err(e) =
                dispatch::inject(self.surface.as_ref(), registration.as_ref(), &self.shared.config)
            {
                tracing::warn!(
                    target: "bridge",
                    "Failed to inject '{}': {}",
                    registration.name(),
                    e
                );
            }
        }
    }

    fn detach(&self, registration: &dyn RegisteredObject) {
        if let Some(navigation) = registration.take_handler() {
            self.surface.disconnect(navigation);
        }
    }

    fn check_name(name: &str) -> BridgeResult<()> {
        if !name.trim().is_empty() {
            Ok(())
        } else {
            Err(BridgeError::InvalidName(name.to_string()))
        }
    }
}

impl<S: Surface + 'static> Drop for Bridge<S> {
    fn drop(&mut self) {
        for registration in self.shared.registry.drain() {
            self.detach(registration.as_ref());
        }
        self.surface.disconnect(self.router);
        tracing::debug!(target: "bridge", "Bridge detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::protocol::{encode, CallEnvelope};
    use crate::surface::MemorySurface;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Window {
        title: Mutex<String>,
    }

    impl Exposed for Window {
        fn capabilities() -> BridgeResult<CapabilityTable<Self>> {
            CapabilityTable::builder()
                .method("setTitle", |w: &Window, (title,): (String,)| {
                    *w.title.lock().unwrap() = title;
                })
                .method_with_return("add", |_: &Window, (a, b): (i32, i32)| a + b)
                .property(
                    "title",
                    |w: &Window| w.title.lock().unwrap().clone(),
                    |w: &Window, title: String| *w.title.lock().unwrap() = title,
                )
                .build()
        }
    }

    fn setup() -> (Arc<MemorySurface>, Bridge<MemorySurface>, Arc<Window>) {
        let surface = Arc::new(MemorySurface::new());
        let bridge = Bridge::new(Arc::clone(&surface));
        let window = Arc::new(Window::default());
        bridge.expose("wtjs", &window).unwrap();
        (surface, bridge, window)
    }

    fn post(surface: &MemorySurface, envelope: CallEnvelope) {
        surface.post_message(&encode(&envelope).unwrap());
    }

    #[test]
    fn test_expose_validates_names() {
        let (_, bridge, window) = setup();
        assert_eq!(
            bridge.expose("wtjs", &window),
            Err(BridgeError::DuplicateName("wtjs".to_string()))
        );
        assert_eq!(
            bridge.expose("", &window),
            Err(BridgeError::InvalidName(String::new()))
        );
        assert_eq!(
            bridge.expose("  ", &window),
            Err(BridgeError::InvalidName("  ".to_string()))
        );
        bridge.expose("my window", &window).unwrap();
        assert_eq!(bridge.names(), vec!["my window", "wtjs"]);
    }

    #[test]
    fn test_navigation_injects_stub() {
        let (surface, _bridge, _window) = setup();
        surface.complete_navigation();

        assert!(surface.channel_customized());
        let stubs = surface.evaluated_containing("window[name] = stub;");
        assert_eq!(stubs.len(), 1);
        assert!(stubs[0].contains(r#"var name = "wtjs";"#));
    }

    #[test]
    fn test_void_call_reaches_target() {
        let (surface, _bridge, window) = setup();
        post(&surface, CallEnvelope::invoke("wtjs", "setTitle", vec![json!("Hello")]));
        assert_eq!(*window.title.lock().unwrap(), "Hello");
        assert!(surface.evaluated().is_empty());
    }

    #[test]
    fn test_call_with_return_resolves_once() {
        let (surface, _bridge, _window) = setup();
        post(
            &surface,
            CallEnvelope::invoke_with_return("wtjs", "add", vec![json!(2), json!("40")], "cb-1"),
        );
        let resolutions = surface.evaluated_containing("pending.resolve(42);");
        assert_eq!(resolutions.len(), 1);
        assert!(resolutions[0].contains(r#"var id = "cb-1";"#));
    }

    #[test]
    fn test_property_read_and_write() {
        let (surface, _bridge, window) = setup();
        post(&surface, CallEnvelope::write_property("wtjs", "title", json!("Doc")));
        assert_eq!(*window.title.lock().unwrap(), "Doc");

        post(&surface, CallEnvelope::read_property("wtjs", "title", "cb-2"));
        assert_eq!(surface.evaluated_containing(r#"pending.resolve("Doc");"#).len(), 1);
    }

    #[test]
    fn test_unknown_member_is_rejected() {
        let (surface, _bridge, _window) = setup();
        post(
            &surface,
            CallEnvelope::invoke_with_return("wtjs", "missing", vec![], "cb-3"),
        );
        let rejections = surface.evaluated_containing("pending.reject(");
        assert_eq!(rejections.len(), 1);
        assert!(rejections[0].contains("missing"));
    }

    #[test]
    fn test_unknown_source_is_rejected_once() {
        let (surface, bridge, _window) = setup();
        let other = Arc::new(Window::default());
        bridge.expose("other", &other).unwrap();

        post(&surface, CallEnvelope::invoke_with_return("nobody", "add", vec![], "cb-4"));
        let rejections = surface.evaluated_containing("pending.reject(");
        assert_eq!(rejections.len(), 1);
        assert!(rejections[0].contains(r#"window["nobody"]"#));
    }

    #[test]
    fn test_calls_route_by_source() {
        let (surface, bridge, window) = setup();
        let other = Arc::new(Window::default());
        bridge.expose("other", &other).unwrap();

        post(&surface, CallEnvelope::invoke("other", "setTitle", vec![json!("B")]));
        assert_eq!(*other.title.lock().unwrap(), "B");
        assert_eq!(*window.title.lock().unwrap(), "");
    }

    #[test]
    fn test_one_router_dispatches_each_call_once() {
        let (surface, bridge, window) = setup();
        let others: Vec<Arc<Window>> = (0..3).map(|_| Arc::new(Window::default())).collect();
        for (i, other) in others.iter().enumerate() {
            bridge.expose(&format!("other{}", i), other).unwrap();
        }
        // one router plus one navigation handler per registration
        assert_eq!(surface.handler_count(), 1 + 4);

        post(
            &surface,
            CallEnvelope::invoke_with_return("other1", "add", vec![json!(1), json!(1)], "cb-6"),
        );
        assert_eq!(surface.evaluated().len(), 1);
        assert_eq!(surface.evaluated_containing("pending.resolve(2);").len(), 1);

        post(&surface, CallEnvelope::invoke("wtjs", "setTitle", vec![json!("once")]));
        assert_eq!(*window.title.lock().unwrap(), "once");
        assert!(others.iter().all(|o| o.title.lock().unwrap().is_empty()));
    }

    #[test]
    fn test_notifications_reach_host() {
        let (surface, bridge, window) = setup();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        bridge.on_notification(move |message| sink.lock().unwrap().push(message.to_string()));

        surface.post_message("plain text");
        surface.post_message(r#"{"setTitle": "not a call"}"#);
        assert_eq!(
            received.lock().unwrap().as_slice(),
            ["plain text", r#"{"setTitle": "not a call"}"#]
        );
        assert_eq!(*window.title.lock().unwrap(), "");
    }

    #[test]
    fn test_malformed_bridge_message_is_dropped() {
        let (surface, bridge, _window) = setup();
        let received = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&received);
        bridge.on_notification(move |_| *sink.lock().unwrap() += 1);

        surface.post_message(r#"{"___magic___": true, "type": 2, "interop": "{"}"#);
        assert_eq!(*received.lock().unwrap(), 0);
        assert!(surface.evaluated().is_empty());
    }

    #[test]
    fn test_revoke_detaches_and_removes_global() {
        let (surface, bridge, window) = setup();
        assert_eq!(surface.handler_count(), 2);

        assert!(bridge.revoke("wtjs"));
        assert_eq!(surface.handler_count(), 1);
        assert!(!bridge.contains("wtjs"));
        assert_eq!(surface.evaluated_containing(r#"delete window["wtjs"]"#).len(), 1);

        post(&surface, CallEnvelope::invoke("wtjs", "setTitle", vec![json!("late")]));
        assert_eq!(*window.title.lock().unwrap(), "");

        surface.clear();
        assert!(!bridge.revoke("wtjs"));
        assert!(surface.evaluated().is_empty());
        bridge.expose("wtjs", &window).unwrap();
    }

    #[test]
    fn test_dropped_target_rejects_calls() {
        let (surface, _bridge, window) = setup();
        drop(window);
        post(&surface, CallEnvelope::invoke_with_return("wtjs", "add", vec![json!(1), json!(2)], "cb-5"));
        assert_eq!(surface.evaluated_containing("pending.reject(").len(), 1);
    }

    #[test]
    fn test_drop_disconnects_everything() {
        let (surface, bridge, _window) = setup();
        assert_eq!(surface.handler_count(), 2);
        drop(bridge);
        assert_eq!(surface.handler_count(), 0);
    }

    #[test]
    fn test_handle_message_without_signal() {
        let surface = Arc::new(MemorySurface::new());
        let bridge = Bridge::new(Arc::clone(&surface));
        let window = Arc::new(Window::default());
        bridge.expose("wtjs", &window).unwrap();

        let raw = encode(&CallEnvelope::invoke("wtjs", "setTitle", vec![json!("direct")])).unwrap();
        bridge.handle_message(&raw);
        assert_eq!(*window.title.lock().unwrap(), "direct");

        bridge.handle_navigation_completed();
        assert_eq!(surface.evaluated_containing("window[name] = stub;").len(), 1);
        assert_eq!(bridge.schema("wtjs").map(|s| s.len()), Some(3));
    }
}
