//! Embedded surfaces
//!
//! A surface is whatever hosts the scripts: it evaluates script text, raises
//! a navigation-completed signal when a page finishes loading, and raises a
//! message-received signal for every string a script posts through the
//! channel. The bridge only ever talks to a surface through [`Surface`].
//!
//! - `memory` - recording surface for tests and headless hosts
//! - `quickjs` - QuickJS backed surface

pub mod memory;
pub mod quickjs;

pub use memory::MemorySurface;
pub use quickjs::QuickJsSurface;

use crate::core::error::SurfaceResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Identifies a connected signal handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Called after a page has finished loading
pub type NavigationHandler = Arc<dyn Fn(&dyn Surface) + Send + Sync>;
/// Called with every raw string a script posts
pub type MessageHandler = Arc<dyn Fn(&dyn Surface, &str) + Send + Sync>;

/// Script host the bridge attaches to
pub trait Surface {
    /// Evaluate `script` and return its completion value as text
    fn evaluate_script(&self, script: &str) -> SurfaceResult<String>;

    fn connect_navigation_completed(&self, handler: NavigationHandler) -> HandlerId;

    fn connect_message_received(&self, handler: MessageHandler) -> HandlerId;

    /// Detach a handler; returns whether it was connected
    fn disconnect(&self, id: HandlerId) -> bool;
}

/// Handler lists shared by the surface implementations
///
/// Emission clones the handler list first, so handlers may connect or
/// disconnect while being called.
#[derive(Default)]
pub struct Signals {
    next_id: AtomicU64,
    navigation: Mutex<Vec<(HandlerId, NavigationHandler)>>,
    message: Mutex<Vec<(HandlerId, MessageHandler)>>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_navigation(&self, handler: NavigationHandler) -> HandlerId {
        let id = self.next_id();
        lock(&self.navigation).push((id, handler));
        id
    }

    pub fn connect_message(&self, handler: MessageHandler) -> HandlerId {
        let id = self.next_id();
        lock(&self.message).push((id, handler));
        id
    }

    pub fn disconnect(&self, id: HandlerId) -> bool {
        let mut navigation = lock(&self.navigation);
        let before = navigation.len();
        navigation.retain(|(handler_id, _)| *handler_id != id);
        if navigation.len() != before {
            return true;
        }
        drop(navigation);

        let mut message = lock(&self.message);
        let before = message.len();
        message.retain(|(handler_id, _)| *handler_id != id);
        message.len() != before
    }

    pub fn emit_navigation_completed(&self, surface: &dyn Surface) {
        let handlers: Vec<NavigationHandler> =
            lock(&self.navigation).iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            handler(surface);
        }
    }

    pub fn emit_message(&self, surface: &dyn Surface, message: &str) {
        let handlers: Vec<MessageHandler> =
            lock(&self.message).iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            handler(surface, message);
        }
    }

    /// Connected handlers, both signals together
    pub fn handler_count(&self) -> usize {
        lock(&self.navigation).len() + lock(&self.message).len()
    }

    fn next_id(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
