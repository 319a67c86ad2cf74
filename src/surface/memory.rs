/// Recording surface
///
/// Evaluates nothing. Every script is recorded, the channel installation
/// query is answered from a flag, and tests fire the two signals by hand.
use super::{HandlerId, MessageHandler, NavigationHandler, Signals, Surface};
use crate::bindings::channel::{CHANNEL_CHECK_TAG, CHANNEL_INSTALL_TAG};
use crate::core::error::{SurfaceError, SurfaceResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Default)]
pub struct MemorySurface {
    signals: Signals,
    evaluated: Mutex<Vec<String>>,
    channel_customized: AtomicBool,
    failing: AtomicBool,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts evaluated so far, oldest first
    pub fn evaluated(&self) -> Vec<String> {
        self.scripts().clone()
    }

    /// Evaluated scripts containing `needle`
    pub fn evaluated_containing(&self, needle: &str) -> Vec<String> {
        self.scripts()
            .iter()
            .filter(|script| script.contains(needle))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.scripts().clear();
    }

    pub fn set_channel_customized(&self, customized: bool) {
        self.channel_customized.store(customized, Ordering::SeqCst);
    }

    pub fn channel_customized(&self) -> bool {
        self.channel_customized.load(Ordering::SeqCst)
    }

    /// Make every later evaluation fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Raise navigation-completed, as if a page had loaded
    pub fn complete_navigation(&self) {
        self.signals.emit_navigation_completed(self);
    }

    /// Raise message-received, as if a script had posted `message`
    pub fn post_message(&self, message: &str) {
        self.signals.emit_message(self, message);
    }

    pub fn handler_count(&self) -> usize {
        self.signals.handler_count()
    }

    fn scripts(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.evaluated.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Surface for MemorySurface {
    fn evaluate_script(&self, script: &str) -> SurfaceResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SurfaceError::Evaluation("surface is failing".to_string()));
        }
        self.scripts().push(script.to_string());

        if script.starts_with(CHANNEL_CHECK_TAG) {
            return Ok(self.channel_customized().to_string());
        }
        if script.starts_with(CHANNEL_INSTALL_TAG) {
            let replaced = !self.channel_customized.swap(true, Ordering::SeqCst);
            return Ok(replaced.to_string());
        }
        Ok("true".to_string())
    }

    fn connect_navigation_completed(&self, handler: NavigationHandler) -> HandlerId {
        self.signals.connect_navigation(handler)
    }

    fn connect_message_received(&self, handler: MessageHandler) -> HandlerId {
        self.signals.connect_message(handler)
    }

    fn disconnect(&self, id: HandlerId) -> bool {
        self.signals.disconnect(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::channel::{installation_check, wrapper_script};
    use crate::config::BridgeConfig;

    #[test]
    fn test_records_scripts() {
        let surface = MemorySurface::new();
        surface.evaluate_script("1 + 1").unwrap();
        surface.evaluate_script("window.x = 2").unwrap();
        assert_eq!(surface.evaluated(), vec!["1 + 1", "window.x = 2"]);
        assert_eq!(surface.evaluated_containing("window").len(), 1);
        surface.clear();
        assert!(surface.evaluated().is_empty());
    }

    #[test]
    fn test_answers_channel_queries() {
        let config = BridgeConfig::default();
        let surface = MemorySurface::new();
        assert_eq!(surface.evaluate_script(&installation_check(&config)).unwrap(), "false");
        assert_eq!(surface.evaluate_script(&wrapper_script(&config)).unwrap(), "true");
        assert_eq!(surface.evaluate_script(&installation_check(&config)).unwrap(), "true");
        assert_eq!(surface.evaluate_script(&wrapper_script(&config)).unwrap(), "false");
    }

    #[test]
    fn test_failing_surface() {
        let surface = MemorySurface::new();
        surface.set_failing(true);
        assert!(matches!(
            surface.evaluate_script("1"),
            Err(SurfaceError::Evaluation(_))
        ));
        assert!(surface.evaluated().is_empty());
    }
}
