//! Call dispatch and reply settlement
//!
//! Runs one decoded call against its registration and settles the
//! script-side pending entry, if the call owes a reply. Host-side failures
//! never propagate to the surface: they are logged, and by default the
//! pending entry is rejected so the script's promise does not hang.

use super::registry::RegisteredObject;
use crate::bindings::channel::{installation_check, wrapper_script};
use crate::bindings::correlator::{reject_snippet, resolve_snippet, was_pending};
use crate::bindings::protocol::CallEnvelope;
use crate::config::BridgeConfig;
use crate::core::error::{BridgeError, BridgeResult, SurfaceResult};
use crate::surface::Surface;
use serde_json::Value;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Invoke `envelope` on `registration`, containing panics
pub(crate) fn invoke(
    registration: &dyn RegisteredObject,
    envelope: &CallEnvelope,
) -> BridgeResult<Option<Value>> {
    catch_unwind(AssertUnwindSafe(|| registration.call(envelope))).unwrap_or_else(|panic| {
        Err(BridgeError::Invocation {
            member: envelope.target.clone(),
            reason: format!("panicked: {}", panic_message(&*panic)),
        })
    })
}

/// Dispatch a call and settle its reply
pub(crate) fn dispatch(
    surface: &dyn Surface,
    registration: &dyn RegisteredObject,
    envelope: &CallEnvelope,
    config: &BridgeConfig,
) {
    tracing::debug!(
        target: "bridge",
        "{:?} {}.{} ({} parameters)",
        envelope.kind,
        envelope.source,
        envelope.target,
        envelope.parameters.len()
    );
    let outcome = invoke(registration, envelope);
    settle(surface, envelope, outcome, config);
}

/// Deliver `outcome` to the caller's pending entry
pub(crate) fn settle(
    surface: &dyn Surface,
    envelope: &CallEnvelope,
    outcome: BridgeResult<Option<Value>>,
    config: &BridgeConfig,
) {
    let callback_id = match (&envelope.callback_id, envelope.kind.expects_reply()) {
        (Some(id), true) => Some(id.as_str()),
        _ => None,
    };

    let script = match (outcome, callback_id) {
        (Ok(Some(value)), Some(id)) => resolve_snippet(&envelope.source, id, &value),
        (Ok(_), _) => return,
        (Err(error), Some(id)) if config.reject_unresolved => {
            tracing::warn!(
                target: "bridge",
                "Rejecting {}.{}: {}",
                envelope.source,
                envelope.target,
                error
            );
            reject_snippet(&envelope.source, id, &error.to_string())
        }
        (Err(error), _) => {
            tracing::warn!(
                target: "bridge",
                "Call {}.{} failed: {}",
                envelope.source,
                envelope.target,
                error
            );
            return;
        }
    };

    match surface.evaluate_script(&script) {
        Ok(result) if !was_pending(&result) => {
            tracing::debug!(
                target: "bridge",
                "No pending entry for {}.{}, reply dropped",
                envelope.source,
                envelope.target
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(target: "bridge", "Failed to settle {}.{}: {}", envelope.source, envelope.target, e);
        }
    }
}

/// Install the channel wrapper unless the page already has it
pub(crate) fn ensure_channel(surface: &dyn Surface, config: &BridgeConfig) -> SurfaceResult<bool> {
    if surface.evaluate_script(&installation_check(config))? == "true" {
        return Ok(false);
    }
    let installed = surface.evaluate_script(&wrapper_script(config))? == "true";
    if installed {
        tracing::debug!(target: "bridge", "Channel wrapper installed on window.{}", config.channel_object);
    } else {
        tracing::warn!(target: "bridge", "Channel object window.{} is missing", config.channel_object);
    }
    Ok(installed)
}

/// Wrapper check plus stub injection for one registration
pub(crate) fn inject(
    surface: &dyn Surface,
    registration: &dyn RegisteredObject,
    config: &BridgeConfig,
) -> SurfaceResult<()> {
    ensure_channel(surface, config)?;
    surface.evaluate_script(registration.stub_script())?;
    tracing::debug!(target: "bridge", "Injected stub for '{}'", registration.name());
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
