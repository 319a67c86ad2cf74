//! Settle pending script-side calls
//!
//! A call that owes a reply leaves an entry in `window[name].__callbacks`
//! under its callback id. The host settles it by evaluating one of these
//! snippets. Each snippet removes the entry before settling it, so an id is
//! settled at most once, and evaluates to whether an entry was found.

use super::js_literal;
use serde_json::Value;

/// Snippet fulfilling the pending entry with `value`
pub fn resolve_snippet(name: &str, callback_id: &str, value: &Value) -> String {
    settle_snippet(name, callback_id, "resolve", &value.to_string())
}

/// Snippet rejecting the pending entry with an `Error(message)`
pub fn reject_snippet(name: &str, callback_id: &str, message: &str) -> String {
    let error = format!("new Error({})", js_literal(message));
    settle_snippet(name, callback_id, "reject", &error)
}

/// Interpret the evaluation result of a settle snippet
pub fn was_pending(evaluation: &str) -> bool {
    evaluation == "true"
}

fn settle_snippet(name: &str, callback_id: &str, action: &str, argument: &str) -> String {
    format!(
        "(function () {{ \
         var target = window[{name}]; \
         var callbacks = target && target.__callbacks; \
         var id = {id}; \
         var pending = callbacks && callbacks[id]; \
         if (!pending) {{ return false; }} \
         delete callbacks[id]; \
         pending.{action}({argument}); \
         return true; \
         }})()",
        name = js_literal(name),
        id = js_literal(callback_id),
        action = action,
        argument = argument,
    )
}
