//! Script stub generation
//!
//! For each registration the host injects a script that installs a global
//! object of the registration's name. Every member of the capability table
//! becomes a function or accessor that posts a call through the channel.
//! Calls that owe a reply return a promise whose pending entry lives in the
//! stub's own `__callbacks` map until the host settles it. Injecting again
//! into a page that already has the stub keeps that map, so calls in flight
//! still settle.

use super::capability::{MemberKind, MemberSchema};
use super::js_literal;
use super::protocol::CallKind;
use crate::config::BridgeConfig;

/// Build the stub script for one registration
pub fn generate_stub(name: &str, schema: &[MemberSchema], config: &BridgeConfig) -> String {
    let mut script = String::with_capacity(2048 + schema.len() * 160);
    script.push_str("(function () {\n");
    script.push_str(&format!("  var name = {};\n", js_literal(name)));
    script.push_str(&format!(
        "  var channelObject = {};\n  var sendMethod = {};\n",
        js_literal(&config.channel_object),
        js_literal(&config.send_method)
    ));
    script.push_str(PRELUDE);
    script.push_str(&send_function(config.call_timeout_ms));

    for member in schema {
        let key = js_literal(&member.name);
        match member.kind {
            MemberKind::Method { arity, returns } => {
                script.push_str(&method(&key, arity, returns));
            }
            MemberKind::Property { readable, writable } => {
                script.push_str(&property(&key, readable, writable));
            }
        }
    }

    script.push_str("  window[name] = stub;\n  return true;\n})()");
    script
}

/// Script that removes a registration's global object
pub fn removal_script(name: &str) -> String {
    format!("(function () {{ return delete window[{}]; }})()", js_literal(name))
}

const PRELUDE: &str = r#"  var stub = {};
  var sequence = 0;
  function hidden(key, value) {
    Object.defineProperty(stub, key, { value: value, enumerable: false, configurable: true, writable: false });
  }
  // pending calls survive re-injection into the same page
  var previous = window[name];
  hidden("__callbacks", (previous && previous.__callbacks) || {});
  hidden("__newCallbackId", function () {
    var bytes = [];
    var i;
    if (typeof crypto !== "undefined" && crypto && typeof crypto.getRandomValues === "function") {
      var random = new Uint8Array(16);
      crypto.getRandomValues(random);
      for (i = 0; i < 16; i++) { bytes.push(random[i]); }
    } else {
      for (i = 0; i < 16; i++) { bytes.push(Math.floor(Math.random() * 256)); }
    }
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    var hex = "";
    for (i = 0; i < 16; i++) {
      hex += (bytes[i] + 0x100).toString(16).substr(1);
      if (i === 3 || i === 5 || i === 7 || i === 9) { hex += "-"; }
    }
    sequence += 1;
    return sequence.toString(16) + "-" + hex;
  });
"#;

fn send_function(call_timeout_ms: Option<u64>) -> String {
    let timeout = match call_timeout_ms {
        Some(ms) => format!(
            r#"      if (typeof setTimeout === "function") {{
        setTimeout(function () {{
          var expired = stub.__callbacks[callbackId];
          if (expired) {{
            delete stub.__callbacks[callbackId];
            expired.reject(new Error("Call to " + name + "." + target + " timed out after {ms} ms"));
          }}
        }}, {ms});
      }}
"#,
            ms = ms
        ),
        None => String::new(),
    };

    format!(
        r#"  hidden("__send", function (target, kind, parameters, expectsReply) {{
    var envelope = {{ source: name, target: target, parameters: parameters }};
    var channel = window[channelObject];
    if (!expectsReply) {{
      channel[sendMethod](JSON.stringify(envelope), kind);
      return undefined;
    }}
    var callbackId = stub.__newCallbackId();
    envelope.callbackId = callbackId;
    return new Promise(function (resolve, reject) {{
      stub.__callbacks[callbackId] = {{ resolve: resolve, reject: reject }};
{timeout}      try {{
        channel[sendMethod](JSON.stringify(envelope), kind);
      }} catch (error) {{
        delete stub.__callbacks[callbackId];
        reject(error);
      }}
    }});
  }});
"#,
        timeout = timeout
    )
}

fn method(key: &str, arity: usize, returns: bool) -> String {
    let parameters: Vec<String> = (0..arity).map(|i| format!("$p{}", i)).collect();
    let parameters = parameters.join(", ");
    let (kind, body) = if returns {
        (CallKind::InvokeWithReturn, "return ")
    } else {
        (CallKind::InvokeVoid, "")
    };
    format!(
        "  stub[{key}] = function ({params}) {{ {body}stub.__send({key}, {kind}, [{params}], {returns}); }};\n",
        key = key,
        params = parameters,
        body = body,
        kind = u8::from(kind),
        returns = returns
    )
}

fn property(key: &str, readable: bool, writable: bool) -> String {
    let mut accessors = Vec::new();
    if readable {
        accessors.push(format!(
            "get: function () {{ return stub.__send({}, {}, [], true); }}",
            key,
            u8::from(CallKind::ReadProperty)
        ));
    }
    if writable {
        accessors.push(format!(
            "set: function ($value) {{ stub.__send({}, {}, [$value], false); }}",
            key,
            u8::from(CallKind::WriteProperty)
        ));
    }
    format!(
        "  Object.defineProperty(stub, {}, {{ {}, enumerable: true, configurable: true }});\n",
        key,
        accessors.join(", ")
    )
}
