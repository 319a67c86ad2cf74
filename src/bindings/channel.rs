//! Channel wrapper
//!
//! The surface's native send primitive takes a single string. The wrapper
//! replaces the channel object with one whose send method also takes a call
//! kind: kind 0 (or none) forwards the message verbatim, any other kind wraps
//! it in a discriminated bridge frame. The replacement is marked with an
//! `isCustomized` own property so it is installed at most once per page.

use super::js_literal;
use super::protocol::MAGIC_FIELD;
use crate::config::BridgeConfig;

/// Leading tag of the installation query
pub const CHANNEL_CHECK_TAG: &str = "/* interop:channel-check */";
/// Leading tag of the wrapper install script
pub const CHANNEL_INSTALL_TAG: &str = "/* interop:channel-install */";

/// Marker property on the replaced channel object
pub const CUSTOMIZED_MARKER: &str = "isCustomized";

/// Script evaluating to `true` when the wrapper is already in place
pub fn installation_check(config: &BridgeConfig) -> String {
    format!(
        "{tag} (function () {{ var channel = window[{channel}]; \
         return !!channel && Object.prototype.hasOwnProperty.call(channel, {marker}); }})()",
        tag = CHANNEL_CHECK_TAG,
        channel = js_literal(&config.channel_object),
        marker = js_literal(CUSTOMIZED_MARKER),
    )
}

/// Script that installs the wrapper; evaluates to `true` if it replaced
/// the channel, `false` if there was nothing to do
pub fn wrapper_script(config: &BridgeConfig) -> String {
    format!(
        r#"{tag} (function () {{
  var channelObject = {channel};
  var sendMethod = {send};
  var original = window[channelObject];
  if (!original || Object.prototype.hasOwnProperty.call(original, {marker})) {{ return false; }}
  var send = original[sendMethod];
  var custom = {{}};
  Object.keys(original).forEach(function (key) {{
    var member = original[key];
    custom[key] = typeof member === "function" ? member.bind(original) : member;
  }});
  custom[sendMethod] = function (message, kind) {{
    if (kind === undefined || kind === null || kind === 0) {{
      return send.call(original, message);
    }}
    return send.call(original, JSON.stringify({{ {magic}: true, type: kind, interop: message }}));
  }};
  Object.defineProperty(custom, {marker}, {{ value: true, enumerable: false }});
  window[channelObject] = custom;
  return true;
}})()"#,
        tag = CHANNEL_INSTALL_TAG,
        channel = js_literal(&config.channel_object),
        send = js_literal(&config.send_method),
        marker = js_literal(CUSTOMIZED_MARKER),
        magic = js_literal(MAGIC_FIELD),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_is_tagged() {
        let script = installation_check(&BridgeConfig::default());
        assert!(script.starts_with(CHANNEL_CHECK_TAG));
        assert!(script.contains(r#"window["external"]"#));
        assert!(script.contains(r#""isCustomized""#));
    }

    #[test]
    fn test_wrapper_frames_non_zero_kinds() {
        let script = wrapper_script(&BridgeConfig::default());
        assert!(script.starts_with(CHANNEL_INSTALL_TAG));
        assert!(script.contains(r#"var sendMethod = "notify";"#));
        assert!(script.contains(r#"JSON.stringify({ "___magic___": true, type: kind, interop: message })"#));
        assert!(script.contains("kind === 0"));
    }

    #[test]
    fn test_wrapper_follows_config() {
        let mut config = BridgeConfig::default();
        config.channel_object = "host".to_string();
        config.send_method = "post".to_string();
        let script = wrapper_script(&config);
        assert!(script.contains(r#"var channelObject = "host";"#));
        assert!(script.contains(r#"var sendMethod = "post";"#));
        assert!(installation_check(&config).contains(r#"window["host"]"#));
    }
}
