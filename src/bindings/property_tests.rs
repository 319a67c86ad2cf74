//! Property tests for the wire codec and coercion
//!
//! Uses proptest over arbitrary channel traffic and integer inputs.

use crate::bindings::capability::{IntWidth, ValueType};
use crate::bindings::coercion::coerce;
use crate::bindings::js_literal;
use crate::bindings::protocol::{decode, encode, is_notification, CallEnvelope, Inbound};
use proptest::prelude::*;
use serde_json::{json, Value};

fn script_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 _\"\\\\-]{0,16}".prop_map(Value::from),
    ]
}

fn width() -> impl Strategy<Value = IntWidth> {
    prop_oneof![
        Just(IntWidth::I8),
        Just(IntWidth::U8),
        Just(IntWidth::I16),
        Just(IntWidth::U16),
        Just(IntWidth::I32),
        Just(IntWidth::U32),
        Just(IntWidth::I64),
        Just(IntWidth::U64),
    ]
}

proptest! {
    #[test]
    fn text_without_discriminator_is_notification(raw in "[^_]{0,64}") {
        // without an underscore the field name cannot occur
        prop_assert!(is_notification(&raw));
        prop_assert_eq!(decode(&raw).unwrap(), Inbound::Notification(raw.clone()));
    }

    #[test]
    fn objects_without_discriminator_are_notifications(
        key in "[a-z]{1,8}",
        value in script_value()
    ) {
        let raw = json!({ key: value, "type": 2, "interop": "{}" }).to_string();
        prop_assert!(is_notification(&raw));
    }

    #[test]
    fn encoded_calls_decode_to_the_same_call(
        source in "[a-zA-Z_][a-zA-Z0-9_]{0,12}",
        target in "[a-zA-Z_][a-zA-Z0-9_]{0,12}",
        parameters in prop::collection::vec(script_value(), 0..4),
        callback_id in "[0-9a-f-]{1,40}"
    ) {
        let envelope = CallEnvelope::invoke_with_return(&source, &target, parameters, &callback_id);
        let raw = encode(&envelope).unwrap();
        prop_assert!(!is_notification(&raw));
        prop_assert_eq!(decode(&raw).unwrap(), Inbound::Call(envelope));
    }

    #[test]
    fn narrowing_respects_width(value in any::<i64>(), width in width()) {
        let result = coerce(Value::from(value), &ValueType::Int(width));
        let in_range = (value as i128) >= width.min() && (value as i128) <= width.max();
        prop_assert_eq!(result.is_ok(), in_range);
    }

    #[test]
    fn decimal_strings_match_numbers(value in any::<u64>()) {
        let from_string = coerce(Value::from(value.to_string()), &ValueType::Int(IntWidth::U64)).unwrap();
        prop_assert_eq!(from_string, Value::from(value));
    }

    #[test]
    fn literals_quote_any_text(text in any::<String>()) {
        let literal = js_literal(&text);
        let parsed: String = serde_json::from_str(&literal).unwrap();
        prop_assert_eq!(parsed, text);
    }
}
