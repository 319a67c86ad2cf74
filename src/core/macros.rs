//! 核心宏定义
//!
//! 提供统一的宏来减少代码重复

/// 为结构体实现Default trait的宏
///
/// 使用示例:
/// ```rust
/// # use webview_interop::impl_default;
/// struct MyStruct {
///     field1: u32,
///     field2: String,
/// }
///
/// impl_default!(MyStruct {
///     field1: 0,
///     field2: String::new(),
/// });
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}

/// 为无字段枚举实现 `BridgeType` 的宏
///
/// 脚本可以传入成员名或序号。枚举必须能从成员名反序列化（单元变体的
/// serde 默认行为），成员须按声明顺序列出。
///
/// 使用示例:
/// ```rust
/// # use webview_interop::impl_bridge_enum;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// enum Weekday {
///     Monday,
///     Tuesday,
/// }
///
/// impl_bridge_enum!(Weekday { Monday, Tuesday });
/// ```
#[macro_export]
macro_rules! impl_bridge_enum {
    ($enum_name:ident { $($member:ident),+ $(,)? }) => {
        impl $crate::bindings::capability::BridgeType for $enum_name {
            fn value_type() -> $crate::bindings::capability::ValueType {
                $crate::bindings::capability::ValueType::Enumeration {
                    name: stringify!($enum_name),
                    members: &[$(stringify!($member)),+],
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::bindings::capability::{BridgeType, ValueType};
    use serde::{Deserialize, Serialize};

    struct TestStruct {
        field1: u32,
        field2: String,
    }

    impl_default!(TestStruct {
        field1: 7,
        field2: String::new(),
    });

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    enum Color {
        Red,
        Green,
    }

    impl_bridge_enum!(Color { Red, Green });

    #[test]
    fn test_impl_default() {
        let s = TestStruct::default();
        assert_eq!(s.field1, 7);
        assert_eq!(s.field2, "");
    }

    #[test]
    fn test_impl_bridge_enum() {
        match Color::value_type() {
            ValueType::Enumeration { name, members } => {
                assert_eq!(name, "Color");
                assert_eq!(members, &["Red", "Green"]);
            }
            other => panic!("Expected Enumeration, got {:?}", other),
        }
    }
}
