//! 统一错误处理模块
//!
//! 提供桥接范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **宿主层错误** (`SurfaceError`): 嵌入式脚本运行时的错误
//! - **转换层错误** (`CoercionError`): 解码后的值无法转换为参数类型
//! - **桥接层错误** (`BridgeError`): 注册与分发错误
//!
//! `BridgeError` 通过 `#[from]` 包装下层错误，`?` 可跨层使用。

use crate::bindings::protocol::CallKind;
use thiserror::Error;

/// 桥接核心错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Invalid registration name: {0:?}")]
    InvalidName(String),

    #[error("Object with the name '{0}' is already exposed")]
    DuplicateName(String),

    #[error("No object exposed under the name '{0}'")]
    UnknownName(String),

    #[error("'{name}' has no member '{member}' for {kind:?}")]
    UnknownMember {
        name: String,
        member: String,
        kind: CallKind,
    },

    #[error("Malformed bridge message: {0}")]
    Decode(String),

    #[error("Argument coercion failed: {0}")]
    Coercion(#[from] CoercionError),

    #[error("Invocation of '{member}' failed: {reason}")]
    Invocation { member: String, reason: String },

    #[error("Invalid capability schema: {0}")]
    InvalidSchema(String),

    #[error("Failed to serialize value: {0}")]
    Serialization(String),

    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
}

/// 弱类型值到强类型参数的转换错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    #[error("value {value} is out of range for {target}")]
    OutOfRange { value: String, target: String },

    #[error("'{0}' is not a valid integer")]
    InvalidNumber(String),

    #[error("'{0}' is not a valid UUID")]
    InvalidUuid(String),

    #[error("ordinal {ordinal} is not a member of {name}")]
    UnknownOrdinal { name: String, ordinal: String },

    #[error("expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },
}

/// 嵌入式宿主错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Script runtime error: {0}")]
    Runtime(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
pub type CoercionResult<T> = Result<T, CoercionError>;
pub type SurfaceResult<T> = Result<T, SurfaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let coercion = CoercionError::InvalidUuid("nope".to_string());
        let bridge: BridgeError = coercion.into();
        assert!(matches!(bridge, BridgeError::Coercion(_)));

        let surface = SurfaceError::Evaluation("boom".to_string());
        let bridge: BridgeError = surface.into();
        assert!(matches!(bridge, BridgeError::Surface(SurfaceError::Evaluation(_))));
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::DuplicateName("wtjs".to_string());
        assert_eq!(
            err.to_string(),
            "Object with the name 'wtjs' is already exposed"
        );

        let err = BridgeError::UnknownMember {
            name: "wtjs".to_string(),
            member: "setTitle".to_string(),
            kind: CallKind::InvokeWithReturn,
        };
        assert!(err.to_string().contains("setTitle"));
        assert!(err.to_string().contains("InvokeWithReturn"));
    }
}
