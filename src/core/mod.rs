//! 核心模块
//!
//! 包含桥接的基础设施：
//! - `error` - 错误类型定义
//! - `logging` - tracing 订阅器初始化
//! - `macros` - 通用宏

pub mod error;
pub mod logging;
#[macro_use]
pub mod macros;

pub use error::{
    BridgeError, BridgeResult, CoercionError, CoercionResult, SurfaceError, SurfaceResult,
};
pub use logging::init_logging;
