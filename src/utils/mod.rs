//! 通用工具模块

pub mod errors;
pub mod headers;
pub mod telemetry;
pub mod url_utils;
