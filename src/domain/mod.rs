//! 领域层:模型与仓储抽象

pub mod models;
pub mod repositories;
