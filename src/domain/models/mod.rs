//! 领域模型

pub mod article;
pub mod image;
pub mod log;
pub mod proxy;
pub mod task;
