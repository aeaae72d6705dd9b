//! 集成测试入口

mod helpers;

mod crawl_flow;
mod lifecycle;
