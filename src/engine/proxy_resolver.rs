//! 代理决策
//!
//! 三级精确回退:任务列表 -> 全局代理池 -> 直连。
//! 全局池查询失败按直连处理并告警,不中断任务。

use std::sync::Arc;

use tracing::warn;

use crate::domain::models::proxy::{EffectiveProxies, ProxySource};
use crate::domain::models::task::CrawlTask;
use crate::domain::repositories::ProxyRepository;

pub struct ProxyResolver {
    proxies: Arc<dyn ProxyRepository>,
}

impl ProxyResolver {
    pub fn new(proxies: Arc<dyn ProxyRepository>) -> Self {
        Self { proxies }
    }

    pub async fn resolve(&self, task: &CrawlTask) -> EffectiveProxies {
        if !task.use_proxy {
            return EffectiveProxies::none();
        }
        if !task.proxy_list.is_empty() {
            return EffectiveProxies {
                source: ProxySource::Task,
                proxies: task.proxy_list.clone(),
            };
        }
        match self.proxies.list_enabled().await {
            Ok(list) => EffectiveProxies { source: ProxySource::Global, proxies: list },
            Err(err) => {
                warn!(task_id = %task.id, error = %err, "global proxy lookup failed, going direct");
                EffectiveProxies::none()
            }
        }
    }
}
