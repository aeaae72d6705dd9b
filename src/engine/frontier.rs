//! URL 边界队列
//!
//! FIFO 队列加已访问集合,入队即登记归一化 URL,保证同一 URL
//! 在一次运行内只被处理一次。范围与总量校验都在入队时完成,
//! 深度过滤放在出队侧,入队深度超限的条目只占计数不被调度。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashSet;
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::models::task::CrawlScope;
use crate::utils::url_utils::{base_url, normalize_url};

/// 队列中的一项:URL 与发现深度
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
}

pub struct Frontier {
    queue: Mutex<VecDeque<FrontierEntry>>,
    visited: DashSet<String>,
    total: AtomicU32,
    scope: CrawlScope,
    base: String,
    max_depth: u32,
    cap: u32,
}

impl Frontier {
    /// `base` 取第一个起始 URL 的站点基址,SITE 范围据此过滤
    pub fn new(scope: CrawlScope, base: String, max_depth: u32, cap: u32) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            visited: DashSet::new(),
            total: AtomicU32::new(0),
            scope,
            base,
            max_depth,
            cap,
        }
    }

    /// 种子入队,深度 0,跳过范围校验。返回实际入队数量。
    pub fn seed(&self, urls: &[String]) -> u32 {
        let mut added = 0;
        for url in urls {
            let normalized = normalize_url(url);
            if normalized.is_empty() || !self.visited.insert(normalized.clone()) {
                continue;
            }
            self.queue.lock().push_back(FrontierEntry { url: normalized, depth: 0 });
            self.total.fetch_add(1, Ordering::SeqCst);
            added += 1;
        }
        added
    }

    /// 入队一个发现的链接。归一化后做访问/范围/总量三重校验,
    /// 任何一项不满足都原子地拒绝。
    pub fn enqueue(&self, url: &str, depth: u32) -> bool {
        let normalized = normalize_url(url);
        if normalized.is_empty() {
            return false;
        }
        if !self.in_scope(&normalized) {
            return false;
        }
        if self.total.load(Ordering::SeqCst) >= self.cap {
            debug!(url = %normalized, "frontier cap reached, dropping url");
            return false;
        }
        if !self.visited.insert(normalized.clone()) {
            return false;
        }
        self.queue.lock().push_back(FrontierEntry { url: normalized, depth });
        self.total.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// 取出下一个可处理条目,跳过深度超限的条目
    pub fn claim(&self) -> Option<FrontierEntry> {
        let mut queue = self.queue.lock();
        while let Some(entry) = queue.pop_front() {
            if entry.depth > self.max_depth {
                debug!(url = %entry.url, depth = entry.depth, "skipping entry beyond max depth");
                continue;
            }
            return Some(entry);
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn total_urls(&self) -> u32 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn at_capacity(&self) -> bool {
        self.total.load(Ordering::SeqCst) >= self.cap
    }

    pub fn in_scope(&self, url: &str) -> bool {
        match self.scope {
            CrawlScope::All => true,
            CrawlScope::Site => base_url(url) == self.base,
        }
    }
}
