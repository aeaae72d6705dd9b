//! 内容抽取
//!
//! 列表页走链接与翻页抽取,详情页走正文与图片抽取。

pub mod article;
pub mod images;
pub mod links;
pub mod pagination;

use scraper::ElementRef;

/// 元素可见文本,空白归一化为单个空格
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 向上取父元素,跳过文本节点
pub(crate) fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

/// 元素的小写 class 与 id,便于关键字匹配
pub(crate) fn class_and_id(el: ElementRef<'_>) -> (String, String) {
    let class = el.value().attr("class").unwrap_or_default().to_ascii_lowercase();
    let id = el.value().attr("id").unwrap_or_default().to_ascii_lowercase();
    (class, id)
}
