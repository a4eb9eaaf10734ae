//! HTML/XHTML标记处理模块
//!
//! 提供可逆的分词、标签模型以及重新序列化功能。

pub mod entities;
pub mod error;
pub mod markup;
pub mod rewriter;
pub mod tag;

// 重新导出主要类型
pub use entities::unescape;
pub use error::{MarkupError, Result};
pub use markup::{Markup, MarkupContent, MarkupKind};
pub use rewriter::HtmlRewriter;
pub use tag::{Attribute, MarkupTag, TagKind, escape_attr};
