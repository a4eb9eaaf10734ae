pub mod config;
pub mod fs;
pub mod html;

// === 核心API重新导出 ===

/// HTML/XHTML分词与重新序列化（主要接口）
pub use html::HtmlRewriter;

/// 复合路径（主要接口）
pub use fs::CPath;

/// 错误处理
pub use fs::FsError;
pub use html::MarkupError;

// === 数据结构 ===

/// 标记与标签
pub use html::{Attribute, Markup, MarkupContent, MarkupKind, MarkupTag, TagKind};

/// 条目信息
pub use fs::{FileInfo, FileKind, ZipSubpath};

/// 归档写入配置
pub use config::{ArchiveConfig, Compression};

// === 文件操作 ===

pub use fs::{
    FileOps, copy_entry, delete, edit_archive_path, mkdir, mkzip, move_entry, open_archive_path,
    save, save_stream,
};

// === 库信息 ===

/// ScrapForge库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ScrapForge库的描述
pub const DESCRIPTION: &str = "网页剪藏数据的HTML重写与ZIP嵌套路径文件操作库";

// === 便捷函数 ===

/// 快速分词HTML文本
///
/// 这是 `HtmlRewriter::new(false).loads` 的便捷包装函数。
///
/// # 示例
///
/// ```rust
/// let markups = scrapforge::tokenize("<p>Hello</p>");
/// assert_eq!(markups.len(), 3);
/// ```
pub fn tokenize(text: &str) -> Vec<Markup> {
    HtmlRewriter::new(false).loads(text)
}

/// 快速解析字符串形式的复合路径
///
/// 这是 `CPath::resolve` 的便捷包装函数。
///
/// # 示例
///
/// ```rust
/// let cpath = scrapforge::resolve("/nonexist/book.zip!/index.html");
/// assert_eq!(cpath.len(), 1);
/// ```
pub fn resolve(path: &str) -> CPath {
    CPath::resolve(path)
}
