use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

/// 文件操作相关的错误类型
#[derive(Error, Debug)]
pub enum FsError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("条目不存在: {0}")]
    EntryNotFound(String),

    #[error("条目已存在: {0}")]
    EntryExists(String),

    #[error("文件已存在: {0}")]
    FileExists(String),

    #[error("目标是目录: {0}")]
    IsADirectory(String),

    #[error("父路径不是目录: {0}")]
    BadParent(String),

    #[error("文件不是有效的ZIP格式: {0}")]
    BadZipFile(String),

    #[error("不能跨越ZIP边界移动目录: {src} -> {dst}")]
    MoveAcrossZip { src: String, dst: String },

    #[error("不能把目录移动到自身或其子目录中: {src} -> {dst}")]
    MoveIntoSelf { src: String, dst: String },

    #[error("{} 个条目处理失败", .errors.len())]
    Partial { errors: Vec<FsError> },

    #[error("路径不包含ZIP内部路径: {0}")]
    NotArchivePath(String),

    #[error("ZIP中的目录不存在: {0}")]
    ZipDirNotFound(String),

    #[error("配置文件错误: {0}")]
    ConfigError(String),
}

impl FsError {
    /// 是否为条目已存在类错误（`FileExists` 是 `EntryExists` 的特例）
    pub fn is_entry_exists(&self) -> bool {
        matches!(self, FsError::EntryExists(_) | FsError::FileExists(_))
    }
}
