use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MarkupError>;

/// 标记重写相关的错误类型
#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("无效的属性名: {0:?}")]
    InvalidAttributeName(String),
}
