//! 归档感知的文件系统模块
//!
//! 复合路径解析、嵌套ZIP的读写，以及在磁盘与ZIP之间统一的文件操作。

pub mod archive;
pub mod cpath;
pub mod error;
pub mod info;
pub mod ops;
pub mod zip_util;

// 重新导出错误处理
pub use error::{FsError, Result};

// 重新导出复合路径
pub use cpath::{CPath, SEPARATOR, normalize_path, normalize_subpath};

// 重新导出归档读写
pub use archive::{ArchiveEditor, edit_archive_path, open_archive_path, read_archive_entry};

// 重新导出文件操作
pub use ops::{FileOps, copy_entry, delete, mkdir, mkzip, move_entry, save, save_stream};

// 重新导出辅助函数
pub use info::{FileInfo, FileKind, file_info, file_is_link, listdir};
pub use zip_util::{
    ArchiveReader, ZipSubpath, zip_check_subpath, zip_compress, zip_datetime, zip_extract,
    zip_file_info, zip_listdir, zip_timestamp,
};
