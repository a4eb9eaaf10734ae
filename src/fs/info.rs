//! 磁盘条目信息

use crate::fs::error::Result;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    File,
    Dir,
    /// 符号链接（不跟随）
    Link,
}

/// 条目信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// 条目名称，递归列举时为相对路径
    pub name: String,
    /// 条目类型，不存在时为 `None`
    pub kind: Option<FileKind>,
    /// 文件大小，只对普通文件有值
    pub size: Option<u64>,
    /// 修改时间
    pub mtime: Option<SystemTime>,
}

impl FileInfo {
    /// 不存在的条目
    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            size: None,
            mtime: None,
        }
    }

    /// 没有自身记录的隐含目录
    pub fn implicit_dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Some(FileKind::Dir),
            size: None,
            mtime: None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == Some(FileKind::File)
    }

    pub fn is_dir(&self) -> bool {
        self.kind == Some(FileKind::Dir)
    }
}

/// 是否为符号链接，不存在时返回 `false`
pub fn file_is_link<P: AsRef<Path>>(path: P) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// 获取磁盘条目的信息，符号链接本身作为 `Link` 返回
pub fn file_info<P: AsRef<Path>>(path: P) -> Result<FileInfo> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            return Ok(FileInfo::missing(name));
        }
        Err(e) => return Err(e.into()),
    };

    let file_type = meta.file_type();
    let (kind, size) = if file_type.is_symlink() {
        (FileKind::Link, None)
    } else if file_type.is_dir() {
        (FileKind::Dir, None)
    } else {
        (FileKind::File, Some(meta.len()))
    };

    Ok(FileInfo {
        name,
        kind: Some(kind),
        size,
        mtime: meta.modified().ok(),
    })
}

/// 列出磁盘目录下的条目
///
/// # 参数
/// * `path` - 目录路径
/// * `recursive` - 是否递归列出，递归时名称为以 `/` 分隔的相对路径
pub fn listdir<P: AsRef<Path>>(path: P, recursive: bool) -> Result<Vec<FileInfo>> {
    let mut entries = Vec::new();
    collect_dir(path.as_ref(), "", recursive, &mut entries)?;
    Ok(entries)
}

fn collect_dir(dir: &Path, prefix: &str, recursive: bool, out: &mut Vec<FileInfo>) -> Result<()> {
    let mut children: Vec<_> = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    children.sort_by_key(|e| e.file_name());

    for child in children {
        let mut info = file_info(child.path())?;
        if !prefix.is_empty() {
            info.name = format!("{}/{}", prefix, info.name);
        }
        let descend = recursive && info.is_dir();
        let name = info.name.clone();
        out.push(info);
        if descend {
            collect_dir(&child.path(), &name, recursive, out)?;
        }
    }
    Ok(())
}
