//! 复合路径
//!
//! 复合路径由一个磁盘路径和若干层ZIP内部路径组成，字符串形式用 `!/`
//! 连接各段，例如 `book.zip!/inner.zip!/index.html`。

use crate::fs::zip_util::{self, ArchiveReader, ZipSubpath};
use std::fmt;
use std::ops::Index;
use std::path::{Component, Path, PathBuf};

/// 段之间的分隔符
pub const SEPARATOR: &str = "!/";

/// 复合路径
///
/// `segments[0]` 为规范化后的磁盘路径，其后每一段都是上一段所指ZIP文件
/// 内部的POSIX风格子路径。段列表不会为空。
///
/// # 示例
///
/// ```rust
/// use scrapforge::fs::CPath;
///
/// let cpath = CPath::from(["book.zip", "index.html"]);
/// assert_eq!(cpath.to_string(), "book.zip!/index.html");
/// assert_eq!(format!("{:?}", cpath), "CPath('book.zip', 'index.html')");
/// assert_eq!(cpath.file(), "book.zip");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CPath {
    segments: Vec<String>,
}

impl CPath {
    /// 创建只包含磁盘路径的复合路径
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            segments: vec![file.into()],
        }
    }

    /// 由段列表创建复合路径，空列表视为一个空的磁盘路径
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            segments.push(String::new());
        }
        Self { segments }
    }

    /// 解析字符串形式的复合路径
    ///
    /// 只有当 `!/` 之前的部分确实是一个ZIP文件时才会进入归档内部，
    /// 因此普通文件名中的 `!/` 会被保留为字面路径。
    ///
    /// # 参数
    /// * `path` - 字符串形式的路径
    ///
    /// # 返回值
    /// * `CPath` - 解析后的复合路径
    pub fn resolve(path: &str) -> Self {
        Self::resolve_with(path, |p: &str| PathBuf::from(p))
    }

    /// 解析复合路径，存在性检查前先用 `mapper` 把名义路径映射为磁盘路径
    ///
    /// 返回结果中的首段仍是规范化后的名义路径。
    pub fn resolve_with<F>(path: &str, mapper: F) -> Self
    where
        F: Fn(&str) -> PathBuf,
    {
        for marker in marker_positions(path).into_iter().rev() {
            let archive = normalize_path(&path[..marker]);

            let literal = mapper(&format!("{}!", archive));
            if literal.symlink_metadata().is_ok() {
                log::debug!("字面路径优先: {}!", archive);
                break;
            }

            let real = mapper(&archive);
            if !real.is_file() {
                continue;
            }
            if let Ok(mut zh) = zip_util::open_zip(&real) {
                let mut segments = vec![archive];
                segments.extend(resolve_in_archive(&mut zh, &path[marker + SEPARATOR.len()..]));
                log::debug!("解析复合路径: {} -> {:?}", path, segments);
                return Self { segments };
            }
        }

        Self::new(normalize_path(path))
    }

    /// 磁盘路径（首段）
    pub fn file(&self) -> &str {
        &self.segments[0]
    }

    /// 全部段
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// 段列表永远不为空，始终返回 `false`
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.segments.iter()
    }

    /// 是否指向ZIP内部
    pub fn is_archive_path(&self) -> bool {
        self.segments.len() > 1
    }

    /// 最内层的ZIP内部路径
    pub fn subpath(&self) -> Option<&str> {
        if self.is_archive_path() {
            self.segments.last().map(String::as_str)
        } else {
            None
        }
    }

    /// 最内层ZIP文件本身的路径（去掉最后一段）
    pub fn archive(&self) -> Option<CPath> {
        if self.is_archive_path() {
            Some(Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        } else {
            None
        }
    }

    /// 追加一层ZIP内部路径
    pub fn join(&self, subpath: impl Into<String>) -> CPath {
        let mut segments = self.segments.clone();
        segments.push(subpath.into());
        Self { segments }
    }

    /// 替换最后一段
    pub fn with_last(&self, last: impl Into<String>) -> CPath {
        let mut segments = self.segments.clone();
        if let Some(slot) = segments.last_mut() {
            *slot = last.into();
        }
        Self { segments }
    }

    /// 最后一段的文件名
    pub fn name(&self) -> String {
        match self.subpath() {
            Some(sub) => sub
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string(),
            None => Path::new(self.file())
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// 把最后一段替换为在其下追加 `name` 后的路径
    pub fn child(&self, name: &str) -> CPath {
        match self.subpath() {
            Some(sub) => self.with_last(join_subpath(sub, name)),
            None => Self::new(Path::new(self.file()).join(name).to_string_lossy().into_owned()),
        }
    }
}

impl fmt::Display for CPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join(SEPARATOR))
    }
}

impl fmt::Debug for CPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self.segments.iter().map(|s| format!("'{}'", s)).collect();
        write!(f, "CPath({})", quoted.join(", "))
    }
}

impl Index<usize> for CPath {
    type Output = String;

    fn index(&self, index: usize) -> &String {
        &self.segments[index]
    }
}

impl<'a> IntoIterator for &'a CPath {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

impl From<&str> for CPath {
    fn from(file: &str) -> Self {
        Self::new(file)
    }
}

impl From<String> for CPath {
    fn from(file: String) -> Self {
        Self::new(file)
    }
}

impl From<&String> for CPath {
    fn from(file: &String) -> Self {
        Self::new(file.clone())
    }
}

impl From<&Path> for CPath {
    fn from(file: &Path) -> Self {
        Self::new(file.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for CPath {
    fn from(file: PathBuf) -> Self {
        Self::from(file.as_path())
    }
}

impl From<&PathBuf> for CPath {
    fn from(file: &PathBuf) -> Self {
        Self::from(file.as_path())
    }
}

impl From<Vec<String>> for CPath {
    fn from(segments: Vec<String>) -> Self {
        Self::from_segments(segments)
    }
}

impl<const N: usize> From<[&str; N]> for CPath {
    fn from(segments: [&str; N]) -> Self {
        Self::from_segments(segments)
    }
}

impl From<&CPath> for CPath {
    fn from(cpath: &CPath) -> Self {
        cpath.clone()
    }
}

/// 在ZIP内部继续解析剩余部分
fn resolve_in_archive(zh: &mut ArchiveReader, rest: &str) -> Vec<String> {
    for marker in marker_positions(rest).into_iter().rev() {
        let inner = normalize_subpath(&rest[..marker]);

        let literal = format!("{}!", inner);
        if !matches!(
            zip_util::zip_check_subpath(zh, &literal),
            ZipSubpath::None | ZipSubpath::Invalid
        ) {
            log::debug!("ZIP内字面路径优先: {}", literal);
            break;
        }

        if zip_util::zip_check_subpath(zh, &inner) != ZipSubpath::File {
            continue;
        }
        let nested = zip_util::read_entry(zh, &inner).and_then(zip_util::open_zip_bytes);
        if let Ok(mut nested) = nested {
            let mut segments = vec![inner];
            segments.extend(resolve_in_archive(&mut nested, &rest[marker + SEPARATOR.len()..]));
            return segments;
        }
    }

    vec![normalize_subpath(rest)]
}

/// 所有 `!/` 的起始位置
fn marker_positions(s: &str) -> Vec<usize> {
    s.match_indices(SEPARATOR).map(|(i, _)| i).collect()
}

/// 词法规范化磁盘路径：合并分隔符，处理 `.` 与 `..`，去掉末尾分隔符
pub fn normalize_path(path: &str) -> String {
    let mut out = PathBuf::new();
    let mut depth = 0usize;

    for component in Path::new(path).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(name) => {
                out.push(name);
                depth += 1;
            }
        }
    }

    let normalized = out.to_string_lossy().into_owned();
    if normalized.is_empty() {
        ".".to_string()
    } else {
        normalized
    }
}

/// 规范化ZIP内部路径：去掉首尾斜杠、`.` 与空段，`..` 不会越过归档根目录
pub fn normalize_subpath(subpath: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in subpath.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    parts.join("/")
}

/// 连接ZIP内部路径
pub fn join_subpath(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}
