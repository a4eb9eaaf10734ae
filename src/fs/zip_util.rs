//! ZIP辅助函数
//!
//! 子路径检查、条目信息、目录列举、压缩与解压，以及ZIP时间戳与系统时间的转换。
//! ZIP中的目录既可以是以 `/` 结尾的显式条目，也可以只由其下文件的路径前缀隐含。

use crate::fs::cpath::join_subpath;
use crate::fs::error::{FsError, Result};
use crate::fs::info::{FileInfo, FileKind};
use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, TimeZone, Timelike};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::SystemTime;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// ZIP读取源：磁盘文件或内存中的嵌套归档
#[derive(Debug)]
pub enum ArchiveSource {
    File(File),
    Memory(Cursor<Vec<u8>>),
}

impl Read for ArchiveSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ArchiveSource::File(f) => f.read(buf),
            ArchiveSource::Memory(c) => c.read(buf),
        }
    }
}

impl Seek for ArchiveSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ArchiveSource::File(f) => f.seek(pos),
            ArchiveSource::Memory(c) => c.seek(pos),
        }
    }
}

/// 只读打开的ZIP归档
pub type ArchiveReader = ZipArchive<ArchiveSource>;

/// 子路径在ZIP中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZipSubpath {
    /// 归档根目录
    DirRoot,
    /// 文件条目
    File,
    /// 显式目录条目（`name/`）
    Dir,
    /// 仅由其下条目隐含的目录
    DirImplicit,
    /// 不存在
    None,
    /// 某个祖先是文件条目，无法在其下创建任何条目
    Invalid,
}

impl ZipSubpath {
    /// 是否为目录（含根目录与隐含目录）
    pub fn is_dir(self) -> bool {
        matches!(self, ZipSubpath::DirRoot | ZipSubpath::Dir | ZipSubpath::DirImplicit)
    }
}

/// 打开磁盘上的ZIP文件
///
/// # 参数
/// * `path` - ZIP文件路径
///
/// # 返回值
/// * `Result<ArchiveReader>` - 文件不存在时返回 `EntryNotFound`，格式错误时返回 `BadZipFile`
pub fn open_zip<P: AsRef<Path>>(path: P) -> Result<ArchiveReader> {
    let path = path.as_ref();
    let label = path.to_string_lossy();
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
            FsError::EntryNotFound(label.to_string())
        }
        _ => FsError::Io(e),
    })?;
    if !file.metadata()?.is_file() {
        return Err(FsError::BadZipFile(label.to_string()));
    }
    ZipArchive::new(ArchiveSource::File(file)).map_err(|e| bad_zip(e, &label))
}

/// 打开内存中的ZIP数据
pub fn open_zip_bytes(bytes: Vec<u8>) -> Result<ArchiveReader> {
    ZipArchive::new(ArchiveSource::Memory(Cursor::new(bytes))).map_err(|e| bad_zip(e, "<memory>"))
}

pub(crate) fn bad_zip(err: zip::result::ZipError, label: &str) -> FsError {
    match err {
        zip::result::ZipError::Io(e) if e.kind() != io::ErrorKind::UnexpectedEof => FsError::Io(e),
        other => {
            log::debug!("无效的ZIP文件 {}: {}", label, other);
            FsError::BadZipFile(label.to_string())
        }
    }
}

/// 读取条目的全部数据
pub fn read_entry<R: Read + Seek>(zh: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut file = match zh.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(FsError::EntryNotFound(name.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let mut data = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// 检查子路径在ZIP中的状态
///
/// # 参数
/// * `zh` - 已打开的ZIP归档
/// * `subpath` - ZIP内部路径，末尾的 `/` 会被忽略
///
/// # 返回值
/// * `ZipSubpath` - 子路径状态
pub fn zip_check_subpath<R: Read + Seek>(zh: &ZipArchive<R>, subpath: &str) -> ZipSubpath {
    let subpath = subpath.trim_end_matches('/');
    if subpath.is_empty() {
        return ZipSubpath::DirRoot;
    }

    let names: HashSet<&str> = zh.file_names().collect();

    if subpath
        .match_indices('/')
        .any(|(i, _)| names.contains(&subpath[..i]))
    {
        return ZipSubpath::Invalid;
    }

    if names.contains(subpath) {
        return ZipSubpath::File;
    }

    let dir = format!("{}/", subpath);
    if names.contains(dir.as_str()) {
        return ZipSubpath::Dir;
    }
    if names.iter().any(|n| n.starts_with(&dir)) {
        return ZipSubpath::DirImplicit;
    }
    ZipSubpath::None
}

/// 获取ZIP条目的信息
///
/// # 参数
/// * `zh` - 已打开的ZIP归档
/// * `subpath` - ZIP内部路径
/// * `check_implicit_dir` - 是否把根目录与隐含目录视为目录
///
/// # 返回值
/// * `Result<FileInfo>` - 不存在时 `kind` 为 `None`
pub fn zip_file_info<R: Read + Seek>(
    zh: &mut ZipArchive<R>,
    subpath: &str,
    check_implicit_dir: bool,
) -> Result<FileInfo> {
    let subpath = subpath.trim_end_matches('/');
    let name = subpath.rsplit('/').next().unwrap_or_default().to_string();

    if !subpath.is_empty() {
        for (candidate, kind) in [
            (subpath.to_string(), FileKind::File),
            (format!("{}/", subpath), FileKind::Dir),
        ] {
            match zh.by_name(&candidate) {
                Ok(file) => {
                    let size = (kind == FileKind::File).then(|| file.size());
                    let mtime = file.last_modified().and_then(zip_timestamp);
                    return Ok(FileInfo {
                        name,
                        kind: Some(kind),
                        size,
                        mtime,
                    });
                }
                Err(zip::result::ZipError::FileNotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    if check_implicit_dir && zip_check_subpath(zh, subpath).is_dir() {
        return Ok(FileInfo {
            name,
            kind: Some(FileKind::Dir),
            size: None,
            mtime: None,
        });
    }

    Ok(FileInfo::missing(name))
}

/// 列出ZIP目录下的条目
///
/// # 参数
/// * `zh` - 已打开的ZIP归档
/// * `subpath` - ZIP内部目录路径，`""` 或 `/` 表示根目录
/// * `recursive` - 是否递归列出，递归时名称为相对路径
///
/// # 返回值
/// * `Result<Vec<FileInfo>>` - 目录不存在或是文件时返回 `ZipDirNotFound`
pub fn zip_listdir<R: Read + Seek>(
    zh: &mut ZipArchive<R>,
    subpath: &str,
    recursive: bool,
) -> Result<Vec<FileInfo>> {
    let base = subpath.trim_matches('/');
    if !zip_check_subpath(zh, base).is_dir() {
        return Err(FsError::ZipDirNotFound(subpath.to_string()));
    }
    let prefix = if base.is_empty() {
        String::new()
    } else {
        format!("{}/", base)
    };

    let mut entries: BTreeMap<String, FileInfo> = BTreeMap::new();
    for i in 0..zh.len() {
        let file = zh.by_index_raw(i)?;
        let Some(rel) = file.name().strip_prefix(prefix.as_str()) else {
            continue;
        };
        let is_dir = rel.ends_with('/');
        let rel = rel.trim_end_matches('/');
        if rel.is_empty() {
            continue;
        }

        let parts: Vec<&str> = rel.split('/').collect();
        let implied = if recursive {
            parts.len() - 1
        } else {
            (parts.len() - 1).min(1)
        };
        for k in 1..=implied {
            let dir = parts[..k].join("/");
            entries
                .entry(dir.clone())
                .or_insert_with(|| FileInfo::implicit_dir(dir));
        }

        if recursive || parts.len() == 1 {
            let kind = if is_dir { FileKind::Dir } else { FileKind::File };
            entries.insert(
                rel.to_string(),
                FileInfo {
                    name: rel.to_string(),
                    kind: Some(kind),
                    size: (!is_dir).then(|| file.size()),
                    mtime: file.last_modified().and_then(zip_timestamp),
                },
            );
        }
    }

    Ok(entries.into_values().collect())
}

/// 把ZIP时间（本地时间）转换为系统时间
pub fn zip_timestamp(dt: zip::DateTime) -> Option<SystemTime> {
    let naive = naive_from_zip(dt)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(SystemTime::from)
}

/// 把ZIP时间按指定的UTC偏移（秒）转换为系统时间
pub fn zip_timestamp_with_offset(dt: zip::DateTime, offset_secs: i32) -> Option<SystemTime> {
    let naive = naive_from_zip(dt)?;
    FixedOffset::east_opt(offset_secs)?
        .from_local_datetime(&naive)
        .single()
        .map(SystemTime::from)
}

/// 把系统时间转换为ZIP时间（本地时间），超出ZIP可表示范围时返回 `None`
pub fn zip_datetime(time: SystemTime) -> Option<zip::DateTime> {
    let local = DateTime::<Local>::from(time);
    let year = u16::try_from(local.year()).ok()?;
    zip::DateTime::from_date_and_time(
        year,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .ok()
}

/// 当前时间对应的ZIP时间
pub fn zip_datetime_now() -> zip::DateTime {
    zip_datetime(SystemTime::now()).unwrap_or_default()
}

fn naive_from_zip(dt: zip::DateTime) -> Option<chrono::NaiveDateTime> {
    NaiveDate::from_ymd_opt(dt.year().into(), dt.month().into(), dt.day().into())?.and_hms_opt(
        dt.hour().into(),
        dt.minute().into(),
        dt.second().into(),
    )
}

/// 写入条目时使用的选项
pub fn entry_options(method: CompressionMethod, mtime: Option<zip::DateTime>) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(mtime.unwrap_or_else(zip_datetime_now))
}

/// 把磁盘上的文件或目录写入ZIP
///
/// 目录递归写入，子条目保留修改时间；`filter` 限定目录下参与写入的顶层名称。
/// 符号链接按其指向的内容写入。
pub(crate) fn write_disk_tree<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    src: &Path,
    subpath: &str,
    filter: Option<&[&str]>,
    method: CompressionMethod,
) -> Result<()> {
    let meta = fs::metadata(src)?;
    let mtime = meta.modified().ok().and_then(zip_datetime);

    if meta.is_dir() {
        if !subpath.is_empty() {
            writer.add_directory(format!("{}/", subpath), entry_options(method, mtime))?;
        }
        let mut children: Vec<_> = fs::read_dir(src)?.collect::<io::Result<Vec<_>>>()?;
        children.sort_by_key(|e| e.file_name());
        for child in children {
            let name = child.file_name().to_string_lossy().into_owned();
            if let Some(allowed) = filter {
                if !allowed.contains(&name.as_str()) {
                    continue;
                }
            }
            write_disk_tree(writer, &child.path(), &join_subpath(subpath, &name), None, method)?;
        }
    } else {
        writer.start_file(subpath, entry_options(method, mtime))?;
        let mut file = File::open(src)?;
        io::copy(&mut file, writer)?;
    }
    Ok(())
}

/// 把磁盘上的文件或目录压缩为新的ZIP文件
///
/// # 参数
/// * `zip_path` - 生成的ZIP文件路径（已存在时覆盖）
/// * `src` - 源文件或目录
/// * `subpath` - 源在ZIP中的路径，目录可用 `""` 表示放在根目录
/// * `filter` - 源为目录时，只写入这些顶层名称
pub fn zip_compress<P: AsRef<Path>, Q: AsRef<Path>>(
    zip_path: P,
    src: Q,
    subpath: &str,
    filter: Option<&[&str]>,
) -> Result<()> {
    let file = File::create(zip_path.as_ref())?;
    let mut writer = ZipWriter::new(file);
    write_disk_tree(
        &mut writer,
        src.as_ref(),
        subpath.trim_matches('/'),
        filter,
        CompressionMethod::Deflated,
    )?;
    writer.finish()?;
    Ok(())
}

/// 把ZIP中的条目或目录解压到磁盘
///
/// # 参数
/// * `zip_path` - ZIP文件路径
/// * `dst` - 目标路径，必须尚不存在
/// * `subpath` - 要解压的ZIP内部路径，`""` 表示整个归档
/// * `tzoffset` - ZIP时间所在时区的UTC偏移（秒），`None` 表示本地时间
pub fn zip_extract<P: AsRef<Path>, Q: AsRef<Path>>(
    zip_path: P,
    dst: Q,
    subpath: &str,
    tzoffset: Option<i32>,
) -> Result<()> {
    let dst = dst.as_ref();
    if dst.symlink_metadata().is_ok() {
        return Err(FsError::FileExists(dst.to_string_lossy().into_owned()));
    }

    let mut zh = open_zip(zip_path)?;
    extract_entries(&mut zh, subpath, dst, tzoffset)
}

/// 把ZIP内的子树解压到 `dst`，设置修改时间
pub(crate) fn extract_entries<R: Read + Seek>(
    zh: &mut ZipArchive<R>,
    subpath: &str,
    dst: &Path,
    tzoffset: Option<i32>,
) -> Result<()> {
    let base = subpath.trim_matches('/');
    let to_time = |dt: zip::DateTime| match tzoffset {
        Some(offset) => zip_timestamp_with_offset(dt, offset),
        None => zip_timestamp(dt),
    };

    match zip_check_subpath(zh, base) {
        ZipSubpath::File => {
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = zh.by_name(base)?;
            let mtime = file.last_modified().and_then(to_time);
            let mut out = File::create(dst)?;
            io::copy(&mut file, &mut out)?;
            if let Some(mtime) = mtime {
                out.set_modified(mtime)?;
            }
            return Ok(());
        }
        ZipSubpath::None | ZipSubpath::Invalid => {
            return Err(FsError::EntryNotFound(subpath.to_string()));
        }
        _ => {}
    }

    let prefix = if base.is_empty() {
        String::new()
    } else {
        format!("{}/", base)
    };
    fs::create_dir_all(dst)?;

    // 目录的修改时间在其内容写入之后设置
    let mut dir_times = Vec::new();
    for i in 0..zh.len() {
        let mut file = zh.by_index(i)?;
        let name = file.name().to_string();
        let Some(rel) = name.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let mtime = file.last_modified().and_then(to_time);
        let is_dir = rel.ends_with('/') || rel.is_empty();
        let target = rel
            .trim_end_matches('/')
            .split('/')
            .filter(|p| !p.is_empty() && *p != "." && *p != "..")
            .fold(dst.to_path_buf(), |acc, p| acc.join(p));

        if is_dir {
            fs::create_dir_all(&target)?;
            if let Some(mtime) = mtime {
                dir_times.push((target, mtime));
            }
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut file, &mut out)?;
        if let Some(mtime) = mtime {
            out.set_modified(mtime)?;
        }
    }

    for (dir, mtime) in dir_times.into_iter().rev() {
        File::open(&dir)?.set_modified(mtime)?;
    }
    Ok(())
}
