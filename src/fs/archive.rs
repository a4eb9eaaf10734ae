//! 嵌套ZIP归档的读取与改写
//!
//! 读取时逐层把内层归档载入内存；改写时从最内层开始重建，
//! 再逐层把新数据替换回外层条目，最后原子地替换磁盘上的外层文件。

use crate::fs::cpath::CPath;
use crate::fs::error::{FsError, Result};
use crate::fs::zip_util::{
    self, ArchiveReader, entry_options, open_zip, open_zip_bytes, read_entry, zip_datetime_now,
};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// ZIP写入目标：外层写入同目录下的临时文件，内层写入内存
#[derive(Debug)]
pub enum ArchiveSink {
    File(NamedTempFile),
    Memory(Cursor<Vec<u8>>),
}

impl ArchiveSink {
    fn create(target: &Path, on_disk: bool) -> Result<Self> {
        if !on_disk {
            return Ok(ArchiveSink::Memory(Cursor::new(Vec::new())));
        }
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(ArchiveSink::File(NamedTempFile::new_in(dir)?))
    }

    /// 取出写入的全部数据
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            ArchiveSink::Memory(cursor) => Ok(cursor.into_inner()),
            ArchiveSink::File(tmp) => Ok(fs::read(tmp.path())?),
        }
    }

    /// 用写入的数据替换 `target`，保留原文件的权限
    fn commit(self, target: &Path) -> Result<()> {
        match self {
            ArchiveSink::Memory(cursor) => {
                fs::write(target, cursor.into_inner())?;
            }
            ArchiveSink::File(mut tmp) => {
                tmp.flush()?;
                if let Ok(meta) = fs::metadata(target) {
                    fs::set_permissions(tmp.path(), meta.permissions())?;
                }
                tmp.persist(target).map_err(|e| FsError::Io(e.error))?;
            }
        }
        Ok(())
    }
}

impl Write for ArchiveSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ArchiveSink::File(f) => f.write(buf),
            ArchiveSink::Memory(c) => c.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ArchiveSink::File(f) => f.flush(),
            ArchiveSink::Memory(c) => c.flush(),
        }
    }
}

impl Seek for ArchiveSink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ArchiveSink::File(f) => f.seek(pos),
            ArchiveSink::Memory(c) => c.seek(pos),
        }
    }
}

/// 打开复合路径所在的最内层归档（只读）
///
/// # 参数
/// * `cpath` - 至少包含一层ZIP内部路径的复合路径，最后一段不参与打开
///
/// # 返回值
/// * `Result<ArchiveReader>` - 最内层归档；任意一层缺失返回 `EntryNotFound`，
///   格式错误返回 `BadZipFile`，不是归档路径返回 `NotArchivePath`
///
/// # 示例
///
/// ```rust,no_run
/// use scrapforge::fs::{CPath, open_archive_path};
///
/// let cpath = CPath::from(["book.zip", "inner.zip", "index.html"]);
/// let mut zh = open_archive_path(&cpath)?;
/// println!("{} 个条目", zh.len());
/// # Ok::<(), scrapforge::fs::FsError>(())
/// ```
pub fn open_archive_path(cpath: &CPath) -> Result<ArchiveReader> {
    let mut readers = open_chain(cpath)?;
    readers
        .pop()
        .ok_or_else(|| FsError::NotArchivePath(cpath.to_string()))
}

/// 依次打开外层到最内层的全部归档
fn open_chain(cpath: &CPath) -> Result<Vec<ArchiveReader>> {
    if !cpath.is_archive_path() {
        return Err(FsError::NotArchivePath(cpath.to_string()));
    }

    let mut readers = vec![open_zip(cpath.file())?];
    for depth in 1..cpath.len() - 1 {
        let label = CPath::from_segments(cpath.segments()[..=depth].to_vec()).to_string();
        let parent = readers
            .last_mut()
            .ok_or_else(|| FsError::NotArchivePath(cpath.to_string()))?;
        let data = read_entry(parent, &cpath[depth]).map_err(|e| match e {
            FsError::EntryNotFound(_) => FsError::EntryNotFound(label.clone()),
            other => other,
        })?;
        let nested = open_zip_bytes(data).map_err(|e| match e {
            FsError::BadZipFile(_) => FsError::BadZipFile(label.clone()),
            other => other,
        })?;
        readers.push(nested);
    }
    Ok(readers)
}

/// 条目是否落在某个待删除的路径之下，`""` 表示整个归档
fn is_deleted(name: &str, deletes: &[String]) -> bool {
    deletes.iter().any(|d| {
        d.is_empty()
            || name == d
            || name
                .strip_prefix(d.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// 改写归档时交给调用方的编辑器
///
/// 创建时未被删除的原有条目已按原顺序原样复制，新条目追加在其后。
/// 名称已被占用时写入返回 `EntryExists`，要替换原有条目需先把它列入删除。
pub struct ArchiveEditor<'a> {
    source: &'a mut ArchiveReader,
    writer: &'a mut ZipWriter<ArchiveSink>,
    written: HashSet<String>,
}

impl<'a> ArchiveEditor<'a> {
    /// 改写前的归档内容
    pub fn source(&mut self) -> &mut ArchiveReader {
        &mut *self.source
    }

    /// 新归档中已有的条目名称
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.written.iter().cloned().collect();
        names.sort();
        names
    }

    fn claim(&mut self, name: &str) -> Result<()> {
        if !self.written.insert(name.to_string()) {
            return Err(FsError::EntryExists(name.to_string()));
        }
        Ok(())
    }

    /// 写入一个文件条目
    ///
    /// # 参数
    /// * `name` - 条目名称
    /// * `data` - 文件内容
    /// * `options` - 条目选项（压缩方式、修改时间等），见 [`entry_options`]
    pub fn write_bytes(&mut self, name: &str, data: &[u8], options: SimpleFileOptions) -> Result<()> {
        self.claim(name)?;
        let options = options.large_file(data.len() as u64 >= u32::MAX as u64);
        self.writer.start_file(name, options)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    /// 从读取流写入一个文件条目
    pub fn write_stream<R: Read>(
        &mut self,
        name: &str,
        reader: &mut R,
        options: SimpleFileOptions,
    ) -> Result<()> {
        self.claim(name)?;
        let options = options.large_file(true);
        self.writer.start_file(name, options)?;
        io::copy(reader, self.writer)?;
        Ok(())
    }

    /// 写入一个显式目录条目，`name` 不需要以 `/` 结尾
    pub fn add_directory(&mut self, name: &str, mtime: Option<zip::DateTime>) -> Result<()> {
        let name = format!("{}/", name.trim_end_matches('/'));
        self.claim(&name)?;
        self.writer
            .add_directory(name, entry_options(CompressionMethod::Stored, mtime))?;
        Ok(())
    }

    /// 把改写前归档中的条目以新名称原样复制
    pub fn copy_entry(&mut self, index: usize, new_name: &str) -> Result<()> {
        self.claim(new_name)?;
        let file = self.source.by_index_raw(index)?;
        self.writer.raw_copy_file_rename(file, new_name.to_string())?;
        Ok(())
    }

    /// 把另一个归档中的条目以新名称原样复制
    pub fn copy_entry_from(
        &mut self,
        other: &mut ArchiveReader,
        index: usize,
        new_name: &str,
    ) -> Result<()> {
        self.claim(new_name)?;
        let file = other.by_index_raw(index)?;
        self.writer.raw_copy_file_rename(file, new_name.to_string())?;
        Ok(())
    }

    fn copy_kept(&mut self, deletes: &[String]) -> Result<()> {
        for i in 0..self.source.len() {
            let file = self.source.by_index_raw(i)?;
            if is_deleted(file.name(), deletes) {
                continue;
            }
            self.written.insert(file.name().to_string());
            self.writer.raw_copy_file(file)?;
        }
        Ok(())
    }
}

/// 改写复合路径所在的最内层归档
///
/// # 参数
/// * `cpath` - 至少包含一层ZIP内部路径的复合路径，最后一段不参与打开
/// * `deletes` - 不复制到新归档中的路径，目录会连同其下条目一起删除，`""` 表示全部
/// * `edit` - 对新归档进行写入的回调
///
/// # 返回值
/// * `Result<T>` - 回调的返回值；回调出错时磁盘上的文件保持不变
pub fn edit_archive_path<T, F>(cpath: &CPath, deletes: &[&str], edit: F) -> Result<T>
where
    F: FnOnce(&mut ArchiveEditor<'_>) -> Result<T>,
{
    let mut readers = open_chain(cpath)?;
    let depth = readers.len();
    let outer = PathBuf::from(cpath.file());

    let (value, mut sink) = {
        let source = readers
            .last_mut()
            .ok_or_else(|| FsError::NotArchivePath(cpath.to_string()))?;
        let mut writer = ZipWriter::new(ArchiveSink::create(&outer, depth == 1)?);
        writer.set_raw_comment(source.comment().into());

        let deletes: Vec<String> = deletes
            .iter()
            .map(|d| d.trim_end_matches('/').to_string())
            .collect();
        let value = {
            let mut editor = ArchiveEditor {
                source,
                writer: &mut writer,
                written: HashSet::new(),
            };
            editor.copy_kept(&deletes)?;
            edit(&mut editor)?
        };
        (value, writer.finish()?)
    };

    for level in (0..depth - 1).rev() {
        let entry_name = &cpath[level + 1];
        let data = sink.into_bytes()?;
        let parent = &mut readers[level];
        let mut writer = ZipWriter::new(ArchiveSink::create(&outer, level == 0)?);
        writer.set_raw_comment(parent.comment().into());
        replace_entry(parent, &mut writer, entry_name, &data)?;
        sink = writer.finish()?;
    }

    log::debug!("改写归档: {}", cpath);
    sink.commit(&outer)?;
    Ok(value)
}

/// 重建 `parent`，把名为 `name` 的条目换成 `data`，其余条目原样复制
fn replace_entry(
    parent: &mut ArchiveReader,
    writer: &mut ZipWriter<ArchiveSink>,
    name: &str,
    data: &[u8],
) -> Result<()> {
    let mut replaced = false;
    for i in 0..parent.len() {
        let file = parent.by_index_raw(i)?;
        if file.name() != name {
            writer.raw_copy_file(file)?;
            continue;
        }
        let method = match file.compression() {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        drop(file);
        write_nested(writer, name, data, method)?;
        replaced = true;
    }
    if !replaced {
        write_nested(writer, name, data, CompressionMethod::Deflated)?;
    }
    Ok(())
}

fn write_nested(
    writer: &mut ZipWriter<ArchiveSink>,
    name: &str,
    data: &[u8],
    method: CompressionMethod,
) -> Result<()> {
    let options = entry_options(method, Some(zip_datetime_now()))
        .large_file(data.len() as u64 >= u32::MAX as u64);
    writer.start_file(name, options)?;
    writer.write_all(data)?;
    Ok(())
}

/// 读取复合路径所指ZIP条目的全部内容
pub fn read_archive_entry(cpath: &CPath) -> Result<Vec<u8>> {
    let mut zh = open_archive_path(cpath)?;
    let subpath = cpath.subpath().unwrap_or_default();
    read_entry(&mut zh, subpath).map_err(|e| match e {
        FsError::EntryNotFound(_) => FsError::EntryNotFound(cpath.to_string()),
        other => other,
    })
}

/// 检查复合路径最后一段在所属归档中的状态
pub fn check_archive_path(cpath: &CPath) -> Result<zip_util::ZipSubpath> {
    let zh = open_archive_path(cpath)?;
    Ok(zip_util::zip_check_subpath(
        &zh,
        cpath.subpath().unwrap_or_default(),
    ))
}
