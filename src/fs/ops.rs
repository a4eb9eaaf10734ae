//! 归档感知的文件操作
//!
//! 所有操作都接受复合路径：只有一段时操作磁盘，多段时操作最内层ZIP中的条目。

use crate::config::ArchiveConfig;
use crate::fs::archive::{ArchiveEditor, check_archive_path, edit_archive_path, open_archive_path};
use crate::fs::cpath::{CPath, join_subpath, normalize_path, normalize_subpath};
use crate::fs::error::{FsError, Result};
use crate::fs::zip_util::{
    ArchiveReader, ZipSubpath, entry_options, extract_entries, zip_datetime,
};
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::Path;
use zip::{CompressionMethod, ZipWriter};

/// 条目类型，符号链接按操作的需要视为文件或跟随
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    File,
    Dir,
}

fn is_missing(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

fn trim_sub(cpath: &CPath) -> &str {
    cpath.subpath().unwrap_or_default().trim_matches('/')
}

/// 检查磁盘路径的祖先中最近的既有条目是否为目录
fn check_disk_parent(path: &Path) -> Result<()> {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        match fs::metadata(ancestor) {
            Ok(meta) if meta.is_dir() => return Ok(()),
            Ok(_) => return Err(FsError::BadParent(path.display().to_string())),
            Err(e) if is_missing(&e) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// 空ZIP归档的数据
fn empty_zip() -> Result<Vec<u8>> {
    Ok(ZipWriter::new(Cursor::new(Vec::new())).finish()?.into_inner())
}

/// `src_sub` 子树中每个条目的索引及其在 `dst_sub` 下的新名称
fn zip_renames(zh: &ArchiveReader, src_sub: &str, dst_sub: &str) -> Vec<(usize, String)> {
    let prefix = format!("{}/", src_sub);
    (0..zh.len())
        .filter_map(|i| {
            let name = zh.name_for_index(i)?;
            if name == src_sub {
                Some((i, dst_sub.to_string()))
            } else {
                name.strip_prefix(prefix.as_str())
                    .map(|rest| (i, format!("{}/{}", dst_sub, rest)))
            }
        })
        .collect()
}

/// `target` 是否等于 `src` 或位于其内部（包括 `src` 作为归档时的内部）
///
/// 比较前先规范化各段，`..` 不能绕过检查。
fn is_inside(src: &CPath, target: &CPath) -> bool {
    let n = src.len();
    if target.len() < n {
        return false;
    }
    let normalized = |cpath: &CPath, i: usize| {
        if i == 0 {
            normalize_path(&cpath[0])
        } else {
            normalize_subpath(&cpath[i])
        }
    };
    if (0..n - 1).any(|i| normalized(src, i) != normalized(target, i)) {
        return false;
    }

    let s = normalized(src, n - 1);
    let t = normalized(target, n - 1);
    if n == 1 {
        return Path::new(&t).starts_with(Path::new(&s));
    }
    t == s || t.starts_with(&format!("{}/", s))
}

fn same_archive(a: &CPath, b: &CPath) -> bool {
    a.is_archive_path() && a.len() == b.len() && a.segments()[..a.len() - 1] == b.segments()[..b.len() - 1]
}

fn partial(errors: Vec<FsError>) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    for e in &errors {
        log::warn!("复制失败: {}", e);
    }
    Err(FsError::Partial { errors })
}

/// 文件操作
///
/// 持有写入ZIP条目时使用的压缩配置。模块级的同名函数使用默认配置。
///
/// # 示例
///
/// ```rust,no_run
/// use scrapforge::config::ArchiveConfig;
/// use scrapforge::fs::FileOps;
///
/// let ops = FileOps::new(ArchiveConfig::default_config());
/// ops.mkzip("book.zip")?;
/// ops.save(["book.zip", "index.html"], b"<p>hi</p>")?;
/// # Ok::<(), scrapforge::fs::FsError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileOps {
    config: ArchiveConfig,
}

impl FileOps {
    pub fn new(config: ArchiveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// 创建目录（含缺失的父目录）
    ///
    /// 已存在的目录不做任何事；ZIP中的隐含目录会补上显式条目。
    pub fn mkdir(&self, dst: impl Into<CPath>) -> Result<()> {
        let dst = dst.into();
        if !dst.is_archive_path() {
            let path = Path::new(dst.file());
            check_disk_parent(path)?;
            match fs::metadata(path) {
                Ok(meta) if meta.is_dir() => return Ok(()),
                Ok(_) => return Err(FsError::EntryExists(dst.to_string())),
                Err(e) if is_missing(&e) => {}
                Err(e) => return Err(e.into()),
            }
            fs::create_dir_all(path)?;
            return Ok(());
        }

        let sub = trim_sub(&dst);
        match check_archive_path(&dst)? {
            ZipSubpath::DirRoot | ZipSubpath::Dir => Ok(()),
            ZipSubpath::File => Err(FsError::FileExists(dst.to_string())),
            ZipSubpath::Invalid => Err(FsError::BadParent(dst.to_string())),
            ZipSubpath::DirImplicit | ZipSubpath::None => {
                edit_archive_path(&dst, &[], |editor| editor.add_directory(sub, None))
            }
        }
    }

    /// 创建空的ZIP文件，已存在的文件会被覆盖
    pub fn mkzip(&self, dst: impl Into<CPath>) -> Result<()> {
        let dst = dst.into();
        if !dst.is_archive_path() {
            let path = Path::new(dst.file());
            self.prepare_disk_file(path)?;
            ZipWriter::new(File::create(path)?).finish()?;
            return Ok(());
        }

        self.check_zip_file_target(&dst)?;
        let sub = trim_sub(&dst);
        let data = empty_zip()?;
        edit_archive_path(&dst, &[sub], |editor| {
            editor.write_bytes(sub, &data, entry_options(CompressionMethod::Stored, None))
        })
    }

    /// 写入文件内容
    ///
    /// # 参数
    /// * `dst` - 目标路径，缺失的父目录会被创建，已存在的文件会被覆盖
    /// * `data` - 文件内容
    pub fn save(&self, dst: impl Into<CPath>, data: &[u8]) -> Result<()> {
        let dst = dst.into();
        if !dst.is_archive_path() {
            let path = Path::new(dst.file());
            self.prepare_disk_file(path)?;
            fs::write(path, data)?;
            return Ok(());
        }

        self.check_zip_file_target(&dst)?;
        let sub = trim_sub(&dst);
        edit_archive_path(&dst, &[sub], |editor| {
            editor.write_bytes(sub, data, self.config.bytes_options(None))
        })
    }

    /// 从读取流写入文件内容
    pub fn save_stream<R: Read>(&self, dst: impl Into<CPath>, reader: &mut R) -> Result<()> {
        let dst = dst.into();
        if !dst.is_archive_path() {
            let path = Path::new(dst.file());
            self.prepare_disk_file(path)?;
            let mut file = File::create(path)?;
            io::copy(reader, &mut file)?;
            return Ok(());
        }

        self.check_zip_file_target(&dst)?;
        let sub = trim_sub(&dst);
        edit_archive_path(&dst, &[sub], |editor| {
            editor.write_stream(sub, reader, self.config.stream_options(None))
        })
    }

    /// 删除文件、目录或符号链接（只删除链接本身）
    ///
    /// ZIP内部路径为 `""` 时清空整个归档。
    pub fn delete(&self, dst: impl Into<CPath>) -> Result<()> {
        let dst = dst.into();
        if !dst.is_archive_path() {
            let path = Path::new(dst.file());
            let meta = match fs::symlink_metadata(path) {
                Ok(meta) => meta,
                Err(e) if is_missing(&e) => return Err(FsError::EntryNotFound(dst.to_string())),
                Err(e) => return Err(e.into()),
            };
            if meta.file_type().is_symlink() {
                fs::remove_file(path).or_else(|_| fs::remove_dir(path))?;
            } else if meta.is_dir() {
                fs::remove_dir_all(path)?;
            } else {
                fs::remove_file(path)?;
            }
            return Ok(());
        }

        let sub = trim_sub(&dst);
        if !sub.is_empty() {
            let zh = open_archive_path(&dst)?;
            let prefix = format!("{}/", sub);
            if !zh.file_names().any(|n| n == sub || n.starts_with(&prefix)) {
                return Err(FsError::EntryNotFound(dst.to_string()));
            }
        }
        edit_archive_path(&dst, &[sub], |_| Ok(()))
    }

    /// 移动文件或目录
    ///
    /// `dst` 是已存在的目录时移动到 `dst/<src的名称>`。
    /// 同一归档内的移动只改写一次归档，条目数据原样复制。
    ///
    /// # 参数
    /// * `src` - 源路径，符号链接本身被移动
    /// * `dst` - 目标路径
    pub fn move_entry(&self, src: impl Into<CPath>, dst: impl Into<CPath>) -> Result<()> {
        let src = src.into();
        let dst = dst.into();
        let kind = self.source_kind(&src, false)?;
        let target = self.resolve_target(&src, &dst)?;

        if is_inside(&src, &target) {
            return Err(FsError::MoveIntoSelf {
                src: src.to_string(),
                dst: target.to_string(),
            });
        }
        let crosses_zip = src.is_archive_path() != target.is_archive_path();
        if crosses_zip && self.moves_as_dir(&src, kind) {
            return Err(FsError::MoveAcrossZip {
                src: src.to_string(),
                dst: target.to_string(),
            });
        }

        log::debug!("移动: {} -> {}", src, target);
        if !src.is_archive_path() && !target.is_archive_path() {
            return self.move_on_disk(Path::new(src.file()), Path::new(target.file()));
        }
        if same_archive(&src, &target) {
            let src_sub = trim_sub(&src);
            let dst_sub = trim_sub(&target);
            return edit_archive_path(&src, &[src_sub], |editor| {
                for (index, name) in zip_renames(editor.source(), src_sub, dst_sub) {
                    editor.copy_entry(index, &name)?;
                }
                Ok(())
            });
        }

        self.copy_resolved(&src, &target, kind)?;
        self.delete(src)
    }

    /// 复制文件或目录
    ///
    /// 符号链接被跟随。磁盘之间复制保留权限与修改时间，跨ZIP边界保留修改时间，
    /// ZIP之间原样复制条目。目录下个别条目失败时继续复制其余条目，
    /// 最后返回收集到的 `Partial` 错误。
    pub fn copy_entry(&self, src: impl Into<CPath>, dst: impl Into<CPath>) -> Result<()> {
        let src = src.into();
        let dst = dst.into();
        let kind = self.source_kind(&src, true)?;
        let target = self.resolve_target(&src, &dst)?;

        if is_inside(&src, &target) {
            return Err(FsError::MoveIntoSelf {
                src: src.to_string(),
                dst: target.to_string(),
            });
        }

        log::debug!("复制: {} -> {}", src, target);
        self.copy_resolved(&src, &target, kind)
    }

    fn copy_resolved(&self, src: &CPath, target: &CPath, kind: Kind) -> Result<()> {
        match (src.is_archive_path(), target.is_archive_path()) {
            (false, false) => {
                let dst = Path::new(target.file());
                create_parent(dst)?;
                let mut errors = Vec::new();
                copy_disk_tree(Path::new(src.file()), dst, &mut errors)?;
                partial(errors)
            }
            (false, true) => {
                let dst_sub = trim_sub(target);
                let mut errors = Vec::new();
                edit_archive_path(target, &[], |editor| {
                    self.write_disk_tree(editor, Path::new(src.file()), dst_sub, &mut errors)
                })?;
                partial(errors)
            }
            (true, false) => {
                let dst = Path::new(target.file());
                create_parent(dst)?;
                let mut zh = open_archive_path(src)?;
                extract_entries(&mut zh, trim_sub(src), dst, None)
            }
            (true, true) => {
                let src_sub = trim_sub(src);
                let dst_sub = trim_sub(target);
                if same_archive(src, target) {
                    return edit_archive_path(target, &[], |editor| {
                        for (index, name) in zip_renames(editor.source(), src_sub, dst_sub) {
                            editor.copy_entry(index, &name)?;
                        }
                        Ok(())
                    });
                }
                let mut zh = open_archive_path(src)?;
                let renames = zip_renames(&zh, src_sub, dst_sub);
                if kind == Kind::Dir && renames.is_empty() {
                    return Err(FsError::EntryNotFound(src.to_string()));
                }
                edit_archive_path(target, &[], |editor| {
                    for (index, name) in renames {
                        editor.copy_entry_from(&mut zh, index, &name)?;
                    }
                    Ok(())
                })
            }
        }
    }

    fn move_on_disk(&self, src: &Path, dst: &Path) -> Result<()> {
        create_parent(dst)?;
        match fs::rename(src, dst) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                log::debug!("跨设备移动，改为复制后删除: {}", src.display());
                let mut errors = Vec::new();
                copy_disk_tree(src, dst, &mut errors)?;
                partial(errors)?;
                self.delete(src)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 把磁盘上的文件或目录写入编辑中的归档，子条目的失败记入 `errors`
    fn write_disk_tree(
        &self,
        editor: &mut ArchiveEditor<'_>,
        src: &Path,
        name: &str,
        errors: &mut Vec<FsError>,
    ) -> Result<()> {
        let meta = fs::metadata(src)?;
        let mtime = meta.modified().ok().and_then(zip_datetime);

        if !meta.is_dir() {
            let mut file = File::open(src)?;
            return editor.write_stream(name, &mut file, self.config.bytes_options(mtime));
        }

        if !name.is_empty() {
            editor.add_directory(name, mtime)?;
        }
        for child in sorted_children(src)? {
            let child_name = join_subpath(name, &child.file_name().to_string_lossy());
            let child_path = child.path();
            if let Err(e) = fs::metadata(&child_path) {
                errors.push(missing_or_io(e, &child_path));
                continue;
            }
            self.write_disk_tree(editor, &child_path, &child_name, errors)?;
        }
        Ok(())
    }

    /// 源条目的类型，不存在时返回 `EntryNotFound`
    fn source_kind(&self, src: &CPath, follow_links: bool) -> Result<Kind> {
        if !src.is_archive_path() {
            let path = Path::new(src.file());
            let meta = if follow_links {
                fs::metadata(path)
            } else {
                fs::symlink_metadata(path)
            };
            return match meta {
                Ok(meta) if meta.is_dir() => Ok(Kind::Dir),
                Ok(_) => Ok(Kind::File),
                Err(e) if is_missing(&e) => Err(FsError::EntryNotFound(src.to_string())),
                Err(e) => Err(e.into()),
            };
        }

        match check_archive_path(src)? {
            ZipSubpath::File => Ok(Kind::File),
            ZipSubpath::Dir | ZipSubpath::DirImplicit => Ok(Kind::Dir),
            ZipSubpath::DirRoot | ZipSubpath::None => Err(FsError::EntryNotFound(src.to_string())),
            ZipSubpath::Invalid => Err(FsError::BadParent(src.to_string())),
        }
    }

    /// 跨ZIP边界移动时是否按目录处理，指向目录的符号链接也算目录
    fn moves_as_dir(&self, src: &CPath, kind: Kind) -> bool {
        kind == Kind::Dir || (!src.is_archive_path() && Path::new(src.file()).is_dir())
    }

    /// 目标条目的类型，不存在时返回 `None`
    fn dest_kind(&self, dst: &CPath) -> Result<Option<Kind>> {
        if !dst.is_archive_path() {
            let path = Path::new(dst.file());
            return match fs::symlink_metadata(path) {
                Ok(meta) if meta.is_dir() => Ok(Some(Kind::Dir)),
                Ok(_) => Ok(Some(Kind::File)),
                Err(e) if is_missing(&e) => {
                    check_disk_parent(path)?;
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            };
        }

        match check_archive_path(dst)? {
            ZipSubpath::File => Ok(Some(Kind::File)),
            ZipSubpath::Dir | ZipSubpath::DirImplicit | ZipSubpath::DirRoot => Ok(Some(Kind::Dir)),
            ZipSubpath::None => Ok(None),
            ZipSubpath::Invalid => Err(FsError::BadParent(dst.to_string())),
        }
    }

    /// 计算最终目标：`dst` 是目录时为其下与源同名的条目
    fn resolve_target(&self, src: &CPath, dst: &CPath) -> Result<CPath> {
        match self.dest_kind(dst)? {
            None => Ok(dst.clone()),
            Some(Kind::File) => Err(FsError::FileExists(dst.to_string())),
            Some(Kind::Dir) => {
                let target = dst.child(&src.name());
                match self.dest_kind(&target)? {
                    None => Ok(target),
                    Some(Kind::File) => Err(FsError::FileExists(target.to_string())),
                    Some(Kind::Dir) => Err(FsError::EntryExists(target.to_string())),
                }
            }
        }
    }

    fn prepare_disk_file(&self, path: &Path) -> Result<()> {
        check_disk_parent(path)?;
        if path.is_dir() {
            return Err(FsError::IsADirectory(path.display().to_string()));
        }
        create_parent(path)
    }

    fn check_zip_file_target(&self, dst: &CPath) -> Result<()> {
        match check_archive_path(dst)? {
            ZipSubpath::Invalid => Err(FsError::BadParent(dst.to_string())),
            state if state.is_dir() => Err(FsError::IsADirectory(dst.to_string())),
            _ => Ok(()),
        }
    }
}

fn sorted_children(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let mut children: Vec<_> = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    children.sort_by_key(|e| e.file_name());
    Ok(children)
}

fn missing_or_io(e: io::Error, path: &Path) -> FsError {
    if is_missing(&e) {
        FsError::EntryNotFound(path.display().to_string())
    } else {
        FsError::Io(e)
    }
}

/// 磁盘之间递归复制，跟随符号链接，保留权限与修改时间
fn copy_disk_tree(src: &Path, dst: &Path, errors: &mut Vec<FsError>) -> Result<()> {
    let meta = fs::metadata(src).map_err(|e| missing_or_io(e, src))?;
    let mtime = meta.modified().ok();

    if !meta.is_dir() {
        fs::copy(src, dst)?;
        if let Some(mtime) = mtime {
            File::options().write(true).open(dst)?.set_modified(mtime)?;
        }
        return Ok(());
    }

    fs::create_dir(dst)?;
    for child in sorted_children(src)? {
        let child_dst = dst.join(child.file_name());
        if let Err(e) = copy_disk_tree(&child.path(), &child_dst, errors) {
            errors.push(e);
        }
    }
    fs::set_permissions(dst, meta.permissions())?;
    if let Some(mtime) = mtime {
        File::open(dst)?.set_modified(mtime)?;
    }
    Ok(())
}

/// 使用默认配置创建目录，见 [`FileOps::mkdir`]
pub fn mkdir(dst: impl Into<CPath>) -> Result<()> {
    FileOps::default().mkdir(dst)
}

/// 使用默认配置创建空ZIP文件，见 [`FileOps::mkzip`]
pub fn mkzip(dst: impl Into<CPath>) -> Result<()> {
    FileOps::default().mkzip(dst)
}

/// 使用默认配置写入文件，见 [`FileOps::save`]
pub fn save(dst: impl Into<CPath>, data: &[u8]) -> Result<()> {
    FileOps::default().save(dst, data)
}

/// 使用默认配置从读取流写入文件，见 [`FileOps::save_stream`]
pub fn save_stream<R: Read>(dst: impl Into<CPath>, reader: &mut R) -> Result<()> {
    FileOps::default().save_stream(dst, reader)
}

/// 删除条目，见 [`FileOps::delete`]
pub fn delete(dst: impl Into<CPath>) -> Result<()> {
    FileOps::default().delete(dst)
}

/// 移动条目，见 [`FileOps::move_entry`]
pub fn move_entry(src: impl Into<CPath>, dst: impl Into<CPath>) -> Result<()> {
    FileOps::default().move_entry(src, dst)
}

/// 复制条目，见 [`FileOps::copy_entry`]
pub fn copy_entry(src: impl Into<CPath>, dst: impl Into<CPath>) -> Result<()> {
    FileOps::default().copy_entry(src, dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::zip_util::{open_zip, open_zip_bytes, read_entry, zip_timestamp};
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    const DUMMY: &[u8] = b"Lorem ipsum dolor sit amet";
    const DUMMY2: &[u8] = b"Duis aute irure dolor";

    fn s(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    /// 磁盘路径加一层ZIP内部路径
    fn zp(path: &Path, sub: &str) -> CPath {
        CPath::from_segments([s(path), sub.to_string()])
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zh = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            if name.ends_with('/') {
                zh.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                zh.start_file(*name, SimpleFileOptions::default()).unwrap();
                zh.write_all(data.as_bytes()).unwrap();
            }
        }
        zh.finish().unwrap();
    }

    fn zip_names(path: &Path) -> Vec<String> {
        open_zip(path).unwrap().file_names().map(str::to_string).collect()
    }

    fn sorted(mut names: Vec<String>) -> Vec<String> {
        names.sort();
        names
    }

    fn entry_time(cpath: &CPath) -> SystemTime {
        let mut zh = open_archive_path(cpath).unwrap();
        let file = zh.by_name(trim_sub(cpath)).unwrap();
        zip_timestamp(file.last_modified().unwrap()).unwrap()
    }

    fn assert_close(a: SystemTime, b: SystemTime) {
        let diff = a.duration_since(b).unwrap_or_else(|e| e.duration());
        assert!(diff <= Duration::from_secs(2), "时间相差过大: {:?}", diff);
    }

    fn set_mtime(path: &Path, days_ago: u64) -> SystemTime {
        let time = SystemTime::now() - Duration::from_secs(days_ago * 86400);
        File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
        time
    }

    /// 各操作共有的错误情形
    fn check_common_errors<F>(func: F, bad_parent: fn(&FsError) -> bool)
    where
        F: Fn(CPath) -> Result<()>,
    {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("subdir"), "").unwrap();

        for dst in [root.join("subdir/subpath"), root.join("subdir/subdir2/subpath")] {
            let err = func(CPath::from(dst)).unwrap_err();
            assert!(bad_parent(&err), "意外的错误: {:?}", err);
        }

        let zfile = root.join("archive.zip");
        let err = func(zp(&zfile, "deep/subpath")).unwrap_err();
        assert!(matches!(err, FsError::EntryNotFound(_)), "意外的错误: {:?}", err);

        fs::write(&zfile, "").unwrap();
        let err = func(zp(&zfile, "deep/subpath")).unwrap_err();
        assert!(matches!(err, FsError::BadZipFile(_)), "意外的错误: {:?}", err);

        for zfile in [root.join("subdir/archive.zip"), root.join("subdir/subdir2/archive.zip")] {
            let err = func(zp(&zfile, "deep/subpath")).unwrap_err();
            assert!(matches!(err, FsError::EntryNotFound(_)), "意外的错误: {:?}", err);
        }
    }

    fn is_bad_parent(e: &FsError) -> bool {
        matches!(e, FsError::BadParent(_))
    }

    fn is_not_found(e: &FsError) -> bool {
        matches!(e, FsError::EntryNotFound(_))
    }

    #[test]
    fn test_common_errors() {
        check_common_errors(|p| mkdir(p), is_bad_parent);
        check_common_errors(|p| mkzip(p), is_bad_parent);
        check_common_errors(|p| save(p, DUMMY), is_bad_parent);
        check_common_errors(|p| delete(p), is_not_found);

        let tmp = TempDir::new().unwrap();
        let nonexist = tmp.path().join("nonexist");
        check_common_errors(|p| move_entry(p, &nonexist), is_not_found);
        check_common_errors(|p| copy_entry(p, &nonexist), is_not_found);
    }

    #[test]
    fn test_zip_bad_parent() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        let nonexist = tmp.path().join("nonexist");

        write_zip(&zfile, &[("deep", "abc")]);
        let dst = zp(&zfile, "deep/subpath");
        assert!(matches!(mkdir(dst.clone()), Err(FsError::BadParent(_))));
        assert!(matches!(mkzip(dst.clone()), Err(FsError::BadParent(_))));
        assert!(matches!(save(dst.clone(), DUMMY), Err(FsError::BadParent(_))));
        assert!(matches!(move_entry(dst.clone(), &nonexist), Err(FsError::BadParent(_))));
        assert!(matches!(copy_entry(dst.clone(), &nonexist), Err(FsError::BadParent(_))));
        assert!(matches!(delete(dst), Err(FsError::EntryNotFound(_))));

        write_zip(&zfile, &[("deep", "abc"), ("deep/subpath", "def")]);
        let dst = zp(&zfile, "deep/subpath");
        assert!(matches!(mkdir(dst.clone()), Err(FsError::BadParent(_))));
        assert!(matches!(save(dst.clone(), DUMMY), Err(FsError::BadParent(_))));
        delete(dst).unwrap();
        assert_eq!(zip_names(&zfile), vec!["deep"]);
    }

    #[test]
    fn test_mkdir() {
        let tmp = TempDir::new().unwrap();
        let dst = tmp.path().join("deep/subdir");
        mkdir(&dst).unwrap();
        assert!(dst.is_dir());
        mkdir(&dst).unwrap();
        assert!(dst.is_dir());

        let file = tmp.path().join("deep/file");
        fs::write(&file, "").unwrap();
        let result = mkdir(&file);
        if let Err(FsError::EntryExists(_)) = result {
        } else {
            panic!("期望EntryExists错误");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_mkdir_reports_stat_errors() {
        let tmp = TempDir::new().unwrap();
        let looped = tmp.path().join("loop");
        std::os::unix::fs::symlink(&looped, &looped).unwrap();

        let result = mkdir(&looped);
        if let Err(FsError::Io(e)) = result {
            assert_ne!(e.kind(), io::ErrorKind::AlreadyExists);
        } else {
            panic!("期望Io错误");
        }
        assert!(looped.symlink_metadata().unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_mkdir_zip() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");

        write_zip(&zfile, &[]);
        mkdir(zp(&zfile, "deep/subdir")).unwrap();
        assert_eq!(zip_names(&zfile), vec!["deep/subdir/"]);

        // 显式目录保持不变
        mkdir(zp(&zfile, "deep/subdir")).unwrap();
        assert_eq!(zip_names(&zfile), vec!["deep/subdir/"]);

        write_zip(&zfile, &[("deep/subdir/somefile.txt", "abc")]);
        mkdir(zp(&zfile, "deep/subdir")).unwrap();
        assert_eq!(
            sorted(zip_names(&zfile)),
            vec!["deep/subdir/", "deep/subdir/somefile.txt"]
        );

        write_zip(&zfile, &[]);
        mkdir(zp(&zfile, "")).unwrap();
        assert!(zip_names(&zfile).is_empty());

        write_zip(&zfile, &[("deep/subdir", "abc")]);
        assert!(matches!(mkdir(zp(&zfile, "deep/subdir")), Err(FsError::FileExists(_))));
    }

    #[test]
    fn test_mkdir_zip_nested() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        write_zip(&zfile, &[]);
        let inner = zp(&zfile, "nested/subarchive.zip");
        mkzip(inner.clone()).unwrap();

        mkdir(inner.join("deep/subdir")).unwrap();
        let mut zh = open_zip(&zfile).unwrap();
        let data = read_entry(&mut zh, "nested/subarchive.zip").unwrap();
        let mut zh2 = open_zip_bytes(data).unwrap();
        assert_eq!(zh2.file_names().collect::<Vec<_>>(), vec!["deep/subdir/"]);
        let file = zh2.by_name("deep/subdir/").unwrap();
        assert_close(zip_timestamp(file.last_modified().unwrap()).unwrap(), SystemTime::now());
    }

    #[test]
    fn test_mkzip() {
        let tmp = TempDir::new().unwrap();
        let dst = tmp.path().join("deep/archive.zip");
        mkzip(&dst).unwrap();
        assert!(zip_names(&dst).is_empty());

        fs::write(&dst, DUMMY).unwrap();
        mkzip(&dst).unwrap();
        assert!(zip_names(&dst).is_empty());

        let result = mkzip(tmp.path());
        assert!(matches!(result, Err(FsError::IsADirectory(_))));
    }

    #[test]
    fn test_mkzip_zip() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        write_zip(&zfile, &[("deep/archive.zip", "dummy"), ("folder/", "")]);

        mkzip(zp(&zfile, "deep/archive.zip")).unwrap();
        let mut zh = open_zip(&zfile).unwrap();
        assert_eq!(
            zh.by_name("deep/archive.zip").unwrap().compression(),
            CompressionMethod::Stored
        );
        let data = read_entry(&mut zh, "deep/archive.zip").unwrap();
        assert_eq!(open_zip_bytes(data).unwrap().len(), 0);

        for sub in ["folder", "deep", ""] {
            let result = mkzip(zp(&zfile, sub));
            assert!(matches!(result, Err(FsError::IsADirectory(_))), "subpath: {:?}", sub);
        }
    }

    #[test]
    fn test_save() {
        let tmp = TempDir::new().unwrap();
        let dst = tmp.path().join("deep/file.txt");
        save(&dst, DUMMY).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), DUMMY);

        save_stream(&dst, &mut &DUMMY2[..]).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), DUMMY2);

        let result = save(tmp.path().join("deep"), DUMMY);
        assert!(matches!(result, Err(FsError::IsADirectory(_))));
    }

    #[test]
    fn test_save_zip() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        write_zip(&zfile, &[("deep/file.txt", "old"), ("folder/", "")]);

        save(zp(&zfile, "deep/file.txt"), DUMMY).unwrap();
        save_stream(zp(&zfile, "deep/stream.txt"), &mut &DUMMY2[..]).unwrap();

        let mut zh = open_zip(&zfile).unwrap();
        assert_eq!(read_entry(&mut zh, "deep/file.txt").unwrap(), DUMMY);
        assert_eq!(read_entry(&mut zh, "deep/stream.txt").unwrap(), DUMMY2);
        assert_eq!(
            zh.by_name("deep/file.txt").unwrap().compression(),
            CompressionMethod::Deflated
        );
        assert_eq!(
            zh.by_name("deep/stream.txt").unwrap().compression(),
            CompressionMethod::Stored
        );
        assert_eq!(zh.len(), 3);

        for sub in ["folder", "deep", ""] {
            let result = save(zp(&zfile, sub), DUMMY);
            assert!(matches!(result, Err(FsError::IsADirectory(_))), "subpath: {:?}", sub);
        }
    }

    #[test]
    fn test_save_zip_with_config() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        write_zip(&zfile, &[]);

        let mut config = ArchiveConfig::default_config();
        config.bytes_compression = crate::config::Compression::Stored;
        let ops = FileOps::new(config);
        ops.save(zp(&zfile, "file.txt"), DUMMY).unwrap();

        let mut zh = open_zip(&zfile).unwrap();
        assert_eq!(zh.by_name("file.txt").unwrap().compression(), CompressionMethod::Stored);
    }

    #[test]
    fn test_save_zip_nested() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        write_zip(&zfile, &[]);
        let inner = zp(&zfile, "nested/subarchive.zip");
        mkzip(inner.clone()).unwrap();

        save(inner.join("deep/file.txt"), DUMMY).unwrap();
        let mut zh = open_archive_path(&inner.join("deep/file.txt")).unwrap();
        assert_eq!(read_entry(&mut zh, "deep/file.txt").unwrap(), DUMMY);
        assert_eq!(
            zh.by_name("deep/file.txt").unwrap().compression(),
            CompressionMethod::Deflated
        );
    }

    #[test]
    fn test_delete() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, DUMMY).unwrap();
        delete(&file).unwrap();
        assert!(!file.exists());

        let dir = tmp.path().join("folder");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/file.txt"), DUMMY).unwrap();
        delete(&dir).unwrap();
        assert!(!dir.exists());

        assert!(matches!(delete(&file), Err(FsError::EntryNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_symlink() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("folder");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("file.txt"), DUMMY).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&dir, &link).unwrap();

        delete(&link).unwrap();
        assert!(link.symlink_metadata().is_err());
        assert!(dir.join("file.txt").exists());
    }

    #[test]
    fn test_delete_zip() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        let entries = [
            ("file.txt", "123"),
            ("folder/", ""),
            ("folder/file.txt", "456"),
            ("implicit/file.txt", "789"),
        ];

        write_zip(&zfile, &entries);
        delete(zp(&zfile, "file.txt")).unwrap();
        assert_eq!(
            zip_names(&zfile),
            vec!["folder/", "folder/file.txt", "implicit/file.txt"]
        );

        write_zip(&zfile, &entries);
        delete(zp(&zfile, "folder")).unwrap();
        assert_eq!(zip_names(&zfile), vec!["file.txt", "implicit/file.txt"]);

        write_zip(&zfile, &entries);
        delete(zp(&zfile, "implicit")).unwrap();
        assert_eq!(zip_names(&zfile), vec!["file.txt", "folder/", "folder/file.txt"]);

        write_zip(&zfile, &entries);
        delete(zp(&zfile, "")).unwrap();
        assert!(zip_names(&zfile).is_empty());

        write_zip(&zfile, &entries);
        assert!(matches!(delete(zp(&zfile, "nonexist")), Err(FsError::EntryNotFound(_))));
    }

    #[test]
    fn test_move_file() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("subdir/file.txt");
        save(&src, DUMMY).unwrap();
        let mtime = set_mtime(&src, 3);

        let dst = tmp.path().join("subdir2/file2.txt");
        move_entry(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), DUMMY);
        assert_eq!(fs::metadata(&dst).unwrap().modified().unwrap(), mtime);

        // 移动到已存在的目录中
        let folder = tmp.path().join("folder");
        mkdir(&folder).unwrap();
        move_entry(&dst, &folder).unwrap();
        assert_eq!(fs::read(folder.join("file2.txt")).unwrap(), DUMMY);
    }

    #[test]
    fn test_move_existing_targets() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("subdir/file.txt");
        save(&src, DUMMY).unwrap();

        let file = tmp.path().join("subdir2/file.txt");
        save(&file, b"").unwrap();
        assert!(move_entry(&src, &file).unwrap_err().is_entry_exists());

        // 目录中已有同名文件
        assert!(move_entry(&src, tmp.path().join("subdir2")).unwrap_err().is_entry_exists());

        // 目录中已有同名目录
        let dir = tmp.path().join("subdir3");
        mkdir(dir.join("file.txt")).unwrap();
        let err = move_entry(&src, &dir).unwrap_err();
        assert!(matches!(err, FsError::EntryExists(_)));
        assert!(src.exists());
    }

    #[test]
    fn test_move_dir() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("subdir/folder");
        save(src.join("file.txt"), DUMMY).unwrap();

        let dst = tmp.path().join("subdir2/folder2");
        move_entry(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(dst.join("file.txt")).unwrap(), DUMMY);

        let parent = tmp.path().join("subdir3");
        mkdir(&parent).unwrap();
        move_entry(&dst, &parent).unwrap();
        assert_eq!(fs::read(parent.join("folder2/file.txt")).unwrap(), DUMMY);
    }

    #[test]
    fn test_move_dir_into_self() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("subdir/folder");
        save(src.join("file.txt"), DUMMY).unwrap();

        for dst in [src.join("subfolder"), src.clone()] {
            let result = move_entry(&src, &dst);
            assert!(matches!(result, Err(FsError::MoveIntoSelf { .. })));
        }
        let names: Vec<_> = crate::fs::info::listdir(&src, true)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["file.txt"]);
    }

    #[test]
    fn test_move_copy_into_self_through_parent_dir() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("folder");
        save(src.join("file.txt"), DUMMY).unwrap();

        let dst = tmp.path().join("other/../folder/sub");
        let result = copy_entry(&src, &dst);
        assert!(matches!(result, Err(FsError::MoveIntoSelf { .. })));
        let result = move_entry(&src, &dst);
        assert!(matches!(result, Err(FsError::MoveIntoSelf { .. })));

        let names: Vec<_> = crate::fs::info::listdir(&src, true)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["file.txt"]);
        assert!(!tmp.path().join("other").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_move_dir_symlink_across_zip() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        mkzip(&zfile).unwrap();
        let dir = tmp.path().join("folder");
        save(dir.join("file.txt"), DUMMY).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&dir, &link).unwrap();

        let result = move_entry(&link, zp(&zfile, "link"));
        assert!(matches!(result, Err(FsError::MoveAcrossZip { .. })));
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert!(zip_names(&zfile).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_move_broken_symlink() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("link");
        std::os::unix::fs::symlink(tmp.path().join("nonexist"), &src).unwrap();

        let dst = tmp.path().join("moved/link");
        move_entry(&src, &dst).unwrap();
        assert!(src.symlink_metadata().is_err());
        assert!(dst.symlink_metadata().unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_move_dir_across_zip() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        mkzip(&zfile).unwrap();
        let dir = tmp.path().join("folder");
        mkdir(&dir).unwrap();
        mkdir(zp(&zfile, "deep/folder")).unwrap();

        let result = move_entry(&dir, zp(&zfile, "folder"));
        assert!(matches!(result, Err(FsError::MoveAcrossZip { .. })));
        let result = move_entry(zp(&zfile, "deep/folder"), tmp.path().join("folder2"));
        assert!(matches!(result, Err(FsError::MoveAcrossZip { .. })));
    }

    #[test]
    fn test_move_file_across_zip() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        mkzip(&zfile).unwrap();
        let src = tmp.path().join("file.txt");
        save(&src, DUMMY).unwrap();
        let mtime = set_mtime(&src, 3);

        let dst = zp(&zfile, "deep/file.txt");
        move_entry(&src, dst.clone()).unwrap();
        assert!(!src.exists());
        assert_close(entry_time(&dst), mtime);

        move_entry(dst.clone(), &src).unwrap();
        assert_eq!(fs::read(&src).unwrap(), DUMMY);
        assert_close(fs::metadata(&src).unwrap().modified().unwrap(), mtime);
        assert!(zip_names(&zfile).is_empty());
    }

    #[test]
    fn test_move_zip_file() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        mkzip(&zfile).unwrap();
        let src = zp(&zfile, "deep/file.txt");
        save(src.clone(), DUMMY).unwrap();
        let mtime = entry_time(&src);

        let dst = zp(&zfile, "deep/subdir/file2.txt");
        move_entry(src.clone(), dst.clone()).unwrap();
        assert_eq!(zip_names(&zfile), vec!["deep/subdir/file2.txt"]);
        assert_eq!(entry_time(&dst), mtime);

        save(src.clone(), b"").unwrap();
        let result = move_entry(src.clone(), dst.clone());
        assert!(matches!(result, Err(FsError::FileExists(_))));

        // 移动到已存在的目录中
        let folder = zp(&zfile, "folder");
        mkdir(folder.clone()).unwrap();
        move_entry(src, folder).unwrap();
        assert_eq!(
            sorted(zip_names(&zfile)),
            vec!["deep/subdir/file2.txt", "folder/", "folder/file.txt"]
        );
    }

    #[test]
    fn test_move_zip_dir() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        mkzip(&zfile).unwrap();
        mkdir(zp(&zfile, "deep/subdir")).unwrap();
        save(zp(&zfile, "deep/subdir/file.txt"), DUMMY).unwrap();
        mkdir(zp(&zfile, "deep/subdir/explicit_dir")).unwrap();
        save(zp(&zfile, "deep/subdir/implicit_dir/subfile.txt"), DUMMY2).unwrap();

        move_entry(zp(&zfile, "deep/subdir"), zp(&zfile, "deep/subdir2/subdir3")).unwrap();
        assert_eq!(
            sorted(zip_names(&zfile)),
            vec![
                "deep/subdir2/subdir3/",
                "deep/subdir2/subdir3/explicit_dir/",
                "deep/subdir2/subdir3/file.txt",
                "deep/subdir2/subdir3/implicit_dir/subfile.txt",
            ]
        );

        let dst = zp(&zfile, "deep/subdir2/subdir3/file.txt");
        let mut zh = open_archive_path(&dst).unwrap();
        assert_eq!(read_entry(&mut zh, trim_sub(&dst)).unwrap(), DUMMY);
    }

    #[test]
    fn test_move_zip_dir_into_self() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        mkzip(&zfile).unwrap();
        mkdir(zp(&zfile, "deep/subdir")).unwrap();
        save(zp(&zfile, "deep/subdir/file.txt"), DUMMY).unwrap();
        mkzip(zp(&zfile, "deep/subarchive.zip")).unwrap();

        let src = zp(&zfile, "deep/subdir");
        for dst in [zp(&zfile, "deep/subdir/subdir2"), src.clone()] {
            let result = move_entry(src.clone(), dst);
            assert!(matches!(result, Err(FsError::MoveIntoSelf { .. })));
        }

        let src = zp(&zfile, "deep/subarchive.zip");
        let result = move_entry(src.clone(), src.join("deep/file.txt"));
        assert!(matches!(result, Err(FsError::MoveIntoSelf { .. })));

        // 目标位于源目录下的嵌套归档内
        let src = zp(&zfile, "deep");
        let dst = CPath::from_segments([s(&zfile), "deep/subarchive.zip".into(), "x".into()]);
        let result = move_entry(src.clone(), dst.clone());
        assert!(matches!(result, Err(FsError::MoveIntoSelf { .. })));
        let result = copy_entry(src, dst);
        assert!(matches!(result, Err(FsError::MoveIntoSelf { .. })));

        assert_eq!(
            sorted(zip_names(&zfile)),
            vec!["deep/subarchive.zip", "deep/subdir/", "deep/subdir/file.txt"]
        );
    }

    #[test]
    fn test_move_zip_dir_nested() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        let zfile2 = tmp.path().join("archive2.zip");
        let src = CPath::from_segments([s(&zfile), "deep/subarchive.zip".into(), "deep/subdir".into()]);
        let dst = CPath::from_segments([s(&zfile2), "deep/subarchive2.zip".into(), "deep/subdir2".into()]);
        mkzip(&zfile).unwrap();
        mkzip(src.archive().unwrap()).unwrap();
        mkdir(src.clone()).unwrap();
        save(src.child("file.txt"), DUMMY).unwrap();
        mkzip(&zfile2).unwrap();
        mkzip(dst.archive().unwrap()).unwrap();

        move_entry(src.clone(), dst.clone()).unwrap();

        let zh = open_archive_path(&src).unwrap();
        assert_eq!(zh.len(), 0);
        let mut zh = open_archive_path(&dst).unwrap();
        assert_eq!(read_entry(&mut zh, "deep/subdir2/file.txt").unwrap(), DUMMY);
        assert!(zh.index_for_name("deep/subdir2/").is_some());
    }

    #[test]
    fn test_move_copy_zip_root() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        let zfile2 = tmp.path().join("archive2.zip");
        mkzip(&zfile).unwrap();
        save(zp(&zfile, "subdir/file.txt"), DUMMY).unwrap();
        mkzip(&zfile2).unwrap();

        let result = move_entry(zp(&zfile, ""), zp(&zfile2, "deep/subdir2"));
        assert!(matches!(result, Err(FsError::EntryNotFound(_))));
        let result = copy_entry(zp(&zfile, ""), tmp.path().join("extracted"));
        assert!(matches!(result, Err(FsError::EntryNotFound(_))));
    }

    #[test]
    fn test_copy_file() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("subdir/file.txt");
        save(&src, DUMMY).unwrap();
        let mtime = set_mtime(&src, 3);

        let dst = tmp.path().join("subdir2/file2.txt");
        copy_entry(&src, &dst).unwrap();
        assert_eq!(fs::read(&src).unwrap(), DUMMY);
        assert_eq!(fs::read(&dst).unwrap(), DUMMY);
        assert_eq!(fs::metadata(&dst).unwrap().modified().unwrap(), mtime);
        assert_eq!(
            fs::metadata(&dst).unwrap().permissions(),
            fs::metadata(&src).unwrap().permissions()
        );

        assert!(copy_entry(&src, &dst).unwrap_err().is_entry_exists());
        let result = copy_entry(tmp.path().join("nonexist"), &dst);
        assert!(matches!(result, Err(FsError::EntryNotFound(_))));
    }

    #[test]
    fn test_copy_dir() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("folder");
        save(src.join("subfolder/file.txt"), DUMMY).unwrap();
        save(src.join("file2.txt"), DUMMY2).unwrap();
        let mtime = set_mtime(&src.join("subfolder/file.txt"), 5);

        let parent = tmp.path().join("parent");
        mkdir(&parent).unwrap();
        copy_entry(&src, &parent).unwrap();
        let dst = parent.join("folder");
        assert_eq!(fs::read(dst.join("subfolder/file.txt")).unwrap(), DUMMY);
        assert_eq!(fs::read(dst.join("file2.txt")).unwrap(), DUMMY2);
        assert_eq!(
            fs::metadata(dst.join("subfolder/file.txt")).unwrap().modified().unwrap(),
            mtime
        );
        assert!(src.join("file2.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_symlinks() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("target.txt");
        save(&target, DUMMY).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        // 链接被跟随
        let dst = tmp.path().join("copied.txt");
        copy_entry(&link, &dst).unwrap();
        assert!(!dst.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&dst).unwrap(), DUMMY);

        let broken = tmp.path().join("broken");
        std::os::unix::fs::symlink(tmp.path().join("nonexist"), &broken).unwrap();
        let result = copy_entry(&broken, tmp.path().join("copied2"));
        assert!(matches!(result, Err(FsError::EntryNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_partial() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("folder");
        save(src.join("file.txt"), DUMMY).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("nonexist"), src.join("broken")).unwrap();

        let dst = tmp.path().join("copied");
        match copy_entry(&src, &dst) {
            Err(FsError::Partial { errors }) => assert_eq!(errors.len(), 1),
            other => panic!("期望Partial错误: {:?}", other),
        }
        assert_eq!(fs::read(dst.join("file.txt")).unwrap(), DUMMY);

        let zfile = tmp.path().join("archive.zip");
        mkzip(&zfile).unwrap();
        match copy_entry(&src, zp(&zfile, "deep/folder")) {
            Err(FsError::Partial { errors }) => assert_eq!(errors.len(), 1),
            other => panic!("期望Partial错误: {:?}", other),
        }
        assert_eq!(zip_names(&zfile), vec!["deep/folder/", "deep/folder/file.txt"]);
    }

    #[test]
    fn test_copy_disk_to_zip() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        mkzip(&zfile).unwrap();
        let src = tmp.path().join("folder");
        save(src.join("subfolder/file.txt"), DUMMY).unwrap();
        let mtime = set_mtime(&src.join("subfolder/file.txt"), 3);

        copy_entry(&src, zp(&zfile, "deep/folder")).unwrap();
        assert_eq!(
            zip_names(&zfile),
            vec!["deep/folder/", "deep/folder/subfolder/", "deep/folder/subfolder/file.txt"]
        );
        let dst = zp(&zfile, "deep/folder/subfolder/file.txt");
        assert_close(entry_time(&dst), mtime);

        let result = copy_entry(tmp.path().join("nonexist"), zp(&zfile, "deep/other"));
        assert!(matches!(result, Err(FsError::EntryNotFound(_))));
    }

    #[test]
    fn test_copy_zip_to_disk() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        mkzip(&zfile).unwrap();
        mkdir(zp(&zfile, "deep/folder")).unwrap();
        save(zp(&zfile, "deep/folder/file.txt"), DUMMY).unwrap();
        let mtime = entry_time(&zp(&zfile, "deep/folder/file.txt"));

        let dst = tmp.path().join("sub/file.txt");
        copy_entry(zp(&zfile, "deep/folder/file.txt"), &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), DUMMY);
        assert_close(fs::metadata(&dst).unwrap().modified().unwrap(), mtime);

        let dst = tmp.path().join("folder");
        copy_entry(zp(&zfile, "deep/folder"), &dst).unwrap();
        assert_eq!(fs::read(dst.join("file.txt")).unwrap(), DUMMY);
        assert_eq!(zip_names(&zfile).len(), 2);

        let result = copy_entry(zp(&zfile, "nonexist"), tmp.path().join("other"));
        assert!(matches!(result, Err(FsError::EntryNotFound(_))));
    }

    #[test]
    fn test_copy_zip_to_zip() {
        let tmp = TempDir::new().unwrap();
        let zfile = tmp.path().join("archive.zip");
        let zfile2 = tmp.path().join("archive2.zip");
        mkzip(&zfile).unwrap();
        mkzip(&zfile2).unwrap();
        save(zp(&zfile, "deep/file.txt"), DUMMY).unwrap();
        let mtime = entry_time(&zp(&zfile, "deep/file.txt"));

        // 同一归档
        copy_entry(zp(&zfile, "deep/file.txt"), zp(&zfile, "deep/file2.txt")).unwrap();
        assert_eq!(zip_names(&zfile), vec!["deep/file.txt", "deep/file2.txt"]);
        assert_eq!(entry_time(&zp(&zfile, "deep/file2.txt")), mtime);

        // 不同归档，目标为已存在的目录
        mkdir(zp(&zfile2, "target")).unwrap();
        copy_entry(zp(&zfile, "deep"), zp(&zfile2, "target")).unwrap();
        assert_eq!(
            zip_names(&zfile2),
            vec!["target/", "target/deep/file.txt", "target/deep/file2.txt"]
        );
        assert_eq!(entry_time(&zp(&zfile2, "target/deep/file.txt")), mtime);

        let result = copy_entry(zp(&zfile, "deep/file.txt"), zp(&zfile, "deep/file2.txt"));
        assert!(matches!(result, Err(FsError::FileExists(_))));
    }

    #[test]
    fn test_is_inside() {
        let src = CPath::from(["a.zip", "deep/subdir"]);
        assert!(is_inside(&src, &src));
        assert!(is_inside(&src, &CPath::from(["a.zip", "deep/subdir/x"])));
        assert!(!is_inside(&src, &CPath::from(["a.zip", "deep/subdir2"])));
        assert!(!is_inside(&src, &CPath::from(["b.zip", "deep/subdir/x"])));
        assert!(is_inside(
            &CPath::from(["a.zip", "sub.zip"]),
            &CPath::from(["a.zip", "sub.zip", "x"])
        ));
        assert!(is_inside(&CPath::from("/tmp/a"), &CPath::from("/tmp/a/b")));
        assert!(!is_inside(&CPath::from("/tmp/a"), &CPath::from("/tmp/ab")));
        assert!(!is_inside(&CPath::from("/tmp/a"), &CPath::from(PathBuf::from("/tmp/b"))));
        assert!(is_inside(&CPath::from("/tmp/a"), &CPath::from("/tmp/b/../a/c")));
        assert!(is_inside(
            &CPath::from(["a.zip", "deep"]),
            &CPath::from(["a.zip", "deep/sub.zip", "x"])
        ));
        assert!(is_inside(
            &CPath::from(["/tmp/x/../a.zip", "deep"]),
            &CPath::from(["/tmp/a.zip", "deep/./sub"])
        ));
        assert!(!is_inside(
            &CPath::from(["a.zip", "deep"]),
            &CPath::from(["a.zip", "deeper.zip", "x"])
        ));
    }
}
