use clap::{Parser, Subcommand};
use scrapforge::config::{ArchiveConfig, DEFAULT_CONFIG_PATH};
use scrapforge::fs::{self as cfs, FileInfo, FileKind};
use scrapforge::{CPath, FileOps, HtmlRewriter, MarkupKind};
use std::error::Error;
use std::io::{self, Read, Write};

type CliResult<T> = std::result::Result<T, Box<dyn Error>>;

/// 🗂️ ScrapForge - 网页剪藏数据处理工具
#[derive(Parser)]
#[command(name = "scrapforge")]
#[command(about = "HTML重写与ZIP嵌套路径文件操作工具")]
#[command(version)]
struct Args {
    /// 详细输出模式
    #[arg(short, long, global = true, help = "输出调试日志")]
    verbose: bool,

    /// 配置文件路径
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH, help = "归档写入配置文件路径")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 对HTML文件分词并列出标记单元
    Tokenize {
        /// 复合路径，例如 `book.zip!/index.html`
        path: String,
        /// 按XHTML规则分词
        #[arg(long)]
        xhtml: bool,
        /// 不列出单元，而是输出重新序列化的结果
        #[arg(long)]
        reserialize: bool,
    },
    /// 显示复合路径的解析结果
    Resolve { path: String },
    /// 创建目录
    Mkdir { path: String },
    /// 创建空ZIP文件
    Mkzip { path: String },
    /// 保存文件，未指定来源时读取标准输入
    Save {
        path: String,
        #[arg(short, long, help = "来源磁盘文件")]
        from: Option<String>,
    },
    /// 删除文件或目录
    Delete { path: String },
    /// 移动文件或目录
    Move { src: String, dst: String },
    /// 复制文件或目录
    Copy { src: String, dst: String },
    /// 列出目录内容
    Ls {
        path: String,
        #[arg(short, long, help = "递归列出")]
        recursive: bool,
    },
    /// 输出文件内容
    Cat { path: String },
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    println!("🗂️ ScrapForge - 网页剪藏数据处理工具");

    match run(args) {
        Ok(_) => println!("🎉 处理完成！"),
        Err(e) => eprintln!("❌ 错误: {}", e),
    }
}

fn run(args: Args) -> CliResult<()> {
    let ops = FileOps::new(ArchiveConfig::load_or_init(&args.config));

    match args.command {
        Command::Tokenize {
            path,
            xhtml,
            reserialize,
        } => tokenize(&path, xhtml, reserialize)?,
        Command::Resolve { path } => {
            let cpath = CPath::resolve(&path);
            println!("\n🔍 {}", cpath);
            for (i, segment) in cpath.iter().enumerate() {
                println!("  {}. {}", i + 1, segment);
            }
        }
        Command::Mkdir { path } => {
            ops.mkdir(CPath::resolve(&path))?;
            println!("📁 已创建目录: {}", path);
        }
        Command::Mkzip { path } => {
            ops.mkzip(CPath::resolve(&path))?;
            println!("📦 已创建ZIP: {}", path);
        }
        Command::Save { path, from } => {
            let cpath = CPath::resolve(&path);
            match from {
                Some(file) => ops.save_stream(cpath, &mut std::fs::File::open(file)?)?,
                None => ops.save_stream(cpath, &mut io::stdin().lock())?,
            }
            println!("💾 已保存: {}", path);
        }
        Command::Delete { path } => {
            ops.delete(CPath::resolve(&path))?;
            println!("🗑️ 已删除: {}", path);
        }
        Command::Move { src, dst } => {
            ops.move_entry(CPath::resolve(&src), CPath::resolve(&dst))?;
            println!("🚚 已移动: {} -> {}", src, dst);
        }
        Command::Copy { src, dst } => {
            ops.copy_entry(CPath::resolve(&src), CPath::resolve(&dst))?;
            println!("📋 已复制: {} -> {}", src, dst);
        }
        Command::Ls { path, recursive } => {
            let entries = list(&CPath::resolve(&path), recursive)?;
            println!("\n📁 {} ({} 个条目):", path, entries.len());
            for entry in &entries {
                println!("  {}", describe(entry));
            }
        }
        Command::Cat { path } => {
            let data = read(&CPath::resolve(&path))?;
            io::stdout().write_all(&data)?;
        }
    }

    Ok(())
}

fn tokenize(path: &str, is_xhtml: bool, reserialize: bool) -> CliResult<()> {
    let data = read(&CPath::resolve(path))?;
    let rewriter = HtmlRewriter::new(is_xhtml);
    let markups = rewriter.load(data.as_slice())?;

    if reserialize {
        rewriter.dump(&markups, io::stdout().lock())?;
        return Ok(());
    }

    println!("\n🔖 共 {} 个标记单元:", markups.len());
    for (i, markup) in markups.iter().enumerate() {
        let label = match markup.kind() {
            MarkupKind::StartTag => "开始标签",
            MarkupKind::EndTag => "结束标签",
            MarkupKind::Text => "文本",
            MarkupKind::Comment => "注释",
            MarkupKind::Declaration => "声明",
            MarkupKind::Cdata => "标记段",
            MarkupKind::ProcessingInstruction => "处理指令",
        };
        let hidden = if markup.hidden { " (隐含)" } else { "" };
        println!("  {}. [{}]{} {:?}", i + 1, label, hidden, markup.render());
    }
    Ok(())
}

fn read(cpath: &CPath) -> CliResult<Vec<u8>> {
    if cpath.is_archive_path() {
        Ok(cfs::read_archive_entry(cpath)?)
    } else {
        let mut data = Vec::new();
        std::fs::File::open(cpath.file())?.read_to_end(&mut data)?;
        Ok(data)
    }
}

fn list(cpath: &CPath, recursive: bool) -> CliResult<Vec<FileInfo>> {
    if cpath.is_archive_path() {
        let mut zh = cfs::open_archive_path(cpath)?;
        Ok(cfs::zip_listdir(
            &mut zh,
            cpath.subpath().unwrap_or_default(),
            recursive,
        )?)
    } else {
        Ok(cfs::listdir(cpath.file(), recursive)?)
    }
}

fn describe(info: &FileInfo) -> String {
    let icon = match info.kind {
        Some(FileKind::Dir) => "📁",
        Some(FileKind::Link) => "🔗",
        Some(FileKind::File) => "📄",
        None => "❔",
    };
    let mut line = format!("{} {}", icon, info.name);
    if let Some(size) = info.size {
        line.push_str(&format!(" ({} 字节)", size));
    }
    if let Some(mtime) = info.mtime {
        let local: chrono::DateTime<chrono::Local> = mtime.into();
        line.push_str(&format!(" {}", local.format("%Y-%m-%d %H:%M:%S")));
    }
    line
}
