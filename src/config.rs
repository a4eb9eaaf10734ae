//! 归档写入配置模块
//!
//! 控制写入ZIP条目时的压缩策略，支持从YAML文件加载配置。

use crate::fs::error::{FsError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "scrapforge.yaml";

/// ZIP条目的压缩方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// 不压缩
    Stored,
    /// Deflate压缩
    Deflated,
}

impl From<Compression> for CompressionMethod {
    fn from(value: Compression) -> Self {
        match value {
            Compression::Stored => CompressionMethod::Stored,
            Compression::Deflated => CompressionMethod::Deflated,
        }
    }
}

/// 归档写入配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// 由字节数据写入的条目使用的压缩方式
    pub bytes_compression: Compression,
    /// 由数据流写入的条目使用的压缩方式
    pub stream_compression: Compression,
    /// Deflate压缩级别（0-9），不设置时使用默认级别
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deflate_level: Option<i64>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ArchiveConfig {
    /// 从指定的配置文件加载
    ///
    /// # 参数
    /// * `path` - YAML配置文件路径
    ///
    /// # 返回值
    /// * `Result<Self>` - 读取或解析失败时返回 `ConfigError`
    ///
    /// # 示例
    ///
    /// ```rust,no_run
    /// use scrapforge::config::ArchiveConfig;
    /// let config = ArchiveConfig::from_file("scrapforge.yaml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| FsError::ConfigError(format!("无法读取配置文件: {}", e)))?;

        let config: Self = serde_yml::from_str(&content)
            .map_err(|e| FsError::ConfigError(format!("配置文件格式错误: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 生成默认配置文件
    ///
    /// # 参数
    /// * `path` - 要写入的配置文件路径
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let yaml_content = serde_yml::to_string(&Self::default_config())
            .map_err(|e| FsError::ConfigError(format!("序列化配置失败: {}", e)))?;

        let content_with_header = format!(
            "# 归档写入配置文件\n# 压缩方式可选 stored（不压缩）或 deflated\n# deflate_level 为 0-9 的压缩级别，可省略\n\n{}",
            yaml_content
        );

        fs::write(path.as_ref(), content_with_header)
            .map_err(|e| FsError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }

    /// 获取默认配置
    ///
    /// 字节数据使用Deflate压缩，数据流不压缩。
    pub fn default_config() -> Self {
        Self {
            bytes_compression: Compression::Deflated,
            stream_compression: Compression::Stored,
            deflate_level: None,
        }
    }

    /// 尝试从配置文件加载，文件不存在时先生成默认配置文件
    ///
    /// 配置文件格式错误时回退到默认配置。
    pub fn load_or_init<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            if let Err(e) = Self::generate_default_config(path) {
                log::warn!("{}", e);
            }
            return Self::default_config();
        }

        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}，使用默认配置", e);
                Self::default_config()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(level) = self.deflate_level {
            if !(0..=9).contains(&level) {
                return Err(FsError::ConfigError(format!("无效的压缩级别: {}", level)));
            }
        }
        Ok(())
    }

    fn options(&self, compression: Compression, mtime: Option<zip::DateTime>) -> SimpleFileOptions {
        let options = crate::fs::zip_util::entry_options(compression.into(), mtime);
        match compression {
            Compression::Deflated => options.compression_level(self.deflate_level),
            Compression::Stored => options,
        }
    }

    /// 由字节数据写入的条目的选项
    pub fn bytes_options(&self, mtime: Option<zip::DateTime>) -> SimpleFileOptions {
        self.options(self.bytes_compression, mtime)
    }

    /// 由数据流写入的条目的选项
    pub fn stream_options(&self, mtime: Option<zip::DateTime>) -> SimpleFileOptions {
        self.options(self.stream_compression, mtime)
    }
}
