use anyhow::{anyhow, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref GLOBAL_CONFIG_MANAGER: RwLock<Option<Arc<ConfigManager>>> = RwLock::new(None);
}

/// 默认配置文件 / Default config file
pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
/// 环境变量前缀 / Environment variable prefix (`VWA_SESSION__CREDENTIALS_DIR=...`)
pub const ENV_PREFIX: &str = "VWA";

/// 配置错误类型 / Config error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: String },
    #[error("config key '{key}' not found")]
    KeyNotFound { key: String },
    #[error("config key '{key}' has the wrong type: {message}")]
    TypeConversionError { key: String, message: String },
    #[error("config initialization failed: {message}")]
    InitializationError { message: String },
}

/// 配置数据源信息 / Config source info
#[derive(Debug, Clone)]
pub struct ConfigSourceInfo {
    pub source_type: &'static str,
    pub description: String,
    pub loaded: bool,
}

/// 配置源类型（按添加顺序，后者覆盖前者）
/// Config source kinds (later sources override earlier ones)
pub enum ConfigSource {
    /// 文件配置源 / File source
    File {
        path: String,
        format: Option<FileFormat>,
        required: bool,
    },
    /// 环境变量配置源 / Environment source
    Env {
        prefix: String,
        separator: &'static str,
    },
    /// 内存配置源，键可使用点号路径 / In-memory source, keys may be dotted paths
    Memory(HashMap<String, serde_json::Value>),
    /// 字符串配置源 / Inline string source
    String { content: String, format: FileFormat },
}

impl ConfigSource {
    fn info(&self) -> ConfigSourceInfo {
        match self {
            ConfigSource::File { path, required, .. } => ConfigSourceInfo {
                source_type: "file",
                description: format!("{} (required: {})", path, required),
                loaded: false,
            },
            ConfigSource::Env { prefix, separator } => ConfigSourceInfo {
                source_type: "env",
                description: format!("prefix={} separator={}", prefix, separator),
                loaded: false,
            },
            ConfigSource::Memory(map) => ConfigSourceInfo {
                source_type: "memory",
                description: format!("{} keys", map.len()),
                loaded: false,
            },
            ConfigSource::String { .. } => ConfigSourceInfo {
                source_type: "string",
                description: "inline".to_string(),
                loaded: false,
            },
        }
    }

    fn add_to_builder(
        self,
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<ConfigBuilder<config::builder::DefaultState>> {
        match self {
            ConfigSource::File {
                path,
                format,
                required,
            } => {
                let file = match format {
                    Some(format) => File::with_name(&path).format(format),
                    None => File::with_name(&path),
                };
                Ok(builder.add_source(file.required(required)))
            }
            ConfigSource::Env { prefix, separator } => Ok(builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator(separator)
                    .prefix_separator("_")
                    .try_parsing(true)
                    .ignore_empty(true),
            )),
            ConfigSource::Memory(map) => {
                let json = serde_json::to_string(&nest_dotted_keys(map))
                    .map_err(|e| anyhow!("failed to serialize memory config: {}", e))?;
                Ok(builder.add_source(File::from_str(&json, FileFormat::Json)))
            }
            ConfigSource::String { content, format } => {
                Ok(builder.add_source(File::from_str(&content, format)))
            }
        }
    }
}

/// 将 "a.b.c" 形式的键展开为嵌套对象 / Expand "a.b.c" keys into nested objects
fn nest_dotted_keys(map: HashMap<String, serde_json::Value>) -> serde_json::Value {
    let mut root = serde_json::Map::new();
    for (key, value) in map {
        let mut parts: Vec<&str> = key.split('.').collect();
        let leaf = parts.pop().unwrap_or_default().to_string();
        let mut cursor = &mut root;
        for part in parts {
            let slot = cursor
                .entry(part.to_string())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            if !slot.is_object() {
                *slot = serde_json::Value::Object(serde_json::Map::new());
            }
            cursor = match slot {
                serde_json::Value::Object(inner) => inner,
                _ => unreachable!("slot was just made an object"),
            };
        }
        cursor.insert(leaf, value);
    }
    serde_json::Value::Object(root)
}

/// 配置管理器 / Config manager
pub struct ConfigManager {
    config: Config,
    sources_info: Vec<ConfigSourceInfo>,
}

impl ConfigManager {
    /// 使用默认配置源创建 / Create with default sources
    pub fn new() -> Result<Self> {
        Self::with_sources(vec![])
    }

    /// 指定额外配置源创建：default.toml < extra < 环境变量
    /// Create with extra sources: default.toml < extra < environment
    pub fn with_sources(extra: Vec<ConfigSource>) -> Result<Self> {
        let mut sources = vec![ConfigSource::File {
            path: DEFAULT_CONFIG_FILE.to_string(),
            format: Some(FileFormat::Toml),
            required: false,
        }];
        sources.extend(extra);
        sources.push(ConfigSource::Env {
            prefix: ENV_PREFIX.to_string(),
            separator: "__",
        });
        Self::from_sources(sources)
    }

    /// 仅使用给定配置源（不含默认文件与环境变量）
    /// Use exactly the given sources (no default file, no environment)
    pub fn from_sources(sources: Vec<ConfigSource>) -> Result<Self> {
        let mut builder = Config::builder();
        let mut sources_info = Vec::with_capacity(sources.len());

        for source in sources {
            let mut info = source.info();
            if let ConfigSource::File { path, required, .. } = &source {
                if !std::path::Path::new(path).exists() {
                    if *required {
                        return Err(ConfigError::FileNotFound { path: path.clone() }.into());
                    }
                    // 可选文件不存在，记录但不添加 / Optional file missing: record, skip
                    sources_info.push(info);
                    continue;
                }
            }
            builder = source.add_to_builder(builder)?;
            info.loaded = true;
            sources_info.push(info);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow!("failed to build config: {}", e))?;
        Ok(Self {
            config,
            sources_info,
        })
    }

    /// 获取指定 key 的配置值 / Get value for key
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.config
            .get(key)
            .map_err(|e| anyhow!("failed to read config '{}': {}", key, e))
    }

    /// 获取配置值，不存在或类型不符时返回默认值
    /// Get value, falling back to default when missing or mistyped
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// 返回区分缺失与类型错误的结果 / Distinguish missing keys from type errors
    pub fn get_safe<T: DeserializeOwned>(&self, key: &str) -> std::result::Result<T, ConfigError> {
        self.config.get(key).map_err(|e| match e {
            config::ConfigError::NotFound(_) => ConfigError::KeyNotFound {
                key: key.to_string(),
            },
            other => ConfigError::TypeConversionError {
                key: key.to_string(),
                message: other.to_string(),
            },
        })
    }

    /// 检查配置项是否存在 / Whether key exists
    pub fn exists(&self, key: &str) -> bool {
        self.config.get::<serde_json::Value>(key).is_ok()
    }

    /// 已加载的配置源 / Loaded sources
    pub fn active_sources(&self) -> Vec<&ConfigSourceInfo> {
        self.sources_info.iter().filter(|info| info.loaded).collect()
    }
}

/// 安装全局配置管理器 / Install the global config manager
pub fn install_global_config_manager(manager: ConfigManager) -> Result<Arc<ConfigManager>> {
    let manager = Arc::new(manager);
    let mut slot = GLOBAL_CONFIG_MANAGER
        .write()
        .map_err(|e| anyhow!("global config lock poisoned: {}", e))?;
    *slot = Some(Arc::clone(&manager));
    Ok(manager)
}

/// 获取全局配置管理器实例（未安装时按默认源创建）
/// Get the global config manager (created from default sources if not installed)
pub fn get_global_config_manager() -> Result<Arc<ConfigManager>> {
    {
        let slot = GLOBAL_CONFIG_MANAGER
            .read()
            .map_err(|e| anyhow!("global config lock poisoned: {}", e))?;
        if let Some(manager) = slot.as_ref() {
            return Ok(Arc::clone(manager));
        }
    }
    let mut slot = GLOBAL_CONFIG_MANAGER
        .write()
        .map_err(|e| anyhow!("global config lock poisoned: {}", e))?;
    match slot.as_ref() {
        Some(manager) => Ok(Arc::clone(manager)),
        None => {
            let manager = Arc::new(ConfigManager::new()?);
            *slot = Some(Arc::clone(&manager));
            Ok(manager)
        }
    }
}
