use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};
use crate::archive::{Archive, ArchiveConfig, HoldingsRoot};
use crate::cache::CacheManager;
use crate::common::constants::HOLDINGS_DIR;
use crate::file::SegmentPatterns;
use crate::rules::base::base_bundle;
use crate::rules::{RuleError, RuleRegistry};
use crate::shelf::ShelfStore;
use crate::utils::path::{probe_case_resolver, CaseInsensitive, CaseSensitive, PathCaseResolver};

/// Defines errors that can occur when opening an archive.
//
// // 定义在打开归档时可能发生的错误。
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// The configuration file does not exist.
    //
    // // 配置文件不存在。
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// An I/O error occurred while reading the configuration file.
    //
    // // 读取配置文件时发生 I/O 错误。
    #[error("Failed to read configuration file: {0}")]
    ConfigReadError(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    //
    // // 解析配置文件失败。
    #[error("Failed to parse configuration file: {0}")]
    ConfigParseError(#[from] serde_json::Error),

    /// A configured holdings root is not a directory named `holdings`.
    //
    // // 配置的 holdings 根目录名称不是 `holdings`。
    #[error("Holdings root must be a directory named '{HOLDINGS_DIR}': {0}")]
    BadHoldingsRoot(PathBuf),

    /// A dataset rule table failed to compile.
    //
    // // 数据集规则表编译失败。
    #[error("Invalid dataset rules: {0}")]
    Rules(#[from] RuleError),

    /// The built-in segment classifiers failed to compile.
    //
    // // 内置的路径段分类器编译失败。
    #[error("Invalid segment pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// 读取配置文件并打开归档。
pub fn open_archive(config_path: &Path) -> Result<Archive, OpenError> {
    if !config_path.is_file() {
        return Err(OpenError::ConfigNotFound(config_path.to_path_buf()));
    }
    let content = fs::read_to_string(config_path)?;
    let mut config: ArchiveConfig = serde_json::from_str(&content)?;

    // 相对路径以配置文件所在目录为基准
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    for holdings in config.holdings.iter_mut() {
        if holdings.is_relative() {
            *holdings = base.join(&*holdings);
        }
    }
    if let Some(log_root) = config.log_root.as_mut() {
        if log_root.is_relative() {
            *log_root = base.join(&*log_root);
        }
    }

    debug!("Loaded archive configuration from {:?}", config_path);
    build_archive(config)
}

/// 根据配置构建归档。
pub fn build_archive(config: ArchiveConfig) -> Result<Archive, OpenError> {
    let mut roots = Vec::with_capacity(config.holdings.len());
    for (index, holdings) in config.holdings.iter().enumerate() {
        let is_holdings = holdings.file_name().is_some_and(|name| name == HOLDINGS_DIR);
        if !is_holdings {
            return Err(OpenError::BadHoldingsRoot(holdings.clone()));
        }
        roots.push(HoldingsRoot::new(index, holdings.clone()));
    }

    let mut rules = RuleRegistry::new(base_bundle()?);
    for dataset in &config.datasets {
        rules.register(&dataset.volset_pattern, dataset.compile()?)?;
        debug!("Registered rules '{}' for {}", dataset.name, dataset.volset_pattern);
    }

    let case = choose_case_resolver(config.case_insensitive, roots.first());
    let cache = CacheManager::from_config(&config.cache, config.lifetimes, config.block);
    let shelves = ShelfStore::new(config.shelves.cache_size, config.shelves.cache_slop);

    info!(
        "Opened archive with {} holdings root(s), {} cache, {} dataset rule table(s)",
        roots.len(),
        cache.backend_kind(),
        rules.len()
    );

    Ok(Archive {
        roots: RwLock::new(roots),
        patterns: SegmentPatterns::new()?,
        cache,
        shelves,
        rules,
        case,
        config,
    })
}

fn choose_case_resolver(forced: Option<bool>, first: Option<&HoldingsRoot>) -> Box<dyn PathCaseResolver> {
    match (forced, first) {
        (Some(true), _) => Box::new(CaseInsensitive),
        (Some(false), _) => Box::new(CaseSensitive),
        (None, Some(root)) if root.holdings.is_dir() => probe_case_resolver(&root.holdings),
        (None, _) => Box::new(CaseSensitive),
    }
}
