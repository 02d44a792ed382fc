/// Name of the marker directory that identifies a holdings root on a disk.
pub const HOLDINGS_DIR: &str = "holdings";

/// Sibling of `holdings/` holding the per-volume metadata tables.
pub const SHELVES_DIR: &str = "shelves";

/// Default sibling of `holdings/` for validation logs.
pub const LOGS_DIR: &str = "logs";

/// The default configuration file name.
pub const CONFIG_FILE: &str = "pdsfile.json";

// --- 类目 ---
pub const CHECKSUMS_PREFIX: &str = "checksums-";
pub const ARCHIVES_PREFIX: &str = "archives-";

/// Suffix appended to checksum-mirror files.
pub const CHECKSUM_FILE_SUFFIX: &str = "_md5.txt";

/// Suffix appended to archive-mirror files.
pub const ARCHIVE_FILE_SUFFIX: &str = ".tar.gz";

// --- Shelf 句柄缓存 ---
/// Number of shelf tables kept open after a trim.
pub const SHELF_CACHE_SIZE: usize = 160;

/// Extra open tables tolerated before a trim is triggered.
pub const SHELF_CACHE_SLOP: usize = 20;

pub const SHELF_EXT: &str = ".shelf";

/// Table id of the per-volume file information shelf.
pub const INFO_SHELF: &str = "info";

/// Table id of the per-table row index shelf.
pub const INDEX_SHELF: &str = "index";

// --- 缓存 ---
/// Lifetime of cached file nodes below the volume level, in seconds.
pub const DEFAULT_FILE_LIFETIME: u64 = 12 * 60 * 60;

/// Lifetime of cached directory nodes below the volume level, in seconds.
pub const DEFAULT_DIR_LIFETIME: u64 = 36 * 60 * 60;

/// Key used for the distributed cache lock.
pub const CACHE_LOCK_KEY: &str = "$$$BLOCKED$$$";

/// Seconds before an abandoned distributed lock expires by itself.
pub const CACHE_LOCK_TIMEOUT: u64 = 15 * 60;

pub const BLOCK_ATTEMPTS: u32 = 3;
pub const BLOCK_BACKOFF_MILLIS: u64 = 1000;
pub const CONNECT_RETRIES: u32 = 3;

/// Longest key accepted by the memcached text protocol.
pub const MAX_NETWORK_KEY_LEN: usize = 250;

/// Timestamp format embedded in validation log file names.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Format of modification times stored in `info` shelves.
pub const MODTIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
