use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::io::{BufRead, BufReader, Read, Write};
use std::marker::PhantomData;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use crate::cache::CacheError;
use crate::cache::backend::CacheBackend;
use crate::common::constants::{CACHE_LOCK_KEY, CACHE_LOCK_TIMEOUT, MAX_NETWORK_KEY_LEN};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Maps a cache key to a memcached key: namespaced, without spaces or
/// control characters, and at most 250 bytes long.
pub fn network_key(namespace: &str, key: &str) -> String {
    let mut escaped = String::with_capacity(namespace.len() + key.len() + 1);
    escaped.push_str(namespace);
    escaped.push(':');
    for c in key.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ' ' => escaped.push_str("%20"),
            c if c.is_control() => escaped.push_str(&format!("%{:02X}", c as u32)),
            c => escaped.push(c),
        }
    }

    if escaped.len() <= MAX_NETWORK_KEY_LEN {
        return escaped;
    }
    let digest = Sha256::digest(key.as_bytes());
    format!("{}:sha256:{}", namespace, hex::encode(digest))
}

struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Connection {
    fn open(addr: &str) -> Result<Self, CacheError> {
        let connect_err = |source| CacheError::Connect {
            addr: addr.to_string(),
            source,
        };
        let mut last_err = None;
        for sock in addr.to_socket_addrs().map_err(connect_err)? {
            match TcpStream::connect_timeout(&sock, CONNECT_TIMEOUT) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(IO_TIMEOUT))?;
                    stream.set_write_timeout(Some(IO_TIMEOUT))?;
                    stream.set_nodelay(true)?;
                    let writer = stream.try_clone()?;
                    return Ok(Self {
                        reader: BufReader::new(stream),
                        writer,
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(connect_err(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved")
        })))
    }

    fn read_line(&mut self) -> Result<String, CacheError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(CacheError::Protocol("connection closed".to_string()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn send(&mut self, header: &str, body: Option<&[u8]>) -> Result<(), CacheError> {
        self.writer.write_all(header.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        if let Some(body) = body {
            self.writer.write_all(body)?;
            self.writer.write_all(b"\r\n")?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.send(&format!("get {key}"), None)?;
        let line = self.read_line()?;
        if line == "END" {
            return Ok(None);
        }

        let parts: Vec<&str> = line.split(' ').collect();
        if parts.len() < 4 || parts[0] != "VALUE" {
            return Err(CacheError::Protocol(format!("unexpected reply to get: {line}")));
        }
        let len: usize = parts[3]
            .parse()
            .map_err(|_| CacheError::Protocol(format!("bad value length: {line}")))?;

        let mut data = vec![0u8; len + 2];
        self.reader.read_exact(&mut data)?;
        data.truncate(len);

        let end = self.read_line()?;
        if end != "END" {
            return Err(CacheError::Protocol(format!("missing END after value: {end}")));
        }
        Ok(Some(data))
    }

    /// `set` or `add`. Returns whether the value was stored.
    fn store(&mut self, command: &str, key: &str, data: &[u8], exptime: u64) -> Result<bool, CacheError> {
        self.send(&format!("{command} {key} 0 {exptime} {}", data.len()), Some(data))?;
        match self.read_line()?.as_str() {
            "STORED" => Ok(true),
            "NOT_STORED" => Ok(false),
            other => Err(CacheError::Protocol(format!("unexpected reply to {command}: {other}"))),
        }
    }

    fn delete(&mut self, key: &str) -> Result<bool, CacheError> {
        self.send(&format!("delete {key}"), None)?;
        match self.read_line()?.as_str() {
            "DELETED" => Ok(true),
            "NOT_FOUND" => Ok(false),
            other => Err(CacheError::Protocol(format!("unexpected reply to delete: {other}"))),
        }
    }

    fn flush_all(&mut self) -> Result<(), CacheError> {
        self.send("flush_all", None)?;
        match self.read_line()?.as_str() {
            "OK" => Ok(()),
            other => Err(CacheError::Protocol(format!("unexpected reply to flush_all: {other}"))),
        }
    }
}

/// Writes held back while paused.
struct Batch<V> {
    depth: u32,
    pending: HashMap<String, Option<(V, u64)>>,
    blocked: bool,
}

/// A cache shared between processes through a memcached server.
///
/// Values travel as JSON. While paused, writes are kept in a local pending
/// map (and served from it) until the outermost `resume` or an explicit
/// `flush`.
pub struct MemcachedCache<V> {
    addr: String,
    namespace: String,
    conn: Mutex<Connection>,
    batch: Mutex<Batch<V>>,
    block_attempts: u32,
    backoff: Duration,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Debug for MemcachedCache<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemcachedCache")
            .field("addr", &self.addr)
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl<V> MemcachedCache<V> {
    /// Connects to `host:port`, retrying up to `retries` extra times.
    pub fn connect(
        host: &str,
        port: u16,
        namespace: &str,
        retries: u32,
        block_attempts: u32,
        backoff: Duration,
    ) -> Result<Self, CacheError> {
        let addr = format!("{host}:{port}");
        let mut attempt = 0;
        let conn = loop {
            match Connection::open(&addr) {
                Ok(conn) => break conn,
                Err(e) if attempt < retries => {
                    attempt += 1;
                    debug!("Connecting to memcached at {} failed ({}), retry {}/{}", addr, e, attempt, retries);
                    thread::sleep(Duration::from_millis(100 * u64::from(attempt)));
                }
                Err(e) => return Err(e),
            }
        };
        debug!("Connected to memcached at {} for namespace '{}'", addr, namespace);

        Ok(Self {
            addr,
            namespace: namespace.to_string(),
            conn: Mutex::new(conn),
            batch: Mutex::new(Batch {
                depth: 0,
                pending: HashMap::new(),
                blocked: false,
            }),
            block_attempts: block_attempts.max(1),
            backoff,
            _marker: PhantomData,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn batch(&self) -> MutexGuard<'_, Batch<V>> {
        self.batch.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn key(&self, key: &str) -> String {
        network_key(&self.namespace, key)
    }

    fn lock_key(&self) -> String {
        // 锁键不带命名空间，所有缓存实例共享同一把锁
        CACHE_LOCK_KEY.to_string()
    }
}

impl<V> MemcachedCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn write_through(&self, key: &str, value: &V, lifetime: u64) -> Result<(), CacheError> {
        let data = serde_json::to_vec(value)?;
        self.conn().store("set", &self.key(key), &data, lifetime)?;
        Ok(())
    }

    fn write_pending(&self, pending: HashMap<String, Option<(V, u64)>>) -> Result<(), CacheError> {
        let count = pending.len();
        for (key, entry) in pending {
            match entry {
                Some((value, lifetime)) => self.write_through(&key, &value, lifetime)?,
                None => {
                    self.conn().delete(&self.key(&key))?;
                }
            }
        }
        if count > 0 {
            debug!("Flushed {} deferred writes to memcached namespace '{}'", count, self.namespace);
        }
        Ok(())
    }
}

impl<V> CacheBackend<V> for MemcachedCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        if let Some(entry) = self.batch().pending.get(key) {
            return Ok(entry.as_ref().map(|(value, _)| value.clone()));
        }
        match self.conn().get(&self.key(key))? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: V, lifetime: u64) -> Result<(), CacheError> {
        {
            let mut batch = self.batch();
            if batch.depth > 0 {
                batch.pending.insert(key.to_string(), Some((value, lifetime)));
                return Ok(());
            }
        }
        self.write_through(key, &value, lifetime)
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        {
            let mut batch = self.batch();
            if batch.depth > 0 {
                let had = matches!(batch.pending.insert(key.to_string(), None), Some(Some(_)));
                return Ok(had);
            }
        }
        self.conn().delete(&self.key(key))
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.batch().pending.clear();
        self.conn().flush_all()
    }

    fn len(&self) -> Option<usize> {
        None
    }

    fn kind(&self) -> &'static str {
        "memcached"
    }

    fn pause(&self) {
        self.batch().depth += 1;
    }

    fn resume(&self) -> Result<(), CacheError> {
        let pending = {
            let mut batch = self.batch();
            batch.depth = batch.depth.saturating_sub(1);
            if batch.depth > 0 {
                return Ok(());
            }
            std::mem::take(&mut batch.pending)
        };
        self.write_pending(pending)
    }

    fn is_paused(&self) -> bool {
        self.batch().depth > 0
    }

    fn block(&self) -> Result<bool, CacheError> {
        if self.batch().blocked {
            return Ok(true);
        }
        let lock_key = self.lock_key();
        for attempt in 0..self.block_attempts {
            if self.conn().store("add", &lock_key, b"1", CACHE_LOCK_TIMEOUT)? {
                self.batch().blocked = true;
                debug!("Acquired memcached batch lock at {}", self.addr);
                return Ok(true);
            }
            if attempt + 1 < self.block_attempts {
                thread::sleep(self.backoff * 2u32.saturating_pow(attempt));
            }
        }
        warn!(
            "Could not acquire memcached batch lock at {} after {} attempts; continuing without it",
            self.addr, self.block_attempts
        );
        Ok(false)
    }

    fn unblock(&self, flush: bool) -> Result<(), CacheError> {
        if flush {
            self.flush()?;
        }
        let held = std::mem::replace(&mut self.batch().blocked, false);
        if held {
            self.conn().delete(&self.lock_key())?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), CacheError> {
        let pending = std::mem::take(&mut self.batch().pending);
        self.write_pending(pending)
    }
}
