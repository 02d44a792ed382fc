#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use pdsfile::archive::ArchiveConfig;
use pdsfile::Archive;
use tempfile::TempDir;

/// 辅助结构：在临时目录中搭建一个或多个 holdings 磁盘。
///
/// 磁盘按名字区分，例如 `fixture.dir("d1", "volumes/ABC_1xxx/ABC_1001")`
/// 会创建 `<tmp>/d1/holdings/volumes/ABC_1xxx/ABC_1001`。
pub struct Holdings {
    pub tmp: TempDir,
    disks: Vec<String>,
}

impl Holdings {
    pub fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
            disks: Vec::new(),
        }
    }

    pub fn root(&self, disk: &str) -> PathBuf {
        self.tmp.path().join(disk).join("holdings")
    }

    fn register(&mut self, disk: &str) {
        if !self.disks.iter().any(|d| d == disk) {
            self.disks.push(disk.to_string());
        }
        fs::create_dir_all(self.root(disk)).unwrap();
    }

    /// 创建目录（含所有父目录），返回其绝对路径。
    pub fn dir(&mut self, disk: &str, logical: &str) -> PathBuf {
        self.register(disk);
        let path = self.root(disk).join(logical);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// 写入文件（自动创建父目录），返回其绝对路径。
    pub fn file(&mut self, disk: &str, logical: &str, content: &str) -> PathBuf {
        self.register(disk);
        let path = self.root(disk).join(logical);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// 按创建顺序列出所有磁盘的配置。
    pub fn config(&self) -> ArchiveConfig {
        let mut config = ArchiveConfig::with_holdings(self.disks.iter().map(|d| self.root(d)));
        config.case_insensitive = Some(false);
        config
    }

    pub fn archive(&self) -> Archive {
        Archive::new(self.config()).unwrap()
    }

    /// 把配置写成 JSON 文件后通过 `Archive::open` 打开。
    pub fn open_with(&self, extra: serde_json::Value) -> Archive {
        let mut value = serde_json::to_value(self.config()).unwrap();
        if let (Some(target), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                target.insert(k.clone(), v.clone());
            }
        }
        let path = self.tmp.path().join("pdsfile.json");
        fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
        Archive::open(&path).unwrap()
    }
}

/// 一个只支持 get/set/add/delete/flush_all 的最小 memcached 服务器。
///
/// 每个连接一个线程，所有连接共享同一张表。返回监听端口。
pub fn spawn_fake_memcached() -> (u16, Arc<Mutex<HashMap<String, Vec<u8>>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let store = Arc::new(Mutex::new(HashMap::new()));

    let shared = Arc::clone(&store);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let store = Arc::clone(&shared);
            thread::spawn(move || serve(stream, store));
        }
    });
    (port, store)
}

fn serve(stream: TcpStream, store: Arc<Mutex<HashMap<String, Vec<u8>>>>) {
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            return;
        }
        let parts: Vec<&str> = line.trim_end().split(' ').collect();
        let reply = match parts.as_slice() {
            ["get", key] => match store.lock().unwrap().get(*key) {
                Some(data) => {
                    let mut out = format!("VALUE {} 0 {}\r\n", key, data.len()).into_bytes();
                    out.extend_from_slice(data);
                    out.extend_from_slice(b"\r\nEND\r\n");
                    out
                }
                None => b"END\r\n".to_vec(),
            },
            [command @ ("set" | "add"), key, _flags, _exptime, len] => {
                let len: usize = len.parse().unwrap();
                let mut data = vec![0u8; len + 2];
                reader.read_exact(&mut data).unwrap();
                data.truncate(len);
                let mut map = store.lock().unwrap();
                if *command == "add" && map.contains_key(*key) {
                    b"NOT_STORED\r\n".to_vec()
                } else {
                    map.insert(key.to_string(), data);
                    b"STORED\r\n".to_vec()
                }
            }
            ["delete", key] => match store.lock().unwrap().remove(*key) {
                Some(_) => b"DELETED\r\n".to_vec(),
                None => b"NOT_FOUND\r\n".to_vec(),
            },
            ["flush_all"] => {
                store.lock().unwrap().clear();
                b"OK\r\n".to_vec()
            }
            _ => b"ERROR\r\n".to_vec(),
        };
        if writer.write_all(&reply).is_err() {
            return;
        }
    }
}
