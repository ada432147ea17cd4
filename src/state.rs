use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{EmberError, Result};

/// 容器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Running,
    Exited,
    Failed,
}

/// 持久化的容器记录，每个容器一个 JSON 文件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainerRecord {
    pub id: String,
    pub image: String,
    pub pid: i32,
    pub command: String,
    pub args: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub hostname: String,
    pub ip: String,
    pub status: Status,
    pub mount_dir: String,
}

/// 容器状态注册表
///
/// 每条记录一个独立文件，同 ID 覆盖写（last-write-wins），无版本。
/// 不加锁：不同 ID 永不触碰同一文件，同 ID 并发写不定序。
#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
}

impl Registry {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    /// 写入一条容器记录，父目录缺失时自动创建
    pub fn save(&self, record: &ContainerRecord) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(EmberError::RegistryIo)?;
        let bytes = serde_json::to_vec_pretty(record)?;
        fs::write(self.record_path(&record.id), bytes).map_err(EmberError::RegistryIo)?;
        debug!("记录已保存: {}", record.id);
        Ok(())
    }

    /// 读出全部可解析的容器记录
    ///
    /// 跳过非 .json 文件与无法解析的记录；只有目录本身不可枚举
    /// 时才报错。
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        let entries = fs::read_dir(&self.root).map_err(EmberError::RegistryIo)?;
        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = match fs::read(&path) {
                Ok(b) => b,
                Err(_) => continue,
            };
            match serde_json::from_slice::<ContainerRecord>(&bytes) {
                Ok(rec) => out.push(rec),
                Err(e) => debug!("跳过无法解析的记录 {}: {}", path.display(), e),
            }
        }
        Ok(out)
    }
}
