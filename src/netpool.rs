use std::collections::BTreeMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::{EmberError, Result};

const DEFAULT_CIDR: &str = "10.0.0.0/24";
const DEFAULT_GATEWAY: &str = "10.0.0.1";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PoolFile {
    cidr: String,
    gateway: String,
    assignments: BTreeMap<String, String>,
}

impl Default for PoolFile {
    fn default() -> Self {
        Self {
            cidr: DEFAULT_CIDR.to_string(),
            gateway: DEFAULT_GATEWAY.to_string(),
            assignments: BTreeMap::new(),
        }
    }
}

/// 容器网络地址池
///
/// 显式持有自己的锁和缓存：首次访问惰性加载落盘文件（缺失则写入
/// 默认配置），此后整个进程生命周期内缓存于内存；每次变更在释放锁
/// 之前落盘，进程内的后续调用观察不到内存与文件的不一致。
///
/// 注意：文件没有跨进程锁，多个进程并发操作同一个池文件可能互相
/// 覆盖，这是已知限制。
pub struct NetPool {
    file: PathBuf,
    inner: Mutex<Option<PoolFile>>,
}

impl NetPool {
    pub fn new(file: PathBuf) -> Self {
        Self {
            file,
            inner: Mutex::new(None),
        }
    }

    /// 为容器分配地址；已有分配时原样返回（幂等）
    ///
    /// 按配置 CIDR 的主机地址升序扫描，跳过网关和已占用地址，
    /// 取第一个空闲地址并立即落盘。
    pub fn allocate(&self, container_id: &str) -> Result<String> {
        let mut guard = self.inner.lock().unwrap();
        let data = self.ensure_loaded(&mut guard)?;

        if let Some(ip) = data.assignments.get(container_id) {
            if !ip.is_empty() {
                debug!("复用已分配地址 {} -> {}", container_id, ip);
                return Ok(ip.clone());
            }
        }

        let (network, broadcast) = parse_cidr(&data.cidr)?;
        for n in network.saturating_add(1)..broadcast {
            let ip = Ipv4Addr::from(n).to_string();
            if ip == data.gateway {
                continue;
            }
            if data.assignments.values().any(|v| v.trim() == ip) {
                continue;
            }
            data.assignments.insert(container_id.to_string(), ip.clone());
            self.save(data)?;
            info!("分配地址 {} -> {}", container_id, ip);
            return Ok(ip);
        }
        Err(EmberError::PoolExhausted(data.cidr.clone()))
    }

    /// 释放容器的地址分配；不存在时不是错误
    pub fn release(&self, container_id: &str) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        let data = self.ensure_loaded(&mut guard)?;
        data.assignments.remove(container_id);
        self.save(data)
    }

    /// 修改池的 CIDR/网关，已有分配保持不动
    ///
    /// 落在新范围之外的旧分配只是逻辑过期，不会被清理。
    pub fn set_cidr_gateway(&self, cidr: Option<&str>, gateway: Option<&str>) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        let data = self.ensure_loaded(&mut guard)?;
        if let Some(cidr) = cidr.filter(|s| !s.is_empty()) {
            parse_cidr(cidr)?;
            data.cidr = cidr.to_string();
        }
        if let Some(gw) = gateway.filter(|s| !s.is_empty()) {
            data.gateway = gw.to_string();
        }
        self.save(data)
    }

    pub fn cidr(&self) -> Result<String> {
        let mut guard = self.inner.lock().unwrap();
        let data = self.ensure_loaded(&mut guard)?;
        Ok(data.cidr.clone())
    }

    pub fn gateway(&self) -> Result<String> {
        let mut guard = self.inner.lock().unwrap();
        let data = self.ensure_loaded(&mut guard)?;
        Ok(data.gateway.clone())
    }

    /// 当前全部分配，net ls 用
    pub fn assignments(&self) -> Result<BTreeMap<String, String>> {
        let mut guard = self.inner.lock().unwrap();
        let data = self.ensure_loaded(&mut guard)?;
        Ok(data.assignments.clone())
    }

    fn ensure_loaded<'a>(
        &self,
        guard: &'a mut Option<PoolFile>,
    ) -> Result<&'a mut PoolFile> {
        if guard.is_none() {
            if let Some(parent) = self.file.parent() {
                fs::create_dir_all(parent)?;
            }
            let data = match fs::read(&self.file) {
                Ok(bytes) => serde_json::from_slice(&bytes)?,
                Err(_) => {
                    let data = PoolFile::default();
                    self.save(&data)?;
                    data
                }
            };
            *guard = Some(data);
        }
        Ok(guard.as_mut().unwrap())
    }

    fn save(&self, data: &PoolFile) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&self.file, bytes)?;
        Ok(())
    }
}

/// 解析 CIDR，返回 (网络地址, 广播地址)
fn parse_cidr(cidr: &str) -> Result<(u32, u32)> {
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| EmberError::InvalidSpec(format!("无效 CIDR: {}", cidr)))?;
    let ip: Ipv4Addr = addr
        .parse()
        .map_err(|_| EmberError::InvalidSpec(format!("无效 CIDR 地址: {}", cidr)))?;
    let prefix: u32 = prefix
        .parse()
        .map_err(|_| EmberError::InvalidSpec(format!("无效 CIDR 前缀: {}", cidr)))?;
    if prefix > 32 {
        return Err(EmberError::InvalidSpec(format!("无效 CIDR 前缀: {}", cidr)));
    }
    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    let network = u32::from(ip) & mask;
    let broadcast = network | !mask;
    Ok((network, broadcast))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_in(tmp: &tempfile::TempDir) -> NetPool {
        NetPool::new(tmp.path().join("netpool.json"))
    }

    #[test]
    fn test_allocate_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = pool_in(&tmp);
        let ip1 = pool.allocate("a").unwrap();
        let ip2 = pool.allocate("a").unwrap();
        assert_eq!(ip1, ip2);
        pool.release("a").unwrap();
        // 释放后可能拿到同一个地址，但必须仍是合法分配
        let ip3 = pool.allocate("a").unwrap();
        assert!(!ip3.is_empty());
    }

    #[test]
    fn test_allocate_distinct_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = pool_in(&tmp);
        let ip1 = pool.allocate("a").unwrap();
        let ip2 = pool.allocate("b").unwrap();
        assert_ne!(ip1, ip2);
    }

    #[test]
    fn test_gateway_never_assigned() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = pool_in(&tmp);
        let gw = pool.gateway().unwrap();
        for i in 0..8 {
            let ip = pool.allocate(&format!("c{}", i)).unwrap();
            assert_ne!(ip, gw);
        }
    }

    #[test]
    fn test_pool_exhausted() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = pool_in(&tmp);
        // /30 里除网络/广播/网关外只剩一个可分配地址
        pool.set_cidr_gateway(Some("10.0.0.0/30"), Some("10.0.0.1"))
            .unwrap();
        let ip = pool.allocate("a").unwrap();
        assert_eq!(ip, "10.0.0.2");
        match pool.allocate("b") {
            Err(EmberError::PoolExhausted(_)) => {}
            other => panic!("expected PoolExhausted, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_release_unknown_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = pool_in(&tmp);
        pool.release("nope").unwrap();
    }

    #[test]
    fn test_config_persists_and_keeps_assignments() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = pool_in(&tmp);
        let ip = pool.allocate("a").unwrap();
        pool.set_cidr_gateway(Some("10.2.0.0/24"), Some("10.2.0.1"))
            .unwrap();
        assert_eq!(pool.cidr().unwrap(), "10.2.0.0/24");
        assert_eq!(pool.gateway().unwrap(), "10.2.0.1");
        // 旧分配逻辑过期但保留
        assert_eq!(pool.assignments().unwrap().get("a"), Some(&ip));

        // 新实例从文件加载同一份状态
        let pool2 = pool_in(&tmp);
        assert_eq!(pool2.cidr().unwrap(), "10.2.0.0/24");
        assert_eq!(pool2.assignments().unwrap().get("a"), Some(&ip));
    }

    #[test]
    fn test_parse_cidr_rejects_garbage() {
        assert!(parse_cidr("10.0.0.0").is_err());
        assert!(parse_cidr("10.0.0.0/33").is_err());
        assert!(parse_cidr("banana/24").is_err());
        assert_eq!(
            parse_cidr("10.0.0.0/30").unwrap(),
            (0x0a000000, 0x0a000003)
        );
    }
}
