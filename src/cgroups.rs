use std::fs::{create_dir_all, remove_dir, write};
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, info};

use crate::errors::{EmberError, Result};

/// 容器资源限制，None 表示该维度不约束
#[derive(Debug, Clone, Default)]
pub struct Limits {
    /// cgroup v2 cpu.max，例如 "100000 100000"
    pub cpu_max: Option<String>,
    /// cgroup v2 memory.max，例如 "256M"
    pub memory_max: Option<String>,
    /// cgroup v2 pids.max
    pub pids_max: Option<u32>,
}

impl Limits {
    pub fn is_empty(&self) -> bool {
        self.cpu_max.is_none() && self.memory_max.is_none() && self.pids_max.is_none()
    }
}

type Extract = fn(&Limits) -> Option<String>;

lazy_static! {
    // 维度 -> 限制文件及取值函数，按固定顺序写入
    static ref LIMIT_TABLE: Vec<(&'static str, &'static str, Extract)> = vec![
        ("cpu", "cpu.max", (|l: &Limits| l.cpu_max.clone()) as Extract),
        ("memory", "memory.max", (|l: &Limits| l.memory_max.clone()) as Extract),
        ("pids", "pids.max", (|l: &Limits| l.pids_max.map(|v| v.to_string())) as Extract),
    ];
}

/// cgroup v2 资源管控器
///
/// 每个容器一个专属 group 目录 <root>/ember/<id>；先建目录，再写限制
/// 文件，最后写 cgroup.procs 挂上进程，保证进程入组前限制已就位。
#[derive(Debug, Clone)]
pub struct CgroupGovernor {
    root: PathBuf,
}

impl CgroupGovernor {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// 默认根目录，EMBER_CGROUP_ROOT 可覆盖（测试用）
    pub fn from_env() -> Self {
        let root = std::env::var("EMBER_CGROUP_ROOT")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/sys/fs/cgroup"));
        Self::new(root)
    }

    pub fn group_dir(&self, container_id: &str) -> PathBuf {
        self.root.join("ember").join(container_id)
    }

    /// 应用资源限制并把进程加入 group
    ///
    /// 单个限制写失败时带维度标签返回，已写入的限制不回滚——部分生效
    /// 是被显式接受并上报的结果。
    pub fn apply(&self, container_id: &str, pid: i32, limits: &Limits) -> Result<()> {
        let group = self.group_dir(container_id);
        create_dir_all(&group)?;
        debug!("cgroup 目录就绪: {}", group.display());

        for &(dimension, file, extract) in LIMIT_TABLE.iter() {
            if let Some(value) = extract(limits) {
                write_limit(&group, file, &value).map_err(|e| EmberError::Limit {
                    dimension,
                    source: e,
                })?;
                debug!("{} <- {}", group.join(file).display(), value);
            }
        }

        // 进程挂载必须最后执行
        write_limit(&group, "cgroup.procs", &pid.to_string()).map_err(|e| {
            EmberError::Limit {
                dimension: "membership",
                source: e,
            }
        })?;
        info!("进程 {} 已加入 cgroup: {}", pid, group.display());
        Ok(())
    }

    /// 删除容器的 group 目录，进程退出后调用
    pub fn remove(&self, container_id: &str) -> Result<()> {
        remove_dir(self.group_dir(container_id))?;
        Ok(())
    }
}

fn write_limit(group: &Path, file: &str, value: &str) -> std::io::Result<()> {
    write(group.join(file), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_memory_only() {
        let tmp = tempfile::tempdir().unwrap();
        let gov = CgroupGovernor::new(tmp.path().to_path_buf());
        let limits = Limits {
            memory_max: Some("512M".to_string()),
            ..Default::default()
        };
        gov.apply("c1", std::process::id() as i32, &limits).unwrap();

        let group = gov.group_dir("c1");
        assert!(group.is_dir());
        assert_eq!(std::fs::read_to_string(group.join("memory.max")).unwrap(), "512M");
        assert!(group.join("cgroup.procs").exists());
        // 未设置的维度不产生文件
        assert!(!group.join("cpu.max").exists());
        assert!(!group.join("pids.max").exists());
    }

    #[test]
    fn test_apply_all_limits() {
        let tmp = tempfile::tempdir().unwrap();
        let gov = CgroupGovernor::new(tmp.path().to_path_buf());
        let limits = Limits {
            cpu_max: Some("100000 100000".to_string()),
            memory_max: Some("256M".to_string()),
            pids_max: Some(64),
        };
        gov.apply("c2", 123, &limits).unwrap();

        let group = gov.group_dir("c2");
        assert_eq!(
            std::fs::read_to_string(group.join("cpu.max")).unwrap(),
            "100000 100000"
        );
        assert_eq!(std::fs::read_to_string(group.join("pids.max")).unwrap(), "64");
        assert_eq!(
            std::fs::read_to_string(group.join("cgroup.procs")).unwrap(),
            "123"
        );
    }

    #[test]
    fn test_apply_empty_limits_still_attaches() {
        let tmp = tempfile::tempdir().unwrap();
        let gov = CgroupGovernor::new(tmp.path().to_path_buf());
        gov.apply("c3", 7, &Limits::default()).unwrap();

        let group = gov.group_dir("c3");
        assert!(!group.join("cpu.max").exists());
        assert!(!group.join("memory.max").exists());
        assert!(!group.join("pids.max").exists());
        assert_eq!(
            std::fs::read_to_string(group.join("cgroup.procs")).unwrap(),
            "7"
        );
    }

    #[test]
    fn test_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let gov = CgroupGovernor::new(tmp.path().to_path_buf());
        gov.apply("c4", 1, &Limits::default()).unwrap();
        gov.remove("c4").unwrap_err(); // 目录非空（有文件）时 remove_dir 失败
        std::fs::remove_file(gov.group_dir("c4").join("cgroup.procs")).unwrap();
        gov.remove("c4").unwrap();
        assert!(!gov.group_dir("c4").exists());
    }
}
