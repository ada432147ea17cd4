pub mod init;

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};

use chrono::Utc;
use log::{debug, info, warn};
use nix::sched::CloneFlags;
use scopeguard::ScopeGuard;

use crate::cgroups::{CgroupGovernor, Limits};
use crate::errors::{EmberError, Result};
use crate::network::PluginRegistry;
use crate::overlay::{self, MountSpec};
use crate::state::{ContainerRecord, Registry, Status};
use crate::{id, image, paths};

/// 一次容器创建请求
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub image: String,
    pub command: String,
    pub args: Vec<String>,
    pub hostname: String,
    pub net_plugin: Option<String>,
    pub limits: Limits,
}

/// 容器生命周期总控
///
/// 生命周期严格按序执行：解析镜像层 -> 组合联合挂载 -> 在新
/// namespace 中启动进程 -> 施加资源限制与网络（尽力而为）->
/// 持久化 running 记录 -> 阻塞等待退出并落盘终态。前三步任何
/// 失败都在进程存在之前中止创建。
pub struct Supervisor {
    data_root: PathBuf,
    registry: Registry,
    governor: CgroupGovernor,
    plugins: PluginRegistry,
}

impl Supervisor {
    pub fn new(data_root: PathBuf, governor: CgroupGovernor, plugins: PluginRegistry) -> Self {
        let registry = Registry::new(paths::containers_root(&data_root));
        Self {
            data_root,
            registry,
            governor,
            plugins,
        }
    }

    /// 运行容器直到进程退出，返回用户命令的退出码
    pub fn run(&self, spec: &RunSpec) -> Result<i32> {
        paths::ensure_dirs(&self.data_root)?;
        let container_id = id::generate();
        info!("创建容器 {} (镜像 {})", container_id, spec.image);

        // 1. 解析镜像层
        let lowers = image::resolve_layers(&paths::images_root(&self.data_root), &spec.image)?;

        // 2. 组合根文件系统
        let container_root = paths::containers_root(&self.data_root).join(&container_id);
        let mount_spec = MountSpec {
            lower_dirs: lowers,
            upper_dir: container_root.join("upper"),
            work_dir: container_root.join("work"),
            mount_dir: container_root.join("rootfs"),
        };
        overlay::prepare(&mount_spec)?;
        // spawn 失败时回收刚建立的挂载，避免留下孤悬的 overlay
        let mount_guard = scopeguard::guard(mount_spec.mount_dir.clone(), |dir| {
            if let Err(e) = overlay::unmount(&dir) {
                warn!("回收联合挂载失败: {}", e);
            }
        });

        // 3. 重入自身，在全新 namespace 中执行 phase-2 init
        let mut child = self.spawn_init(&mount_spec.mount_dir, spec)?;
        let pid = child.id() as i32;
        // 进程已起，挂载归容器所有
        let _ = ScopeGuard::into_inner(mount_guard);
        info!("容器 {} 进程已启动, PID: {}", container_id, pid);

        // 4. 资源限制与网络尽力而为，失败不拖垮已运行的进程
        if let Err(e) = self.governor.apply(&container_id, pid, &spec.limits) {
            warn!("容器 {} 资源限制未完全生效: {}", container_id, e);
        }
        let ip = self.setup_network(&container_id, pid, spec);

        // 5. 持久化 running 记录，写失败只告警
        let mut record = ContainerRecord {
            id: container_id.clone(),
            image: spec.image.clone(),
            pid,
            command: spec.command.clone(),
            args: spec.args.clone(),
            created_at: Utc::now(),
            hostname: spec.hostname.clone(),
            ip,
            status: Status::Running,
            mount_dir: mount_spec.mount_dir.display().to_string(),
        };
        if let Err(e) = self.registry.save(&record) {
            warn!("容器 {} 状态写入失败: {}", container_id, e);
        }

        // 6. 阻塞等待退出，把终态写回注册表
        let code = match child.wait() {
            Ok(status) => exit_code(status),
            Err(e) => {
                record.status = Status::Failed;
                let _ = self.registry.save(&record);
                return Err(EmberError::Spawn(format!("等待容器进程失败: {}", e)));
            }
        };
        record.status = Status::Exited;
        if let Err(e) = self.registry.save(&record) {
            warn!("容器 {} 终态写入失败: {}", container_id, e);
        }
        if let Err(e) = self.governor.remove(&container_id) {
            debug!("清理容器 {} 的 cgroup 失败: {}", container_id, e);
        }
        info!("容器 {} 退出，退出码: {}", container_id, code);
        Ok(code)
    }

    fn spawn_init(&self, mount_dir: &Path, spec: &RunSpec) -> Result<Child> {
        let mut cmd = Command::new("/proc/self/exe");
        cmd.arg("init")
            .arg("--rootfs")
            .arg(mount_dir)
            .arg("--cmd")
            .arg(&spec.command)
            .arg("--hostname")
            .arg(&spec.hostname)
            .arg("--")
            .args(&spec.args);
        let flags = CloneFlags::CLONE_NEWUTS
            | CloneFlags::CLONE_NEWPID
            | CloneFlags::CLONE_NEWNS
            | CloneFlags::CLONE_NEWNET;
        unsafe {
            use std::os::unix::process::CommandExt;
            cmd.pre_exec(move || {
                nix::sched::unshare(flags)
                    .map_err(|e| std::io::Error::from_raw_os_error(e as i32))
            });
        }
        cmd.spawn().map_err(|e| EmberError::Spawn(e.to_string()))
    }

    fn setup_network(&self, container_id: &str, pid: i32, spec: &RunSpec) -> String {
        let Some(name) = &spec.net_plugin else {
            return String::new();
        };
        match self.plugins.get(name) {
            Some(plugin) => match plugin.setup(container_id, pid) {
                Ok(ip) => ip,
                Err(e) => {
                    warn!("容器 {} 网络配置失败，继续无网络运行: {}", container_id, e);
                    String::new()
                }
            },
            None => {
                // 未注册的插件名按"无网络"处理
                info!("网络插件 {} 未注册，跳过配网", name);
                String::new()
            }
        }
    }
}

/// 进程退出状态折算为退出码，被信号终止按 128+signo
pub fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        // wait 状态字高字节是退出码
        assert_eq!(exit_code(ExitStatus::from_raw(0x0f00)), 15);
        // 被 SIGKILL 终止
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
    }

    #[test]
    fn test_run_unknown_image_fails_before_spawn() {
        let tmp = tempfile::tempdir().unwrap();
        let data_root = tmp.path().to_path_buf();
        let sup = Supervisor::new(
            data_root.clone(),
            CgroupGovernor::new(tmp.path().join("cgroup")),
            PluginRegistry::new(),
        );
        let spec = RunSpec {
            image: "ghost".to_string(),
            command: "/bin/true".to_string(),
            args: vec![],
            hostname: "ember".to_string(),
            net_plugin: None,
            limits: Limits::default(),
        };
        match sup.run(&spec) {
            Err(EmberError::ImageNotFound(name)) => assert_eq!(name, "ghost"),
            other => panic!("expected ImageNotFound, got {:?}", other.map(|_| ())),
        }
        // 没有任何容器记录产生
        assert!(Registry::new(paths::containers_root(&data_root))
            .list()
            .unwrap()
            .is_empty());
    }
}
