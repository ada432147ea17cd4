use log::warn;
use nix::mount::{mount, MsFlags};
use nix::unistd::{chdir, chroot, sethostname};

use crate::errors::{EmberError, Result};

/// phase-2 init 的参数契约：根路径、命令、主机名
#[derive(Debug, Clone)]
pub struct InitSpec {
    pub rootfs: String,
    pub command: String,
    pub hostname: String,
    pub args: Vec<String>,
}

/// 在新 namespace 内完成容器初始化并运行用户命令
///
/// 调用时进程已经由 phase-1 放进了全新的 UTS/PID/mount/net
/// namespace：这里切换根文件系统、挂新的 proc、设置主机名，最后
/// 以继承的标准流运行用户命令，返回其退出码。
pub fn run(spec: &InitSpec) -> Result<i32> {
    chroot(spec.rootfs.as_str())?;
    chdir("/")?;

    std::fs::create_dir_all("/proc")?;
    mount(
        Some("proc"),
        "/proc",
        Some("proc"),
        MsFlags::empty(),
        None::<&str>,
    )
    .map_err(|e| EmberError::Mount(format!("mount proc 失败: {}", e)))?;

    if !spec.hostname.is_empty() {
        if let Err(e) = sethostname(&spec.hostname) {
            warn!("设置主机名 {} 失败: {}", spec.hostname, e);
        }
    }

    let status = std::process::Command::new(&spec.command)
        .args(&spec.args)
        .status()
        .map_err(|e| EmberError::Spawn(format!("{}: {}", spec.command, e)))?;
    Ok(super::exit_code(status))
}
