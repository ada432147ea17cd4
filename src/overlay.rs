use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use log::{debug, info};
use nix::mount::{mount, umount2, MntFlags, MsFlags};

use crate::errors::{EmberError, Result};

/// overlay 联合挂载参数
///
/// lower_dirs 按层序排列，下标越大层越新；写入全部落在 upper_dir，
/// 只读层永不被修改。
#[derive(Debug, Clone)]
pub struct MountSpec {
    pub lower_dirs: Vec<PathBuf>,
    pub upper_dir: PathBuf,
    pub work_dir: PathBuf,
    pub mount_dir: PathBuf,
}

/// 组装 overlayfs 挂载选项
///
/// overlayfs 的 lowerdir 从左到右优先级递减，因此这里把高下标层
/// 排在最前，保证新层遮盖旧层的同名文件。
pub fn mount_options(spec: &MountSpec) -> String {
    let lowers: Vec<&str> = spec
        .lower_dirs
        .iter()
        .rev()
        .filter_map(|p| p.to_str())
        .collect();
    format!(
        "lowerdir={},upperdir={},workdir={}",
        lowers.join(":"),
        spec.upper_dir.display(),
        spec.work_dir.display()
    )
}

/// 创建 upper/work/mount 目录，可重复调用
pub fn ensure_dirs(spec: &MountSpec) -> Result<()> {
    for d in [&spec.upper_dir, &spec.work_dir, &spec.mount_dir] {
        create_dir_all(d)?;
    }
    Ok(())
}

/// 组合联合挂载：准备目录后执行单次 overlay mount
pub fn prepare(spec: &MountSpec) -> Result<()> {
    ensure_dirs(spec)?;
    let opts = mount_options(spec);
    debug!("overlay 挂载选项: {}", opts);
    mount(
        Some("overlay"),
        &spec.mount_dir,
        Some("overlay"),
        MsFlags::empty(),
        Some(opts.as_str()),
    )
    .map_err(|e| {
        EmberError::Mount(format!(
            "mount overlay 到 {} 失败: {}",
            spec.mount_dir.display(),
            e
        ))
    })?;
    info!("联合挂载完成: {}", spec.mount_dir.display());
    Ok(())
}

/// 解除联合挂载
pub fn unmount(mount_dir: &Path) -> Result<()> {
    umount2(mount_dir, MntFlags::empty()).map_err(|e| {
        EmberError::Mount(format!("umount {} 失败: {}", mount_dir.display(), e))
    })
}
