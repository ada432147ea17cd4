use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::Result;

/// 数据根目录：EMBER_ROOT > $HOME/.local/share/ember > /var/lib/ember
pub fn data_root() -> PathBuf {
    if let Ok(root) = std::env::var("EMBER_ROOT") {
        if !root.is_empty() {
            return PathBuf::from(root);
        }
    }
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => Path::new(&home)
            .join(".local")
            .join("share")
            .join("ember"),
        _ => PathBuf::from("/var/lib/ember"),
    }
}

pub fn images_root(data_root: &Path) -> PathBuf {
    data_root.join("images")
}

pub fn containers_root(data_root: &Path) -> PathBuf {
    data_root.join("containers")
}

pub fn pool_file(data_root: &Path) -> PathBuf {
    data_root.join("network").join("netpool.json")
}

/// 确保数据目录结构存在，可重复调用
pub fn ensure_dirs(data_root: &Path) -> Result<()> {
    for d in [
        data_root.to_path_buf(),
        images_root(data_root),
        containers_root(data_root),
        data_root.join("network"),
    ] {
        fs::create_dir_all(&d)?;
    }
    Ok(())
}
