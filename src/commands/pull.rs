use std::path::Path;

use log::info;

use crate::errors::Result;
use crate::{image, paths};

pub struct PullCommand {
    pub tar: String,
    pub name: String,
}

impl super::Command for PullCommand {
    fn execute(&self) -> Result<()> {
        info!("导入镜像: {} <- {}", self.name, self.tar);
        let data_root = paths::data_root();
        paths::ensure_dirs(&data_root)?;
        image::import_docker_save_tar(Path::new(&self.tar), &self.name, &data_root)
    }
}
