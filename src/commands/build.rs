use std::path::Path;

use log::info;

use crate::errors::Result;
use crate::{image, paths};

pub struct BuildCommand {
    pub file: String,
    pub tag: String,
}

impl super::Command for BuildCommand {
    fn execute(&self) -> Result<()> {
        info!("构建镜像: {} <- {}", self.tag, self.file);
        let data_root = paths::data_root();
        paths::ensure_dirs(&data_root)?;
        image::build(Path::new(&self.file), &self.tag, &data_root)
    }
}
