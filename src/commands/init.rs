use crate::container::init::{self, InitSpec};
use crate::errors::Result;

/// phase-2 init 角色：由 run 阶段重入自身触发，永不直接由用户调用
pub struct InitCommand {
    pub rootfs: String,
    pub cmd: String,
    pub hostname: String,
    pub args: Vec<String>,
}

impl super::Command for InitCommand {
    fn execute(&self) -> Result<()> {
        let spec = InitSpec {
            rootfs: self.rootfs.clone(),
            command: self.cmd.clone(),
            hostname: self.hostname.clone(),
            args: self.args.clone(),
        };
        let code = init::run(&spec)?;
        // init 进程直接以用户命令的退出码退出
        std::process::exit(code);
    }
}
