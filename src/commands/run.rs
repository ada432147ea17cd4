use std::sync::Arc;

use log::info;

use crate::cgroups::{CgroupGovernor, Limits};
use crate::container::{RunSpec, Supervisor};
use crate::errors::Result;
use crate::netpool::NetPool;
use crate::{network, paths};

pub struct RunCommand {
    pub image: String,
    pub cmd: String,
    pub args: Vec<String>,
    pub hostname: String,
    pub net: Option<String>,
    pub cpu: String,
    pub mem: String,
    pub pids: u32,
}

impl super::Command for RunCommand {
    fn execute(&self) -> Result<()> {
        info!("运行容器: 镜像={} 命令={}", self.image, self.cmd);

        let data_root = paths::data_root();
        let pool = Arc::new(NetPool::new(paths::pool_file(&data_root)));
        let plugins = network::builtin_registry(pool);
        let supervisor = Supervisor::new(data_root, CgroupGovernor::from_env(), plugins);

        // 空值/零值表示该维度不约束
        let limits = Limits {
            cpu_max: non_empty(&self.cpu),
            memory_max: non_empty(&self.mem),
            pids_max: (self.pids > 0).then_some(self.pids),
        };
        let spec = RunSpec {
            image: self.image.clone(),
            command: self.cmd.clone(),
            args: self.args.clone(),
            hostname: self.hostname.clone(),
            net_plugin: self.net.clone().filter(|s| !s.is_empty()),
            limits,
        };

        let code = supervisor.run(&spec)?;
        if code != 0 {
            info!("容器命令以非零退出码结束: {}", code);
        }
        Ok(())
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
