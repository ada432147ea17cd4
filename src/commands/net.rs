use log::info;

use crate::errors::Result;
use crate::netpool::NetPool;
use crate::paths;

fn open_pool() -> NetPool {
    NetPool::new(paths::pool_file(&paths::data_root()))
}

/// 打印当前地址分配表
pub struct NetLsCommand {}

impl super::Command for NetLsCommand {
    fn execute(&self) -> Result<()> {
        let pool = open_pool();
        println!("CIDR: {}  GATEWAY: {}", pool.cidr()?, pool.gateway()?);
        println!("{:<14} {}", "ID", "IP");
        for (id, ip) in pool.assignments()? {
            println!("{:<14} {}", id, ip);
        }
        Ok(())
    }
}

/// 释放指定容器的地址分配
pub struct NetReleaseCommand {
    pub id: String,
}

impl super::Command for NetReleaseCommand {
    fn execute(&self) -> Result<()> {
        info!("释放容器 {} 的地址", self.id);
        open_pool().release(&self.id)
    }
}

/// 修改地址池的 CIDR/网关
pub struct NetConfigCommand {
    pub cidr: Option<String>,
    pub gateway: Option<String>,
}

impl super::Command for NetConfigCommand {
    fn execute(&self) -> Result<()> {
        if self.cidr.is_none() && self.gateway.is_none() {
            crate::bail!("net config 需要 --cidr 或 --gateway");
        }
        open_pool().set_cidr_gateway(self.cidr.as_deref(), self.gateway.as_deref())
    }
}
