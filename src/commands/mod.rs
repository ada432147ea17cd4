use crate::errors::Result;

pub mod build;
pub mod init;
pub mod net;
pub mod ps;
pub mod pull;
pub mod run;

/// 命令执行的通用trait
pub trait Command {
    /// 执行命令
    fn execute(&self) -> Result<()>;
}
