use log::info;

use crate::errors::Result;
use crate::state::Registry;
use crate::paths;

pub struct PsCommand {}

impl PsCommand {
    pub fn new() -> Self {
        Self {}
    }
}

impl super::Command for PsCommand {
    fn execute(&self) -> Result<()> {
        info!("列出所有容器");

        let data_root = paths::data_root();
        paths::ensure_dirs(&data_root)?;
        let registry = Registry::new(paths::containers_root(&data_root));
        let records = registry.list()?;

        if records.is_empty() {
            println!("没有找到任何容器");
            return Ok(());
        }

        println!(
            "{:<14} {:<14} {:<8} {:<9} {:<16} {:<30}",
            "CONTAINER ID", "IMAGE", "PID", "STATUS", "IP", "COMMAND"
        );
        println!("{}", "-".repeat(94));

        for rec in records {
            let status = format!("{:?}", rec.status).to_lowercase();
            let ip = if rec.ip.is_empty() { "-" } else { rec.ip.as_str() };
            let mut command = rec.command.clone();
            if !rec.args.is_empty() {
                command = format!("{} {}", command, rec.args.join(" "));
            }
            let command_display = if command.len() > 27 {
                format!("{}...", &command[..24])
            } else {
                command
            };
            println!(
                "{:<14} {:<14} {:<8} {:<9} {:<16} {:<30}",
                rec.id, rec.image, rec.pid, status, ip, command_display
            );
        }

        Ok(())
    }
}

impl Default for PsCommand {
    fn default() -> Self {
        Self::new()
    }
}
