#![allow(unknown_lints)]

use clap::{Parser, Subcommand};
use std::process;

mod cgroups;
mod commands;
mod container;
mod errors;
mod id;
mod image;
mod logger;
mod netpool;
mod network;
mod overlay;
mod paths;
mod state;

use commands::Command;

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Ember 容器引擎")]
#[command(version = "0.2.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a container from a local image
    Run {
        /// Image name
        #[arg(long)]
        image: String,
        /// Command to execute in container
        #[arg(long, default_value = "/bin/sh")]
        cmd: String,
        /// UTS hostname inside container
        #[arg(long, default_value = "ember")]
        hostname: String,
        /// Optional network plugin name
        #[arg(long)]
        net: Option<String>,
        /// cgroup v2 cpu.max (quota period), empty disables
        #[arg(long, default_value = "100000 100000")]
        cpu: String,
        /// cgroup v2 memory.max, empty disables
        #[arg(long, default_value = "256M")]
        mem: String,
        /// cgroup v2 pids.max, 0 disables
        #[arg(long, default_value_t = 64)]
        pids: u32,
        /// Arguments passed to the command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Build an image from an Emberfile
    Build {
        /// Path to the Emberfile
        #[arg(long, default_value = "Emberfile")]
        file: String,
        /// Image tag
        #[arg(long)]
        tag: String,
    },
    /// Import a docker save tarball as an image
    Pull {
        /// Path to the tarball
        #[arg(long)]
        tar: String,
        /// Image name to register
        #[arg(long)]
        name: String,
    },
    /// List containers
    Ps,
    /// Network pool administration
    Net {
        #[command(subcommand)]
        command: NetCommands,
    },
    /// Internal: phase-2 init inside fresh namespaces
    #[command(hide = true)]
    Init {
        #[arg(long)]
        rootfs: String,
        #[arg(long)]
        cmd: String,
        #[arg(long, default_value = "")]
        hostname: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Subcommand)]
enum NetCommands {
    /// Show pool configuration and assignments
    Ls,
    /// Release a container's address
    Release {
        /// Container ID
        #[arg(long)]
        id: String,
    },
    /// Configure pool CIDR and gateway
    Config {
        /// CIDR (e.g. 10.0.0.0/24)
        #[arg(long)]
        cidr: Option<String>,
        /// Gateway IP (e.g. 10.0.0.1)
        #[arg(long)]
        gateway: Option<String>,
    },
}

fn main() {
    // 初始化日志
    logger::init().unwrap_or_else(|e| {
        eprintln!("初始化日志失败: {}", e);
        process::exit(1);
    });

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            image,
            cmd,
            hostname,
            net,
            cpu,
            mem,
            pids,
            args,
        } => {
            let cmd = commands::run::RunCommand {
                image,
                cmd,
                args,
                hostname,
                net,
                cpu,
                mem,
                pids,
            };
            cmd.execute()
        }
        Commands::Build { file, tag } => {
            let cmd = commands::build::BuildCommand { file, tag };
            cmd.execute()
        }
        Commands::Pull { tar, name } => {
            let cmd = commands::pull::PullCommand { tar, name };
            cmd.execute()
        }
        Commands::Ps => {
            let cmd = commands::ps::PsCommand::new();
            cmd.execute()
        }
        Commands::Net { command } => match command {
            NetCommands::Ls => commands::net::NetLsCommand {}.execute(),
            NetCommands::Release { id } => commands::net::NetReleaseCommand { id }.execute(),
            NetCommands::Config { cidr, gateway } => {
                commands::net::NetConfigCommand { cidr, gateway }.execute()
            }
        },
        Commands::Init {
            rootfs,
            cmd,
            hostname,
            args,
        } => {
            let cmd = commands::init::InitCommand {
                rootfs,
                cmd,
                hostname,
                args,
            };
            cmd.execute()
        }
    };

    if let Err(e) = result {
        eprintln!("错误: {}", e);
        process::exit(1);
    }
}
