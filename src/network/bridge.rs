use std::sync::Arc;

use log::{debug, info};

use super::NetPlugin;
use crate::errors::{EmberError, Result};
use crate::netpool::NetPool;

/// 执行宿主机网络命令的函数，测试时可注入替身
pub type Runner = Box<dyn Fn(&str, &[&str]) -> Result<()> + Send + Sync>;

/// bridge/veth/NAT 网络插件
///
/// Setup 的每一步都是幂等意图操作（先查再改），失败时不回滚：
/// 网桥、NAT 规则属于可被后续容器复用的共享宿主机状态，保留即可。
pub struct BridgePlugin {
    name: &'static str,
    bridge: &'static str,
    pool: Arc<NetPool>,
    runner: Runner,
}

impl BridgePlugin {
    pub fn new(pool: Arc<NetPool>) -> Self {
        Self::with_runner(pool, Box::new(exec_run))
    }

    pub fn with_runner(pool: Arc<NetPool>, runner: Runner) -> Self {
        Self {
            name: "bridge0",
            bridge: "ember0",
            pool,
            runner,
        }
    }

    fn run(&self, argv: &[&str]) -> Result<()> {
        debug!("执行: {}", argv.join(" "));
        (self.runner)(argv[0], &argv[1..])
    }
}

fn provision(step: &'static str) -> impl FnOnce(EmberError) -> EmberError {
    move |e| EmberError::Provision {
        step,
        reason: e.to_string(),
    }
}

fn exec_run(cmd: &str, args: &[&str]) -> Result<()> {
    let out = std::process::Command::new(cmd).args(args).output()?;
    if !out.status.success() {
        crate::bail!(
            "{} {}: {}",
            cmd,
            args.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(())
}

impl NetPlugin for BridgePlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn setup(&self, container_id: &str, pid: i32) -> Result<String> {
        let gateway = self.pool.gateway()?;
        let cidr = self.pool.cidr()?;
        let prefix = cidr.split('/').nth(1).unwrap_or("24");
        let br = self.bridge;

        // 确保网桥存在且 up（先查后建）
        if self.run(&["ip", "link", "show", br]).is_err() {
            self.run(&["ip", "link", "add", "name", br, "type", "bridge"])
                .map_err(provision("bridge"))?;
            // 地址已存在则忽略
            let gw_cidr = format!("{}/{}", gateway, prefix);
            let _ = self.run(&["ip", "addr", "add", gw_cidr.as_str(), "dev", br]);
            self.run(&["ip", "link", "set", br, "up"])
                .map_err(provision("bridge"))?;
        }

        let short = &container_id[..container_id.len().min(8)];
        let host_if = format!("veth-{}-h", short);
        let ct_if = format!("veth-{}-c", short);
        let pid_s = pid.to_string();

        self.run(&[
            "ip", "link", "add", host_if.as_str(), "type", "veth", "peer", "name", ct_if.as_str(),
        ])
        .map_err(provision("veth"))?;
        // 容器端移入目标进程的网络 namespace
        self.run(&["ip", "link", "set", ct_if.as_str(), "netns", pid_s.as_str()])
            .map_err(provision("netns"))?;
        let _ = self.run(&["ip", "link", "set", host_if.as_str(), "master", br]);
        self.run(&["ip", "link", "set", host_if.as_str(), "up"])
            .map_err(provision("host-up"))?;

        let ip = self.pool.allocate(container_id)?;
        let ip_cidr = format!("{}/{}", ip, prefix);

        self.run(&[
            "nsenter", "-t", pid_s.as_str(), "-n",
            "ip", "link", "set", "dev", ct_if.as_str(), "name", "eth0",
        ])
        .map_err(provision("rename"))?;
        self.run(&[
            "nsenter", "-t", pid_s.as_str(), "-n",
            "ip", "addr", "add", ip_cidr.as_str(), "dev", "eth0",
        ])
        .map_err(provision("addr"))?;
        self.run(&[
            "nsenter", "-t", pid_s.as_str(), "-n", "ip", "link", "set", "eth0", "up",
        ])
        .map_err(provision("link-up"))?;
        // 默认路由已存在则忽略
        let _ = self.run(&[
            "nsenter", "-t", pid_s.as_str(), "-n",
            "ip", "route", "add", "default", "via", gateway.as_str(),
        ]);

        // 确保出站 NAT 规则存在（先查后插）
        if self
            .run(&[
                "iptables", "-t", "nat", "-C", "POSTROUTING",
                "-s", cidr.as_str(), "!", "-o", br, "-j", "MASQUERADE",
            ])
            .is_err()
        {
            let _ = self.run(&[
                "iptables", "-t", "nat", "-A", "POSTROUTING",
                "-s", cidr.as_str(), "!", "-o", br, "-j", "MASQUERADE",
            ]);
        }

        info!("容器 {} 网络就绪: {}", container_id, ip);
        Ok(ip)
    }
}
