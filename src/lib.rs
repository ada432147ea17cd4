#![allow(unknown_lints)]

pub mod cgroups;
pub mod commands;
pub mod container;
pub mod errors;
pub mod id;
pub mod image;
pub mod logger;
pub mod netpool;
pub mod network;
pub mod overlay;
pub mod paths;
pub mod state;

// 重新导出主要的类型和函数
pub use cgroups::{CgroupGovernor, Limits};
pub use container::{RunSpec, Supervisor};
pub use errors::{EmberError, Result};
pub use netpool::NetPool;
pub use network::{NetPlugin, PluginRegistry};
pub use state::{ContainerRecord, Registry, Status};
