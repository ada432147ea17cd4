use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmberError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Nix error: {0}")]
    Nix(#[from] nix::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("镜像 {0} 不存在")]
    ImageNotFound(String),

    #[error("联合挂载失败: {0}")]
    Mount(String),

    #[error("容器进程启动失败: {0}")]
    Spawn(String),

    #[error("网络配置失败 [{step}]: {reason}")]
    Provision { step: &'static str, reason: String },

    #[error("资源限制应用失败 [{dimension}]: {source}")]
    Limit {
        dimension: &'static str,
        source: std::io::Error,
    },

    #[error("地址池已耗尽: {0}")]
    PoolExhausted(String),

    #[error("状态目录访问失败: {0}")]
    RegistryIo(std::io::Error),

    #[error("Invalid specification: {0}")]
    InvalidSpec(String),

    #[error("Generic error: {0}")]
    Generic(String),
}

pub type Result<T> = std::result::Result<T, EmberError>;

// 兼容性宏
#[macro_export]
macro_rules! bail {
    ($msg:expr) => {
        return Err($crate::errors::EmberError::Generic($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::EmberError::Generic(format!($fmt, $($arg)*)))
    };
}

// 提供 ResultExt trait 用于简化错误上下文
pub trait ResultExt<T> {
    fn chain_err<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<EmberError>,
{
    fn chain_err<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let base_error = e.into();
            let context = f();
            EmberError::Generic(format!("{}: {}", context, base_error))
        })
    }
}
