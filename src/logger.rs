use log::{Level, Log, Metadata, Record};

use std::io::{stderr, Write};

pub struct SimpleLogger;

pub static SIMPLE_LOGGER: SimpleLogger = SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(&mut stderr(), "{} - {}", record.level(), record.args());
        }
    }

    fn flush(&self) {
        stderr().flush().expect("Failed to flush");
    }
}

/// 初始化日志系统，级别可通过 EMBER_LOG 环境变量覆盖
pub fn init() -> Result<(), log::SetLoggerError> {
    log::set_logger(&SIMPLE_LOGGER)?;
    let level = match std::env::var("EMBER_LOG").as_deref() {
        Ok("debug") => log::LevelFilter::Debug,
        Ok("warn") => log::LevelFilter::Warn,
        Ok("error") => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };
    log::set_max_level(level);
    Ok(())
}
