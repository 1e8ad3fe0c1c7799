//! 批处理驱动依赖的通用组件.

use std::io::{self, Write};

use log::LevelFilter;

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 指定日志级别的环境变量.
pub const LOG_ENV: &str = "BULLSEYE_LOG";

/// 简单分隔线.
#[inline]
pub fn sep_to<W: Write>(mut w: W) -> io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 从 `$BULLSEYE_LOG` 读取日志级别, 未设置或无法解析时为 `info`.
pub fn log_level_from_env() -> LevelFilter {
    parse_level(std::env::var(LOG_ENV).ok().as_deref())
}

fn parse_level(s: Option<&str>) -> LevelFilter {
    s.and_then(|s| s.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}
