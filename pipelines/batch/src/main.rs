//! 批量生成 bullseye 分区.
//!
//! 被试根目录与输出根目录分别由 `$BULLSEYE_SUBJECTS_DIR`, `$BULLSEYE_OUTPUT_DIR`
//! 指定, 配置文件由 `$BULLSEYE_CONFIG` 指定, 日志级别由 `$BULLSEYE_LOG` 指定.

use std::io;
use std::process::ExitCode;

mod result;
mod runner;

fn main() -> ExitCode {
    if let Err(e) = simple_logger::SimpleLogger::new()
        .with_level(utils::log_level_from_env())
        .init()
    {
        eprintln!("cannot install logger: {e}");
    }

    let result = match runner::run() {
        Ok(r) => r,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::from(2);
        }
    };
    if let Err(e) = result.analyze(io::stdout().lock()) {
        log::error!("cannot write summary: {e}");
    }

    if result.failed() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
