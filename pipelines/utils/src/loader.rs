//! 对 `wm-bullseye::dataset` 的更一层封装. 提供更直接的路径与配置获取方式.

use std::env;
use std::path::{Path, PathBuf};

use wm_bullseye::{dataset, BullseyeConfig, BullseyeResult};

/// 被试数据根目录的环境变量.
pub const SUBJECTS_ENV: &str = "BULLSEYE_SUBJECTS_DIR";

/// 输出根目录的环境变量.
pub const OUTPUT_ENV: &str = "BULLSEYE_OUTPUT_DIR";

fn dir_from_env_or_home<P: AsRef<Path>>(var: &str, fallback: &[P]) -> Option<PathBuf> {
    match env::var_os(var) {
        Some(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => dataset::home_dataset_dir_with(fallback),
    }
}

/// 获取被试数据根目录.
///
/// 1. 若环境变量 `$BULLSEYE_SUBJECTS_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/bullseye/subjects`. 无法确定主目录时返回 `None`.
pub fn subjects_dir_from_env_or_home() -> Option<PathBuf> {
    dir_from_env_or_home(SUBJECTS_ENV, &["bullseye", "subjects"])
}

/// 获取输出根目录.
///
/// 1. 若环境变量 `$BULLSEYE_OUTPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/bullseye/outputs`. 无法确定主目录时返回 `None`.
pub fn output_dir_from_env_or_home() -> Option<PathBuf> {
    dir_from_env_or_home(OUTPUT_ENV, &["bullseye", "outputs"])
}

/// 从 `$BULLSEYE_CONFIG` 指定的文件加载配置, 未设置时使用默认配置.
#[inline]
pub fn config_from_env_or_default() -> BullseyeResult<BullseyeConfig> {
    BullseyeConfig::from_env_or_default()
}

/// 列出被试根目录下的全部被试.
#[inline]
pub fn subjects_in<P: AsRef<Path>>(root: P) -> BullseyeResult<Vec<String>> {
    dataset::list_subjects(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_home() {
        let var = "BULLSEYE_UTILS_TEST_DIR";
        env::set_var(var, "/tmp/bullseye-subjects");
        assert_eq!(
            dir_from_env_or_home(var, &["x"]),
            Some(PathBuf::from("/tmp/bullseye-subjects"))
        );
        env::set_var(var, "");
        assert_eq!(
            dir_from_env_or_home(var, &["x"]),
            dataset::home_dataset_dir_with(["x"])
        );
        env::remove_var(var);
    }
}
