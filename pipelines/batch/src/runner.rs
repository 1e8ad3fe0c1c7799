//! 程序运行函数.

use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::Instant;

use log::{error, info};
use threadpool::ThreadPool;
use utils::loader;
use wm_bullseye::dataset::SubjectLayout;
use wm_bullseye::error::StageContext;
use wm_bullseye::pipeline::run_subject;
use wm_bullseye::{BullseyeConfig, BullseyeError, BullseyeResult, Stage, SubjectError};

use crate::result::{BatchResult, SubjectSummary};

/// 实际运行.
///
/// 每个被试作为一个任务提交到线程池, 线程池的任务队列保证每个被试至多被处理一次.
/// 单个被试的失败不影响其他被试.
pub fn run() -> BullseyeResult<BatchResult> {
    let config = loader::config_from_env_or_default()?;
    config.validate()?;
    let root = loader::subjects_dir_from_env_or_home()
        .ok_or_else(|| BullseyeError::Config("cannot locate the subjects directory".into()))?;
    let out_root = loader::output_dir_from_env_or_home()
        .ok_or_else(|| BullseyeError::Config("cannot locate the output directory".into()))?;
    let subjects = loader::subjects_in(&root)?;

    let workers = utils::cpus();
    info!(
        "Running bullseye parcellation on {} subjects with {workers} workers...",
        subjects.len()
    );
    Ok(run_all(subjects, &root, &out_root, config, workers))
}

/// 在线程池上处理 `subjects`, 按被试编号排序返回.
pub fn run_all(
    subjects: Vec<String>,
    root: &Path,
    out_root: &Path,
    config: BullseyeConfig,
    workers: usize,
) -> BatchResult {
    let n = subjects.len();
    let pool = ThreadPool::new(workers.max(1));
    let (tx, rx) = mpsc::channel();
    let config = Arc::new(config);

    for subject in subjects {
        let tx = tx.clone();
        let config = Arc::clone(&config);
        let root = root.to_owned();
        let out_root = out_root.to_owned();
        pool.execute(move || {
            let outcome = process(&root, &out_root, &subject, &config);
            match outcome.as_ref() {
                Ok(s) => info!("[{subject}] finished in {} ms", s.elapsed.as_millis()),
                Err(e) => error!("{e}"),
            }
            // 接收端只在全部结果到达后才会关闭.
            let _ = tx.send((subject, outcome));
        });
    }
    drop(tx);

    // 工作线程 panic 时对应的结果不会到达, 此时 `rx` 在所有发送端释放后结束.
    let received: Vec<_> = rx.iter().take(n).collect();
    if received.len() < n {
        error!("{} subjects were lost to panicked workers", n - received.len());
    }
    BatchResult::from_iter(received)
}

/// 处理单个被试: 加载, 计算, 检查不一致比例, 保存.
fn process(
    root: &Path,
    out_root: &Path,
    subject: &str,
    config: &BullseyeConfig,
) -> Result<SubjectSummary, SubjectError> {
    let start = Instant::now();
    let inputs = SubjectLayout::new(root, subject)
        .load(subject)
        .at(subject, Stage::Load)?;
    let outputs = run_subject(&inputs, config)?;
    outputs
        .check(config.mismatch_tolerance)
        .at(subject, Stage::Compose)?;
    outputs
        .save(out_root.join(subject), config.qc_snapshots)
        .at(subject, Stage::Save)?;

    Ok(SubjectSummary {
        counts: outputs.counts,
        labels: outputs.bullseye.data().iter().filter(|&&c| c != 0).count(),
        elapsed: start.elapsed(),
    })
}
