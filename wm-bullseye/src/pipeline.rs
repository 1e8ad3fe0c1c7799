//! 单个被试的完整处理流程: 边界投影 -> 深度场 -> 脑叶映射 -> bullseye 合成.
//!
//! 所有输入在计算开始前已全部载入内存, 所有输出在计算结束后才写盘.
//! 任一阶段失败时, 该被试不产生任何输出文件.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use ndarray::{Array3, Axis, Zip};

use crate::annot::{
    map_lobes, propagate, HemisphereMapping, LabelResolver, NucleiOverride, PropagatedLobes,
    SurfaceLobes,
};
use crate::compose::{compose, MismatchCount};
use crate::config::{BullseyeConfig, LobeLookup, LobeMethod};
use crate::consts::label::BACKGROUND;
use crate::depth::DepthField;
use crate::error::{BullseyeError, BullseyeResult, Stage, StageContext, SubjectError};
use crate::surface::{project, Hemisphere, Surface, VertexAnnotation};
use crate::{ImgWriteVis, LabelVolume, NiftiHeaderAttr, SegVolume};

/// 单个半球的表面输入.
#[derive(Debug, Clone)]
pub struct HemisphereInputs {
    /// 所属半球.
    pub hemisphere: Hemisphere,
    /// 外边界 (白质-皮层) 表面.
    pub outer: Surface,
    /// 内边界 (脑室) 表面. 缺省时以分割中的脑室标签作为内边界.
    pub inner: Option<Surface>,
    /// 外表面的逐顶点皮层注释.
    pub annotation: VertexAnnotation,
}

/// 单个被试的全部输入.
#[derive(Debug, Clone)]
pub struct SubjectInputs {
    /// 被试编号.
    pub subject: String,
    /// 分割体数据.
    pub segmentation: SegVolume,
    /// 各半球的表面输入. 没有表面的半球不出现在这里.
    pub hemispheres: Vec<HemisphereInputs>,
}

impl SubjectInputs {
    /// 获取半球 `h` 的表面输入.
    pub fn hemisphere(&self, h: Hemisphere) -> Option<&HemisphereInputs> {
        self.hemispheres.iter().find(|x| x.hemisphere == h)
    }
}

/// 单个被试的全部输出, 均与输入分割共享 header.
#[derive(Debug, Clone)]
pub struct BullseyeOutputs {
    /// 被试编号.
    pub subject: String,
    /// 脑叶标签.
    pub lobes: LabelVolume<u8>,
    /// 壳层标签.
    pub shells: LabelVolume<u8>,
    /// bullseye 复合标签.
    pub bullseye: LabelVolume<i32>,
    /// 处理域内的归一化深度, 域外为 0.
    pub ndist: LabelVolume<f32>,
    /// 分区不一致统计.
    pub counts: MismatchCount,
}

/// 输出文件名 (不含扩展名).
pub const OUTPUT_NAMES: [&str; 4] = ["lobes", "shells", "bullseye", "ndist"];

/// 质控快照名 (`qc_{name}.png`).
pub const QC_NAMES: [&str; 3] = ["lobes", "shells", "bullseye"];

const NII_EXT: &str = "nii.gz";

impl BullseyeOutputs {
    /// 不一致比例超过 `tolerance` 时返回 `PartitionMismatch`.
    #[inline]
    pub fn check(&self, tolerance: f64) -> BullseyeResult<()> {
        self.counts.check(tolerance)
    }

    /// 将全部输出保存到目录 `dir`, 返回标签体数据的最终路径 (顺序同 [`OUTPUT_NAMES`]).
    ///
    /// `qc_snapshots` 为真时, 额外保存脑叶/壳层/bullseye 中间轴向切片的 PNG 快照.
    ///
    /// 所有文件先写为 `*.partial.*`, 全部写出后再逐个重命名. 任一步失败时删除全部临时文件,
    /// 并撤销已完成的重命名, 目录中不会留下本次保存的任何文件.
    pub fn save<P: AsRef<Path>>(&self, dir: P, qc_snapshots: bool) -> BullseyeResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut files: Vec<(PathBuf, PathBuf)> = OUTPUT_NAMES
            .iter()
            .map(|name| {
                (
                    dir.join(format!("{name}.partial.{NII_EXT}")),
                    dir.join(format!("{name}.{NII_EXT}")),
                )
            })
            .collect();
        if qc_snapshots {
            files.extend(QC_NAMES.iter().map(|name| {
                (
                    dir.join(format!("qc_{name}.partial.png")),
                    dir.join(format!("qc_{name}.png")),
                )
            }));
        }

        if let Err(e) = self.write_partials(&files, qc_snapshots) {
            discard(files.iter().map(|(partial, _)| partial));
            return Err(e);
        }
        for (i, (partial, target)) in files.iter().enumerate() {
            if let Err(e) = fs::rename(partial, target) {
                warn!(
                    "failed to commit {} of `{}`, rolling back",
                    target.display(),
                    self.subject
                );
                discard(files[..i].iter().map(|(_, target)| target));
                discard(files[i..].iter().map(|(partial, _)| partial));
                return Err(e.into());
            }
        }

        debug!("saved outputs of `{}` to {}", self.subject, dir.display());
        Ok(files
            .into_iter()
            .take(OUTPUT_NAMES.len())
            .map(|(_, target)| target)
            .collect())
    }

    /// `files` 的前 4 项对应 [`OUTPUT_NAMES`], 其后 (若有) 对应 [`QC_NAMES`].
    fn write_partials(&self, files: &[(PathBuf, PathBuf)], qc_snapshots: bool) -> BullseyeResult<()> {
        let partial = move |i: usize| &files[i].0;
        self.lobes.save(partial(0))?;
        self.shells.save(partial(1))?;
        self.bullseye.save(partial(2))?;
        self.ndist.save(partial(3))?;
        if qc_snapshots {
            let k = middle_slice(&self.bullseye);
            self.lobes.save_slice(2, k, partial(4))?;
            self.shells.save_slice(2, k, partial(5))?;
            self.bullseye.save_slice(2, k, partial(6))?;
        }
        Ok(())
    }
}

/// 尽力删除文件, 忽略不存在的文件.
fn discard<'a, I: IntoIterator<Item = &'a PathBuf>>(paths: I) {
    for p in paths {
        let _ = fs::remove_file(p);
    }
}

/// 单个半球的中间结果.
struct HemisphereResult {
    hemisphere: Hemisphere,
    domain: Array3<bool>,
    shells: Array3<u8>,
    ndist: Array3<f64>,
    surface: SurfaceLobes,
    propagated: Option<PropagatedLobes>,
}

/// 待处理的半球.
struct HemisphereJob<'a> {
    inputs: &'a HemisphereInputs,
    domain: Array3<bool>,
}

/// 处理单个被试.
///
/// 没有处理域体素的半球被跳过; 有处理域体素却没有表面输入的半球返回 `MissingHemisphere`.
/// 分区不一致只记录在 [`BullseyeOutputs::counts`] 中, 是否视为失败由调用者决定.
pub fn run_subject(
    inputs: &SubjectInputs,
    config: &BullseyeConfig,
) -> Result<BullseyeOutputs, SubjectError> {
    let id = inputs.subject.as_str();
    config.validate().at(id, Stage::Load)?;
    let lookup = config.lobes.lookup().at(id, Stage::Load)?;
    let seg = &inputs.segmentation;
    info!("[{id}] start, volume shape {:?}", seg.shape());

    let mut jobs = Vec::with_capacity(Hemisphere::ALL.len());
    for h in Hemisphere::ALL {
        let labels = config.labels.of(h);
        let domain = seg.data().map(|&v| labels.is_domain(v));
        let voxels = domain.iter().filter(|&&d| d).count();
        if voxels == 0 {
            warn!("[{id}] {h} hemisphere has no domain voxels, skipped");
            continue;
        }
        let hemisphere_inputs = inputs
            .hemisphere(h)
            .ok_or(BullseyeError::MissingHemisphere {
                hemisphere: h,
                voxels,
            })
            .at(id, Stage::Load)?;
        debug!("[{id}] {h} hemisphere: {voxels} domain voxels");
        jobs.push(HemisphereJob {
            inputs: hemisphere_inputs,
            domain,
        });
    }

    let results = for_each_hemisphere(jobs, |job| process_hemisphere(id, seg, job, config, &lookup))
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    info!("[{id}] lobe mapping");
    let nuclei = NucleiOverride::new(config.labels.all_nuclei());
    let mappings: Vec<_> = results
        .iter()
        .map(|r| HemisphereMapping {
            labels: config.labels.of(r.hemisphere),
            resolver: LabelResolver::standard(&nuclei, r.propagated.as_ref(), &r.surface),
        })
        .collect();
    let lobes = map_lobes(seg.data(), &mappings);

    let shape = seg.data().raw_dim();
    let mut mask = Array3::from_elem(shape.clone(), false);
    let mut shells = Array3::from_elem(shape.clone(), BACKGROUND);
    let mut ndist = Array3::<f32>::zeros(shape);
    for r in results.iter() {
        Zip::from(&mut mask)
            .and(&mut shells)
            .and(&mut ndist)
            .and(&r.domain)
            .and(&r.shells)
            .and(&r.ndist)
            .for_each(|m, s, t, &inside, &rs, &rt| {
                if inside {
                    *m = true;
                    *s = rs;
                    *t = rt as f32;
                }
            });
    }

    info!("[{id}] compose");
    let composition = compose(lobes.view(), shells.view(), mask.view(), config.depth.n_shells)
        .at(id, Stage::Compose)?;
    if composition.counts.mismatched > 0 {
        warn!(
            "[{id}] {} mismatched voxels ({:.4} of the white-matter mask)",
            composition.counts.mismatched,
            composition.mismatch_fraction()
        );
    }

    let wrap = || -> BullseyeResult<BullseyeOutputs> {
        Ok(BullseyeOutputs {
            subject: inputs.subject.clone(),
            lobes: LabelVolume::with_header_of(seg, lobes)?,
            shells: LabelVolume::with_header_of(seg, shells)?,
            bullseye: LabelVolume::with_header_of(seg, composition.bullseye)?,
            ndist: LabelVolume::with_header_of(seg, ndist)?,
            counts: composition.counts,
        })
    };
    let outputs = wrap().at(id, Stage::Compose)?;
    info!("[{id}] done");
    Ok(outputs)
}

/// 单个半球: 边界投影, 深度场, 以及脑叶标签来源的构造.
fn process_hemisphere(
    id: &str,
    seg: &SegVolume,
    job: HemisphereJob,
    config: &BullseyeConfig,
    lookup: &LobeLookup,
) -> Result<HemisphereResult, SubjectError> {
    let HemisphereJob { inputs, domain } = job;
    let h = inputs.hemisphere;
    let shape = seg.shape();
    let band = config.projector.band;

    info!("[{id}] {h} hemisphere: boundary projection");
    let outer = project(&inputs.outer, shape, band).at(id, Stage::Boundary)?;
    let inner = match inputs.inner.as_ref() {
        Some(s) => project(s, shape, band).at(id, Stage::Boundary)?,
        None => seg.mask_of(&config.labels.of(h).ventricles),
    };

    info!("[{id}] {h} hemisphere: depth field");
    let field = DepthField::compute(h, inner.view(), outer.view(), &config.depth, seg.pix_dim())
        .at(id, Stage::Depth)?;
    let shells = field.shells_within(domain.view(), config.depth.n_shells);

    info!("[{id}] {h} hemisphere: lobe sources");
    let surface =
        SurfaceLobes::new(h, &inputs.outer, &inputs.annotation, lookup).at(id, Stage::Lobes)?;
    let propagated = match config.mapper.method {
        LobeMethod::NearestVertex => None,
        LobeMethod::GradientPropagation => Some(propagate(
            domain.view(),
            outer.view(),
            field.ndist(),
            &surface,
        )),
    };

    Ok(HemisphereResult {
        hemisphere: h,
        domain,
        shells,
        ndist: field.into_ndist(),
        surface,
        propagated,
    })
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 并行处理各半球, 结果保持输入顺序.
        fn for_each_hemisphere<'a, F, R>(jobs: Vec<HemisphereJob<'a>>, f: F) -> Vec<R>
        where
            F: Fn(HemisphereJob<'a>) -> R + Send + Sync,
            R: Send,
        {
            use rayon::prelude::*;
            jobs.into_par_iter().map(f).collect()
        }
    } else {
        /// 依次处理各半球.
        fn for_each_hemisphere<'a, F, R>(jobs: Vec<HemisphereJob<'a>>, f: F) -> Vec<R>
        where
            F: Fn(HemisphereJob<'a>) -> R,
        {
            jobs.into_iter().map(f).collect()
        }
    }
}

/// 中间轴向切片的位置, 用于质控快照.
pub fn middle_slice<T>(volume: &LabelVolume<T>) -> usize {
    volume.data().len_of(Axis(2)) / 2
}
