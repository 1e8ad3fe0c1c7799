//! 脑叶映射: 把外表面的逐顶点皮层注释转换为白质体素的脑叶标签.
//!
//! 每个体素的标签由一组按优先级排列的 [`LobeSource`] 决定, 第一个给出结果的来源胜出.
//! 标准顺序为:
//!
//! 1. [`NucleiOverride`]: 分割标签属于核团的体素始终为中央区;
//! 2. [`PropagatedLobes`] (可选): 沿深度梯度传播的结果;
//! 3. [`SurfaceLobes`]: 外表面最近 (已注释) 顶点所属脑叶.
//!
//! # 注意
//!
//! 最近点查询采用最近 **顶点** 近似, 而非三角形内部的最近点.
//! 在脑沟边界处两者的结果可能不同.

use ndarray::{Array3, ArrayView3, Zip};

use crate::config::{HemisphereLabels, LobeLookup};
use crate::consts::label::{BACKGROUND, CENTRAL_LOBE};
use crate::error::{BullseyeError, BullseyeResult};
use crate::surface::{Boundary, Hemisphere, Surface, VertexAnnotation};
use crate::{Idx3d, Point3};

mod nearest;
mod propagate;

pub use nearest::{BruteForce, KdTree, NearestIndex};
pub use propagate::propagate;

/// 脑叶标签来源.
pub trait LobeSource: Send + Sync {
    /// 对位于 `pos`, 分割标签为 `seg_label` 的体素给出脑叶标签.
    /// 该来源不适用时返回 `None`, 交给下一个来源处理.
    fn resolve(&self, pos: Idx3d, seg_label: i32) -> Option<u8>;
}

/// 核团覆盖: 分割标签属于核团集合的体素始终为中央区, 与表面距离无关.
#[derive(Debug, Clone)]
pub struct NucleiOverride {
    nuclei: Vec<i32>,
}

impl NucleiOverride {
    /// 由 (双侧) 核团标签集合创建.
    pub fn new(nuclei: Vec<i32>) -> Self {
        Self { nuclei }
    }
}

impl LobeSource for NucleiOverride {
    #[inline]
    fn resolve(&self, _pos: Idx3d, seg_label: i32) -> Option<u8> {
        self.nuclei.contains(&seg_label).then_some(CENTRAL_LOBE)
    }
}

/// 外表面最近顶点所属脑叶.
pub struct SurfaceLobes {
    hemisphere: Hemisphere,
    index: Box<dyn NearestIndex>,
    vertex_lobes: Vec<u8>,
}

impl std::fmt::Debug for SurfaceLobes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceLobes")
            .field("hemisphere", &self.hemisphere)
            .field("indexed", &self.index.len())
            .finish()
    }
}

impl SurfaceLobes {
    /// 以 k-d 树为索引创建.
    pub fn new(
        hemisphere: Hemisphere,
        outer: &Surface,
        annotation: &VertexAnnotation,
        lookup: &LobeLookup,
    ) -> BullseyeResult<Self> {
        Self::with_index(hemisphere, outer, annotation, lookup, |entries| {
            Box::new(KdTree::build(entries))
        })
    }

    /// 以 `build` 构建的索引创建.
    ///
    /// 区域被忽略的顶点不进入索引. 任一未被忽略的区域在对照表中不存在时返回
    /// `UnknownRegion`. 所有顶点都被忽略时, 外边界没有可用的注释,
    /// 返回 `DegenerateBoundary`.
    pub fn with_index<F>(
        hemisphere: Hemisphere,
        outer: &Surface,
        annotation: &VertexAnnotation,
        lookup: &LobeLookup,
        build: F,
    ) -> BullseyeResult<Self>
    where
        F: FnOnce(Vec<(usize, Point3)>) -> Box<dyn NearestIndex>,
    {
        outer.validate()?;
        annotation.check_against(outer)?;

        let mut vertex_lobes = vec![BACKGROUND; outer.n_vertices()];
        let mut entries = Vec::with_capacity(outer.n_vertices());
        for (v, (&region, p)) in annotation
            .regions()
            .iter()
            .zip(outer.vertices())
            .enumerate()
        {
            if lookup.is_ignored(region) {
                continue;
            }
            let category = lookup
                .category(region)
                .ok_or(BullseyeError::UnknownRegion { region, hemisphere })?;
            vertex_lobes[v] = category.lobe_id(hemisphere);
            entries.push((v, *p));
        }
        if entries.is_empty() {
            return Err(BullseyeError::DegenerateBoundary {
                hemisphere,
                boundary: Boundary::Outer,
            });
        }
        log::debug!(
            "{hemisphere} hemisphere: indexed {} of {} outer vertices",
            entries.len(),
            outer.n_vertices()
        );

        Ok(Self {
            hemisphere,
            index: build(entries),
            vertex_lobes,
        })
    }

    /// 所属半球.
    #[inline]
    pub fn hemisphere(&self) -> Hemisphere {
        self.hemisphere
    }

    /// 体素 `pos` 的最近顶点所属脑叶.
    #[inline]
    pub fn lobe_at(&self, (i, j, k): Idx3d) -> Option<u8> {
        let v = self.index.query(&[i as f64, j as f64, k as f64])?;
        Some(self.vertex_lobes[v])
    }
}

impl LobeSource for SurfaceLobes {
    #[inline]
    fn resolve(&self, pos: Idx3d, _seg_label: i32) -> Option<u8> {
        self.lobe_at(pos)
    }
}

/// 预先计算好的脑叶标签体数据, 0 表示未覆盖.
#[derive(Debug, Clone)]
pub struct PropagatedLobes {
    labels: Array3<u8>,
}

impl PropagatedLobes {
    /// 由标签数组创建.
    pub fn new(labels: Array3<u8>) -> Self {
        Self { labels }
    }

    /// 标签数据.
    pub fn labels(&self) -> ArrayView3<'_, u8> {
        self.labels.view()
    }
}

impl LobeSource for PropagatedLobes {
    #[inline]
    fn resolve(&self, pos: Idx3d, _seg_label: i32) -> Option<u8> {
        self.labels.get(pos).copied().filter(|&l| l != BACKGROUND)
    }
}

/// 按优先级排列的标签来源. 第一个给出结果的来源胜出, 全部不适用时为背景.
#[derive(Default)]
pub struct LabelResolver<'a> {
    sources: Vec<&'a dyn LobeSource>,
}

impl<'a> LabelResolver<'a> {
    /// 空列表.
    pub fn new() -> Self {
        Self::default()
    }

    /// 在末尾追加一个 (优先级更低的) 来源.
    pub fn then(mut self, source: &'a dyn LobeSource) -> Self {
        self.sources.push(source);
        self
    }

    /// 标准顺序: 核团覆盖, 传播结果 (若有), 最近顶点.
    pub fn standard(
        nuclei: &'a NucleiOverride,
        propagated: Option<&'a PropagatedLobes>,
        surface: &'a SurfaceLobes,
    ) -> Self {
        let mut r = Self::new().then(nuclei);
        if let Some(p) = propagated {
            r = r.then(p);
        }
        r.then(surface)
    }

    /// 来源个数.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// 是否没有来源?
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// 解析单个体素.
    #[inline]
    pub fn resolve(&self, pos: Idx3d, seg_label: i32) -> u8 {
        self.sources
            .iter()
            .find_map(|s| s.resolve(pos, seg_label))
            .unwrap_or(BACKGROUND)
    }
}

/// 单个半球的映射规则: 处理域标签集合, 以及该域内的标签来源.
pub struct HemisphereMapping<'a> {
    /// 该半球的分割标签集合.
    pub labels: &'a HemisphereLabels,
    /// 标签来源.
    pub resolver: LabelResolver<'a>,
}

/// 对所有半球处理域内的体素计算脑叶标签, 域外为 0.
///
/// 各半球的处理域互不相交, 因此结果与 `hemispheres` 的顺序无关.
pub fn map_lobes(seg: ArrayView3<i32>, hemispheres: &[HemisphereMapping]) -> Array3<u8> {
    let mut out = Array3::from_elem(seg.raw_dim(), BACKGROUND);
    let zip = Zip::indexed(&mut out).and(seg);
    let f = |pos: Idx3d, o: &mut u8, &label: &i32| {
        if let Some(h) = hemispheres.iter().find(|h| h.labels.is_domain(label)) {
            *o = h.resolver.resolve(pos, label);
        }
    };

    #[cfg(feature = "rayon")]
    zip.par_for_each(f);
    #[cfg(not(feature = "rayon"))]
    zip.for_each(f);
    out
}
