//! 边界投影: 将三角网格光栅化为二值体素掩膜.

use std::ops::RangeInclusive;

use itertools::iproduct;
use ndarray::Array3;

use super::geometry::point_triangle_dist2;
use super::Surface;
use crate::error::BullseyeResult;
use crate::{Idx3d, Point3};

/// 将 `surface` 投影到形状为 `shape` 的网格上.
///
/// 体素中心到任一三角形 (含内部) 的距离不超过 `band` 时, 该体素被标记为 `true`.
/// 结果是所有三角形各自标记结果的并集, 因此与顶点/三角面的排列顺序无关.
/// 退化或自相交的三角形各自独立处理, 不做任何拓扑修复.
///
/// 三角面引用不存在的顶点时返回 `GeometryError`.
pub fn project(surface: &Surface, shape: Idx3d, band: f64) -> BullseyeResult<Array3<bool>> {
    surface.validate()?;
    debug_assert!(band > 0.0);

    let mut mask = Array3::from_elem(shape, false);
    for pos in collect_hits(surface, shape, band) {
        mask[pos] = true;
    }
    log::debug!(
        "projected {} faces onto {} boundary voxels",
        surface.n_faces(),
        mask.iter().filter(|&&m| m).count()
    );
    Ok(mask)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        fn collect_hits(surface: &Surface, shape: Idx3d, band: f64) -> Vec<Idx3d> {
            (0..surface.n_faces())
                .into_par_iter()
                .flat_map(|f| face_voxels(&surface.triangle(f), shape, band))
                .collect()
        }
    } else {
        fn collect_hits(surface: &Surface, shape: Idx3d, band: f64) -> Vec<Idx3d> {
            (0..surface.n_faces())
                .flat_map(|f| face_voxels(&surface.triangle(f), shape, band))
                .collect()
        }
    }
}

/// 单个三角形的包围盒 (外扩 `band`) 内, 距离不超过 `band` 的体素.
fn face_voxels(tri: &[Point3; 3], (ni, nj, nk): Idx3d, band: f64) -> Vec<Idx3d> {
    let axis = |a: usize, len: usize| {
        let lo = tri.iter().map(|p| p[a]).fold(f64::INFINITY, f64::min);
        let hi = tri.iter().map(|p| p[a]).fold(f64::NEG_INFINITY, f64::max);
        voxel_range(lo - band, hi + band, len)
    };
    let (Some(ri), Some(rj), Some(rk)) = (axis(0, ni), axis(1, nj), axis(2, nk)) else {
        return Vec::new();
    };

    let band2 = band * band;
    iproduct!(ri, rj, rk)
        .filter(|&(i, j, k)| {
            let center = [i as f64, j as f64, k as f64];
            point_triangle_dist2(&center, tri) <= band2
        })
        .collect()
}

/// 坐标区间 `[lo, hi]` 内, 且位于 `0..len` 的体素索引. 区间与网格不相交时返回 `None`.
fn voxel_range(lo: f64, hi: f64, len: usize) -> Option<RangeInclusive<usize>> {
    if len == 0 {
        return None;
    }
    let max = (len - 1) as f64;
    let lo = lo.ceil().max(0.0);
    let hi = hi.floor().min(max);
    (lo <= hi).then(|| lo as usize..=hi as usize)
}
