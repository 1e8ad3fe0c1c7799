//! 欧氏距离变换.

use binary_heap_plus::BinaryHeap;
use ndarray::{Array3, ArrayView3, ArrayViewMut1, Axis};
use ordered_float::OrderedFloat;

use crate::consts::{shift, NEIGHBOURS_26};

/// 距离变换策略.
///
/// 对网格中每个体素, 计算其中心到 `mask` 中最近的 `true` 体素中心的欧氏距离.
/// `spacing` 为三个轴向上相邻体素的间距. `mask` 全为 `false` 时, 结果全为 `+inf`.
pub trait DistanceTransform: Send + Sync {
    /// 执行距离变换.
    fn distance_transform(&self, mask: ArrayView3<bool>, spacing: [f64; 3]) -> Array3<f64>;
}

/// 精确欧氏距离变换.
///
/// 逐轴执行一维平方距离变换 (抛物线下包络), 三次之后开方.
#[derive(Debug, Copy, Clone, Default)]
pub struct ExactEdt;

impl DistanceTransform for ExactEdt {
    fn distance_transform(&self, mask: ArrayView3<bool>, spacing: [f64; 3]) -> Array3<f64> {
        let mut f = mask.map(|&m| if m { 0.0 } else { f64::INFINITY });
        for (axis, step) in spacing.into_iter().enumerate() {
            transform_axis(&mut f, Axis(axis), step);
        }
        f.mapv_inplace(f64::sqrt);
        f
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        fn transform_axis(f: &mut Array3<f64>, axis: Axis, step: f64) {
            ndarray::Zip::from(f.lanes_mut(axis))
                .par_for_each(|mut lane| squared_edt_1d(&mut lane, step));
        }
    } else {
        fn transform_axis(f: &mut Array3<f64>, axis: Axis, step: f64) {
            for mut lane in f.lanes_mut(axis) {
                squared_edt_1d(&mut lane, step);
            }
        }
    }
}

/// 一维平方距离变换. `lane` 输入为采样函数值 (0 或 `+inf`, 或上一轴的结果),
/// 输出为 `min_q (f(q) + ((p - q) * step)^2)`.
fn squared_edt_1d(lane: &mut ArrayViewMut1<f64>, step: f64) {
    let n = lane.len();
    let f: Vec<f64> = lane.to_vec();
    let Some(first) = f.iter().position(|v| v.is_finite()) else {
        // 整条线上没有前景, 保持 +inf.
        return;
    };

    let pos = |q: usize| q as f64 * step;
    let intersect = |r: usize, q: usize| {
        ((f[q] + pos(q) * pos(q)) - (f[r] + pos(r) * pos(r))) / (2.0 * (pos(q) - pos(r)))
    };

    // 下包络中抛物线的顶点位置, 及相邻抛物线的分界.
    let mut v = vec![first; n];
    let mut z = vec![f64::INFINITY; n + 1];
    z[0] = f64::NEG_INFINITY;
    let mut k = 0usize;

    for q in (first + 1)..n {
        if !f[q].is_finite() {
            continue;
        }
        let mut s = intersect(v[k], q);
        while s <= z[k] {
            k -= 1;
            s = intersect(v[k], q);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }

    k = 0;
    for (p, out) in lane.iter_mut().enumerate() {
        while z[k + 1] < pos(p) {
            k += 1;
        }
        let d = pos(p) - pos(v[k]);
        *out = d * d + f[v[k]];
    }
}

/// 26-邻域 chamfer 近似距离变换.
///
/// 以前景体素为源点在 26-邻域图上做 Dijkstra, 边权为相邻体素中心的欧氏距离.
/// 结果不小于精确距离, 且不超过精确距离的 1.13 倍, 在轴向与对角方向上精确.
#[derive(Debug, Copy, Clone, Default)]
pub struct ChamferDistance;

impl DistanceTransform for ChamferDistance {
    fn distance_transform(&self, mask: ArrayView3<bool>, spacing: [f64; 3]) -> Array3<f64> {
        let shape = mask.dim();
        let steps: Vec<f64> = NEIGHBOURS_26
            .iter()
            .map(|off| {
                off.iter()
                    .zip(spacing.iter())
                    .map(|(&o, &s)| (o as f64 * s).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .collect();

        let mut dist = Array3::from_elem(shape, f64::INFINITY);
        let mut heap = BinaryHeap::new_min();
        for (pos, &m) in mask.indexed_iter() {
            if m {
                dist[pos] = 0.0;
                heap.push((OrderedFloat(0.0), pos));
            }
        }

        while let Some((OrderedFloat(d), pos)) = heap.pop() {
            if d > dist[pos] {
                continue;
            }
            for (off, &w) in NEIGHBOURS_26.iter().zip(steps.iter()) {
                let Some(next) = shift(pos, off, shape) else {
                    continue;
                };
                let nd = d + w;
                if nd < dist[next] {
                    dist[next] = nd;
                    heap.push((OrderedFloat(nd), next));
                }
            }
        }
        dist
    }
}
