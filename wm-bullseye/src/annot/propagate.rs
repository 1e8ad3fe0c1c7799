//! 沿归一化深度梯度向内传播脑叶标签.

use std::cmp::Reverse;

use binary_heap_plus::BinaryHeap;
use ndarray::{Array3, ArrayView3};
use ordered_float::OrderedFloat;

use super::{PropagatedLobes, SurfaceLobes};
use crate::consts::label::BACKGROUND;
use crate::consts::{shift, NEIGHBOURS_26};
use crate::Idx3d;

/// 最大堆, `t` 相同时先处理索引较小的体素.
type Frontier = BinaryHeap<(OrderedFloat<f64>, Reverse<Idx3d>)>;

/// 从外边界种子出发, 沿归一化深度 `ndist` 降序向处理域内传播标签.
///
/// 1. 种子为 `seeds` (外边界掩膜) 中的体素, 其标签取外表面最近顶点所属脑叶;
/// 2. 待处理体素为 `domain` 内 `0 < t < 1` 且不是种子的体素;
/// 3. 每次取出与已完成区域相邻, 且 `t` 最大的待处理体素,
///   令其继承 26-邻域内已完成体素中 `t` 最大者的标签.
///
/// 无法到达的待处理体素保持为 0, 由后续的标签来源处理.
pub fn propagate(
    domain: ArrayView3<bool>,
    seeds: ArrayView3<bool>,
    ndist: ArrayView3<f64>,
    surface: &SurfaceLobes,
) -> PropagatedLobes {
    let shape = domain.dim();
    let mut labels = Array3::from_elem(shape, BACKGROUND);
    let mut done = Array3::from_elem(shape, false);
    let pending = |pos: Idx3d, done: &Array3<bool>| {
        !done[pos] && domain[pos] && !seeds[pos] && ndist[pos] > 0.0 && ndist[pos] < 1.0
    };

    let mut heap = Frontier::new();
    let push_around = |pos: Idx3d, done: &Array3<bool>, heap: &mut Frontier| {
        for off in NEIGHBOURS_26.iter() {
            if let Some(next) = shift(pos, off, shape) {
                if pending(next, done) {
                    heap.push((OrderedFloat(ndist[next]), Reverse(next)));
                }
            }
        }
    };

    let mut seeded = Vec::new();
    for (pos, &s) in seeds.indexed_iter() {
        if !s {
            continue;
        }
        if let Some(l) = surface.lobe_at(pos) {
            labels[pos] = l;
            done[pos] = true;
            seeded.push(pos);
        }
    }
    for &pos in seeded.iter() {
        push_around(pos, &done, &mut heap);
    }

    let mut n_propagated = 0usize;
    while let Some((_, Reverse(pos))) = heap.pop() {
        if done[pos] {
            continue;
        }
        let mut best: Option<(f64, u8)> = None;
        for off in NEIGHBOURS_26.iter() {
            let Some(next) = shift(pos, off, shape) else {
                continue;
            };
            if done[next] && best.map_or(true, |(t, _)| ndist[next] > t) {
                best = Some((ndist[next], labels[next]));
            }
        }
        if let Some((_, l)) = best {
            labels[pos] = l;
        }
        done[pos] = true;
        n_propagated += 1;
        push_around(pos, &done, &mut heap);
    }

    log::debug!(
        "{} hemisphere: propagated lobes from {} seeds to {n_propagated} voxels",
        surface.hemisphere(),
        seeded.len()
    );
    PropagatedLobes::new(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annot::LobeSource;
    use crate::config::{BullseyeConfig, DepthConfig};
    use crate::consts::desikan;
    use crate::depth::DepthField;
    use crate::phantom;
    use crate::surface::{project, Hemisphere, VertexAnnotation};

    #[test]
    fn test_propagate_sphere() {
        let lookup = BullseyeConfig::default().lobes.lookup().unwrap();
        let center = [8.0; 3];
        let shape = (17, 17, 17);
        let outer_surface = phantom::sphere(center, 6.0, 2);
        let inner = project(&phantom::sphere(center, 2.0, 2), shape, 1.0).unwrap();
        let outer = project(&outer_surface, shape, 1.0).unwrap();
        let domain = Array3::from_shape_fn(shape, |p| {
            (2.0..=6.0).contains(&phantom::radius_of(p, center))
        });
        let field = DepthField::compute(
            Hemisphere::Left,
            inner.view(),
            outer.view(),
            &DepthConfig::default(),
            [1.0; 3],
        )
        .unwrap();

        // 上半球为额叶, 下半球为颞叶.
        let ann = VertexAnnotation::new(
            outer_surface
                .vertices()
                .iter()
                .map(|p| {
                    if p[2] >= 8.0 {
                        desikan::SUPERIOR_FRONTAL
                    } else {
                        desikan::MIDDLE_TEMPORAL
                    }
                })
                .collect(),
        );
        let surface = SurfaceLobes::new(Hemisphere::Left, &outer_surface, &ann, &lookup).unwrap();
        let propagated = propagate(domain.view(), outer.view(), field.ndist(), &surface);

        // 所有 0 < t < 1 的处理域体素都被覆盖, 且只取两种标签.
        for ((pos, &l), &d) in propagated.labels().indexed_iter().zip(domain.iter()) {
            let t = field.ndist()[pos];
            if d && t > 0.0 && t < 1.0 {
                assert!(l == 1 || l == 3, "{pos:?} -> {l}");
                assert_eq!(propagated.resolve(pos, 2), Some(l));
            }
        }
        // 远离分界面的体素与最近顶点结果一致.
        assert_eq!(propagated.labels()[(8, 8, 12)], 1);
        assert_eq!(propagated.labels()[(8, 8, 4)], 3);
        // 处理域以外 (球心) 不被覆盖.
        assert_eq!(propagated.labels()[(8, 8, 8)], BACKGROUND);
    }
}
