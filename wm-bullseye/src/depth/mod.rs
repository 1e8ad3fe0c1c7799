//! 深度场: 由内/外边界掩膜的距离变换求归一化深度, 并量化为壳层.

use ndarray::{Array3, ArrayView3, Zip};

use crate::config::{DepthConfig, DistanceMethod};
use crate::consts::label::BACKGROUND;
use crate::error::{BullseyeError, BullseyeResult};
use crate::surface::{Boundary, Hemisphere};

mod edt;

pub use edt::{ChamferDistance, DistanceTransform, ExactEdt};

/// `t * n` 与最近整数的差不超过该值时, 视为恰好落在该整数上.
pub const SNAP_EPS: f64 = 1e-9;

impl DistanceMethod {
    /// 获取对应的距离变换实现.
    pub fn strategy(self) -> Box<dyn DistanceTransform> {
        match self {
            DistanceMethod::Exact => Box::new(ExactEdt),
            DistanceMethod::Chamfer => Box::new(ChamferDistance),
        }
    }
}

/// 归一化深度 `t = d_in / (d_in + d_out)`. 两者均为 0 时 `t = 0`.
#[inline]
pub fn normalized_depth(d_in: f64, d_out: f64) -> f64 {
    let sum = d_in + d_out;
    if sum > 0.0 {
        d_in / sum
    } else {
        0.0
    }
}

/// 将归一化深度量化为 `1..=n_shells` 的壳层编号.
///
/// 使用闭式 `min(floor(t * n) + 1, n)`: 上界钳制保证 `t = 1` 不会产生第 `n + 1` 层.
/// `t * n` 距最近整数不超过 [`SNAP_EPS`] 时先对齐到该整数, 这样 `0.9999999999`
/// 与 `1.0` 得到相同结果, 计算结果为精确整数. `t` 为 NaN 时返回 1.
///
/// 对齐在每个整数边界上都生效, 因此与严格的闭式并不完全相同: 例如
/// `quantize(0.7499999999999, 4)` 返回 4, 而严格按 `floor(t * n) + 1` 计算得 3.
pub fn quantize(t: f64, n_shells: u8) -> u8 {
    debug_assert!(n_shells >= 1);
    let n = f64::from(n_shells);
    let x = (t * n).clamp(0.0, n);
    let r = x.round();
    let x = if (x - r).abs() <= SNAP_EPS { r } else { x };
    if x.is_nan() {
        return 1;
    }
    // 0 <= x <= n <= 9, 转换不会溢出.
    let bin = x.floor() as u8 + 1;
    bin.min(n_shells)
}

/// 单个半球的归一化深度场, 覆盖整个网格.
#[derive(Debug, Clone)]
pub struct DepthField {
    ndist: Array3<f64>,
}

impl DepthField {
    /// 由内边界掩膜 `inner` 与外边界掩膜 `outer` 计算深度场.
    ///
    /// 任一掩膜为空时归一化深度没有定义, 返回 `DegenerateBoundary`.
    pub fn compute<'a>(
        hemisphere: Hemisphere,
        inner: ArrayView3<'a, bool>,
        outer: ArrayView3<'a, bool>,
        config: &DepthConfig,
        spacing: [f64; 3],
    ) -> BullseyeResult<Self> {
        if inner.dim() != outer.dim() {
            return Err(BullseyeError::ShapeMismatch {
                expected: inner.dim(),
                found: outer.dim(),
            });
        }
        for (boundary, mask) in [(Boundary::Inner, &inner), (Boundary::Outer, &outer)] {
            if !mask.iter().any(|&m| m) {
                return Err(BullseyeError::DegenerateBoundary {
                    hemisphere,
                    boundary,
                });
            }
        }

        let spacing = if config.use_voxel_spacing {
            spacing
        } else {
            [1.0; 3]
        };
        let strategy = config.distance.strategy();
        let (d_in, d_out) = join(
            || strategy.distance_transform(inner, spacing),
            || strategy.distance_transform(outer, spacing),
        );

        let mut ndist = d_in;
        Zip::from(&mut ndist)
            .and(&d_out)
            .for_each(|t, &d_out| *t = normalized_depth(*t, d_out));
        Ok(Self { ndist })
    }

    /// 归一化深度.
    #[inline]
    pub fn ndist(&self) -> ArrayView3<'_, f64> {
        self.ndist.view()
    }

    /// 取出归一化深度.
    #[inline]
    pub fn into_ndist(self) -> Array3<f64> {
        self.ndist
    }

    /// 在 `domain` 内量化为壳层编号, 其余体素为 0.
    pub fn shells_within(&self, domain: ArrayView3<bool>, n_shells: u8) -> Array3<u8> {
        shells_within(self.ndist.view(), domain, n_shells)
    }
}

/// 在 `domain` 内将归一化深度 `ndist` 量化为 `1..=n_shells`, 其余体素为 0.
pub fn shells_within(ndist: ArrayView3<f64>, domain: ArrayView3<bool>, n_shells: u8) -> Array3<u8> {
    let mut out = Array3::from_elem(ndist.raw_dim(), BACKGROUND);
    Zip::from(&mut out)
        .and(ndist)
        .and(domain)
        .for_each(|o, &t, &inside| {
            if inside {
                *o = quantize(t, n_shells);
            }
        });
    out
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        pub(crate) use rayon::join;
    } else {
        /// 顺序执行两个闭包.
        pub(crate) fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
        where
            A: FnOnce() -> RA,
            B: FnOnce() -> RB,
        {
            (a(), b())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phantom;
    use crate::surface::project;

    #[test]
    fn test_normalized_depth() {
        assert_eq!(normalized_depth(0.0, 0.0), 0.0);
        assert_eq!(normalized_depth(0.0, 3.0), 0.0);
        assert_eq!(normalized_depth(3.0, 0.0), 1.0);
        assert_eq!(normalized_depth(1.0, 3.0), 0.25);
    }

    #[test]
    fn test_quantize_bins() {
        assert_eq!(quantize(0.0, 4), 1);
        assert_eq!(quantize(0.2, 4), 1);
        assert_eq!(quantize(0.25, 4), 2);
        assert_eq!(quantize(0.5, 4), 3);
        assert_eq!(quantize(0.74, 4), 3);
        assert_eq!(quantize(0.75, 4), 4);
        assert_eq!(quantize(1.0, 4), 4);
        assert_eq!(quantize(f64::NAN, 4), 1);
        assert_eq!(quantize(0.5, 1), 1);
        assert_eq!(quantize(1.0, 9), 9);
    }

    #[test]
    fn test_quantize_float_noise() {
        // 0.9999999999 必须落在第 4 层, 而不是第 5 层或第 3 层.
        for _ in 0..3 {
            assert_eq!(quantize(0.9999999999, 4), 4);
        }
        // 本应为 0.75 却带有误差的值不会落入第 3 层.
        assert_eq!(quantize(0.749_999_999_999_9, 4), 4);
        assert_eq!(quantize(0.750_000_000_000_1, 4), 4);
        assert_eq!(quantize(0.499_999_999_999_9, 4), 3);
        assert_eq!(quantize(0.1 + 0.2 - 0.05, 4), 2);
    }

    #[test]
    fn test_quantize_monotone() {
        let mut last = 0;
        for i in 0..=10_000 {
            let t = i as f64 / 10_000.0;
            let b = quantize(t, 4);
            assert!(b >= last);
            assert!((1..=4).contains(&b));
            last = b;
        }
    }

    #[test]
    fn test_degenerate_boundary() {
        let inner = Array3::from_elem((4, 4, 4), false);
        let mut outer = Array3::from_elem((4, 4, 4), false);
        outer[(0, 0, 0)] = true;
        let err = DepthField::compute(
            Hemisphere::Left,
            inner.view(),
            outer.view(),
            &DepthConfig::default(),
            [1.0; 3],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BullseyeError::DegenerateBoundary {
                hemisphere: Hemisphere::Left,
                boundary: Boundary::Inner
            }
        ));
    }

    #[test]
    fn test_degenerate_outer_boundary() {
        let mut inner = Array3::from_elem((4, 4, 4), false);
        inner[(2, 2, 2)] = true;
        let err = {
            // 两个掩膜来自不同作用域的数组.
            let outer = Array3::from_elem((4, 4, 4), false);
            DepthField::compute(
                Hemisphere::Right,
                inner.view(),
                outer.view(),
                &DepthConfig::default(),
                [1.0; 3],
            )
            .unwrap_err()
        };
        assert!(matches!(
            err,
            BullseyeError::DegenerateBoundary {
                hemisphere: Hemisphere::Right,
                boundary: Boundary::Outer
            }
        ));
    }

    #[test]
    fn test_sphere_shells() {
        let center = [8.0; 3];
        let shape = (17, 17, 17);
        let inner = project(&phantom::sphere(center, 2.0, 2), shape, 1.0).unwrap();
        let outer = project(&phantom::sphere(center, 6.0, 2), shape, 1.0).unwrap();
        let domain = Array3::from_shape_fn(shape, |p| {
            let r = phantom::radius_of(p, center);
            (2.0..=6.0).contains(&r)
        });

        for distance in [DistanceMethod::Exact, DistanceMethod::Chamfer] {
            let config = DepthConfig {
                distance,
                ..DepthConfig::default()
            };
            let field =
                DepthField::compute(Hemisphere::Left, inner.view(), outer.view(), &config, [1.0; 3])
                    .unwrap();
            assert!(field.ndist().iter().all(|t| (0.0..=1.0).contains(t)));

            let shells = field.shells_within(domain.view(), 4);
            let mut seen = [false; 5];
            for (&s, &d) in shells.iter().zip(domain.iter()) {
                assert_eq!(s == 0, !d);
                seen[s as usize] = true;
            }
            assert_eq!(seen, [true; 5]);

            if distance == DistanceMethod::Chamfer {
                continue;
            }
            // 沿球心出发的射线, 壳层编号单调不减.
            for off in crate::consts::NEIGHBOURS_26.iter() {
                let mut last = 0;
                for step in 0..=8isize {
                    let pos = [8 + off[0] * step, 8 + off[1] * step, 8 + off[2] * step];
                    if pos.iter().any(|&c| !(0..17).contains(&c)) {
                        break;
                    }
                    let s = shells[(pos[0] as usize, pos[1] as usize, pos[2] as usize)];
                    if s > 0 {
                        assert!(s >= last, "ray {off:?} step {step}");
                        last = s;
                    }
                }
            }
        }
    }
}
