//! bullseye 合成: 将脑叶标签与壳层标签组合为复合标签.
//!
//! 复合标签 `C = D * 10 + L`, 其中 `L` 为脑叶标签 (1..=9), `D` 为壳层编号 (1..=9).
//! 因为 `L <= 9`, 编码是单射的, 且 `L = C % 10`, `D = C / 10`.

use ndarray::{Array3, ArrayView3, Zip};

use crate::consts::label::{is_background, is_lobe, CENTRAL_LOBE, COMPOSITE_BASE, MAX_SHELLS};
use crate::error::{BullseyeError, BullseyeResult};

/// 编码复合标签. 调用者保证 `lobe` 与 `depth` 都不为 0.
#[inline]
pub fn encode(lobe: u8, depth: u8) -> i32 {
    debug_assert!(is_lobe(lobe) && (1..=MAX_SHELLS).contains(&depth));
    i32::from(depth) * COMPOSITE_BASE + i32::from(lobe)
}

/// 解码复合标签为 `(脑叶, 壳层)`. 0 或不是合法编码的值返回 `None`.
#[inline]
pub fn decode(c: i32) -> Option<(u8, u8)> {
    if c <= 0 {
        return None;
    }
    let lobe = u8::try_from(c % COMPOSITE_BASE).ok()?;
    let depth = u8::try_from(c / COMPOSITE_BASE).ok()?;
    (is_lobe(lobe) && (1..=MAX_SHELLS).contains(&depth)).then_some((lobe, depth))
}

/// 分区不一致的统计.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct MismatchCount {
    /// 脑叶分区, 深度分区与白质掩膜三者不一致的体素个数.
    pub mismatched: usize,
    /// 白质掩膜体素个数.
    pub domain: usize,
}

impl MismatchCount {
    /// 不一致体素占白质掩膜的比例. 掩膜为空时为 0.
    pub fn fraction(&self) -> f64 {
        if self.domain == 0 {
            0.0
        } else {
            self.mismatched as f64 / self.domain as f64
        }
    }

    /// 不一致比例超过 `tolerance` 时返回 `PartitionMismatch`.
    pub fn check(&self, tolerance: f64) -> BullseyeResult<()> {
        let fraction = self.fraction();
        if fraction > tolerance {
            return Err(BullseyeError::PartitionMismatch {
                mismatched: self.mismatched,
                domain: self.domain,
                fraction,
                tolerance,
            });
        }
        Ok(())
    }
}

/// 合成结果.
#[derive(Debug, Clone)]
pub struct Composition {
    /// 复合标签, 掩膜外与不一致体素均为 0.
    pub bullseye: Array3<i32>,
    /// 不一致统计.
    pub counts: MismatchCount,
}

impl Composition {
    /// 见 [`MismatchCount::fraction`].
    #[inline]
    pub fn mismatch_fraction(&self) -> f64 {
        self.counts.fraction()
    }

    /// 见 [`MismatchCount::check`].
    #[inline]
    pub fn check(&self, tolerance: f64) -> BullseyeResult<()> {
        self.counts.check(tolerance)
    }
}

fn check_shape<A, B>(expected: &ArrayView3<A>, found: &ArrayView3<B>) -> BullseyeResult<()> {
    if expected.dim() != found.dim() {
        return Err(BullseyeError::ShapeMismatch {
            expected: expected.dim(),
            found: found.dim(),
        });
    }
    Ok(())
}

/// 在白质掩膜 `mask` 上合成复合标签.
///
/// 只有三者一致 (脑叶非 0, 壳层非 0, 且位于掩膜内) 的体素得到复合标签.
/// 其余体素为 0; 其中任意一方与另两方不一致的体素被计入 `mismatched`, 仅记录警告.
///
/// 脑叶标签超过 9 或壳层编号超过 `n_shells` 时返回 `LabelOutOfRange`.
pub fn compose(
    lobes: ArrayView3<u8>,
    shells: ArrayView3<u8>,
    mask: ArrayView3<bool>,
    n_shells: u8,
) -> BullseyeResult<Composition> {
    check_shape(&mask, &lobes)?;
    check_shape(&mask, &shells)?;
    if let Some(&l) = lobes.iter().find(|&&l| l > CENTRAL_LOBE) {
        return Err(BullseyeError::LabelOutOfRange {
            kind: "lobe",
            value: l.into(),
        });
    }
    if let Some(&d) = shells.iter().find(|&&d| d > n_shells.min(MAX_SHELLS)) {
        return Err(BullseyeError::LabelOutOfRange {
            kind: "depth",
            value: d.into(),
        });
    }

    let mut bullseye = Array3::zeros(mask.raw_dim());
    let mut mismatched = 0usize;
    let mut domain = 0usize;
    Zip::from(&mut bullseye)
        .and(lobes)
        .and(shells)
        .and(mask)
        .for_each(|c, &l, &d, &inside| {
            let has_lobe = !is_background(l);
            let has_depth = !is_background(d);
            domain += usize::from(inside);
            if inside && has_lobe && has_depth {
                *c = encode(l, d);
            } else if inside || has_lobe || has_depth {
                mismatched += 1;
            }
        });

    if mismatched > 0 {
        log::debug!("{mismatched} of {domain} white-matter voxels disagree between partitions");
    }
    Ok(Composition {
        bullseye,
        counts: MismatchCount { mismatched, domain },
    })
}

/// 覆盖合并: 复制 `base`, 再把 `top > 0` 的体素改写为 `top + offset`.
///
/// 用于将 bullseye 标签嵌入已有的分割, 选择合适的 `offset` 可避免与原有标签冲突.
pub fn overlay(base: ArrayView3<i32>, top: ArrayView3<i32>, offset: i32) -> BullseyeResult<Array3<i32>> {
    check_shape(&base, &top)?;
    let mut out = base.to_owned();
    for (o, &t) in out.iter_mut().zip(top.iter()) {
        if t > 0 {
            *o = t.checked_add(offset).ok_or(BullseyeError::LabelOutOfRange {
                kind: "overlay",
                value: i64::from(t) + i64::from(offset),
            })?;
        }
    }
    Ok(out)
}
