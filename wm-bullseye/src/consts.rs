//! 通用常量.

use itertools::iproduct;
use once_cell::sync::Lazy;

/// 输出标签取值.
pub mod label {
    /// 三个输出标签体数据中, 背景 (白质掩膜之外) 的体素值.
    pub const BACKGROUND: u8 = 0;

    /// 中央区 (双侧基底节 + 丘脑) 的脑叶标签.
    pub const CENTRAL_LOBE: u8 = 9;

    /// 每个半球的脑叶个数.
    pub const LOBES_PER_HEMISPHERE: u8 = 4;

    /// 默认壳层个数.
    pub const DEFAULT_N_SHELLS: u8 = 4;

    /// 壳层个数上限. 复合编码的十位只能容纳 1..=9.
    pub const MAX_SHELLS: u8 = 9;

    /// 复合标签的进制基数. 脑叶标签不超过 9, 因此不会冲突.
    pub const COMPOSITE_BASE: i32 = 10;

    /// 是否是合法的非背景脑叶标签?
    #[inline]
    pub const fn is_lobe(p: u8) -> bool {
        matches!(p, 1..=CENTRAL_LOBE)
    }

    /// 是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        p == BACKGROUND
    }
}

/// FreeSurfer `aseg` 分割中常用的标签值.
pub mod aseg {
    /// 左侧大脑白质.
    pub const LEFT_WHITE_MATTER: i32 = 2;
    /// 左侧侧脑室.
    pub const LEFT_LATERAL_VENTRICLE: i32 = 4;
    /// 左侧侧脑室下角.
    pub const LEFT_INF_LAT_VENT: i32 = 5;
    /// 左侧丘脑.
    pub const LEFT_THALAMUS: i32 = 10;
    /// 左侧尾状核.
    pub const LEFT_CAUDATE: i32 = 11;
    /// 左侧壳核.
    pub const LEFT_PUTAMEN: i32 = 12;
    /// 左侧苍白球.
    pub const LEFT_PALLIDUM: i32 = 13;
    /// 左侧伏隔核.
    pub const LEFT_ACCUMBENS: i32 = 26;

    /// 右侧大脑白质.
    pub const RIGHT_WHITE_MATTER: i32 = 41;
    /// 右侧侧脑室.
    pub const RIGHT_LATERAL_VENTRICLE: i32 = 43;
    /// 右侧侧脑室下角.
    pub const RIGHT_INF_LAT_VENT: i32 = 44;
    /// 右侧丘脑.
    pub const RIGHT_THALAMUS: i32 = 49;
    /// 右侧尾状核.
    pub const RIGHT_CAUDATE: i32 = 50;
    /// 右侧壳核.
    pub const RIGHT_PUTAMEN: i32 = 51;
    /// 右侧苍白球.
    pub const RIGHT_PALLIDUM: i32 = 52;
    /// 右侧伏隔核.
    pub const RIGHT_ACCUMBENS: i32 = 58;
}

/// Desikan-Killiany 图谱 colortable 中的结构索引.
///
/// 注释文件中的区域编号按此索引给出.
#[allow(missing_docs)]
pub mod desikan {
    pub const UNKNOWN: i32 = 0;
    pub const BANKSSTS: i32 = 1;
    pub const CAUDAL_ANTERIOR_CINGULATE: i32 = 2;
    pub const CAUDAL_MIDDLE_FRONTAL: i32 = 3;
    pub const CORPUS_CALLOSUM: i32 = 4;
    pub const CUNEUS: i32 = 5;
    pub const ENTORHINAL: i32 = 6;
    pub const FUSIFORM: i32 = 7;
    pub const INFERIOR_PARIETAL: i32 = 8;
    pub const INFERIOR_TEMPORAL: i32 = 9;
    pub const ISTHMUS_CINGULATE: i32 = 10;
    pub const LATERAL_OCCIPITAL: i32 = 11;
    pub const LATERAL_ORBITOFRONTAL: i32 = 12;
    pub const LINGUAL: i32 = 13;
    pub const MEDIAL_ORBITOFRONTAL: i32 = 14;
    pub const MIDDLE_TEMPORAL: i32 = 15;
    pub const PARAHIPPOCAMPAL: i32 = 16;
    pub const PARACENTRAL: i32 = 17;
    pub const PARS_OPERCULARIS: i32 = 18;
    pub const PARS_ORBITALIS: i32 = 19;
    pub const PARS_TRIANGULARIS: i32 = 20;
    pub const PERICALCARINE: i32 = 21;
    pub const POSTCENTRAL: i32 = 22;
    pub const POSTERIOR_CINGULATE: i32 = 23;
    pub const PRECENTRAL: i32 = 24;
    pub const PRECUNEUS: i32 = 25;
    pub const ROSTRAL_ANTERIOR_CINGULATE: i32 = 26;
    pub const ROSTRAL_MIDDLE_FRONTAL: i32 = 27;
    pub const SUPERIOR_FRONTAL: i32 = 28;
    pub const SUPERIOR_PARIETAL: i32 = 29;
    pub const SUPERIOR_TEMPORAL: i32 = 30;
    pub const SUPRAMARGINAL: i32 = 31;
    pub const FRONTAL_POLE: i32 = 32;
    pub const TEMPORAL_POLE: i32 = 33;
    pub const TRANSVERSE_TEMPORAL: i32 = 34;
    pub const INSULA: i32 = 35;

    /// FreeSurfer 对未分配顶点 (内侧壁) 使用的注释值.
    pub const MEDIAL_WALL: i32 = -1;
}

/// 26-邻域偏移, 按 `(di, dj, dk)` 字典序排列, 不含原点.
///
/// 该顺序在传播算法中决定了并列情况下的取舍, 因此是稳定的.
pub static NEIGHBOURS_26: Lazy<Vec<[isize; 3]>> = Lazy::new(|| {
    iproduct!(-1isize..=1, -1isize..=1, -1isize..=1)
        .filter(|&(di, dj, dk)| (di, dj, dk) != (0, 0, 0))
        .map(|(di, dj, dk)| [di, dj, dk])
        .collect()
});

/// 将索引 `pos` 沿 `offset` 平移一步. 越界 (包括负方向) 时返回 `None`.
#[inline]
pub fn shift(pos: crate::Idx3d, offset: &[isize; 3], shape: crate::Idx3d) -> Option<crate::Idx3d> {
    let (i, j, k) = pos;
    let (ni, nj, nk) = shape;
    let i = i.checked_add_signed(offset[0]).filter(|&v| v < ni)?;
    let j = j.checked_add_signed(offset[1]).filter(|&v| v < nj)?;
    let k = k.checked_add_signed(offset[2]).filter(|&v| v < nk)?;
    Some((i, j, k))
}

#[cfg(test)]
mod tests {
    use super::{shift, NEIGHBOURS_26};

    #[test]
    fn test_neighbours_26() {
        assert_eq!(NEIGHBOURS_26.len(), 26);
        assert_eq!(NEIGHBOURS_26[0], [-1, -1, -1]);
        assert_eq!(NEIGHBOURS_26[25], [1, 1, 1]);
        assert!(!NEIGHBOURS_26.contains(&[0, 0, 0]));
    }

    #[test]
    fn test_shift_bounds() {
        let shape = (3, 3, 3);
        assert_eq!(shift((0, 0, 0), &[-1, 0, 0], shape), None);
        assert_eq!(shift((2, 1, 1), &[1, 0, 0], shape), None);
        assert_eq!(shift((1, 1, 1), &[1, -1, 0], shape), Some((2, 0, 1)));
    }
}
