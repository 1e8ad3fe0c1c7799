//! 质控快照的持久化存储.

use std::path::Path;

use image::ImageResult;
use ndarray::{ArrayView3, Axis};
use num::ToPrimitive;

use crate::LabelVolume;

/// 表明一个可以通过 **可视化友好** 模式保存切片快照的体数据.
///
/// 标签值会被拉伸到整个灰度范围, 背景 (0) 保持为黑色.
pub trait ImgWriteVis {
    /// 将沿 `axis` 的第 `index` 层切片保存为灰度 PNG.
    ///
    /// 当 `axis` 或 `index` 越界时 panic.
    fn save_slice<P: AsRef<Path>>(&self, axis: usize, index: usize, path: P) -> ImageResult<()>;
}

/// 将 `volume` 沿 `axis` 的第 `index` 层切片保存为灰度 PNG.
///
/// 切片的第一维对应图像的行. 当 `axis` 或 `index` 越界时 panic.
pub fn save_slice_png<T, P>(volume: ArrayView3<T>, axis: usize, index: usize, path: P) -> ImageResult<()>
where
    T: Copy + ToPrimitive,
    P: AsRef<Path>,
{
    let sli = volume.index_axis(Axis(axis), index);
    let (height, width) = sli.dim();
    let max = sli
        .iter()
        .filter_map(|v| v.to_f64())
        .fold(0.0f64, f64::max);

    let mut buf = image::GrayImage::new(width as u32, height as u32);
    for ((h, w), v) in sli.indexed_iter() {
        buf.put_pixel(w as u32, h as u32, image::Luma([pretty(*v, max)]));
    }
    buf.save(path)
}

/// 使像素更有利于单通道可视化.
#[inline]
fn pretty<T: ToPrimitive>(v: T, max: f64) -> u8 {
    match v.to_f64() {
        Some(v) if v > 0.0 && max > 0.0 => (v / max * 255.0).round().clamp(1.0, 255.0) as u8,
        _ => 0,
    }
}

macro_rules! impl_label_vis {
    ($($t: ty),+) => {
        $(
            impl ImgWriteVis for LabelVolume<$t> {
                fn save_slice<P: AsRef<Path>>(&self, axis: usize, index: usize, path: P) -> ImageResult<()> {
                    save_slice_png(self.data(), axis, index, path)
                }
            }
        )+
    };
}

impl_label_vis!(u8, i32, f32);

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_pretty() {
        assert_eq!(pretty(0u8, 9.0), 0);
        assert_eq!(pretty(9u8, 9.0), 255);
        assert_eq!(pretty(-3i32, 9.0), 0);
        assert!(pretty(1u8, 44.0) >= 1);
    }

    #[test]
    fn test_save_slice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slice.png");

        let mut data = Array3::<u8>::zeros((3, 4, 5));
        data[(1, 2, 3)] = 9;
        let vol = LabelVolume::fake(data, [1.0; 3]);
        vol.save_slice(0, 1, &path).unwrap();

        let img = image::open(&path).unwrap().into_luma8();
        assert_eq!(img.dimensions(), (5, 4));
        assert_eq!(img.get_pixel(3, 2).0, [255]);
        assert_eq!(img.get_pixel(0, 0).0, [0]);
    }
}
