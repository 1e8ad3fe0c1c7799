use std::ops::{Index, IndexMut};
use std::path::Path;

use ndarray::{Array3, ArrayView3, Ix3, Zip};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use num::ToPrimitive;

use crate::error::{BullseyeError, BullseyeResult};
use crate::Idx3d;

mod qc;

pub use qc::{save_slice_png, ImgWriteVis};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 按 nifti 原生的 `[i, j, k]` 顺序读取形状.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    let [_, i, j, k, ..] = h.dim;
    (i as usize, j as usize, k as usize)
}

/// 3D nii 文件 header 的共用属性和部分通用操作.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (i, j, k) = self.shape();
        i * j * k
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (i0, j0, k0): &Idx3d) -> bool {
        let (i, j, k) = self.shape();
        *i0 < i && *j0 < j && *k0 < k
    }

    /// 获取单个体素分辨率, 以毫米为单位, 按 `[i, j, k]` 顺序.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, i, j, k, ..] = self.header().pixdim;
        [i as f64, j as f64, k as f64].map(|v| if v > 0.0 { v } else { 1.0 })
    }

    /// 体素分辨率在三个维度上是否是各向同的?
    #[inline]
    fn is_isotropic(&self) -> bool {
        let [i, j, k] = self.pix_dim();
        i == j && i == k
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }
}

/// nii 格式 3D 标签体数据, 包括 header 和标签值.
///
/// 所有输出标签体数据都复用输入分割的 header, 因此方向/分辨率/原点信息保持一致.
#[derive(Debug, Clone)]
pub struct LabelVolume<T> {
    header: BoxedHeader,
    data: Array3<T>,
}

/// 分割体数据. 标签值以 `i32` 保存.
pub type SegVolume = LabelVolume<i32>;

impl<T> NiftiHeaderAttr for LabelVolume<T> {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl<T> Index<Idx3d> for LabelVolume<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl<T> IndexMut<Idx3d> for LabelVolume<T> {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl<T> LabelVolume<T> {
    /// 以 `reference` 的 header 包装 `data`. 两者形状不一致时返回 `Err`.
    pub fn with_header_of<H: NiftiHeaderAttr>(
        reference: &H,
        data: Array3<T>,
    ) -> BullseyeResult<Self> {
        let expected = reference.shape();
        let found = data.dim();
        if expected != found {
            return Err(BullseyeError::ShapeMismatch { expected, found });
        }
        Ok(Self {
            header: Box::new(reference.header().clone()),
            data,
        })
    }

    /// 根据裸标签数据和体素分辨率直接创建实体.
    ///
    /// `data` 与 `pix_dim` 均按 `[i, j, k]` 顺序组织.
    ///
    /// # 注意
    ///
    /// 该方法生成的 header 只有最基本的几何信息, 因此你应仅将其用于实验目的.
    pub fn fake(data: Array3<T>, pix_dim: [f32; 3]) -> Self {
        let (ni, nj, nk) = data.dim();
        let [pi, pj, pk] = pix_dim;

        let mut header = Box::<NiftiHeader>::default();
        header.dim = [3, ni as _, nj as _, nk as _, 1, 1, 1, 1];
        header.pixdim = [1.0, pi, pj, pk, 1.0, 1.0, 1.0, 1.0];
        header.sform_code = 1;
        header.srow_x = [pi, 0.0, 0.0, 0.0];
        header.srow_y = [0.0, pj, 0.0, 0.0];
        header.srow_z = [0.0, 0.0, pk, 0.0];
        header.intent_name[..4].copy_from_slice(b"fake");

        Self { header, data }
    }

    /// 判断该结构是否是由 `fake` 方法手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, T> {
        self.data.view()
    }
}

impl<T: Copy + PartialEq> LabelVolume<T> {
    /// 统计值为 `v` 的体素个数.
    pub fn count(&self, v: T) -> usize {
        self.data.iter().filter(|&&p| p == v).count()
    }
}

/// 将浮点体数据按 **四舍五入** 转换为整数标签.
///
/// 直接截断会把 `23.999999999` 这样的存储误差变成 23, 因此这里必须取整.
pub(crate) fn round_labels(raw: ArrayView3<f64>) -> BullseyeResult<Array3<i32>> {
    let values = raw
        .iter()
        .map(|&v| v.round().to_i32().ok_or(BullseyeError::VoxelValue(v)))
        .collect::<BullseyeResult<Vec<_>>>()?;
    Ok(Array3::from_shape_vec(raw.raw_dim(), values)?)
}

impl LabelVolume<i32> {
    /// 打开 nii 文件格式的 3D 分割. `path` 为 nii 文件的本地路径.
    ///
    /// 无论文件中以何种标量类型存储, 体素值都被四舍五入为 `i32`.
    /// 存在无法表示的值 (NaN, 无穷或溢出) 时返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> BullseyeResult<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        let raw = obj
            .into_volume()
            .into_ndarray::<f64>()?
            .into_dimensionality::<Ix3>()?;
        let data = round_labels(raw.view())?;
        debug_assert_eq!(data.dim(), get_shape_from_header(&header));

        Ok(Self { header, data })
    }

    /// 获取标签属于 `labels` 的体素掩膜.
    pub fn mask_of(&self, labels: &[i32]) -> Array3<bool> {
        self.data.map(|v| labels.contains(v))
    }

    /// 标签筛选与合并.
    ///
    /// 1. 只保留出现在 `groups` 中的标签, 其余置 0;
    /// 2. 每一组合并为该组的第一个标签, 若给出 `fixed_id` 则统一为该值;
    /// 3. 最后对合并结果按 `remap` 中的 `(old, new)` 逐对替换. 替换只看第 2 步的结果,
    ///   不会链式生效.
    pub fn filter_labels(
        &self,
        groups: &[Vec<i32>],
        fixed_id: Option<i32>,
        remap: &[(i32, i32)],
    ) -> Self {
        let target = |v: i32| -> i32 {
            let grouped = groups
                .iter()
                .rev()
                .find(|g| g.contains(&v))
                .and_then(|g| fixed_id.or_else(|| g.first().copied()))
                .unwrap_or(0);
            remap
                .iter()
                .rev()
                .find(|(old, _)| *old == grouped)
                .map_or(grouped, |(_, new)| *new)
        };
        let mut data = Array3::zeros(self.data.raw_dim());
        Zip::from(&mut data)
            .and(&self.data)
            .for_each(|d, &s| *d = target(s));
        Self {
            header: self.header.clone(),
            data,
        }
    }
}

macro_rules! impl_label_save {
    ($($t: ty),+) => {
        $(
            impl LabelVolume<$t> {
                /// 以 nii 格式保存到 `path`. 以 `.gz` 结尾时压缩.
                pub fn save<P: AsRef<Path>>(&self, path: P) -> BullseyeResult<()> {
                    WriterOptions::new(path.as_ref())
                        .reference_header(&self.header)
                        .write_nifti(&self.data)?;
                    Ok(())
                }
            }
        )+
    };
}

impl_label_save!(u8, i32, f32);

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_round_not_truncate() {
        let raw = Array3::from_shape_vec((1, 1, 4), vec![23.999999999, 0.0000001, 40.5, -1.2])
            .unwrap();
        let got = round_labels(raw.view()).unwrap();
        assert_eq!(got.into_raw_vec(), vec![24, 0, 41, -1]);
    }

    #[test]
    fn test_round_rejects_nan() {
        let raw = Array3::from_shape_vec((1, 1, 2), vec![1.0, f64::NAN]).unwrap();
        assert!(matches!(
            round_labels(raw.view()),
            Err(BullseyeError::VoxelValue(_))
        ));
    }

    #[test]
    fn test_fake_header() {
        let seg = SegVolume::fake(Array3::zeros((4, 5, 6)), [1.0, 2.0, 0.5]);
        assert!(seg.is_faked());
        assert_eq!(seg.shape(), (4, 5, 6));
        assert_eq!(seg.size(), 120);
        assert_eq!(seg.pix_dim(), [1.0, 2.0, 0.5]);
        assert_eq!(seg.voxel(), 1.0);
        assert!(!seg.is_isotropic());
        assert!(seg.check(&(3, 4, 5)));
        assert!(!seg.check(&(4, 0, 0)));
    }

    #[test]
    fn test_with_header_of_shape() {
        let seg = SegVolume::fake(Array3::zeros((4, 5, 6)), [1.0; 3]);
        assert!(LabelVolume::<u8>::with_header_of(&seg, Array3::zeros((4, 5, 6))).is_ok());
        assert!(matches!(
            LabelVolume::<u8>::with_header_of(&seg, Array3::zeros((4, 5, 7))),
            Err(BullseyeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_filter_labels() {
        let data = Array3::from_shape_vec((1, 1, 6), vec![2, 41, 4, 10, 7, 0]).unwrap();
        let seg = SegVolume::fake(data, [1.0; 3]);

        let wm = seg.filter_labels(&[vec![2, 41]], None, &[]);
        assert_eq!(wm.data().iter().copied().collect::<Vec<_>>(), [2, 2, 0, 0, 0, 0]);

        let fixed = seg.filter_labels(&[vec![2, 41], vec![4, 10]], Some(1), &[]);
        assert_eq!(fixed.data().iter().copied().collect::<Vec<_>>(), [1, 1, 1, 1, 0, 0]);

        // 重映射只作用于合并后的结果, 且不会链式生效.
        let remapped = seg.filter_labels(&[vec![2], vec![4]], None, &[(2, 4), (4, 9)]);
        assert_eq!(remapped.data().iter().copied().collect::<Vec<_>>(), [4, 0, 9, 0, 0, 0]);
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seg.nii.gz");

        let mut data = Array3::<i32>::zeros((3, 4, 5));
        data[(1, 2, 3)] = 41;
        data[(2, 0, 4)] = 2;
        let seg = SegVolume::fake(data, [1.0, 1.0, 2.0]);
        seg.save(&path).unwrap();

        let back = SegVolume::open(&path).unwrap();
        assert_eq!(back.shape(), (3, 4, 5));
        assert_eq!(back[(1, 2, 3)], 41);
        assert_eq!(back[(2, 0, 4)], 2);
        assert_eq!(back.count(0), 58);
        assert_eq!(back.pix_dim(), [1.0, 1.0, 2.0]);
    }
}
