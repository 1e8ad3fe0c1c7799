//! 错误类型.

use std::fmt;

use thiserror::Error;

use crate::surface::{Boundary, Hemisphere};
use crate::Idx3d;

/// 本 crate 中绝大多数可失败操作的返回类型.
pub type BullseyeResult<T> = Result<T, BullseyeError>;

/// 三角网格与其注释之间的几何/拓扑不一致.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// 三角面引用了不存在的顶点.
    #[error("face #{face} references vertex #{vertex}, but the surface has {n_vertices} vertices")]
    FaceIndex {
        /// 三角面序号.
        face: usize,
        /// 越界的顶点索引.
        vertex: usize,
        /// 网格顶点个数.
        n_vertices: usize,
    },

    /// 顶点坐标含有 NaN 或无穷.
    #[error("vertex #{vertex} has non-finite coordinates")]
    NonFiniteVertex {
        /// 顶点序号.
        vertex: usize,
    },

    /// 注释长度与网格顶点个数不一致.
    #[error("annotation has {annotated} entries, but the surface has {n_vertices} vertices")]
    AnnotationLength {
        /// 注释条目个数.
        annotated: usize,
        /// 网格顶点个数.
        n_vertices: usize,
    },
}

/// 处理单个被试时可能发生的错误.
#[derive(Debug, Error)]
pub enum BullseyeError {
    /// 网格数据不合法.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// 注释中出现了区域-脑叶对照表中不存在的区域编号.
    #[error("region id {region} on the {hemisphere} hemisphere has no lobe assignment")]
    UnknownRegion {
        /// 区域编号.
        region: i32,
        /// 所在半球.
        hemisphere: Hemisphere,
    },

    /// 脑叶分区与深度分区在白质掩膜上的不一致比例超过了容忍度.
    #[error(
        "{mismatched} of {domain} white-matter voxels ({fraction:.4}) disagree between \
         lobe and depth partitions, tolerance is {tolerance}"
    )]
    PartitionMismatch {
        /// 不一致体素个数.
        mismatched: usize,
        /// 白质掩膜体素个数.
        domain: usize,
        /// 不一致比例.
        fraction: f64,
        /// 容忍度.
        tolerance: f64,
    },

    /// 内边界或外边界掩膜为空, 归一化深度没有定义.
    #[error("{boundary} boundary of the {hemisphere} hemisphere is empty")]
    DegenerateBoundary {
        /// 所在半球.
        hemisphere: Hemisphere,
        /// 哪一个边界.
        boundary: Boundary,
    },

    /// 分割中存在该半球的白质/核团, 但未提供对应的表面.
    #[error("{hemisphere} hemisphere has {voxels} domain voxels but no surfaces")]
    MissingHemisphere {
        /// 所在半球.
        hemisphere: Hemisphere,
        /// 该半球的掩膜体素个数.
        voxels: usize,
    },

    /// 标签值超出了合法取值范围.
    #[error("{kind} label {value} is out of range")]
    LabelOutOfRange {
        /// 标签种类, 如 "lobe" 或 "depth".
        kind: &'static str,
        /// 非法取值.
        value: i64,
    },

    /// 体素值无法被表示为整数标签.
    #[error("voxel value {0} cannot be represented as an integer label")]
    VoxelValue(f64),

    /// 参与运算的体数据形状不一致.
    #[error("volume shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// 期望的形状.
        expected: Idx3d,
        /// 实际的形状.
        found: Idx3d,
    },

    /// 配置不合法.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// nifti 读写错误.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// 文件读写错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 网格/注释编解码错误.
    #[error(transparent)]
    Codec(#[from] bincode::Error),

    /// 质控图片写入错误.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// 配置文件解析错误.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// 数组形状错误.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

/// 单个被试处理流程的阶段, 用于错误定位与日志.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    /// 加载输入.
    Load,
    /// 边界投影.
    Boundary,
    /// 深度场.
    Depth,
    /// 脑叶映射.
    Lobes,
    /// bullseye 合成.
    Compose,
    /// 持久化输出.
    Save,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Boundary => "boundary",
            Stage::Depth => "depth",
            Stage::Lobes => "lobes",
            Stage::Compose => "compose",
            Stage::Save => "save",
        };
        f.write_str(name)
    }
}

/// 附带被试编号与阶段信息的错误. 批处理中单个被试的失败不影响其他被试.
#[derive(Debug, Error)]
#[error("subject `{subject}` failed at stage `{stage}`: {source}")]
pub struct SubjectError {
    /// 被试编号.
    pub subject: String,
    /// 出错阶段.
    pub stage: Stage,
    /// 底层错误.
    pub source: BullseyeError,
}

/// 为 [`BullseyeResult`] 附加被试与阶段信息.
pub trait StageContext<T> {
    /// 出错时包装为 [`SubjectError`].
    fn at(self, subject: &str, stage: Stage) -> Result<T, SubjectError>;
}

impl<T> StageContext<T> for BullseyeResult<T> {
    #[inline]
    fn at(self, subject: &str, stage: Stage) -> Result<T, SubjectError> {
        self.map_err(|source| SubjectError {
            subject: subject.to_owned(),
            stage,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_error_message() {
        let err: BullseyeResult<()> = Err(BullseyeError::UnknownRegion {
            region: 9999,
            hemisphere: Hemisphere::Left,
        });
        let err = err.at("sub-01", Stage::Lobes).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("sub-01"));
        assert!(msg.contains("lobes"));
        assert!(msg.contains("9999"));
        assert!(matches!(err.source, BullseyeError::UnknownRegion { region: 9999, .. }));
    }

    #[test]
    fn test_geometry_error_converts() {
        let e: BullseyeError = GeometryError::FaceIndex {
            face: 3,
            vertex: 10,
            n_vertices: 4,
        }
        .into();
        assert!(matches!(e, BullseyeError::Geometry(GeometryError::FaceIndex { face: 3, .. })));
    }
}
