//! 三角网格边界与逐顶点注释.
//!
//! 网格顶点坐标位于分割体数据的体素索引空间 `[i, j, k]` 中, 体素 `(i, j, k)`
//! 的中心即点 `[i, j, k]`.
//!
//! 持久化格式为 `bincode` 序列化后再经 zlib 压缩.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{BullseyeResult, GeometryError};
use crate::Point3;

pub mod geometry;
mod raster;

pub use raster::project;

/// 大脑半球.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hemisphere {
    /// 左半球.
    Left,
    /// 右半球.
    Right,
}

impl Hemisphere {
    /// 两个半球, 左半球在前.
    pub const ALL: [Self; 2] = [Self::Left, Self::Right];

    /// FreeSurfer 风格的文件名前缀.
    #[inline]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Left => "lh",
            Self::Right => "rh",
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

/// 内边界 (脑室侧) 或外边界 (皮层侧).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Boundary {
    /// 内边界.
    Inner,
    /// 外边界.
    Outer,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inner => "inner",
            Self::Outer => "outer",
        })
    }
}

/// 闭合三角网格.
///
/// 构造时不做检查, 请在使用前调用 [`Surface::validate`]. 从文件加载时会自动检查.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    vertices: Vec<Point3>,
    faces: Vec<[usize; 3]>,
}

impl Surface {
    /// 由顶点与三角面创建网格.
    #[inline]
    pub fn new(vertices: Vec<Point3>, faces: Vec<[usize; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// 检查顶点坐标均有限, 且所有三角面引用的顶点均存在.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if let Some(vertex) = self
            .vertices
            .iter()
            .position(|p| !p.iter().all(|c| c.is_finite()))
        {
            return Err(GeometryError::NonFiniteVertex { vertex });
        }
        let n_vertices = self.vertices.len();
        for (face, tri) in self.faces.iter().enumerate() {
            if let Some(&vertex) = tri.iter().find(|&&v| v >= n_vertices) {
                return Err(GeometryError::FaceIndex {
                    face,
                    vertex,
                    n_vertices,
                });
            }
        }
        Ok(())
    }

    /// 顶点坐标.
    #[inline]
    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    /// 三角面.
    #[inline]
    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// 顶点个数.
    #[inline]
    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// 三角面个数.
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// 获取第 `face` 个三角形的三个顶点坐标.
    ///
    /// 索引越界时 panic, 因此仅在 [`Surface::validate`] 通过后使用.
    #[inline]
    pub fn triangle(&self, face: usize) -> [Point3; 3] {
        self.faces[face].map(|v| self.vertices[v])
    }

    /// 从文件加载并检查.
    pub fn open<P: AsRef<Path>>(path: P) -> BullseyeResult<Self> {
        let surface: Self = read_compressed(path.as_ref())?;
        surface.validate()?;
        Ok(surface)
    }

    /// 保存到文件.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> BullseyeResult<()> {
        write_compressed(self, path.as_ref())
    }
}

/// 外表面的逐顶点皮层区域编号, 与网格顶点一一对应.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexAnnotation {
    regions: Vec<i32>,
}

impl VertexAnnotation {
    /// 由逐顶点区域编号创建.
    #[inline]
    pub fn new(regions: Vec<i32>) -> Self {
        Self { regions }
    }

    /// 所有顶点都属于同一区域.
    #[inline]
    pub fn uniform(n_vertices: usize, region: i32) -> Self {
        Self::new(vec![region; n_vertices])
    }

    /// 第 `vertex` 个顶点的区域编号.
    #[inline]
    pub fn region(&self, vertex: usize) -> i32 {
        self.regions[vertex]
    }

    /// 全部区域编号.
    #[inline]
    pub fn regions(&self) -> &[i32] {
        &self.regions
    }

    /// 注释条目个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// 检查注释长度与网格顶点个数一致.
    pub fn check_against(&self, surface: &Surface) -> Result<(), GeometryError> {
        if self.len() == surface.n_vertices() {
            Ok(())
        } else {
            Err(GeometryError::AnnotationLength {
                annotated: self.len(),
                n_vertices: surface.n_vertices(),
            })
        }
    }

    /// 从文件加载.
    pub fn open<P: AsRef<Path>>(path: P) -> BullseyeResult<Self> {
        read_compressed(path.as_ref())
    }

    /// 保存到文件.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> BullseyeResult<()> {
        write_compressed(self, path.as_ref())
    }
}

fn write_compressed<T: Serialize>(value: &T, path: &Path) -> BullseyeResult<()> {
    let file = File::create(path)?;
    let mut encoder = ZlibEncoder::new(BufWriter::new(file), Compression::default());
    bincode::serialize_into(&mut encoder, value)?;
    encoder.finish()?.flush()?;
    Ok(())
}

fn read_compressed<T: DeserializeOwned>(path: &Path) -> BullseyeResult<T> {
    let file = File::open(path)?;
    let decoder = ZlibDecoder::new(BufReader::new(file));
    Ok(bincode::deserialize_from(decoder)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BullseyeError;
    use crate::phantom;

    #[test]
    fn test_validate_face_index() {
        let s = Surface::new(
            vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0, 1, 2], [0, 1, 3]],
        );
        assert_eq!(
            s.validate(),
            Err(GeometryError::FaceIndex {
                face: 1,
                vertex: 3,
                n_vertices: 3
            })
        );
    }

    #[test]
    fn test_validate_non_finite() {
        let s = Surface::new(vec![[0.0; 3], [f64::NAN, 0.0, 0.0]], vec![]);
        assert_eq!(
            s.validate(),
            Err(GeometryError::NonFiniteVertex { vertex: 1 })
        );
    }

    #[test]
    fn test_surface_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lh.outer.srf");
        let s = phantom::sphere([8.0; 3], 6.0, 1);
        s.save(&path).unwrap();
        assert_eq!(Surface::open(&path).unwrap(), s);

        let ann_path = dir.path().join("lh.annot.ann");
        let ann = VertexAnnotation::uniform(s.n_vertices(), 28);
        ann.save(&ann_path).unwrap();
        let back = VertexAnnotation::open(&ann_path).unwrap();
        assert_eq!(back, ann);
        assert!(back.check_against(&s).is_ok());
        assert!(VertexAnnotation::uniform(3, 28).check_against(&s).is_err());
    }

    #[test]
    fn test_open_rejects_bad_faces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.srf");
        Surface::new(vec![[0.0; 3]], vec![[0, 0, 5]])
            .save(&path)
            .unwrap();
        assert!(matches!(
            Surface::open(&path),
            Err(BullseyeError::Geometry(GeometryError::FaceIndex { .. }))
        ));
    }
}
