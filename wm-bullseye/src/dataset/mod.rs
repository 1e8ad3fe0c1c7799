//! 数据集操作.
//!
//! 被试目录的约定布局 (以 `{root}/{subject}` 为根):
//!
//! ```text
//! mri/aseg.nii[.gz]          分割体数据
//! surf/{lh,rh}.outer.srf     外边界表面
//! surf/{lh,rh}.inner.srf     内边界表面 (可选)
//! label/{lh,rh}.annot.ann    外表面逐顶点注释
//! ```
//!
//! 缺少外表面的半球被忽略. 提供迭代器风格的数据集获取模式.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::BullseyeResult;
use crate::pipeline::{HemisphereInputs, SubjectInputs};
use crate::surface::{Hemisphere, Surface, VertexAnnotation};
use crate::SegVolume;

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 单个被试目录下各文件的路径.
#[derive(Debug, Clone)]
pub struct SubjectLayout {
    dir: PathBuf,
}

impl SubjectLayout {
    /// 被试 `subject` 位于 `root` 下的布局.
    pub fn new<P: AsRef<Path>>(root: P, subject: &str) -> Self {
        Self {
            dir: root.as_ref().join(subject),
        }
    }

    /// 被试目录.
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 分割体数据路径. 优先 `aseg.nii.gz`, 其次 `aseg.nii`; 均不存在时返回 `None`.
    pub fn segmentation(&self) -> Option<PathBuf> {
        ["aseg.nii.gz", "aseg.nii"]
            .into_iter()
            .map(|name| self.dir.join("mri").join(name))
            .find(|p| p.is_file())
    }

    /// 写入分割体数据时使用的路径.
    pub fn segmentation_target(&self) -> PathBuf {
        self.dir.join("mri").join("aseg.nii.gz")
    }

    /// 外边界表面路径.
    pub fn outer_surface(&self, h: Hemisphere) -> PathBuf {
        self.dir.join("surf").join(format!("{}.outer.srf", h.prefix()))
    }

    /// 内边界表面路径.
    pub fn inner_surface(&self, h: Hemisphere) -> PathBuf {
        self.dir.join("surf").join(format!("{}.inner.srf", h.prefix()))
    }

    /// 注释路径.
    pub fn annotation(&self, h: Hemisphere) -> PathBuf {
        self.dir.join("label").join(format!("{}.annot.ann", h.prefix()))
    }

    /// 加载该被试的全部输入.
    pub fn load(&self, subject: &str) -> BullseyeResult<SubjectInputs> {
        let seg_path = self
            .segmentation()
            .unwrap_or_else(|| self.segmentation_target());
        let segmentation = SegVolume::open(seg_path)?;

        let mut hemispheres = Vec::with_capacity(Hemisphere::ALL.len());
        for h in Hemisphere::ALL {
            let outer_path = self.outer_surface(h);
            if !outer_path.is_file() {
                log::debug!("`{subject}` has no {h} outer surface");
                continue;
            }
            let inner_path = self.inner_surface(h);
            let inner = if inner_path.is_file() {
                Some(Surface::open(inner_path)?)
            } else {
                None
            };
            hemispheres.push(HemisphereInputs {
                hemisphere: h,
                outer: Surface::open(outer_path)?,
                inner,
                annotation: VertexAnnotation::open(self.annotation(h))?,
            });
        }

        Ok(SubjectInputs {
            subject: subject.to_owned(),
            segmentation,
            hemispheres,
        })
    }

    /// 按约定布局保存被试输入.
    pub fn save(&self, inputs: &SubjectInputs) -> BullseyeResult<()> {
        for sub in ["mri", "surf", "label"] {
            fs::create_dir_all(self.dir.join(sub))?;
        }
        inputs.segmentation.save(self.segmentation_target())?;
        for h in inputs.hemispheres.iter() {
            h.outer.save(self.outer_surface(h.hemisphere))?;
            if let Some(inner) = h.inner.as_ref() {
                inner.save(self.inner_surface(h.hemisphere))?;
            }
            h.annotation.save(self.annotation(h.hemisphere))?;
        }
        Ok(())
    }
}

/// 列出 `root` 下所有包含分割体数据的被试目录名, 按字典序排列.
pub fn list_subjects<P: AsRef<Path>>(root: P) -> BullseyeResult<Vec<String>> {
    let root = root.as_ref();
    let mut ans = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if SubjectLayout::new(root, &name).segmentation().is_some() {
            ans.push(name);
        }
    }
    ans.sort_unstable();
    Ok(ans)
}

/// 从被试编号和数据集根目录创建被试加载器.
///
/// # 注意
///
/// 1. `root` 必须是目录, 否则程序 panic.
/// 2. `subjects` 中的每个编号都必须在 `root` 下有符合约定布局的目录,
///   否则加载器在迭代时会返回 `Result::Err`.
pub fn subject_loader<S, I, P>(subjects: I, root: P) -> SubjectLoader
where
    S: Into<String>,
    I: IntoIterator<Item = S>,
    P: AsRef<Path>,
{
    let root = root.as_ref().to_owned();
    assert!(root.is_dir());

    let mut subjects: Vec<String> = subjects.into_iter().map(Into::into).collect();
    subjects.reverse();

    SubjectLoader {
        root,
        subjects_rev: subjects,
    }
}

/// 被试输入加载器, 按给定顺序逐个加载.
#[derive(Debug)]
pub struct SubjectLoader {
    root: PathBuf,
    subjects_rev: Vec<String>,
}

impl Iterator for SubjectLoader {
    type Item = (String, BullseyeResult<SubjectInputs>);

    fn next(&mut self) -> Option<Self::Item> {
        let subject = self.subjects_rev.pop()?;
        let data = SubjectLayout::new(&self.root, &subject).load(&subject);
        Some((subject, data))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.subjects_rev.len(), Some(self.subjects_rev.len()))
    }
}

impl ExactSizeIterator for SubjectLoader {
    #[inline]
    fn len(&self) -> usize {
        self.subjects_rev.len()
    }
}
