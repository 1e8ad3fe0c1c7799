//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx3d, Point3};

pub use crate::data::{save_slice_png, ImgWriteVis, LabelVolume, NiftiHeaderAttr, SegVolume};

pub use crate::annot::{BruteForce, KdTree, LabelResolver, LobeSource, NearestIndex};
pub use crate::compose::{compose, decode, encode, overlay, Composition, MismatchCount};
pub use crate::config::{BullseyeConfig, DistanceMethod, LobeMethod};
pub use crate::depth::{quantize, ChamferDistance, DepthField, DistanceTransform, ExactEdt};
pub use crate::surface::{project, Boundary, Hemisphere, Surface, VertexAnnotation};

pub use crate::consts::label::{BACKGROUND, CENTRAL_LOBE, DEFAULT_N_SHELLS};

pub use crate::dataset::{self, home_dataset_dir_with, list_subjects, subject_loader};
pub use crate::error::{BullseyeError, BullseyeResult, Stage, SubjectError};
pub use crate::pipeline::{run_subject, BullseyeOutputs, HemisphereInputs, SubjectInputs};
