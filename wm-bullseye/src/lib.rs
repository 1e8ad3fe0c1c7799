#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 将脑白质按 "脑叶 × 深度" 划分为 bullseye 分区.
//!
//! 输入为被试的分割体数据 (如 FreeSurfer `aseg`), 每个半球的内/外边界三角网格
//! (脑室表面 / 白质-皮层表面), 以及外表面逐顶点的皮层分区注释.
//! 输出为与分割体数据共享网格和几何信息的三个标签体数据:
//!
//! 1. 脑叶标签 (0 为背景, 1..=4 左半球, 5..=8 右半球, 9 为中央区);
//! 2. 深度 (壳层) 标签 (0 为背景, 1 最靠近脑室, `n_shells` 最靠近皮层);
//! 3. bullseye 复合标签 `depth * 10 + lobe`.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 体数据索引按照 nifti 原生的 `[i, j, k]` 顺序访问, 与表面顶点坐标
//!   (体素索引空间) 保持一致. 这与 CT 切片常用的 `(z, h, w)` 习惯不同.
//! 2. 所有配置均通过不可变的 [`BullseyeConfig`] 显式传入,
//!   不存在全局可变状态. 因此不同被试可以安全地并行处理.
//!
//! # 开发计划
//!
//! ### 边界投影 ✅
//!
//! 将闭合三角网格光栅化为二值体素掩膜 (距离三角形不超过一个体素带宽的体素).
//!
//! 实现位于 `wm-bullseye/src/surface`.
//!
//! ### 脑叶映射 ✅
//!
//! 对每个白质体素查询外表面最近的 (已注释) 顶点, 并按照固定的
//! 区域 -> 脑叶对照表归类. 皮层下核团 (基底节 + 丘脑) 始终覆盖为中央区.
//! 最近邻查询通过可替换的 [`NearestIndex`] 接口实现, 默认为 k-d 树.
//!
//! 另外提供沿归一化深度梯度向内传播标签的方式.
//!
//! 实现位于 `wm-bullseye/src/annot`.
//!
//! ### 深度场 ✅
//!
//! 两次欧氏距离变换 (到内边界, 到外边界) 之比给出 `[0, 1]` 间的归一化深度,
//! 再等宽量化为壳层. 距离变换通过可替换的 [`DistanceTransform`] 接口实现,
//! 提供精确 (可分离抛物线下包络) 与近似 (26-邻域 chamfer) 两种策略.
//!
//! 实现位于 `wm-bullseye/src/depth`.
//!
//! ### bullseye 合成 ✅
//!
//! 按整数运算合成复合标签, 并统计两个分区在白质掩膜上不一致的体素.
//!
//! 实现位于 `wm-bullseye/src/compose.rs`.
//!
//! ### 数据集与持久化 ✅
//!
//! 1. 被试目录加载器 (迭代器风格). ✅
//! 2. 输出体数据先写入临时文件, 全部成功后再重命名. ✅
//! 3. 输出切片的 PNG 快照, 便于人工质控. ✅
//!
//! ### 最近点查询升级到三角形内部最近点 ⌛️
//!
//! 目前脑叶映射采用最近顶点近似, 在脑沟边界处可能与最近三角形点的结果不同.

/// 三维索引 `(i, j, k)`.
pub type Idx3d = (usize, usize, usize);

/// 体素索引空间中的三维点 `[i, j, k]`.
pub type Point3 = [f64; 3];

/// 体数据与标签.
mod data;

pub use data::{save_slice_png, ImgWriteVis, LabelVolume, NiftiHeaderAttr, SegVolume};

pub mod annot;
pub mod compose;
pub mod config;
pub mod consts;
pub mod dataset;
pub mod depth;
pub mod error;
pub mod pipeline;
pub mod prelude;
pub mod surface;

pub use annot::NearestIndex;
pub use config::BullseyeConfig;
pub use depth::DistanceTransform;
pub use error::{BullseyeError, BullseyeResult, Stage, SubjectError};

#[cfg(test)]
mod phantom;
