//! 运行配置.
//!
//! 配置以 TOML 文件给出, 缺省字段取默认值. 默认值对应 FreeSurfer `aseg`
//! 标签约定与 Desikan-Killiany 皮层图谱.
//!
//! ```toml
//! mismatch_tolerance = 0.01
//!
//! [depth]
//! n_shells = 4
//! distance = "exact"
//!
//! [mapper]
//! method = "nearest_vertex"
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{aseg, desikan, label};
use crate::error::{BullseyeError, BullseyeResult};
use crate::surface::Hemisphere;

/// 指定配置文件路径的环境变量.
pub const CONFIG_ENV: &str = "BULLSEYE_CONFIG";

/// 完整配置. 构造后不可变, 由调用方显式传入每个阶段.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BullseyeConfig {
    /// 分割标签集合.
    pub labels: LabelSets,
    /// 区域 -> 脑叶对照表.
    pub lobes: LobeTable,
    /// 深度场参数.
    pub depth: DepthConfig,
    /// 边界投影参数.
    pub projector: ProjectorConfig,
    /// 脑叶映射参数.
    pub mapper: MapperConfig,
    /// 允许的分区不一致比例.
    pub mismatch_tolerance: f64,
    /// 是否输出质控 PNG 快照.
    pub qc_snapshots: bool,
}

impl Default for BullseyeConfig {
    fn default() -> Self {
        Self {
            labels: LabelSets::default(),
            lobes: LobeTable::default(),
            depth: DepthConfig::default(),
            projector: ProjectorConfig::default(),
            mapper: MapperConfig::default(),
            mismatch_tolerance: 0.01,
            qc_snapshots: false,
        }
    }
}

/// 两个半球的分割标签集合.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelSets {
    /// 左半球.
    pub left: HemisphereLabels,
    /// 右半球.
    pub right: HemisphereLabels,
}

impl LabelSets {
    /// 获取半球 `h` 的标签集合.
    #[inline]
    pub fn of(&self, h: Hemisphere) -> &HemisphereLabels {
        match h {
            Hemisphere::Left => &self.left,
            Hemisphere::Right => &self.right,
        }
    }

    /// 双侧核团标签的并集.
    pub fn all_nuclei(&self) -> Vec<i32> {
        self.left
            .nuclei
            .iter()
            .chain(self.right.nuclei.iter())
            .copied()
            .collect()
    }
}

impl Default for LabelSets {
    fn default() -> Self {
        Self {
            left: HemisphereLabels {
                white_matter: vec![aseg::LEFT_WHITE_MATTER],
                ventricles: vec![aseg::LEFT_LATERAL_VENTRICLE, aseg::LEFT_INF_LAT_VENT],
                nuclei: vec![
                    aseg::LEFT_THALAMUS,
                    aseg::LEFT_CAUDATE,
                    aseg::LEFT_PUTAMEN,
                    aseg::LEFT_PALLIDUM,
                    aseg::LEFT_ACCUMBENS,
                ],
            },
            right: HemisphereLabels {
                white_matter: vec![aseg::RIGHT_WHITE_MATTER],
                ventricles: vec![aseg::RIGHT_LATERAL_VENTRICLE, aseg::RIGHT_INF_LAT_VENT],
                nuclei: vec![
                    aseg::RIGHT_THALAMUS,
                    aseg::RIGHT_CAUDATE,
                    aseg::RIGHT_PUTAMEN,
                    aseg::RIGHT_PALLIDUM,
                    aseg::RIGHT_ACCUMBENS,
                ],
            },
        }
    }
}

/// 单个半球的分割标签集合.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HemisphereLabels {
    /// 白质标签.
    pub white_matter: Vec<i32>,
    /// 脑室标签. 未提供内表面时, 由其构造内边界.
    pub ventricles: Vec<i32>,
    /// 皮层下核团 (基底节 + 丘脑) 标签.
    pub nuclei: Vec<i32>,
}

impl HemisphereLabels {
    /// 该标签是否属于此半球的处理域 (白质 ∪ 核团)?
    #[inline]
    pub fn is_domain(&self, v: i32) -> bool {
        self.white_matter.contains(&v) || self.nuclei.contains(&v)
    }

    fn all(&self) -> impl Iterator<Item = &i32> {
        self.white_matter
            .iter()
            .chain(self.ventricles.iter())
            .chain(self.nuclei.iter())
    }
}

/// 半球内的四个脑叶类别.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobeCategory {
    /// 额叶.
    Frontal,
    /// 顶叶.
    Parietal,
    /// 颞叶.
    Temporal,
    /// 枕叶.
    Occipital,
}

impl LobeCategory {
    /// 全部类别, 按脑叶标签顺序.
    pub const ALL: [Self; 4] = [
        Self::Frontal,
        Self::Parietal,
        Self::Temporal,
        Self::Occipital,
    ];

    /// 输出中的脑叶标签. 左半球为 1..=4, 右半球为 5..=8.
    #[inline]
    pub const fn lobe_id(self, h: Hemisphere) -> u8 {
        let base = match h {
            Hemisphere::Left => 0,
            Hemisphere::Right => label::LOBES_PER_HEMISPHERE,
        };
        let ordinal = match self {
            Self::Frontal => 1,
            Self::Parietal => 2,
            Self::Temporal => 3,
            Self::Occipital => 4,
        };
        base + ordinal
    }
}

/// 区域 -> 脑叶对照表. 在配置中按类别列出区域编号.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LobeTable {
    /// 额叶区域.
    pub frontal: Vec<i32>,
    /// 顶叶区域.
    pub parietal: Vec<i32>,
    /// 颞叶区域.
    pub temporal: Vec<i32>,
    /// 枕叶区域.
    pub occipital: Vec<i32>,
    /// 不参与映射的区域 (未知区域, 内侧壁, 胼胝体). 这些顶点不进入最近邻索引.
    pub ignored: Vec<i32>,
}

impl Default for LobeTable {
    fn default() -> Self {
        use desikan::*;
        Self {
            frontal: vec![
                CAUDAL_MIDDLE_FRONTAL,
                LATERAL_ORBITOFRONTAL,
                MEDIAL_ORBITOFRONTAL,
                PARACENTRAL,
                PARS_OPERCULARIS,
                PARS_ORBITALIS,
                PARS_TRIANGULARIS,
                PRECENTRAL,
                ROSTRAL_MIDDLE_FRONTAL,
                SUPERIOR_FRONTAL,
                FRONTAL_POLE,
                CAUDAL_ANTERIOR_CINGULATE,
                ROSTRAL_ANTERIOR_CINGULATE,
                INSULA,
            ],
            parietal: vec![
                INFERIOR_PARIETAL,
                POSTCENTRAL,
                PRECUNEUS,
                SUPERIOR_PARIETAL,
                SUPRAMARGINAL,
                POSTERIOR_CINGULATE,
                ISTHMUS_CINGULATE,
            ],
            temporal: vec![
                BANKSSTS,
                ENTORHINAL,
                FUSIFORM,
                INFERIOR_TEMPORAL,
                MIDDLE_TEMPORAL,
                PARAHIPPOCAMPAL,
                SUPERIOR_TEMPORAL,
                TEMPORAL_POLE,
                TRANSVERSE_TEMPORAL,
            ],
            occipital: vec![CUNEUS, LATERAL_OCCIPITAL, LINGUAL, PERICALCARINE],
            ignored: vec![MEDIAL_WALL, UNKNOWN, CORPUS_CALLOSUM],
        }
    }
}

impl LobeTable {
    fn categories(&self) -> [(LobeCategory, &[i32]); 4] {
        [
            (LobeCategory::Frontal, self.frontal.as_slice()),
            (LobeCategory::Parietal, self.parietal.as_slice()),
            (LobeCategory::Temporal, self.temporal.as_slice()),
            (LobeCategory::Occipital, self.occipital.as_slice()),
        ]
    }

    /// 构建查找表. 同一区域出现在多个类别 (或同时被忽略) 时返回 `Err`.
    pub fn lookup(&self) -> BullseyeResult<LobeLookup> {
        let mut map = HashMap::new();
        for (category, regions) in self.categories() {
            for &r in regions {
                if let Some(old) = map.insert(r, category) {
                    return Err(BullseyeError::Config(format!(
                        "region {r} is listed as both {old:?} and {category:?}"
                    )));
                }
            }
        }
        let ignored: HashSet<i32> = self.ignored.iter().copied().collect();
        if let Some(r) = ignored.iter().find(|r| map.contains_key(r)) {
            return Err(BullseyeError::Config(format!(
                "region {r} is both ignored and assigned to a lobe"
            )));
        }
        Ok(LobeLookup { map, ignored })
    }
}

/// 由 [`LobeTable`] 构建的查找表.
#[derive(Debug, Clone)]
pub struct LobeLookup {
    map: HashMap<i32, LobeCategory>,
    ignored: HashSet<i32>,
}

impl LobeLookup {
    /// 区域所属的脑叶类别. 对照表中不存在时返回 `None`.
    #[inline]
    pub fn category(&self, region: i32) -> Option<LobeCategory> {
        self.map.get(&region).copied()
    }

    /// 该区域是否被忽略?
    #[inline]
    pub fn is_ignored(&self, region: i32) -> bool {
        self.ignored.contains(&region)
    }
}

/// 距离变换策略.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMethod {
    /// 精确欧氏距离变换.
    #[default]
    Exact,
    /// 26-邻域 chamfer 近似.
    Chamfer,
}

/// 深度场参数.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DepthConfig {
    /// 壳层个数, 取值 `1..=9`.
    pub n_shells: u8,
    /// 距离变换策略.
    pub distance: DistanceMethod,
    /// 距离是否以毫米 (体素分辨率) 计算. 否则以体素为单位.
    pub use_voxel_spacing: bool,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            n_shells: label::DEFAULT_N_SHELLS,
            distance: DistanceMethod::Exact,
            use_voxel_spacing: false,
        }
    }
}

/// 边界投影参数.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectorConfig {
    /// 带宽, 以体素为单位. 体素中心到三角形距离不超过该值时被标记.
    pub band: f64,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self { band: 1.0 }
    }
}

/// 脑叶标签的生成方式.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobeMethod {
    /// 每个体素取外表面最近顶点的脑叶.
    #[default]
    NearestVertex,
    /// 从外边界沿深度梯度向内传播, 无法到达的体素退化为最近顶点.
    GradientPropagation,
}

/// 脑叶映射参数.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    /// 生成方式.
    pub method: LobeMethod,
}

impl BullseyeConfig {
    /// 从 TOML 字符串解析并校验.
    pub fn from_toml_str(s: &str) -> BullseyeResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载并校验.
    pub fn open<P: AsRef<Path>>(path: P) -> BullseyeResult<Self> {
        let s = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&s)
    }

    /// 若设置了环境变量 [`CONFIG_ENV`] 则从该路径加载, 否则使用默认配置.
    pub fn from_env_or_default() -> BullseyeResult<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                log::info!("loading configuration from {}", Path::new(&path).display());
                Self::open(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// 检查配置的一致性.
    pub fn validate(&self) -> BullseyeResult<()> {
        let invalid = |msg: String| Err(BullseyeError::Config(msg));

        let n = self.depth.n_shells;
        if !(1..=label::MAX_SHELLS).contains(&n) {
            return invalid(format!(
                "depth.n_shells must be in 1..={}, got {n}",
                label::MAX_SHELLS
            ));
        }
        if !(self.projector.band.is_finite() && self.projector.band > 0.0) {
            return invalid(format!(
                "projector.band must be positive, got {}",
                self.projector.band
            ));
        }
        if !(0.0..=1.0).contains(&self.mismatch_tolerance) {
            return invalid(format!(
                "mismatch_tolerance must be in [0, 1], got {}",
                self.mismatch_tolerance
            ));
        }

        // 不同半球/不同角色的分割标签不能重叠.
        let mut seen = HashSet::new();
        for h in Hemisphere::ALL {
            let labels = self.labels.of(h);
            if labels.white_matter.is_empty() {
                return invalid(format!("labels.{}.white_matter is empty", h.prefix()));
            }
            for &v in labels.all() {
                if !seen.insert(v) {
                    return invalid(format!("segmentation label {v} is listed more than once"));
                }
            }
        }

        self.lobes.lookup().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let c = BullseyeConfig::default();
        assert!(c.validate().is_ok());
        let lookup = c.lobes.lookup().unwrap();
        // Desikan-Killiany 的 35 个结构中, 除去 unknown 与胼胝体, 均有归属.
        for region in 1..=35 {
            if region == desikan::CORPUS_CALLOSUM {
                assert!(lookup.is_ignored(region));
            } else {
                assert!(lookup.category(region).is_some(), "region {region}");
            }
        }
        assert!(lookup.is_ignored(desikan::MEDIAL_WALL));
        assert_eq!(lookup.category(desikan::INSULA), Some(LobeCategory::Frontal));
    }

    #[test]
    fn test_lobe_ids() {
        assert_eq!(LobeCategory::Frontal.lobe_id(Hemisphere::Left), 1);
        assert_eq!(LobeCategory::Occipital.lobe_id(Hemisphere::Left), 4);
        assert_eq!(LobeCategory::Frontal.lobe_id(Hemisphere::Right), 5);
        assert_eq!(LobeCategory::Occipital.lobe_id(Hemisphere::Right), 8);
    }

    #[test]
    fn test_parse_partial_toml() {
        let s = r#"
            mismatch_tolerance = 0.05

            [depth]
            n_shells = 6
            distance = "chamfer"

            [mapper]
            method = "gradient_propagation"
        "#;
        let c = BullseyeConfig::from_toml_str(s).unwrap();
        assert_eq!(c.depth.n_shells, 6);
        assert_eq!(c.depth.distance, DistanceMethod::Chamfer);
        assert_eq!(c.mapper.method, LobeMethod::GradientPropagation);
        assert_eq!(c.mismatch_tolerance, 0.05);
        // 未给出的字段取默认值.
        assert_eq!(c.projector.band, 1.0);
        assert_eq!(c.labels, LabelSets::default());
    }

    #[test]
    fn test_reject_invalid() {
        assert!(matches!(
            BullseyeConfig::from_toml_str("[depth]\nn_shells = 10"),
            Err(BullseyeError::Config(_))
        ));
        assert!(matches!(
            BullseyeConfig::from_toml_str("[projector]\nband = 0.0"),
            Err(BullseyeError::Config(_))
        ));
        assert!(matches!(
            BullseyeConfig::from_toml_str("[lobes]\nfrontal = [1]\ntemporal = [1]"),
            Err(BullseyeError::Config(_))
        ));
        assert!(matches!(
            BullseyeConfig::from_toml_str("[labels.right]\nwhite_matter = [2]"),
            Err(BullseyeError::Config(_))
        ));
        assert!(matches!(
            BullseyeConfig::from_toml_str("unknown_key = 1"),
            Err(BullseyeError::Toml(_))
        ));
    }
}
