use std::time::Duration;

use hybrid_core::tolerance::Tolerance;

/// 扩展字典中保存顶点元数据的键（容器/记录）。
pub const DEFAULT_METADATA_KEY: &str = "HybridData/Data";

/// 编号气泡与分类符号的命名与外观。
#[derive(Debug, Clone)]
pub struct MarkerSettings {
    pub numbering_block: String,
    pub number_tag: String,
    pub id_tag: String,
    pub layer: String,
    pub text_height: f64,
    pub classification_prefix: String,
    pub classification_scale: f64,
    pub place_classification: bool,
}

impl Default for MarkerSettings {
    fn default() -> Self {
        Self {
            numbering_block: "Hybrd Num".to_string(),
            number_tag: "NUMBER".to_string(),
            id_tag: "ID".to_string(),
            layer: "L-MON".to_string(),
            text_height: 2.5,
            classification_prefix: "Hybrid_".to_string(),
            classification_scale: 5.0,
            place_classification: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub style: String,
    pub layer: String,
    pub text_height: f64,
    pub row_height: f64,
    pub column_widths: Vec<f64>,
    pub polyline_layer: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            style: "Induction Bend".to_string(),
            layer: "Hybrid_Points_TBL".to_string(),
            text_height: 2.5,
            row_height: 4.0,
            column_widths: vec![40.0, 60.0, 60.0, 40.0, 120.0],
            polyline_layer: "0".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardSettings {
    pub warning_cooldown: Duration,
    pub pass_through_commands: Vec<String>,
}

impl GuardSettings {
    pub fn default_pass_through() -> Vec<String> {
        [
            "MOVE", "COPY", "ROTATE", "SCALE", "MIRROR", "STRETCH", "UNDO", "U", "REDO", "MREDO",
            "SAVE", "QSAVE", "SAVEAS", "INSERT", "PASTECLIP", "PASTEORIG", "COPYCLIP", "GRIP_MOVE",
            "ATTSYNC", "REGEN",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            warning_cooldown: Duration::from_secs(60),
            pass_through_commands: Self::default_pass_through(),
        }
    }
}

/// 引擎运行参数，由前端从应用配置映射而来。
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub tolerance: Tolerance,
    pub metadata_key: String,
    pub payload_decimals: u32,
    pub markers: MarkerSettings,
    pub report: ReportSettings,
    pub guard: GuardSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            metadata_key: DEFAULT_METADATA_KEY.to_string(),
            payload_decimals: 3,
            markers: MarkerSettings::default(),
            report: ReportSettings::default(),
            guard: GuardSettings::default(),
        }
    }
}
