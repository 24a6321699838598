use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 报表固定五列：序号、北坐标、东坐标、分类、描述。
pub const REPORT_COLUMNS: usize = 5;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub drawing: DrawingConfig,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub markers: MarkerConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub guard: GuardConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(|message| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `HYBRID_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("HYBRID_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.tolerance.display_precision > 12 {
            return Err(format!(
                "tolerance.display_precision must be at most 12, got {}",
                self.tolerance.display_precision
            ));
        }
        if self.metadata.decimals > 12 {
            return Err(format!(
                "metadata.decimals must be at most 12, got {}",
                self.metadata.decimals
            ));
        }
        if !(self.tolerance.min_epsilon.is_finite() && self.tolerance.min_epsilon > 0.0) {
            return Err("tolerance.min_epsilon must be a positive number".to_string());
        }
        if self.report.column_widths.len() != REPORT_COLUMNS {
            return Err(format!(
                "report.column_widths needs {REPORT_COLUMNS} entries, got {}",
                self.report.column_widths.len()
            ));
        }
        let sizes = [
            ("report.text_height", self.report.text_height),
            ("report.row_height", self.report.row_height),
            ("markers.text_height", self.markers.text_height),
            ("markers.classification_scale", self.markers.classification_scale),
        ];
        for (name, value) in sizes {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("{name} must be a positive number"));
            }
        }
        if self.markers.number_tag.eq_ignore_ascii_case(&self.markers.id_tag) {
            return Err("markers.number_tag and markers.id_tag must differ".to_string());
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 未通过命令行指定图纸时的默认图纸路径。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrawingConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToleranceConfig {
    /// 坐标显示精度（小数位数），决定匹配容差 `0.5·10^-n`。
    #[serde(default = "ToleranceConfig::default_precision")]
    pub display_precision: u32,
    /// 容差下限。
    #[serde(default = "ToleranceConfig::default_min_epsilon")]
    pub min_epsilon: f64,
}

impl ToleranceConfig {
    fn default_precision() -> u32 {
        2
    }

    fn default_min_epsilon() -> f64 {
        1e-4
    }
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            display_precision: Self::default_precision(),
            min_epsilon: Self::default_min_epsilon(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "MetadataConfig::default_key")]
    pub key: String,
    #[serde(default = "MetadataConfig::default_decimals")]
    pub decimals: u32,
}

impl MetadataConfig {
    fn default_key() -> String {
        "HybridData/Data".to_string()
    }

    fn default_decimals() -> u32 {
        3
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            key: Self::default_key(),
            decimals: Self::default_decimals(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub numbering_block: String,
    pub number_tag: String,
    pub id_tag: String,
    pub layer: String,
    pub text_height: f64,
    pub classification_prefix: String,
    pub classification_scale: f64,
    pub place_classification: bool,
}

impl Default for MarkerConfig {
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

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub style: String,
    pub layer: String,
    pub text_height: f64,
    pub row_height: f64,
    pub column_widths: Vec<f64>,
    /// 由报表重建的多段线所在图层。
    pub polyline_layer: String,
}

impl Default for ReportConfig {
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

#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    #[serde(default = "GuardConfig::default_cooldown")]
    pub warning_cooldown_secs: u64,
    /// 为空时使用内置放行名单。
    #[serde(default)]
    pub pass_through_commands: Vec<String>,
}

impl GuardConfig {
    fn default_cooldown() -> u64 {
        60
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            warning_cooldown_secs: Self::default_cooldown(),
            pass_through_commands: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置文件 {path:?} 无效: {message}")]
    Invalid { path: PathBuf, message: String },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.drawing.path.is_none());
        assert_eq!(cfg.tolerance.display_precision, 2);
        assert_eq!(cfg.metadata.key, "HybridData/Data");
        assert_eq!(cfg.markers.numbering_block, "Hybrd Num");
        assert_eq!(cfg.report.column_widths.len(), REPORT_COLUMNS);
        assert_eq!(cfg.guard.warning_cooldown_secs, 60);
        assert!(cfg.guard.pass_through_commands.is_empty());
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [drawing]
            path = "../drawings/site.json"

            [tolerance]
            display_precision = 3

            [markers]
            layer = "SURVEY"
            place_classification = false

            [report]
            style = "Survey Points"

            [guard]
            warning_cooldown_secs = 5
            pass_through_commands = ["MOVE", "UNDO"]
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(
            cfg.drawing
                .path
                .as_deref()
                .map(|p| p.to_string_lossy().to_string()),
            Some("../drawings/site.json".to_string())
        );
        assert_eq!(cfg.tolerance.display_precision, 3);
        assert_eq!(cfg.tolerance.min_epsilon, 1e-4);
        assert_eq!(cfg.markers.layer, "SURVEY");
        assert_eq!(cfg.markers.id_tag, "ID");
        assert!(!cfg.markers.place_classification);
        assert_eq!(cfg.report.style, "Survey Points");
        assert_eq!(cfg.report.layer, "Hybrid_Points_TBL");
        assert_eq!(cfg.guard.warning_cooldown_secs, 5);
        assert_eq!(cfg.guard.pass_through_commands, vec!["MOVE", "UNDO"]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [report]
            column_widths = [40.0, 60.0]
            "#
        )
        .unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[metadata]\ndecimals = 400").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Invalid { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[markers]\nnumber_tag = \"ID\"").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[tolerance\ndisplay_precision = ").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
