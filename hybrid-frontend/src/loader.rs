use std::path::{Path, PathBuf};

use hybrid_config::AppConfig;
use hybrid_core::document::{Document, EntityId};
use hybrid_core::geometry::Point2;
use hybrid_engine::metadata::{MetadataStore, VertexRecord};
use hybrid_engine::settings::EngineSettings;
use hybrid_io::{DocumentLoader, JsonDrawing};
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 图纸来源，便于前端呈现加载信息。
#[derive(Debug, Clone)]
pub enum DrawingSource {
    File(PathBuf),
    Demo,
}

/// 加载后的图纸与元信息。
#[derive(Debug)]
pub struct LoadedDrawing {
    pub document: Document,
    pub source: DrawingSource,
    /// 内置示例中带元数据的多段线。
    pub demo_polyline: Option<EntityId>,
}

/// 依次尝试显式路径、配置中的 `drawing.path`，最后回退到内置示例。
///
/// 显式路径读取失败直接返回错误；配置路径失败只告警并回退。
pub fn load_drawing(
    explicit: Option<&Path>,
    config: &AppConfig,
    settings: &EngineSettings,
) -> Result<LoadedDrawing, FrontendError> {
    let loader = JsonDrawing::new();
    if let Some(path) = explicit {
        let document = loader.load(path)?;
        info!(path = %path.display(), "从文件加载图纸成功");
        return Ok(LoadedDrawing {
            document,
            source: DrawingSource::File(path.to_path_buf()),
            demo_polyline: None,
        });
    }

    if let Some(path) = &config.drawing.path {
        match loader.load(path) {
            Ok(document) => {
                info!(path = %path.display(), "从配置路径加载图纸成功");
                return Ok(LoadedDrawing {
                    document,
                    source: DrawingSource::File(path.clone()),
                    demo_polyline: None,
                });
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载图纸失败，回退到内置示例");
            }
        }
    }

    let (document, polyline) = demo_drawing(settings)?;
    Ok(LoadedDrawing {
        document,
        source: DrawingSource::Demo,
        demo_polyline: Some(polyline),
    })
}

/// 三个顶点的示例多段线，附带尚未编号的元数据。
pub fn demo_drawing(settings: &EngineSettings) -> Result<(Document, EntityId), FrontendError> {
    let mut document = Document::new();
    let points = [
        Point2::new(0.0, 0.0),
        Point2::new(10.0, 0.0),
        Point2::new(10.0, 10.0),
    ];
    let polyline = document.add_polyline(points, false, settings.report.polyline_layer.as_str());
    let records = [
        VertexRecord::at(points[0])
            .with_classification("XC")
            .with_description("Tag1"),
        VertexRecord::at(points[1]).with_description("Tag2"),
        VertexRecord::at(points[2])
            .with_classification("RC")
            .with_description("Tag3"),
    ];
    MetadataStore::new(settings.metadata_key.as_str(), settings.payload_decimals).write(
        &mut document,
        polyline,
        &records,
    )?;
    Ok((document, polyline))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_io::DocumentSaver;

    #[test]
    fn demo_is_used_without_any_path() {
        let settings = EngineSettings::default();
        let loaded = load_drawing(None, &AppConfig::default(), &settings).expect("加载示例失败");
        assert!(matches!(loaded.source, DrawingSource::Demo));
        let polyline = loaded.demo_polyline.expect("示例应包含多段线");
        let payload = loaded
            .document
            .extension(polyline, &settings.metadata_key)
            .expect("示例应包含元数据");
        assert!(payload.contains("Tag3"));
    }

    #[test]
    fn unreadable_config_path_falls_back_to_demo() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let mut config = AppConfig::default();
        config.drawing.path = Some(dir.path().join("missing.json"));
        let loaded =
            load_drawing(None, &config, &EngineSettings::default()).expect("应回退到示例");
        assert!(matches!(loaded.source, DrawingSource::Demo));
    }

    #[test]
    fn explicit_path_is_loaded_or_reported() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let settings = EngineSettings::default();
        let path = dir.path().join("site.json");
        let (document, polyline) = demo_drawing(&settings).expect("构建示例失败");
        JsonDrawing::new().save(&document, &path).expect("保存失败");

        let loaded = load_drawing(Some(&path), &AppConfig::default(), &settings)
            .expect("读取图纸失败");
        assert!(matches!(loaded.source, DrawingSource::File(_)));
        assert!(loaded.document.polyline(polyline).is_some());

        let missing = dir.path().join("absent.json");
        assert!(matches!(
            load_drawing(Some(&missing), &AppConfig::default(), &settings),
            Err(FrontendError::Io(_))
        ));
    }
}
