use std::collections::HashSet;
use std::fs;
use std::path::Path;

use hybrid_core::document::Document;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// 图纸文件格式标识与当前版本。
pub const DRAWING_FORMAT: &str = "hybrid-drawing";
pub const DRAWING_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

#[derive(Serialize)]
struct DrawingFileRef<'a> {
    format: &'a str,
    version: u32,
    document: &'a Document,
}

#[derive(Deserialize)]
struct DrawingFile {
    format: String,
    version: u32,
    document: Document,
}

/// JSON 图纸文件的读写入口。
pub struct JsonDrawing;

impl Default for JsonDrawing {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonDrawing {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, document: &Document) -> Result<String, IoError> {
        let file = DrawingFileRef {
            format: DRAWING_FORMAT,
            version: DRAWING_VERSION,
            document,
        };
        serde_json::to_string_pretty(&file)
            .map_err(|err| IoError::InvalidDocument(err.to_string()))
    }

    pub fn decode(&self, data: &str) -> Result<Document, IoError> {
        let file: DrawingFile = serde_json::from_str(data)
            .map_err(|err| IoError::InvalidDocument(err.to_string()))?;
        if file.format != DRAWING_FORMAT {
            return Err(IoError::InvalidDocument(format!(
                "unexpected format `{}`",
                file.format
            )));
        }
        if file.version > DRAWING_VERSION {
            return Err(IoError::UnsupportedFeature(format!(
                "drawing version {} (newest supported is {DRAWING_VERSION})",
                file.version
            )));
        }

        let mut document = file.document;
        let mut seen = HashSet::new();
        for (id, _) in document.entities() {
            if !seen.insert(id) {
                return Err(IoError::InvalidDocument(format!(
                    "entity id {} appears more than once",
                    id.get()
                )));
            }
        }
        let dropped = document.normalize();
        if dropped > 0 {
            warn!(dropped, "丢弃了指向不存在实体的扩展字典");
        }
        Ok(document)
    }
}

impl DocumentLoader for JsonDrawing {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let document = self.decode(&data)?;
        debug!(path = %path.display(), entities = document.entities().count(), "图纸已读取");
        Ok(document)
    }
}

impl DocumentSaver for JsonDrawing {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let data = self.encode(document)?;
        fs::write(path, data).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "图纸已保存");
        Ok(())
    }
}
