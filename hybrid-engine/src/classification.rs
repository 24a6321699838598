//! 分类符号（XC/RC/EC）的放置与推断。
//!
//! 分类符号没有持久标识，按容差位置与顶点分类匹配。只处理落在需要分类的
//! 顶点上的符号，其余位置的符号可能属于无关内容，一律不动。

use std::fmt;

use hybrid_core::geometry::Point2;
use hybrid_core::tolerance::{PointMap, Tolerance};
use tracing::debug;

use crate::errors::EngineError;
use crate::host::{MarkerDefinition, MarkerHost, MarkerRef};
use crate::metadata::VertexRecord;
use crate::settings::MarkerSettings;

/// 十字符号的半臂长。
const GLYPH_HALF_SIZE: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassificationKind {
    Xc,
    Rc,
    Ec,
}

impl ClassificationKind {
    pub const ALL: [ClassificationKind; 3] = [Self::Xc, Self::Rc, Self::Ec];

    /// 大小写不敏感并忽略首尾空白。
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.code().eq_ignore_ascii_case(value))
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Xc => "XC",
            Self::Rc => "RC",
            Self::Ec => "EC",
        }
    }

    pub fn block_name(self, prefix: &str) -> String {
        format!("{prefix}{}", self.code())
    }

    pub fn from_block_name(name: &str, prefix: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let prefix = prefix.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|kind| upper == format!("{prefix}{}", kind.code()))
    }

    pub fn definition(self, settings: &MarkerSettings) -> MarkerDefinition {
        let h = GLYPH_HALF_SIZE;
        MarkerDefinition {
            name: self.block_name(&settings.classification_prefix),
            attributes: Vec::new(),
            glyph: vec![
                (Point2::new(-h, 0.0), Point2::new(h, 0.0)),
                (Point2::new(0.0, -h), Point2::new(0.0, h)),
            ],
            text_height: settings.text_height,
        }
    }
}

impl fmt::Display for ClassificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementSummary {
    pub created: usize,
    pub kept: usize,
    pub replaced: usize,
}

impl fmt::Display for PlacementSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} placed, {} kept, {} replaced",
            self.created, self.kept, self.replaced
        )
    }
}

struct Wanted {
    kind: ClassificationKind,
    satisfied: bool,
}

pub fn ensure_classification_definitions<H: MarkerHost + ?Sized>(
    host: &mut H,
    settings: &MarkerSettings,
) {
    for kind in ClassificationKind::ALL {
        host.ensure_marker_definition(&kind.definition(settings));
    }
}

fn scan_classification_markers<H: MarkerHost + ?Sized>(
    host: &H,
    settings: &MarkerSettings,
) -> Vec<(MarkerRef, ClassificationKind)> {
    host.scan_all_markers()
        .into_iter()
        .filter_map(|marker| {
            let kind =
                ClassificationKind::from_block_name(&marker.kind, &settings.classification_prefix)?;
            Some((marker, kind))
        })
        .collect()
}

/// 对齐分类符号与顶点分类。
pub fn place_classification_markers<H: MarkerHost + ?Sized>(
    host: &mut H,
    settings: &MarkerSettings,
    tolerance: Tolerance,
    records: &[VertexRecord],
) -> Result<PlacementSummary, EngineError> {
    let mut want: PointMap<Wanted> = PointMap::new(tolerance);
    for record in records {
        if let Some(kind) = ClassificationKind::parse(&record.classification) {
            want.insert(
                record.position,
                Wanted {
                    kind,
                    satisfied: false,
                },
            );
        }
    }
    if want.is_empty() {
        return Ok(PlacementSummary::default());
    }

    let mut summary = PlacementSummary::default();
    let mut doomed = Vec::new();
    for (marker, kind) in scan_classification_markers(&*host, settings) {
        let Some(wanted) = want.get_mut(marker.position) else {
            continue;
        };
        if wanted.kind == kind && !wanted.satisfied {
            wanted.satisfied = true;
            summary.kept += 1;
        } else {
            doomed.push(marker);
        }
    }

    for marker in doomed {
        debug!(marker = marker.handle.get(), kind = %marker.kind, "替换位置上的分类符号");
        host.delete_marker(marker.handle)?;
        summary.replaced += 1;
    }

    for (position, wanted) in want.iter() {
        if wanted.satisfied {
            continue;
        }
        host.create_marker(
            &wanted.kind.block_name(&settings.classification_prefix),
            position,
            settings.classification_scale,
            &settings.layer,
        )?;
        summary.created += 1;
    }

    Ok(summary)
}

/// 单次操作内的分类推断索引：位置 → 块名。
pub struct ClassificationHints {
    prefix: String,
    names: PointMap<Vec<String>>,
}

impl ClassificationHints {
    pub fn scan<H: MarkerHost + ?Sized>(
        host: &H,
        settings: &MarkerSettings,
        tolerance: Tolerance,
    ) -> Self {
        let mut names: PointMap<Vec<String>> = PointMap::new(tolerance);
        for marker in host.scan_all_markers() {
            names
                .get_or_insert_with(marker.position, Vec::new)
                .push(marker.kind);
        }
        Self {
            prefix: settings.classification_prefix.clone(),
            names,
        }
    }

    /// 依据顶点处的块推断分类；测量钉（`FDI*`、`FDSPIKE*`）记为 `OC`。
    pub fn infer(&self, position: Point2) -> String {
        let Some(names) = self.names.get(position) else {
            return String::new();
        };
        for name in names {
            if let Some(kind) = ClassificationKind::from_block_name(name, &self.prefix) {
                return kind.code().to_string();
            }
            let upper = name.to_ascii_uppercase();
            if upper.starts_with("FDI") || upper.starts_with("FDSPIKE") {
                return "OC".to_string();
            }
        }
        String::new()
    }
}
