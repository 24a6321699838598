//! 编号气泡的对账：每个顶点恰好一个气泡，标签等于顶点序号，隐藏标识不变。

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use hybrid_core::tolerance::{PointMap, Tolerance};
use tracing::debug;

use crate::binding::unique_ids;
use crate::errors::EngineError;
use crate::host::{MarkerAttributeSpec, MarkerDefinition, MarkerHost, MarkerRef};
use crate::metadata::{UNASSIGNED, VertexId, VertexRecord};
use crate::settings::MarkerSettings;

/// 编号气泡块定义：可见的 `NUMBER` 与隐藏的 `ID`。
pub fn numbering_definition(settings: &MarkerSettings) -> MarkerDefinition {
    MarkerDefinition {
        name: settings.numbering_block.clone(),
        attributes: vec![
            MarkerAttributeSpec {
                tag: settings.number_tag.clone(),
                prompt: "Number".to_string(),
                invisible: false,
            },
            MarkerAttributeSpec {
                tag: settings.id_tag.clone(),
                prompt: "Tag".to_string(),
                invisible: true,
            },
        ],
        glyph: Vec::new(),
        text_height: settings.text_height,
    }
}

/// 解析隐藏标识；空值、非数字与 `0` 均视为无效。
pub fn parse_hidden_id(text: &str) -> Option<VertexId> {
    text.trim()
        .parse::<VertexId>()
        .ok()
        .filter(|id| *id != UNASSIGNED)
}

/// 单次同步开始时扫描得到的气泡索引，按标识分桶。随同步结束而丢弃。
#[derive(Debug, Clone, Default)]
pub struct MarkerIndex {
    by_id: BTreeMap<VertexId, Vec<MarkerRef>>,
    junk: Vec<MarkerRef>,
}

impl MarkerIndex {
    pub fn scan<H: MarkerHost + ?Sized>(host: &H, settings: &MarkerSettings) -> Self {
        let mut index = Self::default();
        for marker in host.scan_markers(&settings.numbering_block) {
            let parsed = host
                .marker_attribute(marker.handle, &settings.id_tag)
                .as_deref()
                .and_then(parse_hidden_id);
            match parsed {
                Some(id) => index.by_id.entry(id).or_default().push(marker),
                None => index.junk.push(marker),
            }
        }
        index
    }

    pub fn ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.by_id.keys().copied()
    }

    pub fn markers_for(&self, id: VertexId) -> &[MarkerRef] {
        self.by_id.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub fn junk(&self) -> &[MarkerRef] {
        &self.junk
    }

    pub fn len(&self) -> usize {
        self.by_id.values().map(Vec::len).sum::<usize>() + self.junk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 尚未被任何记录认领的气泡按位置建立的缓存，仅供本次同步采纳使用。
    pub fn unclaimed_by_position(
        &self,
        records: &[VertexRecord],
        tolerance: Tolerance,
    ) -> PointMap<VertexId> {
        let claimed: HashSet<VertexId> = records.iter().map(|record| record.id).collect();
        let mut cache = PointMap::new(tolerance);
        for (id, markers) in &self.by_id {
            if claimed.contains(id) {
                continue;
            }
            if let Some(first) = markers.first() {
                cache.get_or_insert_with(first.position, || *id);
            }
        }
        cache
    }
}

/// 为仍无标识的记录采纳恰好落在其顶点上的未认领气泡。返回采纳数量。
pub fn adopt_markers_at_vertices(
    records: &mut [VertexRecord],
    index: &MarkerIndex,
    tolerance: Tolerance,
) -> usize {
    let mut cache = index.unclaimed_by_position(records, tolerance);
    let mut adopted = 0;
    let mut taken = HashSet::new();
    for record in records.iter_mut().filter(|record| !record.is_assigned()) {
        let Some(id) = cache.get_mut(record.position) else {
            continue;
        };
        if *id == UNASSIGNED || !taken.insert(*id) {
            continue;
        }
        record.id = *id;
        *id = UNASSIGNED;
        adopted += 1;
    }
    adopted
}

/// 气泡对账统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumberingSummary {
    pub created: usize,
    pub reused: usize,
    pub relabelled: usize,
    pub rebuilt: usize,
    pub orphans_deleted: usize,
    pub duplicates_deleted: usize,
    pub junk_deleted: usize,
}

impl NumberingSummary {
    pub fn deleted(&self) -> usize {
        self.orphans_deleted + self.duplicates_deleted + self.junk_deleted
    }

    /// 第二次同步不应产生任何改动。
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.relabelled == 0 && self.rebuilt == 0 && self.deleted() == 0
    }
}

impl fmt::Display for NumberingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} reused, {} renumbered, {} rebuilt, {} purged ({} orphaned, {} duplicate, {} unreadable)",
            self.created,
            self.reused,
            self.relabelled,
            self.rebuilt,
            self.deleted(),
            self.orphans_deleted,
            self.duplicates_deleted,
            self.junk_deleted
        )
    }
}

/// 按标识对账气泡，位置不参与身份判定。
///
/// 调用前所有记录必须已分配互不相同的标识。
pub fn reconcile_markers<H: MarkerHost + ?Sized>(
    host: &mut H,
    settings: &MarkerSettings,
    records: &[VertexRecord],
    index: MarkerIndex,
) -> Result<NumberingSummary, EngineError> {
    if let Err((index, id)) = unique_ids(records) {
        return Err(if id == UNASSIGNED {
            EngineError::UnassignedId { index }
        } else {
            EngineError::DuplicateId { id }
        });
    }

    let MarkerIndex { mut by_id, junk } = index;
    let mut summary = NumberingSummary::default();

    for (position, record) in records.iter().enumerate() {
        let label = (position + 1).to_string();
        let handle = match by_id.remove(&record.id) {
            None => {
                let handle = host.create_marker(
                    &settings.numbering_block,
                    record.position,
                    1.0,
                    &settings.layer,
                )?;
                host.set_marker_attribute(handle, &settings.id_tag, &record.id.to_string())?;
                host.set_marker_attribute(handle, &settings.number_tag, &label)?;
                summary.created += 1;
                continue;
            }
            Some(markers) => {
                let mut markers = markers.into_iter();
                let Some(kept) = markers.next() else {
                    continue;
                };
                for duplicate in markers {
                    debug!(id = record.id, marker = duplicate.handle.get(), "删除重复气泡");
                    host.delete_marker(duplicate.handle)?;
                    summary.duplicates_deleted += 1;
                }
                if host.marker_attribute(kept.handle, &settings.number_tag).is_none() {
                    // 旧版气泡缺少标签属性：原位按当前定义重建，标识不变
                    debug!(id = record.id, marker = kept.handle.get(), "重建缺少标签属性的气泡");
                    host.delete_marker(kept.handle)?;
                    let handle = host.create_marker(
                        &settings.numbering_block,
                        kept.position,
                        1.0,
                        &settings.layer,
                    )?;
                    host.set_marker_attribute(handle, &settings.id_tag, &record.id.to_string())?;
                    host.set_marker_attribute(handle, &settings.number_tag, &label)?;
                    summary.rebuilt += 1;
                    continue;
                }
                summary.reused += 1;
                kept.handle
            }
        };

        let current = host.marker_attribute(handle, &settings.number_tag);
        if current.as_deref() != Some(label.as_str()) {
            host.set_marker_attribute(handle, &settings.number_tag, &label)?;
            summary.relabelled += 1;
        }
    }

    // 剩余的桶都不属于当前顶点集合
    for (id, markers) in by_id {
        for marker in markers {
            debug!(id, marker = marker.handle.get(), "删除孤立气泡");
            host.delete_marker(marker.handle)?;
            summary.orphans_deleted += 1;
        }
    }
    for marker in junk {
        debug!(marker = marker.handle.get(), "删除标识无效的气泡");
        host.delete_marker(marker.handle)?;
        summary.junk_deleted += 1;
    }

    Ok(summary)
}
