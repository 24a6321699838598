//! 顶点元数据同步的顶层操作。
//!
//! 每个操作都假定调用方已经打开事务并暂停了编辑守卫（见
//! [`crate::session::Session`]）；操作本身只负责在宿主上完成全部写入，
//! 出错时由调用方整体丢弃。

use std::collections::{HashSet, VecDeque};
use std::fmt;

use hybrid_core::document::EntityId;
use hybrid_core::geometry::Point2;
use hybrid_core::tolerance::PointMap;
use tracing::{debug, info};

use crate::binding::{BindingReport, IdAllocator, assign_ids, bind_vertices};
use crate::classification::{
    ClassificationHints, PlacementSummary, ensure_classification_definitions,
    place_classification_markers,
};
use crate::errors::EngineError;
use crate::host::{DrawingHost, GeometryHost};
use crate::metadata::{MetadataStore, VertexRecord};
use crate::numbering::{
    MarkerIndex, NumberingSummary, adopt_markers_at_vertices, numbering_definition,
    parse_hidden_id, reconcile_markers,
};
use crate::report::{parse_report_rows, report_layout, report_rows};
use crate::settings::EngineSettings;

/// 编号同步一轮的结果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub vertices: usize,
    pub binding: BindingReport,
    pub adopted: usize,
    pub ids_allocated: usize,
    pub numbering: NumberingSummary,
    pub classification: Option<PlacementSummary>,
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vertices: {}; {} ids allocated, {} adopted",
            self.vertices, self.numbering, self.ids_allocated, self.adopted
        )?;
        if let Some(classification) = &self.classification {
            write!(f, "; classification {classification}")?;
        }
        Ok(())
    }
}

/// 顶点写回几何时的改动。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryChanges {
    pub moved: usize,
    pub inserted: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InsertOptions {
    pub place_classification: bool,
    /// 尚无报表时新表格的插入点；缺失即视为取消。
    pub insert_point: Option<Point2>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertSummary {
    pub vertices: usize,
    pub report: EntityId,
    pub report_created: bool,
    pub geometry: GeometryChanges,
    pub ids_allocated: usize,
    pub classification: Option<PlacementSummary>,
}

impl fmt::Display for InsertSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows written to report {} ({}); geometry: {} moved, {} inserted, {} removed",
            self.vertices,
            self.report.get(),
            if self.report_created { "created" } else { "updated" },
            self.geometry.moved,
            self.geometry.inserted,
            self.geometry.removed
        )?;
        if let Some(classification) = &self.classification {
            write!(f, "; classification {classification}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub matched: usize,
    pub blank: usize,
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vertices matched, {} left blank", self.matched, self.blank)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildSummary {
    pub polyline: EntityId,
    pub vertices: usize,
    pub from_payload: bool,
}

impl fmt::Display for RebuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "polyline {} rebuilt with {} vertices from {}",
            self.polyline.get(),
            self.vertices,
            if self.from_payload { "stored metadata" } else { "table rows" }
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub records: usize,
    pub markers_deleted: usize,
    pub payload_removed: bool,
}

impl fmt::Display for PurgeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records purged, {} markers deleted",
            self.records, self.markers_deleted
        )
    }
}

/// 同步引擎：持有运行参数与元数据存储适配器。
#[derive(Debug, Clone)]
pub struct Synchronizer {
    settings: EngineSettings,
    store: MetadataStore,
}

impl Synchronizer {
    pub fn new(settings: EngineSettings) -> Self {
        let store = MetadataStore::new(settings.metadata_key.clone(), settings.payload_decimals);
        Self { settings, store }
    }

    #[inline]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[inline]
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// 当前顶点列表：几何为准，绑定已存记录，新顶点按位置推断分类。
    pub fn load_vertices<H: DrawingHost + ?Sized>(
        &self,
        host: &H,
        polyline: EntityId,
    ) -> Result<(Vec<VertexRecord>, BindingReport), EngineError> {
        host.check_polyline(polyline)?;
        let positions = host.vertex_positions(polyline)?;
        let stored = self.store.read(host, polyline);
        let tolerance = self.store.binding_tolerance(self.settings.tolerance);
        let (mut records, report) = bind_vertices(&positions, stored, tolerance);

        if records
            .iter()
            .any(|record| !record.is_assigned() && record.classification.is_empty())
        {
            let hints =
                ClassificationHints::scan(host, &self.settings.markers, self.settings.tolerance);
            for record in records
                .iter_mut()
                .filter(|record| !record.is_assigned() && record.classification.is_empty())
            {
                record.classification = hints.infer(record.position);
            }
        }
        Ok((records, report))
    }

    /// 首次编号：与更新相同，另外采纳恰好落在新顶点上的未认领气泡。
    pub fn add_numbering<H: DrawingHost + ?Sized>(
        &self,
        host: &mut H,
        polyline: EntityId,
    ) -> Result<PassSummary, EngineError> {
        self.numbering_pass(host, polyline, true)
    }

    /// 几何编辑后的重新编号，可重复执行。
    pub fn update_numbering<H: DrawingHost + ?Sized>(
        &self,
        host: &mut H,
        polyline: EntityId,
    ) -> Result<PassSummary, EngineError> {
        self.numbering_pass(host, polyline, false)
    }

    fn numbering_pass<H: DrawingHost + ?Sized>(
        &self,
        host: &mut H,
        polyline: EntityId,
        adopt: bool,
    ) -> Result<PassSummary, EngineError> {
        let markers = &self.settings.markers;
        let tolerance = self.settings.tolerance;
        host.check_polyline(polyline)?;

        host.ensure_layer(&markers.layer);
        host.ensure_marker_definition(&numbering_definition(markers));
        if markers.place_classification {
            ensure_classification_definitions(host, markers);
        }

        let (mut records, binding) = self.load_vertices(&*host, polyline)?;
        let index = MarkerIndex::scan(&*host, markers);
        let adopted = if adopt {
            adopt_markers_at_vertices(&mut records, &index, tolerance)
        } else {
            0
        };
        let mut allocator = IdAllocator::seeded(index.ids(), records.iter().map(|r| r.id));
        let ids_allocated = assign_ids(&mut records, &mut allocator);

        let numbering = reconcile_markers(host, markers, &records, index)?;
        let classification = if markers.place_classification {
            Some(place_classification_markers(
                host, markers, tolerance, &records,
            )?)
        } else {
            None
        };

        host.check_polyline(polyline)?;
        let report = host.find_report(&self.settings.report.style);
        self.store.write_mirrored(host, polyline, report, &records)?;

        let summary = PassSummary {
            vertices: records.len(),
            binding,
            adopted,
            ids_allocated,
            numbering,
            classification,
        };
        info!(polyline = polyline.get(), %summary, "编号同步完成");
        Ok(summary)
    }

    /// 将编辑后的记录写回几何、报表与元数据。
    pub fn insert_or_update<H: DrawingHost + ?Sized>(
        &self,
        host: &mut H,
        polyline: EntityId,
        mut records: Vec<VertexRecord>,
        options: InsertOptions,
    ) -> Result<InsertSummary, EngineError> {
        let report_settings = &self.settings.report;
        host.check_polyline(polyline)?;
        if records.is_empty() {
            return Err(EngineError::Cancelled("no vertices to write"));
        }
        let existing = host.find_report(&report_settings.style);
        if existing.is_none() && options.insert_point.is_none() {
            return Err(EngineError::Cancelled("no table insertion point"));
        }

        let geometry = self.write_geometry(host, polyline, &records)?;

        let index = MarkerIndex::scan(&*host, &self.settings.markers);
        let mut allocator = IdAllocator::seeded(index.ids(), records.iter().map(|r| r.id));
        let ids_allocated = assign_ids(&mut records, &mut allocator);

        host.ensure_layer(&report_settings.layer);
        host.ensure_report_style(&report_settings.style);
        let (report, report_created) = match (existing, options.insert_point) {
            (Some(report), _) => (report, false),
            (None, Some(point)) => (
                host.create_report(&report_settings.style, &report_settings.layer, point),
                true,
            ),
            (None, None) => return Err(EngineError::Cancelled("no table insertion point")),
        };
        host.write_report(report, &report_layout(report_settings), report_rows(&records))?;

        host.check_polyline(polyline)?;
        self.store
            .write_mirrored(host, polyline, Some(report), &records)?;

        let classification = if options.place_classification {
            let markers = &self.settings.markers;
            host.ensure_layer(&markers.layer);
            ensure_classification_definitions(host, markers);
            Some(place_classification_markers(
                host,
                markers,
                self.settings.tolerance,
                &records,
            )?)
        } else {
            None
        };

        let summary = InsertSummary {
            vertices: records.len(),
            report,
            report_created,
            geometry,
            ids_allocated,
            classification,
        };
        info!(polyline = polyline.get(), %summary, "报表与元数据已更新");
        Ok(summary)
    }

    fn write_geometry<H: GeometryHost + ?Sized>(
        &self,
        host: &mut H,
        polyline: EntityId,
        records: &[VertexRecord],
    ) -> Result<GeometryChanges, EngineError> {
        let mut changes = GeometryChanges::default();
        let count = host.vertex_count(polyline)?;
        for (index, record) in records.iter().enumerate() {
            if index < count {
                let current = host.vertex_position(polyline, index)?;
                if current != record.position {
                    host.set_vertex_position(polyline, index, record.position)?;
                    changes.moved += 1;
                }
            } else {
                host.insert_vertex(polyline, index, record.position)?;
                changes.inserted += 1;
            }
        }
        for index in (records.len()..count).rev() {
            host.remove_vertex(polyline, index)?;
            changes.removed += 1;
        }
        Ok(changes)
    }

    /// 按位置把源多段线的分类与描述复制到目标多段线。
    ///
    /// 标识不跨多段线传递，目标保留自身已有的标识。
    pub fn transfer_metadata<H: DrawingHost + ?Sized>(
        &self,
        host: &mut H,
        source: EntityId,
        target: EntityId,
    ) -> Result<TransferSummary, EngineError> {
        host.check_polyline(source)?;
        host.check_polyline(target)?;
        let (source_records, _) = self.load_vertices(&*host, source)?;
        let (mut target_records, _) = self.load_vertices(&*host, target)?;

        let mut by_position: PointMap<VecDeque<usize>> = PointMap::new(self.settings.tolerance);
        for (index, record) in source_records.iter().enumerate() {
            by_position
                .get_or_insert_with(record.position, VecDeque::new)
                .push_back(index);
        }

        let mut summary = TransferSummary::default();
        for record in target_records.iter_mut() {
            let matched = by_position
                .get_mut(record.position)
                .and_then(VecDeque::pop_front);
            match matched {
                Some(index) => {
                    let source = &source_records[index];
                    record.classification = source.classification.clone();
                    record.description = source.description.clone();
                    summary.matched += 1;
                }
                None => {
                    record.classification.clear();
                    record.description.clear();
                    summary.blank += 1;
                }
            }
        }

        let index = MarkerIndex::scan(&*host, &self.settings.markers);
        let mut allocator = IdAllocator::seeded(
            index.ids(),
            source_records
                .iter()
                .chain(&target_records)
                .map(|record| record.id),
        );
        assign_ids(&mut target_records, &mut allocator);

        host.check_polyline(target)?;
        self.store.write(host, target, &target_records)?;
        info!(
            source = source.get(),
            target = target.get(),
            %summary,
            "元数据已按位置复制"
        );
        Ok(summary)
    }

    /// 由报表重建多段线：优先使用表格上的镜像负载，否则解析表格行。
    pub fn rebuild_from_report<H: DrawingHost + ?Sized>(
        &self,
        host: &mut H,
        report: EntityId,
    ) -> Result<RebuildSummary, EngineError> {
        host.check_report(report)?;
        let mut records = self.store.read(&*host, report);
        let from_payload = !records.is_empty();
        if !from_payload {
            debug!(report = report.get(), "报表无可用元数据，改为解析表格行");
            records = parse_report_rows(&host.read_report(report)?);
        }
        if records.is_empty() {
            return Err(EngineError::EmptyReport(report.get()));
        }

        let index = MarkerIndex::scan(&*host, &self.settings.markers);
        let mut allocator = IdAllocator::seeded(index.ids(), records.iter().map(|r| r.id));
        assign_ids(&mut records, &mut allocator);

        let points: Vec<Point2> = records.iter().map(|record| record.position).collect();
        host.ensure_layer(&self.settings.report.polyline_layer);
        let polyline = host.create_polyline(&points, &self.settings.report.polyline_layer);
        self.store.write(host, polyline, &records)?;

        let summary = RebuildSummary {
            polyline,
            vertices: records.len(),
            from_payload,
        };
        info!(report = report.get(), %summary, "多段线已由报表重建");
        Ok(summary)
    }

    /// 删除多段线上的元数据以及绑定到其标识的编号气泡。
    pub fn purge_metadata<H: DrawingHost + ?Sized>(
        &self,
        host: &mut H,
        polyline: EntityId,
    ) -> Result<PurgeSummary, EngineError> {
        let markers = &self.settings.markers;
        host.check_polyline(polyline)?;
        let records = self.store.read(&*host, polyline);
        let ids: HashSet<_> = records
            .iter()
            .filter(|record| record.is_assigned())
            .map(|record| record.id)
            .collect();

        let mut summary = PurgeSummary {
            records: records.len(),
            ..PurgeSummary::default()
        };
        for marker in host.scan_markers(&markers.numbering_block) {
            let bound = host
                .marker_attribute(marker.handle, &markers.id_tag)
                .as_deref()
                .and_then(parse_hidden_id)
                .is_some_and(|id| ids.contains(&id));
            if bound {
                host.delete_marker(marker.handle)?;
                summary.markers_deleted += 1;
            }
        }
        summary.payload_removed = self.store.purge(host, polyline);
        info!(polyline = polyline.get(), %summary, "顶点元数据已清除");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HostError;
    use crate::host::{MarkerHost, PayloadHost, ReportHost};
    use hybrid_core::document::Document;

    fn sync() -> Synchronizer {
        Synchronizer::new(EngineSettings::default())
    }

    fn square(doc: &mut Document) -> EntityId {
        doc.add_polyline(
            [
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
            ],
            false,
            "0",
        )
    }

    #[test]
    fn load_binds_stored_records_and_infers_fresh_classification() {
        let sync = sync();
        let mut doc = Document::new();
        let pl = square(&mut doc);
        let stored = vec![VertexRecord::at(Point2::new(10.0, 0.0)).with_id(4).with_description("kept")];
        sync.store().write(&mut doc, pl, &stored).unwrap();
        ensure_classification_definitions(&mut doc, &sync.settings().markers);
        doc.create_marker("Hybrid_EC", Point2::new(10.0, 10.0), 5.0, "L-MON").unwrap();

        let (records, report) = sync.load_vertices(&doc, pl).unwrap();
        assert_eq!(report.matched_by_position, 1);
        assert_eq!(records[1].id, 4);
        assert_eq!(records[1].description, "kept");
        assert_eq!(records[2].classification, "EC");
        assert_eq!(records[0].classification, "");
    }

    #[test]
    fn numbering_rejects_non_polyline_before_writing() {
        let sync = sync();
        let mut doc = Document::new();
        let table = doc.add_table("Induction Bend", Point2::new(0.0, 0.0), "TBL");
        let err = sync.add_numbering(&mut doc, table).unwrap_err();
        assert!(matches!(err, EngineError::Host(HostError::WrongKind { .. })));
        assert!(doc.block("Hybrd Num").is_none());
    }

    #[test]
    fn insert_or_update_requires_point_for_new_table() {
        let sync = sync();
        let mut doc = Document::new();
        let pl = square(&mut doc);
        let (records, _) = sync.load_vertices(&doc, pl).unwrap();
        let before = doc.clone();
        let err = sync
            .insert_or_update(&mut doc, pl, records, InsertOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled(_)));
        assert_eq!(doc.entities().count(), before.entities().count());
        assert!(!doc.has_payload(pl, sync.store().key()));
    }

    #[test]
    fn insert_or_update_writes_geometry_report_and_mirror() {
        let sync = sync();
        let mut doc = Document::new();
        let pl = square(&mut doc);
        let (mut records, _) = sync.load_vertices(&doc, pl).unwrap();
        records[0].set_northing(-5.0);
        records[2].classification = "XC".to_string();
        records.pop();
        records.push(VertexRecord::at(Point2::new(20.0, 20.0)).with_classification("RC"));
        records.push(VertexRecord::at(Point2::new(30.0, 20.0)));

        let summary = sync
            .insert_or_update(
                &mut doc,
                pl,
                records,
                InsertOptions {
                    place_classification: true,
                    insert_point: Some(Point2::new(100.0, 100.0)),
                },
            )
            .unwrap();
        assert!(summary.report_created);
        assert_eq!(summary.geometry, GeometryChanges { moved: 2, inserted: 1, removed: 0 });
        assert_eq!(summary.ids_allocated, 4);
        assert_eq!(summary.classification.map(|c| c.created), Some(1));

        assert_eq!(doc.vertex_count(pl).unwrap(), 4);
        assert_eq!(doc.vertex_position(pl, 0).unwrap(), Point2::new(0.0, -5.0));
        let rows = doc.read_report(summary.report).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[1], vec!["1", "-5.00", "0.00", "", ""]);
        assert_eq!(
            doc.read_payload(pl, sync.store().key()),
            doc.read_payload(summary.report, sync.store().key())
        );

        let (mut records, _) = sync.load_vertices(&doc, pl).unwrap();
        records.truncate(2);
        let again = sync
            .insert_or_update(&mut doc, pl, records, InsertOptions::default())
            .unwrap();
        assert!(!again.report_created);
        assert_eq!(again.report, summary.report);
        assert_eq!(again.geometry.removed, 2);
        assert_eq!(again.ids_allocated, 0);
        assert_eq!(doc.read_report(summary.report).unwrap().len(), 3);
    }

    #[test]
    fn numbering_pass_refreshes_report_mirror() {
        let sync = sync();
        let mut doc = Document::new();
        let pl = square(&mut doc);
        let (records, _) = sync.load_vertices(&doc, pl).unwrap();
        let table = sync
            .insert_or_update(
                &mut doc,
                pl,
                records,
                InsertOptions {
                    place_classification: false,
                    insert_point: Some(Point2::new(100.0, 100.0)),
                },
            )
            .unwrap()
            .report;

        doc.insert_vertex(pl, 3, Point2::new(0.0, 10.0)).unwrap();
        let summary = sync.update_numbering(&mut doc, pl).unwrap();
        assert_eq!(summary.ids_allocated, 1);
        assert_eq!(
            doc.read_payload(pl, sync.store().key()),
            doc.read_payload(table, sync.store().key())
        );

        let current: Vec<_> = sync.store().read(&doc, pl).iter().map(|r| r.id).collect();
        let rebuilt = sync.rebuild_from_report(&mut doc, table).unwrap();
        assert!(rebuilt.from_payload);
        assert_eq!(rebuilt.vertices, 4);
        let rebuilt_ids: Vec<_> = sync
            .store()
            .read(&doc, rebuilt.polyline)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(rebuilt_ids, current);
        assert_eq!(
            doc.vertex_positions(rebuilt.polyline).unwrap(),
            doc.vertex_positions(pl).unwrap()
        );
    }

    #[test]
    fn transfer_copies_by_position_and_keeps_target_ids() {
        let sync = sync();
        let mut doc = Document::new();
        let source = square(&mut doc);
        let target = doc.add_polyline(
            [Point2::new(10.0, 10.0), Point2::new(50.0, 50.0), Point2::new(0.0, 0.0)],
            false,
            "0",
        );
        sync.store()
            .write(
                &mut doc,
                source,
                &[
                    VertexRecord::at(Point2::new(0.0, 0.0)).with_classification("XC").with_id(1),
                    VertexRecord::at(Point2::new(10.0, 0.0)).with_id(2),
                    VertexRecord::at(Point2::new(10.0, 10.0)).with_description("corner").with_id(3),
                ],
            )
            .unwrap();
        sync.store()
            .write(
                &mut doc,
                target,
                &[VertexRecord::at(Point2::new(10.0, 10.0)).with_description("old").with_id(40)],
            )
            .unwrap();

        let summary = sync.transfer_metadata(&mut doc, source, target).unwrap();
        assert_eq!(summary, TransferSummary { matched: 2, blank: 1 });

        let records = sync.store().read(&doc, target);
        assert_eq!(records[0].description, "corner");
        assert_eq!(records[0].id, 40);
        assert_eq!(records[1].description, "");
        assert_eq!(records[2].classification, "XC");
        let ids: HashSet<_> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(&1) && !ids.contains(&2) && !ids.contains(&3));
    }

    #[test]
    fn rebuild_prefers_payload_then_rows() {
        let sync = sync();
        let mut doc = Document::new();
        let table = doc.add_table("Induction Bend", Point2::new(0.0, 0.0), "TBL");
        doc.write_report(
            table,
            &report_layout(&sync.settings().report),
            vec![
                vec!["#".into(), "Northing".into(), "Easting".into(), "Type".into(), "Description".into()],
                vec!["1".into(), "2.00".into(), "1.00".into(), "XC".into(), "a".into()],
                vec!["2".into(), "4.00".into(), "3.00".into(), "".into(), "b".into()],
            ],
        )
        .unwrap();

        let from_rows = sync.rebuild_from_report(&mut doc, table).unwrap();
        assert!(!from_rows.from_payload);
        assert_eq!(
            doc.vertex_positions(from_rows.polyline).unwrap(),
            vec![Point2::new(1.0, 2.0), Point2::new(3.0, 4.0)]
        );

        sync.store()
            .write(
                &mut doc,
                table,
                &[VertexRecord::at(Point2::new(7.0, 8.0)).with_id(12)],
            )
            .unwrap();
        let from_payload = sync.rebuild_from_report(&mut doc, table).unwrap();
        assert!(from_payload.from_payload);
        assert_eq!(sync.store().read(&doc, from_payload.polyline)[0].id, 12);

        let empty = doc.add_table("Induction Bend", Point2::new(0.0, 0.0), "TBL");
        assert!(matches!(
            sync.rebuild_from_report(&mut doc, empty),
            Err(EngineError::EmptyReport(_))
        ));
    }

    #[test]
    fn purge_removes_payload_and_bound_markers_only() {
        let sync = sync();
        let mut doc = Document::new();
        let pl = square(&mut doc);
        sync.add_numbering(&mut doc, pl).unwrap();
        let markers = &sync.settings().markers;
        let stray = doc
            .create_marker(&markers.numbering_block, Point2::new(99.0, 0.0), 1.0, "L-MON")
            .unwrap();
        doc.set_marker_attribute(stray, &markers.id_tag, "500").unwrap();

        let summary = sync.purge_metadata(&mut doc, pl).unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.markers_deleted, 3);
        assert!(summary.payload_removed);
        assert!(!doc.has_payload(pl, sync.store().key()));
        assert_eq!(doc.scan_markers(&markers.numbering_block).len(), 1);
    }
}
