//! 会话：持有当前文档、同步引擎与编辑守卫。
//!
//! 所有修改文档的操作都在文档副本上执行，全部成功后整体替换，
//! 任何一步失败都丢弃副本，文档保持原状。

use std::time::Instant;

use hybrid_core::document::{Document, EntityId};
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::guard::{EditGuard, GuardState, GuardVerdict};
use crate::host::MarkerHost;
use crate::metadata::VertexRecord;
use crate::settings::EngineSettings;
use crate::sync::{
    InsertOptions, InsertSummary, PassSummary, PurgeSummary, RebuildSummary, Synchronizer,
    TransferSummary,
};

#[derive(Debug)]
pub struct Session {
    document: Document,
    sync: Synchronizer,
    guard: EditGuard,
}

impl Session {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_document(Document::new(), settings)
    }

    pub fn with_document(document: Document, settings: EngineSettings) -> Self {
        let guard = EditGuard::new(&settings.guard, &settings.markers);
        Self {
            document,
            sync: Synchronizer::new(settings),
            guard,
        }
    }

    /// 替换当前文档。
    pub fn load_document(&mut self, document: Document) {
        self.document = document;
    }

    #[inline]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// 直接访问文档，模拟宿主中的用户编辑（不经过守卫）。
    #[inline]
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    #[inline]
    pub fn settings(&self) -> &EngineSettings {
        self.sync.settings()
    }

    #[inline]
    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    #[inline]
    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }

    fn transact<T>(
        &mut self,
        operation: &'static str,
        run: impl FnOnce(&Synchronizer, &mut Document) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let _scope = self.guard.suspend();
        let mut working = self.document.clone();
        match run(&self.sync, &mut working) {
            Ok(value) => {
                self.document = working;
                debug!(operation, "事务已提交");
                Ok(value)
            }
            Err(err) => {
                warn!(operation, error = %err, "操作失败，事务已回滚");
                Err(err)
            }
        }
    }

    pub fn load_vertices(&self, polyline: EntityId) -> Result<Vec<VertexRecord>, EngineError> {
        self.sync
            .load_vertices(&self.document, polyline)
            .map(|(records, _)| records)
    }

    pub fn add_numbering(&mut self, polyline: EntityId) -> Result<PassSummary, EngineError> {
        self.transact("add_numbering", |sync, doc| sync.add_numbering(doc, polyline))
    }

    pub fn update_numbering(&mut self, polyline: EntityId) -> Result<PassSummary, EngineError> {
        self.transact("update_numbering", |sync, doc| {
            sync.update_numbering(doc, polyline)
        })
    }

    pub fn insert_or_update(
        &mut self,
        polyline: EntityId,
        records: Vec<VertexRecord>,
        options: InsertOptions,
    ) -> Result<InsertSummary, EngineError> {
        self.transact("insert_or_update", |sync, doc| {
            sync.insert_or_update(doc, polyline, records, options)
        })
    }

    pub fn transfer_metadata(
        &mut self,
        source: EntityId,
        target: EntityId,
    ) -> Result<TransferSummary, EngineError> {
        self.transact("transfer_metadata", |sync, doc| {
            sync.transfer_metadata(doc, source, target)
        })
    }

    pub fn rebuild_from_report(&mut self, report: EntityId) -> Result<RebuildSummary, EngineError> {
        self.transact("rebuild_from_report", |sync, doc| {
            sync.rebuild_from_report(doc, report)
        })
    }

    pub fn purge_metadata(&mut self, polyline: EntityId) -> Result<PurgeSummary, EngineError> {
        self.transact("purge_metadata", |sync, doc| {
            sync.purge_metadata(doc, polyline)
        })
    }

    /// 宿主命令开始/结束通知，放行命令期间暂停守卫。
    pub fn command_will_start(&mut self, command: &str) -> bool {
        self.guard.command_will_start(command)
    }

    pub fn command_ended(&mut self, command: &str) {
        self.guard.command_ended(command);
    }

    /// 用户在宿主中修改了气泡属性：先打开、再写入、最后由守卫裁决。
    pub fn edit_marker_attribute(
        &mut self,
        marker: EntityId,
        tag: &str,
        value: &str,
        now: Instant,
    ) -> Result<GuardVerdict, EngineError> {
        self.guard.attribute_opened(&self.document, marker, tag);
        self.document.set_marker_attribute(marker, tag, value)?;
        Ok(self
            .guard
            .attribute_modified(&mut self.document, marker, tag, now)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HostError;
    use crate::host::{GeometryHost, MarkerAttributeSpec, MarkerDefinition, PayloadHost};
    use hybrid_core::geometry::Point2;

    fn session_with_square() -> (Session, EntityId) {
        let mut session = Session::new(EngineSettings::default());
        let pl = session.document_mut().add_polyline(
            [
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
            ],
            false,
            "0",
        );
        (session, pl)
    }

    #[test]
    fn operations_leave_guard_active() {
        let (mut session, pl) = session_with_square();
        session.add_numbering(pl).unwrap();
        assert_eq!(session.guard_state(), GuardState::Active);
        assert!(session.update_numbering(pl).unwrap().numbering.is_noop());
    }

    #[test]
    fn failed_operation_rolls_back_every_write() {
        let (mut session, pl) = session_with_square();
        let before = session.document().clone();
        let err = session
            .insert_or_update(
                pl,
                vec![VertexRecord::at(Point2::new(1.0, 1.0))],
                InsertOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled(_)));
        assert_eq!(
            session.document().vertex_positions(pl).unwrap(),
            before.vertex_positions(pl).unwrap()
        );
        assert_eq!(session.document().entities().count(), before.entities().count());
        assert!(!session.document().has_payload(pl, session.synchronizer().store().key()));
        assert_eq!(session.guard_state(), GuardState::Active);
    }

    #[test]
    fn legacy_bubble_without_label_is_adopted_and_rebuilt() {
        let (mut session, pl) = session_with_square();
        let settings = session.settings().markers.clone();
        let stale = {
            // 旧版块定义只有隐藏标识，已插入的气泡缺少标签属性
            let doc = session.document_mut();
            doc.ensure_marker_definition(&MarkerDefinition {
                name: settings.numbering_block.clone(),
                attributes: vec![MarkerAttributeSpec {
                    tag: settings.id_tag.clone(),
                    prompt: "Tag".to_string(),
                    invisible: true,
                }],
                glyph: Vec::new(),
                text_height: 2.5,
            });
            let stale = doc
                .create_marker(&settings.numbering_block, Point2::new(10.0, 0.0), 1.0, "L-MON")
                .unwrap();
            doc.set_marker_attribute(stale, &settings.id_tag, "5").unwrap();
            stale
        };

        let summary = session.add_numbering(pl).expect("旧版气泡不应导致失败");
        assert_eq!(summary.adopted, 1);
        assert_eq!(summary.numbering.rebuilt, 1);
        assert_eq!(summary.numbering.created, 2);

        let doc = session.document();
        assert!(!doc.contains(stale));
        let records = session.load_vertices(pl).unwrap();
        assert_eq!(records[1].id, 5);
        for marker in doc.scan_markers(&settings.numbering_block) {
            let label = doc.marker_attribute(marker.handle, &settings.number_tag);
            assert!(label.is_some(), "气泡 {} 缺少标签", marker.handle.get());
        }
        let rebuilt = doc
            .scan_markers(&settings.numbering_block)
            .into_iter()
            .find(|marker| {
                doc.marker_attribute(marker.handle, &settings.id_tag).as_deref() == Some("5")
            })
            .expect("标识 5 的气泡应保留");
        assert_eq!(
            doc.marker_attribute(rebuilt.handle, &settings.number_tag).as_deref(),
            Some("2")
        );
        assert!(session.update_numbering(pl).unwrap().numbering.is_noop());
    }

    #[test]
    fn error_after_partial_writes_restores_document() {
        let (mut session, pl) = session_with_square();
        let before = serde_json::to_value(session.document()).unwrap();
        let err = session
            .transact("partial", |sync, doc| {
                sync.add_numbering(doc, pl)?;
                doc.remove_vertex(pl, 0)?;
                Err::<(), _>(EngineError::Host(HostError::EntityErased(pl.get())))
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::Host(HostError::EntityErased(_))));
        assert_eq!(serde_json::to_value(session.document()).unwrap(), before);
        assert_eq!(session.guard_state(), GuardState::Active);
    }

    #[test]
    fn manual_marker_edit_is_reverted_through_session() {
        let (mut session, pl) = session_with_square();
        session.add_numbering(pl).unwrap();
        let settings = session.settings().markers.clone();
        let marker = session.document().scan_markers(&settings.numbering_block)[0].handle;
        let before = session.document().marker_attribute(marker, &settings.id_tag);

        let verdict = session
            .edit_marker_attribute(marker, &settings.id_tag, "999", Instant::now())
            .unwrap();
        assert!(matches!(verdict, GuardVerdict::Reverted { .. }));
        assert_eq!(session.document().marker_attribute(marker, &settings.id_tag), before);

        session.command_will_start("ATTSYNC");
        let verdict = session
            .edit_marker_attribute(marker, &settings.number_tag, "7", Instant::now())
            .unwrap();
        session.command_ended("ATTSYNC");
        assert_eq!(verdict, GuardVerdict::Allowed);
    }
}
