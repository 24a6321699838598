//! 引擎与宿主文档之间的边界。
//!
//! 引擎只通过这里的 trait 访问几何、扩展字典、块参照与报表；
//! [`Document`] 提供内存实现，供 CLI 与测试使用。

use hybrid_core::document::{
    AttributeDefinition, BlockDefinition, Document, Entity, EntityId, Line,
};
use hybrid_core::geometry::{Point2, Vector2};

use crate::errors::HostError;

/// 扫描得到的块参照快照。
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRef {
    pub handle: EntityId,
    pub kind: String,
    pub position: Point2,
}

#[derive(Debug, Clone)]
pub struct MarkerAttributeSpec {
    pub tag: String,
    pub prompt: String,
    pub invisible: bool,
}

/// 块定义的引导描述：属性与简单线段图形。
#[derive(Debug, Clone)]
pub struct MarkerDefinition {
    pub name: String,
    pub attributes: Vec<MarkerAttributeSpec>,
    pub glyph: Vec<(Point2, Point2)>,
    pub text_height: f64,
}

/// 报表表格的版式。
#[derive(Debug, Clone)]
pub struct ReportLayout {
    pub column_widths: Vec<f64>,
    pub row_height: f64,
    pub text_height: f64,
}

pub trait GeometryHost {
    /// 校验实体存在且为多段线。
    fn check_polyline(&self, polyline: EntityId) -> Result<(), HostError>;
    fn vertex_count(&self, polyline: EntityId) -> Result<usize, HostError>;
    fn vertex_position(&self, polyline: EntityId, index: usize) -> Result<Point2, HostError>;
    fn set_vertex_position(
        &mut self,
        polyline: EntityId,
        index: usize,
        position: Point2,
    ) -> Result<(), HostError>;
    fn insert_vertex(
        &mut self,
        polyline: EntityId,
        index: usize,
        position: Point2,
    ) -> Result<(), HostError>;
    fn remove_vertex(&mut self, polyline: EntityId, index: usize) -> Result<(), HostError>;
    fn create_polyline(&mut self, points: &[Point2], layer: &str) -> EntityId;

    fn vertex_positions(&self, polyline: EntityId) -> Result<Vec<Point2>, HostError> {
        let count = self.vertex_count(polyline)?;
        (0..count)
            .map(|index| self.vertex_position(polyline, index))
            .collect()
    }
}

pub trait PayloadHost {
    fn has_payload(&self, owner: EntityId, key: &str) -> bool;
    fn read_payload(&self, owner: EntityId, key: &str) -> Option<String>;
    /// 覆盖写入负载，必要时创建容器；实体不存在时返回 [`HostError::EntityErased`]。
    fn write_payload(&mut self, owner: EntityId, key: &str, payload: &str)
    -> Result<(), HostError>;
    fn remove_payload(&mut self, owner: EntityId, key: &str) -> bool;
}

pub trait MarkerHost {
    /// 确保图层存在且可写。
    fn ensure_layer(&mut self, name: &str);
    fn ensure_marker_definition(&mut self, definition: &MarkerDefinition);
    fn create_marker(
        &mut self,
        kind: &str,
        position: Point2,
        scale: f64,
        layer: &str,
    ) -> Result<EntityId, HostError>;
    fn delete_marker(&mut self, marker: EntityId) -> Result<(), HostError>;
    fn marker_kind(&self, marker: EntityId) -> Option<String>;
    fn marker_attribute(&self, marker: EntityId, tag: &str) -> Option<String>;
    fn set_marker_attribute(
        &mut self,
        marker: EntityId,
        tag: &str,
        value: &str,
    ) -> Result<(), HostError>;
    /// 按块名（大小写不敏感）扫描，顺序与文档顺序一致。
    fn scan_markers(&self, kind: &str) -> Vec<MarkerRef>;
    fn scan_all_markers(&self) -> Vec<MarkerRef>;
}

pub trait ReportHost {
    fn ensure_report_style(&mut self, style: &str);
    fn find_report(&self, style: &str) -> Option<EntityId>;
    fn check_report(&self, report: EntityId) -> Result<(), HostError>;
    fn create_report(&mut self, style: &str, layer: &str, insert: Point2) -> EntityId;
    fn write_report(
        &mut self,
        report: EntityId,
        layout: &ReportLayout,
        rows: Vec<Vec<String>>,
    ) -> Result<(), HostError>;
    fn read_report(&self, report: EntityId) -> Result<Vec<Vec<String>>, HostError>;
}

/// 同步引擎所需的全部宿主能力。
pub trait DrawingHost: GeometryHost + PayloadHost + MarkerHost + ReportHost {}

impl<T> DrawingHost for T where T: GeometryHost + PayloadHost + MarkerHost + ReportHost {}

fn entity_kind(document: &Document, id: EntityId) -> Result<&'static str, HostError> {
    document
        .entity(id)
        .map(Entity::kind_name)
        .ok_or(HostError::EntityErased(id.get()))
}

fn wrong_kind(document: &Document, id: EntityId, expected: &'static str) -> HostError {
    match entity_kind(document, id) {
        Ok(actual) => HostError::WrongKind {
            id: id.get(),
            expected,
            actual,
        },
        Err(err) => err,
    }
}

impl GeometryHost for Document {
    fn check_polyline(&self, polyline: EntityId) -> Result<(), HostError> {
        if self.polyline(polyline).is_some() {
            Ok(())
        } else {
            Err(wrong_kind(self, polyline, "polyline"))
        }
    }

    fn vertex_count(&self, polyline: EntityId) -> Result<usize, HostError> {
        self.polyline(polyline)
            .map(|pl| pl.vertices.len())
            .ok_or_else(|| wrong_kind(self, polyline, "polyline"))
    }

    fn vertex_position(&self, polyline: EntityId, index: usize) -> Result<Point2, HostError> {
        let pl = self
            .polyline(polyline)
            .ok_or_else(|| wrong_kind(self, polyline, "polyline"))?;
        pl.vertices
            .get(index)
            .map(|vertex| vertex.position)
            .ok_or(HostError::VertexOutOfRange {
                id: polyline.get(),
                index,
                count: pl.vertices.len(),
            })
    }

    fn set_vertex_position(
        &mut self,
        polyline: EntityId,
        index: usize,
        position: Point2,
    ) -> Result<(), HostError> {
        self.check_polyline(polyline)?;
        let Some(pl) = self.polyline_mut(polyline) else {
            return Err(HostError::EntityErased(polyline.get()));
        };
        let count = pl.vertices.len();
        let vertex = pl
            .vertices
            .get_mut(index)
            .ok_or(HostError::VertexOutOfRange {
                id: polyline.get(),
                index,
                count,
            })?;
        vertex.position = position;
        Ok(())
    }

    fn insert_vertex(
        &mut self,
        polyline: EntityId,
        index: usize,
        position: Point2,
    ) -> Result<(), HostError> {
        self.check_polyline(polyline)?;
        let Some(pl) = self.polyline_mut(polyline) else {
            return Err(HostError::EntityErased(polyline.get()));
        };
        let count = pl.vertices.len();
        if index > count {
            return Err(HostError::VertexOutOfRange {
                id: polyline.get(),
                index,
                count,
            });
        }
        pl.vertices
            .insert(index, hybrid_core::document::PolylineVertex::new(position));
        Ok(())
    }

    fn remove_vertex(&mut self, polyline: EntityId, index: usize) -> Result<(), HostError> {
        self.check_polyline(polyline)?;
        let Some(pl) = self.polyline_mut(polyline) else {
            return Err(HostError::EntityErased(polyline.get()));
        };
        let count = pl.vertices.len();
        if index >= count {
            return Err(HostError::VertexOutOfRange {
                id: polyline.get(),
                index,
                count,
            });
        }
        pl.vertices.remove(index);
        Ok(())
    }

    fn create_polyline(&mut self, points: &[Point2], layer: &str) -> EntityId {
        self.add_polyline(points.iter().copied(), false, layer)
    }
}

impl PayloadHost for Document {
    fn has_payload(&self, owner: EntityId, key: &str) -> bool {
        self.extension(owner, key).is_some()
    }

    fn read_payload(&self, owner: EntityId, key: &str) -> Option<String> {
        self.extension(owner, key).map(str::to_string)
    }

    fn write_payload(
        &mut self,
        owner: EntityId,
        key: &str,
        payload: &str,
    ) -> Result<(), HostError> {
        if self.set_extension(owner, key, payload) {
            Ok(())
        } else {
            Err(HostError::EntityErased(owner.get()))
        }
    }

    fn remove_payload(&mut self, owner: EntityId, key: &str) -> bool {
        self.remove_extension(owner, key)
    }
}

impl MarkerHost for Document {
    fn ensure_layer(&mut self, name: &str) {
        self.ensure_writable_layer(name);
    }

    fn ensure_marker_definition(&mut self, definition: &MarkerDefinition) {
        let attribute = |spec: &MarkerAttributeSpec| AttributeDefinition {
            tag: spec.tag.clone(),
            prompt: Some(spec.prompt.clone()),
            default_text: String::new(),
            insert: Point2::new(0.0, 0.0),
            height: definition.text_height,
            is_invisible: spec.invisible,
            is_constant: false,
            layer: "0".to_string(),
        };

        if let Some(existing) = self.block_mut(&definition.name) {
            // 旧定义中的常量属性无法携带逐实例的值，转为变量属性
            for spec in &definition.attributes {
                match existing
                    .attributes
                    .iter_mut()
                    .find(|def| def.tag.eq_ignore_ascii_case(&spec.tag))
                {
                    Some(def) => {
                        def.is_constant = false;
                        def.is_invisible = spec.invisible;
                    }
                    None => existing.attributes.push(attribute(spec)),
                }
            }
            return;
        }

        let entities = definition
            .glyph
            .iter()
            .map(|(start, end)| {
                Entity::Line(Line {
                    start: *start,
                    end: *end,
                    layer: "0".to_string(),
                })
            })
            .collect();
        self.add_block_definition(BlockDefinition {
            name: definition.name.clone(),
            base_point: Point2::new(0.0, 0.0),
            entities,
            attributes: definition.attributes.iter().map(attribute).collect(),
        });
    }

    fn create_marker(
        &mut self,
        kind: &str,
        position: Point2,
        scale: f64,
        layer: &str,
    ) -> Result<EntityId, HostError> {
        let Some(definition) = self.block(kind) else {
            return Err(HostError::MissingDefinition(kind.to_string()));
        };
        let name = definition.name.clone();
        Ok(self.add_block_reference(
            name,
            position,
            Vector2::uniform(scale),
            0.0,
            Vec::new(),
            layer,
        ))
    }

    fn delete_marker(&mut self, marker: EntityId) -> Result<(), HostError> {
        if self.block_reference(marker).is_none() {
            return Err(wrong_kind(self, marker, "block_reference"));
        }
        self.erase(marker);
        Ok(())
    }

    fn marker_kind(&self, marker: EntityId) -> Option<String> {
        self.block_reference(marker)
            .map(|reference| reference.name.clone())
    }

    fn marker_attribute(&self, marker: EntityId, tag: &str) -> Option<String> {
        self.attribute_text(marker, tag).map(str::to_string)
    }

    fn set_marker_attribute(
        &mut self,
        marker: EntityId,
        tag: &str,
        value: &str,
    ) -> Result<(), HostError> {
        if self.block_reference(marker).is_none() {
            return Err(wrong_kind(self, marker, "block_reference"));
        }
        self.set_attribute_text(marker, tag, value)
            .map(|_| ())
            .ok_or_else(|| HostError::MissingAttribute {
                marker: marker.get(),
                tag: tag.to_string(),
            })
    }

    fn scan_markers(&self, kind: &str) -> Vec<MarkerRef> {
        self.scan_all_markers()
            .into_iter()
            .filter(|marker| marker.kind.eq_ignore_ascii_case(kind))
            .collect()
    }

    fn scan_all_markers(&self) -> Vec<MarkerRef> {
        self.entities()
            .filter_map(|(handle, entity)| match entity {
                Entity::BlockReference(reference) => Some(MarkerRef {
                    handle,
                    kind: reference.name.clone(),
                    position: reference.insert,
                }),
                _ => None,
            })
            .collect()
    }
}

impl ReportHost for Document {
    fn ensure_report_style(&mut self, style: &str) {
        self.ensure_table_style(style);
    }

    fn find_report(&self, style: &str) -> Option<EntityId> {
        self.entities().find_map(|(id, entity)| match entity {
            Entity::Table(table) if table.style == style => Some(id),
            _ => None,
        })
    }

    fn check_report(&self, report: EntityId) -> Result<(), HostError> {
        if self.table(report).is_some() {
            Ok(())
        } else {
            Err(wrong_kind(self, report, "table"))
        }
    }

    fn create_report(&mut self, style: &str, layer: &str, insert: Point2) -> EntityId {
        self.add_table(style, insert, layer)
    }

    fn write_report(
        &mut self,
        report: EntityId,
        layout: &ReportLayout,
        rows: Vec<Vec<String>>,
    ) -> Result<(), HostError> {
        self.check_report(report)?;
        let Some(table) = self.table_mut(report) else {
            return Err(HostError::EntityErased(report.get()));
        };
        table.cells = rows;
        table.column_widths = layout.column_widths.clone();
        table.row_height = layout.row_height;
        table.text_height = layout.text_height;
        Ok(())
    }

    fn read_report(&self, report: EntityId) -> Result<Vec<Vec<String>>, HostError> {
        self.table(report)
            .map(|table| table.cells.clone())
            .ok_or_else(|| wrong_kind(self, report, "table"))
    }
}
