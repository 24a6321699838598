pub mod tolerance;

pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示；`x` 为东坐标，`y` 为北坐标。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        /// 按十进制位数四舍五入两个坐标分量，用于持久化前消除浮点噪声。
        pub fn rounded(self, decimals: u32) -> Self {
            let factor = 10f64.powi(decimals.min(15) as i32);
            Self::new(
                (self.0.x * factor).round() / factor,
                (self.0.y * factor).round() / factor,
            )
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，主要用于块参照缩放与插入偏移。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn uniform(scale: f64) -> Self {
            Self(DVec2::splat(scale))
        }
    }
}

pub mod document {
    use std::collections::{BTreeMap, BTreeSet, HashMap};

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, Vector2};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub is_visible: bool,
        #[serde(default)]
        pub is_frozen: bool,
        #[serde(default)]
        pub is_locked: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
                is_frozen: false,
                is_locked: false,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Polyline(Polyline),
        BlockReference(BlockReference),
        Table(Table),
    }

    impl Entity {
        /// 实体类型名，用于错误信息与 CLI 输出。
        pub fn kind_name(&self) -> &'static str {
            match self {
                Entity::Line(_) => "line",
                Entity::Polyline(_) => "polyline",
                Entity::BlockReference(_) => "block_reference",
                Entity::Table(_) => "table",
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        pub layer: String,
    }

    impl Polyline {
        pub fn positions(&self) -> impl Iterator<Item = Point2> + '_ {
            self.vertices.iter().map(|vertex| vertex.position)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Attribute {
        pub tag: String,
        pub text: String,
        pub insert: Point2,
        pub height: f64,
        pub is_invisible: bool,
        pub is_constant: bool,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockReference {
        pub name: String,
        pub insert: Point2,
        pub scale: Vector2,
        pub rotation: f64,
        pub attributes: Vec<Attribute>,
        pub layer: String,
    }

    impl BlockReference {
        /// 按标签查找属性（大小写不敏感）。
        pub fn attribute(&self, tag: &str) -> Option<&Attribute> {
            self.attributes
                .iter()
                .find(|attr| attr.tag.eq_ignore_ascii_case(tag))
        }

        pub fn attribute_mut(&mut self, tag: &str) -> Option<&mut Attribute> {
            self.attributes
                .iter_mut()
                .find(|attr| attr.tag.eq_ignore_ascii_case(tag))
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockDefinition {
        pub name: String,
        pub base_point: Point2,
        pub entities: Vec<Entity>,
        pub attributes: Vec<AttributeDefinition>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AttributeDefinition {
        pub tag: String,
        pub prompt: Option<String>,
        pub default_text: String,
        pub insert: Point2,
        pub height: f64,
        pub is_invisible: bool,
        pub is_constant: bool,
        pub layer: String,
    }

    /// 报表表格：`cells[row][column]` 均为纯文本。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Table {
        pub style: String,
        pub insert: Point2,
        pub cells: Vec<Vec<String>>,
        pub column_widths: Vec<f64>,
        pub row_height: f64,
        pub text_height: f64,
        pub layer: String,
    }

    /// 实体扩展字典：键为 `容器/记录` 形式的路径，值为文本负载。
    pub type ExtensionRecord = BTreeMap<String, String>;

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        layers: HashMap<String, Layer>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
        blocks: HashMap<String, BlockDefinition>,
        #[serde(default)]
        table_styles: BTreeSet<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        extensions: BTreeMap<u64, ExtensionRecord>,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        /// 确保图层存在并处于可写状态（解冻、解锁）。
        pub fn ensure_writable_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            let layer = self
                .layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
            layer.is_frozen = false;
            layer.is_locked = false;
        }

        pub fn layer(&self, name: &str) -> Option<&Layer> {
            self.layers.get(name)
        }

        pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
            self.layers.get_mut(name)
        }

        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        pub fn add_line(
            &mut self,
            start: Point2,
            end: Point2,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities
                .push((id, Entity::Line(Line { start, end, layer })));
            id
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            let collected = vertices
                .into_iter()
                .map(PolylineVertex::new)
                .collect::<Vec<_>>();
            self.add_polyline_with_vertices(collected, is_closed, layer)
        }

        pub fn add_polyline_with_vertices<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let collected: Vec<PolylineVertex> = vertices.into_iter().collect();
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Polyline(Polyline {
                    vertices: collected,
                    is_closed,
                    layer,
                }),
            ));
            id
        }

        /// 插入块参照。`attributes` 为空时按块定义实例化属性，
        /// 属性位置相对插入点偏移。
        pub fn add_block_reference(
            &mut self,
            name: impl Into<String>,
            insert: Point2,
            scale: Vector2,
            rotation: f64,
            attributes: Vec<Attribute>,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let name = name.into();
            let resolved_attributes = if attributes.is_empty() {
                self.block(&name)
                    .map(|definition| {
                        let offset = definition.base_point.vector_to(insert);
                        definition
                            .attributes
                            .iter()
                            .map(|def| Attribute {
                                tag: def.tag.clone(),
                                text: def.default_text.clone(),
                                insert: def.insert.translate(offset),
                                height: def.height,
                                is_invisible: def.is_invisible,
                                is_constant: def.is_constant,
                                layer: def.layer.clone(),
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            } else {
                attributes
            };

            for attribute in &resolved_attributes {
                self.ensure_layer(&attribute.layer);
            }
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::BlockReference(BlockReference {
                    name,
                    insert,
                    scale,
                    rotation,
                    attributes: resolved_attributes,
                    layer,
                }),
            ));
            id
        }

        pub fn add_table(
            &mut self,
            style: impl Into<String>,
            insert: Point2,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Table(Table {
                    style: style.into(),
                    insert,
                    cells: Vec::new(),
                    column_widths: Vec::new(),
                    row_height: 0.0,
                    text_height: 0.0,
                    layer,
                }),
            ));
            id
        }

        pub fn add_block_definition(&mut self, definition: BlockDefinition) {
            self.blocks.insert(definition.name.clone(), definition);
        }

        /// 块名按大小写不敏感方式匹配，与宿主 CAD 的块表一致。
        pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
            self.blocks.get(name).or_else(|| {
                self.blocks
                    .values()
                    .find(|definition| definition.name.eq_ignore_ascii_case(name))
            })
        }

        pub fn block_mut(&mut self, name: &str) -> Option<&mut BlockDefinition> {
            let key = self
                .blocks
                .keys()
                .find(|key| key.eq_ignore_ascii_case(name))
                .cloned()?;
            self.blocks.get_mut(&key)
        }

        pub fn ensure_table_style(&mut self, name: impl Into<String>) {
            self.table_styles.insert(name.into());
        }

        pub fn has_table_style(&self, name: &str) -> bool {
            self.table_styles.contains(name)
        }

        pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
            self.entities.iter().map(|(id, entity)| (*id, entity))
        }

        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find(|(entity_id, _)| *entity_id == id)
                .map(|(_, entity)| entity)
        }

        pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
            self.entities
                .iter_mut()
                .find(|(entity_id, _)| *entity_id == id)
                .map(|(_, entity)| entity)
        }

        #[inline]
        pub fn contains(&self, id: EntityId) -> bool {
            self.entity(id).is_some()
        }

        /// 删除实体及其扩展字典，返回实体是否存在。
        pub fn erase(&mut self, id: EntityId) -> bool {
            let before = self.entities.len();
            self.entities.retain(|(entity_id, _)| *entity_id != id);
            let removed = self.entities.len() != before;
            if removed {
                self.extensions.remove(&id.get());
            }
            removed
        }

        pub fn polyline(&self, id: EntityId) -> Option<&Polyline> {
            match self.entity(id) {
                Some(Entity::Polyline(polyline)) => Some(polyline),
                _ => None,
            }
        }

        pub fn polyline_mut(&mut self, id: EntityId) -> Option<&mut Polyline> {
            match self.entity_mut(id) {
                Some(Entity::Polyline(polyline)) => Some(polyline),
                _ => None,
            }
        }

        pub fn block_reference(&self, id: EntityId) -> Option<&BlockReference> {
            match self.entity(id) {
                Some(Entity::BlockReference(reference)) => Some(reference),
                _ => None,
            }
        }

        pub fn block_reference_mut(&mut self, id: EntityId) -> Option<&mut BlockReference> {
            match self.entity_mut(id) {
                Some(Entity::BlockReference(reference)) => Some(reference),
                _ => None,
            }
        }

        pub fn table(&self, id: EntityId) -> Option<&Table> {
            match self.entity(id) {
                Some(Entity::Table(table)) => Some(table),
                _ => None,
            }
        }

        pub fn table_mut(&mut self, id: EntityId) -> Option<&mut Table> {
            match self.entity_mut(id) {
                Some(Entity::Table(table)) => Some(table),
                _ => None,
            }
        }

        /// 读取块参照属性文本。
        pub fn attribute_text(&self, id: EntityId, tag: &str) -> Option<&str> {
            self.block_reference(id)?
                .attribute(tag)
                .map(|attr| attr.text.as_str())
        }

        /// 写入块参照属性文本，返回写入前的值；实体或属性不存在时返回 `None`。
        pub fn set_attribute_text(
            &mut self,
            id: EntityId,
            tag: &str,
            text: impl Into<String>,
        ) -> Option<String> {
            let attribute = self.block_reference_mut(id)?.attribute_mut(tag)?;
            Some(std::mem::replace(&mut attribute.text, text.into()))
        }

        pub fn extension(&self, id: EntityId, key: &str) -> Option<&str> {
            self.extensions
                .get(&id.get())
                .and_then(|record| record.get(key))
                .map(String::as_str)
        }

        /// 写入扩展字典，必要时创建容器。实体不存在时返回 `false`。
        pub fn set_extension(
            &mut self,
            id: EntityId,
            key: impl Into<String>,
            value: impl Into<String>,
        ) -> bool {
            if !self.contains(id) {
                return false;
            }
            self.extensions
                .entry(id.get())
                .or_default()
                .insert(key.into(), value.into());
            true
        }

        pub fn remove_extension(&mut self, id: EntityId, key: &str) -> bool {
            let Some(record) = self.extensions.get_mut(&id.get()) else {
                return false;
            };
            let removed = record.remove(key).is_some();
            if record.is_empty() {
                self.extensions.remove(&id.get());
            }
            removed
        }

        /// 外部数据载入后的整理：校正实体计数器，丢弃无主的扩展字典。
        /// 返回丢弃的扩展字典数量。
        pub fn normalize(&mut self) -> usize {
            if let Some(max) = self.entities.iter().map(|(id, _)| id.get()).max() {
                self.next_entity_id = self.next_entity_id.max(max + 1);
            }
            let live: BTreeSet<u64> = self.entities.iter().map(|(id, _)| id.get()).collect();
            let before = self.extensions.len();
            self.extensions.retain(|id, _| live.contains(id));
            before - self.extensions.len()
        }

        fn next_id(&mut self) -> EntityId {
            let id = EntityId::new(self.next_entity_id);
            self.next_entity_id += 1;
            id
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::geometry::{Point2, Vector2};

        fn marker_definition() -> BlockDefinition {
            BlockDefinition {
                name: "Hybrd Num".to_string(),
                base_point: Point2::new(0.0, 0.0),
                entities: vec![],
                attributes: vec![
                    AttributeDefinition {
                        tag: "NUMBER".to_string(),
                        prompt: Some("Number".to_string()),
                        default_text: String::new(),
                        insert: Point2::new(0.0, 0.0),
                        height: 2.5,
                        is_invisible: false,
                        is_constant: false,
                        layer: "0".to_string(),
                    },
                    AttributeDefinition {
                        tag: "ID".to_string(),
                        prompt: Some("Tag".to_string()),
                        default_text: String::new(),
                        insert: Point2::new(1.0, 0.0),
                        height: 2.5,
                        is_invisible: true,
                        is_constant: false,
                        layer: "0".to_string(),
                    },
                ],
            }
        }

        #[test]
        fn document_stores_entities() {
            let mut doc = Document::new();
            let line_id = doc.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "0");
            let polyline_id = doc.add_polyline(
                [
                    Point2::new(0.0, 0.0),
                    Point2::new(2.0, 2.0),
                    Point2::new(4.0, 0.0),
                ],
                false,
                "SHAPE",
            );
            let table_id = doc.add_table("Induction Bend", Point2::new(50.0, 50.0), "TBL");

            assert_eq!(line_id.get(), 0);
            assert_eq!(polyline_id.get(), 1);
            assert_eq!(table_id.get(), 2);
            let layers: Vec<_> = doc.layers().map(|l| l.name.clone()).collect();
            assert!(layers.contains(&"0".to_string()));
            assert!(layers.contains(&"SHAPE".to_string()));
            assert!(layers.contains(&"TBL".to_string()));
            assert_eq!(doc.entities().count(), 3);

            let polyline = doc.polyline(polyline_id).expect("polyline");
            assert_eq!(polyline.vertices.len(), 3);
            assert!(doc.polyline(table_id).is_none());
            assert_eq!(doc.table(table_id).map(|t| t.style.as_str()), Some("Induction Bend"));
        }

        #[test]
        fn block_reference_instantiates_definition_attributes() {
            let mut doc = Document::new();
            doc.add_block_definition(marker_definition());
            let id = doc.add_block_reference(
                "hybrd num",
                Point2::new(10.0, 20.0),
                Vector2::uniform(1.0),
                0.0,
                Vec::new(),
                "L-MON",
            );

            let reference = doc.block_reference(id).expect("block reference");
            assert_eq!(reference.attributes.len(), 2);
            let hidden = reference.attribute("id").expect("id attribute");
            assert!(hidden.is_invisible);
            assert!((hidden.insert.x() - 11.0).abs() < 1e-9);
            assert!((hidden.insert.y() - 20.0).abs() < 1e-9);

            let previous = doc.set_attribute_text(id, "NUMBER", "7");
            assert_eq!(previous.as_deref(), Some(""));
            assert_eq!(doc.attribute_text(id, "number"), Some("7"));
            assert!(doc.set_attribute_text(id, "MISSING", "x").is_none());
        }

        #[test]
        fn erase_drops_extension_record() {
            let mut doc = Document::new();
            let id = doc.add_polyline([Point2::new(0.0, 0.0)], false, "0");
            assert!(doc.set_extension(id, "HybridData/Data", "[]"));
            assert_eq!(doc.extension(id, "HybridData/Data"), Some("[]"));

            assert!(doc.erase(id));
            assert!(!doc.erase(id));
            assert!(doc.extension(id, "HybridData/Data").is_none());
            assert!(!doc.set_extension(id, "HybridData/Data", "[]"));
        }

        #[test]
        fn writable_layer_is_thawed_and_unlocked() {
            let mut doc = Document::new();
            doc.ensure_layer("L-MON");
            if let Some(layer) = doc.layer_mut("L-MON") {
                layer.is_frozen = true;
                layer.is_locked = true;
            }
            doc.ensure_writable_layer("L-MON");
            let layer = doc.layer("L-MON").expect("layer");
            assert!(!layer.is_frozen);
            assert!(!layer.is_locked);
        }

        #[test]
        fn document_survives_json_round_trip_with_extensions() {
            let mut doc = Document::new();
            let id = doc.add_polyline([Point2::new(1.0, 2.0)], false, "0");
            doc.set_extension(id, "HybridData/Data", "[{\"x\":1.0}]");
            doc.ensure_table_style("Induction Bend");

            let json = serde_json::to_string(&doc).expect("serialize");
            let restored: Document = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(restored.extension(id, "HybridData/Data"), Some("[{\"x\":1.0}]"));
            assert!(restored.has_table_style("Induction Bend"));
        }

        #[test]
        fn normalize_repairs_counter_and_orphan_extensions() {
            let mut doc = Document::new();
            let id = doc.add_polyline([Point2::new(0.0, 0.0)], false, "0");
            doc.set_extension(id, "HybridData/Data", "[]");
            let mut value = serde_json::to_value(&doc).expect("serialize");
            value["next_entity_id"] = serde_json::json!(0);
            value["extensions"]["77"] = serde_json::json!({ "HybridData/Data": "[]" });
            let mut restored: Document = serde_json::from_value(value).expect("deserialize");

            assert_eq!(restored.normalize(), 1);
            let next = restored.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "0");
            assert_ne!(next, id);
            assert_eq!(restored.extension(id, "HybridData/Data"), Some("[]"));
        }
    }
}
