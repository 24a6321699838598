//! 顶点元数据记录及其在扩展字典中的持久化。

use hybrid_core::document::EntityId;
use hybrid_core::geometry::Point2;
use hybrid_core::tolerance::Tolerance;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::host::PayloadHost;

/// 顶点标识。`0` 表示尚未分配。
pub type VertexId = u64;

pub const UNASSIGNED: VertexId = 0;

/// 负载坐标小数位上限，超出后舍入因子失去意义。
pub const MAX_PAYLOAD_DECIMALS: u32 = 12;

/// 单个多段线顶点的测量元数据。
#[derive(Debug, Clone, PartialEq)]
pub struct VertexRecord {
    pub position: Point2,
    pub northing: f64,
    pub easting: f64,
    pub classification: String,
    pub description: String,
    pub id: VertexId,
}

impl VertexRecord {
    /// 位于 `position` 的空白记录。
    pub fn at(position: Point2) -> Self {
        Self {
            position,
            northing: position.y(),
            easting: position.x(),
            classification: String::new(),
            description: String::new(),
            id: UNASSIGNED,
        }
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = classification.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_id(mut self, id: VertexId) -> Self {
        self.id = id;
        self
    }

    #[inline]
    pub fn is_assigned(&self) -> bool {
        self.id != UNASSIGNED
    }

    /// 几何移动后同步两个标量视图。
    pub fn move_to(&mut self, position: Point2) {
        self.position = position;
        self.northing = position.y();
        self.easting = position.x();
    }

    pub fn set_northing(&mut self, northing: f64) {
        self.northing = northing;
        self.position = Point2::new(self.easting, northing);
    }

    pub fn set_easting(&mut self, easting: f64) {
        self.easting = easting;
        self.position = Point2::new(easting, self.northing);
    }
}

/// 负载中的单条记录。大写别名兼容旧版插件写出的 `X/Y/Type/Desc/ID`。
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVertex {
    #[serde(alias = "X")]
    x: f64,
    #[serde(alias = "Y")]
    y: f64,
    #[serde(rename = "type", alias = "Type", default)]
    kind: Option<String>,
    #[serde(alias = "Desc", default)]
    desc: Option<String>,
    #[serde(alias = "ID", default)]
    id: VertexId,
}

impl From<StoredVertex> for VertexRecord {
    fn from(stored: StoredVertex) -> Self {
        VertexRecord::at(Point2::new(stored.x, stored.y))
            .with_classification(stored.kind.unwrap_or_default())
            .with_description(stored.desc.unwrap_or_default())
            .with_id(stored.id)
    }
}

/// 写入结果：实体已不存在时写入被跳过，不视为错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Skipped,
}

/// 元数据存储适配器：序列化、反序列化与冗余镜像。
#[derive(Debug, Clone)]
pub struct MetadataStore {
    key: String,
    decimals: u32,
}

impl MetadataStore {
    pub fn new(key: impl Into<String>, decimals: u32) -> Self {
        Self {
            key: key.into(),
            decimals: decimals.min(MAX_PAYLOAD_DECIMALS),
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// 与已存坐标比较时所需的最小容差：写入时舍入引入的误差上限。
    pub fn binding_tolerance(&self, tolerance: Tolerance) -> Tolerance {
        Tolerance::from_display_precision(self.decimals, tolerance.epsilon())
    }

    pub fn encode(&self, records: &[VertexRecord]) -> Result<String, EngineError> {
        let stored: Vec<StoredVertex> = records
            .iter()
            .map(|record| {
                let position = record.position.rounded(self.decimals);
                StoredVertex {
                    x: position.x(),
                    y: position.y(),
                    kind: Some(record.classification.clone()),
                    desc: Some(record.description.clone()),
                    id: record.id,
                }
            })
            .collect();
        Ok(serde_json::to_string(&stored)?)
    }

    /// 解析负载；任何解析失败都退化为空列表。
    pub fn decode(&self, payload: &str) -> Vec<VertexRecord> {
        match serde_json::from_str::<Vec<StoredVertex>>(payload) {
            Ok(stored) => stored
                .into_iter()
                .filter(|vertex| vertex.x.is_finite() && vertex.y.is_finite())
                .map(VertexRecord::from)
                .collect(),
            Err(err) => {
                warn!(error = %err, "顶点元数据无法解析，按空列表处理");
                Vec::new()
            }
        }
    }

    pub fn read<H: PayloadHost + ?Sized>(&self, host: &H, owner: EntityId) -> Vec<VertexRecord> {
        match host.read_payload(owner, &self.key) {
            Some(payload) => self.decode(&payload),
            None => Vec::new(),
        }
    }

    /// 完整覆盖 `owner` 上的负载。
    pub fn write<H: PayloadHost + ?Sized>(
        &self,
        host: &mut H,
        owner: EntityId,
        records: &[VertexRecord],
    ) -> Result<WriteOutcome, EngineError> {
        let payload = self.encode(records)?;
        Ok(self.write_encoded(host, owner, &payload))
    }

    /// 同一份负载按值写入主实体与可选的报表实体。
    pub fn write_mirrored<H: PayloadHost + ?Sized>(
        &self,
        host: &mut H,
        owner: EntityId,
        mirror: Option<EntityId>,
        records: &[VertexRecord],
    ) -> Result<WriteOutcome, EngineError> {
        let payload = self.encode(records)?;
        let outcome = self.write_encoded(host, owner, &payload);
        if let Some(mirror) = mirror {
            self.write_encoded(host, mirror, &payload);
        }
        Ok(outcome)
    }

    pub fn purge<H: PayloadHost + ?Sized>(&self, host: &mut H, owner: EntityId) -> bool {
        host.remove_payload(owner, &self.key)
    }

    fn write_encoded<H: PayloadHost + ?Sized>(
        &self,
        host: &mut H,
        owner: EntityId,
        payload: &str,
    ) -> WriteOutcome {
        match host.write_payload(owner, &self.key, payload) {
            Ok(()) => WriteOutcome::Written,
            Err(err) => {
                debug!(owner = owner.get(), error = %err, "实体已失效，跳过元数据写入");
                WriteOutcome::Skipped
            }
        }
    }
}
