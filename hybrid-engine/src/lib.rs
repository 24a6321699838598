pub mod binding;
pub mod classification;
pub mod command;
pub mod guard;
pub mod host;
pub mod metadata;
pub mod numbering;
pub mod report;
pub mod session;
pub mod settings;
pub mod sync;

pub mod errors {
    use thiserror::Error;

    /// 宿主文档层面的失败：实体失效、类型不符、索引越界等。
    #[derive(Debug, Error)]
    pub enum HostError {
        #[error("entity {0} no longer exists")]
        EntityErased(u64),
        #[error("entity {id} is a {actual}, expected a {expected}")]
        WrongKind {
            id: u64,
            expected: &'static str,
            actual: &'static str,
        },
        #[error("vertex index {index} out of range for polyline {id} with {count} vertices")]
        VertexOutOfRange { id: u64, index: usize, count: usize },
        #[error("block definition `{0}` is missing")]
        MissingDefinition(String),
        #[error("marker {marker} has no attribute `{tag}`")]
        MissingAttribute { marker: u64, tag: String },
    }

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error(transparent)]
        Host(#[from] HostError),
        #[error("operation cancelled: {0}")]
        Cancelled(&'static str),
        #[error("vertex {index} has no identifier assigned")]
        UnassignedId { index: usize },
        #[error("identifier {id} is bound to more than one vertex")]
        DuplicateId { id: u64 },
        #[error("report table {0} holds no readable rows")]
        EmptyReport(u64),
        #[error("failed to encode vertex metadata: {0}")]
        Encode(#[from] serde_json::Error),
    }
}
