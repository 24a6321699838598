//! 几何顶点与已存元数据的绑定，以及逐多段线的标识分配。

use std::collections::{HashSet, VecDeque};

use hybrid_core::geometry::Point2;
use hybrid_core::tolerance::{PointMap, Tolerance};
use tracing::debug;

use crate::metadata::{UNASSIGNED, VertexId, VertexRecord};

/// 标识分配器。每次同步都从现有气泡与记录中重算最大值，不持久化计数器。
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    max_assigned: VertexId,
}

impl IdAllocator {
    pub fn seeded<M, R>(marker_ids: M, record_ids: R) -> Self
    where
        M: IntoIterator<Item = VertexId>,
        R: IntoIterator<Item = VertexId>,
    {
        let mut allocator = Self::default();
        for id in marker_ids.into_iter().chain(record_ids) {
            allocator.observe(id);
        }
        allocator
    }

    #[inline]
    pub fn observe(&mut self, id: VertexId) {
        self.max_assigned = self.max_assigned.max(id);
    }

    #[inline]
    pub fn max_assigned(&self) -> VertexId {
        self.max_assigned
    }

    pub fn allocate(&mut self) -> VertexId {
        self.max_assigned += 1;
        self.max_assigned
    }
}

/// 为缺少标识的记录分配新值；重复出现的标识只保留第一次，其余重新分配。
/// 返回分配数量。
pub fn assign_ids(records: &mut [VertexRecord], allocator: &mut IdAllocator) -> usize {
    let mut seen = HashSet::new();
    let mut allocated = 0;
    for record in records.iter_mut() {
        if record.is_assigned() && seen.insert(record.id) {
            continue;
        }
        if record.is_assigned() {
            debug!(id = record.id, "元数据中存在重复标识，重新分配");
        }
        record.id = allocator.allocate();
        seen.insert(record.id);
        allocated += 1;
    }
    allocated
}

/// 绑定统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindingReport {
    pub matched_by_position: usize,
    pub carried_by_order: usize,
    pub fresh: usize,
    pub dropped: usize,
}

/// 将当前几何顶点与已存记录配对，结果按顶点顺序排列。
///
/// 先按容差位置配对，每条记录至多使用一次，因此重合顶点各自保留独立记录。
/// 剩余未配对的顶点与剩余记录数量相同时视为纯移动，按顺序逐一继承；
/// 否则剩余顶点得到 `id = 0` 的新记录，多余记录被丢弃。
/// 位置始终取自几何。
pub fn bind_vertices(
    positions: &[Point2],
    stored: Vec<VertexRecord>,
    tolerance: Tolerance,
) -> (Vec<VertexRecord>, BindingReport) {
    let mut by_position: PointMap<VecDeque<usize>> = PointMap::new(tolerance);
    for (index, record) in stored.iter().enumerate() {
        by_position
            .get_or_insert_with(record.position, VecDeque::new)
            .push_back(index);
    }

    let mut report = BindingReport::default();
    let mut used = vec![false; stored.len()];
    let mut assignment: Vec<Option<usize>> = positions
        .iter()
        .map(|position| {
            let index = by_position.get_mut(*position)?.pop_front()?;
            used[index] = true;
            report.matched_by_position += 1;
            Some(index)
        })
        .collect();

    let unmatched: Vec<usize> = assignment
        .iter()
        .enumerate()
        .filter_map(|(vertex, slot)| slot.is_none().then_some(vertex))
        .collect();
    let leftovers: Vec<usize> = (0..stored.len()).filter(|index| !used[*index]).collect();

    if !unmatched.is_empty() && unmatched.len() == leftovers.len() {
        for (vertex, record) in unmatched.iter().zip(&leftovers) {
            assignment[*vertex] = Some(*record);
            report.carried_by_order += 1;
        }
    } else {
        report.fresh = unmatched.len();
        report.dropped = leftovers.len();
    }

    let mut slots: Vec<Option<VertexRecord>> = stored.into_iter().map(Some).collect();
    let records = positions
        .iter()
        .zip(assignment)
        .map(|(position, slot)| {
            match slot.and_then(|index| slots[index].take()) {
                Some(mut record) => {
                    record.move_to(*position);
                    record
                }
                None => VertexRecord::at(*position),
            }
        })
        .collect();

    (records, report)
}

/// 校验记录标识全部已分配且互不相同。
pub fn unique_ids(records: &[VertexRecord]) -> Result<(), (usize, VertexId)> {
    let mut seen = HashSet::new();
    for (index, record) in records.iter().enumerate() {
        if record.id == UNASSIGNED || !seen.insert(record.id) {
            return Err((index, record.id));
        }
    }
    Ok(())
}
