//! 容差感知的二维点比较与散列。
//!
//! 两点在 `ε` 内视为同一点：`|Δx| ≤ ε` 且 `|Δy| ≤ ε`。散列按 `ε` 量化坐标，
//! 容差内的两点量化后最多相差一个格子，因此 [`PointMap`] 查找时探测 3×3 邻域。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Point2;

/// `ε` 的绝对下限，防止零容差导致量化除零。
pub const MIN_EPSILON: f64 = 1e-9;

/// 显示精度推导容差时使用的默认下限。
pub const DEFAULT_FLOOR: f64 = 1e-4;

/// 默认显示精度（小数位数），与报表 `F2` 格式一致。
pub const DEFAULT_DISPLAY_PRECISION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    epsilon: f64,
}

impl Tolerance {
    /// 构造容差，非有限或过小的值被钳制到 [`MIN_EPSILON`]。
    pub fn new(epsilon: f64) -> Self {
        let epsilon = if epsilon.is_finite() && epsilon > MIN_EPSILON {
            epsilon
        } else {
            MIN_EPSILON
        };
        Self { epsilon }
    }

    /// 由宿主显示精度推导：最小显示单位的一半，再与 `floor` 取大。
    pub fn from_display_precision(decimals: u32, floor: f64) -> Self {
        let half_unit = 0.5 * 10f64.powi(-(decimals.min(15) as i32));
        let floor = if floor.is_finite() { floor } else { 0.0 };
        Self::new(half_unit.max(floor))
    }

    #[inline]
    pub fn epsilon(self) -> f64 {
        self.epsilon
    }

    #[inline]
    pub fn equal(self, a: Point2, b: Point2) -> bool {
        (a.x() - b.x()).abs() <= self.epsilon && (a.y() - b.y()).abs() <= self.epsilon
    }

    /// 量化到最近的 `ε` 整数倍。
    #[inline]
    pub fn cell(self, point: Point2) -> CellKey {
        CellKey {
            ix: quantize(point.x(), self.epsilon),
            iy: quantize(point.y(), self.epsilon),
        }
    }

    /// 切比雪夫距离，用于在多个候选中挑选最近者。
    #[inline]
    fn spread(a: Point2, b: Point2) -> f64 {
        (a.x() - b.x()).abs().max((a.y() - b.y()).abs())
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::from_display_precision(DEFAULT_DISPLAY_PRECISION, DEFAULT_FLOOR)
    }
}

#[inline]
fn quantize(value: f64, epsilon: f64) -> i64 {
    // `as` 对 NaN 与越界值做饱和转换
    (value / epsilon).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub ix: i64,
    pub iy: i64,
}

impl CellKey {
    fn neighbourhood(self) -> impl Iterator<Item = CellKey> {
        (-1..=1).flat_map(move |dx| {
            (-1..=1).map(move |dy| CellKey {
                ix: self.ix.saturating_add(dx),
                iy: self.iy.saturating_add(dy),
            })
        })
    }
}

/// 以容差点为键的有序映射，迭代顺序等于首次插入顺序。
#[derive(Debug, Clone)]
pub struct PointMap<V> {
    tolerance: Tolerance,
    cells: HashMap<CellKey, Vec<usize>>,
    entries: Vec<(Point2, V)>,
}

impl<V> PointMap<V> {
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            cells: HashMap::new(),
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 插入键值。已有容差相等的键时覆盖其值与键点（后写者胜），返回旧值。
    pub fn insert(&mut self, point: Point2, value: V) -> Option<V> {
        match self.find_index(point) {
            Some(index) => {
                let old_cell = self.tolerance.cell(self.entries[index].0);
                let new_cell = self.tolerance.cell(point);
                if old_cell != new_cell {
                    if let Some(indices) = self.cells.get_mut(&old_cell) {
                        indices.retain(|&existing| existing != index);
                    }
                    self.cells.entry(new_cell).or_default().push(index);
                }
                let slot = &mut self.entries[index];
                slot.0 = point;
                Some(std::mem::replace(&mut slot.1, value))
            }
            None => {
                self.push(point, value);
                None
            }
        }
    }

    pub fn get(&self, point: Point2) -> Option<&V> {
        self.find_index(point).map(|index| &self.entries[index].1)
    }

    pub fn get_mut(&mut self, point: Point2) -> Option<&mut V> {
        self.find_index(point)
            .map(move |index| &mut self.entries[index].1)
    }

    #[inline]
    pub fn contains(&self, point: Point2) -> bool {
        self.find_index(point).is_some()
    }

    /// 返回容差相等键对应的值；不存在时以 `default` 创建。
    pub fn get_or_insert_with(&mut self, point: Point2, default: impl FnOnce() -> V) -> &mut V {
        let index = match self.find_index(point) {
            Some(index) => index,
            None => self.push(point, default()),
        };
        &mut self.entries[index].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (Point2, &V)> {
        self.entries.iter().map(|(point, value)| (*point, value))
    }

    fn push(&mut self, point: Point2, value: V) -> usize {
        let index = self.entries.len();
        self.entries.push((point, value));
        self.cells
            .entry(self.tolerance.cell(point))
            .or_default()
            .push(index);
        index
    }

    fn find_index(&self, point: Point2) -> Option<usize> {
        let mut best: Option<(f64, usize)> = None;
        for cell in self.tolerance.cell(point).neighbourhood() {
            let Some(indices) = self.cells.get(&cell) else {
                continue;
            };
            for &index in indices {
                let candidate = self.entries[index].0;
                if !self.tolerance.equal(candidate, point) {
                    continue;
                }
                let spread = Tolerance::spread(candidate, point);
                let better = match best {
                    None => true,
                    Some((best_spread, best_index)) => {
                        spread < best_spread || (spread == best_spread && index < best_index)
                    }
                };
                if better {
                    best = Some((spread, index));
                }
            }
        }
        best.map(|(_, index)| index)
    }
}
