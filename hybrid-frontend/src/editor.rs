//! 顶点表格编辑模型：`#, Northing, Easting, Type, Description` 五列。
//!
//! 数值单元格只接受普通十进制数（`.` 为小数点），在编辑边界处拒绝无效输入，
//! 因而引擎永远只看到校验过的记录。

use std::fmt;

use hybrid_engine::classification::ClassificationKind;
use hybrid_engine::metadata::VertexRecord;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridColumn {
    Index,
    Northing,
    Easting,
    Type,
    Description,
}

impl GridColumn {
    pub const ALL: [GridColumn; 5] = [
        GridColumn::Index,
        GridColumn::Northing,
        GridColumn::Easting,
        GridColumn::Type,
        GridColumn::Description,
    ];

    pub fn title(self) -> &'static str {
        match self {
            GridColumn::Index => "#",
            GridColumn::Northing => "Northing",
            GridColumn::Easting => "Easting",
            GridColumn::Type => "Type",
            GridColumn::Description => "Description",
        }
    }

    /// 按列名（大小写不敏感）或列序号解析。
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(index) = value.parse::<usize>() {
            return Self::ALL.get(index).copied();
        }
        match value.to_ascii_lowercase().as_str() {
            "#" | "index" => Some(GridColumn::Index),
            "n" | "northing" => Some(GridColumn::Northing),
            "e" | "easting" => Some(GridColumn::Easting),
            "type" => Some(GridColumn::Type),
            "desc" | "description" => Some(GridColumn::Description),
            _ => None,
        }
    }
}

impl fmt::Display for GridColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("第 {row} 行不存在（共 {rows} 行）")]
    RowOutOfRange { row: usize, rows: usize },
    #[error("`{0}` 列为只读")]
    ReadOnly(GridColumn),
    #[error("`{0}` 使用了逗号作小数点，请改用 `.`")]
    CommaDecimal(String),
    #[error("`{0}` 不是有效的数字")]
    NotANumber(String),
}

/// 只接受 `[+-]digits[.digits]` 形式的数字。
pub fn parse_plain_decimal(text: &str) -> Result<f64, EditError> {
    let trimmed = text.trim();
    if trimmed.contains(',') {
        return Err(EditError::CommaDecimal(trimmed.to_string()));
    }
    let unsigned = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('+'))
        .unwrap_or(trimmed);
    let mut digits = 0;
    let mut dots = 0;
    for ch in unsigned.chars() {
        match ch {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return Err(EditError::NotANumber(trimmed.to_string())),
        }
    }
    if digits == 0 || dots > 1 {
        return Err(EditError::NotANumber(trimmed.to_string()));
    }
    trimmed
        .parse::<f64>()
        .map_err(|_| EditError::NotANumber(trimmed.to_string()))
}

#[derive(Debug, Clone)]
pub struct VertexGrid {
    records: Vec<VertexRecord>,
    types: Vec<String>,
    decimals: usize,
}

impl VertexGrid {
    pub fn new(records: Vec<VertexRecord>, decimals: usize) -> Self {
        let mut grid = Self {
            records: Vec::new(),
            types: ClassificationKind::ALL
                .iter()
                .map(|kind| kind.code().to_string())
                .collect(),
            decimals,
        };
        for record in &records {
            grid.remember_type(&record.classification);
        }
        grid.records = records;
        grid
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[VertexRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<VertexRecord> {
        self.records
    }

    /// 分类下拉框的候选值，首次出现的新分类追加在末尾。
    pub fn type_choices(&self) -> &[String] {
        &self.types
    }

    pub fn header() -> [&'static str; 5] {
        GridColumn::ALL.map(GridColumn::title)
    }

    pub fn cell(&self, row: usize, column: GridColumn) -> Option<String> {
        let record = self.records.get(row)?;
        Some(match column {
            GridColumn::Index => (row + 1).to_string(),
            GridColumn::Northing => format!("{:.*}", self.decimals, record.northing),
            GridColumn::Easting => format!("{:.*}", self.decimals, record.easting),
            GridColumn::Type => record.classification.clone(),
            GridColumn::Description => record.description.clone(),
        })
    }

    pub fn rows(&self) -> Vec<[String; 5]> {
        (0..self.records.len())
            .map(|row| GridColumn::ALL.map(|column| self.cell(row, column).unwrap_or_default()))
            .collect()
    }

    /// 提交单元格编辑；失败时记录保持不变。
    pub fn set_cell(&mut self, row: usize, column: GridColumn, text: &str) -> Result<(), EditError> {
        let rows = self.records.len();
        if row >= rows {
            return Err(EditError::RowOutOfRange { row, rows });
        }
        match column {
            GridColumn::Index => return Err(EditError::ReadOnly(column)),
            GridColumn::Northing => {
                let value = parse_plain_decimal(text)?;
                self.records[row].set_northing(value);
            }
            GridColumn::Easting => {
                let value = parse_plain_decimal(text)?;
                self.records[row].set_easting(value);
            }
            GridColumn::Type => {
                let value = text.trim().to_string();
                self.remember_type(&value);
                self.records[row].classification = value;
            }
            GridColumn::Description => {
                self.records[row].description = text.to_string();
            }
        }
        Ok(())
    }

    fn remember_type(&mut self, value: &str) {
        if !value.is_empty() && !self.types.iter().any(|known| known == value) {
            self.types.push(value.to_string());
        }
    }
}
