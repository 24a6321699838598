//! 报表表格的行编解码。

use hybrid_core::geometry::Point2;
use tracing::debug;

use crate::host::ReportLayout;
use crate::metadata::VertexRecord;
use crate::settings::ReportSettings;

pub const REPORT_HEADER: [&str; 5] = ["#", "Northing", "Easting", "Type", "Description"];

pub fn report_layout(settings: &ReportSettings) -> ReportLayout {
    ReportLayout {
        column_widths: settings.column_widths.clone(),
        row_height: settings.row_height,
        text_height: settings.text_height,
    }
}

/// 表头加每个顶点一行：序号、北坐标、东坐标（两位小数）、分类、描述。
pub fn report_rows(records: &[VertexRecord]) -> Vec<Vec<String>> {
    let header = REPORT_HEADER.iter().map(|cell| cell.to_string()).collect();
    std::iter::once(header)
        .chain(records.iter().enumerate().map(|(index, record)| {
            vec![
                (index + 1).to_string(),
                format!("{:.2}", record.northing),
                format!("{:.2}", record.easting),
                record.classification.clone(),
                record.description.clone(),
            ]
        }))
        .collect()
}

/// 从表格行还原记录；北、东坐标无法解析的行（包括表头）被跳过。
pub fn parse_report_rows(rows: &[Vec<String>]) -> Vec<VertexRecord> {
    fn cell(row: &[String], column: usize) -> &str {
        row.get(column).map(String::as_str).unwrap_or("")
    }
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let northing = parse_coordinate(cell(row, 1));
            let easting = parse_coordinate(cell(row, 2));
            let (Some(northing), Some(easting)) = (northing, easting) else {
                debug!(row = index, "跳过无法解析的报表行");
                return None;
            };
            Some(
                VertexRecord::at(Point2::new(easting, northing))
                    .with_classification(cell(row, 3).trim())
                    .with_description(cell(row, 4)),
            )
        })
        .collect()
}

fn parse_coordinate(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_start_with_header_and_use_two_decimals() {
        let records = vec![
            VertexRecord::at(Point2::new(10.0, 0.126))
                .with_classification("XC")
                .with_description("Tag1"),
            VertexRecord::at(Point2::new(-3.5, 7.0)),
        ];
        let rows = report_rows(&records);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][1], "Northing");
        assert_eq!(rows[1], vec!["1", "0.13", "10.00", "XC", "Tag1"]);
        assert_eq!(rows[2], vec!["2", "7.00", "-3.50", "", ""]);
    }

    #[test]
    fn parsing_skips_header_and_malformed_rows() {
        let rows = vec![
            REPORT_HEADER.iter().map(|c| c.to_string()).collect(),
            vec!["1".into(), "5.00".into(), "2.00".into(), " RC ".into(), "A".into()],
            vec!["2".into(), "n/a".into(), "2.00".into(), "".into(), "".into()],
            vec!["3".into(), "1.5".into()],
            vec!["4".into(), "8".into(), "9".into()],
        ];
        let records = parse_report_rows(&rows);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].position, Point2::new(2.0, 5.0));
        assert_eq!(records[0].classification, "RC");
        assert_eq!(records[0].description, "A");
        assert_eq!(records[1].position, Point2::new(9.0, 8.0));
        assert!(!records[1].is_assigned());
    }
}
