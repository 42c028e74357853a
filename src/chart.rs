//! Keyword-driven chart hints for query results.

use serde::Serialize;

use crate::db::ResultRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Table,
    Line,
    Bar,
    Pie,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub data: Vec<ResultRow>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_axis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis: Option<String>,
}

// Checked in this order; the first group with a hit decides.
const KEYWORD_RULES: [(ChartType, &[&str]); 3] = [
    (ChartType::Line, &["trend", "over time", "monthly", "yearly"]),
    (ChartType::Bar, &["top", "best", "highest", "vendors", "categories"]),
    (ChartType::Pie, &["distribution", "breakdown", "percentage"]),
];

pub fn classify(question: &str) -> ChartType {
    let question = question.to_lowercase();
    KEYWORD_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| question.contains(keyword)))
        .map(|(chart_type, _)| *chart_type)
        .unwrap_or(ChartType::Table)
}

/// Picks a chart for `rows`. No rows, no chart. With two or more columns the
/// first two become the x and y axes.
pub fn build_chart_config(question: &str, rows: &[ResultRow]) -> Option<ChartConfig> {
    let first = rows.first()?;
    let mut columns = first.keys();
    let (x_axis, y_axis) = match (columns.next(), columns.next()) {
        (Some(x), Some(y)) => (Some(x.clone()), Some(y.clone())),
        _ => (None, None),
    };

    Some(ChartConfig {
        chart_type: classify(question),
        data: rows.to_vec(),
        title: question.to_string(),
        x_axis,
        y_axis,
    })
}
