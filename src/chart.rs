//! Chart Renderer
//!
//! Maps a tabular query result to a chart artifact. Two entry points:
//! an explicit mode where the caller supplies the plot kind and column list,
//! and a keyword mode that scans the original question for plot-type words
//! in a fixed precedence order. The artifact is the terminal step of the
//! pipeline; nothing downstream consumes it.

use crate::dataset::{Dataset, Value};
use crate::error::{QueryBotError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bin count when the plot kind was selected explicitly.
const EXPLICIT_HISTOGRAM_BINS: usize = 30;
/// Bin count when the plot kind was inferred from question keywords.
const KEYWORD_HISTOGRAM_BINS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotKind {
    Histogram,
    Scatter,
    Line,
    Bar,
    Pie,
}

impl PlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlotKind::Histogram => "histogram",
            PlotKind::Scatter => "scatter",
            PlotKind::Line => "line",
            PlotKind::Bar => "bar",
            PlotKind::Pie => "pie",
        }
    }

    fn needs_two_columns(&self) -> bool {
        matches!(self, PlotKind::Scatter | PlotKind::Line | PlotKind::Bar)
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlotKind {
    type Err = QueryBotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "histogram" => Ok(PlotKind::Histogram),
            "scatter" => Ok(PlotKind::Scatter),
            "line" => Ok(PlotKind::Line),
            "bar" => Ok(PlotKind::Bar),
            "pie" => Ok(PlotKind::Pie),
            other => Err(QueryBotError::Render(format!(
                "Plot type '{}' is not supported.",
                other
            ))),
        }
    }
}

/// One histogram bin over `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// One pie slice; the percentage label is rendered to one decimal place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub label: String,
    pub value: f64,
    pub percent_label: String,
}

/// Concrete series payload of a rendered chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Series {
    /// Binned frequencies (histogram).
    Bins(Vec<Bin>),
    /// Labeled x values with numeric y values (scatter, line, bar).
    Xy { x: Vec<Value>, y: Vec<f64> },
    /// Single numeric series indexed by row position (one-column line).
    Single(Vec<f64>),
    /// Pie slices.
    Slices(Vec<Slice>),
}

/// Renderable chart artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chart {
    pub kind: PlotKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Series,
}

impl Chart {
    /// Compact text rendering for terminal display.
    pub fn to_text(&self) -> String {
        let mut out = format!(
            "{} [{}] x: {} y: {}\n",
            self.title, self.kind, self.x_label, self.y_label
        );
        match &self.series {
            Series::Bins(bins) => {
                for bin in bins {
                    if bin.count > 0 {
                        out.push_str(&format!(
                            "  [{:.2}, {:.2}): {}\n",
                            bin.start,
                            bin.end,
                            "#".repeat(bin.count)
                        ));
                    }
                }
            }
            Series::Xy { x, y } => {
                for (xv, yv) in x.iter().zip(y.iter()) {
                    out.push_str(&format!("  {} -> {}\n", xv, yv));
                }
            }
            Series::Single(values) => {
                for (idx, v) in values.iter().enumerate() {
                    out.push_str(&format!("  {} -> {}\n", idx, v));
                }
            }
            Series::Slices(slices) => {
                for slice in slices {
                    out.push_str(&format!(
                        "  {}: {} ({})\n",
                        slice.label, slice.value, slice.percent_label
                    ));
                }
            }
        }
        out
    }
}

/// Render with an explicit plot kind and column list. The column names are
/// validated against the result's column set (case/whitespace-insensitive);
/// scatter, line, and bar require at least two resolvable columns.
pub fn render_explicit(result: &Dataset, kind: PlotKind, columns: &[String]) -> Result<Chart> {
    let resolved: Vec<usize> = columns
        .iter()
        .filter_map(|name| result.column_index(name))
        .collect();

    if resolved.is_empty() {
        return Err(QueryBotError::Render(
            "No valid column names found in the question.".to_string(),
        ));
    }
    if kind.needs_two_columns() && resolved.len() < 2 {
        return Err(QueryBotError::Render(format!(
            "Plot type '{}' requires at least two columns.",
            kind
        )));
    }
    if kind == PlotKind::Pie && resolved.len() < 2 {
        return Err(QueryBotError::Render(
            "Plot type 'pie' requires at least two columns.".to_string(),
        ));
    }

    build_chart(result, kind, &resolved, EXPLICIT_HISTOGRAM_BINS, None)
}

/// Derive the plot kind from the question text and render over the result's
/// leading columns. Keywords are checked case-insensitively in a fixed
/// precedence order: line, bar, scatter (needs two result columns),
/// histogram, pie (needs two result columns). Anything unmatched defaults to
/// a line chart with a user-visible notice.
pub fn render_from_question(result: &Dataset, question: &str) -> Result<(Chart, Option<String>)> {
    let lowered = question.to_lowercase();
    let column_count = result.column_count();

    let (kind, notice) = if lowered.contains("line") {
        (PlotKind::Line, None)
    } else if lowered.contains("bar") {
        (PlotKind::Bar, None)
    } else if lowered.contains("scatter") && column_count >= 2 {
        (PlotKind::Scatter, None)
    } else if lowered.contains("histogram") {
        (PlotKind::Histogram, None)
    } else if lowered.contains("pie") && column_count >= 2 {
        (PlotKind::Pie, None)
    } else {
        (
            PlotKind::Line,
            Some("Plot type not recognized; defaulting to a line chart.".to_string()),
        )
    };

    let take = match kind {
        PlotKind::Histogram => 1,
        PlotKind::Line if column_count < 2 => 1,
        _ => 2,
    };
    if column_count < take {
        return Err(QueryBotError::Render(format!(
            "Plot type '{}' requires at least {} columns.",
            kind, take
        )));
    }
    let resolved: Vec<usize> = (0..take).collect();

    let chart = build_chart(
        result,
        kind,
        &resolved,
        KEYWORD_HISTOGRAM_BINS,
        Some("Generated Plot".to_string()),
    )?;
    Ok((chart, notice))
}

fn build_chart(
    result: &Dataset,
    kind: PlotKind,
    resolved: &[usize],
    bin_count: usize,
    title_override: Option<String>,
) -> Result<Chart> {
    let name = |idx: usize| result.columns[resolved[idx]].clone();

    match kind {
        PlotKind::Histogram => {
            let values = numeric_column(result, resolved[0])?;
            let bins = bin_values(&values, bin_count);
            Ok(Chart {
                kind,
                title: title_override.unwrap_or_else(|| format!("Histogram of {}", name(0))),
                x_label: name(0),
                y_label: "Frequency".to_string(),
                series: Series::Bins(bins),
            })
        }
        PlotKind::Scatter | PlotKind::Bar => {
            let (x, y) = paired_columns(result, resolved[0], resolved[1])?;
            let verb = if kind == PlotKind::Scatter {
                "Scatter Plot"
            } else {
                "Bar Plot"
            };
            Ok(Chart {
                kind,
                title: title_override
                    .unwrap_or_else(|| format!("{} of {} vs {}", verb, name(0), name(1))),
                x_label: name(0),
                y_label: name(1),
                series: Series::Xy { x, y },
            })
        }
        PlotKind::Line => {
            if resolved.len() >= 2 {
                let (x, y) = paired_columns(result, resolved[0], resolved[1])?;
                Ok(Chart {
                    kind,
                    title: title_override
                        .unwrap_or_else(|| format!("Line Plot of {} vs {}", name(0), name(1))),
                    x_label: name(0),
                    y_label: name(1),
                    series: Series::Xy { x, y },
                })
            } else {
                let y = numeric_column(result, resolved[0])?;
                Ok(Chart {
                    kind,
                    title: title_override.unwrap_or_else(|| format!("Line Plot of {}", name(0))),
                    x_label: "index".to_string(),
                    y_label: name(0),
                    series: Series::Single(y),
                })
            }
        }
        PlotKind::Pie => {
            let (labels, values) = paired_columns(result, resolved[0], resolved[1])?;
            let total: f64 = values.iter().sum();
            if total == 0.0 {
                return Err(QueryBotError::Render(
                    "Pie chart values sum to zero.".to_string(),
                ));
            }
            let slices = labels
                .iter()
                .zip(values.iter())
                .map(|(label, value)| Slice {
                    label: label.to_string(),
                    value: *value,
                    percent_label: format!("{:.1}%", value / total * 100.0),
                })
                .collect();
            Ok(Chart {
                kind,
                title: title_override
                    .unwrap_or_else(|| format!("Pie Chart of {} by {}", name(1), name(0))),
                x_label: name(0),
                y_label: name(1),
                series: Series::Slices(slices),
            })
        }
    }
}

/// Row-wise (x, y) extraction. Rows whose y cell has no numeric value are
/// skipped as whole rows so labels stay paired with their own values.
fn paired_columns(
    result: &Dataset,
    x_index: usize,
    y_index: usize,
) -> Result<(Vec<Value>, Vec<f64>)> {
    let mut x = Vec::with_capacity(result.row_count());
    let mut y = Vec::with_capacity(result.row_count());
    for row in &result.rows {
        let y_value = row.get(y_index).and_then(Value::as_f64);
        if let Some(y_value) = y_value {
            x.push(row.get(x_index).cloned().unwrap_or(Value::Null));
            y.push(y_value);
        }
    }
    if y.is_empty() {
        return Err(QueryBotError::Render(format!(
            "Column '{}' has no numeric values to plot.",
            result.columns[y_index]
        )));
    }
    Ok((x, y))
}

/// Numeric view of a column; fails when no cell has a numeric value.
fn numeric_column(result: &Dataset, index: usize) -> Result<Vec<f64>> {
    let values: Vec<f64> = result
        .column_values(index)
        .iter()
        .filter_map(Value::as_f64)
        .collect();
    if values.is_empty() {
        return Err(QueryBotError::Render(format!(
            "Column '{}' has no numeric values to plot.",
            result.columns[index]
        )));
    }
    Ok(values)
}

fn bin_values(values: &[f64], bin_count: usize) -> Vec<Bin> {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return vec![Bin {
            start: min,
            end: max,
            count: values.len(),
        }];
    }
    let width = (max - min) / bin_count as f64;
    let mut bins: Vec<Bin> = (0..bin_count)
        .map(|i| Bin {
            start: min + i as f64 * width,
            end: min + (i + 1) as f64 * width,
            count: 0,
        })
        .collect();
    for value in values {
        let mut idx = ((value - min) / width) as usize;
        if idx >= bin_count {
            idx = bin_count - 1;
        }
        bins[idx].count += 1;
    }
    bins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_csv;

    fn sales() -> Dataset {
        load_csv(b"month,sales\nJan,100\nFeb,150\nMar,120\n").unwrap()
    }

    #[test]
    fn scatter_with_one_column_is_rejected() {
        let err =
            render_explicit(&sales(), PlotKind::Scatter, &["month".to_string()]).unwrap_err();
        assert!(err.to_string().contains("requires at least two columns"));
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let err =
            render_explicit(&sales(), PlotKind::Bar, &["profit".to_string()]).unwrap_err();
        assert!(err.to_string().contains("No valid column names"));
    }

    #[test]
    fn explicit_bar_chart_uses_column_labels() {
        let chart = render_explicit(
            &sales(),
            PlotKind::Bar,
            &["month".to_string(), "sales".to_string()],
        )
        .unwrap();
        assert_eq!(chart.kind, PlotKind::Bar);
        assert_eq!(chart.x_label, "month");
        assert_eq!(chart.y_label, "sales");
        assert_eq!(chart.title, "Bar Plot of month vs sales");
        match chart.series {
            Series::Xy { x, y } => {
                assert_eq!(x.len(), 3);
                assert_eq!(y, vec![100.0, 150.0, 120.0]);
            }
            _ => panic!("expected xy series"),
        }
    }

    #[test]
    fn rows_with_null_y_cells_are_skipped_whole() {
        let data = load_csv(b"month,sales\nJan,100\nFeb,\nMar,120\n").unwrap();
        let chart = render_explicit(
            &data,
            PlotKind::Bar,
            &["month".to_string(), "sales".to_string()],
        )
        .unwrap();
        match chart.series {
            Series::Xy { x, y } => {
                assert_eq!(
                    x,
                    vec![
                        Value::Text("Jan".to_string()),
                        Value::Text("Mar".to_string())
                    ]
                );
                assert_eq!(y, vec![100.0, 120.0]);
            }
            _ => panic!("expected xy series"),
        }
    }

    #[test]
    fn pie_slices_stay_paired_across_null_values() {
        let data = load_csv(b"label,count\na,1\nb,\nc,3\n").unwrap();
        let chart = render_explicit(
            &data,
            PlotKind::Pie,
            &["label".to_string(), "count".to_string()],
        )
        .unwrap();
        match chart.series {
            Series::Slices(slices) => {
                assert_eq!(slices.len(), 2);
                assert_eq!(slices[0].label, "a");
                assert_eq!(slices[0].percent_label, "25.0%");
                assert_eq!(slices[1].label, "c");
                assert_eq!(slices[1].percent_label, "75.0%");
            }
            _ => panic!("expected slices"),
        }
    }

    #[test]
    fn keyword_precedence_prefers_line_over_bar() {
        let (chart, notice) =
            render_from_question(&sales(), "show a bar or line of sales").unwrap();
        assert_eq!(chart.kind, PlotKind::Line);
        assert!(notice.is_none());
    }

    #[test]
    fn unmatched_keywords_default_to_line_with_notice() {
        let (chart, notice) = render_from_question(&sales(), "show sales over months").unwrap();
        assert_eq!(chart.kind, PlotKind::Line);
        assert!(notice.unwrap().contains("not recognized"));
        assert_eq!(chart.title, "Generated Plot");
    }

    #[test]
    fn histogram_bins_cover_all_values() {
        let data = load_csv(b"v\n1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n").unwrap();
        let chart = render_explicit(&data, PlotKind::Histogram, &["v".to_string()]).unwrap();
        match chart.series {
            Series::Bins(bins) => {
                assert_eq!(bins.len(), 30);
                let total: usize = bins.iter().map(|b| b.count).sum();
                assert_eq!(total, 10);
            }
            _ => panic!("expected bins"),
        }
        assert_eq!(chart.y_label, "Frequency");
    }

    #[test]
    fn keyword_histogram_uses_ten_bins() {
        let data = load_csv(b"v\n1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n").unwrap();
        let (chart, _) = render_from_question(&data, "histogram of v").unwrap();
        match chart.series {
            Series::Bins(bins) => assert_eq!(bins.len(), 10),
            _ => panic!("expected bins"),
        }
    }

    #[test]
    fn pie_percentages_have_one_decimal() {
        let data = load_csv(b"label,count\na,1\nb,3\n").unwrap();
        let chart = render_explicit(
            &data,
            PlotKind::Pie,
            &["label".to_string(), "count".to_string()],
        )
        .unwrap();
        match chart.series {
            Series::Slices(slices) => {
                assert_eq!(slices[0].percent_label, "25.0%");
                assert_eq!(slices[1].percent_label, "75.0%");
            }
            _ => panic!("expected slices"),
        }
    }

    #[test]
    fn single_column_line_is_a_single_series() {
        let data = load_csv(b"v\n1\n2\n").unwrap();
        let (chart, _) = render_from_question(&data, "line of v").unwrap();
        match chart.series {
            Series::Single(values) => assert_eq!(values, vec![1.0, 2.0]),
            _ => panic!("expected single series"),
        }
    }
}
