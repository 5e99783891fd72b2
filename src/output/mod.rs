pub mod report;
pub mod scan;

use colored::{ColoredString, Colorize};
use serde::Serialize;

use crate::browse::{BrowseEntry, EntryStatus};
use crate::compare::{ComparisonRow, Direction};
use crate::datefmt::DateFormatter;
use crate::locale::{BrowseStrings, DashboardStrings};
use crate::model::{ObjectId, ScanGroup};
use crate::page::PageState;
use crate::stats::{format_number, sparkline, Series, TotalEntry};
use crate::table::dashboard::{summarize, Dashboard};
use crate::table::{Cell, FieldValue, FixedColumn};
use crate::utils::{format_kv_line, truncate_display};

const MAX_CELL_CHARS: usize = 48;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

#[derive(Clone, Debug, Serialize)]
pub struct ReportColumn {
    pub label: String,
    pub visible: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReportRow {
    pub cells: Vec<Cell>,
    pub site_url: Option<String>,
    pub detail_link: Option<String>,
    pub comparison: Option<ComparisonRow>,
}

/// Everything a list view shows, flattened for the renderers.
#[derive(Clone, Debug, Serialize)]
pub struct ListReport {
    pub title: String,
    pub lang: String,
    pub list_id: ObjectId,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub scan_started: Option<String>,
    pub columns: Vec<ReportColumn>,
    pub score_column: usize,
    pub rows: Vec<ReportRow>,
    pub total_rows: usize,
    pub page_size: Option<usize>,
    pub dashboard: Dashboard,
    pub dashboard_labels: DashboardStrings,
    pub compared_dates: Option<String>,
    pub unmatched: Vec<String>,
    pub expand_label: String,
}

impl ListReport {
    /// First page of the loaded list, with the comparison overlay if one is active.
    pub fn build(state: &PageState) -> Option<Self> {
        let list = state.primary()?;
        let table = state.table()?;
        let locale = state.locale();
        let lang = state.query().lang.clone();

        let columns = table
            .headers()
            .iter()
            .enumerate()
            .map(|(i, label)| ReportColumn {
                label: label.clone(),
                visible: table.is_visible(i),
            })
            .collect();

        let rows = table
            .page(0)
            .into_iter()
            .map(|cells| {
                let link = match cells.first() {
                    Some(Cell::Link(link)) => Some(link),
                    _ => None,
                };
                ReportRow {
                    cells: cells.to_vec(),
                    site_url: link.map(|l| l.target_url()),
                    detail_link: link.and_then(|l| l.detail_link(&lang)),
                    comparison: state
                        .comparison()
                        .zip(link)
                        .and_then(|(c, l)| c.row_for(&l.site_id))
                        .cloned(),
                }
            })
            .collect();

        let strings = &locale.scanned_list.data_tables;
        let expand_label = if table.show_all() {
            strings.button_collapse.clone()
        } else {
            strings.button_expand.clone()
        };

        Some(Self {
            title: state.title().unwrap_or_default(),
            lang,
            list_id: list.id.clone(),
            name: list.name.clone(),
            description: list.description.clone(),
            tags: list.tags.clone(),
            scan_started: list
                .scan_starttime()
                .map(|t| state.formatter().format_or_raw(t)),
            columns,
            score_column: table.fixed_column_index(FixedColumn::Score),
            rows,
            total_rows: table.row_count(),
            page_size: table.page_size(),
            dashboard: summarize(&list.sites),
            dashboard_labels: locale.scanned_list.dashboard.clone(),
            compared_dates: state.compared_date_line(),
            unmatched: state
                .comparison()
                .map(|c| c.unmatched.clone())
                .unwrap_or_default(),
            expand_label,
        })
    }

    pub fn visible_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.visible)
            .map(|(i, _)| i)
            .collect()
    }

    /// Index of a fixed result column, counted from the score column.
    fn fixed_column_at(&self, column: usize) -> Option<FixedColumn> {
        column
            .checked_sub(self.score_column)
            .and_then(|i| FixedColumn::ALL.get(i).copied())
    }
}

struct Styled {
    plain: String,
    styled: String,
}

impl Styled {
    fn plain(value: String) -> Self {
        Self {
            styled: value.clone(),
            plain: value,
        }
    }

    fn painted(plain: &str, paint: impl Fn(&str) -> ColoredString) -> Self {
        Self {
            plain: plain.to_string(),
            styled: paint(plain).to_string(),
        }
    }

    fn width(&self) -> usize {
        self.plain.chars().count()
    }
}

fn flag_plain(value: bool) -> &'static str {
    if value {
        "✔ true"
    } else {
        "✘ false"
    }
}

/// Icon plus the literal value, so the meaning survives without colour or glyphs.
pub fn flag_text(value: bool) -> ColoredString {
    if value {
        flag_plain(value).green()
    } else {
        flag_plain(value).red()
    }
}

pub fn grade_text(grade: &str) -> ColoredString {
    match grade.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('A') | Some('B') => grade.green(),
        Some('C') | Some('D') => grade.yellow(),
        Some('E') | Some('F') => grade.red(),
        _ => grade.normal(),
    }
}

fn arrow_plain(direction: Direction) -> &'static str {
    match direction {
        Direction::Higher => "↑",
        Direction::Lower => "↓",
        Direction::Equal => "→",
    }
}

/// Arrow and colour of a compared value; a falling value is green, a rising one red.
pub fn direction_arrow(direction: Direction) -> ColoredString {
    let arrow = arrow_plain(direction);
    match direction {
        Direction::Higher => arrow.red(),
        Direction::Lower => arrow.green(),
        Direction::Equal => arrow.dimmed(),
    }
}

fn field_plain(value: &FieldValue) -> String {
    match value {
        FieldValue::Grade(s) => s.clone(),
        FieldValue::Flag(b) => flag_plain(*b).to_string(),
        FieldValue::Count(n) => n.to_string(),
    }
}

fn cell_styled(cell: Option<&Cell>, is_score: bool) -> Styled {
    match cell {
        None => Styled::plain(String::new()),
        Some(Cell::Flag(b)) => Styled {
            plain: flag_plain(*b).to_string(),
            styled: flag_text(*b).to_string(),
        },
        Some(Cell::Text(s)) if is_score => Styled::painted(s, grade_text),
        Some(c) => Styled::plain(truncate_display(&c.display_text(), MAX_CELL_CHARS)),
    }
}

fn compared_styled(row: &ComparisonRow, column: FixedColumn) -> Option<Styled> {
    let field = row.field(column)?;
    let values = format!("{} → {}", field_plain(&field.old), field_plain(&field.new));
    Some(Styled {
        plain: format!("{values} {}", arrow_plain(field.direction)),
        styled: format!("{values} {}", direction_arrow(field.direction)),
    })
}

fn render_grid(headers: &[String], rows: &[Vec<Styled>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.width());
            }
        }
    }

    let mut out = String::new();
    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<w$}", h, w = *w))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(&header_line.bold().to_string());
    out.push('\n');
    let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    out.push_str(&"─".repeat(total));
    out.push('\n');
    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| {
                let pad = w.saturating_sub(cell.width());
                format!("{}{}", cell.styled, " ".repeat(pad))
            })
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn label_or<'a>(label: &'a str, fallback: &'a str) -> &'a str {
    if label.is_empty() {
        fallback
    } else {
        label
    }
}

pub fn render_list_text(report: &ListReport) -> String {
    let mut out = String::new();
    if !report.title.is_empty() {
        out.push_str(&report.title.bold().to_string());
        out.push('\n');
    }
    if !report.description.is_empty() {
        out.push_str(&report.description);
        out.push('\n');
    }
    if !report.tags.is_empty() {
        out.push_str(&format_kv_line("Tags", &report.tags.join(", ")));
        out.push('\n');
    }

    let d = &report.dashboard;
    let labels = &report.dashboard_labels;
    let score = d
        .average_score
        .map(|c| grade_text(&c.to_string()).to_string())
        .unwrap_or_else(|| "-".to_string());
    for (label, fallback, value) in [
        (&labels.score, "Score", score),
        (&labels.https, "HTTPS", format!("{}%", d.https_percent)),
        (&labels.cookies, "Cookies", d.average_cookies.to_string()),
        (
            &labels.third_parties,
            "Third parties",
            d.average_third_parties.to_string(),
        ),
    ] {
        out.push_str(&format_kv_line(label_or(label, fallback), &value));
        out.push('\n');
    }
    if let Some(dates) = &report.compared_dates {
        out.push_str(&dates.cyan().to_string());
        out.push('\n');
    }
    out.push('\n');

    let visible = report.visible_columns();
    let headers: Vec<String> = visible
        .iter()
        .map(|i| report.columns[*i].label.clone())
        .collect();
    let rows: Vec<Vec<Styled>> = report
        .rows
        .iter()
        .map(|row| {
            visible
                .iter()
                .map(|&col| {
                    let compared = row
                        .comparison
                        .as_ref()
                        .zip(report.fixed_column_at(col))
                        .and_then(|(c, fixed)| compared_styled(c, fixed));
                    compared.unwrap_or_else(|| {
                        cell_styled(row.cells.get(col), col == report.score_column)
                    })
                })
                .collect()
        })
        .collect();
    out.push_str(&render_grid(&headers, &rows));

    if report.rows.len() < report.total_rows {
        out.push_str(
            &format!(
                "{} of {} rows ({}: --show-all)",
                report.rows.len(),
                report.total_rows,
                report.expand_label
            )
            .dimmed()
            .to_string(),
        );
        out.push('\n');
    }
    for url in &report.unmatched {
        out.push_str(&format_kv_line("Unmatched", url).yellow().to_string());
        out.push('\n');
    }
    out
}

pub fn render_browse_text(
    entries: &[BrowseEntry],
    strings: &BrowseStrings,
    heading: Option<&str>,
) -> String {
    let mut out = String::new();
    if let Some(heading) = heading {
        out.push_str(&heading.bold().to_string());
        out.push('\n');
    }
    if entries.is_empty() {
        out.push_str(label_or(&strings.no_results, "No lists found."));
        out.push('\n');
        return out;
    }
    let headers = vec![
        "ID".to_string(),
        "Name".to_string(),
        "Status".to_string(),
        "Tags".to_string(),
    ];
    let rows: Vec<Vec<Styled>> = entries
        .iter()
        .map(|e| {
            let mut name = truncate_display(&e.name, MAX_CELL_CHARS);
            if e.is_private {
                name = format!("{name} ({})", label_or(&strings.private_list, "private"));
            }
            let label = e.status.label(strings);
            let status = match e.status {
                EntryStatus::Finished { .. } => Styled::painted(&label, |s| s.green()),
                EntryStatus::Error { .. } => Styled::painted(&label, |s| s.red()),
                _ => Styled::painted(&label, |s| s.yellow()),
            };
            vec![
                Styled::plain(e.id.to_string()),
                Styled::plain(name),
                status,
                Styled::plain(truncate_display(&e.tags, MAX_CELL_CHARS)),
            ]
        })
        .collect();
    out.push_str(&render_grid(&headers, &rows));
    out
}

pub fn render_groups_text(groups: &[ScanGroup], formatter: &DateFormatter) -> String {
    let headers = vec![
        "#".to_string(),
        "ID".to_string(),
        "Start".to_string(),
        "End".to_string(),
        "State".to_string(),
    ];
    let rows: Vec<Vec<Styled>> = groups
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let state = if g.state.is_finished() {
                Styled::painted(g.state.as_str(), |s| s.green())
            } else if g.state.is_error() {
                Styled::painted(g.state.as_str(), |s| s.red())
            } else {
                Styled::painted(g.state.as_str(), |s| s.yellow())
            };
            vec![
                Styled::plain((i + 1).to_string()),
                Styled::plain(g.id.to_string()),
                Styled::plain(formatter.format_or_raw(&g.startdate)),
                Styled::plain(
                    g.enddate
                        .as_deref()
                        .map(|d| formatter.format_or_raw(d))
                        .unwrap_or_default(),
                ),
                state,
            ]
        })
        .collect();
    render_grid(&headers, &rows)
}

pub fn render_series_text(series: &Series, formatter: &DateFormatter) -> String {
    let mut out = String::new();
    out.push_str(&format_kv_line(&series.label, &sparkline(&series.ys())));
    out.push('\n');
    let headers = vec!["x".to_string(), "Start".to_string(), "Value".to_string()];
    let rows: Vec<Vec<Styled>> = series
        .points
        .iter()
        .map(|p| {
            vec![
                Styled::plain(p.x.to_string()),
                Styled::plain(formatter.format_or_raw(&p.starttime)),
                Styled::plain(format_number(p.y)),
            ]
        })
        .collect();
    out.push_str(&render_grid(&headers, &rows));
    out
}

pub fn render_totals_text(totals: &[TotalEntry], headers: &[String]) -> String {
    let headers = match headers {
        [name, value, ..] => vec![name.clone(), value.clone()],
        _ => vec!["Host".to_string(), "Count".to_string()],
    };
    let rows: Vec<Vec<Styled>> = totals
        .iter()
        .map(|t| {
            vec![
                Styled::plain(truncate_display(&t.name, MAX_CELL_CHARS)),
                Styled::plain(format_number(t.value)),
            ]
        })
        .collect();
    render_grid(&headers, &rows)
}

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    let mut out = serde_json::to_vec_pretty(value).unwrap_or_else(|_| b"null".to_vec());
    out.push(b'\n');
    out
}

pub fn render_html(report: &ListReport) -> Vec<u8> {
    report::render_html(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::LocaleBundle;
    use crate::model::{ColumnDef, Scan, ScannedList, Site};
    use crate::page::PageQuery;
    use time::UtcOffset;

    fn state(show_all: bool) -> PageState {
        let query = PageQuery::from_pairs([
            ("lang", "en"),
            ("showall", if show_all { "true" } else { "false" }),
        ]);
        let mut state =
            PageState::new(query, LocaleBundle::builtin("en").unwrap(), UtcOffset::UTC).unwrap();
        let list = ScannedList {
            id: ObjectId::new("l1"),
            name: "News".into(),
            columns: vec![ColumnDef {
                name: "Category".into(),
                visible: true,
            }],
            sites: (0..30)
                .map(|i| Site {
                    id: ObjectId::new(format!("s{i}")),
                    url: format!("site{i}.example"),
                    column_values: vec!["press".into()],
                    scans: vec![Scan {
                        id: ObjectId::new(format!("scan{i}")),
                        starttime: "2018-01-01 10:00".into(),
                        score: "B".into(),
                        https: i % 2 == 0,
                        ..Scan::default()
                    }],
                })
                .collect(),
            ..ScannedList::default()
        };
        let t = state.begin_request();
        state.apply_primary(&t, list);
        state
    }

    #[test]
    fn infers_format_from_extension() {
        assert_eq!(infer_format_from_path("out.JSON"), Some(OutputFormat::Json));
        assert_eq!(infer_format_from_path("r.htm"), Some(OutputFormat::Html));
        assert_eq!(infer_format_from_path("r.xml"), None);
        assert_eq!(OutputFormat::parse("txt"), Some(OutputFormat::Text));
    }

    #[test]
    fn report_pages_rows_unless_show_all() {
        let report = ListReport::build(&state(false)).unwrap();
        assert_eq!(report.rows.len(), 25);
        assert_eq!(report.total_rows, 30);
        assert_eq!(report.columns.len(), 10);
        assert_eq!(report.score_column, 2);
        assert_eq!(
            report.rows[0].detail_link.as_deref(),
            Some("scan.html?lang=en&site=s0&scan=scan0")
        );
        let report = ListReport::build(&state(true)).unwrap();
        assert_eq!(report.rows.len(), 30);
    }

    #[test]
    fn text_shows_icon_and_literal_for_flags() {
        colored::control::set_override(false);
        let text = render_list_text(&ListReport::build(&state(false)).unwrap());
        assert!(text.contains("✔ true"));
        assert!(text.contains("✘ false"));
        assert!(text.contains("25 of 30 rows"));
        assert!(text.contains("site0.example"));
    }

    #[test]
    fn json_is_pretty_and_terminated() {
        let out = render_json(&vec![1, 2]);
        assert!(out.ends_with(b"\n"));
        assert!(String::from_utf8(out).unwrap().contains("\n  1,"));
    }

    #[test]
    fn totals_use_locale_headers() {
        colored::control::set_override(false);
        let text = render_totals_text(
            &[TotalEntry {
                name: "tracker.example".into(),
                value: 4.0,
            }],
            &["Third party".to_string(), "Count".to_string()],
        );
        assert!(text.starts_with("Third party"));
        assert!(text.contains("tracker.example  4"));
    }
}
