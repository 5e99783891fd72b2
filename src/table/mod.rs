pub mod dashboard;
pub mod row;

use std::cmp::Ordering;

use serde::Serialize;

use crate::model::{ObjectId, ScannedList};
use crate::utils::parse_page_size;

pub use row::{build_row, build_rows, header_labels, ResultFields};

pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Page sizes offered by the table, `None` meaning all rows.
pub const PAGE_SIZE_CHOICES: [Option<usize>; 4] = [Some(5), Some(10), Some(25), None];

/// Parses a page size and accepts only one of [`PAGE_SIZE_CHOICES`].
pub fn parse_page_size_choice(value: &str) -> Result<Option<usize>, String> {
    let size = parse_page_size(value)?;
    if PAGE_SIZE_CHOICES.contains(&size) {
        Ok(size)
    } else {
        Err(format!("page size '{}' is not one of 5, 10, 25 or all", value.trim()))
    }
}

/// Fixed result columns, appended after the url and the user columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedColumn {
    Score,
    Https,
    HttpsRedirect,
    CookieCount,
    ThirdPartyCount,
    ThirdPartyRequestCount,
    GeoipInCountry,
    Hsts,
}

impl FixedColumn {
    pub const ALL: [FixedColumn; 8] = [
        FixedColumn::Score,
        FixedColumn::Https,
        FixedColumn::HttpsRedirect,
        FixedColumn::CookieCount,
        FixedColumn::ThirdPartyCount,
        FixedColumn::ThirdPartyRequestCount,
        FixedColumn::GeoipInCountry,
        FixedColumn::Hsts,
    ];

    pub fn index(self) -> usize {
        FixedColumn::ALL
            .iter()
            .position(|c| *c == self)
            .unwrap_or_default()
    }
}

/// A typed result value; ordering is by type, not by quality.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Grade(String),
    Flag(bool),
    Count(i64),
}

impl FieldValue {
    /// Grades compare by character code, flags false < true, counts numerically.
    /// Values of different kinds are incomparable.
    pub fn partial_order(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Grade(a), FieldValue::Grade(b)) => Some(a.cmp(b)),
            (FieldValue::Flag(a), FieldValue::Flag(b)) => Some(a.cmp(b)),
            (FieldValue::Count(a), FieldValue::Count(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<FieldValue> for Cell {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Grade(s) => Cell::Text(s),
            FieldValue::Flag(b) => Cell::Flag(b),
            FieldValue::Count(n) => Cell::Number(n),
        }
    }
}

/// The url cell carries enough to link to the site, its detail page and its diagram.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SiteLink {
    pub url: String,
    pub site_id: ObjectId,
    pub scan_id: Option<ObjectId>,
}

impl SiteLink {
    pub fn target_url(&self) -> String {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            self.url.clone()
        } else {
            format!("http://{}", self.url)
        }
    }

    pub fn detail_link(&self, lang: &str) -> Option<String> {
        let scan_id = self.scan_id.as_ref()?;
        Some(format!(
            "scan.html?lang={lang}&site={}&scan={scan_id}",
            self.site_id
        ))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Link(SiteLink),
    Text(String),
    Number(i64),
    Flag(bool),
}

impl Cell {
    pub fn display_text(&self) -> String {
        match self {
            Cell::Link(link) => link.url.clone(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Flag(b) => b.to_string(),
        }
    }

    pub fn site_id(&self) -> Option<&ObjectId> {
        match self {
            Cell::Link(link) => Some(&link.site_id),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Flag(_) => 0,
            Cell::Number(_) => 1,
            Cell::Text(_) => 2,
            Cell::Link(_) => 3,
        }
    }

    fn sort_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.cmp(b),
            (Cell::Flag(a), Cell::Flag(b)) => a.cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Link(a), Cell::Link(b)) => a.url.cmp(&b.url),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SortState {
    pub column: usize,
    pub direction: SortDirection,
}

/// In-memory grid of a scanned list; views render from here, never the other way round.
#[derive(Clone, Debug, Serialize)]
pub struct ResultTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
    visible: Vec<bool>,
    user_columns: usize,
    sort: SortState,
    page_size: Option<usize>,
    show_all: bool,
}

impl ResultTable {
    pub fn from_list(list: &ScannedList, result_columns: &[String], show_all: bool) -> Self {
        let user_columns = list.columns.len();
        let column_count = 1 + user_columns + FixedColumn::ALL.len();

        let mut headers = header_labels(list, result_columns);
        // pad or cut the labels so every column has exactly one
        headers.resize(column_count, String::new());

        let mut visible = Vec::with_capacity(column_count);
        visible.push(true);
        visible.extend(list.columns.iter().map(|c| c.visible));
        visible.resize(column_count, true);

        Self {
            headers,
            rows: build_rows(list),
            visible,
            user_columns,
            sort: SortState {
                column: 1 + user_columns,
                direction: SortDirection::Asc,
            },
            page_size: if show_all {
                None
            } else {
                Some(DEFAULT_PAGE_SIZE)
            },
            show_all,
        }
    }

    pub fn column_count(&self) -> usize {
        1 + self.user_columns + FixedColumn::ALL.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn user_columns(&self) -> usize {
        self.user_columns
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// `None` past the end of a short row.
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    pub fn fixed_column_index(&self, column: FixedColumn) -> usize {
        1 + self.user_columns + column.index()
    }

    pub fn is_visible(&self, column: usize) -> bool {
        self.visible.get(column).copied().unwrap_or(false)
    }

    /// The url column cannot be hidden.
    pub fn set_visible(&mut self, column: usize, visible: bool) {
        if column == 0 {
            return;
        }
        if let Some(v) = self.visible.get_mut(column) {
            *v = visible;
        }
    }

    pub fn visible_columns(&self) -> Vec<usize> {
        (0..self.column_count())
            .filter(|c| self.is_visible(*c))
            .collect()
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn sort_by(&mut self, column: usize, direction: SortDirection) {
        if column < self.column_count() {
            self.sort = SortState { column, direction };
        }
    }

    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: Option<usize>) {
        self.page_size = page_size.filter(|n| *n > 0);
        self.show_all = self.page_size.is_none();
    }

    pub fn show_all(&self) -> bool {
        self.show_all
    }

    pub fn toggle_show_all(&mut self) {
        if self.show_all {
            self.set_page_size(Some(DEFAULT_PAGE_SIZE));
        } else {
            self.set_page_size(None);
        }
    }

    /// Rows ordered by the current sort state; missing cells sort first.
    pub fn sorted_rows(&self) -> Vec<&[Cell]> {
        let column = self.sort.column;
        let mut rows: Vec<&[Cell]> = self.rows.iter().map(Vec::as_slice).collect();
        rows.sort_by(|a, b| {
            let ord = match (a.get(column), b.get(column)) {
                (Some(x), Some(y)) => x.sort_cmp(y),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            match self.sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
        rows
    }

    pub fn page_count(&self) -> usize {
        match self.page_size {
            None => 1,
            Some(size) => ((self.rows.len() + size - 1) / size).max(1),
        }
    }

    /// Zero-based page of the sorted rows.
    pub fn page(&self, index: usize) -> Vec<&[Cell]> {
        let rows = self.sorted_rows();
        match self.page_size {
            None => rows,
            Some(size) => rows.into_iter().skip(index * size).take(size).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDef, Scan, Site};

    #[test]
    fn page_size_must_be_offered() {
        assert_eq!(parse_page_size_choice("10"), Ok(Some(10)));
        assert_eq!(parse_page_size_choice("all"), Ok(None));
        assert!(parse_page_size_choice("7").is_err());
        assert!(parse_page_size_choice("0").is_err());
    }

    fn result_columns() -> Vec<String> {
        (1..=8).map(|i| format!("R{i}")).collect()
    }

    fn list(scores: &[&str]) -> ScannedList {
        ScannedList {
            name: "test".into(),
            columns: vec![ColumnDef {
                name: "Category".into(),
                visible: false,
            }],
            sites: scores
                .iter()
                .enumerate()
                .map(|(i, score)| Site {
                    id: ObjectId::new(format!("s{i}")),
                    url: format!("site{i}.example"),
                    column_values: vec!["news".into()],
                    scans: vec![Scan {
                        score: score.to_string(),
                        ..Scan::default()
                    }],
                })
                .collect(),
            ..ScannedList::default()
        }
    }

    #[test]
    fn default_sort_is_score_ascending() {
        let table = ResultTable::from_list(&list(&["C", "A", "B"]), &result_columns(), false);
        assert_eq!(table.sort().column, 2);
        let scores: Vec<_> = table
            .sorted_rows()
            .iter()
            .map(|r| r[2].display_text())
            .collect();
        assert_eq!(scores, vec!["A", "B", "C"]);
    }

    #[test]
    fn url_column_always_visible() {
        let mut table = ResultTable::from_list(&list(&["A"]), &result_columns(), false);
        assert!(!table.is_visible(1));
        table.set_visible(0, false);
        assert!(table.is_visible(0));
        assert_eq!(table.visible_columns().len(), 9);
    }

    #[test]
    fn show_all_switches_to_unbounded_pages() {
        let scores: Vec<&str> = std::iter::repeat("A").take(30).collect();
        let mut table = ResultTable::from_list(&list(&scores), &result_columns(), false);
        assert_eq!(table.page_count(), 2);
        assert_eq!(table.page(1).len(), 5);
        table.toggle_show_all();
        assert!(table.show_all());
        assert_eq!(table.page(0).len(), 30);
    }

    #[test]
    fn short_rows_do_not_panic() {
        let mut l = list(&["B", "A"]);
        l.sites[0].scans.clear();
        let table = ResultTable::from_list(&l, &result_columns(), false);
        assert!(table.cell(0, 5).is_none());
        let first = table.sorted_rows()[0];
        assert_eq!(first.len(), 2);
    }
}
