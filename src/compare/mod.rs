use std::cmp::Ordering;

use serde::Serialize;

use crate::datefmt::{self, DateFormatter};
use crate::model::{ObjectId, ScannedList, Site};
use crate::table::{FieldValue, FixedColumn, ResultFields};

/// Which way a value moved between the old and the new scan.
///
/// This only drives the arrow and its colour. A lower score letter is a better
/// grade, yet it is reported as `Lower`; the direction carries no judgement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Higher,
    Lower,
    Equal,
}

pub fn direction(old: &FieldValue, new: &FieldValue) -> Direction {
    match old.partial_order(new) {
        Some(Ordering::Less) => Direction::Higher,
        Some(Ordering::Greater) => Direction::Lower,
        _ => Direction::Equal,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComparedField {
    pub column: FixedColumn,
    pub old: FieldValue,
    pub new: FieldValue,
    pub direction: Direction,
}

/// One site's old and new results side by side, earlier scan on the left.
#[derive(Clone, Debug, Serialize)]
pub struct ComparisonRow {
    pub site_id: ObjectId,
    pub url: String,
    pub old_started: String,
    pub new_started: String,
    /// The primary dataset turned out to be the newer one.
    pub swapped: bool,
    pub fields: Vec<ComparedField>,
}

impl ComparisonRow {
    pub fn field(&self, column: FixedColumn) -> Option<&ComparedField> {
        self.fields.iter().find(|f| f.column == column)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Comparison {
    pub rows: Vec<ComparisonRow>,
    /// Urls of sites that lack a scan on either side.
    pub unmatched: Vec<String>,
}

impl Comparison {
    pub fn row_for(&self, site_id: &ObjectId) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| &r.site_id == site_id)
    }

    /// Dates of the last compared row, as `(old, new)`.
    pub fn dates(&self) -> Option<(&str, &str)> {
        self.rows
            .last()
            .map(|r| (r.old_started.as_str(), r.new_started.as_str()))
    }

    /// Fills `#OLDDATE` / `#NEWDATE` in the locale's date line.
    pub fn date_line(&self, template: &str, formatter: &DateFormatter) -> Option<String> {
        let (old, new) = self.dates()?;
        Some(
            template
                .replacen("#OLDDATE", &formatter.format_or_raw(old), 1)
                .replacen("#NEWDATE", &formatter.format_or_raw(new), 1),
        )
    }
}

fn is_later(a: &str, b: &str) -> bool {
    match (datefmt::parse_timestamp(a), datefmt::parse_timestamp(b)) {
        (Ok(a), Ok(b)) => a > b,
        _ => a > b,
    }
}

/// Compares the latest scans of two records of the same site.
pub fn compare_sites(primary: &Site, other: &Site) -> Option<ComparisonRow> {
    let primary_scan = primary.latest_scan()?;
    let other_scan = other.latest_scan()?;

    let mut old = (primary_scan, ResultFields::from_scan(primary_scan));
    let mut new = (other_scan, ResultFields::from_scan(other_scan));

    let swapped = is_later(&primary_scan.starttime, &other_scan.starttime);
    if swapped {
        std::mem::swap(&mut old, &mut new);
    }

    let fields = FixedColumn::ALL
        .iter()
        .map(|column| {
            let o = old.1.get(*column);
            let n = new.1.get(*column);
            ComparedField {
                column: *column,
                direction: direction(&o, &n),
                old: o,
                new: n,
            }
        })
        .collect();

    Some(ComparisonRow {
        site_id: primary.id.clone(),
        url: primary.url.clone(),
        old_started: old.0.starttime.clone(),
        new_started: new.0.starttime.clone(),
        swapped,
        fields,
    })
}

/// Pairs the sites of two scan groups of one list by site id.
pub fn compare_lists(primary: &ScannedList, other: &ScannedList) -> Comparison {
    let mut rows = Vec::new();
    let mut unmatched = Vec::new();
    for site in &primary.sites {
        match other
            .find_site(&site.id)
            .and_then(|o| compare_sites(site, o))
        {
            Some(row) => rows.push(row),
            None => unmatched.push(site.url.clone()),
        }
    }
    Comparison { rows, unmatched }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Scan;

    fn site(started: &str, score: &str, https: bool, cookies: i64) -> Site {
        Site {
            id: ObjectId::new("site"),
            url: "example.org".into(),
            column_values: vec![],
            scans: vec![Scan {
                starttime: started.into(),
                score: score.into(),
                https,
                cookie_count: cookies,
                ..Scan::default()
            }],
        }
    }

    #[test]
    fn direction_follows_natural_order() {
        assert_eq!(
            direction(&FieldValue::Flag(false), &FieldValue::Flag(true)),
            Direction::Higher
        );
        assert_eq!(
            direction(&FieldValue::Count(5), &FieldValue::Count(5)),
            Direction::Equal
        );
        assert_eq!(
            direction(&FieldValue::Grade("B".into()), &FieldValue::Grade("A".into())),
            Direction::Lower
        );
        assert_eq!(
            direction(&FieldValue::Grade("B".into()), &FieldValue::Count(1)),
            Direction::Equal
        );
    }

    #[test]
    fn earlier_scan_is_always_old() {
        let primary = site("2017-07-01 10:00:00", "B", true, 3);
        let other = site("2017-06-01 10:00:00", "C", false, 8);
        let row = compare_sites(&primary, &other).unwrap();
        assert!(row.swapped);
        assert_eq!(row.old_started, "2017-06-01 10:00:00");
        let score = row.field(FixedColumn::Score).unwrap();
        assert_eq!(score.old, FieldValue::Grade("C".into()));
        assert_eq!(score.direction, Direction::Lower);
        let https = row.field(FixedColumn::Https).unwrap();
        assert_eq!(https.direction, Direction::Higher);
        let cookies = row.field(FixedColumn::CookieCount).unwrap();
        assert_eq!(cookies.direction, Direction::Lower);
    }

    #[test]
    fn no_swap_when_primary_is_older() {
        let primary = site("2017-06-01 10:00:00", "A", true, 1);
        let other = site("2017-07-01 10:00:00", "A", true, 1);
        let row = compare_sites(&primary, &other).unwrap();
        assert!(!row.swapped);
        assert!(row.fields.iter().all(|f| f.direction == Direction::Equal));
        assert_eq!(row.fields.len(), 8);
    }

    #[test]
    fn date_line_names_old_and_new() {
        let primary = site("2017-07-01 10:00:00", "A", true, 1);
        let other = site("2017-06-01 10:00:00", "A", true, 1);
        let comparison = compare_lists(
            &ScannedList {
                sites: vec![primary],
                ..ScannedList::default()
            },
            &ScannedList {
                sites: vec![other],
                ..ScannedList::default()
            },
        );
        let formatter = DateFormatter::new("#H:#M_24", "#D.#M.#Y").unwrap();
        let line = comparison
            .date_line("old #OLDDATE, new #NEWDATE", &formatter)
            .unwrap();
        assert_eq!(line, "old 01.06.2017 - 10:00, new 01.07.2017 - 10:00");
    }

    #[test]
    fn sites_without_counterpart_are_unmatched() {
        let mut lonely = site("2017-06-01 10:00:00", "A", true, 1);
        lonely.id = ObjectId::new("other");
        let comparison = compare_lists(
            &ScannedList {
                sites: vec![lonely],
                ..ScannedList::default()
            },
            &ScannedList {
                sites: vec![site("2017-06-01 10:00:00", "A", true, 1)],
                ..ScannedList::default()
            },
        );
        assert!(comparison.rows.is_empty());
        assert_eq!(comparison.unmatched, vec!["example.org".to_string()]);
    }
}
