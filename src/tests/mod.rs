use serde_json::json;

use crate::browse::sort_by_latest_scan;
use crate::compare::{compare_lists, Direction};
use crate::datefmt::DateFormatter;
use crate::locale::LocaleBundle;
use crate::model::{ListSummary, ObjectId, ScanGroup, ScannedList};
use crate::output::{self, ListReport};
use crate::page::{PageQuery, PageState};
use crate::table::{Cell, FieldValue, FixedColumn, ResultTable};

fn scanned_list(group: &str, started: &str, score_a: &str, cookies_a: i64) -> ScannedList {
    serde_json::from_value(json!({
        "_id": {"$oid": "list1"},
        "name": "Newspapers",
        "description": "Daily papers",
        "tags": ["news", "press"],
        "columns": [{"name": "Category", "visible": true}],
        "seiten": [
            {
                "_id": "site-a",
                "url": "a.example",
                "column_values": ["daily"],
                "scans": [{
                    "_id": format!("scan-a-{group}"),
                    "scan_group_id": group,
                    "starttime": started,
                    "score": score_a,
                    "https": true,
                    "redirected_to_https": true,
                    "cookies_anzahl": cookies_a,
                    "third_parties_anzahl": 3,
                    "third_party_requests_anzahl": 12,
                    "geoip_all_webservers_in_germany": true,
                    "headerchecks": [{"key": "hsts", "status": "OK"}]
                }]
            },
            {
                "_id": "site-b",
                "url": "https://b.example",
                "column_values": ["weekly"],
                "scans": [{
                    "_id": format!("scan-b-{group}"),
                    "scan_group_id": group,
                    "starttime": started,
                    "score": "D",
                    "https": false,
                    "cookies_anzahl": 0,
                    "headerchecks": [{"key": "hsts", "status": "MISSING"}]
                }]
            }
        ]
    }))
    .unwrap()
}

fn summary(name: &str, starts: &[&str]) -> ListSummary {
    let groups: Vec<_> = starts
        .iter()
        .enumerate()
        .map(|(i, s)| json!({"_id": format!("{name}-{i}"), "startdate": s, "state": "finish"}))
        .collect();
    serde_json::from_value(json!({
        "_id": name,
        "name": name,
        "scangroups": groups
    }))
    .unwrap()
}

fn state(lang: &str) -> PageState {
    let query = PageQuery::from_pairs([("lang", lang), ("list", "list1")]);
    let locale = LocaleBundle::builtin(lang).unwrap();
    PageState::new(query, locale, time::UtcOffset::UTC).unwrap()
}

#[test]
fn table_has_url_user_and_result_columns() {
    let list = scanned_list("g1", "2018-03-01 10:00:00", "B", 4);
    let bundle = LocaleBundle::builtin("de").unwrap();
    let table = ResultTable::from_list(&list, &bundle.result_columns(), false);

    assert_eq!(table.column_count(), 10);
    assert_eq!(table.headers().len(), 10);
    assert_eq!(table.headers()[1], "Category");
    assert_eq!(table.row_count(), 2);
    for row in table.rows() {
        assert_eq!(row.len(), 10);
        assert!(matches!(row[0], Cell::Link(_)));
    }
    assert_eq!(table.sort().column, 2);
    assert_eq!(table.cell(0, 2), Some(&Cell::Text("B".to_string())));
}

#[test]
fn hsts_follows_the_header_check() {
    let list = scanned_list("g1", "2018-03-01 10:00:00", "B", 4);
    let bundle = LocaleBundle::builtin("de").unwrap();
    let table = ResultTable::from_list(&list, &bundle.result_columns(), false);
    let hsts = table.fixed_column_index(FixedColumn::Hsts);
    assert_eq!(table.cell(0, hsts), Some(&Cell::Flag(true)));
    assert_eq!(table.cell(1, hsts), Some(&Cell::Flag(false)));
}

#[test]
fn comparison_orders_old_before_new() {
    let newer = scanned_list("g2", "2018-04-01 10:00:00", "C", 9);
    let older = scanned_list("g1", "2018-03-01 10:00:00", "A", 4);

    let cmp = compare_lists(&newer, &older);
    let row = cmp.row_for(&ObjectId::new("site-a")).unwrap();
    assert!(row.swapped);
    assert_eq!(row.old_started, "2018-03-01 10:00:00");
    assert_eq!(row.new_started, "2018-04-01 10:00:00");

    let score = row.field(FixedColumn::Score).unwrap();
    assert_eq!(score.old, FieldValue::Grade("A".into()));
    assert_eq!(score.new, FieldValue::Grade("C".into()));
    assert_eq!(score.direction, Direction::Higher);

    let cookies = row.field(FixedColumn::CookieCount).unwrap();
    assert_eq!(cookies.direction, Direction::Higher);

    let unswapped = compare_lists(&older, &newer);
    let row = unswapped.row_for(&ObjectId::new("site-a")).unwrap();
    assert!(!row.swapped);
    assert_eq!(row.old_started, "2018-03-01 10:00:00");
}

#[test]
fn page_state_builds_a_compared_report() {
    let mut state = state("en");
    let ticket = state.begin_request();
    assert!(state.apply_primary(&ticket, scanned_list("g2", "2018-04-01 10:00:00", "C", 9)));

    let ticket = state.begin_request();
    let older = scanned_list("g1", "2018-03-01 10:00:00", "A", 4);
    assert!(state.apply_comparison(&ticket, &older).unwrap());

    let report = ListReport::build(&state).unwrap();
    assert_eq!(report.total_rows, 2);
    assert_eq!(report.columns.len(), 10);
    assert_eq!(report.score_column, 2);
    assert!(report.rows.iter().all(|r| r.comparison.is_some()));
    assert_eq!(
        report.compared_dates.as_deref(),
        Some("Old scan: 03/01/2018 - 10:00 AM | New scan: 04/01/2018 - 10:00 AM")
    );

    colored::control::set_override(false);
    let text = output::render_list_text(&report);
    assert!(text.contains("A → C ↑"));
    assert!(text.contains("✔ true"));

    state.clear_comparison();
    let report = ListReport::build(&state).unwrap();
    assert!(report.rows.iter().all(|r| r.comparison.is_none()));
    assert!(report.compared_dates.is_none());
}

#[test]
fn stale_list_response_is_dropped() {
    let mut state = state("de");
    let first = state.begin_request();
    let second = state.begin_request();
    assert!(state.apply_primary(&second, scanned_list("g2", "2018-04-01 10:00:00", "C", 9)));
    assert!(!state.apply_primary(&first, scanned_list("g1", "2018-03-01 10:00:00", "A", 4)));
    assert_eq!(
        state.primary().and_then(|l| l.scan_group_id()).map(|g| g.as_str()),
        Some("g2")
    );
}

#[test]
fn sorter_keeps_every_list_and_orders_by_latest_scan() {
    let lists = vec![
        summary("never", &[]),
        summary("old", &["2017-01-01 09:00"]),
        summary("new", &["2016-05-01 09:00", "2018-02-01 09:00"]),
        summary("also-never", &[]),
        summary("mid", &["2017-06-01 09:00"]),
    ];
    let sorted = sort_by_latest_scan(lists);
    assert_eq!(sorted.len(), 5);
    let names: Vec<&str> = sorted.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["new", "mid", "old", "never", "also-never"]);

    let starts: Vec<&str> = sorted
        .iter()
        .filter_map(ListSummary::current_group)
        .map(|g: &ScanGroup| g.startdate.as_str())
        .collect();
    assert!(starts.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn twelve_hour_clock_covers_the_whole_day() {
    let formatter = DateFormatter::new("#H:#M_12", "#M/#D/#Y").unwrap();
    for hour in 0..24 {
        let out = formatter
            .format(&format!("2018-01-01 {hour:02}:30:00"))
            .unwrap();
        let suffix = if hour < 12 { " AM" } else { " PM" };
        assert!(out.ends_with(suffix), "{out}");
        let clock = out.trim_start_matches("01/01/2018 - ");
        let shown: u32 = clock[..2].parse().unwrap();
        assert!((1..=12).contains(&shown), "{out}");
    }
}

#[test]
fn json_report_is_serializable() {
    let mut state = state("de");
    let ticket = state.begin_request();
    state.apply_primary(&ticket, scanned_list("g1", "2018-03-01 10:00:00", "B", 4));
    let report = ListReport::build(&state).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&output::render_json(&report)).unwrap();
    assert_eq!(value["name"], "Newspapers");
    assert_eq!(value["rows"].as_array().map(Vec::len), Some(2));
    assert_eq!(value["title"], "PrivacyScore - Scan - Newspapers - 01.03.2018 - 10:00");
}
