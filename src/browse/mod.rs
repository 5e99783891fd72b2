use itertools::Itertools;
use serde::Serialize;
use time::PrimitiveDateTime;

use crate::datefmt::{self, DateFormatter};
use crate::locale::BrowseStrings;
use crate::model::{ListSummary, ObjectId, ScanGroupState};

/// Sort key of a list: whether it has any scan group, then the start of the
/// last one. A start that cannot be parsed counts as the earliest possible time.
fn latest_start(summary: &ListSummary) -> (bool, PrimitiveDateTime) {
    match summary.current_group() {
        Some(group) => (
            true,
            datefmt::parse_timestamp(&group.startdate).unwrap_or(PrimitiveDateTime::MIN),
        ),
        None => (false, PrimitiveDateTime::MIN),
    }
}

/// Orders lists by the start of their most recent scan group, newest first.
///
/// Lists that were never scanned keep a position behind every scanned list.
pub fn sort_by_latest_scan(summaries: Vec<ListSummary>) -> Vec<ListSummary> {
    summaries
        .into_iter()
        .map(|s| (latest_start(&s), s))
        .sorted_by(|a, b| b.0.cmp(&a.0))
        .map(|(_, s)| s)
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryLink {
    ScannedList {
        list: ObjectId,
        group: Option<ObjectId>,
    },
    Editor {
        list: ObjectId,
    },
    None,
}

impl EntryLink {
    pub fn href(&self, lang: &str) -> Option<String> {
        match self {
            EntryLink::ScannedList { list, group } => {
                let mut href = format!("scannedList.html?lang={lang}&list={list}");
                if let Some(group) = group {
                    href.push_str(&format!("&group={group}"));
                }
                Some(href)
            }
            EntryLink::Editor { list } => Some(format!("list.html?lang={lang}&listid={list}")),
            EntryLink::None => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryStatus {
    Finished { date: String },
    /// `previous` is the date of the last finished scan, `started` the start of the first one.
    Scanning {
        previous: Option<String>,
        started: Option<String>,
    },
    NotScanned,
    Error { previous: Option<String> },
}

impl EntryStatus {
    pub fn label(&self, strings: &BrowseStrings) -> String {
        match self {
            EntryStatus::Finished { date } => date.clone(),
            EntryStatus::Scanning {
                previous: Some(date),
                ..
            } => format!("{date} » {}", strings.progress.scanning),
            EntryStatus::Scanning {
                started: Some(date),
                ..
            } => format!("{} (Start: {date})", strings.progress.scanning),
            EntryStatus::Scanning { .. } => strings.progress.scanning.clone(),
            EntryStatus::NotScanned => strings.progress.not_scanned.clone(),
            EntryStatus::Error {
                previous: Some(date),
            } => date.clone(),
            EntryStatus::Error { previous: None } => strings.progress.error.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct BrowseEntry {
    pub id: ObjectId,
    pub name: String,
    pub description: String,
    pub tags: String,
    pub is_private: bool,
    pub link: EntryLink,
    pub status: EntryStatus,
}

fn entry_link(summary: &ListSummary) -> EntryLink {
    let groups = &summary.scan_groups;
    match groups.last() {
        Some(last) if groups.len() > 1 || last.state.is_finished() => {
            let group = if last.state.is_finished() {
                Some(last.id.clone())
            } else {
                summary.previous_group().map(|g| g.id.clone())
            };
            EntryLink::ScannedList {
                list: summary.id.clone(),
                group,
            }
        }
        Some(_) => EntryLink::ScannedList {
            list: summary.id.clone(),
            group: None,
        },
        None if summary.editable => EntryLink::Editor {
            list: summary.id.clone(),
        },
        None => EntryLink::None,
    }
}

fn entry_status(summary: &ListSummary, formatter: &DateFormatter) -> EntryStatus {
    let Some(last) = summary.current_group() else {
        return EntryStatus::NotScanned;
    };
    let previous_finished = summary
        .previous_group()
        .filter(|g| g.state.is_finished())
        .map(|g| formatter.format_or_raw(&g.startdate));

    match &last.state {
        ScanGroupState::Finish => EntryStatus::Finished {
            date: formatter.format_or_raw(&last.startdate),
        },
        ScanGroupState::Scanning => {
            let started = if summary.scan_groups.len() == 1 && previous_finished.is_none() {
                Some(formatter.format_or_raw(&last.startdate))
            } else {
                None
            };
            EntryStatus::Scanning {
                previous: previous_finished,
                started,
            }
        }
        ScanGroupState::Ready => match previous_finished {
            Some(date) => EntryStatus::Scanning {
                previous: Some(date),
                started: None,
            },
            None => EntryStatus::NotScanned,
        },
        ScanGroupState::Error(_) => EntryStatus::Error {
            previous: previous_finished,
        },
    }
}

pub fn entry(summary: &ListSummary, formatter: &DateFormatter) -> BrowseEntry {
    BrowseEntry {
        id: summary.id.clone(),
        name: summary.name.clone(),
        description: summary.description.clone(),
        tags: summary.tags.join(", "),
        is_private: summary.is_private,
        link: entry_link(summary),
        status: entry_status(summary, formatter),
    }
}

/// Sorts the lists and derives one display entry for each.
pub fn entries(summaries: Vec<ListSummary>, formatter: &DateFormatter) -> Vec<BrowseEntry> {
    sort_by_latest_scan(summaries)
        .iter()
        .map(|s| entry(s, formatter))
        .collect()
}

/// Heading shown above search results, `#VALUE` replaced by the search text.
pub fn search_heading(strings: &BrowseStrings, text: &str) -> String {
    strings.search_results.replacen("#VALUE", text, 1)
}
