use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::{PrimitiveDateTime, UtcOffset};

use crate::api::ApiError;
use crate::compare::{compare_lists, Comparison};
use crate::datefmt::{self, DateFormatter, FormatError};
use crate::locale::{LocaleBundle, LocaleError, ScannedListAlerts, DEFAULT_LANG};
use crate::model::{ObjectId, ScanGroup, ScannedList, PRIVATE_LIST_MESSAGE};
use crate::table::ResultTable;

/// What went wrong while building a view, in the terms shown to the user.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    AccessDenied { message: String },

    #[error("{}", .issues.join("\n"))]
    Validation { issues: Vec<String> },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Locale(#[from] LocaleError),

    #[error("invalid page url '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

impl ViewError {
    /// Maps API failures of a list request onto the list page's messages:
    /// no data is "not found", the private-list error is "access denied".
    pub fn from_api(err: ApiError, alerts: &ScannedListAlerts, list: Option<&ObjectId>) -> Self {
        match err {
            ApiError::Empty { .. } => {
                let message = match list {
                    Some(id) if !alerts.no_list_found_id.is_empty() => {
                        alerts.no_list_found_id.replacen("#ID", id.as_str(), 1)
                    }
                    _ => alerts.no_list_found.clone(),
                };
                ViewError::NotFound { message }
            }
            ApiError::Remote { message } if message == PRIVATE_LIST_MESSAGE => {
                ViewError::AccessDenied {
                    message: if alerts.no_list_private.is_empty() {
                        message
                    } else {
                        alerts.no_list_private.clone()
                    },
                }
            }
            other => ViewError::Api(other),
        }
    }
}

/// Frontend page a URL points at, taken from the last path segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PageKind {
    Browse,
    ScannedList,
    Scan,
    ThirdParties,
    ListEditor,
    #[default]
    Unknown,
}

impl PageKind {
    pub fn from_path(path: &str) -> Self {
        let file = path.rsplit('/').next().unwrap_or_default();
        match file.trim_end_matches(".html") {
            "browse" => PageKind::Browse,
            "scannedList" => PageKind::ScannedList,
            "scan" => PageKind::Scan,
            "thirdParties" => PageKind::ThirdParties,
            "list" => PageKind::ListEditor,
            _ => PageKind::Unknown,
        }
    }
}

/// Query parameters that drive every page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageQuery {
    pub kind: PageKind,
    pub list: Option<ObjectId>,
    pub group: Option<ObjectId>,
    pub site: Option<ObjectId>,
    pub scan: Option<ObjectId>,
    pub lang: String,
    pub show_all: bool,
    pub demo: bool,
    pub query: Option<String>,
    pub edit: bool,
    pub from_old: bool,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            kind: PageKind::Unknown,
            list: None,
            group: None,
            site: None,
            scan: None,
            lang: DEFAULT_LANG.to_string(),
            show_all: false,
            demo: false,
            query: None,
            edit: false,
            from_old: false,
        }
    }
}

impl PageQuery {
    pub fn from_url(url: &str) -> Result<Self, ViewError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| ViewError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let mut query = Self::from_pairs(parsed.query_pairs());
        query.kind = PageKind::from_path(parsed.path());
        Ok(query)
    }

    /// Empty values count as absent. `showall`, `edit` and `n` are only set by
    /// the literal `true`; `demo` is set by its presence.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut out = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref().trim();
            let non_empty = || (!value.is_empty()).then(|| value.to_string());
            match key.as_ref() {
                "list" => out.list = non_empty().map(ObjectId),
                "group" => out.group = non_empty().map(ObjectId),
                "site" => out.site = non_empty().map(ObjectId),
                "scan" => out.scan = non_empty().map(ObjectId),
                "lang" => {
                    if let Some(lang) = non_empty() {
                        out.lang = lang;
                    }
                }
                "showall" => out.show_all = value == "true",
                "demo" => out.demo = true,
                "q" => out.query = non_empty(),
                "edit" => out.edit = value == "true",
                "n" => out.from_old = value == "true",
                _ => {}
            }
        }
        out
    }

    /// Link back to the scanned list page for this list and group.
    pub fn scanned_list_link(&self) -> Option<String> {
        let list = self.list.as_ref()?;
        let mut link = format!("scannedList.html?lang={}&list={}", self.lang, list);
        if let Some(group) = &self.group {
            link.push_str(&format!("&group={group}"));
        }
        if self.show_all {
            link.push_str("&showall=true");
        }
        Some(link)
    }
}

/// Monotonic request ids for one view. Only the most recently issued request
/// may apply its response.
#[derive(Clone, Debug, Default)]
pub struct RequestFence {
    latest: Arc<AtomicU64>,
}

#[derive(Clone, Debug)]
pub struct RequestTicket {
    id: u64,
    latest: Arc<AtomicU64>,
}

impl RequestFence {
    pub fn issue(&self) -> RequestTicket {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        RequestTicket {
            id,
            latest: Arc::clone(&self.latest),
        }
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

impl RequestTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.id
    }
}

/// State of one page view, passed explicitly to every renderer and handler.
#[derive(Debug)]
pub struct PageState {
    query: PageQuery,
    locale: LocaleBundle,
    formatter: DateFormatter,
    primary: Option<ScannedList>,
    table: Option<ResultTable>,
    comparison: Option<Comparison>,
    diagram_site: Option<ObjectId>,
    fence: RequestFence,
}

impl PageState {
    pub fn new(query: PageQuery, locale: LocaleBundle, offset: UtcOffset) -> Result<Self, ViewError> {
        let formatter = locale.formatter(offset)?;
        Ok(Self {
            query,
            locale,
            formatter,
            primary: None,
            table: None,
            comparison: None,
            diagram_site: None,
            fence: RequestFence::default(),
        })
    }

    pub fn query(&self) -> &PageQuery {
        &self.query
    }

    pub fn locale(&self) -> &LocaleBundle {
        &self.locale
    }

    pub fn formatter(&self) -> &DateFormatter {
        &self.formatter
    }

    pub fn primary(&self) -> Option<&ScannedList> {
        self.primary.as_ref()
    }

    pub fn table(&self) -> Option<&ResultTable> {
        self.table.as_ref()
    }

    pub fn table_mut(&mut self) -> Option<&mut ResultTable> {
        self.table.as_mut()
    }

    pub fn comparison(&self) -> Option<&Comparison> {
        self.comparison.as_ref()
    }

    pub fn diagram_site(&self) -> Option<&ObjectId> {
        self.diagram_site.as_ref()
    }

    pub fn begin_request(&self) -> RequestTicket {
        self.fence.issue()
    }

    /// Installs a freshly loaded list. Stale responses are dropped and
    /// `false` is returned.
    pub fn apply_primary(&mut self, ticket: &RequestTicket, list: ScannedList) -> bool {
        if !ticket.is_current() {
            return false;
        }
        let columns = self.locale.result_columns();
        self.table = Some(ResultTable::from_list(&list, &columns, self.query.show_all));
        self.primary = Some(list);
        self.comparison = None;
        true
    }

    /// Overlays a second scan group of the loaded list.
    pub fn apply_comparison(
        &mut self,
        ticket: &RequestTicket,
        other: &ScannedList,
    ) -> Result<bool, ViewError> {
        if !ticket.is_current() {
            return Ok(false);
        }
        let primary = self.primary.as_ref().ok_or_else(|| ViewError::NotFound {
            message: self.locale.scanned_list.alerts.no_list.clone(),
        })?;
        self.comparison = Some(compare_lists(primary, other));
        Ok(true)
    }

    /// Leaves compare mode; the table shows the primary dataset again.
    pub fn clear_comparison(&mut self) -> Option<&ResultTable> {
        self.comparison = None;
        if self.table.is_none() {
            if let Some(list) = &self.primary {
                let columns = self.locale.result_columns();
                self.table = Some(ResultTable::from_list(list, &columns, self.query.show_all));
            }
        }
        self.table.as_ref()
    }

    pub fn compared_date_line(&self) -> Option<String> {
        self.comparison.as_ref()?.date_line(
            &self.locale.scanned_list.compared_scans.date_line,
            &self.formatter,
        )
    }

    pub fn open_diagram(&mut self, site: ObjectId) {
        self.diagram_site = Some(site);
    }

    pub fn close_diagram(&mut self) {
        self.diagram_site = None;
    }

    /// `PrivacyScore - Scan - <name> - <date>` for the loaded list.
    pub fn title(&self) -> Option<String> {
        let list = self.primary.as_ref()?;
        let date = list
            .scan_starttime()
            .map(|t| self.formatter.format_or_raw(t))
            .unwrap_or_default();
        Some(self.locale.page_title(&list.name, &date))
    }

    /// Progress note for a scan group that is still running.
    pub fn progress_message(&self, group: &ScanGroup) -> String {
        let strings = &self.locale.scanned_list.progress;
        let started = self.formatter.format_or_raw(&group.startdate);
        let mut out = strings.progress1.replacen("#TIME", &started, 1);
        if let Some(progress) = group.progress.as_deref() {
            out.push_str(&format!("\n{}: {}", strings.status, progress));
        }
        if let Some(ts) = group.progress_timestamp.as_deref() {
            out.push('\n');
            out.push_str(ts);
        }
        out
    }

    /// Why the list cannot be scanned again yet, `None` when it can.
    ///
    /// The newest group blocks a rescan while it has no end date and for
    /// [`RESCAN_COOLDOWN_MINUTES`] after it ended.
    pub fn rescan_hint(&self, groups: &[ScanGroup], now: PrimitiveDateTime) -> Option<String> {
        let last = groups.last()?;
        let strings = &self.locale.scanned_list.buttons_scanning;
        let ended = last
            .enddate
            .as_deref()
            .and_then(|end| datefmt::parse_timestamp(end).ok());
        let or_default = |text: &str, fallback: &str| {
            if text.is_empty() {
                fallback.to_string()
            } else {
                text.to_string()
            }
        };
        match ended {
            None => Some(or_default(&strings.scan_again_scanning, "Scanning")),
            Some(ended) => {
                let minutes = (now - ended).whole_minutes();
                (minutes < RESCAN_COOLDOWN_MINUTES).then(|| {
                    or_default(&strings.scan_again_later, "Scan again in #M minutes").replacen(
                        "#M",
                        &(RESCAN_COOLDOWN_MINUTES - minutes).to_string(),
                        1,
                    )
                })
            }
        }
    }
}

/// Minutes after the end of a scan before the list may be scanned again.
pub const RESCAN_COOLDOWN_MINUTES: i64 = 30;

/// The diagram needs at least two scans to draw a line.
pub fn diagram_available(groups: &[ScanGroup]) -> bool {
    groups.len() >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDef, Scan, ScanGroupState, Site};

    fn bundle() -> LocaleBundle {
        LocaleBundle::builtin("en").unwrap()
    }

    fn list(started: &str) -> ScannedList {
        ScannedList {
            id: ObjectId::new("l1"),
            name: "News".into(),
            columns: vec![ColumnDef {
                name: "Category".into(),
                visible: true,
            }],
            sites: vec![Site {
                id: ObjectId::new("s1"),
                url: "example.org".into(),
                column_values: vec!["press".into()],
                scans: vec![Scan {
                    starttime: started.into(),
                    score: "B".into(),
                    ..Scan::default()
                }],
            }],
            ..ScannedList::default()
        }
    }

    #[test]
    fn query_defaults_and_flags() {
        let q = PageQuery::from_url(
            "https://privacyscore.org/scannedList.html?list=abc&group=&showall=TRUE&demo",
        )
        .unwrap();
        assert_eq!(q.kind, PageKind::ScannedList);
        assert_eq!(q.list, Some(ObjectId::new("abc")));
        assert_eq!(q.group, None);
        assert_eq!(q.lang, "de");
        assert!(!q.show_all);
        assert!(q.demo);

        let q = PageQuery::from_pairs([("showall", "true"), ("lang", "en"), ("q", "news")]);
        assert!(q.show_all);
        assert_eq!(q.lang, "en");
        assert_eq!(q.query.as_deref(), Some("news"));
    }

    #[test]
    fn scan_page_names_site_and_scan() {
        let q = PageQuery::from_url("https://privacyscore.org/scan.html?lang=en&site=s1&scan=c2")
            .unwrap();
        assert_eq!(q.kind, PageKind::Scan);
        assert_eq!(q.site, Some(ObjectId::new("s1")));
        assert_eq!(q.scan, Some(ObjectId::new("c2")));
    }

    #[test]
    fn invalid_url_is_reported() {
        assert!(matches!(
            PageQuery::from_url("no url"),
            Err(ViewError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn scanned_list_link_carries_group() {
        let q = PageQuery::from_pairs([("list", "l1"), ("group", "g2"), ("lang", "en")]);
        assert_eq!(
            q.scanned_list_link().as_deref(),
            Some("scannedList.html?lang=en&list=l1&group=g2")
        );
    }

    #[test]
    fn last_issued_request_wins() {
        let fence = RequestFence::default();
        let first = fence.issue();
        let second = fence.issue();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(fence.latest(), second.id());
    }

    #[test]
    fn stale_primary_is_dropped() {
        let mut state = PageState::new(PageQuery::default(), bundle(), UtcOffset::UTC).unwrap();
        let stale = state.begin_request();
        let fresh = state.begin_request();
        assert!(!state.apply_primary(&stale, list("2018-01-01 10:00")));
        assert!(state.primary().is_none());
        assert!(state.apply_primary(&fresh, list("2018-01-01 10:00")));
        assert_eq!(state.table().map(|t| t.column_count()), Some(10));
    }

    #[test]
    fn comparison_overlays_and_clears() {
        let mut state = PageState::new(PageQuery::default(), bundle(), UtcOffset::UTC).unwrap();
        let t = state.begin_request();
        state.apply_primary(&t, list("2018-02-01 10:00"));
        let t = state.begin_request();
        assert!(state.apply_comparison(&t, &list("2018-01-01 10:00")).unwrap());
        let line = state.compared_date_line().unwrap();
        assert!(line.starts_with("Old scan: 01/01/2018"));
        assert!(state.clear_comparison().is_some());
        assert!(state.comparison().is_none());
        assert_eq!(state.primary().map(|l| l.name.as_str()), Some("News"));
    }

    #[test]
    fn comparison_needs_primary() {
        let mut state = PageState::new(PageQuery::default(), bundle(), UtcOffset::UTC).unwrap();
        let t = state.begin_request();
        assert!(matches!(
            state.apply_comparison(&t, &list("2018-01-01 10:00")),
            Err(ViewError::NotFound { .. })
        ));
    }

    #[test]
    fn api_errors_map_to_view_errors() {
        let alerts = &bundle().scanned_list.alerts;
        let id = ObjectId::new("abc");
        let err = ViewError::from_api(ApiError::Empty { url: "u".into() }, alerts, Some(&id));
        assert_eq!(err.to_string(), "No list found with the ID abc.");
        let err = ViewError::from_api(
            ApiError::Remote {
                message: PRIVATE_LIST_MESSAGE.into(),
            },
            alerts,
            None,
        );
        assert!(matches!(err, ViewError::AccessDenied { .. }));
        let err = ViewError::from_api(ApiError::Remote { message: "boom".into() }, alerts, None);
        assert!(matches!(err, ViewError::Api(_)));
    }

    #[test]
    fn title_and_progress_use_locale() {
        let mut state = PageState::new(PageQuery::default(), bundle(), UtcOffset::UTC).unwrap();
        let t = state.begin_request();
        state.apply_primary(&t, list("2018-01-02 13:05"));
        assert_eq!(
            state.title().as_deref(),
            Some("PrivacyScore - Scan - News - 01/02/2018 - 01:05 PM")
        );
        let group = ScanGroup {
            id: ObjectId::new("g"),
            startdate: "2018-01-02 13:05".into(),
            enddate: None,
            state: ScanGroupState::Scanning,
            progress: Some("3/10".into()),
            progress_timestamp: None,
            scan_id: None,
        };
        let msg = state.progress_message(&group);
        assert!(msg.starts_with("This list has been scanning since 01/02/2018 - 01:05 PM."));
        assert!(msg.ends_with("Status: 3/10"));
    }

    #[test]
    fn rescan_waits_for_the_cooldown() {
        let state = PageState::new(PageQuery::default(), bundle(), UtcOffset::UTC).unwrap();
        let group = |end: Option<&str>| ScanGroup {
            id: ObjectId::new("g"),
            startdate: "2018-01-02 12:00".into(),
            enddate: end.map(str::to_string),
            state: ScanGroupState::Finish,
            progress: None,
            progress_timestamp: None,
            scan_id: None,
        };
        let now = datefmt::parse_timestamp("2018-01-02 13:10").unwrap();

        assert_eq!(state.rescan_hint(&[], now), None);
        assert_eq!(
            state.rescan_hint(&[group(None)], now).as_deref(),
            Some("Scanning")
        );
        assert_eq!(
            state.rescan_hint(&[group(Some("2018-01-02 13:00"))], now).as_deref(),
            Some("Scan again in 20 minutes")
        );
        assert_eq!(state.rescan_hint(&[group(Some("2018-01-02 12:40"))], now), None);
    }
}
