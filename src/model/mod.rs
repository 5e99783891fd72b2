use std::collections::BTreeMap;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Error message the API returns when a private list is requested anonymously.
pub const PRIVATE_LIST_MESSAGE: &str = "This list is private. Please login.";

/// Identifier as sent by the API, either a plain string or `{"$oid": "..."}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Plain(String),
            Number(i64),
            Oid {
                #[serde(rename = "$oid")]
                oid: String,
            },
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Plain(s) => ObjectId(s),
            Raw::Number(n) => ObjectId(n.to_string()),
            Raw::Oid { oid } => ObjectId(oid),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScanGroupState {
    Ready,
    Scanning,
    Finish,
    Error(String),
}

impl ScanGroupState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finish)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ready => "ready",
            Self::Scanning => "scanning",
            Self::Finish => "finish",
            Self::Error(raw) => raw.as_str(),
        }
    }
}

impl From<String> for ScanGroupState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ready" => Self::Ready,
            "scanning" => Self::Scanning,
            "finish" => Self::Finish,
            _ => Self::Error(value),
        }
    }
}

impl From<ScanGroupState> for String {
    fn from(value: ScanGroupState) -> Self {
        value.as_str().to_string()
    }
}

/// One batch execution of scans across a list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanGroup {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: ObjectId,
    #[serde(default)]
    pub startdate: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub enddate: Option<String>,
    pub state: ScanGroupState,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub progress: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub progress_timestamp: Option<String>,
    /// Scan of one site in this group, only set by `GetScanGroupsBySite`.
    #[serde(default, deserialize_with = "scan_ref")]
    pub scan_id: Option<ObjectId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderCheck {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub value: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    #[serde(rename = "baseDomain", default, deserialize_with = "lenient_string")]
    pub base_domain: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub host: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    /// Milliseconds from the moment of display until the cookie expires.
    #[serde(default, deserialize_with = "lenient_opt_count")]
    pub expiry: Option<i64>,
}

/// Outcome of checking one site within one scan group.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Scan {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: ObjectId,
    #[serde(default)]
    pub scan_group_id: ObjectId,
    #[serde(default)]
    pub starttime: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub score: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub https: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub redirected_to_https: bool,
    #[serde(rename = "cookies_anzahl", default, deserialize_with = "lenient_count")]
    pub cookie_count: i64,
    #[serde(
        rename = "third_parties_anzahl",
        default,
        deserialize_with = "lenient_count"
    )]
    pub third_party_count: i64,
    #[serde(
        rename = "third_party_requests_anzahl",
        default,
        deserialize_with = "lenient_count"
    )]
    pub third_party_request_count: i64,
    #[serde(
        rename = "geoip_all_webservers_in_germany",
        default,
        deserialize_with = "lenient_bool"
    )]
    pub geoip_all_in_country: bool,
    #[serde(default)]
    pub headerchecks: Vec<HeaderCheck>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub final_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub success: bool,
    #[serde(default)]
    pub flashcookies: Vec<Cookie>,
    #[serde(default)]
    pub profilecookies: Vec<Cookie>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub third_parties: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub third_party_requests: Vec<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub domain_has_mailservers: bool,
    #[serde(
        rename = "geoip_all_mailservers_in_germany",
        default,
        deserialize_with = "lenient_bool"
    )]
    pub geoip_mailservers_in_country: bool,
    /// Geo-IP facts by name, kept sorted.
    #[serde(default)]
    pub geoip: BTreeMap<String, Value>,
}

impl Scan {
    /// HSTS is never stored; it is derived from the header checks every time.
    pub fn hsts(&self) -> bool {
        hsts_from_checks(&self.headerchecks)
    }

    /// Flash cookies first, then browser profile cookies.
    pub fn cookies(&self) -> impl Iterator<Item = &Cookie> {
        self.flashcookies.iter().chain(self.profilecookies.iter())
    }
}

pub fn hsts_from_checks(checks: &[HeaderCheck]) -> bool {
    checks
        .iter()
        .any(|c| c.key.as_deref() == Some("hsts") && c.status.eq_ignore_ascii_case("ok"))
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Site {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: ObjectId,
    pub url: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub column_values: Vec<String>,
    /// Most recent first.
    #[serde(default)]
    pub scans: Vec<Scan>,
}

impl Site {
    pub fn latest_scan(&self) -> Option<&Scan> {
        self.scans.first()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

/// Payload of `ShowScannedList`: a list with the scan results of one group.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScannedList {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub tags: Vec<String>,
    #[serde(rename = "seiten", alias = "sites", default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub userid: Option<ObjectId>,
}

impl ScannedList {
    /// Scan group of the results shown, taken from the first site's latest scan.
    pub fn scan_group_id(&self) -> Option<&ObjectId> {
        self.sites
            .first()
            .and_then(Site::latest_scan)
            .map(|s| &s.scan_group_id)
    }

    pub fn scan_starttime(&self) -> Option<&str> {
        self.sites
            .first()
            .and_then(Site::latest_scan)
            .map(|s| s.starttime.as_str())
    }

    /// The last site has no results yet, so the group is still being scanned.
    pub fn is_pending(&self) -> bool {
        self.sites.last().map(|s| s.scans.is_empty()).unwrap_or(false)
    }

    pub fn find_site(&self, id: &ObjectId) -> Option<&Site> {
        self.sites.iter().find(|s| &s.id == id)
    }
}

/// Payload of `ShowScan`: one site with the requested scan first.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScanDetail {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: ObjectId,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub list_id: Option<ObjectId>,
    /// The site was scanned on its own, without a list to go back to.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub singlesite: bool,
    #[serde(default)]
    pub scans: Vec<Scan>,
}

impl ScanDetail {
    pub fn scan(&self) -> Option<&Scan> {
        self.scans.first()
    }
}

/// Entry of `ShowLists` / `Search`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListSummary {
    #[serde(alias = "_id", default)]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub tags: Vec<String>,
    #[serde(rename = "isprivate", default, deserialize_with = "lenient_bool")]
    pub is_private: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub editable: bool,
    #[serde(rename = "userid", default)]
    pub owner: Option<ObjectId>,
    #[serde(rename = "scangroups", default)]
    pub scan_groups: Vec<ScanGroup>,
}

impl ListSummary {
    /// The current state of a list is the state of its last scan group.
    pub fn current_group(&self) -> Option<&ScanGroup> {
        self.scan_groups.last()
    }

    pub fn previous_group(&self) -> Option<&ScanGroup> {
        let len = self.scan_groups.len();
        if len < 2 {
            return None;
        }
        self.scan_groups.get(len - 2)
    }
}

/// `{"type": "...", "message": "..."}` objects returned instead of a payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

impl ApiMessage {
    pub fn is_error(&self) -> bool {
        self.kind == "error"
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    Ok(value_to_string(Value::deserialize(deserializer)?))
}

pub(crate) fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        other => Some(value_to_string(other)),
    })
}

pub(crate) fn lenient_strings<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.into_iter().map(value_to_string).collect()),
        Value::String(s) if s.is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(s.split(',').map(|t| t.trim().to_string()).collect()),
        other => Err(de::Error::custom(format!("expected a list, got {other}"))),
    }
}

pub(crate) fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().map(|v| v != 0.0).unwrap_or(false)),
        Value::String(s) => Ok(s.eq_ignore_ascii_case("true")),
        other => Err(de::Error::custom(format!("expected a boolean, got {other}"))),
    }
}

pub(crate) fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|v| v as i64))
            .ok_or_else(|| de::Error::custom("count out of range")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| de::Error::custom(format!("invalid count '{s}'"))),
        other => Err(de::Error::custom(format!("expected a count, got {other}"))),
    }
}

pub(crate) fn lenient_opt_count<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        other => lenient_count(other).map(Some).map_err(de::Error::custom),
    }
}

/// `{"_id": {"$oid": ..}}` as well as a bare id.
fn scan_ref<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<ObjectId>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Nested {
            #[serde(rename = "_id")]
            id: ObjectId,
        },
        Plain(ObjectId),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Nested { id } | Raw::Plain(id) => id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scan_detail_reads_cookies_and_geoip() {
        let detail: ScanDetail = serde_json::from_value(json!({
            "_id": {"$oid": "site1"},
            "url": "https://a.example",
            "list_id": {"$oid": "list1"},
            "singlesite": false,
            "scans": [{
                "success": true,
                "third_parties": ["t1.example", "t2.example"],
                "third_party_requests": ["https://t1.example/x.js"],
                "flashcookies": [{"baseDomain": "a.example", "host": ".a.example", "name": "f", "value": "1", "expiry": null}],
                "profilecookies": [{"baseDomain": "t1.example", "host": "t1.example", "name": "id", "value": 7, "expiry": 3600000}],
                "geoip": {"webserver": "DE", "mailserver": "US"}
            }]
        }))
        .unwrap();
        let scan = detail.scan().unwrap();
        assert!(scan.success);
        let cookies: Vec<_> = scan.cookies().collect();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "f");
        assert_eq!(cookies[1].value, "7");
        assert_eq!(cookies[1].expiry, Some(3_600_000));
        let keys: Vec<_> = scan.geoip.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["mailserver", "webserver"]);
    }

    #[test]
    fn site_groups_carry_their_scan() {
        let groups: Vec<ScanGroup> = serde_json::from_value(json!([
            {"_id": "g1", "startdate": "2018-01-01 10:00", "state": "finish",
             "scan_id": {"_id": {"$oid": "scan1"}}},
            {"_id": "g2", "startdate": "2018-02-01 10:00", "state": "finish"}
        ]))
        .unwrap();
        assert_eq!(groups[0].scan_id, Some(ObjectId::new("scan1")));
        assert_eq!(groups[1].scan_id, None);
    }

    #[test]
    fn object_id_accepts_oid_and_plain_forms() {
        let a: ObjectId = serde_json::from_value(json!({"$oid": "abc"})).unwrap();
        let b: ObjectId = serde_json::from_value(json!("abc")).unwrap();
        let c: ObjectId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(a, b);
        assert_eq!(c.as_str(), "42");
    }

    #[test]
    fn hsts_requires_ok_status_case_insensitive() {
        let ok = vec![HeaderCheck {
            key: Some("hsts".into()),
            status: "OK".into(),
            value: None,
        }];
        let missing = vec![HeaderCheck {
            key: Some("hsts".into()),
            status: "missing".into(),
            value: None,
        }];
        assert!(hsts_from_checks(&ok));
        assert!(!hsts_from_checks(&missing));
        assert!(!hsts_from_checks(&[]));
    }

    #[test]
    fn scan_group_state_keeps_error_variants() {
        let g: ScanGroup = serde_json::from_value(json!({
            "_id": {"$oid": "g1"},
            "startdate": "2017-06-01 10:00:00",
            "state": "error: scanner timed out"
        }))
        .unwrap();
        assert!(g.state.is_error());
        assert_eq!(g.state.as_str(), "error: scanner timed out");
    }

    #[test]
    fn scan_fields_map_from_api_names() {
        let scan: Scan = serde_json::from_value(json!({
            "_id": {"$oid": "s1"},
            "scan_group_id": {"$oid": "g1"},
            "starttime": "2017-06-01 10:00:00",
            "score": "B",
            "https": true,
            "redirected_to_https": null,
            "cookies_anzahl": 4,
            "third_parties_anzahl": 7,
            "third_party_requests_anzahl": 19,
            "geoip_all_webservers_in_germany": false,
            "headerchecks": [{"key": "hsts", "status": "ok", "value": "max-age=1"}]
        }))
        .unwrap();
        assert_eq!(scan.cookie_count, 4);
        assert_eq!(scan.third_party_request_count, 19);
        assert!(!scan.redirected_to_https);
        assert!(scan.hsts());
    }

    #[test]
    fn pending_when_last_site_has_no_scans() {
        let list: ScannedList = serde_json::from_value(json!({
            "name": "News",
            "seiten": [
                {"url": "a.example", "scans": [{"score": "A"}]},
                {"url": "b.example", "scans": []}
            ],
            "columns": []
        }))
        .unwrap();
        assert!(list.is_pending());
    }
}
