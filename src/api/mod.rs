use std::time::Duration;

use colored::Colorize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::locale::LocaleBundle;
use crate::model::{ApiMessage, ListSummary, ObjectId, ScanDetail, ScanGroup, ScannedList};
use crate::stats::StatisticsQuery;
use crate::utils::format_kv_line;

pub const DEFAULT_API_URL: &str = "https://privacyscore.org/api";

const USER_AGENT: &str = concat!("scanview/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid API url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response of {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{url} returned no data")]
    Empty { url: String },

    #[error("API error: {message}")]
    Remote { message: String },
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
    pub verbose: u8,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_seconds: 10,
            proxy: None,
            verbose: 0,
        }
    }
}

/// Thin async client over the scan backend's REST endpoints.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base: reqwest::Url,
    verbose: u8,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let trimmed = config.base_url.trim().trim_end_matches('/');
        let base = reqwest::Url::parse(&format!("{trimmed}/")).map_err(|e| ApiError::InvalidUrl {
            url: config.base_url.clone(),
            message: e.to_string(),
        })?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(USER_AGENT),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)));

        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| ApiError::ProxySetup {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ApiError::HttpClientBuild { source: e })?;

        Ok(Self {
            client,
            base,
            verbose: config.verbose,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Joins path segments onto the API base, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ApiError> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| ApiError::InvalidUrl {
                url: self.base.to_string(),
                message: "base url cannot carry a path".to_string(),
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// `/static/frontend/lang/{lang}.json` on the host serving the API.
    pub fn locale_url(&self, lang: &str) -> Result<reqwest::Url, ApiError> {
        self.base
            .join(&format!("/static/frontend/lang/{lang}.json"))
            .map_err(|e| ApiError::InvalidUrl {
                url: self.base.to_string(),
                message: e.to_string(),
            })
    }

    pub async fn show_scanned_list(
        &self,
        list: &ObjectId,
        group: Option<&ObjectId>,
    ) -> Result<ScannedList, ApiError> {
        let url = match group {
            Some(group) => self.endpoint(&["ShowScannedList", list.as_str(), group.as_str()])?,
            None => self.endpoint(&["ShowScannedList", list.as_str()])?,
        };
        self.get_json(url).await
    }

    /// One site with the requested scan first.
    pub async fn show_scan(&self, site: &ObjectId, scan: &ObjectId) -> Result<ScanDetail, ApiError> {
        let url = self.endpoint(&["ShowScan", site.as_str(), scan.as_str()])?;
        self.get_json(url).await
    }

    pub async fn scan_groups_by_list(&self, list: &ObjectId) -> Result<Vec<ScanGroup>, ApiError> {
        let url = self.endpoint(&["GetScanGroupsByList", list.as_str()])?;
        self.get_json(url).await
    }

    pub async fn scan_groups_by_site(&self, site: &ObjectId) -> Result<Vec<ScanGroup>, ApiError> {
        let url = self.endpoint(&["GetScanGroupsBySite", site.as_str()])?;
        self.get_json(url).await
    }

    /// Requests a new scan of the list. An empty body counts as success.
    pub async fn scan_list(&self, list: &ObjectId) -> Result<(), ApiError> {
        let url = self.endpoint(&["ScanList"])?;
        self.log_request("POST", &url);
        let body = serde_json::json!({ "listid": list.as_str() });
        let response = self
            .client
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Request {
                url: url.to_string(),
                source: e,
            })?;
        let text = self.read_body(&url, response).await?;
        if text.trim().is_empty() {
            return Ok(());
        }
        decode_body::<Value>(url.as_str(), &text).map(|_| ())
    }

    pub async fn statistics<T: DeserializeOwned>(
        &self,
        query: &StatisticsQuery,
    ) -> Result<T, ApiError> {
        let mut url = self.endpoint(&["Statistics"])?;
        url.query_pairs_mut()
            .extend_pairs(query.params().iter().map(|(k, v)| (*k, v.as_str())));
        self.get_json(url).await
    }

    pub async fn show_lists(&self) -> Result<Vec<ListSummary>, ApiError> {
        let url = self.endpoint(&["ShowLists", ""])?;
        self.get_json(url).await
    }

    pub async fn search(&self, text: &str) -> Result<Vec<ListSummary>, ApiError> {
        let url = self.endpoint(&["Search", ""])?;
        self.log_request("POST", &url);
        let response = self
            .client
            .post(url.clone())
            .form(&[("searchtext", text)])
            .send()
            .await
            .map_err(|e| ApiError::Request {
                url: url.to_string(),
                source: e,
            })?;
        let text = self.read_body(&url, response).await?;
        decode_body(url.as_str(), &text)
    }

    pub async fn load_locale(&self, lang: &str) -> Result<LocaleBundle, ApiError> {
        self.get_json(self.locale_url(lang)?).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: reqwest::Url) -> Result<T, ApiError> {
        self.log_request("GET", &url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ApiError::Request {
                url: url.to_string(),
                source: e,
            })?;
        let text = self.read_body(&url, response).await?;
        decode_body(url.as_str(), &text)
    }

    async fn read_body(
        &self,
        url: &reqwest::Url,
        response: reqwest::Response,
    ) -> Result<String, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let text = response.text().await.map_err(|e| ApiError::Request {
            url: url.to_string(),
            source: e,
        })?;
        if self.verbose > 1 {
            eprintln!(
                "{}",
                format_kv_line("Response", &format!("{} ({} bytes)", status, text.len()))
            );
        }
        Ok(text)
    }

    fn log_request(&self, method: &str, url: &reqwest::Url) {
        if self.verbose > 0 {
            eprintln!("{}", format_kv_line(method, &url.to_string().dimmed().to_string()));
        }
    }
}

/// Decodes an API body. The backend sometimes returns JSON encoded a second
/// time as a JSON string; `null` and empty bodies mean nothing was found and
/// `{"type": "error"}` objects become [`ApiError::Remote`].
pub fn decode_body<T: DeserializeOwned>(url: &str, text: &str) -> Result<T, ApiError> {
    let decode = |source| ApiError::Decode {
        url: url.to_string(),
        source,
    };
    let empty = || ApiError::Empty {
        url: url.to_string(),
    };

    if text.trim().is_empty() {
        return Err(empty());
    }
    let mut value: Value = serde_json::from_str(text).map_err(decode)?;
    if let Value::String(inner) = &value {
        if inner.trim().is_empty() {
            return Err(empty());
        }
        if let Ok(parsed) = serde_json::from_str::<Value>(inner) {
            value = parsed;
        }
    }
    if value.is_null() {
        return Err(empty());
    }
    if value.get("type").is_some() {
        if let Ok(message) = serde_json::from_value::<ApiMessage>(value.clone()) {
            if message.is_error() {
                return Err(ApiError::Remote {
                    message: message.message,
                });
            }
        }
    }
    serde_json::from_value(value).map_err(decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PRIVATE_LIST_MESSAGE;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: base.to_string(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn endpoints_join_onto_base_path() {
        let api = client("https://privacyscore.org/api/");
        let url = api
            .endpoint(&["ShowScannedList", "abc", "def"])
            .unwrap();
        assert_eq!(url.as_str(), "https://privacyscore.org/api/ShowScannedList/abc/def");
        let url = api.endpoint(&["ShowLists", ""]).unwrap();
        assert_eq!(url.as_str(), "https://privacyscore.org/api/ShowLists/");
    }

    #[test]
    fn locale_url_is_relative_to_site_root() {
        let api = client("https://privacyscore.org/api");
        assert_eq!(
            api.locale_url("en").unwrap().as_str(),
            "https://privacyscore.org/static/frontend/lang/en.json"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = ApiClient::new(&ApiConfig {
            base_url: "not a url".to_string(),
            ..ApiConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl { .. }));
    }

    #[test]
    fn decodes_double_encoded_json() {
        let body = serde_json::to_string(r#"[{"_id":"g1","startdate":"2018-01-01 10:00","state":"finish"}]"#)
            .unwrap();
        let groups: Vec<ScanGroup> = decode_body("u", &body).unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].state.is_finished());
    }

    #[test]
    fn null_and_empty_bodies_are_empty() {
        assert!(matches!(
            decode_body::<ScannedList>("u", "null"),
            Err(ApiError::Empty { .. })
        ));
        assert!(matches!(
            decode_body::<ScannedList>("u", "  "),
            Err(ApiError::Empty { .. })
        ));
        assert!(matches!(
            decode_body::<ScannedList>("u", "\"null\""),
            Err(ApiError::Empty { .. })
        ));
    }

    #[test]
    fn error_objects_become_remote_errors() {
        let body = format!(r#"{{"type":"error","message":"{PRIVATE_LIST_MESSAGE}"}}"#);
        match decode_body::<ScannedList>("u", &body) {
            Err(ApiError::Remote { message }) => assert_eq!(message, PRIVATE_LIST_MESSAGE),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn scan_detail_decodes_from_show_scan_body() {
        let api = client("https://privacyscore.org/api");
        let url = api.endpoint(&["ShowScan", "site1", "scan1"]).unwrap();
        assert_eq!(url.as_str(), "https://privacyscore.org/api/ShowScan/site1/scan1");

        let body = r#"{"_id":{"$oid":"site1"},"url":"https://a.example","singlesite":true,
            "scans":[{"_id":{"$oid":"scan1"},"success":false}]}"#;
        let detail: ScanDetail = decode_body(url.as_str(), body).unwrap();
        assert!(detail.singlesite);
        assert!(!detail.scan().unwrap().success);
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        assert!(matches!(
            decode_body::<ScannedList>("u", "{not json"),
            Err(ApiError::Decode { .. })
        ));
    }
}
