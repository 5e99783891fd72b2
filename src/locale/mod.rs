use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::UtcOffset;

use crate::datefmt::{DateFormatter, FormatError};

pub const DEFAULT_LANG: &str = "de";

const BUILTIN: [(&str, &str); 2] = [
    ("de", include_str!("../../lang/de.json")),
    ("en", include_str!("../../lang/en.json")),
];

/// Result column labels used when a bundle does not define exactly eight.
pub const DEFAULT_RESULT_COLUMNS: [&str; 8] = [
    "Bewertung",
    "HTTPS",
    "HTTPS-Umleitung",
    "Anzahl Cookies",
    "Third Parties",
    "Third Party Requests",
    "Alle Webserver in Deutschland",
    "HSTS-Flags",
];

#[derive(Debug, Error)]
pub enum LocaleError {
    #[error("unknown language '{lang}' (available: {available})")]
    Unknown { lang: String, available: String },

    #[error("failed to read locale file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse locale bundle {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgressStrings {
    pub scanning: String,
    pub not_scanned: String,
    pub error: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrowseStrings {
    pub search_results: String,
    pub no_results: String,
    pub private_list: String,
    pub progress: ProgressStrings,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScannedListAlerts {
    pub no_list: String,
    pub no_list_found: String,
    #[serde(rename = "noListFoundID")]
    pub no_list_found_id: String,
    pub no_list_private: String,
    pub scan_started: String,
    pub scan_started_error: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComparedScansStrings {
    pub date_line: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanProgressStrings {
    pub progress1: String,
    pub status: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataTablesStrings {
    pub button_expand: String,
    pub button_collapse: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardStrings {
    pub score: String,
    pub https: String,
    pub cookies: String,
    pub third_parties: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiagramStrings {
    pub cookies_label: String,
    pub third_label: String,
    pub third_req_label: String,
    pub https_label: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanAgainStrings {
    pub scan_again_later: String,
    pub scan_again_scanning: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScannedListStrings {
    pub title: String,
    pub result_columns: Vec<String>,
    pub alerts: ScannedListAlerts,
    pub compared_scans: ComparedScansStrings,
    pub progress: ScanProgressStrings,
    pub data_tables: DataTablesStrings,
    pub dashboard: DashboardStrings,
    pub diagram: DiagramStrings,
    pub buttons_scanning: ScanAgainStrings,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListAlerts {
    pub missing_name: String,
    pub missing_column_name: String,
    pub missing_url: String,
    pub column_count: String,
    pub no_sites: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListStrings {
    pub alerts: ListAlerts,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThirdPartiesStrings {
    pub result_columns: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanAlerts {
    pub scan_error: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanDashboardStrings {
    pub score: String,
    pub https: String,
    pub no_https: String,
    pub third_party: String,
    pub cookies: String,
    pub http_header: String,
    pub http_header_not_set: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpsHeadings {
    pub https_true: String,
    pub https_true_standard: String,
    pub https_false: String,
    pub https_false_standard: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpsStrings {
    pub headers: HttpsHeadings,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CookieStrings {
    pub no_cookies: String,
    pub url: String,
    pub host: String,
    pub name: String,
    pub value: String,
    pub expiry: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanThirdPartyStrings {
    pub third_parties: String,
    pub third_party_requests: String,
    pub no_third_parties: String,
    pub no_third_party_requests: String,
    pub url: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeoipStrings {
    pub all_webservers: String,
    pub not_all_webservers: String,
    pub all_mailservers: String,
    pub not_all_mailservers: String,
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderCheckStrings {
    pub key: String,
    pub status: String,
    pub value: String,
}

/// Strings of the single scan page.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanStrings {
    pub title: String,
    pub alerts: ScanAlerts,
    pub dashboard: ScanDashboardStrings,
    pub https: HttpsStrings,
    pub cookies: CookieStrings,
    pub third_parties: ScanThirdPartyStrings,
    pub geoip: GeoipStrings,
    pub http_headers: HeaderCheckStrings,
}

/// Display strings of one language, one typed section per page.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleBundle {
    pub lang: String,
    pub time_format: String,
    pub date_format: String,
    #[serde(default)]
    pub browse: BrowseStrings,
    #[serde(default)]
    pub scanned_list: ScannedListStrings,
    #[serde(default)]
    pub scan: ScanStrings,
    #[serde(default)]
    pub list: ListStrings,
    #[serde(default)]
    pub third_parties: ThirdPartiesStrings,
}

impl LocaleBundle {
    pub fn from_json(origin: &str, text: &str) -> Result<Self, LocaleError> {
        serde_json::from_str(text).map_err(|source| LocaleError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    pub fn builtin(lang: &str) -> Result<Self, LocaleError> {
        let (_, text) = BUILTIN
            .iter()
            .find(|(name, _)| *name == lang)
            .ok_or_else(|| LocaleError::Unknown {
                lang: lang.to_string(),
                available: available_languages().join(", "),
            })?;
        Self::from_json(&format!("builtin:{lang}"), text)
    }

    /// Reads `<dir>/<lang>.json` when a directory is given, falling back to the
    /// embedded bundle if that file does not exist.
    pub fn load(lang: &str, dir: Option<&Path>) -> Result<Self, LocaleError> {
        if let Some(dir) = dir {
            let path = dir.join(format!("{lang}.json"));
            match std::fs::read_to_string(&path) {
                Ok(text) => return Self::from_json(&path.display().to_string(), &text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(LocaleError::Read { path, source }),
            }
        }
        Self::builtin(lang)
    }

    pub fn formatter(&self, offset: UtcOffset) -> Result<DateFormatter, FormatError> {
        Ok(DateFormatter::new(&self.time_format, &self.date_format)?.with_offset(offset))
    }

    pub fn result_columns(&self) -> Vec<String> {
        if self.scanned_list.result_columns.len() == DEFAULT_RESULT_COLUMNS.len() {
            self.scanned_list.result_columns.clone()
        } else {
            DEFAULT_RESULT_COLUMNS.iter().map(|s| s.to_string()).collect()
        }
    }

    pub fn page_title(&self, name: &str, date: &str) -> String {
        let template = if self.scanned_list.title.is_empty() {
            "PrivacyScore - Scan - #NAME - #DATE"
        } else {
            self.scanned_list.title.as_str()
        };
        template.replacen("#NAME", name, 1).replacen("#DATE", date, 1)
    }

    pub fn scan_title(&self, url: &str, date: &str) -> String {
        let template = if self.scan.title.is_empty() {
            "PrivacyScore - #URL - #DATE"
        } else {
            self.scan.title.as_str()
        };
        template.replacen("#URL", url, 1).replacen("#DATE", date, 1)
    }
}

pub fn available_languages() -> Vec<&'static str> {
    BUILTIN.iter().map(|(name, _)| *name).collect()
}
