use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use time::{Duration, PrimitiveDateTime};

use super::{flag_text, grade_text, label_or, render_grid, Styled, MAX_CELL_CHARS};
use crate::datefmt::DateFormatter;
use crate::locale::LocaleBundle;
use crate::model::{Scan, ScanDetail, ScanGroup};
use crate::page::diagram_available;
use crate::utils::{format_kv_line, truncate_display};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CookieRow {
    pub domain: String,
    pub host: String,
    pub name: String,
    pub value: String,
    pub expires: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HeaderRow {
    pub key: String,
    pub status: String,
    pub value: String,
}

/// Another scan of the same site, newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OtherScan {
    pub date: String,
    pub link: Option<String>,
    pub current: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScanResults {
    pub score: String,
    pub final_url: Option<String>,
    pub https: bool,
    pub https_heading: String,
    pub https_text: String,
    pub hsts: bool,
    pub cookie_count: i64,
    pub cookies: Vec<CookieRow>,
    pub third_party_count: i64,
    pub third_party_request_count: i64,
    pub third_parties: Vec<String>,
    pub third_party_requests: Vec<String>,
    pub geoip_summary: Vec<String>,
    pub geoip: Vec<(String, String)>,
    pub headers: Vec<HeaderRow>,
}

/// One scan of one site. `error` is set and `results` is empty when the scan failed.
#[derive(Clone, Debug, Serialize)]
pub struct ScanReport {
    pub title: String,
    pub url: String,
    pub scanned: Option<String>,
    pub error: Option<String>,
    pub results: Option<ScanResults>,
    pub back_link: Option<String>,
    pub other_scans: Vec<OtherScan>,
    pub diagram_available: bool,
}

fn geoip_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn results(
    scan: &Scan,
    url: &str,
    locale: &LocaleBundle,
    formatter: &DateFormatter,
    now: PrimitiveDateTime,
) -> ScanResults {
    let strings = &locale.scan;
    let (https_heading, https_text) = if scan.https {
        (
            &strings.https.headers.https_true,
            &strings.https.headers.https_true_standard,
        )
    } else {
        (
            &strings.https.headers.https_false,
            &strings.https.headers.https_false_standard,
        )
    };

    let cookies = scan
        .cookies()
        .map(|c| CookieRow {
            domain: c.base_domain.clone(),
            host: c.host.clone(),
            name: c.name.clone(),
            value: c.value.clone(),
            expires: c
                .expiry
                .and_then(|ms| now.checked_add(Duration::milliseconds(ms)))
                .and_then(|at| formatter.format_datetime(at)),
        })
        .collect();

    let geo = &strings.geoip;
    let mut geoip_summary = vec![if scan.geoip_all_in_country {
        geo.all_webservers.clone()
    } else {
        geo.not_all_webservers.clone()
    }];
    if scan.domain_has_mailservers {
        geoip_summary.push(if scan.geoip_mailservers_in_country {
            geo.all_mailservers.clone()
        } else {
            geo.not_all_mailservers.clone()
        });
    }

    let mut headers: Vec<HeaderRow> = scan
        .headerchecks
        .iter()
        .map(|h| HeaderRow {
            key: h.key.clone().unwrap_or_default(),
            status: h.status.clone(),
            value: h.value.clone().unwrap_or_default(),
        })
        .collect();
    headers.sort_by(|a, b| a.key.cmp(&b.key));

    ScanResults {
        score: scan.score.clone(),
        final_url: scan.final_url.clone(),
        https: scan.https,
        https_heading: https_heading.clone(),
        https_text: https_text.replacen("#URL", url, 1),
        hsts: scan.hsts(),
        cookie_count: scan.cookie_count,
        cookies,
        third_party_count: scan.third_party_count,
        third_party_request_count: scan.third_party_request_count,
        third_parties: scan.third_parties.clone(),
        third_party_requests: scan.third_party_requests.clone(),
        geoip_summary,
        geoip: scan
            .geoip
            .iter()
            .map(|(k, v)| (k.clone(), geoip_value(v)))
            .collect(),
        headers,
    }
}

impl ScanReport {
    /// `site_groups` are the site's scan groups as `GetScanGroupsBySite` returns
    /// them, oldest first. `now` anchors relative cookie expiry times.
    pub fn build(
        detail: &ScanDetail,
        site_groups: &[ScanGroup],
        locale: &LocaleBundle,
        formatter: &DateFormatter,
        now: PrimitiveDateTime,
    ) -> Self {
        let lang = locale.lang.as_str();
        let scan = detail.scan().filter(|s| s.success);
        let scanned = scan.map(|s| formatter.format_or_raw(&s.starttime));
        let current_group = detail.scan().map(|s| &s.scan_group_id);

        let back_link = match (&detail.list_id, current_group) {
            (Some(list), Some(group)) if !detail.singlesite => Some(format!(
                "scannedList.html?lang={lang}&list={list}&group={group}"
            )),
            _ => None,
        };

        let other_scans = site_groups
            .iter()
            .rev()
            .map(|g| {
                let current = Some(&g.id) == current_group;
                OtherScan {
                    date: formatter.format_or_raw(&g.startdate),
                    link: g
                        .scan_id
                        .as_ref()
                        .filter(|_| !current)
                        .map(|scan| format!("scan.html?lang={lang}&site={}&scan={scan}", detail.id)),
                    current,
                }
            })
            .collect();

        Self {
            title: locale.scan_title(&detail.url, scanned.as_deref().unwrap_or_default()),
            url: detail.url.clone(),
            scanned,
            error: match scan {
                Some(_) => None,
                None => Some(label_or(&locale.scan.alerts.scan_error, "The scan failed.").to_string()),
            },
            results: scan.map(|s| results(s, &detail.url, locale, formatter, now)),
            back_link,
            other_scans,
            diagram_available: diagram_available(site_groups),
        }
    }
}

fn section(out: &mut String, heading: &str, count: usize) {
    out.push('\n');
    out.push_str(&format!("{heading} ({count})").bold().to_string());
    out.push('\n');
}

fn single_column(out: &mut String, header: &str, values: &[String]) {
    let rows: Vec<Vec<Styled>> = values
        .iter()
        .map(|v| vec![Styled::plain(truncate_display(v, MAX_CELL_CHARS * 2))])
        .collect();
    out.push_str(&render_grid(&[header.to_string()], &rows));
}

pub fn render_scan_text(report: &ScanReport, locale: &LocaleBundle) -> String {
    let strings = &locale.scan;
    let mut out = String::new();
    out.push_str(&report.title.bold().to_string());
    out.push('\n');

    let Some(results) = report.results.as_ref() else {
        out.push_str(&format_kv_line("Site", &report.url));
        out.push('\n');
        if let Some(error) = report.error.as_deref() {
            out.push_str(&error.red().to_string());
            out.push('\n');
        }
        return out;
    };

    let dash = &strings.dashboard;
    out.push_str(&format_kv_line("Site", &report.url));
    out.push('\n');
    if let Some(final_url) = results.final_url.as_deref() {
        out.push_str(&format_kv_line("Final URL", final_url));
        out.push('\n');
    }
    out.push_str(&format_kv_line(
        label_or(&dash.score, "Score"),
        &grade_text(&results.score).to_string(),
    ));
    out.push('\n');
    let https_label = if results.https {
        label_or(&dash.https, "HTTPS")
    } else {
        label_or(&dash.no_https, "HTTPS")
    };
    out.push_str(&format_kv_line(https_label, &flag_text(results.https).to_string()));
    out.push('\n');
    out.push_str(&format_kv_line(
        label_or(&dash.third_party, "Third parties"),
        &format!(
            "{} ({})",
            results.third_party_count, results.third_party_request_count
        ),
    ));
    out.push('\n');
    out.push_str(&format_kv_line(
        label_or(&dash.cookies, "Cookies"),
        &results.cookie_count.to_string(),
    ));
    out.push('\n');
    let hsts_label = if results.hsts {
        label_or(&dash.http_header, "HSTS")
    } else {
        label_or(&dash.http_header_not_set, "HSTS")
    };
    out.push_str(&format_kv_line(hsts_label, &flag_text(results.hsts).to_string()));
    out.push('\n');

    out.push('\n');
    out.push_str(&results.https_heading.bold().to_string());
    out.push('\n');
    out.push_str(&results.https_text);
    out.push('\n');

    let cs = &strings.cookies;
    section(&mut out, "Cookies", results.cookies.len());
    if results.cookies.is_empty() {
        out.push_str(&cs.no_cookies);
        out.push('\n');
    } else {
        let headers = [&cs.url, &cs.host, &cs.name, &cs.value, &cs.expiry]
            .iter()
            .zip(["Domain", "Host", "Name", "Value", "Expires"])
            .map(|(label, fallback)| label_or(label, fallback).to_string())
            .collect::<Vec<_>>();
        let rows: Vec<Vec<Styled>> = results
            .cookies
            .iter()
            .map(|c| {
                vec![
                    Styled::plain(truncate_display(&c.domain, MAX_CELL_CHARS)),
                    Styled::plain(truncate_display(&c.host, MAX_CELL_CHARS)),
                    Styled::plain(truncate_display(&c.name, MAX_CELL_CHARS)),
                    Styled::plain(truncate_display(&c.value, MAX_CELL_CHARS)),
                    Styled::plain(c.expires.clone().unwrap_or_default()),
                ]
            })
            .collect();
        out.push_str(&render_grid(&headers, &rows));
    }

    let ts = &strings.third_parties;
    let url_label = label_or(&ts.url, "URL");
    section(
        &mut out,
        label_or(&ts.third_parties, "Third parties"),
        results.third_parties.len(),
    );
    if results.third_parties.is_empty() {
        out.push_str(&ts.no_third_parties);
        out.push('\n');
    } else {
        single_column(&mut out, url_label, &results.third_parties);
    }
    section(
        &mut out,
        label_or(&ts.third_party_requests, "Third party requests"),
        results.third_party_requests.len(),
    );
    if results.third_party_requests.is_empty() {
        out.push_str(&ts.no_third_party_requests);
        out.push('\n');
    } else {
        single_column(&mut out, url_label, &results.third_party_requests);
    }

    out.push('\n');
    out.push_str(&"Geo-IP".bold().to_string());
    out.push('\n');
    for line in &results.geoip_summary {
        out.push_str(line);
        out.push('\n');
    }
    if !results.geoip.is_empty() {
        let geo = &strings.geoip;
        let headers = vec![
            label_or(&geo.key, "Server").to_string(),
            label_or(&geo.value, "Location").to_string(),
        ];
        let rows: Vec<Vec<Styled>> = results
            .geoip
            .iter()
            .map(|(k, v)| vec![Styled::plain(k.clone()), Styled::plain(v.clone())])
            .collect();
        out.push_str(&render_grid(&headers, &rows));
    }

    let hs = &strings.http_headers;
    section(&mut out, "HTTP headers", results.headers.len());
    let headers = vec![
        label_or(&hs.key, "Header").to_string(),
        label_or(&hs.status, "Status").to_string(),
        label_or(&hs.value, "Value").to_string(),
    ];
    let rows: Vec<Vec<Styled>> = results
        .headers
        .iter()
        .map(|h| {
            let status = if h.status.eq_ignore_ascii_case("ok") {
                Styled::painted(&h.status, |s| s.green())
            } else {
                Styled::painted(&h.status, |s| s.red())
            };
            vec![
                Styled::plain(h.key.clone()),
                status,
                Styled::plain(truncate_display(&h.value, MAX_CELL_CHARS)),
            ]
        })
        .collect();
    out.push_str(&render_grid(&headers, &rows));

    if !report.other_scans.is_empty() {
        section(&mut out, "Scans", report.other_scans.len());
        for other in &report.other_scans {
            let line = match (&other.link, other.current) {
                (_, true) => format!("* {}", other.date),
                (Some(link), false) => format!("  {}  {link}", other.date),
                (None, false) => format!("  {}", other.date),
            };
            out.push_str(&line);
            out.push('\n');
        }
    }
    if let Some(link) = report.back_link.as_deref() {
        out.push('\n');
        out.push_str(&format_kv_line("List", link));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datefmt::parse_timestamp;
    use serde_json::json;
    use time::UtcOffset;

    fn detail(success: bool) -> ScanDetail {
        serde_json::from_value(json!({
            "_id": {"$oid": "site1"},
            "url": "https://a.example",
            "list_id": {"$oid": "list1"},
            "singlesite": false,
            "scans": [{
                "_id": {"$oid": "scan2"},
                "scan_group_id": {"$oid": "g2"},
                "starttime": "2018-03-01 10:00:00",
                "success": success,
                "score": "C",
                "https": true,
                "final_url": "https://www.a.example/",
                "cookies_anzahl": 1,
                "third_parties_anzahl": 2,
                "third_party_requests_anzahl": 5,
                "third_parties": ["t1.example", "t2.example"],
                "third_party_requests": [],
                "profilecookies": [{"baseDomain": "a.example", "host": "a.example", "name": "sid", "value": "x", "expiry": 3600000}],
                "geoip_all_webservers_in_germany": false,
                "domain_has_mailservers": true,
                "geoip_all_mailservers_in_germany": true,
                "geoip": {"webserver": "US"},
                "headerchecks": [
                    {"key": "xfo", "status": "MISSING", "value": null},
                    {"key": "hsts", "status": "OK", "value": "max-age=31536000"}
                ]
            }]
        }))
        .unwrap()
    }

    fn groups() -> Vec<ScanGroup> {
        serde_json::from_value(json!([
            {"_id": "g1", "startdate": "2018-02-01 10:00", "state": "finish", "scan_id": {"_id": {"$oid": "scan1"}}},
            {"_id": "g2", "startdate": "2018-03-01 10:00", "state": "finish", "scan_id": {"_id": {"$oid": "scan2"}}}
        ]))
        .unwrap()
    }

    fn build(success: bool) -> ScanReport {
        let locale = LocaleBundle::builtin("en").unwrap();
        let formatter = locale.formatter(UtcOffset::UTC).unwrap();
        let now = parse_timestamp("2018-03-02 08:00:00").unwrap();
        ScanReport::build(&detail(success), &groups(), &locale, &formatter, now)
    }

    #[test]
    fn successful_scan_fills_every_section() {
        let report = build(true);
        assert_eq!(report.title, "PrivacyScore - Results for https://a.example - 03/01/2018 - 10:00 AM");
        assert!(report.error.is_none());
        let results = report.results.as_ref().unwrap();
        assert!(results.hsts);
        assert_eq!(
            results.https_text,
            "https://a.example can be reached over an encrypted connection."
        );
        assert_eq!(results.cookies[0].expires.as_deref(), Some("03/02/2018 - 09:00 AM"));
        let keys: Vec<_> = results.headers.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["hsts", "xfo"]);
        assert_eq!(results.headers[0].value, "max-age=31536000");
        assert_eq!(
            results.geoip_summary,
            vec![
                "Not all web servers are located in Germany.".to_string(),
                "All mail servers are located in Germany.".to_string(),
            ]
        );
        assert_eq!(
            report.back_link.as_deref(),
            Some("scannedList.html?lang=en&list=list1&group=g2")
        );
        assert!(report.diagram_available);
        assert!(report.other_scans[0].current);
        assert_eq!(
            report.other_scans[1].link.as_deref(),
            Some("scan.html?lang=en&site=site1&scan=scan1")
        );
    }

    #[test]
    fn failed_scan_shows_the_scan_error() {
        let report = build(false);
        assert!(report.results.is_none());
        assert_eq!(report.error.as_deref(), Some("This site could not be scanned."));

        colored::control::set_override(false);
        let locale = LocaleBundle::builtin("en").unwrap();
        let text = render_scan_text(&report, &locale);
        assert!(text.contains("https://a.example"));
        assert!(text.contains("This site could not be scanned."));
    }

    #[test]
    fn text_lists_header_checks() {
        colored::control::set_override(false);
        let locale = LocaleBundle::builtin("en").unwrap();
        let text = render_scan_text(&build(true), &locale);
        assert!(text.contains("hsts    OK"));
        assert!(text.contains("max-age=31536000"));
        assert!(text.contains("No requests to third parties were made."));
        assert!(text.contains("t2.example"));
    }
}
