use serde::Serialize;

use super::{Cell, FieldValue, FixedColumn, SiteLink};
use crate::model::{Scan, ScannedList, Site};

/// The eight result fields shown for every scanned site, in column order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultFields {
    pub score: String,
    pub https: bool,
    pub redirected_to_https: bool,
    pub cookie_count: i64,
    pub third_party_count: i64,
    pub third_party_request_count: i64,
    pub geoip_all_in_country: bool,
    pub hsts: bool,
}

impl ResultFields {
    pub fn from_scan(scan: &Scan) -> Self {
        Self {
            score: scan.score.clone(),
            https: scan.https,
            redirected_to_https: scan.redirected_to_https,
            cookie_count: scan.cookie_count,
            third_party_count: scan.third_party_count,
            third_party_request_count: scan.third_party_request_count,
            geoip_all_in_country: scan.geoip_all_in_country,
            hsts: scan.hsts(),
        }
    }

    pub fn get(&self, column: FixedColumn) -> FieldValue {
        match column {
            FixedColumn::Score => FieldValue::Grade(self.score.clone()),
            FixedColumn::Https => FieldValue::Flag(self.https),
            FixedColumn::HttpsRedirect => FieldValue::Flag(self.redirected_to_https),
            FixedColumn::CookieCount => FieldValue::Count(self.cookie_count),
            FixedColumn::ThirdPartyCount => FieldValue::Count(self.third_party_count),
            FixedColumn::ThirdPartyRequestCount => {
                FieldValue::Count(self.third_party_request_count)
            }
            FixedColumn::GeoipInCountry => FieldValue::Flag(self.geoip_all_in_country),
            FixedColumn::Hsts => FieldValue::Flag(self.hsts),
        }
    }

    pub fn values(&self) -> Vec<FieldValue> {
        FixedColumn::ALL.iter().map(|c| self.get(*c)).collect()
    }
}

/// Builds `[url, ...column_values, <8 result fields>]` for one site.
///
/// A site without scans yields only the url and its column values.
pub fn build_row(site: &Site) -> Vec<Cell> {
    let latest = site.latest_scan();
    let mut row = Vec::with_capacity(1 + site.column_values.len() + FixedColumn::ALL.len());

    row.push(Cell::Link(SiteLink {
        url: site.url.clone(),
        site_id: site.id.clone(),
        scan_id: latest.map(|s| s.id.clone()),
    }));
    row.extend(site.column_values.iter().cloned().map(Cell::Text));

    if let Some(scan) = latest {
        row.extend(ResultFields::from_scan(scan).values().into_iter().map(Cell::from));
    }
    row
}

pub fn build_rows(list: &ScannedList) -> Vec<Vec<Cell>> {
    list.sites.iter().map(build_row).collect()
}

pub fn header_labels(list: &ScannedList, result_columns: &[String]) -> Vec<String> {
    let mut headers = Vec::with_capacity(1 + list.columns.len() + result_columns.len());
    headers.push("URL".to_string());
    headers.extend(list.columns.iter().map(|c| c.name.clone()));
    headers.extend(result_columns.iter().cloned());
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HeaderCheck, ObjectId};

    fn scanned_site() -> Site {
        Site {
            id: ObjectId::new("site-1"),
            url: "example.org".into(),
            column_values: vec!["News".into(), "DE".into()],
            scans: vec![Scan {
                id: ObjectId::new("scan-1"),
                score: "C".into(),
                https: true,
                cookie_count: 3,
                headerchecks: vec![HeaderCheck {
                    key: Some("hsts".into()),
                    status: "Ok".into(),
                    value: None,
                }],
                ..Scan::default()
            }],
        }
    }

    #[test]
    fn scanned_site_has_url_columns_and_eight_results() {
        let row = build_row(&scanned_site());
        assert_eq!(row.len(), 1 + 2 + 8);
        assert_eq!(row[3], Cell::Text("C".into()));
        assert_eq!(row[4], Cell::Flag(true));
        assert_eq!(row[6], Cell::Number(3));
        assert_eq!(row[10], Cell::Flag(true));
    }

    #[test]
    fn unscanned_site_row_is_short() {
        let mut site = scanned_site();
        site.scans.clear();
        let row = build_row(&site);
        assert_eq!(row.len(), 1 + 2);
        match &row[0] {
            Cell::Link(link) => assert!(link.scan_id.is_none()),
            other => panic!("expected link cell, got {other:?}"),
        }
    }
}
