use serde::Serialize;

use crate::model::Site;
use crate::utils::round2;

/// Headline numbers shown above a list's result table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dashboard {
    pub average_score: Option<char>,
    pub https_percent: f64,
    pub average_cookies: f64,
    pub average_third_parties: f64,
}

/// Averages are taken over every site of the list, scanned or not.
pub fn summarize(sites: &[Site]) -> Dashboard {
    let total = sites.len();
    if total == 0 {
        return Dashboard {
            average_score: None,
            https_percent: 0.0,
            average_cookies: 0.0,
            average_third_parties: 0.0,
        };
    }

    let scans = sites.iter().filter_map(Site::latest_scan);

    let mut score_sum: u64 = 0;
    let mut scored = 0usize;
    let mut https = 0usize;
    let mut cookies: i64 = 0;
    let mut third_parties: i64 = 0;
    for scan in scans {
        if let Some(c) = scan.score.chars().next() {
            score_sum += u64::from(u32::from(c));
            scored += 1;
        }
        if scan.https {
            https += 1;
        }
        cookies += scan.cookie_count;
        third_parties += scan.third_party_count;
    }

    let average_score = if scored == 0 {
        None
    } else {
        char::from_u32((score_sum / total as u64) as u32)
    };

    Dashboard {
        average_score,
        https_percent: round2(https as f64 * 100.0 / total as f64),
        average_cookies: round2(cookies as f64 / total as f64),
        average_third_parties: round2(third_parties as f64 / total as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Scan;

    fn site(score: &str, https: bool, cookies: i64) -> Site {
        Site {
            url: "x".into(),
            scans: vec![Scan {
                score: score.into(),
                https,
                cookie_count: cookies,
                third_party_count: 1,
                ..Scan::default()
            }],
            ..Site::default()
        }
    }

    #[test]
    fn averages_over_all_sites() {
        let sites = vec![site("A", true, 1), site("C", false, 2), site("B", true, 4)];
        let d = summarize(&sites);
        assert_eq!(d.average_score, Some('B'));
        assert_eq!(d.https_percent, 66.67);
        assert_eq!(d.average_cookies, 2.33);
        assert_eq!(d.average_third_parties, 1.0);
    }

    #[test]
    fn unscanned_sites_lower_the_averages() {
        let sites = vec![site("A", true, 4), Site::default()];
        let d = summarize(&sites);
        assert_eq!(d.https_percent, 50.0);
        assert_eq!(d.average_cookies, 2.0);
    }
}
