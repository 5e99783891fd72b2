use std::collections::HashSet;

/// Inclusive index range parsed from `START-END`; either side may be empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

pub fn format_kv_line(label: &str, value: &str) -> String {
    format!(":: {:<10}: {}", label, value)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn parse_index_range(value: &str) -> Result<IndexRange, String> {
    let trimmed = value.trim();
    let parts: Vec<&str> = trimmed.split('-').collect();
    if parts.len() != 2 {
        return Err("expected format START-END".to_string());
    }
    let parse = |raw: &str, what: &str| -> Result<Option<usize>, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<usize>()
            .map(Some)
            .map_err(|_| format!("invalid {what} value"))
    };
    let start = parse(parts[0], "START")?;
    let end = parse(parts[1], "END")?;
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err("START must not be greater than END".to_string());
        }
    }
    Ok(IndexRange { start, end })
}

/// `all` (or `-1`, as the table length menu spells it) means unbounded.
pub fn parse_page_size(value: &str) -> Result<Option<usize>, String> {
    let raw = value.trim();
    if raw.eq_ignore_ascii_case("all") || raw == "-1" {
        return Ok(None);
    }
    match raw.parse::<usize>() {
        Ok(0) => Err("page size must be greater than 0".to_string()),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(format!("invalid page size '{raw}'")),
    }
}

pub fn parse_tags_csv(value: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for part in value.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        if seen.insert(item.to_lowercase()) {
            out.push(item.to_string());
        }
    }
    out
}

pub fn truncate_display(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = value.chars().take(keep).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_line_pads_label() {
        assert_eq!(format_kv_line("List", "abc"), ":: List      : abc");
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(2.345678), 2.35);
        assert_eq!(round2(3.0), 3.0);
    }

    #[test]
    fn parse_index_range_accepts_open_sides() {
        assert_eq!(
            parse_index_range("2-5").unwrap(),
            IndexRange {
                start: Some(2),
                end: Some(5)
            }
        );
        assert_eq!(
            parse_index_range("-3").unwrap(),
            IndexRange {
                start: None,
                end: Some(3)
            }
        );
        assert!(parse_index_range("5-2").is_err());
        assert!(parse_index_range("5").is_err());
        assert!(parse_index_range("a-2").is_err());
    }

    #[test]
    fn parse_page_size_handles_all() {
        assert_eq!(parse_page_size("all").unwrap(), None);
        assert_eq!(parse_page_size("-1").unwrap(), None);
        assert_eq!(parse_page_size("10").unwrap(), Some(10));
        assert!(parse_page_size("0").is_err());
    }

    #[test]
    fn parse_tags_csv_trims_and_dedupes() {
        assert_eq!(
            parse_tags_csv("news, Media,,news ,media"),
            vec!["news".to_string(), "Media".to_string()]
        );
    }

    #[test]
    fn truncate_display_marks_cut() {
        assert_eq!(truncate_display("example.org", 20), "example.org");
        assert_eq!(truncate_display("example.org", 5), "exam…");
    }
}
