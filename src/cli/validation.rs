use std::sync::OnceLock;

use regex::Regex;

use crate::cli::args::{CliArgs, Command};
use crate::table::parse_page_size_choice;

static IDENTIFIER: OnceLock<Option<Regex>> = OnceLock::new();
static LANG_CODE: OnceLock<Option<Regex>> = OnceLock::new();

fn cached_match(cell: &'static OnceLock<Option<Regex>>, pattern: &str, value: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

fn is_identifier(value: &str) -> bool {
    cached_match(&IDENTIFIER, r"^[A-Za-z0-9_-]{1,64}$", value)
}

fn check_id(flag: &str, value: &str) -> Result<(), String> {
    if is_identifier(value.trim()) {
        Ok(())
    } else {
        Err(format!("invalid {flag} '{value}', expected an identifier"))
    }
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(lang) = args.lang.as_deref() {
        if !cached_match(&LANG_CODE, r"^[a-z]{2}$", lang) {
            return Err(format!("invalid --lang '{lang}', expected a two letter code"));
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid --timeout, expected positive integer".to_string());
        }
    }

    match &args.command {
        Command::Browse { .. } | Command::Page { .. } | Command::Draft { .. } => {}
        Command::List {
            list,
            group,
            page_size,
            compare,
            diagram,
            ..
        } => {
            check_id("--list", list)?;
            if let Some(group) = group {
                check_id("--group", group)?;
            }
            if let Some(compare) = compare {
                check_id("--compare", compare)?;
            }
            if let Some(site) = diagram {
                check_id("--diagram", site)?;
            }
            if let Some(raw) = page_size.as_deref() {
                parse_page_size_choice(raw).map_err(|e| format!("invalid --page-size: {e}"))?;
            }
        }
        Command::Groups { list, site } => {
            if let Some(list) = list {
                check_id("--list", list)?;
            }
            if let Some(site) = site {
                check_id("--site", site)?;
            }
        }
        Command::Scan { site, scan } => {
            check_id("--site", site)?;
            check_id("--scan", scan)?;
        }
        Command::Rescan { list, .. } => check_id("--list", list)?,
        Command::Stats {
            site,
            metric,
            range,
            list,
            ..
        } => {
            if let Some(site) = site {
                check_id("--site", site)?;
            }
            if let Some(list) = list {
                check_id("--list", list)?;
            }
            if let Some(raw) = metric.as_deref() {
                raw.parse::<crate::stats::Metric>()
                    .map_err(|e| format!("invalid --metric '{raw}': {e}"))?;
            }
            if let Some(raw) = range.as_deref() {
                crate::utils::parse_index_range(raw)
                    .map_err(|e| format!("invalid --range '{raw}': {e}"))?;
            }
        }
    }
    Ok(())
}
