use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::locale::ListAlerts;
use crate::model::ColumnDef;

/// A finding that blocks a list draft from being submitted. Indices are 0-based.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DraftIssue {
    #[error("the list has no name")]
    MissingName,

    #[error("column {} has no name", .index + 1)]
    MissingColumnName { index: usize },

    #[error("row {} has no url", .row + 1)]
    MissingUrl { row: usize },

    #[error("row {} has {found} column values, expected {expected}", .row + 1)]
    ColumnCount {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("the list has no sites")]
    NoSites,
}

impl DraftIssue {
    pub fn message(&self, alerts: &ListAlerts) -> String {
        let (template, index) = match self {
            DraftIssue::MissingName => (&alerts.missing_name, None),
            DraftIssue::MissingColumnName { index } => (&alerts.missing_column_name, Some(*index)),
            DraftIssue::MissingUrl { row } => (&alerts.missing_url, Some(*row)),
            DraftIssue::ColumnCount { row, .. } => (&alerts.column_count, Some(*row)),
            DraftIssue::NoSites => (&alerts.no_sites, None),
        };
        if template.is_empty() {
            return self.to_string();
        }
        match index {
            Some(i) => template.replacen("#INDEX", &(i + 1).to_string(), 1),
            None => template.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSite {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub column_values: Vec<String>,
}

impl DraftSite {
    fn is_blank(&self) -> bool {
        self.url.trim().is_empty() && self.column_values.iter().all(|v| v.trim().is_empty())
    }
}

/// A list as entered before it is saved and scanned.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub sites: Vec<DraftSite>,
}

impl ListDraft {
    /// Reads a draft from YAML (or JSON, which YAML accepts).
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Drops rows with neither a url nor any column value, like an untouched
    /// table row in the editor.
    pub fn without_blank_rows(mut self) -> Self {
        self.sites.retain(|s| !s.is_blank());
        self
    }

    /// Every finding, in form order. Empty when the draft can be submitted.
    pub fn validate(&self) -> Vec<DraftIssue> {
        let mut issues = Vec::new();
        if self.name.trim().is_empty() {
            issues.push(DraftIssue::MissingName);
        }
        for (index, column) in self.columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                issues.push(DraftIssue::MissingColumnName { index });
            }
        }

        let mut rows = 0;
        for (row, site) in self.sites.iter().enumerate() {
            if site.is_blank() {
                continue;
            }
            rows += 1;
            if site.url.trim().is_empty() {
                issues.push(DraftIssue::MissingUrl { row });
            }
            if site.column_values.len() != self.columns.len() {
                issues.push(DraftIssue::ColumnCount {
                    row,
                    found: site.column_values.len(),
                    expected: self.columns.len(),
                });
            }
        }
        if rows == 0 {
            issues.push(DraftIssue::NoSites);
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::LocaleBundle;

    fn draft() -> ListDraft {
        ListDraft::from_yaml(
            r#"
name: Newspapers
tags: [news]
columns:
  - name: Category
sites:
  - url: example.org
    column_values: [press]
  - url: ""
    column_values: [""]
"#,
        )
        .unwrap()
    }

    #[test]
    fn valid_draft_has_no_issues() {
        let d = draft();
        assert!(d.validate().is_empty());
        assert_eq!(d.without_blank_rows().sites.len(), 1);
    }

    #[test]
    fn reports_every_issue() {
        let mut d = draft();
        d.name = " ".into();
        d.columns.push(ColumnDef {
            name: String::new(),
            visible: true,
        });
        d.sites.push(DraftSite {
            url: String::new(),
            column_values: vec!["x".into(), "y".into()],
        });
        let issues = d.validate();
        assert_eq!(
            issues,
            vec![
                DraftIssue::MissingName,
                DraftIssue::MissingColumnName { index: 1 },
                DraftIssue::ColumnCount {
                    row: 0,
                    found: 1,
                    expected: 2
                },
                DraftIssue::MissingUrl { row: 2 },
            ]
        );
    }

    #[test]
    fn empty_draft_has_no_sites() {
        let issues = ListDraft {
            name: "x".into(),
            ..ListDraft::default()
        }
        .validate();
        assert_eq!(issues, vec![DraftIssue::NoSites]);
    }

    #[test]
    fn messages_are_localized() {
        let bundle = LocaleBundle::builtin("en").unwrap();
        let alerts = &bundle.list.alerts;
        assert_eq!(
            DraftIssue::MissingColumnName { index: 0 }.message(alerts),
            "Please enter a name for column 1."
        );
        assert_eq!(
            DraftIssue::MissingUrl { row: 4 }.to_string(),
            "row 5 has no url"
        );
        assert_eq!(
            DraftIssue::NoSites.message(&ListAlerts::default()),
            "the list has no sites"
        );
    }
}
