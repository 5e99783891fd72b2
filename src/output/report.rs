use super::{ListReport, ReportRow};
use crate::compare::Direction;
use crate::table::{Cell, FieldValue, FixedColumn};

fn json_for_script_tag(value: &str) -> String {
    value.replace("</", "<\\/")
}

pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Icon for sighted readers, the literal value for everyone else.
fn flag_html(value: bool) -> String {
    let (icon, class) = if value {
        ("check_circle", "text-emerald-600 dark:text-emerald-400")
    } else {
        ("cancel", "text-rose-600 dark:text-rose-400")
    };
    format!(
        r#"<span class="material-symbols-outlined {class}" aria-hidden="true">{icon}</span><span class="sr-only">{value}</span>"#
    )
}

fn grade_class(grade: &str) -> &'static str {
    match grade.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('A') | Some('B') => "bg-emerald-100/50 dark:bg-emerald-900/20 text-emerald-700 dark:text-emerald-400",
        Some('C') | Some('D') => "bg-amber-100/50 dark:bg-amber-900/20 text-amber-700 dark:text-amber-400",
        Some('E') | Some('F') => "bg-rose-100/50 dark:bg-rose-900/20 text-rose-700 dark:text-rose-400",
        _ => "bg-slate-100 dark:bg-slate-800 text-slate-700 dark:text-slate-300",
    }
}

fn field_html(value: &FieldValue) -> String {
    match value {
        FieldValue::Grade(s) => escape_html(s),
        FieldValue::Flag(b) => flag_html(*b),
        FieldValue::Count(n) => n.to_string(),
    }
}

fn arrow_html(direction: Direction) -> &'static str {
    match direction {
        Direction::Higher => r#"<span class="text-rose-600 font-bold" title="higher">&uarr;</span>"#,
        Direction::Lower => r#"<span class="text-emerald-600 font-bold" title="lower">&darr;</span>"#,
        Direction::Equal => r#"<span class="text-slate-400" title="equal">&rarr;</span>"#,
    }
}

fn cell_html(report: &ListReport, row: &ReportRow, column: usize) -> String {
    let fixed = column
        .checked_sub(report.score_column)
        .and_then(|i| FixedColumn::ALL.get(i).copied());
    if let Some(field) = row
        .comparison
        .as_ref()
        .zip(fixed)
        .and_then(|(c, f)| c.field(f))
    {
        return format!(
            "{} &rarr; {} {}",
            field_html(&field.old),
            field_html(&field.new),
            arrow_html(field.direction)
        );
    }

    match row.cells.get(column) {
        None => String::new(),
        Some(Cell::Link(link)) => {
            let mut html = format!(
                r#"<a class="text-primary hover:underline break-all" href="{}" target="_blank" rel="noreferrer">{}</a>"#,
                escape_html(&link.target_url()),
                escape_html(&link.url)
            );
            if let Some(detail) = &row.detail_link {
                html.push_str(&format!(
                    r#" <a class="text-slate-400 hover:text-primary" href="{}" title="details"><span class="material-symbols-outlined text-[18px] align-middle">info</span></a>"#,
                    escape_html(detail)
                ));
            }
            html
        }
        Some(Cell::Flag(b)) => flag_html(*b),
        Some(Cell::Text(s)) if column == report.score_column => format!(
            r#"<span class="{} px-3 py-1 rounded-lg text-xs font-bold">{}</span>"#,
            grade_class(s),
            escape_html(s)
        ),
        Some(Cell::Text(s)) => escape_html(s),
        Some(Cell::Number(n)) => n.to_string(),
    }
}

fn table_html(report: &ListReport) -> String {
    let visible = report.visible_columns();
    let mut head = String::new();
    for col in &visible {
        head.push_str(&format!(
            r#"<th data-col="{col}" class="px-6 py-5 text-[11px] font-display text-slate-900 dark:text-slate-200 uppercase tracking-widest">{}</th>"#,
            escape_html(&report.columns[*col].label)
        ));
    }

    let mut body = String::new();
    for row in &report.rows {
        body.push_str(r#"<tr class="hover:bg-slate-50 dark:hover:bg-slate-800/30 transition-colors">"#);
        for col in &visible {
            body.push_str(&format!(
                r#"<td data-col="{col}" class="px-6 py-5 text-sm font-medium text-slate-700 dark:text-slate-300">{}</td>"#,
                cell_html(report, row, *col)
            ));
        }
        body.push_str("</tr>\n");
    }

    format!(
        r#"<table class="w-full text-left border-collapse">
            <thead><tr class="bg-slate-50 dark:bg-slate-800/50 border-b border-slate-200 dark:border-slate-800">{head}</tr></thead>
            <tbody class="divide-y divide-slate-100 dark:divide-slate-800">
{body}            </tbody>
          </table>"#
    )
}

fn dashboard_html(report: &ListReport) -> String {
    let d = &report.dashboard;
    let labels = &report.dashboard_labels;
    let score = d
        .average_score
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    let tiles = [
        (labels.score.as_str(), score),
        (labels.https.as_str(), format!("{}%", d.https_percent)),
        (labels.cookies.as_str(), d.average_cookies.to_string()),
        (
            labels.third_parties.as_str(),
            d.average_third_parties.to_string(),
        ),
    ];
    tiles
        .iter()
        .map(|(label, value)| {
            format!(
                r#"<div class="bg-white dark:bg-slate-900 rounded-2xl border border-slate-200 dark:border-slate-800 p-5 shadow-sm">
            <p class="text-xs font-bold text-slate-500 dark:text-slate-400 uppercase tracking-widest">{}</p>
            <p class="text-3xl font-display text-slate-900 dark:text-white mt-2">{}</p>
          </div>"#,
                escape_html(label),
                escape_html(value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n          ")
}

pub fn render_html(report: &ListReport) -> Vec<u8> {
    let json = serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string());
    let json = json_for_script_tag(&json);

    let title = escape_html(&report.title);
    let lang = escape_html(&report.lang);
    let name = escape_html(&report.name);
    let description = escape_html(&report.description);
    let tags = report
        .tags
        .iter()
        .map(|t| {
            format!(
                r#"<span class="bg-slate-100 dark:bg-slate-800 text-slate-700 dark:text-slate-300 px-3 py-1 rounded-lg text-xs font-bold border border-slate-200 dark:border-slate-700">{}</span>"#,
                escape_html(t)
            )
        })
        .collect::<Vec<_>>()
        .join(" ");
    let compared = report
        .compared_dates
        .as_deref()
        .map(|d| {
            format!(
                r#"<p class="text-sm font-bold text-primary mb-4">{}</p>"#,
                escape_html(d)
            )
        })
        .unwrap_or_default();
    let footer = if report.rows.len() < report.total_rows {
        format!(
            "{} / {} &middot; {}",
            report.rows.len(),
            report.total_rows,
            escape_html(&report.expand_label)
        )
    } else {
        report.total_rows.to_string()
    };
    let dashboard = dashboard_html(report);
    let table = table_html(report);

    let html = format!(
        r####"<!DOCTYPE html>
<html lang="{lang}">
<head>
  <meta charset="utf-8"/>
  <meta content="width=device-width, initial-scale=1.0" name="viewport"/>
  <title>{title}</title>
  <script src="https://cdn.tailwindcss.com?plugins=forms,container-queries"></script>
  <link href="https://fonts.googleapis.com/css2?family=Material+Symbols+Outlined:wght,FILL@100..700,0..1&amp;display=swap" rel="stylesheet"/>
  <link href="https://fonts.googleapis.com/css2?family=Montserrat:wght@700;800&amp;family=Inter:wght@400;500;600;700&amp;display=swap" rel="stylesheet"/>
  <script id="tailwind-config">
    tailwind.config = {{
      darkMode: "class",
      theme: {{
        extend: {{
          colors: {{
            "primary": "#135bec",
            "background-light": "#f8fafc",
            "background-dark": "#0f172a"
          }},
          fontFamily: {{
            "sans": ["Inter", "sans-serif"],
            "display": ["Montserrat", "sans-serif"]
          }}
        }}
      }}
    }};
  </script>
  <style type="text/tailwindcss">
    body {{
      font-family: 'Inter', sans-serif;
    }}
    h1, h2, h3 {{
      font-family: 'Montserrat', sans-serif;
      font-weight: 800;
      letter-spacing: -0.025em;
    }}
  </style>
</head>
<body class="bg-background-light dark:bg-background-dark text-slate-900 dark:text-slate-100 min-h-screen">
  <script type="application/json" id="report-data">{json}</script>
  <div class="flex h-full grow flex-col">
    <header class="flex items-center justify-between border-b border-slate-200 dark:border-slate-800 bg-white dark:bg-slate-900 px-8 py-4 sticky top-0 z-50">
      <div class="flex items-center gap-4">
        <div class="size-10 bg-primary rounded-xl flex items-center justify-center text-white shadow-lg shadow-primary/20">
          <span class="material-symbols-outlined text-[24px]">shield</span>
        </div>
        <h2 class="text-slate-900 dark:text-white text-xl font-display uppercase tracking-tight">{name}</h2>
      </div>
      <button id="theme-toggle" class="flex size-10 items-center justify-center rounded-xl bg-slate-100 dark:bg-slate-800 text-slate-600 dark:text-white" type="button">
        <span id="theme-icon" class="material-symbols-outlined">light_mode</span>
      </button>
    </header>

    <main class="flex-1 max-w-[1440px] mx-auto w-full px-8 py-10">
      <h1 class="text-slate-900 dark:text-white text-4xl mb-2">{title}</h1>
      <p class="text-slate-500 dark:text-slate-400 text-base font-medium mb-4">{description}</p>
      <div class="flex flex-wrap gap-2 mb-8">{tags}</div>

      <div class="grid grid-cols-1 md:grid-cols-4 gap-5 mb-8">
          {dashboard}
      </div>

      {compared}
      <div id="column-toggles" class="flex flex-wrap gap-3 mb-4"></div>

      <div class="bg-white dark:bg-slate-900 border border-slate-200 dark:border-slate-800 rounded-2xl overflow-hidden shadow-sm">
        <div class="overflow-x-auto">
          {table}
        </div>
        <div class="px-8 py-5 border-t border-slate-100 dark:border-slate-800 bg-slate-50 dark:bg-slate-800/50">
          <p class="text-sm text-slate-500 dark:text-slate-400 font-bold">{footer}</p>
        </div>
      </div>
    </main>
  </div>

  <script>
    (function() {{
      const report = JSON.parse(document.getElementById('report-data').textContent || '{{}}');
      const htmlEl = document.documentElement;
      const themeIcon = document.getElementById('theme-icon');
      function setTheme(mode) {{
        htmlEl.classList.toggle('dark', mode === 'dark');
        themeIcon.textContent = mode === 'dark' ? 'dark_mode' : 'light_mode';
        localStorage.setItem('sv-theme', mode);
      }}
      setTheme(localStorage.getItem('sv-theme') === 'dark' ? 'dark' : 'light');
      document.getElementById('theme-toggle').addEventListener('click', function() {{
        setTheme(htmlEl.classList.contains('dark') ? 'light' : 'dark');
      }});

      const host = document.getElementById('column-toggles');
      (report.columns || []).forEach(function(column, index) {{
        if (index === 0 || !column.visible) return;
        const label = document.createElement('label');
        label.className = 'flex items-center gap-2 text-xs font-bold text-slate-600 dark:text-slate-300';
        const box = document.createElement('input');
        box.type = 'checkbox';
        box.checked = true;
        box.addEventListener('change', function() {{
          for (const el of document.querySelectorAll('[data-col="' + index + '"]')) {{
            el.classList.toggle('hidden', !box.checked);
          }}
        }});
        label.appendChild(box);
        label.appendChild(document.createTextNode(column.label));
        host.appendChild(label);
      }});
    }})();
  </script>
</body>
</html>"####,
    );

    html.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn flags_keep_a_hidden_literal() {
        let html = flag_html(false);
        assert!(html.contains(r#"aria-hidden="true""#));
        assert!(html.contains(r#"<span class="sr-only">false</span>"#));
    }

    #[test]
    fn script_payload_cannot_close_the_tag() {
        assert_eq!(json_for_script_tag("\"</script>\""), "\"<\\/script>\"");
    }
}
