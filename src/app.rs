use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use time::UtcOffset;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::api::{ApiClient, ApiConfig, ApiError, DEFAULT_API_URL};
use crate::browse;
use crate::cli::args::{CliArgs, Command};
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::datefmt::{self, DateFormatter};
use crate::draft::ListDraft;
use crate::locale::{LocaleBundle, LocaleError, DEFAULT_LANG};
use crate::model::{ObjectId, ScanGroup, ScannedList};
use crate::output::scan::{render_scan_text, ScanReport};
use crate::output::{self, ListReport, OutputFormat};
use crate::page::{diagram_available, PageKind, PageQuery, PageState, ViewError};
use crate::poll::{
    poll_until_finished, CancelToken, Interrupt, PollOutcome, PollState, PollStatus,
    POLL_INTERVAL,
};
use crate::stats::{self, Metric, Series, SeriesWindow, StatisticsQuery, TimeSeries, TotalEntry};
use crate::table::parse_page_size_choice;
use crate::utils::{format_kv_line, parse_index_range};

fn render_custom_help() -> String {
    let cmd = CliArgs::command();
    let mut out = String::new();

    out.push_str(cmd.get_name());
    if let Some(version) = cmd.get_version() {
        out.push(' ');
        out.push_str(version);
    }
    out.push('\n');

    if let Some(about) = cmd.get_about() {
        out.push_str(&about.to_string());
        out.push('\n');
    }

    if let Some(long_about) = cmd.get_long_about() {
        out.push('\n');
        out.push_str(&long_about.to_string());
        out.push('\n');
    }

    out.push('\n');
    out.push_str("Usage: ");
    out.push_str(cmd.get_name());
    out.push_str(" [OPTIONS] <COMMAND>\n\n");

    out.push_str("Commands:\n");
    for sub in cmd.get_subcommands() {
        let about = sub.get_about().map(|a| a.to_string()).unwrap_or_default();
        out.push_str(&format!("  {:<8}  {}\n", sub.get_name(), about.trim()));
    }
    out.push('\n');

    let mut sections: Vec<(String, Vec<&clap::Arg>)> = Vec::new();
    let mut section_idx: HashMap<String, usize> = HashMap::new();

    for arg in cmd.get_arguments() {
        if arg.is_hide_set() || arg.is_positional() {
            continue;
        }

        let heading = arg.get_help_heading().unwrap_or("Options").to_string();

        let idx = match section_idx.get(&heading).copied() {
            Some(i) => i,
            None => {
                sections.push((heading.clone(), Vec::new()));
                let i = sections.len() - 1;
                section_idx.insert(heading, i);
                i
            }
        };

        sections[idx].1.push(arg);
    }

    for (heading, args) in sections {
        out.push_str(&heading);
        out.push_str(":\n");

        for arg in args {
            let mut parts: Vec<String> = Vec::new();

            if let Some(short) = arg.get_short() {
                parts.push(format!("-{short}"));
            }

            if let Some(long) = arg.get_long() {
                parts.push(format!("--{long}"));
            }

            if let Some(aliases) = arg.get_visible_aliases() {
                for alias in aliases {
                    let rendered = format!("--{alias}");
                    if !parts.iter().any(|p| p == &rendered) {
                        parts.push(rendered);
                    }
                }
            }

            let mut flags = parts.join(", ");

            if arg.get_action().takes_values() {
                let value_name = arg
                    .get_value_names()
                    .and_then(|names| names.first())
                    .map(|name| name.as_str())
                    .unwrap_or("VALUE");
                flags.push_str(&format!(" <{value_name}>"));
            }

            out.push_str("  ");
            out.push_str(&flags);
            out.push('\n');

            if let Some(help) = arg.get_help() {
                let help = help.to_string();
                if !help.trim().is_empty() {
                    out.push_str("          ");
                    out.push_str(help.trim());
                    out.push('\n');
                }
            }

            out.push('\n');
        }
    }

    out.push_str(&format!(
        "Run '{} <COMMAND> --help' for the options of a command.\n",
        cmd.get_name()
    ));
    out
}

#[derive(Clone, Debug)]
struct RunConfig {
    command: Command,
    verbose: u8,
    api_url: String,
    timeout: usize,
    proxy: Option<String>,
    lang: String,
    locale_dir: Option<PathBuf>,
    no_color: bool,
    /// `None` keeps the table default, `Some(None)` shows every row.
    page_size: Option<Option<usize>>,
    offset: UtcOffset,
    output: Option<String>,
    output_format: OutputFormat,
    poll_interval: Duration,
}

impl RunConfig {
    fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.api_url.clone(),
            timeout_seconds: self.timeout as u64,
            proxy: self.proxy.clone(),
            verbose: self.verbose,
        }
    }
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let api_url = args
        .api_url
        .or(cfg.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    reqwest::Url::parse(&api_url).map_err(|e| format!("invalid api url '{api_url}': {e}"))?;

    let lang = args
        .lang
        .or(cfg.lang)
        .unwrap_or_else(|| DEFAULT_LANG.to_string());
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10).max(1);
    let proxy = args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty());
    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let locale_dir = cfg.locale_dir.map(|p| config::expand_tilde(&p));

    let page_size = match cfg.page_size.as_deref() {
        Some(raw) => Some(
            parse_page_size_choice(raw).map_err(|e| format!("invalid page_size in config: {e}"))?,
        ),
        None => None,
    };

    let offset = match cfg.utc_offset_minutes {
        Some(minutes) => UtcOffset::from_whole_seconds(minutes.saturating_mul(60))
            .map_err(|e| format!("invalid utc_offset_minutes '{minutes}': {e}"))?,
        None => datefmt::local_offset(),
    };

    let output = args
        .output
        .or(cfg.output)
        .map(|p| config::expand_tilde(&p).to_string_lossy().to_string());
    let output_format = match args.output_format.or(cfg.output_format) {
        Some(raw) => OutputFormat::parse(&raw).ok_or_else(|| {
            format!("invalid output format '{raw}', expected text, json or html")
        })?,
        None => output
            .as_deref()
            .and_then(output::infer_format_from_path)
            .unwrap_or(OutputFormat::Text),
    };

    let poll_interval = cfg
        .poll_interval_ms
        .map(Duration::from_millis)
        .unwrap_or(POLL_INTERVAL);
    if poll_interval.is_zero() {
        return Err("invalid poll_interval_ms, expected positive integer".to_string());
    }

    Ok(RunConfig {
        command: args.command,
        verbose: args.verbose,
        api_url,
        timeout,
        proxy,
        lang,
        locale_dir,
        no_color,
        page_size,
        offset,
        output,
        output_format,
        poll_interval,
    })
}

fn print_run_summary(run: &RunConfig) {
    eprintln!("{}", format_kv_line("API", &run.api_url));
    eprintln!("{}", format_kv_line("Language", &run.lang));
    eprintln!("{}", format_kv_line("Timeout", &format!("{}s", run.timeout)));
    if let Some(proxy) = run.proxy.as_deref() {
        eprintln!("{}", format_kv_line("Proxy", proxy));
    }
    if let Some(path) = run.output.as_deref() {
        eprintln!("{}", format_kv_line("Output", path));
    }
    eprintln!();
}

/// Bundles from disk or the binary first; unknown languages are fetched from
/// the frontend the API belongs to.
async fn load_locale(client: &ApiClient, run: &RunConfig, lang: &str) -> Result<LocaleBundle, String> {
    match LocaleBundle::load(lang, run.locale_dir.as_deref()) {
        Ok(bundle) => Ok(bundle),
        Err(LocaleError::Unknown { .. }) => client
            .load_locale(lang)
            .await
            .map_err(|e| format!("failed to load language '{lang}': {e}")),
        Err(e) => Err(e.to_string()),
    }
}

async fn emit(run: &RunConfig, rendered: &[u8]) -> Result<(), String> {
    match run.output.as_deref() {
        Some(path) => {
            let mut outfile = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .await
                .map_err(|e| format!("failed to open output file '{path}': {e}"))?;
            outfile
                .write_all(rendered)
                .await
                .map_err(|e| format!("failed to write output file '{path}': {e}"))?;
            if run.verbose > 0 {
                eprintln!("{}", format_kv_line("Saved", path));
            }
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(rendered)
                .await
                .map_err(|e| format!("failed to write output: {e}"))?;
            stdout
                .flush()
                .await
                .map_err(|e| format!("failed to write output: {e}"))?;
        }
    }
    Ok(())
}

fn html_unsupported(what: &str) -> String {
    format!("html output is only available for list reports, not for {what}")
}

fn spinner() -> Result<ProgressBar, String> {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(":: Scanning :: {spinner} :: Duration: [{elapsed_precise}] :: {msg}")
            .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );
    Ok(pb)
}

/// Groups after waiting, and whether the newest one ended in an error state.
struct Watched {
    groups: Vec<ScanGroup>,
    failed: bool,
}

const STOPPED_WAITING: &str = "stopped waiting for the scan";

/// Polls a list's scan groups with a spinner until the newest one is done.
async fn watch_groups(
    client: &ApiClient,
    list: &ObjectId,
    state: &PageState,
    interval: Duration,
    cancel: CancelToken,
) -> Result<Watched, String> {
    let pb = spinner()?;
    let outcome = poll_until_finished(
        move || client.scan_groups_by_list(list),
        interval,
        cancel,
        |groups: &Vec<ScanGroup>| {
            if let Some(group) = groups.last() {
                pb.set_message(state.progress_message(group).replace('\n', " :: "));
            }
        },
    )
    .await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e.to_string());
        }
    };
    match outcome {
        PollOutcome::Finished(groups) => {
            pb.finish_and_clear();
            Ok(Watched {
                groups,
                failed: false,
            })
        }
        PollOutcome::Failed(groups) => {
            if let Some(group) = groups.last() {
                pb.println(format_kv_line("Failed", group.state.as_str()).red().to_string());
            }
            pb.finish_and_clear();
            Ok(Watched {
                groups,
                failed: true,
            })
        }
        PollOutcome::Cancelled => {
            pb.finish_and_clear();
            Err(STOPPED_WAITING.to_string())
        }
    }
}

/// Re-polls a scanned list until its newest results are in. `None` when the
/// wait was cancelled.
async fn poll_list<F, Fut>(
    fetch: F,
    interval: Duration,
    cancel: CancelToken,
) -> Result<Option<ScannedList>, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ScannedList, ApiError>>,
{
    match poll_until_finished(fetch, interval, cancel, |_| {}).await? {
        PollOutcome::Finished(list) | PollOutcome::Failed(list) => Ok(Some(list)),
        PollOutcome::Cancelled => Ok(None),
    }
}

/// Groups of a list, or none when the backend has nothing for it yet.
async fn list_groups(client: &ApiClient, list: &ObjectId) -> Result<Vec<ScanGroup>, ApiError> {
    match client.scan_groups_by_list(list).await {
        Err(ApiError::Empty { .. }) => Ok(Vec::new()),
        other => other,
    }
}

struct ListView {
    compare: Option<ObjectId>,
    watch: bool,
    page_size: Option<Option<usize>>,
    diagram: Option<ObjectId>,
}

async fn view_scanned_list(
    client: &ApiClient,
    run: &RunConfig,
    query: PageQuery,
    view: ListView,
) -> Result<(), String> {
    if query.demo {
        return Err("demo pages are not backed by the scan API".to_string());
    }
    let locale = load_locale(client, run, &query.lang).await?;
    let alerts = locale.scanned_list.alerts.clone();
    let list_id = query.list.clone().ok_or_else(|| alerts.no_list.clone())?;
    let group = query.group.clone();
    let mut state = PageState::new(query, locale, run.offset).map_err(|e| e.to_string())?;
    let not_found = |e: ApiError| ViewError::from_api(e, &alerts, Some(&list_id)).to_string();

    let interrupt = Interrupt::on_ctrl_c();
    let ticket = state.begin_request();
    let mut groups = list_groups(client, &list_id).await.map_err(not_found)?;
    let mut repoll = view.watch;
    if groups.poll_state() == PollState::Pending {
        if view.watch && group.is_none() {
            let watched = watch_groups(
                client,
                &list_id,
                &state,
                run.poll_interval,
                interrupt.token(),
            )
            .await?;
            repoll = !watched.failed;
            groups = watched.groups;
        } else if let Some(latest) = groups.last() {
            eprintln!("{}", state.progress_message(latest).yellow());
        }
    } else if groups.poll_state() == PollState::Failed {
        repoll = false;
    }

    let list = if repoll {
        let (list_ref, group_ref) = (&list_id, group.as_ref());
        poll_list(
            move || client.show_scanned_list(list_ref, group_ref),
            run.poll_interval,
            interrupt.token(),
        )
        .await
        .map_err(not_found)?
        .ok_or_else(|| STOPPED_WAITING.to_string())?
    } else {
        client
            .show_scanned_list(&list_id, group.as_ref())
            .await
            .map_err(not_found)?
    };
    drop(interrupt);
    state.apply_primary(&ticket, list);

    let show_all = state.query().show_all;
    if let (Some(page_size), Some(table)) = (view.page_size.or(run.page_size), state.table_mut()) {
        if !show_all {
            table.set_page_size(page_size);
        }
    }

    if let Some(other) = view.compare.as_ref() {
        let ticket = state.begin_request();
        let other_list = client
            .show_scanned_list(&list_id, Some(other))
            .await
            .map_err(not_found)?;
        state
            .apply_comparison(&ticket, &other_list)
            .map_err(|e| e.to_string())?;
    }

    if run.verbose > 0 {
        eprintln!("{}", format_kv_line("Groups", &groups.len().to_string()));
    }
    if let Some(hint) = state.rescan_hint(&groups, datefmt::now_utc()) {
        eprintln!("{}", format_kv_line("Rescan", &hint).yellow());
    }

    if let Some(site) = view.diagram {
        if diagram_available(&groups) {
            state.open_diagram(site);
        } else {
            eprintln!("{}", format_kv_line("Diagram", "needs at least two scans").yellow());
        }
    }
    let unknown_site = state
        .diagram_site()
        .map(|site| state.primary().and_then(|l| l.find_site(site)).is_none())
        .unwrap_or(false);
    if unknown_site {
        eprintln!("{}", format_kv_line("Diagram", "site is not part of this list").yellow());
        state.close_diagram();
    }
    let diagram = match state.diagram_site() {
        Some(site) => Some(site_series(client, state.locale(), site, None, None).await?),
        None => None,
    };

    let report = ListReport::build(&state).ok_or_else(|| alerts.no_list_found.clone())?;
    let rendered = match (run.output_format, diagram) {
        (OutputFormat::Text, None) => output::render_list_text(&report).into_bytes(),
        (OutputFormat::Text, Some(series)) => {
            let mut text = output::render_list_text(&report);
            text.push('\n');
            text.push_str(&series_text(&series, state.formatter()));
            text.into_bytes()
        }
        (OutputFormat::Json, None) => output::render_json(&report),
        (OutputFormat::Json, Some(series)) => output::render_json(&serde_json::json!({
            "report": report,
            "diagram": series,
        })),
        (OutputFormat::Html, _) => output::render_html(&report),
    };
    emit(run, &rendered).await
}

async fn run_browse(
    client: &ApiClient,
    run: &RunConfig,
    lang: &str,
    query: Option<&str>,
) -> Result<(), String> {
    let locale = load_locale(client, run, lang).await?;
    let formatter = locale.formatter(run.offset).map_err(|e| e.to_string())?;
    let fetched = match query {
        Some(text) => client.search(text).await,
        None => client.show_lists().await,
    };
    let summaries = match fetched {
        Ok(summaries) => summaries,
        Err(ApiError::Empty { .. }) => Vec::new(),
        Err(e) => return Err(e.to_string()),
    };
    let entries = browse::entries(summaries, &formatter);
    let rendered = match run.output_format {
        OutputFormat::Text => {
            let heading = query.map(|q| browse::search_heading(&locale.browse, q));
            output::render_browse_text(&entries, &locale.browse, heading.as_deref()).into_bytes()
        }
        OutputFormat::Json => output::render_json(&entries),
        OutputFormat::Html => return Err(html_unsupported("browse")),
    };
    emit(run, &rendered).await
}

async fn run_groups(
    client: &ApiClient,
    run: &RunConfig,
    lang: &str,
    list: Option<ObjectId>,
    site: Option<ObjectId>,
) -> Result<(), String> {
    let locale = load_locale(client, run, lang).await?;
    let formatter = locale.formatter(run.offset).map_err(|e| e.to_string())?;
    let groups = match (list.as_ref(), site.as_ref()) {
        (Some(list), _) => list_groups(client, list).await,
        (None, Some(site)) => client.scan_groups_by_site(site).await,
        (None, None) => return Err("either --list or --site is required".to_string()),
    }
    .map_err(|e| ViewError::from_api(e, &locale.scanned_list.alerts, list.as_ref()).to_string())?;

    if site.is_some() && !diagram_available(&groups) && run.verbose > 0 {
        eprintln!("{}", format_kv_line("Diagram", "needs at least two scans"));
    }
    let rendered = match run.output_format {
        OutputFormat::Text => output::render_groups_text(&groups, &formatter).into_bytes(),
        OutputFormat::Json => output::render_json(&groups),
        OutputFormat::Html => return Err(html_unsupported("scan groups")),
    };
    emit(run, &rendered).await
}

async fn run_scan(
    client: &ApiClient,
    run: &RunConfig,
    lang: &str,
    site: &ObjectId,
    scan: &ObjectId,
) -> Result<(), String> {
    let locale = load_locale(client, run, lang).await?;
    let formatter = locale.formatter(run.offset).map_err(|e| e.to_string())?;
    let detail = client.show_scan(site, scan).await.map_err(|e| match e {
        ApiError::Empty { .. } => ViewError::NotFound {
            message: format!("no scan {scan} for site {site}"),
        }
        .to_string(),
        other => ViewError::from_api(other, &locale.scanned_list.alerts, None).to_string(),
    })?;
    let groups = match client.scan_groups_by_site(site).await {
        Ok(groups) => groups,
        Err(e) => {
            if run.verbose > 0 {
                eprintln!("{}", format_kv_line("Scans", &e.to_string()));
            }
            Vec::new()
        }
    };

    let report = ScanReport::build(&detail, &groups, &locale, &formatter, datefmt::now_utc());
    let rendered = match run.output_format {
        OutputFormat::Text => render_scan_text(&report, &locale).into_bytes(),
        OutputFormat::Json => output::render_json(&report),
        OutputFormat::Html => return Err(html_unsupported("scan results")),
    };
    emit(run, &rendered).await
}

async fn run_rescan(
    client: &ApiClient,
    run: &RunConfig,
    list: ObjectId,
    watch: bool,
) -> Result<(), String> {
    let locale = load_locale(client, run, &run.lang).await?;
    let alerts = locale.scanned_list.alerts.clone();
    let query = PageQuery {
        kind: PageKind::ScannedList,
        list: Some(list.clone()),
        lang: run.lang.clone(),
        ..PageQuery::default()
    };
    let state = PageState::new(query, locale, run.offset).map_err(|e| e.to_string())?;

    let groups = list_groups(client, &list)
        .await
        .map_err(|e| ViewError::from_api(e, &alerts, Some(&list)).to_string())?;
    if let Some(hint) = state.rescan_hint(&groups, datefmt::now_utc()) {
        return Err(hint);
    }

    if let Err(e) = client.scan_list(&list).await {
        if run.verbose > 0 {
            eprintln!("{}", format_kv_line("Error", &e.to_string()));
        }
        return Err(if alerts.scan_started_error.is_empty() {
            e.to_string()
        } else {
            alerts.scan_started_error
        });
    }
    let started = if alerts.scan_started.is_empty() {
        "The scan has been started."
    } else {
        alerts.scan_started.as_str()
    };
    eprintln!("{}", started.green());

    if watch {
        let interrupt = Interrupt::on_ctrl_c();
        let groups = watch_groups(client, &list, &state, run.poll_interval, interrupt.token())
            .await?
            .groups;
        drop(interrupt);
        let formatter = state.formatter();
        let rendered = match run.output_format {
            OutputFormat::Json => output::render_json(&groups),
            _ => output::render_groups_text(&groups, formatter).into_bytes(),
        };
        emit(run, &rendered).await?;
    }
    Ok(())
}

async fn site_series(
    client: &ApiClient,
    locale: &LocaleBundle,
    site: &ObjectId,
    metric: Option<Metric>,
    range: Option<&str>,
) -> Result<Vec<Series>, String> {
    let data: TimeSeries = client
        .statistics(&StatisticsQuery::site_history(site))
        .await
        .map_err(|e| e.to_string())?;
    let range = range
        .map(parse_index_range)
        .transpose()
        .map_err(|e| format!("invalid --range: {e}"))?
        .unwrap_or_default();
    let window = SeriesWindow::select(data.len(), range.start, range.end)
        .ok_or_else(|| format!("no scans recorded for site {site}"))?;

    let metrics: Vec<Metric> = match metric {
        Some(metric) => vec![metric],
        None => Metric::ALL.to_vec(),
    };
    Ok(metrics
        .into_iter()
        .map(|m| Series::build(&data, m, window, m.label(&locale.scanned_list.diagram)))
        .collect())
}

fn series_text(series: &[Series], formatter: &DateFormatter) -> String {
    series
        .iter()
        .map(|s| output::render_series_text(s, formatter))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn run_site_history(
    client: &ApiClient,
    run: &RunConfig,
    locale: &LocaleBundle,
    formatter: &DateFormatter,
    site: &ObjectId,
    metric: Option<Metric>,
    range: Option<&str>,
) -> Result<(), String> {
    let series = site_series(client, locale, site, metric, range).await?;
    let rendered = match run.output_format {
        OutputFormat::Text => series_text(&series, formatter).into_bytes(),
        OutputFormat::Json => output::render_json(&series),
        OutputFormat::Html => return Err(html_unsupported("statistics")),
    };
    emit(run, &rendered).await
}

async fn run_third_parties(
    client: &ApiClient,
    run: &RunConfig,
    locale: &LocaleBundle,
    list: Option<&ObjectId>,
) -> Result<(), String> {
    let totals: Vec<TotalEntry> = match client
        .statistics(&StatisticsQuery::third_parties(list))
        .await
    {
        Ok(totals) => totals,
        Err(ApiError::Empty { .. }) => Vec::new(),
        Err(e) => return Err(e.to_string()),
    };
    let totals = stats::sort_totals(totals);
    let rendered = match run.output_format {
        OutputFormat::Text => {
            output::render_totals_text(&totals, &locale.third_parties.result_columns).into_bytes()
        }
        OutputFormat::Json => output::render_json(&totals),
        OutputFormat::Html => return Err(html_unsupported("statistics")),
    };
    emit(run, &rendered).await
}

async fn run_draft(client: &ApiClient, run: &RunConfig, file: &str) -> Result<(), String> {
    let path = config::expand_tilde(file);
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| format!("failed to read draft '{}': {e}", path.display()))?;
    let draft = ListDraft::from_yaml(&text)
        .map_err(|e| format!("failed to parse draft '{}': {e}", path.display()))?
        .without_blank_rows();
    let locale = load_locale(client, run, &run.lang).await?;
    let issues: Vec<String> = draft
        .validate()
        .iter()
        .map(|issue| issue.message(&locale.list.alerts))
        .collect();

    let rendered = match run.output_format {
        OutputFormat::Json => output::render_json(&serde_json::json!({
            "name": draft.name,
            "sites": draft.sites.len(),
            "valid": issues.is_empty(),
            "issues": issues,
        })),
        OutputFormat::Text => {
            let mut out = format_kv_line("Draft", &draft.name);
            out.push('\n');
            out.push_str(&format_kv_line("Sites", &draft.sites.len().to_string()));
            out.push('\n');
            if issues.is_empty() {
                out.push_str(&format_kv_line("Status", &"ok".green().to_string()));
                out.push('\n');
            }
            out.into_bytes()
        }
        OutputFormat::Html => return Err(html_unsupported("list drafts")),
    };
    emit(run, &rendered).await?;

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ViewError::Validation { issues }.to_string())
    }
}

async fn run_page(client: &ApiClient, run: &RunConfig, url: &str) -> Result<(), String> {
    let query = PageQuery::from_url(url).map_err(|e| e.to_string())?;
    if run.verbose > 0 {
        eprintln!("{}", format_kv_line("Page", &format!("{:?}", query.kind)));
    }
    match query.kind {
        PageKind::Browse => run_browse(client, run, &query.lang, query.query.as_deref()).await,
        PageKind::ScannedList => {
            let view = ListView {
                compare: None,
                watch: false,
                page_size: None,
                diagram: query.site.clone(),
            };
            view_scanned_list(client, run, query, view).await
        }
        PageKind::Scan => {
            let (Some(site), Some(scan)) = (query.site.as_ref(), query.scan.as_ref()) else {
                return Err(format!("{url} does not name a site and a scan"));
            };
            run_scan(client, run, &query.lang, site, scan).await
        }
        PageKind::ThirdParties => {
            let locale = load_locale(client, run, &query.lang).await?;
            run_third_parties(client, run, &locale, query.list.as_ref()).await
        }
        PageKind::ListEditor => Err(
            "list editor pages cannot be opened here, validate a draft with `scanview draft FILE`"
                .to_string(),
        ),
        PageKind::Unknown => Err(format!("{url} is not a known frontend page")),
    }
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color || run.output.is_some() {
        colored::control::set_override(false);
    }
    if run.verbose > 0 {
        print_run_summary(&run);
    }

    let client = ApiClient::new(&run.api_config()).map_err(|e| e.to_string())?;

    match run.command.clone() {
        Command::Browse { query } => run_browse(&client, &run, &run.lang, query.as_deref()).await,
        Command::List {
            list,
            group,
            show_all,
            page_size,
            compare,
            watch,
            diagram,
        } => {
            let page_size = page_size
                .as_deref()
                .map(parse_page_size_choice)
                .transpose()
                .map_err(|e| format!("invalid --page-size: {e}"))?;
            let query = PageQuery {
                kind: PageKind::ScannedList,
                list: Some(ObjectId::new(list)),
                group: group.map(ObjectId::new),
                lang: run.lang.clone(),
                show_all,
                ..PageQuery::default()
            };
            let view = ListView {
                compare: compare.map(ObjectId::new),
                watch,
                page_size,
                diagram: diagram.map(ObjectId::new),
            };
            view_scanned_list(&client, &run, query, view).await
        }
        Command::Groups { list, site } => {
            run_groups(
                &client,
                &run,
                &run.lang,
                list.map(ObjectId::new),
                site.map(ObjectId::new),
            )
            .await
        }
        Command::Scan { site, scan } => {
            run_scan(
                &client,
                &run,
                &run.lang,
                &ObjectId::new(site),
                &ObjectId::new(scan),
            )
            .await
        }
        Command::Rescan { list, watch } => run_rescan(&client, &run, ObjectId::new(list), watch).await,
        Command::Stats {
            site,
            metric,
            range,
            third_parties,
            list,
        } => {
            let locale = load_locale(&client, &run, &run.lang).await?;
            if third_parties {
                let list = list.map(ObjectId::new);
                return run_third_parties(&client, &run, &locale, list.as_ref()).await;
            }
            let site = site
                .map(ObjectId::new)
                .ok_or_else(|| "--site is required without --third-parties".to_string())?;
            let metric = metric.as_deref().map(str::parse::<Metric>).transpose()?;
            let formatter = locale.formatter(run.offset).map_err(|e| e.to_string())?;
            run_site_history(
                &client,
                &run,
                &locale,
                &formatter,
                &site,
                metric,
                range.as_deref(),
            )
            .await
        }
        Command::Page { url } => run_page(&client, &run, &url).await,
        Command::Draft { file } => run_draft(&client, &run, &file).await,
    }
}

fn load_run_config_file(path: Option<&str>) -> Result<ConfigFile, String> {
    if let Some(path) = path {
        return config::load_config(&config::expand_tilde(path), false);
    }
    match config::default_config_path() {
        Some(path) => {
            // An unwritable home directory is not an error, the defaults apply.
            let _ = config::ensure_default_config_file(&path);
            config::load_config(&path, true)
        }
        None => Ok(ConfigFile::default()),
    }
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                print!("{}", render_custom_help());
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            | ErrorKind::MissingSubcommand => {
                print!("{}", render_custom_help());
                return Err("a command is required".to_string());
            }
            _ => return Err(e.to_string()),
        },
    };

    let cfg = load_run_config_file(args.config.as_deref())?;
    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
