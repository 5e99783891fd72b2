use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "scanview",
    version,
    about = "browse, compare and chart website privacy scans",
    long_about = "Scanview reads scan lists and results from a privacy-scan backend and renders them as tables, comparisons, diagrams and reports.\n\nExamples:\n  scanview browse --query news\n  scanview list --list 5a1f0c --show-all\n  scanview list --list 5a1f0c --compare 5a2b11 -o report.html\n  scanview scan --site 5a1f0d --scan 5a2b12\n  scanview page 'https://privacyscore.org/scannedList.html?lang=en&list=5a1f0c'\n\nTip: Use --config to persist the backend url and language."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        visible_alias = "vb",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase verbosity (-v requests, -vv response sizes)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'n',
        long = "no-color",
        visible_alias = "nc",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        global = true,
        help_heading = "Output",
        help = "Write the result to a file instead of stdout."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'A',
        long = "output-format",
        visible_alias = "of",
        value_name = "FORMAT",
        global = true,
        help_heading = "Output",
        help = "Output format: text, json or html (inferred from --output when omitted)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        visible_alias = "cfg",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.scanview/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "api-url",
        visible_alias = "api",
        value_name = "URL",
        global = true,
        help_heading = "Backend",
        help = "Base url of the scan API."
    )]
    pub api_url: Option<String>,

    #[arg(
        short = 'l',
        long = "lang",
        value_name = "LANG",
        global = true,
        help_heading = "Backend",
        help = "Display language (de or en)."
    )]
    pub lang: Option<String>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "Backend",
        help = "Request timeout in seconds."
    )]
    pub timeout: Option<usize>,

    #[arg(
        short = 'p',
        long = "proxy",
        value_name = "URL",
        global = true,
        help_heading = "Backend",
        help = "Proxy for every API request."
    )]
    pub proxy: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List every public scan list, newest scan first, or search them.
    Browse {
        #[arg(short = 'q', long = "query", value_name = "TEXT", help = "Search text.")]
        query: Option<String>,
    },

    /// Show the result table of a scan list.
    List {
        #[arg(long = "list", value_name = "ID", help = "List identifier.")]
        list: String,

        #[arg(
            short = 'g',
            long = "group",
            value_name = "ID",
            help = "Scan group to show (defaults to the latest)."
        )]
        group: Option<String>,

        #[arg(short = 'a', long = "show-all", help = "Show every row on one page.")]
        show_all: bool,

        #[arg(
            long = "page-size",
            value_name = "N|all",
            help = "Rows per page (5, 10, 25 or all)."
        )]
        page_size: Option<String>,

        #[arg(
            short = 'c',
            long = "compare",
            value_name = "GROUP",
            help = "Compare against another scan group of the same list."
        )]
        compare: Option<String>,

        #[arg(short = 'w', long = "watch", help = "Wait until the running scan finishes.")]
        watch: bool,

        #[arg(
            short = 'd',
            long = "diagram",
            value_name = "SITE",
            help = "Append the scan history of one site of the list."
        )]
        diagram: Option<String>,
    },

    /// List the scan groups of a list or a site.
    Groups {
        #[arg(
            long = "list",
            value_name = "ID",
            conflicts_with = "site",
            required_unless_present = "site",
            help = "List identifier."
        )]
        list: Option<String>,

        #[arg(long = "site", value_name = "ID", help = "Site identifier.")]
        site: Option<String>,
    },

    /// Show one scan of a site: cookies, third parties, geo-ip and header checks.
    Scan {
        #[arg(long = "site", value_name = "ID", help = "Site identifier.")]
        site: String,

        #[arg(long = "scan", value_name = "ID", help = "Scan identifier.")]
        scan: String,
    },

    /// Ask the backend to scan a list again.
    Rescan {
        #[arg(long = "list", value_name = "ID", help = "List identifier.")]
        list: String,

        #[arg(short = 'w', long = "watch", help = "Wait until the new scan finishes.")]
        watch: bool,
    },

    /// Chart the scan history of a site or the third parties of a list.
    Stats {
        #[arg(
            long = "site",
            value_name = "ID",
            required_unless_present = "third_parties",
            help = "Site whose history to chart."
        )]
        site: Option<String>,

        #[arg(
            short = 'm',
            long = "metric",
            value_name = "METRIC",
            help = "cookies, third, third-requests or https (defaults to all)."
        )]
        metric: Option<String>,

        #[arg(
            short = 'r',
            long = "range",
            value_name = "A-B",
            help = "Scan index range to chart (0-based, inclusive)."
        )]
        range: Option<String>,

        #[arg(
            long = "third-parties",
            visible_alias = "tp",
            conflicts_with = "site",
            help = "Summed third parties instead of a site history."
        )]
        third_parties: bool,

        #[arg(
            long = "list",
            value_name = "ID",
            requires = "third_parties",
            help = "Restrict third parties to one list."
        )]
        list: Option<String>,
    },

    /// Open a frontend url and show the page it points at.
    Page {
        #[arg(value_name = "URL", help = "A scannedList, browse, scan, thirdParties or list url.")]
        url: String,
    },

    /// Check a list draft before it is submitted.
    Draft {
        #[arg(value_name = "FILE", help = "YAML or JSON list draft.")]
        file: String,
    },
}
