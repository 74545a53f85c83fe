//! CLI entry point for `mailqscan`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDateTime;
use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use mailqscan::config::Config;
use mailqscan::export::{self, OutputFormat};
use mailqscan::filter::{self, FilterOptions};
use mailqscan::model::merge::merge_records;
use mailqscan::model::record::RecordSet;
use mailqscan::parser::maillog::{MailLogParser, ScanProgress};
use mailqscan::parser::mailq::parse_queue_listing;
use mailqscan::source;

/// Parse the Postfix mail queue and print a filtered list of messages.
#[derive(Parser)]
#[command(name = "mailqscan", version, about)]
#[command(group(ArgGroup::new("format").args(["json", "yaml", "count"])))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON output (default)
    #[arg(short, long)]
    json: bool,

    /// YAML output
    #[arg(short, long)]
    yaml: bool,

    /// Print only the number of matching messages
    #[arg(short, long)]
    count: bool,

    /// Also search the mail log for client address, message-id and delivery status
    #[arg(long)]
    log: bool,

    /// Mail log to search with --log (default from config: /var/log/mail.log)
    #[arg(long, value_name = "FILE", requires = "log")]
    log_file: Option<PathBuf>,

    /// Read a saved queue listing instead of running the queue command ('-' for stdin)
    #[arg(long, value_name = "FILE")]
    queue_file: Option<PathBuf>,

    /// Select messages with a reason matching this regex
    #[arg(long, value_name = "REGEX")]
    reason: Option<String>,

    /// Select messages with a recipient matching this regex
    #[arg(long, value_name = "REGEX")]
    recipient: Option<String>,

    /// Select messages with a sender matching this regex
    #[arg(long, value_name = "REGEX")]
    sender: Option<String>,

    /// Select messages whose FIELD matches REGEX (repeatable).
    /// Fields: id, size, sender, recipient, reason, status, source_ip, message_id, delivery_status
    #[arg(long = "match", value_name = "FIELD=REGEX")]
    matches: Vec<String>,

    /// Select messages younger than the given age. Format: age[d|h|m|s], seconds by default. E.g. 3600, 1h
    #[arg(long, value_name = "AGE")]
    maxage: Option<String>,

    /// Select messages older than the given age. Format: age[d|h|m|s], seconds by default. E.g. 3600, 1h
    #[arg(long, value_name = "AGE")]
    minage: Option<String>,

    /// Exclude messages that are being delivered
    #[arg(long, conflicts_with = "only_active")]
    exclude_active: bool,

    /// Only include messages that are being delivered
    #[arg(long)]
    only_active: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

impl Cli {
    fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            reason: self.reason.clone(),
            sender: self.sender.clone(),
            recipient: self.recipient.clone(),
            matches: self.matches.clone(),
            min_age: self.minage.clone(),
            max_age: self.maxage.clone(),
            only_active: self.only_active,
            exclude_active: self.exclude_active,
        }
    }

    fn output_format(&self, config: &Config) -> OutputFormat {
        if self.count {
            OutputFormat::Count
        } else if self.yaml {
            OutputFormat::Yaml
        } else if self.json {
            OutputFormat::Json
        } else {
            config.output.default_format
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration; problems are reported once logging is up
    let (config, config_problem) = mailqscan::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);
    match config_problem {
        Some(e) => warn!(error = %e, "Using default configuration"),
        None => {
            if let Some(path) = mailqscan::config::config_file_path().filter(|p| p.exists()) {
                info!(path = %path.display(), "Loaded config");
            }
        }
    }

    match &cli.command {
        Some(Commands::Completions { shell }) => cmd_completions(*shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => cmd_scan(&cli, &config),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailqscan::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailqscan.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailqscan", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Parse the queue (and optionally the log), filter, and print.
fn cmd_scan(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    // Reject bad filters before touching any input.
    let directives = filter::build_directives(&cli.filter_options())?;
    let format = cli.output_format(config);
    let now = chrono::Local::now().naive_local();

    let listing = match &cli.queue_file {
        Some(path) => source::queue::read_queue_listing(path)?,
        None => source::queue::capture_queue_listing(
            &config.sources.queue_command,
            &config.sources.queue_args,
        )?,
    };
    let queue_records =
        parse_queue_listing(&listing, now).context("Could not parse the queue listing")?;

    let log_records = if cli.log {
        let path = cli
            .log_file
            .as_deref()
            .unwrap_or(config.sources.mail_log.as_path());
        Some(scan_mail_log(path, config, now)?)
    } else {
        None
    };

    let merged = merge_records(Some(&queue_records), log_records.as_ref());
    let filtered = filter::apply_filters(&merged, &directives, now);
    info!(
        total = merged.len(),
        selected = filtered.len(),
        "Filtered messages"
    );

    let rendered = export::render_records(filtered);
    println!("{}", export::render(&rendered, format)?);
    Ok(())
}

/// Stream the mail log with a progress bar on stderr.
fn scan_mail_log(path: &Path, config: &Config, now: NaiveDateTime) -> anyhow::Result<RecordSet> {
    let log = source::log::open_mail_log(path, config.performance.read_buffer_size)?;

    let pb = ProgressBar::new(log.size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} Scanning mail log [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            )
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let parser = MailLogParser::with_syslog_name(now, &config.sources.syslog_name)
        .progress_interval(config.performance.progress_interval);
    let scan = parser
        .parse(
            log.reader,
            Some(&|p: ScanProgress| {
                pb.set_position(p.bytes);
                pb.set_message(format!("{} lines ({} messages)", p.lines, p.records));
            }),
        )
        .with_context(|| format!("Could not read mail log {}", path.display()))?;

    pb.finish_and_clear();

    use humansize::{format_size, BINARY};
    info!(
        path = %path.display(),
        size = %format_size(scan.stats.bytes, BINARY),
        lines = scan.stats.lines,
        messages = scan.records.len(),
        "Scanned mail log"
    );
    if scan.stats.skipped > 0 {
        warn!(
            skipped = scan.stats.skipped,
            "Skipped malformed mail log lines"
        );
    }

    Ok(scan.records)
}
