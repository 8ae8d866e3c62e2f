use anyhow::Context;
use broadcast_mail_triage::channels::{channel_stats, ChannelSort};
use broadcast_mail_triage::email::{EmailType, RawMessage};
use broadcast_mail_triage::filter::{DateRange, EmailFilter, TimeFilter};
use broadcast_mail_triage::search::{SearchField, SearchOptions};
use broadcast_mail_triage::statistics::{calculate_email_stats, out_of_hours_breakdown};
use broadcast_mail_triage::view::{ingest, MailboxView, SortField, SortOrder};
use broadcast_mail_triage::{Classifier, Config};
use chrono::{DateTime, FixedOffset};
use clap::{Arg, ArgMatches, Command};
use log::LevelFilter;
use serde::Deserialize;
use std::path::Path;
use std::process;

fn main() {
    let matches = Command::new("broadcast-mail-triage")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Classify, de-duplicate, filter and summarise broadcast supplier email")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (YAML, or TOML by extension)"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("JSON file of fetched messages (an array, or a page with a `value` array)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("supplier")
                .long("supplier")
                .value_name("NAME")
                .help("Only messages from this supplier")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("channel")
                .long("channel")
                .value_name("NAME")
                .help("Only messages for this channel")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("type")
                .long("type")
                .value_name("TYPE")
                .help("Only messages of this type (schedule, update, press, technical, marketing)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("attachments")
                .long("attachments")
                .value_name("BOOL")
                .help("Only messages with (true) or without (false) attachments")
                .value_parser(clap::value_parser!(bool))
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("since")
                .long("since")
                .value_name("WINDOW")
                .help("Relative window: last30min, last1hour, last3hours, last6hours, last12hours, last24hours")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("after")
                .long("after")
                .value_name("RFC3339")
                .help("Only messages received at or after this time")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("before")
                .long("before")
                .value_name("RFC3339")
                .help("Only messages received at or before this time")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("category")
                .long("category")
                .value_name("NAME")
                .help("Only messages in this category (repeatable, any one matches)")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("duplicates-only")
                .long("duplicates-only")
                .help("Only messages flagged as duplicates")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("query")
                .short('q')
                .long("query")
                .value_name("QUERY")
                .help("Search query; supports `or`, `not` and \"quoted phrases\"")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("fields")
                .long("fields")
                .value_name("LIST")
                .help("Comma-separated fields to search: subject, from, body")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("exact")
                .long("exact")
                .help("Match the query as one literal substring")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("sort")
                .long("sort")
                .value_name("FIELD")
                .help("Sort by receivedDateTime, subject, from, supplier or channel")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("desc")
                .long("desc")
                .help("Sort descending")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .help("Print statistics for the selected messages")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("channels")
                .long("channels")
                .value_name("SORT")
                .help("Print per-channel statistics, sorted by count, name or supplier")
                .num_args(0..=1)
                .default_missing_value("count"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches.get_one::<String>("config");
    let loaded = match config_path {
        Some(path) if Path::new(path).exists() => match Config::from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Error loading configuration: {e:#}");
                process::exit(1);
            }
        },
        _ => None,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level(matches.get_flag("verbose"), loaded.as_ref()))
        .init();

    if loaded.is_none() {
        if let Some(path) = config_path {
            log::warn!("Configuration file '{path}' not found, using default configuration");
        }
    }
    let config = loaded.unwrap_or_default();

    if matches.get_flag("test-config") {
        test_config(&config);
        return;
    }

    if let Err(e) = run(&matches, &config) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn log_level(verbose: bool, config: Option<&Config>) -> LevelFilter {
    if verbose {
        return LevelFilter::Debug;
    }
    config
        .and_then(|c| c.logging.as_ref())
        .and_then(|l| l.level.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the supplier and type tables to suit your mailbox.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e:#}");
            process::exit(1);
        }
    }
}

fn test_config(config: &Config) {
    println!("🔍 Testing configuration...");
    println!();
    println!("Suppliers: {}", config.suppliers.len());
    for supplier in &config.suppliers {
        println!(
            "  {} ({} domains, {} channels)",
            supplier.name,
            supplier.domains.len(),
            supplier.channels.len()
        );
    }
    println!("Type rules: {}", config.types.len());
    println!("Default type: {}", config.default_type);

    let problems = config.validate();
    if problems.is_empty() {
        println!("✅ Configuration is valid");
    } else {
        println!("❌ Configuration validation failed:");
        for problem in &problems {
            println!("  • {problem}");
        }
        process::exit(1);
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageBatch {
    List(Vec<RawMessage>),
    Page { value: Vec<RawMessage> },
}

fn load_messages(path: &str) -> anyhow::Result<Vec<RawMessage>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {path}"))?;
    let batch: MessageBatch = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse messages from: {path}"))?;
    Ok(match batch {
        MessageBatch::List(messages) => messages,
        MessageBatch::Page { value } => value,
    })
}

fn parse_timestamp(value: &str) -> anyhow::Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).with_context(|| format!("Invalid timestamp: {value}"))
}

fn build_view(matches: &ArgMatches) -> anyhow::Result<MailboxView> {
    let email_type = matches
        .get_one::<String>("type")
        .map(|t| t.parse::<EmailType>())
        .transpose()?;

    let after = matches
        .get_one::<String>("after")
        .map(|s| parse_timestamp(s))
        .transpose()?;
    let before = matches
        .get_one::<String>("before")
        .map(|s| parse_timestamp(s))
        .transpose()?;
    let date_range = (after.is_some() || before.is_some()).then_some(DateRange {
        start: after,
        end: before,
    });

    let filter = EmailFilter {
        supplier: matches.get_one::<String>("supplier").cloned(),
        channel: matches.get_one::<String>("channel").cloned(),
        email_type,
        has_attachments: matches.get_one::<bool>("attachments").copied(),
        date_range,
        categories: matches
            .get_many::<String>("category")
            .map(|values| values.cloned().collect()),
        time_filter: matches
            .get_one::<String>("since")
            .and_then(|s| s.parse::<TimeFilter>().ok()),
        show_duplicates_only: matches.get_flag("duplicates-only"),
    };

    let fields = match matches.get_one::<String>("fields") {
        Some(list) => list
            .split(',')
            .map(str::parse)
            .collect::<anyhow::Result<Vec<SearchField>>>()?,
        None => SearchOptions::default().fields,
    };
    let search = SearchOptions {
        query: matches.get_one::<String>("query").cloned().unwrap_or_default(),
        fields,
        exact: matches.get_flag("exact"),
    };

    let order = if matches.get_flag("desc") {
        SortOrder::Desc
    } else {
        SortOrder::Asc
    };
    let sort = matches
        .get_one::<String>("sort")
        .map(|f| f.parse::<SortField>().map(|field| (field, order)))
        .transpose()?;

    Ok(MailboxView {
        filter,
        search,
        sort,
    })
}

fn run(matches: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let input = matches
        .get_one::<String>("input")
        .context("No input given, use --input FILE")?;

    let raws = load_messages(input)?;
    let classifier = Classifier::new(config);
    let emails = ingest(&classifier, &raws);

    let view = build_view(matches)?;
    let selected = view.apply(&emails);
    log::info!("Selected {} of {} messages", selected.len(), emails.len());

    let output = if matches.get_flag("stats") {
        let report = serde_json::json!({
            "stats": calculate_email_stats(&selected, &config.statistics),
            "outOfHours": out_of_hours_breakdown(&selected, &config.statistics),
        });
        serde_json::to_string_pretty(&report)?
    } else if let Some(sort) = matches.get_one::<String>("channels") {
        let sort: ChannelSort = sort.parse()?;
        serde_json::to_string_pretty(&channel_stats(&selected, sort))?
    } else {
        serde_json::to_string_pretty(&selected)?
    };

    println!("{output}");
    Ok(())
}
