use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use campaigndash::{
    analyst::{self, AnalystReply, GeminiAnalyst},
    config::DashboardConfig,
    dashboard::{render_text, Dashboard, DashboardOutcome},
    fetch::CachedLoader,
    filter::{self, FilterOptions, FilterSelection, MonthFilter},
    format,
    process::{date_parser::parse_day_first, CampaignRecord},
};
use chrono::NaiveDate;
use clap::Parser;
use reqwest::Client;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Campaign performance report from spreadsheet data")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, default_value = "campaigndash.yaml")]
    config: PathBuf,

    /// Year to report (default: most recent in the data)
    #[arg(short, long)]
    year: Option<i32>,

    /// Month number, Portuguese month name or "Todos"
    #[arg(short, long, value_parser = parse_month, default_value = "Todos")]
    month: MonthFilter,

    /// Period start, dd/mm/yyyy (needs --to)
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,

    /// Period end, dd/mm/yyyy (needs --from)
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,

    /// Restrict to these tiers (repeatable)
    #[arg(long)]
    tier: Vec<String>,

    /// Restrict to these channels (repeatable)
    #[arg(long)]
    channel: Vec<String>,

    /// Drop organic channels
    #[arg(long)]
    exclude_organic: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Question for the analyst about the channel table
    #[arg(long)]
    ask: Option<String>,
}

fn parse_month(s: &str) -> Result<MonthFilter, String> {
    let t = s.trim();
    if t.eq_ignore_ascii_case(format::ALL_MONTHS_LABEL) || t.eq_ignore_ascii_case("all") {
        return Ok(MonthFilter::All);
    }
    if let Ok(n) = t.parse::<u32>() {
        return match n {
            1..=12 => Ok(MonthFilter::Month(n)),
            _ => Err(format!("month out of range: {n}")),
        };
    }
    format::month_from_name(t)
        .map(MonthFilter::Month)
        .ok_or_else(|| format!("unknown month: {s}"))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    parse_day_first(s).ok_or_else(|| format!("invalid date: {s}"))
}

fn build_selection(records: &[CampaignRecord], args: &Args) -> Option<FilterSelection> {
    let year = match args.year {
        Some(y) => y,
        None => *filter::available_years(records).first()?,
    };
    let include_organic = !args.exclude_organic;
    let opts = FilterOptions::for_base(records, year, args.month, include_organic);

    let tiers = if args.tier.is_empty() {
        opts.tiers.into_iter().collect()
    } else {
        args.tier.iter().cloned().collect()
    };
    let channels = if args.channel.is_empty() {
        opts.channels.into_iter().collect()
    } else {
        args.channel.iter().cloned().collect()
    };

    let selection = FilterSelection {
        year,
        month: args.month,
        date_range: None,
        tiers,
        channels,
        include_organic,
    };
    Some(selection.with_date_bounds(args.from, args.to))
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.from.is_some() != args.to.is_some() {
        warn!("--from and --to only apply together; ignoring the period");
    }

    // ─── 2) config & source ──────────────────────────────────────────
    let config = DashboardConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("building HTTP client")?;
    let source = config
        .data_source(client.clone())
        .context("building data source")?;
    let loader = CachedLoader::new(source, config.cache_ttl());
    info!(source = %loader.source().describe(), "startup");

    // ─── 3) compute ──────────────────────────────────────────────────
    let dashboard = Dashboard::from_config(&config);
    let outcome = dashboard
        .run(&loader, |records: &[CampaignRecord]| build_selection(records, &args))
        .await;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("serializing report")?
        );
    } else {
        println!("{}", render_text(&outcome));
    }

    // ─── 4) analyst ──────────────────────────────────────────────────
    let Some(question) = args.ask.as_deref() else {
        return Ok(());
    };
    let DashboardOutcome::Report(report) = &outcome else {
        warn!("no report to ask about");
        return Ok(());
    };
    if !config.analyst.enabled {
        warn!("analyst disabled in config");
        return Ok(());
    }

    let base = config
        .analyst
        .base_url()
        .context("parsing analyst base URL")?;
    let reply = match GeminiAnalyst::from_env(
        client,
        base,
        &config.analyst.model,
        &config.analyst.api_key_env,
    ) {
        Ok(a) => analyst::ask_safely(&a, &report.channel_summary, question).await,
        Err(e) => AnalystReply::Unavailable(e.user_message()),
    };

    match reply {
        AnalystReply::Answer(text) | AnalystReply::Unavailable(text) => {
            println!("\nAnalista:\n{text}")
        }
        AnalystReply::NoQuestion => {}
    }
    Ok(())
}
