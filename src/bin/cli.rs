use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use polars::prelude::{AnyValue, DataFrame};
use site_distributor::{
    ApplyOutcome, CsvSiteSource, DistributorConfig, Schedule, ScheduleBuilder, ScheduleRow,
    SiteId, SiteSource, SqliteStore, calendar::parse_date, distribute, load_schedule_from_json,
    plan, save_schedule_to_csv, save_schedule_to_json, save_summary_to_json,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(
    name = "site-distributor",
    about = "Spread the active site pool evenly over a window of publication days",
    version
)]
struct Cli {
    /// Configuration file (default: ./distributor.toml, if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Override the SQLite database path from the configuration
    #[arg(long, global = true, env = "DISTRIBUTOR_DB")]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct WindowArgs {
    /// First day of the window (YYYY-MM-DD); defaults to the configured start policy
    #[arg(long)]
    start: Option<String>,
    /// Number of days in the window
    #[arg(long)]
    days: Option<usize>,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Full schedule document
    #[arg(long)]
    output: Option<PathBuf>,
    /// Summary document
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Per-site CSV export
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Distribute the database's active sites and store one row per day
    Run {
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Build and report the schedule without writing rows
        #[arg(long)]
        dry_run: bool,
    },
    /// Build a schedule from a CSV site list without touching the database
    Plan {
        /// CSV file with a site_id column
        #[arg(long)]
        sites: PathBuf,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Load sites from a CSV file into the database
    ImportSites {
        path: PathBuf,
    },
    /// List every stored schedule row
    Rows,
    /// Show the stored row for one date
    Row {
        /// YYYY-MM-DD
        apply_on: String,
    },
    /// Record that a day's sites were applied downstream
    MarkAdded {
        /// YYYY-MM-DD
        apply_on: String,
        /// Site ids that failed to apply (comma separated)
        #[arg(long, value_delimiter = ',')]
        failed: Vec<SiteId>,
        /// Number of sites applied successfully
        #[arg(long, default_value_t = 0)]
        succeeded: usize,
    },
    /// Print the summary table of a saved schedule document
    Show {
        path: PathBuf,
    },
}

fn render_df_as_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let col_names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();

    let cell = |value: AnyValue| -> String {
        match value {
            AnyValue::Null => String::new(),
            AnyValue::Int64(v) => v.to_string(),
            AnyValue::String(s) => s.to_string(),
            other => other.to_string(),
        }
    };

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let row = columns
            .iter()
            .map(|col| col.get(row_idx).map(cell).unwrap_or_default())
            .collect();
        rows.push(row);
    }

    let mut widths: Vec<usize> = col_names.iter().map(|n| n.len()).collect();
    for row in &rows {
        for (ci, value) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(value.len());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let render_line = |values: &[String]| -> String {
        let mut line = String::from("|");
        for (ci, value) in values.iter().enumerate() {
            line.push(' ');
            line.push_str(value);
            line.push_str(&" ".repeat(widths[ci].saturating_sub(value.len())));
            line.push_str(" |");
        }
        line
    };

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_line(&col_names));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in &rows {
        out.push_str(&render_line(row));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn print_summary(schedule: &Schedule) -> CliResult<()> {
    println!("Total Sites: {}", schedule.total_sites());
    println!("Days: {}", schedule.days());
    print!("{}", render_df_as_text_table(&schedule.summary_frame()?));
    Ok(())
}

fn print_row(row: &ScheduleRow) -> CliResult<()> {
    println!(
        "{}  added={}  sites={}  log={}",
        row.apply_on,
        row.is_added,
        row.list_sites_json()?,
        row.log.as_deref().unwrap_or("-")
    );
    Ok(())
}

fn builder_for(config: &DistributorConfig, window: &WindowArgs) -> CliResult<ScheduleBuilder> {
    let start = match window.start.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => config.start_date_now()?,
    };
    let days = window.days.unwrap_or(config.days);
    Ok(ScheduleBuilder::new(start).with_days(days))
}

fn write_outputs(
    config: &DistributorConfig,
    output: &OutputArgs,
    schedule: &Schedule,
) -> CliResult<()> {
    let schedule_path = output
        .output
        .as_deref()
        .unwrap_or(config.output.schedule_path.as_path());
    let summary_path = output
        .summary
        .as_deref()
        .unwrap_or(config.output.summary_path.as_path());
    save_schedule_to_json(schedule, schedule_path)?;
    save_summary_to_json(&schedule.summary(), summary_path)?;
    println!("Schedule written to {}", schedule_path.display());
    println!("Summary written to {}", summary_path.display());
    if let Some(csv_path) = output.csv.as_deref().or(config.output.csv_path.as_deref()) {
        save_schedule_to_csv(schedule, csv_path)?;
        println!("CSV written to {}", csv_path.display());
    }
    Ok(())
}

fn open_store(config: &DistributorConfig, db: Option<&Path>) -> CliResult<SqliteStore> {
    let path = db.unwrap_or(config.database.path.as_path());
    tracing::debug!(path = %path.display(), "opening database");
    Ok(SqliteStore::new(path)?)
}

fn parse_apply_on(raw: &str) -> CliResult<NaiveDate> {
    Ok(parse_date(raw)?)
}

fn execute(cli: Cli) -> CliResult<()> {
    let config = DistributorConfig::load(cli.config.as_deref())?;
    let db = cli.db.as_deref();

    match cli.command {
        Commands::Run {
            window,
            output,
            dry_run,
        } => {
            let builder = builder_for(&config, &window)?;
            let store = open_store(&config, db)?;
            let schedule = if dry_run {
                plan(&store, &builder)?
            } else {
                let outcome = distribute(&store, &store, &builder)?;
                println!("Stored {} schedule rows.", outcome.rows_written);
                outcome.schedule
            };
            print_summary(&schedule)?;
            write_outputs(&config, &output, &schedule)?;
        }
        Commands::Plan {
            sites,
            window,
            output,
        } => {
            let builder = builder_for(&config, &window)?;
            let schedule = plan(&CsvSiteSource::new(sites), &builder)?;
            print_summary(&schedule)?;
            write_outputs(&config, &output, &schedule)?;
        }
        Commands::ImportSites { path } => {
            let sites = CsvSiteSource::new(path).fetch_sites()?;
            let store = open_store(&config, db)?;
            let written = store.insert_sites(&sites)?;
            println!("Imported {written} sites.");
        }
        Commands::Rows => {
            let store = open_store(&config, db)?;
            let rows = store.list_rows()?;
            if rows.is_empty() {
                println!("No schedule rows stored.");
            }
            for row in &rows {
                print_row(row)?;
            }
        }
        Commands::Row { apply_on } => {
            let date = parse_apply_on(&apply_on)?;
            let store = open_store(&config, db)?;
            match store.find_by_apply_on(date)? {
                Some(row) => print_row(&row)?,
                None => println!("No schedule row for {date}."),
            }
        }
        Commands::MarkAdded {
            apply_on,
            failed,
            succeeded,
        } => {
            let date = parse_apply_on(&apply_on)?;
            let store = open_store(&config, db)?;
            let row = store.record_applied(date, &ApplyOutcome { succeeded, failed })?;
            print_row(&row)?;
        }
        Commands::Show { path } => {
            let schedule = load_schedule_from_json(&path)?;
            print_summary(&schedule)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("site_distributor=info")),
        )
        .init();

    match execute(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
