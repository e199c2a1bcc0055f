use anyhow::{anyhow, Context, Result};
use chrono::{Days, Local, NaiveDate};
use std::fs::File;
use std::io::{self, BufWriter, Read};
use std::path::PathBuf;
use tracing::{error, info, warn};

use face_harvester::auth::{ensure_valid_session, provider_from_config};
use face_harvester::config::Config;
use face_harvester::dataset;
use face_harvester::http::RetryPolicy;
use face_harvester::logging;
use face_harvester::photos::GooglePhotosClient;
use face_harvester::pipeline::{DailyDriver, RunOutcome, TriggerEvent};
use face_harvester::storage::GcsBucket;
use face_harvester::vision::VisionClient;

const DEFAULT_DATASET_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Day {
    DaysPast(u64),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Daily { day: Day, dry_run: bool },
    Event { payload: String },
    Reprocess { result_file: String, dry_run: bool },
    Backfill { from: NaiveDate, to: NaiveDate, dry_run: bool },
    Dataset {
        album: String,
        label: Option<String>,
        size: usize,
        output: Option<PathBuf>,
    },
}

#[derive(Debug)]
struct Args {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        std::process::exit(0);
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("face-harvester {}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    match parse_args_from(&args) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("Error: {}", message);
            print_help();
            std::process::exit(1);
        }
    }
}

fn parse_args_from(args: &[String]) -> std::result::Result<Args, String> {
    let mut config_path = None;
    let mut subcommand = None;
    let mut days_past = None;
    let mut date = None;
    let mut dry_run = false;
    let mut result_file = None;
    let mut from = None;
    let mut to = None;
    let mut album = None;
    let mut label = None;
    let mut size = DEFAULT_DATASET_SIZE;
    let mut output = None;
    let mut positional = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();

        match arg {
            "--config" | "-c" => config_path = Some(PathBuf::from(take_value(args, &mut i, arg)?)),
            "--dry-run" | "-n" => dry_run = true,
            "--days-past" => {
                let raw = take_value(args, &mut i, arg)?;
                days_past = Some(raw.parse::<u64>().map_err(|_| format!("invalid --days-past {:?}", raw))?);
            }
            "--date" => date = Some(parse_date(take_value(args, &mut i, arg)?)?),
            "--result" => result_file = Some(take_value(args, &mut i, arg)?.to_string()),
            "--from" => from = Some(parse_date(take_value(args, &mut i, arg)?)?),
            "--to" => to = Some(parse_date(take_value(args, &mut i, arg)?)?),
            "--album" => album = Some(take_value(args, &mut i, arg)?.to_string()),
            "--label" => label = Some(take_value(args, &mut i, arg)?.to_string()),
            "--size" => {
                let raw = take_value(args, &mut i, arg)?;
                size = raw.parse().map_err(|_| format!("invalid --size {:?}", raw))?;
            }
            "--output" | "-o" => output = Some(PathBuf::from(take_value(args, &mut i, arg)?)),
            flag if flag.starts_with("--") => return Err(format!("unknown argument: {}", flag)),
            _ if subcommand.is_none() => subcommand = Some(arg.to_string()),
            _ => positional.push(arg.to_string()),
        }
        i += 1;
    }

    if subcommand.as_deref() != Some("event") && !positional.is_empty() {
        return Err(format!("unexpected argument: {}", positional[0]));
    }

    let command = match subcommand.as_deref() {
        None | Some("daily") => {
            let day = match (days_past, date) {
                (Some(_), Some(_)) => return Err("--days-past and --date are exclusive".to_string()),
                (Some(n), None) => Day::DaysPast(n),
                (None, Some(date)) => Day::Date(date),
                (None, None) => Day::DaysPast(1),
            };
            Command::Daily { day, dry_run }
        }
        Some("event") => {
            let payload = positional
                .pop()
                .ok_or_else(|| "event requires a JSON payload or -".to_string())?;
            Command::Event { payload }
        }
        Some("reprocess") => Command::Reprocess {
            result_file: result_file.ok_or_else(|| "reprocess requires --result".to_string())?,
            dry_run,
        },
        Some("backfill") => {
            let from = from.ok_or_else(|| "backfill requires --from".to_string())?;
            let to = to.ok_or_else(|| "backfill requires --to".to_string())?;
            if to < from {
                return Err("--to must not be before --from".to_string());
            }
            Command::Backfill { from, to, dry_run }
        }
        Some("dataset") => Command::Dataset {
            album: album.ok_or_else(|| "dataset requires --album".to_string())?,
            label,
            size,
            output,
        },
        Some(other) => return Err(format!("unknown command: {}", other)),
    };

    Ok(Args { config_path, command })
}

fn take_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> std::result::Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", flag))
}

fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| format!("invalid date {:?}, expected YYYY-MM-DD", raw))
}

fn print_help() {
    println!(
        r#"face-harvester - crop detected faces out of a day's photos

USAGE:
    face-harvester [OPTIONS] [COMMAND]

COMMANDS:
    daily [--days-past N | --date YYYY-MM-DD] [--dry-run]
                        Process the photos of one day (default: yesterday)
    event <JSON | ->    Process a trigger message (bare JSON or Pub/Sub envelope)
    reprocess --result NAME [--dry-run]
                        Process an existing annotation result file again
    backfill --from YYYY-MM-DD --to YYYY-MM-DD [--dry-run]
                        Process every day from --from up to, excluding, --to
    dataset --album TITLE [--label L] [--size N] [--output PATH]
                        Write a JSON lines dataset of the face crops in an album

OPTIONS:
    --config, -c PATH   Path to config file
    --dry-run, -n       List and report only, upload nothing
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    FACE_HARVESTER_CONFIG   Path to config file (overrides default location)
    FACE_HARVESTER_TOKEN    OAuth access token (overrides config)
    FACE_HARVESTER_LOG      Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/face-harvester/config.toml"#
    );
}

struct Services {
    library: GooglePhotosClient,
    store: GcsBucket,
    annotator: VisionClient,
}

fn connect(config: &Config) -> Result<Services> {
    let provider = provider_from_config(&config.google).context("No access token source configured")?;
    let session = ensure_valid_session(provider.as_ref())
        .with_context(|| format!("Failed to obtain a session from {}", provider.provider_name()))?;
    let retry = RetryPolicy::from_config(&config.retry);

    Ok(Services {
        library: GooglePhotosClient::new(&config.google, session.clone(), retry)
            .with_upload_description(&config.faces.upload_description),
        store: GcsBucket::new(&config.google, &config.storage.bucket, session.clone(), retry),
        annotator: VisionClient::new(&config.google, &config.vision, session, retry),
    })
}

fn report(date: NaiveDate, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::NothingToDo => info!(%date, "No photos to process"),
        RunOutcome::DryRun { would_process } => {
            info!(%date, count = would_process.len(), "Dry run finished")
        }
        RunOutcome::Completed(summary) => info!(
            %date,
            uploaded = summary.uploaded.len(),
            images_with_faces = summary.images_with_faces,
            "Run completed"
        ),
    }
}

fn run_day(config: &Config, services: &Services, date: NaiveDate, dry_run: bool) -> Result<()> {
    let mut driver = DailyDriver::new(&services.library, &services.store, &services.annotator, &config.faces);
    let outcome = driver
        .run(date, dry_run)
        .with_context(|| format!("Processing {} failed", date))?;
    report(date, &outcome);
    Ok(())
}

fn execute(config: &Config, command: Command) -> Result<()> {
    let services = connect(config)?;

    match command {
        Command::Daily { day, dry_run } => {
            let date = match day {
                Day::Date(date) => date,
                Day::DaysPast(n) => Local::now()
                    .date_naive()
                    .checked_sub_days(Days::new(n))
                    .ok_or_else(|| anyhow!("--days-past {} is out of range", n))?,
            };
            run_day(config, &services, date, dry_run)
        }
        Command::Event { payload } => {
            let payload = if payload == "-" {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read trigger payload from stdin")?;
                buf
            } else {
                payload
            };
            let event = TriggerEvent::from_payload(&payload)?;
            info!(days_past = event.days_past, dry_run = event.dry_run, "Trigger received");
            run_day(config, &services, event.target_date(), event.dry_run)
        }
        Command::Reprocess { result_file, dry_run } => {
            let mut driver =
                DailyDriver::new(&services.library, &services.store, &services.annotator, &config.faces);
            let summary = driver
                .reprocess(&result_file, dry_run)
                .with_context(|| format!("Reprocessing {} failed", result_file))?;
            info!(
                result_file = %result_file,
                uploaded = summary.uploaded.len(),
                inspected = summary.inspected.len(),
                "Reprocessing completed"
            );
            Ok(())
        }
        Command::Backfill { from, to, dry_run } => {
            let mut driver =
                DailyDriver::new(&services.library, &services.store, &services.annotator, &config.faces);
            let outcomes = driver
                .backfill(from, to, dry_run)
                .with_context(|| format!("Backfill {}..{} failed", from, to))?;
            for (date, outcome) in &outcomes {
                report(*date, outcome);
            }
            Ok(())
        }
        Command::Dataset {
            album,
            label,
            size,
            output,
        } => {
            let label = label.unwrap_or_else(|| album.clone());
            let records = dataset::harvest(&services.library, &album, &label, size, &config.faces.file_prefix)?;
            let path = output.unwrap_or_else(|| PathBuf::from(dataset::default_output_name(&album)));
            let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
            dataset::write_jsonl(&records, BufWriter::new(file))
                .with_context(|| format!("Failed to write {:?}", path))?;
            info!(path = ?path, records = records.len(), "Dataset written");
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let args = parse_args();

    let (config, missing_config) = match args.config_path {
        Some(ref path) => (Config::load_from(path)?, None),
        None => Config::load()?,
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Warning: logging unavailable: {:#}", e);
    }
    if let Some(path) = missing_config {
        warn!("Config file not found at {:?}, using defaults", path);
    }
    info!(version = env!("CARGO_PKG_VERSION"), command = ?args.command, "face-harvester starting");

    if let Err(e) = execute(&config, args.command) {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
