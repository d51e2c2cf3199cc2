use clap::{Arg, ArgAction, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use libsynergy_monitor::catalog::scan_catalog;
use libsynergy_monitor::clock::format_timestamp;
use libsynergy_monitor::config::Config;
use libsynergy_monitor::error::ConfigError;
use libsynergy_monitor::monitor::Monitor;
use libsynergy_monitor::notifier::{send_test_alert, Dispatcher, EmailNotifier, SmtpProvider};
use libsynergy_monitor::process::aggregate_files_parallel;
use libsynergy_monitor::worker_status::WorkerStatus;

fn make_template_config(path: &Path) -> Result<(), ConfigError> {
    let config = Config::default();
    config.write_config_file(path)
}

/// List the log files the catalog finds for the configured date range
fn scan(config: &Config) {
    let catalog = scan_catalog(&config.log_path, config.start_date, config.end_date);
    if catalog.is_empty() {
        log::warn!(
            "No log files found in {}",
            config.log_path.to_string_lossy()
        );
        return;
    }
    for entry in catalog.iter() {
        log::info!(
            "{} {} ({:?}) {}",
            entry.datetime_label(),
            entry.label,
            entry.layout,
            entry.path.to_string_lossy()
        );
    }
    log::info!("Found {} log files.", catalog.len());
}

/// Read every log file in the configured date range and report per-channel statistics
fn summary(config: &Config, pb_manager: &MultiProgress) {
    let catalog = scan_catalog(&config.log_path, config.start_date, config.end_date);
    if catalog.is_empty() {
        log::warn!(
            "No log files found in {}",
            config.log_path.to_string_lossy()
        );
        return;
    }
    let paths: Vec<PathBuf> = catalog.into_iter().map(|entry| entry.path).collect();
    let n_files = paths.len();
    let n_threads = config.n_threads;

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(n_files as u64));
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} files {elapsed}") {
        pb.set_style(style);
    }

    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    // Spawn the task!
    let handle = std::thread::spawn(move || aggregate_files_parallel(&paths, n_threads, Some(&tx)));

    // Each worker reports how many of its own files it has read
    let mut files_read = vec![0; n_threads.max(1)];
    for status in rx {
        if let Some(count) = files_read.get_mut(status.worker_id) {
            *count = status.files_read;
        }
        pb.set_position(files_read.iter().sum::<usize>() as u64);
    }
    pb.finish();

    let series = match handle.join() {
        Ok(Ok(Some(series))) => series,
        Ok(Ok(None)) => {
            log::warn!("None of the {n_files} log files could be read.");
            return;
        }
        Ok(Err(e)) => {
            log::error!("Reading failed with error: {e}");
            return;
        }
        Err(_) => {
            log::error!("Failed to join reading task!");
            return;
        }
    };

    log::info!(
        "Merged {} of {} log files.",
        series.n_tables(),
        n_files
    );
    for column in series.columns() {
        let Some(stats) = series.stats(column) else {
            continue;
        };
        match (stats.min, stats.max, stats.mean, stats.last) {
            (Some(min), Some(max), Some(mean), Some(last)) => log::info!(
                "{column}: {} values ({} missing) min {min} max {max} mean {mean:.3} last {last}",
                stats.count,
                stats.missing
            ),
            _ => log::info!("{column}: no values ({} missing)", stats.missing),
        }
    }
    if let Some(first) = series.columns().first() {
        if let Some(sample) = series.latest(first) {
            log::info!("Latest sample at {}", format_timestamp(sample.timestamp));
        }
    }
}

/// Check the SMTP settings and send the canned test message
fn test_email(config: &Config) {
    let Some(email) = &config.email else {
        log::error!("Config has no email section; nothing to test.");
        return;
    };
    log::info!(
        "Testing {} ({}:{})...",
        SmtpProvider::detect(&email.server, email.port).name(),
        email.server,
        email.port
    );
    let notifier = EmailNotifier::from_config(email);
    if let Err(e) = notifier.test_connection() {
        log::error!("{e}");
        return;
    }
    log::info!("Connection successful.");
    match send_test_alert(&notifier) {
        Ok(()) => log::info!("Test email sent to {}.", email.recipient),
        Err(e) => log::error!("{e}"),
    }
}

/// Re-read the log directory forever, evaluating the configured triggers on new samples
fn watch(config: &Config) {
    if config.triggers.is_empty() {
        log::error!("Config has no triggers; nothing to watch.");
        return;
    }
    if !config.has_email() {
        log::warn!("Config has no email section; firings will only be logged.");
    }
    let mut monitor = Monitor::from_config(config);
    for trigger in monitor.triggers() {
        log::info!("Watching: {}", trigger.description());
    }
    log::info!(
        "Session started at {}. Polling every {} s.",
        format_timestamp(config.session_start()),
        config.poll_interval_secs
    );

    let interval = Duration::from_secs(config.poll_interval_secs);
    loop {
        match monitor.poll(&config.log_path, config.n_threads) {
            Ok(firings) => {
                let undelivered = firings.iter().filter(|f| !f.delivered).count();
                if config.has_email() && undelivered > 0 {
                    log::warn!("{undelivered} alerts could not be delivered.");
                }
            }
            Err(e) => log::error!("Polling failed with error: {e}"),
        }
        std::thread::sleep(interval);
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("synergy_monitor_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(Command::new("scan").about("List the log files in the configured date range"))
        .subcommand(
            Command::new("summary")
                .about("Read the log files in the configured date range and summarize each channel"),
        )
        .subcommand(Command::new("test-email").about("Check the email settings and send a test alert"))
        .subcommand(Command::new("watch").about("Watch the log directory and send alerts"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Show debug messages"),
        )
        .get_matches();

    // Initialize feedback
    let level = if matches.get_flag("verbose") {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let logger = simplelog::TermLogger::new(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }
    log::set_max_level(level);

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A configuration file path is required.");
        return;
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("{e}"),
        }
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Log Path: {}", config.log_path.to_string_lossy());
    log::info!(
        "Start Date: {} End Date: {}",
        config
            .start_date
            .map_or(String::from("any"), |d| d.to_string()),
        config.end_date.map_or(String::from("any"), |d| d.to_string())
    );
    log::info!("Number of Threads: {}", config.n_threads);

    match matches.subcommand() {
        Some(("scan", _)) => scan(&config),
        Some(("summary", _)) => summary(&config, &pb_manager),
        Some(("test-email", _)) => test_email(&config),
        Some(("watch", _)) => watch(&config),
        _ => log::error!("No subcommand given; see --help."),
    }

    log::info!("Done.");
}
