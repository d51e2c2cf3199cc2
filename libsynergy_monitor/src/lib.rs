//! # synergy_monitor
//!
//! synergy_monitor reads the diagnostic logs written by a SynergyED electron diffractometer,
//! merges them into continuous per-channel time series, and watches those series for
//! user-defined alert conditions. When a condition is met an email alert is sent over SMTP.
//!
//! ## Installation
//!
//! Currently the only method of install is from source. If you have not used Rust before,
//! see the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions of the tool chain.
//!
//! To build and install the CLI use `cargo install --path ./synergy_monitor_cli` from the
//! top level synergy_monitor repository. The binary will be installed to your cargo install
//! location (typically something like `~/.cargo/bin/`).
//!
//! ## Log Layouts
//!
//! The instrument writes one tab separated log file per session. Three on-disk layouts are
//! recognized below the log directory:
//!
//! ```text
//! SynergyED_DiagnosticData
//! |---- 2025-05-12_12-48-37_EDAutoLog
//! |    |---- EDAutoLog.dat
//! |---- 2025-05-12_13-02-11_Jeol_MicroED.dat
//! |---- archive
//! |    |---- 2024
//! |    |    |---- Mon-Apr-01-2024_Jeol_MicroED.dat
//! ```
//!
//! Container folders and flat files directly in the log directory are preferred. The
//! directory tree is only searched recursively when neither is found. The timestamp of a
//! file comes from its name; if the name cannot be read, the first data row of the file is
//! used instead.
//!
//! Each file starts with a title line, followed by a header line naming the columns. The
//! first column is the row timestamp and every other column is a numeric channel:
//!
//! ```text
//! [Jeol_MicroED 2]
//! time	HT [kV]	Beam Current [uA]	...
//! 2025-05-12 12:48:37.123	200.0	12.5	...
//! ```
//!
//! Values that cannot be read as a number are treated as missing.
//!
//! ## Configuration
//!
//! The CLI is driven by a YAML configuration file. A template can be generated with the
//! `new` subcommand. The format is as follows:
//!
//! ```yml
//! log_path: C:\Xcalibur\log\SynergyED_DiagnosticData
//! start_date: 2025-05-12
//! end_date: null
//! n_threads: 2
//! poll_interval_secs: 2
//! email:
//!   server: smtp.gmail.com
//!   port: 587
//!   sender: user@example.com
//!   password: app-password
//!   recipient: ops@example.com
//! triggers:
//!   - parameter: HT [kV]
//!     comparison: less_than
//!     threshold: 190.0
//!     duration_minutes: 5
//!     policy: continuous_duration
//! ```
//!
//! - `start_date`/`end_date`: Optional inclusive date range of the logs to read. When
//! watching, the start date also sets the beginning of the session.
//! - `n_threads`: Number of worker threads reading files in parallel. Must be at least 1.
//! - `poll_interval_secs`: How often the log directory is re-read when watching.
//! - `email`: Optional. Without it, firings are only logged.
//! - `triggers`: The alert conditions. `comparison` is one of `greater_than`, `less_than`,
//! or `equals` (within 0.001). `policy` is one of:
//!   - `continuous_duration`: fire once the condition has held for the whole duration
//!   - `time_bounded`: fire on a false to true transition within the duration after the
//!   condition first held
//!   - `delayed_activation`: ignore the first duration of the session, then fire on every
//!   false to true transition
//!
//! ## Output
//!
//! All status is reported through the `log` facade. The CLI writes it to the terminal.
pub mod aggregator;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod log_file;
pub mod monitor;
pub mod name_parser;
pub mod notifier;
pub mod process;
pub mod trigger;
pub mod worker_status;
