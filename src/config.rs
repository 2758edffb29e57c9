// SPDX-License-Identifier: MIT
//
// Command line and logging setup.

use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use crate::error::AppError;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "n-client", version, about = "A terminal front-end for an embedded Neovim")]
pub struct Args {
    /// File to open
    pub file: Option<PathBuf>,

    /// Neovim executable to embed
    #[arg(long, value_name = "PATH", default_value = "nvim")]
    pub nvim: String,

    /// Write a debug log to FILE
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Log level for --log
    #[arg(long, value_name = "LEVEL", default_value_t = LevelFilter::Debug)]
    pub log_level: LevelFilter,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub file: Option<PathBuf>,
    pub nvim: String,
    pub log_file: Option<PathBuf>,
    pub log_level: LevelFilter,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            file: args.file,
            nvim: args.nvim,
            log_file: args.log,
            log_level: args.log_level,
        }
    }
}

impl Config {
    /// Parse the process arguments. Exits on `--help` or bad input.
    #[must_use]
    pub fn from_args() -> Self {
        Args::parse().into()
    }

    /// Install the file logger, if a log file was requested.
    ///
    /// The terminal belongs to the UI, so logs only ever go to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or a logger is
    /// already installed.
    pub fn init_logging(&self) -> Result<(), AppError> {
        let Some(path) = &self.log_file else {
            return Ok(());
        };
        let file = File::create(path)
            .map_err(|e| AppError::Logging(format!("{}: {e}", path.display())))?;
        let config = ConfigBuilder::new().set_time_format_rfc3339().build();
        WriteLogger::init(self.log_level, config, file)
            .map_err(|e| AppError::Logging(e.to_string()))?;
        log::info!("n-client {} starting", env!("CARGO_PKG_VERSION"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(argv: &[&str]) -> Config {
        Args::try_parse_from(argv).unwrap().into()
    }

    #[test]
    fn defaults() {
        assert_eq!(
            parse(&["n-client"]),
            Config {
                file: None,
                nvim: "nvim".into(),
                log_file: None,
                log_level: LevelFilter::Debug,
            }
        );
    }

    #[test]
    fn file_and_options() {
        let cfg = parse(&[
            "n-client",
            "--nvim",
            "/opt/nvim/bin/nvim",
            "--log",
            "/tmp/n.log",
            "--log-level",
            "trace",
            "notes.txt",
        ]);
        assert_eq!(cfg.file, Some(PathBuf::from("notes.txt")));
        assert_eq!(cfg.nvim, "/opt/nvim/bin/nvim");
        assert_eq!(cfg.log_file, Some(PathBuf::from("/tmp/n.log")));
        assert_eq!(cfg.log_level, LevelFilter::Trace);
    }

    #[test]
    fn bad_level_is_rejected() {
        assert!(Args::try_parse_from(["n-client", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn no_log_file_means_no_logger() {
        parse(&["n-client"]).init_logging().unwrap();
    }
}
