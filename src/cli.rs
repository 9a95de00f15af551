use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::catalog::AREA_LIST_FILE;
use crate::config::CONFIG_FILE;
use crate::logging::LogFormat;

/// Precompute every census cross-tabulation a front-end can request
#[derive(Parser, Debug)]
#[command(name = "census-crosstab")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log more detail (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(flatten)]
    pub dirs: Dirs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Directory roots
#[derive(Args, Debug, Clone)]
pub struct Dirs {
    /// Run configuration and classification lists
    #[arg(long, default_value = "input-txt-files", global = true)]
    pub input_dir: PathBuf,

    /// Batches and metadata fetched from the census API
    #[arg(long, default_value = "downloaded", global = true)]
    pub downloaded_dir: PathBuf,

    /// Where artifacts are written
    #[arg(long, default_value = "generated", global = true)]
    pub generated_dir: PathBuf,
}

impl Dirs {
    pub fn config_path(&self) -> PathBuf {
        self.input_dir.join(CONFIG_FILE)
    }

    pub fn areas_path(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit.unwrap_or_else(|| self.downloaded_dir.join(AREA_LIST_FILE))
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Merge the downloaded classification files of every population type
    Classifications,

    /// Print every batch request a run reads, one JSON object per line
    Plan {
        /// Plan the area-level run instead of the national one
        #[arg(long, default_value_t = false)]
        by_area: bool,
    },

    /// Generate national artifacts and the unblocked combination counts
    Generate,

    /// Generate area-level artifacts
    GenerateByArea {
        /// Area list (defaults to ltla-geog.json in the download directory)
        #[arg(long)]
        areas: Option<PathBuf>,
    },

    /// Pair national and area-level artifacts for the front-end
    Combine,

    /// Write metadata.json and the classification id lists
    Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["census-crosstab", "generate"]).unwrap();
        assert_eq!(cli.command, Commands::Generate);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.log_format, LogFormat::Pretty);
        assert_eq!(cli.dirs.config_path(), PathBuf::from("input-txt-files/config.json"));
        assert_eq!(
            cli.dirs.areas_path(None),
            PathBuf::from("downloaded/ltla-geog.json")
        );
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "census-crosstab",
            "generate-by-area",
            "-vv",
            "--log-format",
            "json",
            "--generated-dir",
            "out",
            "--areas",
            "areas.json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.dirs.generated_dir, PathBuf::from("out"));
        assert_eq!(
            cli.command,
            Commands::GenerateByArea {
                areas: Some(PathBuf::from("areas.json"))
            }
        );
    }

    #[test]
    fn test_plan_flag() {
        let cli = Cli::try_parse_from(["census-crosstab", "plan", "--by-area"]).unwrap();
        assert_eq!(cli.command, Commands::Plan { by_area: true });
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["census-crosstab"]).is_err());
    }
}
