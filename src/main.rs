mod age_bands;
mod aggregate;
mod catalog;
mod cli;
mod combinations;
mod config;
mod error;
mod logging;
mod metadata;
mod observations;
mod output;
mod pipeline;
mod rounding;
mod source;
#[cfg(test)]
mod testing;
mod types;

use clap::Parser;
use tracing::{error, info};

use catalog::{read_area_list, Catalog};
use cli::{Cli, Commands, Dirs};
use config::RunConfig;
use logging::{init_logging, LogConfig};
use output::FsStore;
use pipeline::{combine_artifacts, Generator};
use source::GzJsonSource;
use types::Result;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose)
        .with_format(cli.log_format)
        .with_log_file(cli.log_file.clone());
    init_logging(&log_config)?;

    let result = run(cli.command, &cli.dirs);
    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

fn run(command: Commands, dirs: &Dirs) -> Result<()> {
    let mut store = FsStore::new(&dirs.generated_dir);

    match command {
        Commands::Classifications => {
            let merged = metadata::merge_classification_dirs(&dirs.downloaded_dir)?;
            metadata::write_merged_classifications(&merged, &mut store)?;
        }
        Commands::Plan { by_area } => {
            let config = RunConfig::load(&dirs.config_path())?;
            let catalog = Catalog::load(&dirs.input_dir, &dirs.generated_dir)?;
            let planned = source::plan_requests(&catalog, &config, by_area)?;
            output::write_json_lines(&planned)?;
            info!(requests = planned.len(), "Planned batch requests");
        }
        Commands::Generate => {
            let config = RunConfig::load(&dirs.config_path())?;
            let catalog = Catalog::load(&dirs.input_dir, &dirs.generated_dir)?;
            let mut source = GzJsonSource::new(&dirs.downloaded_dir);
            Generator::new(&catalog, &config, &mut source, &mut store).generate_national()?;
        }
        Commands::GenerateByArea { areas } => {
            let config = RunConfig::load(&dirs.config_path())?;
            let catalog = Catalog::load(&dirs.input_dir, &dirs.generated_dir)?;
            let areas = read_area_list(&dirs.areas_path(areas))?;
            info!(areas = areas.len(), "Loaded area list");
            let mut source = GzJsonSource::new(&dirs.downloaded_dir);
            Generator::new(&catalog, &config, &mut source, &mut store).generate_by_area(&areas)?;
        }
        Commands::Combine => {
            let config = RunConfig::load(&dirs.config_path())?;
            let catalog = Catalog::load(&dirs.input_dir, &dirs.generated_dir)?;
            combine_artifacts(&catalog, &config, &mut store)?;
        }
        Commands::Metadata => {
            let catalog = Catalog::load(&dirs.input_dir, &dirs.generated_dir)?;
            metadata::write_metadata(&catalog, &mut store)?;
        }
    }

    Ok(())
}
