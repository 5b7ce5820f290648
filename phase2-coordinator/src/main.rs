use phase2_coordinator::{
    environment::{Environment, Settings},
    logger::initialize_logger,
    objects::ArtifactKind,
    scheduler,
    verification::Dummy,
    Coordinator,
};

use std::{path::PathBuf, sync::Arc};
use structopt::{clap::AppSettings, StructOpt};
use tracing::{info, warn};

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Creates the ceremony directories and the audit log.
    Init,
    /// Seeds the artifact chain with an initial artifact.
    Seed {
        #[structopt(long, parse(from_os_str))]
        file: PathBuf,
    },
    /// Prints the ceremony state.
    Status,
    /// Lists the versions with no audit log entry.
    Audit,
    /// Prints the path of the single artifact of a kind (ptau, r1cs or zkey).
    Locate { kind: ArtifactKind },
    /// Runs queue maintenance until interrupted.
    Run,
}

#[derive(StructOpt, Debug)]
#[structopt(
    name = "Phase 2 Coordinator",
    author = "The Aleo Team <hello@aleo.org>",
    setting(AppSettings::ColoredHelp),
    setting(AppSettings::DisableHelpSubcommand),
    setting(AppSettings::SubcommandRequiredElseHelp)
)]
pub struct Options {
    /// The environment mode: test, development or production.
    #[structopt(long, global = true, default_value = "development")]
    pub environment: String,

    /// A JSON file overriding the settings of the environment.
    #[structopt(long, global = true, parse(from_os_str))]
    pub config: Option<PathBuf>,

    #[structopt(subcommand)]
    pub subcommand: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = Options::from_args();

    let settings = match &options.config {
        Some(path) => Some(Settings::load(path)?),
        None => None,
    };
    let environment = Environment::from_mode(&options.environment, settings)?;
    initialize_logger(&environment);

    let coordinator = Coordinator::new(environment, Box::new(Dummy))?;
    coordinator.initialize()?;

    match options.subcommand {
        Command::Init => info!("Coordinator is ready"),
        Command::Seed { file } => {
            let initial = fs_err::read(&file)?;
            let seed = coordinator.seed(&initial)?;
            println!("{}", seed);
        }
        Command::Status => print!("{}", coordinator.status_report()?),
        Command::Audit => {
            let unaudited = coordinator.unaudited_versions()?;
            if unaudited.is_empty() {
                info!("Every version has an audit log entry");
            }
            for file_name in unaudited {
                warn!("{} has no audit log entry", file_name);
                println!("{}", file_name);
            }
        }
        Command::Locate { kind } => println!("{}", coordinator.locate(kind)?.display()),
        Command::Run => {
            let coordinator = Arc::new(coordinator);
            let scheduler = scheduler::spawn(coordinator.clone());

            tokio::signal::ctrl_c().await?;
            info!("Shutting down the coordinator");
            scheduler.shutdown().await;
        }
    }

    Ok(())
}
