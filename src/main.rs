use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    medwatch::logging::init("info").context("init logging")?;

    let cli = medwatch::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        medwatch::cli::Command::Check(args) => {
            medwatch::check::run(args).await.context("check")?;
        }
        medwatch::cli::Command::State {
            command: medwatch::cli::StateCommand::Show(args),
        } => {
            medwatch::state::show(args).await.context("state show")?;
        }
    }

    Ok(())
}
