use anyhow::Result;
use console::style;
use tracing_subscriber::EnvFilter;

use rootfile_catalog::application::use_cases::operate_catalog::OperateCatalogUseCase;
use rootfile_catalog::infrastructure::batch::BatchDecision;
use rootfile_catalog::interfaces::cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let command = cli::collect_operate_command()?;

    let use_case = OperateCatalogUseCase::default();
    let result = use_case.execute(command)?;

    let outcome = &result.outcome;
    if outcome.failure > 0 {
        println!(
            "{} {} operation{} failed.",
            style("Warning:").yellow().bold(),
            outcome.failure,
            if outcome.failure == 1 { "" } else { "s" },
        );
    }
    match result.decision {
        BatchDecision::Committed => println!(
            "{} ({} record{})",
            style("Committing all operations...").green(),
            outcome.success,
            if outcome.success == 1 { "" } else { "s" },
        ),
        BatchDecision::NothingDone => println!("{}", style("Nothing done...").yellow()),
        BatchDecision::RolledBack => println!("{}", style("Undo all operations...").red()),
    }

    Ok(())
}
