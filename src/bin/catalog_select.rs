use anyhow::Result;
use tracing_subscriber::EnvFilter;

use rootfile_catalog::application::use_cases::select_files::SelectFilesUseCase;
use rootfile_catalog::domain::registry::ConditionRegistry;
use rootfile_catalog::interfaces::cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let registry = ConditionRegistry::standard();
    let command = cli::collect_select_command(&registry)?;

    let use_case = SelectFilesUseCase::default();
    use_case.execute(command)?;
    Ok(())
}
