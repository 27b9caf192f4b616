use clap::Parser;

use mcqrag_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("{info}");
        eprintln!("{info}");
    }));

    let cli = Cli::parse();
    let result = mcqrag_cli::run(cli).await;
    if let Err(ref e) = result {
        tracing::error!(error = format!("{e:#}"), "command failed");
    }
    result
}
