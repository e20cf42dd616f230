// stencil CLI entry point

use clap::Parser;

mod commands;
mod error;
mod input;
mod logging;
mod output;
mod prompts;

use commands::Cli;
use stencil_engine::RunStatus;

#[tokio::main]
async fn main() {
    logging::init();

    let cli = Cli::parse();
    match commands::run(cli).await {
        Ok(status) => {
            let code = match status {
                RunStatus::Clean => 0,
                RunStatus::CompletedWithConflicts => 2,
                RunStatus::Failed => 1,
            };
            std::process::exit(code);
        }
        Err(e) => {
            output::print_error(&e.user_message());
            std::process::exit(1);
        }
    }
}
