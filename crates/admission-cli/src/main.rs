use admission_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!("CLI error: {}", e);
        eprintln!("Error: {}", e);

        // Exit with a code callers can branch on: 1 config, 2 denied, 3 webhook failure
        std::process::exit(e.exit_code());
    }
}
