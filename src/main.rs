#[tokio::main]
async fn main() {
    if let Err(e) = heimdall_orchestrator::cli::run().await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
