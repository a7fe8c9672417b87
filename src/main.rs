use vocard::startup;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Load settings, connect services and run until shutdown
    startup::run().await
}
