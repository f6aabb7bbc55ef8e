use prescriptions::app::App;
use prescriptions::config::Settings;
use prescriptions::observability::init_tracing;
use prescriptions::shutdown::ShutdownSignal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let settings = Settings::load(None)?;
    init_tracing(&settings.log_level);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address).await?;
    let shutdown = ShutdownSignal::new();
    let signals = shutdown.clone();
    tokio::spawn(async move { signals.listen_for_signals().await });

    App::build(settings).run(listener, shutdown).await?;
    Ok(())
}
