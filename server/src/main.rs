use clap::Parser;
use log::info;
use server::clock::SystemClock;
use server::game::Game;
use server::network::Server;
use std::sync::Arc;

/// Main-method of the application.
/// Parses command-line arguments, then serves poll requests until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
    }

    let args = Args::parse();

    let game = Arc::new(Game::in_memory());
    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, game, Arc::new(SystemClock)).await?;

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down gracefully...");
        })
        .await?;

    Ok(())
}
