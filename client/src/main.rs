use clap::Parser;
use client::input::{parse_line, usage, InputAction};
use client::network::Client;
use log::{error, info, warn};
use shared::Command;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Poll endpoint of the server
    #[arg(short = 's', long, default_value = "http://127.0.0.1:8080/server")]
    server: String,

    /// Interval between refresh polls in milliseconds
    #[arg(short = 'p', long, default_value = "300")]
    poll_ms: u64,

    /// Interval between latency measurements in milliseconds
    #[arg(long, default_value = "2000")]
    ping_every_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Polling: {} every {}ms", args.server, args.poll_ms);
    println!("{}", usage());

    let mut client = Client::new(args.server);

    let mut poll_interval = interval(Duration::from_millis(args.poll_ms));
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ping_interval = interval(Duration::from_millis(args.ping_every_ms));
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_step = Instant::now();

    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                let now = Instant::now();
                client.game_state.step((now - last_step).as_secs_f64());
                last_step = now;

                if let Err(e) = client.send(Command::Refresh).await {
                    warn!("Refresh failed: {}", e);
                }
            },

            _ = ping_interval.tick() => {
                if !client.is_connected() {
                    continue;
                }
                match client.ping().await {
                    Ok(ping) => info!("Server-measured ping: {:?}ms", ping),
                    Err(e) => warn!("Ping failed: {}", e),
                }
            },

            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error reading input: {}", e);
                        break;
                    }
                };

                match parse_line(&line) {
                    Ok(Some(InputAction::Send(command))) => {
                        if let Err(e) = client.send(command).await {
                            warn!("{} failed: {}", command.name(), e);
                        }
                    }
                    Ok(Some(InputAction::Status)) => println!("{}", client.status()),
                    Ok(Some(InputAction::Quit)) => break,
                    Ok(None) => {}
                    Err(e) => println!("{}; {}", e, usage()),
                }
            },
        }
    }

    info!("Shutting down after {} packets", client.sent_packets());
    Ok(())
}
