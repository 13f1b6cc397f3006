use anytalk_relay::config::RelayConfig;
use anytalk_relay::logger::setup_logger;
use anytalk_relay::signaling::SignalingServer;
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = RelayConfig::parse();
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    let bind_addr = config.bind_addr();

    println!("   AnyTalk Signaling Relay");
    println!("   Binding to {}{}", bind_addr, config.path);
    println!("   Press Ctrl+C to stop\n");

    let server = SignalingServer::new(&config);

    tokio::select! {
        result = server.run(&bind_addr) => {
            if let Err(e) = result {
                error!("Relay error: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }
}
