//! Print the library and engine versions
//!
//! ```text
//! cargo run --example version -- 127.0.0.1 1234
//! ```

use camilladsp_client::CamillaClient;
use clap::Parser;
use std::process::ExitCode;

#[derive(Parser)]
struct Args {
    /// Host running CamillaDSP
    host: String,
    /// Websocket port CamillaDSP was started with (-p)
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            println!("Usage: start CamillaDSP with the websocket server enabled:");
            println!("\t> camilladsp -p1234 yourconfig.yml");
            println!("Then read the versions");
            println!("\t> version 127.0.0.1 1234");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::try_parse()?;

    let mut client = CamillaClient::new();
    client.connect(&args.host, args.port).await?;

    println!("Library version: {}", CamillaClient::library_version());
    if let Some(version) = client.version() {
        println!("CamillaDSP version: {}", version);
    }

    if client.is_connected() {
        client.disconnect().await;
    }
    Ok(())
}
