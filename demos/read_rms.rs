//! Print the playback RMS of the first two channels once a second
//!
//! ```text
//! cargo run --example read_rms -- 127.0.0.1 4321
//! ```

use camilladsp_client::CamillaClient;
use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;

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
            println!("\t> camilladsp -p4321 yourconfig.yml");
            println!("Then read the signal level");
            println!("\t> read_rms 127.0.0.1 4321");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::try_parse()?;

    let mut client = CamillaClient::new();
    client.connect(&args.host, args.port).await?;

    println!("Reading playback signal RMS, press Ctrl+c to stop");

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let rms = client.get_playback_signal_rms().await?;
                let channel = |i: usize| rms.get(i).copied().unwrap_or(f32::NEG_INFINITY);
                println!("Channel 1: {:.2}\tChannel 2: {:.2}", channel(0), channel(1));
            }
        }
    }

    client.disconnect().await;
    Ok(())
}
