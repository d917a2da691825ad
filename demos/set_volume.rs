//! Read the current volume and set a new one
//!
//! ```text
//! cargo run --example set_volume -- 127.0.0.1 4321 -12.3
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
    /// New volume in dB
    #[arg(allow_negative_numbers = true)]
    volume: f32,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            println!("Usage: Make sure that your pipeline includes Volume filters for each channel.");
            println!("Then start CamillaDSP with the websocket server enabled:");
            println!("\t> camilladsp -p4321 yourconfig.yml");
            println!("Then set the volume");
            println!("\t> set_volume 127.0.0.1 4321 -12.3");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::try_parse()?;

    let mut client = CamillaClient::new();
    client.connect(&args.host, args.port).await?;

    let current = client.get_volume().await?;
    println!("Current volume: {:.1} dB", current);
    println!("Changing volume to: {:.1} dB", args.volume);
    client.set_volume(args.volume).await?;

    if client.is_connected() {
        client.disconnect().await;
    }
    Ok(())
}
