//! Command-line interface for earshot.
//!
//! This binary talks to the earshot daemon over its HTTP API.

use std::env;

use anyhow::Result;

use earshot::api_client::{self, types::StatusResponse};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: earshot-cli <command>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  status    Show alarm status and recent events");
        eprintln!("  reset     Silence the alarm and re-arm");
        eprintln!("  trigger   Run one alarm cycle without the sensor");
        eprintln!();
        eprintln!("Environment:");
        eprintln!(
            "  EARSHOT_API_URL    API base URL (default: {})",
            api_client::DEFAULT_BASE_URL
        );
        std::process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "status" => cmd_status().await?,
        "reset" => cmd_reset().await?,
        "trigger" => cmd_trigger().await?,
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Build an API client, honoring EARSHOT_API_URL if set.
fn make_client() -> api_client::Client {
    match env::var("EARSHOT_API_URL") {
        Ok(url) => api_client::Client::with_base_url(url),
        Err(_) => api_client::Client::new(),
    }
}

fn on_off(value: u8) -> &'static str {
    if value != 0 { "on" } else { "off" }
}

fn print_status(status: &StatusResponse) {
    println!(
        "Alarm:      {}",
        if status.alarm_active { "TRIGGERED" } else { "armed" }
    );
    println!("Buzzer:     {}", on_off(status.buzzer));
    println!("LED:        {}", on_off(status.led));
    println!("Last event: {}", status.last_event);
    if status.last_photo_url.is_empty() {
        println!("Last photo: (none)");
    } else {
        println!("Last photo: {}", status.last_photo_url);
    }

    if !status.logs.is_empty() {
        println!("Recent events:");
        for entry in &status.logs {
            println!("  [{}] {:5} {}", entry.time, entry.level, entry.msg);
        }
    }
}

/// Print the current alarm state.
async fn cmd_status() -> Result<()> {
    let status = make_client().get_status().await?;
    print_status(&status);
    Ok(())
}

/// Reset the alarm and show the resulting state.
async fn cmd_reset() -> Result<()> {
    let reset = make_client().reset().await?;
    println!(
        "Reset at {}: alarm {}, buzzer {}, LED {}",
        reset.time,
        if reset.alarm_active { "still active" } else { "armed" },
        on_off(reset.buzzer),
        on_off(reset.led),
    );
    Ok(())
}

/// Fire a mock trigger and show the state right after.
async fn cmd_trigger() -> Result<()> {
    let client = make_client();
    client.mock_trigger().await?;
    print_status(&client.get_status().await?);
    Ok(())
}
