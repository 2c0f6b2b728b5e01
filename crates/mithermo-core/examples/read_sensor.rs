//! Example: Reading Current Sensor Values
//!
//! This example connects to a thermometer, reads its settings and then the
//! four measurement characteristics over GATT.
//!
//! Run with: `cargo run --example read_sensor -- <DEVICE_ADDRESS>`

use std::env;

use mithermo_core::{BtleTransport, ConnectionMode, DeviceAddress, DeviceSession};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let address: DeviceAddress = if args.len() > 1 {
        args[1].parse()?
    } else {
        eprintln!("Usage: {} <DEVICE_ADDRESS>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} A4:C1:38:0A:1B:2C", args[0]);
        std::process::exit(1);
    };

    println!("Connecting to {}...", address);

    let transport = BtleTransport::new().await?;
    let session = DeviceSession::new(address, transport, ConnectionMode::Connection);
    session.init().await?;
    println!("Connected!");
    println!();

    let settings = session.cached_settings();
    println!("Device:");
    println!("  Hardware:    {}", settings.hw_version);
    println!("  Advertising: {}", settings.advertising_type);
    println!("  Interval:    {} ms", settings.advertising_interval_ms());
    println!();

    let m = session.measurements();
    println!("Current Readings:");
    println!("  Temperature: {:.2} °C", m.temperature_precise);
    println!("  Humidity:    {:.2} %", m.humidity);
    println!("  Battery:     {} % (~{} mV)", m.battery_level, session.battery_voltage().await);

    session.disconnect().await?;
    println!();
    println!("Disconnected.");

    Ok(())
}
