//! Example: Scanning for Thermometers
//!
//! This example lists the ATC/PVVX thermometers in range and, for each one,
//! the service data it last advertised.
//!
//! Run with: `cargo run --example scan_devices`

use mithermo_core::scan::{self, ScanOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("Scanning for thermometers...");
    println!();

    let options = ScanOptions::default()
        .duration_secs(10)
        .filter_vendor_prefix(true);

    let devices = scan::discover(options).await?;

    if devices.is_empty() {
        println!("No thermometers found.");
        println!();
        println!("Make sure:");
        println!("  - The thermometer runs the ATC or PVVX firmware");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - The device is within range");
    } else {
        println!("Found {} device(s):", devices.len());
        println!();

        for device in &devices {
            let name = device.name.as_deref().unwrap_or("Unknown");
            println!("  {} ({})", name, device.address);
            if let Some(rssi) = device.rssi {
                println!("    RSSI: {} dBm", rssi);
            }
            if !device.payload.is_empty() {
                println!("    Service data: {:02X?}", device.payload);
            }
        }
    }

    Ok(())
}
