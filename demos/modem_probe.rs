//! Probe a GSM modem on a serial port.
//!
//! Usage: cargo run --example modem_probe [PORT] [BAUD]
//!
//! Default port: /dev/ttyUSB0 at 115200 baud

use relay_gateway::gsm::{GsmDriver, SerialModem, is_service_usable};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let port = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let baud: u32 = std::env::args().nth(2).and_then(|s| s.parse().ok()).unwrap_or(115_200);

    println!("Probing modem on {port} at {baud} baud");
    println!("======================================");

    // The driver blocks on the serial line
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut driver = GsmDriver::new(SerialModem::new(&port, baud));

        println!("\n[1] Initializing...");
        driver.init(true)?;
        println!("    Modem answered, echo off.");

        println!("\n[2] SIM card...");
        println!("    ICCID: {}", driver.iccid()?);
        match driver.pin_not_required() {
            Ok(true) => println!("    PIN: not required"),
            Ok(false) => println!("    PIN: required, stopping here"),
            Err(e) => println!("    Warning: Could not query PIN state: {e}"),
        }

        println!("\n[3] Network...");
        let stat = driver.registration()?;
        println!(
            "    Registration: {stat} ({})",
            if is_service_usable(stat) { "usable" } else { "no service" }
        );
        match driver.operator() {
            Ok(name) => println!("    Operator: {name}"),
            Err(e) => println!("    Warning: Could not get operator: {e}"),
        }
        println!("    Signal: {}", driver.signal_quality()?);

        println!("\n[4] Clocks...");
        match driver.read_rtc() {
            Ok(time) => println!("    Modem RTC (UTC): {}", time.format("%Y-%m-%d %H:%M:%S")),
            Err(e) => println!("    Warning: Could not read RTC: {e}"),
        }
        match driver.gnss_info() {
            Ok(gnss) => println!(
                "    GNSS: {} (fix: {}, running: {})",
                gnss.time.format("%Y-%m-%d %H:%M:%S"),
                gnss.fix,
                gnss.running
            ),
            Err(e) => println!("    Warning: Could not read GNSS: {e}"),
        }

        println!("\n[5] SMS storage...");
        let (used, total) = driver.number_of_sms()?;
        println!("    {used} of {total} slots used");

        Ok(())
    })
    .await??;

    println!("\nDone.");
    Ok(())
}
