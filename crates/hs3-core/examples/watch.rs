// Load devices and events from a controller, then follow device changes.
//
//     RUST_LOG=hs3_api=debug,hs3_core=debug cargo run -p hs3-core --example watch -- 192.168.1.20

use tracing_subscriber::EnvFilter;

use hs3_core::{Controller, ControllerConfig, CoreError};

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Some(host) = std::env::args().nth(1) else {
        eprintln!("usage: watch <host>");
        std::process::exit(1);
    };

    let controller = Controller::new(ControllerConfig::new(host))?;
    controller.initialize().await;

    println!("-----------------");
    println!("HomeSeer Devices:");
    println!("-----------------");
    for device in controller.devices() {
        println!("Name: {} (Type: {})", device.name(), device.device_type());
    }

    println!("----------------");
    println!("HomeSeer Events:");
    println!("----------------");
    for event in controller.events().iter() {
        println!("Group: {}, Name: {}", event.group(), event.name());
    }

    println!();
    println!("Starting listener, Ctrl-C to stop");
    controller.start_listener().await;

    for device in controller.devices() {
        let mut updates = device.subscribe(false);
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                let reason = update.reason.map_or_else(String::new, |r| format!(" ({r})"));
                println!("{} -> {}{reason}", device.name(), update.value);
            }
        });
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("failed to wait for Ctrl-C: {e}");
    }
    controller.shutdown().await;
    Ok(())
}
