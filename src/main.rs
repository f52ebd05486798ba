//! nandio - serve a simulated NAND dumper device over TCP
//!
//! The engine in `nandio-device` is the same code a firmware port would run;
//! here it is wired to an in-memory chip from `nandio-sim` and a TCP transport
//! so a host tool can exercise the full wire protocol without hardware.

mod cli;
mod transport;

use clap::Parser;
use cli::{Cli, Commands};
use nandio_device::protocol::device_ids;
use nandio_device::{Capabilities, Device};
use nandio_sim::{SimNand, SimNandConfig, SimPlatform};
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;
use transport::TcpTransport;

#[derive(Debug, thiserror::Error)]
enum ServeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image {path} is {actual} bytes, backing memory holds {capacity}")]
    ImageTooLarge {
        path: String,
        actual: usize,
        capacity: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Serve {
            listen,
            page_size,
            pages,
            column_cycles,
            id,
            image,
            bootloader,
            restart,
        } => {
            let chip = SimNandConfig {
                id,
                page_size: page_size as usize,
                pages: pages as usize,
                column_cycles: column_cycles as usize,
            };
            let caps = Capabilities {
                bootloader,
                restart,
            };
            serve(&listen, chip, caps, image.as_deref())?;
        }
    }

    Ok(())
}

fn serve(
    listen: &str,
    chip: SimNandConfig,
    caps: Capabilities,
    image: Option<&Path>,
) -> Result<(), ServeError> {
    let image = match image {
        Some(path) => {
            let data = std::fs::read(path)?;
            let capacity = chip.page_size * chip.pages;
            if data.len() > capacity {
                return Err(ServeError::ImageTooLarge {
                    path: path.display().to_string(),
                    actual: data.len(),
                    capacity,
                });
            }
            Some(data)
        }
        None => None,
    };

    let listener = TcpListener::bind(listen)?;
    log::info!("Listening on {}", listen);
    log::info!(
        "Simulating chip {:02X?}, {} pages of {} bytes",
        chip.id,
        chip.pages,
        chip.page_size
    );

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Failed to accept connection: {}", e);
                continue;
            }
        };
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        log::info!("Host connected from {}", peer);

        let nand = SimNand::new(chip.clone());
        if let Some(data) = &image {
            nand.load(0, data);
        }
        let platform = SimPlatform::new(device_ids::UNKNOWN);
        let transport = TcpTransport::new(stream)?;
        let closed = transport.closed_flag();

        // Each connection gets a fresh device, like a firmware power cycle.
        let mut device = Device::new(transport, nand, platform, caps);
        while !closed.get() {
            device.poll();
            std::thread::sleep(Duration::from_millis(1));
        }
        log::info!("Host {} disconnected", peer);
    }

    Ok(())
}
