//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a 5-byte chip identifier from hex, e.g. "ECDA109544"
fn parse_chip_id(s: &str) -> Result<[u8; 5], String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if s.len() != 10 {
        return Err(format!("Expected 10 hex digits, got {}", s.len()));
    }
    let mut id = [0u8; 5];
    for (i, byte) in id.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[2 * i..2 * i + 2], 16)
            .map_err(|e| format!("Invalid hex value: {}", e))?;
    }
    Ok(id)
}

#[derive(Parser)]
#[command(name = "nandio")]
#[command(author, version, about = "NAND dumper device simulator", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve a simulated device over TCP so a host tool can connect
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:2340")]
        listen: String,

        /// Raw page size of the simulated chip in bytes (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "2112")]
        page_size: u32,

        /// Number of pages backed by memory
        #[arg(long, value_parser = parse_hex_u32, default_value = "64")]
        pages: u32,

        /// Address cycles interpreted as the column
        #[arg(long, default_value_t = 2)]
        column_cycles: u8,

        /// Chip identifier bytes as 10 hex digits
        #[arg(long, value_parser = parse_chip_id, default_value = "ECDA109544")]
        id: [u8; 5],

        /// Image file preloaded into the chip's backing memory
        #[arg(long)]
        image: Option<PathBuf>,

        /// Advertise bootloader support
        #[arg(long)]
        bootloader: bool,

        /// Advertise restart support
        #[arg(long)]
        restart: bool,
    },
}
