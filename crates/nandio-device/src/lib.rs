//! nandio-device - device side of the nandio flash dumping protocol
//!
//! This crate implements the engine a NAND dumper device runs: packet
//! framing with dual CRC integrity, command dispatch, and the raw NAND
//! command/address/strobe sequencing needed to stream pages back to a host.
//!
//! The hardware is abstracted behind three traits so the same engine runs
//! on real firmware, in a simulator, or inside tests:
//!
//! - [`Transport`] - the byte pipe to the host (USB CDC, UART, TCP, ...)
//! - [`NandBus`] - the flash chip's control and I/O lines
//! - [`Platform`] - device identity, delays, bootloader/restart hooks
//!
//! # Example
//!
//! ```no_run
//! use nandio_device::{Capabilities, Device};
//! # use nandio_device::traits::{NandBus, Platform, Transport};
//! # struct Uart;
//! # impl Transport for Uart {
//! #     fn available(&mut self) -> bool { false }
//! #     fn busy(&mut self) -> bool { false }
//! #     fn flush_input(&mut self) {}
//! #     fn flush_output(&mut self) {}
//! #     fn read(&mut self, _buf: &mut [u8]) -> usize { 0 }
//! #     fn write(&mut self, buf: &[u8]) -> usize { buf.len() }
//! #     fn baud_rate(&self) -> u32 { 115_200 }
//! # }
//! # struct Bus;
//! # impl NandBus for Bus {
//! #     fn enable(&mut self) {}
//! #     fn disable(&mut self) {}
//! #     fn command(&mut self, _cmd: u8) {}
//! #     fn address_latch(&mut self, _high: bool) {}
//! #     fn io_input(&mut self, _pull_up: bool) {}
//! #     fn io_output(&mut self) {}
//! #     fn io_write(&mut self, _byte: u8) {}
//! #     fn io_read(&mut self) -> u8 { 0xFF }
//! #     fn wait_ready(&mut self, _timeout_ms: u32) -> bool { true }
//! #     fn delay_us(&mut self, _us: u32) {}
//! # }
//! # struct Board;
//! # impl Platform for Board {
//! #     fn device_id(&self) -> u8 { 0 }
//! #     fn free_memory(&self) -> u32 { 0 }
//! #     fn sleep_ms(&mut self, _ms: u32) {}
//! #     fn enter_bootloader(&mut self) {}
//! #     fn restart(&mut self) {}
//! #     fn release_pins(&mut self) {}
//! # }
//! let mut device = Device::new(Uart, Bus, Board, Capabilities::default());
//! device.run(); // poll and dispatch forever
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub mod channel;
pub mod crc;
pub mod dispatch;
pub mod error;
pub mod nand;
pub mod protocol;
pub mod traits;

#[cfg(feature = "embedded-io")]
pub mod embedded;

// Re-exports
pub use channel::PacketChannel;
pub use dispatch::{Capabilities, Device};
pub use error::ChannelError;
pub use nand::NandDriver;
pub use protocol::{CmdId, NandConfig, PacketHeader, ResultCode};
pub use traits::{NandBus, Platform, Transport};
