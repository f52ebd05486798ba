//! Collaborator traits the engine is generic over
//!
//! Firmware ports implement these against real peripherals; tests and the
//! simulator implement them in memory. All methods are blocking - the engine
//! is single-threaded and polls.

/// Byte pipe to the host
pub trait Transport {
    /// Whether at least one byte is waiting to be read
    fn available(&mut self) -> bool;

    /// Whether the transport is currently unusable (e.g. USB not configured).
    /// The poll loop re-clears stale input whenever this recovers.
    fn busy(&mut self) -> bool;

    /// Discard any buffered inbound bytes
    fn flush_input(&mut self);

    /// Push any buffered outbound bytes to the host
    fn flush_output(&mut self);

    /// Read up to `buf.len()` bytes, returning how many were read.
    /// 0 means no data was available.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Write `buf`, returning how many bytes were accepted
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Nominal baud rate, reported in the ping response
    fn baud_rate(&self) -> u32;
}

/// Control and I/O lines of the NAND chip
///
/// `command` latches one command byte (CLE high, write strobe); `io_write`
/// strobes one data/address byte; `address_latch` drives the ALE line around
/// a run of address cycles.
pub trait NandBus {
    /// Assert chip enable (re-initializing the port directions)
    fn enable(&mut self);

    /// Release all chip lines
    fn disable(&mut self);

    /// Latch a command byte into the chip
    fn command(&mut self, cmd: u8);

    /// Drive the address latch line
    fn address_latch(&mut self, high: bool);

    /// Switch the I/O lines to input, with the given pull direction
    fn io_input(&mut self, pull_up: bool);

    /// Switch the I/O lines to output
    fn io_output(&mut self);

    /// Put one byte on the I/O lines and strobe it into the chip
    fn io_write(&mut self, byte: u8);

    /// Strobe one byte out of the chip
    fn io_read(&mut self) -> u8;

    /// Poll the ready/busy line until it asserts or `timeout_ms` elapses.
    /// Returns false on timeout.
    fn wait_ready(&mut self, timeout_ms: u32) -> bool;

    /// Busy-wait for `us` microseconds
    fn delay_us(&mut self, us: u32);
}

/// Platform services outside the flash and transport
pub trait Platform {
    /// Device identifier, see [`crate::protocol::device_ids`]
    fn device_id(&self) -> u8;

    /// Free memory in bytes, reported in the ping response
    fn free_memory(&self) -> u32;

    /// Sleep for `ms` milliseconds
    fn sleep_ms(&mut self, ms: u32);

    /// Jump to the bootloader. Does not return on real hardware.
    fn enter_bootloader(&mut self);

    /// Restart the device. Does not return on real hardware.
    fn restart(&mut self);

    /// Release all flash pins after a NAND command completes
    fn release_pins(&mut self);
}
