//! Raw NAND sequencing over the [`NandBus`] lines
//!
//! Implements the classic command/address/strobe handshake: latch a command
//! byte, shift address cycles out under ALE, wait for the ready/busy line,
//! then clock data bytes in. No interpretation of the data happens here.

use crate::protocol::{NandConfig, NandId, PageAddress};
use crate::traits::NandBus;

/// NAND command opcodes
pub mod opcodes {
    /// Read, first cycle
    pub const READ_CYCLE1: u8 = 0x00;
    /// Page program, second cycle
    pub const PROGRAM_CYCLE2: u8 = 0x10;
    /// Read, second cycle
    pub const READ_CYCLE2: u8 = 0x30;
    /// Block erase, first cycle
    pub const ERASE_CYCLE1: u8 = 0x60;
    /// Read status register
    pub const STATUS: u8 = 0x70;
    /// Page program, first cycle
    pub const PROGRAM_CYCLE1: u8 = 0x80;
    /// Read identifier
    pub const READ_ID: u8 = 0x90;
    /// Block erase, second cycle
    pub const ERASE_CYCLE2: u8 = 0xD0;
    /// Chip reset
    pub const RESET: u8 = 0xFF;
}

/// Ready/busy poll timeout
pub const READY_TIMEOUT_MS: u32 = 3000;

/// Flash driver sequencing commands against a [`NandBus`]
pub struct NandDriver<B: NandBus> {
    bus: B,
}

impl<B: NandBus> NandDriver<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    fn wait_ready(&mut self) -> bool {
        let ready = self.bus.wait_ready(READY_TIMEOUT_MS);
        if !ready {
            log::warn!("nand: ready/busy wait timed out after {} ms", READY_TIMEOUT_MS);
        }
        ready
    }

    fn reset(&mut self) -> bool {
        self.bus.enable();
        self.bus.command(opcodes::RESET);
        self.wait_ready()
    }

    /// Read the 5 raw identifier bytes.
    ///
    /// Resets the chip first, then issues the read-id command with a single
    /// zero address cycle. The bytes are opaque here; the host maps them to
    /// a chip geometry.
    pub fn read_id(&mut self, config: &NandConfig) -> NandId {
        self.reset();

        self.bus.enable();
        self.bus.command(opcodes::READ_ID);

        self.bus.address_latch(true);
        self.bus.io_write(0);
        self.bus.address_latch(false);

        self.bus.io_input(config.pull_up);
        let mf_id = self.bus.io_read();
        let dev_id = self.bus.io_read();
        let chip_data = self.bus.io_read();
        let size_data = self.bus.io_read();
        let plane_data = self.bus.io_read();

        NandId {
            mf_id,
            dev_id,
            chip_data,
            size_data,
            plane_data,
        }
    }

    /// Read one chunk of a page into `buf`.
    ///
    /// The first chunk addresses the chip: select, read cycle 1, address
    /// cycles, then either the configured fixed delay or the read cycle 2
    /// command (mutually exclusive), and a ready/busy wait. Later chunks of
    /// the same page clock data straight out - the chip stays in its
    /// streaming-read state until reset or re-addressed.
    ///
    /// Returns false when the ready/busy wait timed out; the data bytes are
    /// read regardless, so the caller decides what a timeout means.
    pub fn read_page(
        &mut self,
        config: &NandConfig,
        page: &PageAddress,
        buf: &mut [u8],
        first_chunk: bool,
    ) -> bool {
        let mut ready = true;

        if first_chunk {
            self.bus.enable();
            self.bus.command(opcodes::READ_CYCLE1);

            self.bus.address_latch(true);
            for &byte in page.cycles() {
                self.bus.io_write(byte);
            }
            self.bus.address_latch(false);

            if config.read_delay_us != 0 {
                self.bus.delay_us(config.read_delay_us);
            } else {
                self.bus.command(opcodes::READ_CYCLE2);
            }

            self.bus.io_input(config.pull_up);
            ready = self.wait_ready();
        }

        for byte in buf.iter_mut() {
            *byte = self.bus.io_read();
        }

        ready
    }
}
