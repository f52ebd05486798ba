//! Command dispatch - the device's top level
//!
//! One packet in, one command handled to completion, one response out.
//! There is no queueing: a second packet arriving mid-command waits in the
//! transport until the current command finishes.

use crate::channel::PacketChannel;
use crate::nand::NandDriver;
use crate::protocol::{
    CapabilityResponse, CmdId, ErrorResponse, NandConfig, PacketHeader, PageAddress,
    PingResponse, ResultCode, CRC32_START, IO_BUFFER_LEN, PROTOCOL_VERSION,
};
use crate::traits::{NandBus, Platform, Transport};
use crate::crc::crc32;

/// Settling delay before an irreversible bootloader/restart action
const SETTLE_MS: u32 = 100;

/// Which optional capabilities this build of the device carries.
///
/// Resolved at device construction and queried at runtime, so the dispatch
/// logic stays uniform across hardware variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Device can jump to its bootloader
    pub bootloader: bool,
    /// Device can restart itself
    pub restart: bool,
}

/// The device: packet channel, flash driver, platform services and the
/// chip configuration, dispatching one command at a time.
pub struct Device<T: Transport, B: NandBus, P: Platform> {
    channel: PacketChannel<T>,
    nand: NandDriver<B>,
    platform: P,
    caps: Capabilities,
    config: NandConfig,
}

impl<T: Transport, B: NandBus, P: Platform> Device<T, B, P> {
    pub fn new(transport: T, bus: B, platform: P, caps: Capabilities) -> Self {
        Self {
            channel: PacketChannel::new(transport),
            nand: NandDriver::new(bus),
            platform,
            caps,
            config: NandConfig::default(),
        }
    }

    /// The currently applied chip configuration
    pub fn config(&self) -> &NandConfig {
        &self.config
    }

    /// Poll and dispatch forever.
    ///
    /// Stale input is discarded whenever the transport comes (back) up,
    /// then packets are handled one at a time as they arrive.
    pub fn run(&mut self) {
        loop {
            self.channel.flush_input();

            while !self.channel.busy() {
                self.poll();
            }
        }
    }

    /// Handle at most one pending packet.
    ///
    /// Any header receive failure is reported to the host as a single
    /// transfer error packet; the fault detail stays in the log.
    pub fn poll(&mut self) {
        if !self.channel.available() {
            return;
        }

        match self.channel.receive_header() {
            Ok(Some(header)) => self.process(&header),
            Ok(None) => {}
            Err(err) => {
                log::debug!("packet receive failed: {}", err);
                self.send_error(ResultCode::Transfer);
            }
        }
    }

    fn process(&mut self, header: &PacketHeader) {
        let result = match CmdId::from_raw(header.cmd) {
            Some(CmdId::Ping) => self.cmd_ping(),
            Some(CmdId::Bootloader) => self.cmd_bootloader(),
            Some(CmdId::Restart) => self.cmd_restart(),
            Some(CmdId::NandIdRead) => {
                let result = self.cmd_nand_id_read();
                self.platform.release_pins();
                result
            }
            Some(CmdId::NandPageRead) => {
                let result = self.cmd_nand_page_read();
                self.platform.release_pins();
                result
            }
            // Page write and block erase are reserved ids with no handler
            _ => ResultCode::Unknown,
        };

        if result != ResultCode::Ok {
            self.send_error(result);
        }
    }

    fn send_error(&mut self, code: ResultCode) {
        let resp = ErrorResponse { code: code as u8 };
        self.channel.send(CmdId::Error, &resp.to_bytes());
    }

    fn cmd_ping(&mut self) -> ResultCode {
        let resp = PingResponse {
            device: self.platform.device_id(),
            version: PROTOCOL_VERSION,
            serial_speed: self.channel.baud_rate(),
            memory_free: self.platform.free_memory(),
        };
        self.channel.send(CmdId::Ping, &resp.to_bytes());
        ResultCode::Ok
    }

    fn cmd_bootloader(&mut self) -> ResultCode {
        let resp = CapabilityResponse {
            supported: self.caps.bootloader,
        };
        self.channel.send(CmdId::Bootloader, &resp.to_bytes());

        if !self.caps.bootloader {
            return ResultCode::NotSupported;
        }

        // Give the response time to leave before the hardware goes away.
        self.platform.sleep_ms(SETTLE_MS);
        self.platform.enter_bootloader();
        ResultCode::Ok
    }

    fn cmd_restart(&mut self) -> ResultCode {
        let resp = CapabilityResponse {
            supported: self.caps.restart,
        };
        self.channel.send(CmdId::Restart, &resp.to_bytes());

        if !self.caps.restart {
            return ResultCode::NotSupported;
        }

        self.platform.sleep_ms(SETTLE_MS);
        self.platform.restart();
        ResultCode::Ok
    }

    /// Read the chip identifier, report it, then block until the host sends
    /// the interpreted chip configuration back.
    ///
    /// The wait has no timeout. Exactly one reply packet is consumed; if its
    /// command id is not the configuration command it is discarded without
    /// feedback and the stored configuration stays as it was.
    fn cmd_nand_id_read(&mut self) -> ResultCode {
        let id = self.nand.read_id(&self.config);
        self.channel.send(CmdId::NandIdRead, &id.to_bytes());

        while !self.channel.available() {}

        let header = match self.channel.receive_header() {
            Ok(Some(header)) => header,
            _ => return ResultCode::Ok,
        };

        let mut raw = [0u8; NandConfig::LEN];
        if self.channel.receive_payload(&mut raw).is_ok()
            && header.cmd == CmdId::NandIdConfig as u16
        {
            self.config = NandConfig::from_bytes(&raw);
            log::debug!(
                "nand: configured raw_page_size={} read_delay_us={} pull_up={}",
                self.config.raw_page_size,
                self.config.read_delay_us,
                self.config.pull_up
            );
        }

        ResultCode::Ok
    }

    /// Stream one raw page back to the host in buffer-sized chunks.
    ///
    /// The response header announces the configured raw page size, then the
    /// data follows with a single CRC32 accumulated across all chunks. An
    /// unconfigured (zero) page size streams nothing but the checksum seed.
    fn cmd_nand_page_read(&mut self) -> ResultCode {
        let mut raw = [0u8; PageAddress::LEN];
        let _ = self.channel.receive_payload(&mut raw);
        let page = PageAddress::from_bytes(&raw);

        let page_size = self.config.raw_page_size;
        self.channel.send_header(CmdId::NandPageRead, page_size);

        let mut buffer = [0u8; IO_BUFFER_LEN];
        let mut crc = CRC32_START;
        let mut sent: u32 = 0;

        while sent < page_size {
            let chunk = (page_size - sent).min(IO_BUFFER_LEN as u32) as usize;

            self.nand
                .read_page(&self.config, &page, &mut buffer[..chunk], sent == 0);
            crc = crc32(crc, &buffer[..chunk]);
            self.channel.write_raw(&buffer[..chunk]);

            sent += chunk as u32;
        }
        self.channel.write_raw(&crc.to_le_bytes());
        self.channel.flush_output();

        ResultCode::Ok
    }
}
