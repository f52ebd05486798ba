//! nandio-sim - in-memory collaborators for the nandio device engine
//!
//! Provides a simulated NAND chip, a loopback transport with a host-side
//! handle, and a recording platform. Together they let the full dispatcher
//! run on a development machine, for tests and for the TCP simulator.
//!
//! All handles are cheaply cloneable and share state, so a test can keep a
//! handle to inspect or mutate the simulated hardware while the device owns
//! another.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use nandio_device::crc::crc32;
use nandio_device::nand::opcodes;
use nandio_device::protocol::{CmdId, PacketHeader, CRC32_START, DATA_CRC_LEN, HDR_LEN};
use nandio_device::traits::{NandBus, Platform, Transport};

/// Geometry and behavior of the simulated chip
#[derive(Debug, Clone)]
pub struct SimNandConfig {
    /// Identifier bytes served by the read-id command
    pub id: [u8; 5],
    /// Raw page size in bytes (data + spare)
    pub page_size: usize,
    /// Number of pages backed by memory
    pub pages: usize,
    /// Number of leading address cycles interpreted as the column
    pub column_cycles: usize,
}

impl Default for SimNandConfig {
    fn default() -> Self {
        Self {
            // Samsung K9F2G08-style identifier
            id: [0xEC, 0xDA, 0x10, 0x95, 0x44],
            page_size: 2112,
            pages: 64,
            column_cycles: 2,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum ReadTarget {
    #[default]
    None,
    Id,
    Page,
}

struct SimNandState {
    config: SimNandConfig,
    data: Vec<u8>,
    enabled: bool,
    ale: bool,
    input_mode: bool,
    target: ReadTarget,
    addr: Vec<u8>,
    read_pos: Option<usize>,
    id_pos: usize,
    ready: bool,
    commands: Vec<u8>,
    enables: usize,
    waits: usize,
    delay_us_total: u64,
}

/// Simulated NAND chip behind the [`NandBus`] lines
///
/// Tracks the command/address/data sequencing a real chip would see and
/// records it for assertions: command history, chip-enable count, ready/busy
/// polls and accumulated delays.
#[derive(Clone)]
pub struct SimNand(Rc<RefCell<SimNandState>>);

impl SimNand {
    pub fn new(config: SimNandConfig) -> Self {
        let data = vec![0xFF; config.page_size * config.pages];
        Self(Rc::new(RefCell::new(SimNandState {
            config,
            data,
            enabled: false,
            ale: false,
            input_mode: false,
            target: ReadTarget::None,
            addr: Vec::new(),
            read_pos: None,
            id_pos: 0,
            ready: true,
            commands: Vec::new(),
            enables: 0,
            waits: 0,
            delay_us_total: 0,
        })))
    }

    pub fn new_default() -> Self {
        Self::new(SimNandConfig::default())
    }

    /// Fill backing memory starting at `offset`
    pub fn load(&self, offset: usize, bytes: &[u8]) {
        let mut st = self.0.borrow_mut();
        let end = (offset + bytes.len()).min(st.data.len());
        let len = end.saturating_sub(offset);
        st.data[offset..end].copy_from_slice(&bytes[..len]);
    }

    pub fn data(&self) -> Vec<u8> {
        self.0.borrow().data.clone()
    }

    /// Wedge or un-wedge the ready/busy line
    pub fn set_ready(&self, ready: bool) {
        self.0.borrow_mut().ready = ready;
    }

    /// Every command byte latched so far
    pub fn commands(&self) -> Vec<u8> {
        self.0.borrow().commands.clone()
    }

    pub fn enable_count(&self) -> usize {
        self.0.borrow().enables
    }

    pub fn wait_count(&self) -> usize {
        self.0.borrow().waits
    }

    pub fn total_delay_us(&self) -> u64 {
        self.0.borrow().delay_us_total
    }

    /// Resolve the latched address cycles into a byte offset: the leading
    /// `column_cycles` bytes are the little-endian column, the rest the
    /// little-endian row (page number).
    fn locate(st: &mut SimNandState) {
        let split = st.config.column_cycles.min(st.addr.len());
        let mut column: usize = 0;
        for (i, &b) in st.addr[..split].iter().enumerate() {
            column |= (b as usize) << (8 * i);
        }
        let mut row: usize = 0;
        for (i, &b) in st.addr[split..].iter().enumerate() {
            row |= (b as usize) << (8 * i);
        }
        st.read_pos = Some(row * st.config.page_size + column);
    }
}

impl NandBus for SimNand {
    fn enable(&mut self) {
        let mut st = self.0.borrow_mut();
        st.enabled = true;
        st.input_mode = false;
        st.enables += 1;
    }

    fn disable(&mut self) {
        self.0.borrow_mut().enabled = false;
    }

    fn command(&mut self, cmd: u8) {
        let mut st = self.0.borrow_mut();
        st.commands.push(cmd);
        match cmd {
            opcodes::RESET => {
                st.target = ReadTarget::None;
                st.addr.clear();
                st.read_pos = None;
                st.id_pos = 0;
            }
            opcodes::READ_ID => {
                st.target = ReadTarget::Id;
                st.addr.clear();
                st.id_pos = 0;
            }
            opcodes::READ_CYCLE1 => {
                st.target = ReadTarget::Page;
                st.addr.clear();
                st.read_pos = None;
            }
            opcodes::READ_CYCLE2 => {
                Self::locate(&mut st);
            }
            _ => {}
        }
    }

    fn address_latch(&mut self, high: bool) {
        self.0.borrow_mut().ale = high;
    }

    fn io_input(&mut self, _pull_up: bool) {
        self.0.borrow_mut().input_mode = true;
    }

    fn io_output(&mut self) {
        self.0.borrow_mut().input_mode = false;
    }

    fn io_write(&mut self, byte: u8) {
        let mut st = self.0.borrow_mut();
        if st.ale {
            st.addr.push(byte);
        }
    }

    fn io_read(&mut self) -> u8 {
        let mut st = self.0.borrow_mut();
        match st.target {
            ReadTarget::Id => {
                let byte = st.config.id.get(st.id_pos).copied().unwrap_or(0);
                st.id_pos += 1;
                byte
            }
            ReadTarget::Page => {
                // Delay-based reads never see the second read cycle, so the
                // address resolves lazily on the first data strobe.
                if st.read_pos.is_none() {
                    Self::locate(&mut st);
                }
                let pos = st.read_pos.unwrap_or(0);
                let byte = st.data.get(pos).copied().unwrap_or(0xFF);
                st.read_pos = Some(pos + 1);
                byte
            }
            ReadTarget::None => 0xFF,
        }
    }

    fn wait_ready(&mut self, _timeout_ms: u32) -> bool {
        let mut st = self.0.borrow_mut();
        st.waits += 1;
        st.ready
    }

    fn delay_us(&mut self, us: u32) {
        self.0.borrow_mut().delay_us_total += us as u64;
    }
}

struct Wires {
    to_device: VecDeque<u8>,
    to_host: VecDeque<u8>,
    output_flushes: usize,
    baud: u32,
}

/// Device side of the loopback byte pipe
#[derive(Clone)]
pub struct SimTransport(Rc<RefCell<Wires>>);

/// Host side of the loopback byte pipe
///
/// Frames outgoing packets and parses/validates incoming ones, so tests
/// speak the wire format without re-implementing it.
#[derive(Clone)]
pub struct SimHost(Rc<RefCell<Wires>>);

/// Create a connected transport/host pair
pub fn wire_pair() -> (SimTransport, SimHost) {
    let wires = Rc::new(RefCell::new(Wires {
        to_device: VecDeque::new(),
        to_host: VecDeque::new(),
        output_flushes: 0,
        baud: 115_200,
    }));
    (SimTransport(wires.clone()), SimHost(wires))
}

impl Transport for SimTransport {
    fn available(&mut self) -> bool {
        !self.0.borrow().to_device.is_empty()
    }

    fn busy(&mut self) -> bool {
        false
    }

    fn flush_input(&mut self) {
        self.0.borrow_mut().to_device.clear();
    }

    fn flush_output(&mut self) {
        self.0.borrow_mut().output_flushes += 1;
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut wires = self.0.borrow_mut();
        let mut n = 0;
        while n < buf.len() {
            match wires.to_device.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        self.0.borrow_mut().to_host.extend(buf.iter().copied());
        buf.len()
    }

    fn baud_rate(&self) -> u32 {
        self.0.borrow().baud
    }
}

impl SimHost {
    /// Queue a framed packet for the device
    pub fn send_packet(&self, cmd: CmdId, payload: Option<&[u8]>) {
        let mut wires = self.0.borrow_mut();
        let header = PacketHeader {
            cmd: cmd as u16,
            data_len: payload.map_or(0, |p| p.len() as u32),
        };
        wires.to_device.extend(header.to_bytes());
        if let Some(payload) = payload {
            wires.to_device.extend(payload.iter().copied());
            let crc = crc32(CRC32_START, payload);
            wires.to_device.extend(crc.to_le_bytes());
        }
    }

    /// Queue raw bytes for the device (for corruption tests)
    pub fn send_raw(&self, bytes: &[u8]) {
        self.0.borrow_mut().to_device.extend(bytes.iter().copied());
    }

    /// Parse one packet from the device, validating both checksums.
    ///
    /// Returns None when no complete, well-formed packet is buffered.
    pub fn recv_packet(&self) -> Option<(PacketHeader, Vec<u8>)> {
        let mut wires = self.0.borrow_mut();
        if wires.to_host.len() < HDR_LEN {
            return None;
        }

        let mut hdr_buf = [0u8; HDR_LEN];
        for byte in hdr_buf.iter_mut() {
            *byte = wires.to_host.pop_front()?;
        }
        let header = match PacketHeader::from_bytes(&hdr_buf) {
            Ok(header) => header,
            Err(err) => {
                log::error!("host: bad header from device: {:?}", err);
                return None;
            }
        };

        if header.data_len == 0 {
            return Some((header, Vec::new()));
        }

        let data_len = header.data_len as usize;
        if wires.to_host.len() < data_len + DATA_CRC_LEN {
            return None;
        }
        let payload: Vec<u8> = wires.to_host.drain(..data_len).collect();
        let mut crc_buf = [0u8; DATA_CRC_LEN];
        for byte in crc_buf.iter_mut() {
            *byte = wires.to_host.pop_front()?;
        }
        let received = u32::from_le_bytes(crc_buf);
        let computed = crc32(CRC32_START, &payload);
        if received != computed {
            log::error!(
                "host: payload checksum mismatch ({:08X} vs {:08X})",
                received,
                computed
            );
            return None;
        }

        Some((header, payload))
    }

    /// Bytes queued for the host that have not been parsed yet
    pub fn pending_len(&self) -> usize {
        self.0.borrow().to_host.len()
    }

    /// Drain unparsed bytes from the device, e.g. a streamed checksum after
    /// a zero-length page announcement
    pub fn take_pending(&self) -> Vec<u8> {
        self.0.borrow_mut().to_host.drain(..).collect()
    }

    /// How often the device flushed its outbound buffer
    pub fn output_flushes(&self) -> usize {
        self.0.borrow().output_flushes
    }
}

struct SimPlatformState {
    device_id: u8,
    free_memory: u32,
    bootloader_entered: bool,
    restarted: bool,
    pin_releases: usize,
    slept_ms: u64,
}

/// Recording [`Platform`] implementation
#[derive(Clone)]
pub struct SimPlatform(Rc<RefCell<SimPlatformState>>);

impl SimPlatform {
    pub fn new(device_id: u8) -> Self {
        Self(Rc::new(RefCell::new(SimPlatformState {
            device_id,
            free_memory: 16 * 1024,
            bootloader_entered: false,
            restarted: false,
            pin_releases: 0,
            slept_ms: 0,
        })))
    }

    pub fn set_free_memory(&self, bytes: u32) {
        self.0.borrow_mut().free_memory = bytes;
    }

    pub fn bootloader_entered(&self) -> bool {
        self.0.borrow().bootloader_entered
    }

    pub fn restarted(&self) -> bool {
        self.0.borrow().restarted
    }

    pub fn pin_releases(&self) -> usize {
        self.0.borrow().pin_releases
    }

    pub fn slept_ms(&self) -> u64 {
        self.0.borrow().slept_ms
    }
}

impl Platform for SimPlatform {
    fn device_id(&self) -> u8 {
        self.0.borrow().device_id
    }

    fn free_memory(&self) -> u32 {
        self.0.borrow().free_memory
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.0.borrow_mut().slept_ms += ms as u64;
    }

    fn enter_bootloader(&mut self) {
        self.0.borrow_mut().bootloader_entered = true;
    }

    fn restart(&mut self) {
        self.0.borrow_mut().restarted = true;
    }

    fn release_pins(&mut self) {
        self.0.borrow_mut().pin_releases += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nandio_device::protocol::{NandConfig, PageAddress};
    use nandio_device::NandDriver;

    #[test]
    fn test_read_id_sequence() {
        let chip = SimNand::new_default();
        let mut driver = NandDriver::new(chip.clone());
        let id = driver.read_id(&NandConfig::default());
        assert_eq!(id.to_bytes(), [0xEC, 0xDA, 0x10, 0x95, 0x44]);
        // Reset handshake first, then read-id
        assert_eq!(chip.commands(), vec![opcodes::RESET, opcodes::READ_ID]);
    }

    #[test]
    fn test_page_read_addresses_once() {
        let chip = SimNand::new(SimNandConfig {
            page_size: 32,
            pages: 4,
            column_cycles: 2,
            ..SimNandConfig::default()
        });
        chip.load(2 * 32, &[0xAB; 32]);

        let config = NandConfig {
            raw_page_size: 32,
            read_delay_us: 0,
            pull_up: false,
        };
        // Page 2: column 0, row 2
        let page = PageAddress {
            addr: [0, 0, 2, 0, 0],
            len: 5,
        };

        let mut driver = NandDriver::new(chip.clone());
        let mut first = [0u8; 16];
        let mut second = [0u8; 16];
        assert!(driver.read_page(&config, &page, &mut first, true));
        assert!(driver.read_page(&config, &page, &mut second, false));

        assert_eq!(first, [0xAB; 16]);
        assert_eq!(second, [0xAB; 16]);
        // The second chunk must not re-issue the command sequence
        assert_eq!(
            chip.commands(),
            vec![opcodes::READ_CYCLE1, opcodes::READ_CYCLE2]
        );
        assert_eq!(chip.wait_count(), 1);
    }

    #[test]
    fn test_read_delay_replaces_second_cycle() {
        let chip = SimNand::new(SimNandConfig {
            page_size: 16,
            pages: 2,
            column_cycles: 1,
            ..SimNandConfig::default()
        });
        chip.load(16, b"0123456789abcdef");

        let config = NandConfig {
            raw_page_size: 16,
            read_delay_us: 25,
            pull_up: true,
        };
        let page = PageAddress {
            addr: [0, 1, 0, 0, 0],
            len: 2,
        };

        let mut driver = NandDriver::new(chip.clone());
        let mut buf = [0u8; 16];
        driver.read_page(&config, &page, &mut buf, true);

        assert_eq!(&buf, b"0123456789abcdef");
        assert_eq!(chip.commands(), vec![opcodes::READ_CYCLE1]);
        assert_eq!(chip.total_delay_us(), 25);
    }

    #[test]
    fn test_host_packet_round_trip() {
        let (mut transport, host) = wire_pair();
        host.send_packet(CmdId::Ping, None);

        let mut buf = [0u8; HDR_LEN];
        assert_eq!(transport.read(&mut buf), HDR_LEN);
        let header = PacketHeader::from_bytes(&buf).unwrap();
        assert_eq!(header.cmd, CmdId::Ping as u16);

        transport.write(&PacketHeader { cmd: 0xF0, data_len: 0 }.to_bytes());
        let (reply, payload) = host.recv_packet().unwrap();
        assert_eq!(reply.cmd, 0xF0);
        assert!(payload.is_empty());
    }
}
