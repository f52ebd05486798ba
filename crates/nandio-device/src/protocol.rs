//! Wire protocol constants and record layouts
//!
//! One packet is a 12-byte header, optionally followed by a payload and a
//! trailing payload CRC32. All multi-byte fields are little-endian on the
//! wire regardless of the native byte order on either end.
//!
//! This module only knows about layout; reading and writing packets over a
//! transport lives in [`crate::channel`].

use crate::crc::crc16;

/// Protocol version reported in the ping response
pub const PROTOCOL_VERSION: u16 = 1;

/// Packet header magic
pub const PKT_MAGIC: u32 = 0xDEAD_C0DE;

/// Packet header length on the wire
pub const HDR_LEN: usize = 12;
/// Number of leading header bytes covered by the header checksum
pub const HDR_CRC_LEN: usize = 10;
/// Trailing payload checksum length
pub const DATA_CRC_LEN: usize = 4;

/// Seed for the header CRC16
pub const CRC16_START: u16 = 0xA281;
/// Seed for the payload CRC32
pub const CRC32_START: u32 = 0xFFFF_FFFF;

/// Maximum NAND address length in bytes
pub const NAND_ADDR_LEN: usize = 5;

/// Transient buffer size used when streaming page data in chunks
pub const IO_BUFFER_LEN: usize = 4096;

/// Device identifiers reported in the ping response
pub mod device_ids {
    /// Unknown/unspecified device
    pub const UNKNOWN: u8 = 0;
    /// Teensy++ 2.0
    pub const TEENSYPP2: u8 = 1;
    /// Raspberry Pi Pico
    pub const RPI_PICO: u8 = 2;
}

/// Command identifiers
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdId {
    // Device group
    Ping = 0x10,
    Bootloader = 0x11,
    Restart = 0x12,
    // NAND group
    NandIdRead = 0x30,
    /// Host -> device reply carrying the chip configuration
    NandIdConfig = 0x31,
    NandPageRead = 0x32,
    /// Reserved, not implemented
    NandPageWrite = 0x33,
    /// Reserved, not implemented
    NandBlockErase = 0x34,
    /// Device -> host only
    Error = 0xF0,
}

impl CmdId {
    /// Parse a raw command id from a packet header
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0x10 => Some(CmdId::Ping),
            0x11 => Some(CmdId::Bootloader),
            0x12 => Some(CmdId::Restart),
            0x30 => Some(CmdId::NandIdRead),
            0x31 => Some(CmdId::NandIdConfig),
            0x32 => Some(CmdId::NandPageRead),
            0x33 => Some(CmdId::NandPageWrite),
            0x34 => Some(CmdId::NandBlockErase),
            0xF0 => Some(CmdId::Error),
            _ => None,
        }
    }
}

/// Result codes carried by the error response
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok = 0,
    /// Unrecognized command id
    Unknown = 1,
    /// Packet-level receive failure (short read, bad magic, bad header CRC)
    Transfer = 2,
    /// Payload checksum mismatch
    Crc = 3,
    /// Capability not available on this device
    NotSupported = 4,
}

/// Reasons a 12-byte header fails to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    /// Magic did not match
    BadMagic,
    /// Header checksum mismatch
    BadCrc,
}

/// Packet header
///
/// The magic and checksum are produced and validated by the codec; only the
/// command id and payload length are interesting to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Raw command id
    pub cmd: u16,
    /// Payload length in bytes, 0 when the command carries none
    pub data_len: u32,
}

impl PacketHeader {
    /// Encode to the canonical 12-byte wire layout, computing the checksum
    pub fn to_bytes(&self) -> [u8; HDR_LEN] {
        let mut buf = [0u8; HDR_LEN];
        buf[0..4].copy_from_slice(&PKT_MAGIC.to_le_bytes());
        buf[4..6].copy_from_slice(&self.cmd.to_le_bytes());
        buf[6..10].copy_from_slice(&self.data_len.to_le_bytes());
        let crc = crc16(CRC16_START, &buf[..HDR_CRC_LEN]);
        buf[10..12].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decode from the wire, validating magic and checksum
    pub fn from_bytes(buf: &[u8; HDR_LEN]) -> Result<Self, HeaderError> {
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != PKT_MAGIC {
            return Err(HeaderError::BadMagic);
        }
        let crc = u16::from_le_bytes([buf[10], buf[11]]);
        if crc != crc16(CRC16_START, &buf[..HDR_CRC_LEN]) {
            return Err(HeaderError::BadCrc);
        }
        Ok(Self {
            cmd: u16::from_le_bytes([buf[4], buf[5]]),
            data_len: u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]),
        })
    }
}

/// Ping response payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingResponse {
    /// Device identifier, see [`device_ids`]
    pub device: u8,
    /// Protocol version, [`PROTOCOL_VERSION`]
    pub version: u16,
    /// Transport baud rate
    pub serial_speed: u32,
    /// Free memory in bytes
    pub memory_free: u32,
}

impl PingResponse {
    pub const LEN: usize = 11;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[0] = self.device;
        buf[1..3].copy_from_slice(&self.version.to_le_bytes());
        buf[3..7].copy_from_slice(&self.serial_speed.to_le_bytes());
        buf[7..11].copy_from_slice(&self.memory_free.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::LEN]) -> Self {
        Self {
            device: buf[0],
            version: u16::from_le_bytes([buf[1], buf[2]]),
            serial_speed: u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]),
            memory_free: u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]),
        }
    }
}

/// Bootloader/restart response payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityResponse {
    /// Whether the capability is available on this device
    pub supported: bool,
}

impl CapabilityResponse {
    pub const LEN: usize = 1;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        [self.supported as u8]
    }

    pub fn from_bytes(buf: &[u8; Self::LEN]) -> Self {
        Self {
            supported: buf[0] != 0,
        }
    }
}

/// Error response payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Raw result code, see [`ResultCode`]
    pub code: u8,
}

impl ErrorResponse {
    pub const LEN: usize = 1;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        [self.code]
    }

    pub fn from_bytes(buf: &[u8; Self::LEN]) -> Self {
        Self { code: buf[0] }
    }
}

/// NAND identifier response payload
///
/// Raw bytes as clocked out of the chip; interpreting them against a chip
/// database is the host's job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NandId {
    pub mf_id: u8,
    pub dev_id: u8,
    pub chip_data: u8,
    pub size_data: u8,
    pub plane_data: u8,
}

impl NandId {
    pub const LEN: usize = 5;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        [
            self.mf_id,
            self.dev_id,
            self.chip_data,
            self.size_data,
            self.plane_data,
        ]
    }

    pub fn from_bytes(buf: &[u8; Self::LEN]) -> Self {
        Self {
            mf_id: buf[0],
            dev_id: buf[1],
            chip_data: buf[2],
            size_data: buf[3],
            plane_data: buf[4],
        }
    }
}

/// Page address request payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageAddress {
    /// Address cycle bytes, only the first `len` are meaningful
    pub addr: [u8; NAND_ADDR_LEN],
    /// Number of address cycles the chip expects
    pub len: u8,
}

impl PageAddress {
    pub const LEN: usize = NAND_ADDR_LEN + 1;

    /// The address bytes to shift out, clamped to the buffer size
    pub fn cycles(&self) -> &[u8] {
        let len = (self.len as usize).min(NAND_ADDR_LEN);
        &self.addr[..len]
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[..NAND_ADDR_LEN].copy_from_slice(&self.addr);
        buf[NAND_ADDR_LEN] = self.len;
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::LEN]) -> Self {
        let mut addr = [0u8; NAND_ADDR_LEN];
        addr.copy_from_slice(&buf[..NAND_ADDR_LEN]);
        Self {
            addr,
            len: buf[NAND_ADDR_LEN],
        }
    }
}

/// Chip configuration, sent by the host after it interprets the identifier
///
/// Also the process-lifetime configuration every page read consults. The
/// zeroed default stands for "not configured yet": a page read against it
/// streams nothing but a valid empty-payload checksum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NandConfig {
    /// Raw (data + spare) page size in bytes
    pub raw_page_size: u32,
    /// Fixed delay after the address cycles; 0 selects the second read
    /// command cycle instead
    pub read_delay_us: u32,
    /// Pull direction for the I/O lines while reading
    pub pull_up: bool,
}

impl NandConfig {
    pub const LEN: usize = 9;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[0..4].copy_from_slice(&self.raw_page_size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.read_delay_us.to_le_bytes());
        buf[8] = self.pull_up as u8;
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::LEN]) -> Self {
        Self {
            raw_page_size: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            read_delay_us: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            pull_up: buf[8] != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        for cmd in [0x10u16, 0x11, 0x12, 0x30, 0x31, 0x32, 0x33, 0x34, 0xF0] {
            for data_len in [0u32, 1, 6, 2112, 0xFFFF_FFFF] {
                let header = PacketHeader { cmd, data_len };
                let decoded = PacketHeader::from_bytes(&header.to_bytes()).unwrap();
                assert_eq!(decoded, header);
            }
        }
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let mut bytes = PacketHeader {
            cmd: 0x10,
            data_len: 0,
        }
        .to_bytes();
        bytes[3] ^= 0x01;
        assert_eq!(
            PacketHeader::from_bytes(&bytes),
            Err(HeaderError::BadMagic)
        );
    }

    #[test]
    fn test_header_rejects_any_bit_flip() {
        let reference = PacketHeader {
            cmd: 0x32,
            data_len: 2112,
        }
        .to_bytes();
        // Flipping any bit in the checksummed region must be caught either
        // by the magic check or the CRC16.
        for byte in 0..HDR_CRC_LEN {
            for bit in 0..8 {
                let mut corrupt = reference;
                corrupt[byte] ^= 1 << bit;
                assert!(PacketHeader::from_bytes(&corrupt).is_err());
            }
        }
    }

    #[test]
    fn test_header_wire_layout() {
        let bytes = PacketHeader {
            cmd: 0x30,
            data_len: 5,
        }
        .to_bytes();
        assert_eq!(&bytes[0..4], &[0xDE, 0xC0, 0xAD, 0xDE]);
        assert_eq!(&bytes[4..6], &[0x30, 0x00]);
        assert_eq!(&bytes[6..10], &[0x05, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_cmd_id_from_raw() {
        assert_eq!(CmdId::from_raw(0x10), Some(CmdId::Ping));
        assert_eq!(CmdId::from_raw(0x31), Some(CmdId::NandIdConfig));
        assert_eq!(CmdId::from_raw(0xF0), Some(CmdId::Error));
        assert_eq!(CmdId::from_raw(0x00), None);
        assert_eq!(CmdId::from_raw(0x35), None);
    }

    #[test]
    fn test_ping_response_round_trip() {
        let resp = PingResponse {
            device: device_ids::RPI_PICO,
            version: PROTOCOL_VERSION,
            serial_speed: 115_200,
            memory_free: 204_800,
        };
        assert_eq!(PingResponse::from_bytes(&resp.to_bytes()), resp);
    }

    #[test]
    fn test_nand_config_layout() {
        let cfg = NandConfig {
            raw_page_size: 2112,
            read_delay_us: 0,
            pull_up: true,
        };
        let bytes = cfg.to_bytes();
        assert_eq!(&bytes[0..4], &[0x40, 0x08, 0x00, 0x00]);
        assert_eq!(bytes[8], 1);
        assert_eq!(NandConfig::from_bytes(&bytes), cfg);
    }

    #[test]
    fn test_page_address_cycles_clamped() {
        let addr = PageAddress {
            addr: [1, 2, 3, 4, 5],
            len: 3,
        };
        assert_eq!(addr.cycles(), &[1, 2, 3]);

        let oversized = PageAddress {
            addr: [1, 2, 3, 4, 5],
            len: 9,
        };
        assert_eq!(oversized.cycles(), &[1, 2, 3, 4, 5]);
    }
}
