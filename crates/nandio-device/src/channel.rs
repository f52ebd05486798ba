//! Packet channel - whole packets over the transport byte pipe
//!
//! Receiving is split in two: the dispatcher first pulls a header, then -
//! for commands that carry a request payload - the payload plus its trailing
//! checksum. Nothing is retained across calls, so a failed read leaves the
//! channel idle with no partial-packet state.

use crate::crc::crc32;
use crate::error::ChannelError;
use crate::protocol::{
    CmdId, HeaderError, PacketHeader, CRC32_START, DATA_CRC_LEN, HDR_LEN,
};
use crate::traits::Transport;

/// Packet framing over a [`Transport`]
pub struct PacketChannel<T: Transport> {
    transport: T,
}

impl<T: Transport> PacketChannel<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Receive and validate one packet header.
    ///
    /// `Ok(None)` means no data was waiting - not an error. A short read or
    /// a magic mismatch is a transport error; the protocol cannot
    /// resynchronize mid-stream, so the host is expected to resend.
    pub fn receive_header(&mut self) -> Result<Option<PacketHeader>, ChannelError> {
        let mut buf = [0u8; HDR_LEN];
        let n = self.transport.read(&mut buf);
        if n == 0 {
            return Ok(None);
        }
        if n != HDR_LEN {
            log::debug!("rx: short header, {} of {} bytes", n, HDR_LEN);
            return Err(ChannelError::Transport);
        }
        match PacketHeader::from_bytes(&buf) {
            Ok(header) => {
                log::debug!(
                    "rx: cmd=0x{:02X} data_len={}",
                    header.cmd,
                    header.data_len
                );
                Ok(Some(header))
            }
            Err(HeaderError::BadMagic) => {
                log::debug!("rx: bad magic");
                Err(ChannelError::Transport)
            }
            Err(HeaderError::BadCrc) => {
                log::debug!("rx: header checksum mismatch");
                Err(ChannelError::Crc)
            }
        }
    }

    /// Receive a request payload of exactly `buf.len()` bytes plus its
    /// trailing CRC32.
    ///
    /// The checksum is only compared when both segments arrived in full; a
    /// short read succeeds with the buffer left partially filled, and the
    /// host resolves the truncation on its side.
    pub fn receive_payload(&mut self, buf: &mut [u8]) -> Result<(), ChannelError> {
        let data_len = self.transport.read(buf);
        let mut crc_buf = [0u8; DATA_CRC_LEN];
        let crc_len = self.transport.read(&mut crc_buf);

        if data_len == buf.len() && crc_len == DATA_CRC_LEN {
            let received = u32::from_le_bytes(crc_buf);
            let computed = crc32(CRC32_START, buf);
            if received != computed {
                log::debug!(
                    "rx: payload checksum mismatch ({:08X} vs {:08X})",
                    received,
                    computed
                );
                return Err(ChannelError::Crc);
            }
        }

        Ok(())
    }

    /// Send one complete packet: header, payload, payload checksum.
    ///
    /// Fire and forget - there is no acknowledgement at this layer.
    pub fn send(&mut self, cmd: CmdId, payload: &[u8]) {
        let header = PacketHeader {
            cmd: cmd as u16,
            data_len: payload.len() as u32,
        };
        log::debug!("tx: cmd=0x{:02X} data_len={}", header.cmd, header.data_len);
        self.transport.write(&header.to_bytes());
        if !payload.is_empty() {
            let crc = crc32(CRC32_START, payload);
            self.transport.write(payload);
            self.transport.write(&crc.to_le_bytes());
        }
        self.transport.flush_output();
    }

    /// Send a bare header announcing `data_len` payload bytes that will be
    /// streamed separately via [`Self::write_raw`].
    pub fn send_header(&mut self, cmd: CmdId, data_len: u32) {
        let header = PacketHeader {
            cmd: cmd as u16,
            data_len,
        };
        log::debug!("tx: cmd=0x{:02X} data_len={} (streamed)", header.cmd, data_len);
        self.transport.write(&header.to_bytes());
        self.transport.flush_output();
    }

    /// Stream raw payload bytes following a [`Self::send_header`]
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.transport.write(bytes);
    }

    pub fn available(&mut self) -> bool {
        self.transport.available()
    }

    pub fn busy(&mut self) -> bool {
        self.transport.busy()
    }

    pub fn flush_input(&mut self) {
        self.transport.flush_input();
    }

    pub fn flush_output(&mut self) {
        self.transport.flush_output();
    }

    pub fn baud_rate(&self) -> u32 {
        self.transport.baud_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PKT_MAGIC;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct MockTransport {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
        flushes: usize,
    }

    impl MockTransport {
        fn queue(&mut self, bytes: &[u8]) {
            self.rx.extend(bytes);
        }
    }

    impl Transport for MockTransport {
        fn available(&mut self) -> bool {
            !self.rx.is_empty()
        }
        fn busy(&mut self) -> bool {
            false
        }
        fn flush_input(&mut self) {
            self.rx.clear();
        }
        fn flush_output(&mut self) {
            self.flushes += 1;
        }
        fn read(&mut self, buf: &mut [u8]) -> usize {
            let mut n = 0;
            while n < buf.len() {
                match self.rx.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            n
        }
        fn write(&mut self, buf: &[u8]) -> usize {
            self.tx.extend_from_slice(buf);
            buf.len()
        }
        fn baud_rate(&self) -> u32 {
            115_200
        }
    }

    fn channel() -> PacketChannel<MockTransport> {
        PacketChannel::new(MockTransport::default())
    }

    #[test]
    fn test_empty_read_is_not_an_error() {
        let mut ch = channel();
        assert_eq!(ch.receive_header(), Ok(None));
    }

    #[test]
    fn test_short_header_is_transport_error() {
        let mut ch = channel();
        ch.transport.queue(&[0xDE, 0xC0, 0xAD]);
        assert_eq!(ch.receive_header(), Err(ChannelError::Transport));
    }

    #[test]
    fn test_bad_magic_is_transport_error() {
        let mut ch = channel();
        let mut bytes = PacketHeader { cmd: 0x10, data_len: 0 }.to_bytes();
        bytes[0] ^= 0xFF;
        ch.transport.queue(&bytes);
        assert_eq!(ch.receive_header(), Err(ChannelError::Transport));
    }

    #[test]
    fn test_corrupt_header_is_crc_error() {
        let mut ch = channel();
        let mut bytes = PacketHeader { cmd: 0x10, data_len: 0 }.to_bytes();
        bytes[4] ^= 0x01; // command id bit, magic intact
        ch.transport.queue(&bytes);
        assert_eq!(ch.receive_header(), Err(ChannelError::Crc));
    }

    #[test]
    fn test_valid_header_received() {
        let mut ch = channel();
        ch.transport
            .queue(&PacketHeader { cmd: 0x32, data_len: 6 }.to_bytes());
        let header = ch.receive_header().unwrap().unwrap();
        assert_eq!(header.cmd, 0x32);
        assert_eq!(header.data_len, 6);
    }

    #[test]
    fn test_payload_checksum_verified() {
        let payload = [1u8, 2, 3, 4];
        let crc = crc32(CRC32_START, &payload);

        let mut ch = channel();
        ch.transport.queue(&payload);
        ch.transport.queue(&crc.to_le_bytes());
        let mut buf = [0u8; 4];
        assert_eq!(ch.receive_payload(&mut buf), Ok(()));
        assert_eq!(buf, payload);

        let mut ch = channel();
        ch.transport.queue(&payload);
        ch.transport.queue(&(crc ^ 1).to_le_bytes());
        let mut buf = [0u8; 4];
        assert_eq!(ch.receive_payload(&mut buf), Err(ChannelError::Crc));
    }

    #[test]
    fn test_short_payload_skips_checksum() {
        let mut ch = channel();
        ch.transport.queue(&[1, 2]);
        let mut buf = [0u8; 4];
        assert_eq!(ch.receive_payload(&mut buf), Ok(()));
    }

    #[test]
    fn test_send_frames_payload_and_flushes() {
        let mut ch = channel();
        let payload = [0xAAu8; 5];
        ch.send(CmdId::NandIdRead, &payload);

        let wire = &ch.transport.tx;
        assert_eq!(wire.len(), HDR_LEN + payload.len() + DATA_CRC_LEN);
        assert_eq!(
            u32::from_le_bytes([wire[0], wire[1], wire[2], wire[3]]),
            PKT_MAGIC
        );
        assert_eq!(&wire[HDR_LEN..HDR_LEN + 5], &payload);
        let crc = u32::from_le_bytes([wire[17], wire[18], wire[19], wire[20]]);
        assert_eq!(crc, crc32(CRC32_START, &payload));
        assert_eq!(ch.transport.flushes, 1);
    }

    #[test]
    fn test_send_without_payload_omits_checksum() {
        let mut ch = channel();
        ch.send(CmdId::Ping, &[]);
        assert_eq!(ch.transport.tx.len(), HDR_LEN);
        assert_eq!(ch.transport.flushes, 1);
    }
}
