//! [`Transport`] adapter over embedded-io byte streams
//!
//! Lets firmware targets plug any `embedded_io` serial/USB implementation
//! straight into the packet channel. Requires `ReadReady` so the poll loop
//! can ask for pending data without blocking.

use crate::traits::Transport;
use embedded_io::{Read, ReadReady, Write};

/// Wraps an embedded-io stream as a packet transport
pub struct EioTransport<T> {
    inner: T,
    baud: u32,
}

impl<T> EioTransport<T> {
    /// `baud` is only reported in the ping response; it does not configure
    /// the underlying stream.
    pub fn new(inner: T, baud: u32) -> Self {
        Self { inner, baud }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write + ReadReady> Transport for EioTransport<T> {
    fn available(&mut self) -> bool {
        self.inner.read_ready().unwrap_or(false)
    }

    fn busy(&mut self) -> bool {
        false
    }

    fn flush_input(&mut self) {
        let mut scratch = [0u8; 64];
        while self.inner.read_ready().unwrap_or(false) {
            match self.inner.read(&mut scratch) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    }

    fn flush_output(&mut self) {
        let _ = self.inner.flush();
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.inner.read(&mut buf[n..]) {
                Ok(0) | Err(_) => break,
                Ok(k) => n += k,
            }
        }
        n
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        match self.inner.write_all(buf) {
            Ok(()) => buf.len(),
            Err(_) => 0,
        }
    }

    fn baud_rate(&self) -> u32 {
        self.baud
    }
}
