//! Integrity checksums for the wire protocol
//!
//! Both checksums are plain running registers: the caller supplies the seed
//! and may feed data in chunks, so `crc32(crc32(seed, a), b)` equals
//! `crc32(seed, a ++ b)`. There is no final inversion - the register value
//! itself goes on the wire. The polynomials are the reflected ARC (CRC-16)
//! and IEEE (CRC-32) pair; changing either breaks wire compatibility.

const CRC16_POLY: u16 = 0xA001;
const CRC32_POLY: u32 = 0xEDB8_8320;

/// Update a 16-bit CRC register over `bytes`.
pub fn crc16(seed: u16, bytes: &[u8]) -> u16 {
    let mut crc = seed;
    for &byte in bytes {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Update a 32-bit CRC register over `bytes`.
pub fn crc32(seed: u32, bytes: &[u8]) -> u32 {
    let mut crc = seed;
    for &byte in bytes {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ CRC32_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}
