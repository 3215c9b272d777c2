//! Stream-to-frame assembly
//!
//! Transports deliver arbitrary byte chunks. `FrameAssembler` buffers them,
//! resynchronises on the header marker and cuts one frame at a time using
//! the declared length and checksum. Command lookup and payload parsing are
//! left to [`decode`](super::packet::decode).
//!
//! A candidate whose checksum fails gives up only its marker byte, and
//! scanning restarts one byte later. A candidate still waiting for bytes is
//! abandoned the same way as soon as a complete, checksum-valid frame is
//! buffered behind it, so a corrupted length cannot stall the stream.

use crate::error::ProtocolError;

use super::packet::{body_checksum, FRAME_OVERHEAD, HEADER, MAX_PAYLOAD_LEN, PAYLOAD_OFFSET};

/// Default cap on buffered bytes: one maximal frame plus slack
pub const DEFAULT_CAPACITY: usize = MAX_PAYLOAD_LEN + FRAME_OVERHEAD + 1024;

/// Buffers inbound bytes and yields complete candidate frames
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    capacity: usize,
    discarded: u64,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity.min(4096)),
            capacity,
            discarded: 0,
        }
    }

    /// Append received bytes
    ///
    /// If the buffer would exceed its capacity, the oldest bytes are dropped.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > self.capacity {
            let overflow = self.buffer.len() - self.capacity;
            self.buffer.drain(..overflow);
            self.discarded += overflow as u64;
        }
    }

    /// Pop the next complete frame, if any
    ///
    /// Yields `Err(ChecksumMismatch)` once per rejected candidate; the
    /// bytes after its marker stay buffered and are scanned again.
    pub fn next_frame(&mut self) -> Option<Result<Vec<u8>, ProtocolError>> {
        loop {
            self.resync();

            match self.candidate_at(0) {
                Candidate::Valid(total) => return Some(Ok(self.buffer.drain(..total).collect())),
                Candidate::Corrupt { expected, actual } => {
                    self.skip_marker();
                    return Some(Err(ProtocolError::ChecksumMismatch { expected, actual }));
                }
                Candidate::Incomplete if self.valid_frame_behind() => self.skip_marker(),
                Candidate::Incomplete => return None,
            }
        }
    }

    fn candidate_at(&self, offset: usize) -> Candidate {
        let bytes = &self.buffer[offset..];
        if bytes.len() < PAYLOAD_OFFSET {
            return Candidate::Incomplete;
        }

        let declared = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        let total = declared + FRAME_OVERHEAD;
        if bytes.len() < total {
            return Candidate::Incomplete;
        }

        let expected = body_checksum(&bytes[..total - 1]);
        let actual = bytes[total - 1];
        if expected == actual {
            Candidate::Valid(total)
        } else {
            Candidate::Corrupt { expected, actual }
        }
    }

    /// Whether a later marker starts a complete frame with a valid checksum
    fn valid_frame_behind(&self) -> bool {
        (1..self.buffer.len())
            .filter(|&offset| self.buffer[offset] == HEADER)
            .any(|offset| matches!(self.candidate_at(offset), Candidate::Valid(_)))
    }

    fn skip_marker(&mut self) {
        self.buffer.drain(..1);
        self.discarded += 1;
    }

    /// Drop bytes preceding the next header marker
    fn resync(&mut self) {
        match self.buffer.iter().position(|&b| b == HEADER) {
            Some(0) => {}
            Some(offset) => {
                self.buffer.drain(..offset);
                self.discarded += offset as u64;
            }
            None => {
                self.discarded += self.buffer.len() as u64;
                self.buffer.clear();
            }
        }
    }

    /// Bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes thrown away while resynchronising or on overflow
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

enum Candidate {
    Incomplete,
    Valid(usize),
    Corrupt { expected: u8, actual: u8 },
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for FrameAssembler {
    type Item = Result<Vec<u8>, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame()
    }
}
