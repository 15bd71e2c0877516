// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The transmit pipeline.
//
// One frame, one buffer: the worst-case encoded size is known up front
// (COBS bound over header + payload + transfer CRC, plus two delimiters),
// so the whole frame is assembled into a single allocation from the payload
// resource and streamed out through the emitter in chunks of at most 255
// bytes. The buffer goes back to the resource on every exit path.

use log::debug;

use crate::cobs::{self, CobsEncoder, FRAME_DELIMITER};
use crate::crc::TransferCrc;
use crate::error::TransportError;
use crate::header::{self, HEADER_SIZE, TRANSFER_CRC_SIZE};
use crate::memory::MemoryResource;
use crate::transfer::TransferMetadata;
use crate::transport::Transport;

/// Largest slice handed to the emitter in one call.
const EMIT_CHUNK_MAX: usize = 255;

impl<P, S> Transport<P, S>
where
    P: MemoryResource,
    S: MemoryResource,
{
    /// Encode and emit one single-frame transfer.
    ///
    /// The emitter is called synchronously with contiguous, non-empty
    /// sub-slices of the frame, in order, each at most 255 bytes. If it
    /// returns `false` the rest of the frame is dropped and `Ok(false)` is
    /// returned; a fully emitted frame returns `Ok(true)`.
    pub fn tx_push<E>(
        &mut self,
        metadata: &TransferMetadata,
        payload: &[u8],
        mut emit: E,
    ) -> Result<bool, TransportError>
    where
        E: FnMut(&[u8]) -> bool,
    {
        if metadata.port_id > metadata.transfer_kind.max_port_id() {
            return Err(TransportError::InvalidArgument);
        }

        // The trailing delimiter rides through the encoder as one more
        // input byte (it may force a fresh chunk slot when the body ends
        // exactly on a chunk boundary), so the body bound covers raw_size
        // + 1; the leading delimiter adds the final byte.
        let raw_size = HEADER_SIZE + payload.len() + TRANSFER_CRC_SIZE;
        let frame_size = cobs::encoded_size(raw_size + 1) + 1;
        let mut buffer = self
            .memory_payload
            .allocate(frame_size)
            .ok_or(TransportError::OutOfMemory)?;
        buffer.resize(frame_size, 0);

        // Leading delimiter, then the COBS body starts one byte in.
        buffer[0] = FRAME_DELIMITER;
        let body = &mut buffer[1..];
        let mut encoder = CobsEncoder::new();

        let mut head = [0u8; HEADER_SIZE];
        header::build(self.node_id(), metadata, &mut head);
        encoder.extend(body, &head);

        if !payload.is_empty() {
            encoder.extend(body, payload);
        }

        let mut crc = TransferCrc::new();
        crc.digest(payload);
        encoder.extend(body, &crc.value().to_le_bytes());

        // The trailing delimiter rides through the encoder: it back-patches
        // the open chunk and stays in place as the frame terminator.
        encoder.push(body, FRAME_DELIMITER);

        let frame_len = 1 + encoder.bytes_written();
        let mut offset = 0;
        while offset < frame_len {
            let end = frame_len.min(offset + EMIT_CHUNK_MAX);
            if !emit(&buffer[offset..end]) {
                debug!(
                    "emitter aborted transfer {} on port {}",
                    metadata.transfer_id, metadata.port_id
                );
                self.memory_payload.reclaim(buffer);
                return Ok(false);
            }
            offset = end;
        }

        self.memory_payload.reclaim(buffer);
        Ok(true)
    }
}
