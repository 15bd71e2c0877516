// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The receive pipeline.
//
// Incoming bytes run through the COBS decoder and a four-state machine:
//
//   Reject ──delimiter──▶ Delimiter ──first byte──▶ Header ──24 bytes──▶ Payload
//      ▲                                               │                    │
//      └──────────── any invalid header ───────────────┘     delimiter ─────┘
//
// Reject swallows everything until a frame boundary, which is how the
// stream resynchronizes after garbage, a truncated frame, or an unwanted
// transfer. Header accumulates the decoded 24-byte header and validates it;
// Payload accumulates bytes into the reception session (or a transient
// buffer for anonymous transfers) until the closing delimiter, where the
// transfer CRC decides between delivery and quiet discard.
//
// The reassembler is owned by the caller, one per byte stream; sessions are
// keyed by source node under each subscription, so interleaved streams from
// different links need separate reassemblers but share subscriptions.

use log::{debug, trace};

use crate::cobs::{CobsDecoder, Decoded};
use crate::crc::TransferCrc;
use crate::error::TransportError;
use crate::header::{self, HeaderError, ParsedHeader, HEADER_SIZE, TRANSFER_CRC_SIZE};
use crate::memory::MemoryResource;
use crate::subscription::{RxSession, SubscriptionTable};
use crate::transfer::{Microsecond, RxTransfer, TransferMetadata};
use crate::transport::Transport;

/// Outcome of one [`Transport::rx_accept`] call.
#[derive(Debug)]
pub struct RxAccept {
    /// Bytes consumed from the window. When a transfer completed this may
    /// be less than the window length; re-present the remainder.
    pub consumed: usize,
    /// The completed transfer, if the consumed bytes finished one.
    pub transfer: Option<RxTransfer>,
}

/// Byte-stream reassembly state, owned by the caller.
///
/// A fresh reassembler rejects input until the first frame delimiter. To
/// abort whatever is in flight (e.g. after a link reset), replace it with
/// `Reassembler::new()`; any partial payload it holds for an anonymous
/// transfer is dropped with it.
#[derive(Debug)]
pub struct Reassembler {
    decoder: CobsDecoder,
    state: State,
    /// Header bytes latched so far while in the Header state.
    counter: usize,
    header: [u8; HEADER_SIZE],
}

#[derive(Debug)]
enum State {
    Reject,
    Delimiter,
    Header,
    Payload(InFlight),
}

/// Everything known about the frame currently past header validation.
#[derive(Debug)]
struct InFlight {
    header: ParsedHeader,
    /// Start-of-transfer timestamp: the `rx_accept` timestamp of the call
    /// that completed the header.
    timestamp_usec: Microsecond,
    /// Present for anonymous transfers, which are stateless and bypass the
    /// session table.
    anon: Option<AnonAccumulator>,
}

#[derive(Debug)]
struct AnonAccumulator {
    extent: usize,
    total: usize,
    payload: Vec<u8>,
    crc: TransferCrc,
}

impl Reassembler {
    pub fn new() -> Self {
        Reassembler {
            decoder: CobsDecoder::new(),
            state: State::Reject,
            counter: 0,
            header: [0; HEADER_SIZE],
        }
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, S> Transport<P, S>
where
    P: MemoryResource,
    S: MemoryResource,
{
    /// Feed a window of received bytes into the reassembler.
    ///
    /// Bytes are consumed in order. If a transfer completes mid-window the
    /// call returns early with it; the unconsumed tail must be presented
    /// again. `timestamp_usec` stamps any transfer whose header completes
    /// during this call and drives session timeouts.
    ///
    /// # Errors
    ///
    /// [`TransportError::OutOfMemory`] when a memory resource runs dry
    /// while setting up reception state. The frame being received is
    /// discarded and the reassembler resynchronizes at the next delimiter,
    /// so re-presenting the window once memory is available is safe.
    pub fn rx_accept(
        &mut self,
        reassembler: &mut Reassembler,
        timestamp_usec: Microsecond,
        window: &[u8],
    ) -> Result<RxAccept, TransportError> {
        let mut consumed = 0;
        while consumed < window.len() {
            let decoded = reassembler.decoder.feed(window[consumed]);
            consumed += 1;
            if let Some(transfer) = self.rx_step(reassembler, timestamp_usec, decoded)? {
                return Ok(RxAccept {
                    consumed,
                    transfer: Some(transfer),
                });
            }
        }
        Ok(RxAccept {
            consumed,
            transfer: None,
        })
    }

    /// Advance the state machine by one decoder emission.
    fn rx_step(
        &mut self,
        rasm: &mut Reassembler,
        now: Microsecond,
        decoded: Decoded,
    ) -> Result<Option<RxTransfer>, TransportError> {
        // A delimiter always lands the machine in the Delimiter state; what
        // happens on the way out depends on where it was.
        if decoded == Decoded::Delimiter {
            let previous = std::mem::replace(&mut rasm.state, State::Delimiter);
            rasm.counter = 0;
            return Ok(match previous {
                State::Payload(inflight) => self.rx_complete(inflight),
                State::Header => {
                    trace!("frame shorter than a header, discarded");
                    None
                }
                State::Reject | State::Delimiter => None,
            });
        }

        let mut header_done = false;
        let mut lost_session = false;
        match &mut rasm.state {
            // Everything up to the next delimiter is known garbage.
            State::Reject => {}
            State::Delimiter => {
                if let Decoded::Data(byte) = decoded {
                    rasm.header[0] = byte;
                    rasm.counter = 1;
                    rasm.state = State::Header;
                }
            }
            State::Header => {
                if let Decoded::Data(byte) = decoded {
                    rasm.header[rasm.counter] = byte;
                    rasm.counter += 1;
                    header_done = rasm.counter == HEADER_SIZE;
                }
            }
            State::Payload(inflight) => {
                if let Decoded::Data(byte) = decoded {
                    lost_session = !Self::rx_payload_byte(
                        &mut self.subscriptions,
                        inflight,
                        byte,
                    );
                }
            }
        }

        if header_done {
            self.rx_validate_header(rasm, now)?;
        }
        if lost_session {
            // The subscription disappeared under an in-flight transfer.
            rasm.state = State::Reject;
        }
        Ok(None)
    }

    /// Accumulate one payload byte. Returns false when the reception state
    /// for this frame no longer exists.
    fn rx_payload_byte(
        subscriptions: &mut SubscriptionTable,
        inflight: &mut InFlight,
        byte: u8,
    ) -> bool {
        if let Some(acc) = &mut inflight.anon {
            acc.crc.digest_byte(byte);
            acc.total += 1;
            if acc.payload.len() < acc.extent {
                acc.payload.push(byte);
            }
            return true;
        }

        let head = &inflight.header;
        let source = match head.source_node_id {
            Some(source) => source.get(),
            None => return false,
        };
        let Some(subscription) =
            subscriptions[head.transfer_kind.index()].get_mut(&head.port_id)
        else {
            return false;
        };
        let extent = subscription.extent();
        let Some(session) = subscription.sessions.get_mut(&source) else {
            return false;
        };
        session.crc.digest_byte(byte);
        session.total_payload_size += 1;
        if session.payload.len() < extent {
            session.payload.push(byte);
        }
        true
    }

    /// Decide what to do with a fully latched 24-byte header.
    fn rx_validate_header(
        &mut self,
        rasm: &mut Reassembler,
        now: Microsecond,
    ) -> Result<(), TransportError> {
        let parsed = match header::parse(&rasm.header) {
            Ok(parsed) => parsed,
            Err(error) => {
                Self::log_header_error(error);
                rasm.state = State::Reject;
                return Ok(());
            }
        };

        // Addressed transfers must be for this node; broadcast (unset
        // destination) passes regardless of the local identity.
        if let Some(destination) = parsed.destination_node_id {
            if self.node_id() != Some(destination) {
                trace!(
                    "discarding transfer addressed to node {}",
                    destination.get()
                );
                rasm.state = State::Reject;
                return Ok(());
            }
        }

        let (extent, timeout) = match self.subscriptions[parsed.transfer_kind.index()]
            .get(&parsed.port_id)
        {
            Some(subscription) => (
                subscription.extent(),
                subscription.transfer_id_timeout_usec(),
            ),
            None => {
                trace!(
                    "no subscription for {:?} port {}",
                    parsed.transfer_kind,
                    parsed.port_id
                );
                rasm.state = State::Reject;
                return Ok(());
            }
        };

        let source = match parsed.source_node_id {
            None => {
                // Anonymous transfers are stateless: accumulate into a
                // transient buffer instead of a session.
                let Some(payload) = self.memory_payload.allocate(extent) else {
                    *rasm = Reassembler::new();
                    return Err(TransportError::OutOfMemory);
                };
                rasm.state = State::Payload(InFlight {
                    header: parsed,
                    timestamp_usec: now,
                    anon: Some(AnonAccumulator {
                        extent,
                        total: 0,
                        payload,
                        crc: TransferCrc::new(),
                    }),
                });
                return Ok(());
            }
            Some(source) => source.get(),
        };

        // Session assignment. An existing session either belongs to this
        // transfer already (duplicate, drop the frame) or is stale and gets
        // restarted in place.
        let existing = self.subscriptions[parsed.transfer_kind.index()]
            .get(&parsed.port_id)
            .and_then(|subscription| subscription.sessions.get(&source));
        if let Some(session) = existing {
            let fresh = now.wrapping_sub(session.transfer_timestamp_usec) <= timeout;
            if fresh && session.transfer_id == parsed.transfer_id {
                debug!(
                    "duplicate transfer {} from node {}, discarded",
                    parsed.transfer_id, source
                );
                rasm.state = State::Reject;
                return Ok(());
            }
            trace!(
                "restarting session for node {} (transfer {})",
                source,
                parsed.transfer_id
            );
        }

        let Some(lease) = self.memory_session.allocate(RxSession::record_size()) else {
            *rasm = Reassembler::new();
            return Err(TransportError::OutOfMemory);
        };
        let Some(payload) = self.memory_payload.allocate(extent) else {
            self.memory_session.reclaim(lease);
            *rasm = Reassembler::new();
            return Err(TransportError::OutOfMemory);
        };
        let session = RxSession {
            transfer_timestamp_usec: now,
            transfer_id: parsed.transfer_id,
            total_payload_size: 0,
            payload,
            crc: TransferCrc::new(),
            lease,
        };

        let evicted = match self.subscriptions[parsed.transfer_kind.index()]
            .get_mut(&parsed.port_id)
        {
            Some(subscription) => subscription.sessions.insert(source, session),
            None => Some(session),
        };
        if let Some(old) = evicted {
            self.memory_payload.reclaim(old.payload);
            self.memory_session.reclaim(old.lease);
        }

        rasm.state = State::Payload(InFlight {
            header: parsed,
            timestamp_usec: now,
            anon: None,
        });
        Ok(())
    }

    /// Close out a frame on its trailing delimiter: verify the transfer CRC
    /// and either hand the payload to the caller or discard it.
    fn rx_complete(&mut self, inflight: InFlight) -> Option<RxTransfer> {
        let head = inflight.header;
        let (mut payload, total, crc) = match inflight.anon {
            Some(acc) => (acc.payload, acc.total, acc.crc),
            None => {
                let source = head.source_node_id?.get();
                let session = self.subscriptions[head.transfer_kind.index()]
                    .get_mut(&head.port_id)?
                    .sessions
                    .remove(&source)?;
                self.memory_session.reclaim(session.lease);
                (session.payload, session.total_payload_size, session.crc)
            }
        };

        if total < TRANSFER_CRC_SIZE || !crc.residue_ok() {
            debug!(
                "discarding transfer {} on port {}: bad transfer CRC",
                head.transfer_id, head.port_id
            );
            self.memory_payload.reclaim(payload);
            return None;
        }

        // The CRC bytes themselves never reach the application.
        payload.truncate(payload.len().min(total - TRANSFER_CRC_SIZE));
        Some(RxTransfer {
            timestamp_usec: inflight.timestamp_usec,
            metadata: TransferMetadata {
                priority: head.priority,
                transfer_kind: head.transfer_kind,
                port_id: head.port_id,
                remote_node_id: head.source_node_id,
                transfer_id: head.transfer_id,
            },
            payload,
        })
    }

    fn log_header_error(error: HeaderError) {
        match error {
            HeaderError::Crc => debug!("discarding frame: header CRC mismatch"),
            HeaderError::Version => debug!("discarding frame: unknown header version"),
            HeaderError::Priority => debug!("discarding frame: priority out of range"),
            HeaderError::DataSpecifier => {
                debug!("discarding frame: malformed data specifier")
            }
            HeaderError::FrameIndex => {
                debug!("discarding frame: multi-frame transfers not supported")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{NodeId, Priority, TransferKind};

    // COBS-encoded body of a Message header: node 1234 -> 4321, port 1234,
    // nominal priority, transfer-ID 0. The first byte is framing overhead.
    const HEADER_ENC: [u8; 25] = [
        0x09, 0x01, 0x04, 0xD2, 0x04, 0xE1, 0x10, 0xD2, 0x04, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
        0x01, 0x01, 0x01, 0x01, 0x02, 0x80, 0x01, 0x10, 0x4A, 0xD6,
    ];
    const HEADER_RAW: [u8; 24] = [
        0x01, 0x04, 0xD2, 0x04, 0xE1, 0x10, 0xD2, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x4A, 0xD6,
    ];
    // Payload "012345678" plus its little-endian transfer CRC; contains no
    // zero bytes, so it encodes as itself.
    const PAYLOAD_ENC: [u8; 13] = [
        0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0xD2, 0xEE, 0x56, 0xC8,
    ];

    fn feed(
        transport: &mut Transport,
        rasm: &mut Reassembler,
        now: Microsecond,
        byte: u8,
    ) -> Option<RxTransfer> {
        let result = transport.rx_accept(rasm, now, &[byte]).unwrap();
        assert_eq!(result.consumed, 1);
        result.transfer
    }

    #[test]
    fn state_walk_without_subscription() {
        let mut transport = Transport::new();
        transport.set_node_id(NodeId::new(4321));
        let mut rasm = Reassembler::new();
        assert!(matches!(rasm.state, State::Reject));

        // Garbage is ignored until a delimiter.
        for byte in [0x12, 0x34, 0x56, 0x78, 0x01, 0x01, 0xCA, 0xFE] {
            assert!(feed(&mut transport, &mut rasm, 0, byte).is_none());
            assert!(matches!(rasm.state, State::Reject));
            assert_eq!(rasm.counter, 0);
        }

        // Delimiters are idempotent.
        for _ in 0..4 {
            assert!(feed(&mut transport, &mut rasm, 0, 0x00).is_none());
            assert!(matches!(rasm.state, State::Delimiter));
        }

        // The first body byte is COBS overhead and does not leave Delimiter.
        assert!(feed(&mut transport, &mut rasm, 0, HEADER_ENC[0]).is_none());
        assert!(matches!(rasm.state, State::Delimiter));

        // The second byte latches into the header.
        assert!(feed(&mut transport, &mut rasm, 0, HEADER_ENC[1]).is_none());
        assert!(matches!(rasm.state, State::Header));
        assert_eq!(rasm.counter, 1);
        assert_eq!(rasm.header[0], HEADER_ENC[1]);

        for &byte in &HEADER_ENC[2..24] {
            assert!(feed(&mut transport, &mut rasm, 0, byte).is_none());
            assert!(matches!(rasm.state, State::Header));
        }

        // Validated but unsubscribed: drop to Reject with the decoded
        // header preserved.
        assert!(feed(&mut transport, &mut rasm, 0, HEADER_ENC[24]).is_none());
        assert!(matches!(rasm.state, State::Reject));
        assert_eq!(rasm.counter, 24);
        assert_eq!(rasm.header, HEADER_RAW);

        for &byte in &PAYLOAD_ENC {
            assert!(feed(&mut transport, &mut rasm, 0, byte).is_none());
            assert!(matches!(rasm.state, State::Reject));
        }
        assert!(feed(&mut transport, &mut rasm, 0, 0x00).is_none());
        assert!(matches!(rasm.state, State::Delimiter));
    }

    #[test]
    fn state_walk_with_subscription_delivers() {
        let mut transport = Transport::new();
        transport.set_node_id(NodeId::new(4321));
        transport
            .rx_subscribe(TransferKind::Message, 1234, 16, 1000)
            .unwrap();
        let mut rasm = Reassembler::new();

        assert!(feed(&mut transport, &mut rasm, 0, 0x00).is_none());
        for &byte in &HEADER_ENC[..24] {
            assert!(feed(&mut transport, &mut rasm, 0, byte).is_none());
        }

        // Header accepted: payload accumulation begins.
        assert!(feed(&mut transport, &mut rasm, 0, HEADER_ENC[24]).is_none());
        assert!(matches!(rasm.state, State::Payload(_)));
        assert_eq!(rasm.counter, 0);

        for &byte in &PAYLOAD_ENC {
            assert!(feed(&mut transport, &mut rasm, 0, byte).is_none());
            assert!(matches!(rasm.state, State::Payload(_)));
        }

        let transfer = feed(&mut transport, &mut rasm, 1000, 0x00).expect("transfer");
        assert!(matches!(rasm.state, State::Delimiter));
        assert_eq!(transfer.payload, b"012345678");
        assert_eq!(transfer.timestamp_usec, 0);
        assert_eq!(transfer.metadata.priority, Priority::Nominal);
        assert_eq!(transfer.metadata.transfer_kind, TransferKind::Message);
        assert_eq!(transfer.metadata.port_id, 1234);
        assert_eq!(transfer.metadata.remote_node_id, NodeId::new(1234));
        assert_eq!(transfer.metadata.transfer_id, 0);

        // The session was retired on completion.
        let subscription = transport
            .rx_subscription(TransferKind::Message, 1234)
            .unwrap();
        assert_eq!(subscription.session_count(), 0);
    }
}
