// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Subscription registry and per-source reception sessions.
//
// Subscriptions are keyed by (transfer kind, port ID); within a kind they
// live in an ordered map on the port ID. Each subscription owns a session
// table keyed by source node ID — sessions for different sources are fully
// independent, so two nodes publishing on the same subject never disturb
// each other's reassembly.

use std::collections::BTreeMap;
use std::mem;

use crate::crc::TransferCrc;
use crate::transfer::{Microsecond, PortId, TransferId, TRANSFER_KIND_COUNT};

/// Reassembly state for one (subscription, source node) pair.
///
/// The payload buffer comes from the transport's payload resource; `lease`
/// is the record-sized block held from the session resource for the lifetime
/// of this session, which is how a pool-backed resource caps the number of
/// concurrent sessions.
#[derive(Debug)]
pub(crate) struct RxSession {
    /// Timestamp of the call that validated this transfer's header.
    pub transfer_timestamp_usec: Microsecond,
    /// Transfer ID latched from the header; a different ID restarts the
    /// session.
    pub transfer_id: TransferId,
    /// Every payload byte seen, including those dropped by truncation.
    pub total_payload_size: usize,
    /// Stored bytes, bounded by the subscription extent.
    pub payload: Vec<u8>,
    /// Running CRC over the untruncated byte stream.
    pub crc: TransferCrc,
    pub lease: Vec<u8>,
}

impl RxSession {
    /// Bytes charged against the session memory resource per live session.
    pub(crate) const fn record_size() -> usize {
        mem::size_of::<RxSession>()
    }
}

/// Caller intent to receive one (kind, port) combination.
#[derive(Debug)]
pub struct RxSubscription {
    port_id: PortId,
    extent: usize,
    transfer_id_timeout_usec: Microsecond,
    pub(crate) sessions: BTreeMap<u16, RxSession>,
}

impl RxSubscription {
    pub(crate) fn new(
        port_id: PortId,
        extent: usize,
        transfer_id_timeout_usec: Microsecond,
    ) -> Self {
        RxSubscription {
            port_id,
            extent,
            transfer_id_timeout_usec,
            sessions: BTreeMap::new(),
        }
    }

    pub fn port_id(&self) -> PortId {
        self.port_id
    }

    /// Maximum payload bytes retained per transfer; the excess is truncated
    /// but still CRC-checked.
    pub fn extent(&self) -> usize {
        self.extent
    }

    pub fn transfer_id_timeout_usec(&self) -> Microsecond {
        self.transfer_id_timeout_usec
    }

    /// Number of sources with reassembly state under this subscription.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// One ordered port-ID map per transfer kind.
pub(crate) type SubscriptionTable = [BTreeMap<PortId, RxSubscription>; TRANSFER_KIND_COUNT];
