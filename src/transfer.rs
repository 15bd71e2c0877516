// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Core protocol types: node identity, priority, transfer kind, and the
// transfer metadata/record structures shared by the TX and RX pipelines.

use crate::error::TransportError;

/// Monotonic timestamp in microseconds, supplied by the caller. The
/// transport never reads a clock; it only compares values given to it.
pub type Microsecond = u64;

/// Port identifier: a subject ID for messages, a service ID for
/// request/response transfers.
pub type PortId = u16;

/// Transfer identifier, monotonic per (source, kind, port) tuple.
pub type TransferId = u64;

/// Highest subject ID a message transfer may use.
pub const SUBJECT_ID_MAX: PortId = 8191;

/// Highest service ID a request or response transfer may use.
pub const SERVICE_ID_MAX: PortId = 511;

/// Number of distinct transfer kinds.
pub const TRANSFER_KIND_COUNT: usize = 3;

// ---------------------------------------------------------------------------
// Node identity
// ---------------------------------------------------------------------------

/// A concrete node identifier in `0..=65534`.
///
/// The anonymous ("unset") identity is modelled as `Option<NodeId>`: `None`
/// encodes as `0xFFFF` on the wire. This keeps out-of-range node IDs
/// unrepresentable everywhere past the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u16);

impl NodeId {
    /// Largest assignable node ID. `0xFFFF` is reserved for "unset".
    pub const MAX: u16 = 65534;

    /// Wire encoding of the unset node ID.
    pub(crate) const UNSET: u16 = 0xFFFF;

    /// Create a node ID, rejecting the reserved unset value.
    pub const fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX {
            Some(NodeId(value))
        } else {
            None
        }
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    /// Decode a wire-level node ID field. Total on `u16`: every value is
    /// either a concrete ID or the unset marker.
    pub(crate) const fn from_wire(value: u16) -> Option<Self> {
        if value == Self::UNSET {
            None
        } else {
            Some(NodeId(value))
        }
    }

    /// Encode an optional node ID into its wire-level field.
    pub(crate) const fn to_wire(id: Option<Self>) -> u16 {
        match id {
            Some(node) => node.0,
            None => Self::UNSET,
        }
    }
}

impl TryFrom<u16> for NodeId {
    type Error = TransportError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        NodeId::new(value).ok_or(TransportError::InvalidArgument)
    }
}

impl From<NodeId> for u16 {
    fn from(id: NodeId) -> u16 {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Priority and transfer kind
// ---------------------------------------------------------------------------

/// Transfer priority, highest urgency first. The numeric value is carried
/// verbatim in the wire header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Priority {
    Exceptional = 0,
    Immediate = 1,
    Fast = 2,
    High = 3,
    Nominal = 4,
    Low = 5,
    Slow = 6,
    Optional = 7,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Nominal
    }
}

impl TryFrom<u8> for Priority {
    type Error = TransportError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Priority::Exceptional,
            1 => Priority::Immediate,
            2 => Priority::Fast,
            3 => Priority::High,
            4 => Priority::Nominal,
            5 => Priority::Low,
            6 => Priority::Slow,
            7 => Priority::Optional,
            _ => return Err(TransportError::InvalidArgument),
        })
    }
}

/// The three kinds of transfer the bus distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransferKind {
    Message = 0,
    Response = 1,
    Request = 2,
}

impl TransferKind {
    /// Index into per-kind tables.
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// Largest port ID valid for this kind at the API boundary.
    pub const fn max_port_id(self) -> PortId {
        match self {
            TransferKind::Message => SUBJECT_ID_MAX,
            TransferKind::Response | TransferKind::Request => SERVICE_ID_MAX,
        }
    }
}

// ---------------------------------------------------------------------------
// Transfer metadata and records
// ---------------------------------------------------------------------------

/// Everything that identifies a transfer besides its payload.
///
/// `remote_node_id` is the destination for outgoing transfers and the source
/// for incoming ones; `None` is the anonymous identity, valid for broadcast
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferMetadata {
    pub priority: Priority,
    pub transfer_kind: TransferKind,
    pub port_id: PortId,
    pub remote_node_id: Option<NodeId>,
    pub transfer_id: TransferId,
}

/// A fully reassembled incoming transfer.
///
/// The payload buffer was allocated from the transport's payload memory
/// resource and now belongs to the caller; hand it back through
/// [`Transport::reclaim_payload`](crate::Transport::reclaim_payload) once
/// processed.
#[derive(Debug)]
pub struct RxTransfer {
    /// Timestamp of the call that completed the frame header (start of
    /// transfer), as supplied by the caller.
    pub timestamp_usec: Microsecond,
    pub metadata: TransferMetadata,
    /// Received payload, truncated to the subscription extent. The transfer
    /// CRC is verified and stripped; it is never part of this buffer.
    pub payload: Vec<u8>,
}
