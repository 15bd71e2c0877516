// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Pure Rust implementation of the Cyphal/Serial transport: single-frame
// message and service transfers over any byte-oriented point-to-point link
// (UART, USB CDC, TCP). Frames are COBS-encoded and zero-delimited; a
// 24-byte CRC-protected header carries routing metadata and a CRC-32C
// trails the payload.
//
// The transport is deliberately link-agnostic and allocation-explicit:
// outgoing bytes stream through an emitter callback, incoming bytes are fed
// in through caller-sized windows, and all buffers come from two injected
// memory resources. One `Transport` instance is single-threaded and
// cooperative; serialize access externally.

pub mod cobs;
pub mod memory;

mod crc;
mod error;
mod header;
mod rx;
mod subscription;
mod transfer;
mod transport;
mod tx;

pub use error::TransportError;
pub use rx::{Reassembler, RxAccept};
pub use subscription::RxSubscription;
pub use transfer::{
    Microsecond, NodeId, PortId, Priority, RxTransfer, TransferId, TransferKind,
    TransferMetadata, SERVICE_ID_MAX, SUBJECT_ID_MAX, TRANSFER_KIND_COUNT,
};
pub use transport::Transport;
