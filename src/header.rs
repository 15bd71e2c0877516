// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The fixed 24-byte frame header.
//
// Layout (offsets in bytes, integers little-endian unless noted):
//
//   0   u8   version (1)
//   1   u8   priority (0..=7)
//   2   u16  source node ID
//   4   u16  destination node ID
//   6   u16  data specifier: bit 15 service-not-message, bit 14
//            request-not-response, low 14 bits port ID
//   8   u64  transfer ID
//   16  u32  frame index + end-of-transfer flag in bit 31
//   20  u16  user data (reserved, zero)
//   22  u16  CRC-16/CCITT-FALSE over bytes 0..22, BIG-endian
//
// Only single-frame transfers exist on this transport, so the flag word is
// always exactly END_OF_TRANSFER on build and must be on parse.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::crc::{HeaderCrc, HEADER_CRC_RESIDUE};
use crate::transfer::{NodeId, PortId, Priority, TransferId, TransferKind, TransferMetadata};

pub(crate) const HEADER_SIZE: usize = 24;
const HEADER_SIZE_NO_CRC: usize = 22;

/// Bytes of CRC-32C trailing the payload inside a frame.
pub(crate) const TRANSFER_CRC_SIZE: usize = 4;
const HEADER_VERSION: u8 = 1;

const SERVICE_NOT_MESSAGE: u16 = 0x8000;
const REQUEST_NOT_RESPONSE: u16 = 0x4000;
const PORT_ID_MASK: u16 = 0x3FFF;
const END_OF_TRANSFER: u32 = 1 << 31;

/// A validated, decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParsedHeader {
    pub priority: Priority,
    pub transfer_kind: TransferKind,
    pub port_id: PortId,
    pub source_node_id: Option<NodeId>,
    pub destination_node_id: Option<NodeId>,
    pub transfer_id: TransferId,
}

/// Why a 24-byte candidate was not a valid header. All of these are
/// quiet-discard conditions on the receive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderError {
    /// CRC residue over the full 24 bytes was non-zero.
    Crc,
    /// Unknown version byte.
    Version,
    /// Priority byte above 7.
    Priority,
    /// Request bit set without the service bit.
    DataSpecifier,
    /// Not a single-frame transfer (frame index non-zero or end-of-transfer
    /// clear).
    FrameIndex,
}

/// Pack the kind and port ID into the data-specifier field.
pub(crate) fn data_specifier(kind: TransferKind, port_id: PortId) -> u16 {
    let snm = match kind {
        TransferKind::Message => 0,
        TransferKind::Response | TransferKind::Request => SERVICE_NOT_MESSAGE,
    };
    let rnr = match kind {
        TransferKind::Request => REQUEST_NOT_RESPONSE,
        _ => 0,
    };
    port_id | snm | rnr
}

/// Serialize a header for an outgoing single-frame transfer.
pub(crate) fn build(
    source_node_id: Option<NodeId>,
    metadata: &TransferMetadata,
    out: &mut [u8; HEADER_SIZE],
) {
    out[0] = HEADER_VERSION;
    out[1] = metadata.priority as u8;
    LittleEndian::write_u16(&mut out[2..4], NodeId::to_wire(source_node_id));
    LittleEndian::write_u16(&mut out[4..6], NodeId::to_wire(metadata.remote_node_id));
    LittleEndian::write_u16(
        &mut out[6..8],
        data_specifier(metadata.transfer_kind, metadata.port_id),
    );
    LittleEndian::write_u64(&mut out[8..16], metadata.transfer_id);
    LittleEndian::write_u32(&mut out[16..20], END_OF_TRANSFER);
    LittleEndian::write_u16(&mut out[20..22], 0);

    let mut crc = HeaderCrc::new();
    crc.digest(&out[..HEADER_SIZE_NO_CRC]);
    BigEndian::write_u16(&mut out[HEADER_SIZE_NO_CRC..], crc.value());
}

/// Validate and decode a 24-byte header candidate.
pub(crate) fn parse(buf: &[u8; HEADER_SIZE]) -> Result<ParsedHeader, HeaderError> {
    // The CRC covers everything including the stored CRC itself, so check
    // it first; field checks on garbage would be meaningless.
    if HeaderCrc::new().digest(buf).value() != HEADER_CRC_RESIDUE {
        return Err(HeaderError::Crc);
    }
    if buf[0] != HEADER_VERSION {
        return Err(HeaderError::Version);
    }
    let priority = Priority::try_from(buf[1]).map_err(|_| HeaderError::Priority)?;

    let specifier = LittleEndian::read_u16(&buf[6..8]);
    let transfer_kind = match (
        specifier & SERVICE_NOT_MESSAGE != 0,
        specifier & REQUEST_NOT_RESPONSE != 0,
    ) {
        (false, false) => TransferKind::Message,
        (true, false) => TransferKind::Response,
        (true, true) => TransferKind::Request,
        (false, true) => return Err(HeaderError::DataSpecifier),
    };

    if LittleEndian::read_u32(&buf[16..20]) != END_OF_TRANSFER {
        return Err(HeaderError::FrameIndex);
    }

    Ok(ParsedHeader {
        priority,
        transfer_kind,
        port_id: specifier & PORT_ID_MASK,
        source_node_id: NodeId::from_wire(LittleEndian::read_u16(&buf[2..4])),
        destination_node_id: NodeId::from_wire(LittleEndian::read_u16(&buf[4..6])),
        transfer_id: LittleEndian::read_u64(&buf[8..16]),
    })
}
