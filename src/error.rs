// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy of the transport.
//
// Only two conditions are reported as errors: arguments the API cannot
// accept, and memory-resource exhaustion. Everything that arrives over the
// wire is untrusted by definition, so malformed frames, CRC mismatches,
// mis-addressed transfers and the like are quiet-discard outcomes surfaced
// through return values, never through this type. The transport stays fully
// usable after any error.

use thiserror::Error;

/// Errors returned by the public transport operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// An argument is outside the range the wire format can carry, e.g. a
    /// subject ID above 8191 or a service ID above 511.
    #[error("argument out of range for the wire format")]
    InvalidArgument,

    /// A memory resource was exhausted. The operation was aborted and any
    /// partial allocations were returned to their resource.
    #[error("memory resource exhausted")]
    OutOfMemory,
}

impl TransportError {
    /// Numeric code of this error, for callers that forward status codes
    /// over FFI or into register maps.
    pub const fn code(self) -> u8 {
        match self {
            TransportError::InvalidArgument => 2,
            TransportError::OutOfMemory => 3,
        }
    }
}
