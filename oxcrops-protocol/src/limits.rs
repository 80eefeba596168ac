//! Conditions that fail a whole RPC call rather than a single ROP.
//!
//! Which RopIds a server rejects and which output buffer sizes it honours
//! differ between server versions, so both are data.

use crate::error::RpcErrorCode;
use crate::rop_id::ReservedRopIds;
use crate::{DEFAULT_OUTPUT_BUFFER_SIZE, MAX_OUTPUT_BUFFER_SIZE, MIN_OUTPUT_BUFFER_SIZE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcLimits {
    /// RopId bytes rejected before a buffer is sent.
    pub reserved_rop_ids: ReservedRopIds,
    pub min_output_buffer_size: u32,
    pub max_output_buffer_size: u32,
    /// Reject out-of-range output sizes locally instead of letting the
    /// server answer.
    pub enforce_output_buffer_limits: bool,
}

impl Default for RpcLimits {
    fn default() -> Self {
        Self {
            reserved_rop_ids: ReservedRopIds::default(),
            min_output_buffer_size: MIN_OUTPUT_BUFFER_SIZE,
            max_output_buffer_size: MAX_OUTPUT_BUFFER_SIZE,
            enforce_output_buffer_limits: false,
        }
    }
}

impl RpcLimits {
    /// Checks a requested output buffer size.
    ///
    /// Always passes unless `enforce_output_buffer_limits` is set.
    pub fn check_output_size(&self, size: u32) -> Result<(), RpcErrorCode> {
        if !self.enforce_output_buffer_limits {
            return Ok(());
        }
        if size < self.min_output_buffer_size || size > self.max_output_buffer_size {
            return Err(RpcErrorCode::BufferTooSmall);
        }
        Ok(())
    }

    /// Clamps `size` into the accepted range.
    pub fn clamp_output_size(&self, size: u32) -> u32 {
        size.clamp(self.min_output_buffer_size, self.max_output_buffer_size)
    }

    pub fn default_output_size(&self) -> u32 {
        self.clamp_output_size(DEFAULT_OUTPUT_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_size_enforcement() {
        let mut limits = RpcLimits::default();
        assert!(limits.check_output_size(0x10).is_ok());

        limits.enforce_output_buffer_limits = true;
        assert_eq!(
            limits.check_output_size(0x10),
            Err(RpcErrorCode::BufferTooSmall)
        );
        assert!(limits.check_output_size(0x8008).is_ok());
        assert!(limits.check_output_size(0x40000).is_ok());
        assert!(limits.check_output_size(0x40001).is_err());
    }

    #[test]
    fn test_default_reserved_ids() {
        let limits = RpcLimits::default();
        for id in [0x00, 0x28, 0x3C, 0x3D, 0x52, 0x62, 0x65, 0x6A, 0x71, 0x85, 0x8E, 0x94, 0xF8, 0xFA, 0xFD] {
            assert!(limits.reserved_rop_ids.contains(id), "{:#04x}", id);
        }
        for id in [0x01, 0x02, 0x86, 0x89, 0x93, 0xF9, 0xFE, 0xFF] {
            assert!(!limits.reserved_rop_ids.contains(id), "{:#04x}", id);
        }
        assert_eq!(limits.default_output_size(), 0x10008);
    }

    #[test]
    fn test_limits_from_json() {
        let limits: RpcLimits = serde_json::from_str(
            r#"{"reserved_rop_ids": [40], "enforce_output_buffer_limits": true}"#,
        )
        .unwrap();
        assert!(limits.reserved_rop_ids.contains(0x28));
        assert_eq!(limits.reserved_rop_ids.len(), 1);
        assert_eq!(limits.max_output_buffer_size, MAX_OUTPUT_BUFFER_SIZE);
    }
}
