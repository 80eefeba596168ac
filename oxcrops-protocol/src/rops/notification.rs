//! Notification subscription.
//!
//! Notify and Pending only travel server to client and stay untyped.

use super::{
    status_response, DecodeContext, HandleSlots, RopRequestBody, RopStructure,
};
use crate::error::ProtocolError;
use crate::rop_id::RopId;
use crate::wire::{Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// NotificationTypes bits.
pub mod notification_types {
    pub const NEW_MAIL: u8 = 0x02;
    pub const OBJECT_CREATED: u8 = 0x04;
    pub const OBJECT_DELETED: u8 = 0x08;
    pub const OBJECT_MODIFIED: u8 = 0x10;
    pub const OBJECT_MOVED: u8 = 0x20;
    pub const OBJECT_COPIED: u8 = 0x40;
    pub const SEARCH_COMPLETE: u8 = 0x80;
}

/// What a subscription watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum NotificationScope {
    WholeStore,
    /// A folder, or one message in it when `message_id` is nonzero.
    Object { folder_id: u64, message_id: u64 },
}

/// Subscribes to notifications; the subscription lives as long as the
/// output handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterNotificationRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub notification_types: u8,
    pub reserved: u8,
    pub scope: NotificationScope,
}

impl RopStructure for RegisterNotificationRequest {
    const ROP_ID: RopId = RopId::RegisterNotification;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u8(self.notification_types);
        buf.put_u8(self.reserved);
        match self.scope {
            NotificationScope::WholeStore => buf.put_bool(true),
            NotificationScope::Object {
                folder_id,
                message_id,
            } => {
                buf.put_bool(false);
                buf.put_u64_le(folder_id);
                buf.put_u64_le(message_id);
            }
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let output_handle_index = src.u8("OutputHandleIndex")?;
        let notification_types = src.u8("NotificationTypes")?;
        let reserved = src.u8("Reserved")?;
        let scope = if src.bool("WantWholeStore")? {
            NotificationScope::WholeStore
        } else {
            NotificationScope::Object {
                folder_id: src.u64("FolderId")?,
                message_id: src.u64("MessageId")?,
            }
        };
        Ok(Self {
            logon_id,
            input_handle_index,
            output_handle_index,
            notification_types,
            reserved,
            scope,
        })
    }
}

impl RopRequestBody for RegisterNotificationRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

status_response!(
    RegisterNotificationResponse,
    RopId::RegisterNotification,
    output_handle_index
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rops::test_support::reencode;

    #[test]
    fn test_whole_store_omits_ids() {
        let request = RegisterNotificationRequest {
            logon_id: 0,
            input_handle_index: 0,
            output_handle_index: 1,
            notification_types: notification_types::NEW_MAIL,
            reserved: 0,
            scope: NotificationScope::WholeStore,
        };
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        assert_eq!(bytes.len(), 6);
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_object_scope_carries_ids() {
        let request = RegisterNotificationRequest {
            logon_id: 0,
            input_handle_index: 0,
            output_handle_index: 1,
            notification_types: notification_types::OBJECT_CREATED
                | notification_types::OBJECT_DELETED,
            reserved: 0,
            scope: NotificationScope::Object {
                folder_id: 0x0001_0000_0000_0005,
                message_id: 0,
            },
        };
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        assert_eq!(bytes.len(), 6 + 16);
        assert_eq!(bytes[5], 0);
        assert_eq!(decoded, request);
        assert_eq!(decoded.handle_slots(), HandleSlots::input_output(0, 1));
    }
}
