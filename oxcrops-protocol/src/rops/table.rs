//! Table ROPs.
//!
//! QueryRows rows carry no per-cell tags; they are laid out against the
//! column set a SetColumns established on the same table. The codec
//! tracks that set within a buffer and the session remembers it across
//! buffers; either way it reaches the decoder through [`DecodeContext`].

use super::{
    input_only_request, status_response, DecodeContext, HandleSlots, RopOutcome, RopRequestBody,
    RopResponseBody, RopStructure,
};
use crate::error::ProtocolError;
use crate::property::PropertyRow;
use crate::rop_id::RopId;
use crate::types::PropertyTag;
use crate::wire::{count_u16, Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// TableStatus values.
pub mod table_status {
    pub const COMPLETE: u8 = 0x00;
    pub const SORTING: u8 = 0x09;
    pub const SORT_ERROR: u8 = 0x0A;
    pub const SETTING_COLUMNS: u8 = 0x0B;
    pub const SET_COLUMN_ERROR: u8 = 0x0D;
    pub const RESTRICTING: u8 = 0x0E;
    pub const RESTRICT_ERROR: u8 = 0x0F;
}

/// QueryRowsFlags values.
pub mod query_rows_flags {
    pub const ADVANCE: u8 = 0x00;
    pub const NO_ADVANCE: u8 = 0x01;
    pub const ENABLE_PACKED_BUFFERS: u8 = 0x02;
}

/// Origin of a QueryRows response.
pub mod bookmark {
    pub const BEGINNING: u8 = 0x00;
    pub const CURRENT: u8 = 0x01;
    pub const END: u8 = 0x02;
    /// FindRow only: start at the bookmark sent with the request.
    pub const CUSTOM: u8 = 0x03;
}

/// Declares a response whose success body is a TableStatus byte.
macro_rules! table_status_response {
    ($name:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub input_handle_index: u8,
            /// TableStatus.
            pub outcome: RopOutcome<u8>,
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.input_handle_index);
                self.outcome.encode_with(buf, |status, buf| {
                    buf.put_u8(*status);
                    Ok(())
                })
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    input_handle_index: src.u8("InputHandleIndex")?,
                    outcome: RopOutcome::decode_with(src, |src| src.u8("TableStatus"))?,
                })
            }
        }

        impl RopResponseBody for $name {
            fn handle_index(&self) -> Option<u8> {
                Some(self.input_handle_index)
            }

            fn return_value(&self) -> u32 {
                self.outcome.return_value()
            }
        }
    };
}

// =========================================================================
// Columns and sorting
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetColumnsRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub set_columns_flags: u8,
    pub property_tags: Vec<PropertyTag>,
}

impl SetColumnsRequest {
    pub fn new(logon_id: u8, input_handle_index: u8, property_tags: Vec<PropertyTag>) -> Self {
        Self {
            logon_id,
            input_handle_index,
            set_columns_flags: 0,
            property_tags,
        }
    }
}

impl RopStructure for SetColumnsRequest {
    const ROP_ID: RopId = RopId::SetColumns;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.set_columns_flags);
        PropertyTag::encode_list(&self.property_tags, buf, "PropertyTags")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            set_columns_flags: src.u8("SetColumnsFlags")?,
            property_tags: PropertyTag::decode_list(src, "PropertyTagCount")?,
        })
    }
}

impl RopRequestBody for SetColumnsRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

table_status_response!(SetColumnsResponse, RopId::SetColumns);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub property_tag: PropertyTag,
    /// 0 ascending, 1 descending, 4 maximum, 8 minimum.
    pub order: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortTableRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub sort_table_flags: u8,
    pub categorized_count: u16,
    pub expanded_count: u16,
    pub sort_orders: Vec<SortOrder>,
}

impl RopStructure for SortTableRequest {
    const ROP_ID: RopId = RopId::SortTable;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.sort_table_flags);
        buf.put_u16_le(count_u16(self.sort_orders.len(), "SortOrders")?);
        buf.put_u16_le(self.categorized_count);
        buf.put_u16_le(self.expanded_count);
        for sort in &self.sort_orders {
            sort.property_tag.encode(buf);
            buf.put_u8(sort.order);
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let sort_table_flags = src.u8("SortTableFlags")?;
        let count = src.u16("SortOrderCount")?;
        let categorized_count = src.u16("CategorizedCount")?;
        let expanded_count = src.u16("ExpandedCount")?;
        let sort_orders = (0..count)
            .map(|_| {
                Ok(SortOrder {
                    property_tag: PropertyTag::decode(src)?,
                    order: src.u8("Order")?,
                })
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;
        Ok(Self {
            logon_id,
            input_handle_index,
            sort_table_flags,
            categorized_count,
            expanded_count,
            sort_orders,
        })
    }
}

impl RopRequestBody for SortTableRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

table_status_response!(SortTableResponse, RopId::SortTable);

input_only_request!(QueryColumnsAllRequest, RopId::QueryColumnsAll);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryColumnsAllResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<Vec<PropertyTag>>,
}

impl RopStructure for QueryColumnsAllResponse {
    const ROP_ID: RopId = RopId::QueryColumnsAll;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome
            .encode_with(buf, |tags, buf| PropertyTag::encode_list(tags, buf, "PropertyTags"))
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                PropertyTag::decode_list(src, "PropertyTagCount")
            })?,
        })
    }
}

impl RopResponseBody for QueryColumnsAllResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// Reading rows
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRowsRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub query_rows_flags: u8,
    pub forward_read: bool,
    pub row_count: u16,
}

impl QueryRowsRequest {
    pub fn new(logon_id: u8, input_handle_index: u8, row_count: u16) -> Self {
        Self {
            logon_id,
            input_handle_index,
            query_rows_flags: query_rows_flags::ADVANCE,
            forward_read: true,
            row_count,
        }
    }
}

impl RopStructure for QueryRowsRequest {
    const ROP_ID: RopId = RopId::QueryRows;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.query_rows_flags);
        buf.put_bool(self.forward_read);
        buf.put_u16_le(self.row_count);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            query_rows_flags: src.u8("QueryRowsFlags")?,
            forward_read: src.bool("ForwardRead")?,
            row_count: src.u16("RowCount")?,
        })
    }
}

impl RopRequestBody for QueryRowsRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

/// Rows returned by QueryRows.
///
/// `columns` is not transmitted; it is the column set the rows were laid
/// out against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueriedRows {
    pub origin: u8,
    pub columns: Vec<PropertyTag>,
    pub rows: Vec<PropertyRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRowsResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<QueriedRows>,
}

impl RopStructure for QueryRowsResponse {
    const ROP_ID: RopId = RopId::QueryRows;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |queried, buf| {
            buf.put_u8(queried.origin);
            buf.put_u16_le(count_u16(queried.rows.len(), "RowData")?);
            for row in &queried.rows {
                row.encode(&queried.columns, buf)?;
            }
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let input_handle_index = src.u8("InputHandleIndex")?;
        let outcome = RopOutcome::decode_with(src, |src| {
            let origin = src.u8("Origin")?;
            let row_count = src.u16("RowCount")? as usize;
            let (columns, rows) = decode_rows(src, ctx, input_handle_index, row_count)?;
            Ok(QueriedRows {
                origin,
                columns,
                rows,
            })
        })?;
        Ok(Self {
            input_handle_index,
            outcome,
        })
    }
}

impl RopResponseBody for QueryRowsResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

/// Rows of a ROP answered against the table's current column set. An
/// empty result needs no layout.
fn decode_rows(
    src: &mut Reader,
    ctx: &DecodeContext<'_>,
    input_handle_index: u8,
    row_count: usize,
) -> Result<(Vec<PropertyTag>, Vec<PropertyRow>), ProtocolError> {
    let columns = match (row_count, ctx.columns) {
        (0, None) => &[][..],
        _ => ctx.require_columns(input_handle_index)?,
    };
    let rows = (0..row_count)
        .map(|_| PropertyRow::decode(columns, src))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((columns.to_vec(), rows))
}

// =========================================================================
// Finding rows
// =========================================================================

/// FindRowFlags values.
pub mod find_row_flags {
    pub const FORWARD: u8 = 0x00;
    pub const BACKWARD: u8 = 0x01;
}

/// Searches a table for the next row matching a restriction. The
/// restriction stays in its wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindRowRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub find_row_flags: u8,
    pub restriction: Vec<u8>,
    pub origin: u8,
    /// Only read when `origin` is [`bookmark::CUSTOM`].
    pub bookmark: Vec<u8>,
}

impl RopStructure for FindRowRequest {
    const ROP_ID: RopId = RopId::FindRow;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.find_row_flags);
        buf.put_u16_le(count_u16(self.restriction.len(), "RestrictionData")?);
        buf.put_slice(&self.restriction);
        buf.put_u8(self.origin);
        buf.put_u16_le(count_u16(self.bookmark.len(), "Bookmark")?);
        buf.put_slice(&self.bookmark);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let find_row_flags = src.u8("FindRowFlags")?;
        let size = src.u16("RestrictionDataSize")? as usize;
        let restriction = src.vec(size, "RestrictionData")?;
        let origin = src.u8("Origin")?;
        let size = src.u16("BookmarkSize")? as usize;
        Ok(Self {
            logon_id,
            input_handle_index,
            find_row_flags,
            restriction,
            origin,
            bookmark: src.vec(size, "Bookmark")?,
        })
    }
}

impl RopRequestBody for FindRowRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundRow {
    /// The bookmarked row was deleted and the search began elsewhere.
    pub row_no_longer_visible: bool,
    pub columns: Vec<PropertyTag>,
    /// `None` when nothing matched.
    pub row: Option<PropertyRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindRowResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<FoundRow>,
}

impl RopStructure for FindRowResponse {
    const ROP_ID: RopId = RopId::FindRow;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |found, buf| {
            buf.put_bool(found.row_no_longer_visible);
            buf.put_bool(found.row.is_some());
            if let Some(row) = &found.row {
                row.encode(&found.columns, buf)?;
            }
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let input_handle_index = src.u8("InputHandleIndex")?;
        let outcome = RopOutcome::decode_with(src, |src| {
            let row_no_longer_visible = src.bool("RowNoLongerVisible")?;
            let has_row_data = src.bool("HasRowData")?;
            let (columns, mut rows) =
                decode_rows(src, ctx, input_handle_index, has_row_data as usize)?;
            Ok(FoundRow {
                row_no_longer_visible,
                columns,
                row: rows.pop(),
            })
        })?;
        Ok(Self {
            input_handle_index,
            outcome,
        })
    }
}

impl RopResponseBody for FindRowResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// Categories
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandRowRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    /// Rows to return from the expanded category; zero returns none.
    pub max_row_count: u16,
    pub category_id: u64,
}

impl RopStructure for ExpandRowRequest {
    const ROP_ID: RopId = RopId::ExpandRow;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u16_le(self.max_row_count);
        buf.put_u64_le(self.category_id);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            max_row_count: src.u16("MaxRowCount")?,
            category_id: src.u64("CategoryId")?,
        })
    }
}

impl RopRequestBody for ExpandRowRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedRows {
    /// Rows now visible under the category, returned or not.
    pub expanded_row_count: u32,
    pub columns: Vec<PropertyTag>,
    pub rows: Vec<PropertyRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandRowResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<ExpandedRows>,
}

impl RopStructure for ExpandRowResponse {
    const ROP_ID: RopId = RopId::ExpandRow;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |expanded, buf| {
            buf.put_u32_le(expanded.expanded_row_count);
            buf.put_u16_le(count_u16(expanded.rows.len(), "RowData")?);
            for row in &expanded.rows {
                row.encode(&expanded.columns, buf)?;
            }
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let input_handle_index = src.u8("InputHandleIndex")?;
        let outcome = RopOutcome::decode_with(src, |src| {
            let expanded_row_count = src.u32("ExpandedRowCount")?;
            let row_count = src.u16("RowCount")? as usize;
            let (columns, rows) = decode_rows(src, ctx, input_handle_index, row_count)?;
            Ok(ExpandedRows {
                expanded_row_count,
                columns,
                rows,
            })
        })?;
        Ok(Self {
            input_handle_index,
            outcome,
        })
    }
}

impl RopResponseBody for ExpandRowResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseRowRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub category_id: u64,
}

impl RopStructure for CollapseRowRequest {
    const ROP_ID: RopId = RopId::CollapseRow;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u64_le(self.category_id);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            category_id: src.u64("CategoryId")?,
        })
    }
}

impl RopRequestBody for CollapseRowRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseRowResponse {
    pub input_handle_index: u8,
    /// CollapsedRowCount.
    pub outcome: RopOutcome<u32>,
}

impl RopStructure for CollapseRowResponse {
    const ROP_ID: RopId = RopId::CollapseRow;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |count, buf| {
            buf.put_u32_le(*count);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| src.u32("CollapsedRowCount"))?,
        })
    }
}

impl RopResponseBody for CollapseRowResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// Position and status
// =========================================================================

input_only_request!(QueryPositionRequest, RopId::QueryPosition);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePosition {
    pub numerator: u32,
    pub denominator: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPositionResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<TablePosition>,
}

impl RopStructure for QueryPositionResponse {
    const ROP_ID: RopId = RopId::QueryPosition;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |position, buf| {
            buf.put_u32_le(position.numerator);
            buf.put_u32_le(position.denominator);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                Ok(TablePosition {
                    numerator: src.u32("Numerator")?,
                    denominator: src.u32("Denominator")?,
                })
            })?,
        })
    }
}

impl RopResponseBody for QueryPositionResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRowRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub origin: u8,
    pub row_count: i32,
    pub want_row_moved_count: bool,
}

impl RopStructure for SeekRowRequest {
    const ROP_ID: RopId = RopId::SeekRow;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.origin);
        buf.put_i32_le(self.row_count);
        buf.put_bool(self.want_row_moved_count);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            origin: src.u8("Origin")?,
            row_count: src.i32("RowCount")?,
            want_row_moved_count: src.bool("WantRowMovedCount")?,
        })
    }
}

impl RopRequestBody for SeekRowRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsSought {
    /// Fewer rows were available than requested.
    pub has_sought_less: bool,
    pub rows_sought: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRowResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<RowsSought>,
}

impl RopStructure for SeekRowResponse {
    const ROP_ID: RopId = RopId::SeekRow;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |sought, buf| {
            buf.put_bool(sought.has_sought_less);
            buf.put_i32_le(sought.rows_sought);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                Ok(RowsSought {
                    has_sought_less: src.bool("HasSoughtLess")?,
                    rows_sought: src.i32("RowsSought")?,
                })
            })?,
        })
    }
}

impl RopResponseBody for SeekRowResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

input_only_request!(GetStatusRequest, RopId::GetStatus);
table_status_response!(GetStatusResponse, RopId::GetStatus);

input_only_request!(AbortRequest, RopId::Abort);
table_status_response!(AbortResponse, RopId::Abort);

input_only_request!(ResetTableRequest, RopId::ResetTable);
status_response!(ResetTableResponse, RopId::ResetTable, input_handle_index);

// =========================================================================
// Bookmarks
// =========================================================================

input_only_request!(CreateBookmarkRequest, RopId::CreateBookmark);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBookmarkResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<Vec<u8>>,
}

impl RopStructure for CreateBookmarkResponse {
    const ROP_ID: RopId = RopId::CreateBookmark;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |bookmark, buf| {
            buf.put_u16_le(count_u16(bookmark.len(), "Bookmark")?);
            buf.put_slice(bookmark);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                let size = src.u16("BookmarkSize")? as usize;
                src.vec(size, "Bookmark")
            })?,
        })
    }
}

impl RopResponseBody for CreateBookmarkResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeBookmarkRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub bookmark: Vec<u8>,
}

impl RopStructure for FreeBookmarkRequest {
    const ROP_ID: RopId = RopId::FreeBookmark;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u16_le(count_u16(self.bookmark.len(), "Bookmark")?);
        buf.put_slice(&self.bookmark);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let size = src.u16("BookmarkSize")? as usize;
        Ok(Self {
            logon_id,
            input_handle_index,
            bookmark: src.vec(size, "Bookmark")?,
        })
    }
}

impl RopRequestBody for FreeBookmarkRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(FreeBookmarkResponse, RopId::FreeBookmark, input_handle_index);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRowBookmarkRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub bookmark: Vec<u8>,
    pub row_count: i32,
    pub want_row_moved_count: bool,
}

impl RopStructure for SeekRowBookmarkRequest {
    const ROP_ID: RopId = RopId::SeekRowBookmark;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u16_le(count_u16(self.bookmark.len(), "Bookmark")?);
        buf.put_slice(&self.bookmark);
        buf.put_i32_le(self.row_count);
        buf.put_bool(self.want_row_moved_count);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let size = src.u16("BookmarkSize")? as usize;
        Ok(Self {
            logon_id,
            input_handle_index,
            bookmark: src.vec(size, "Bookmark")?,
            row_count: src.i32("RowCount")?,
            want_row_moved_count: src.bool("WantRowMovedCount")?,
        })
    }
}

impl RopRequestBody for SeekRowBookmarkRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkSought {
    /// The bookmarked row was deleted; seeking started from the next row.
    pub row_no_longer_visible: bool,
    pub has_sought_less: bool,
    pub rows_sought: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRowBookmarkResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<BookmarkSought>,
}

impl RopStructure for SeekRowBookmarkResponse {
    const ROP_ID: RopId = RopId::SeekRowBookmark;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |sought, buf| {
            buf.put_bool(sought.row_no_longer_visible);
            buf.put_bool(sought.has_sought_less);
            buf.put_u32_le(sought.rows_sought);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                Ok(BookmarkSought {
                    row_no_longer_visible: src.bool("RowNoLongerVisible")?,
                    has_sought_less: src.bool("HasSoughtLess")?,
                    rows_sought: src.u32("RowsSought")?,
                })
            })?,
        })
    }
}

impl RopResponseBody for SeekRowBookmarkResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{property_type, PropertyValue};
    use crate::rops::test_support::reencode;

    fn columns() -> Vec<PropertyTag> {
        vec![
            PropertyTag::new(0x6748, property_type::INTEGER64),
            PropertyTag::new(0x3001, property_type::STRING),
        ]
    }

    #[test]
    fn test_query_rows_decoded_against_columns() {
        let columns = columns();
        let response = QueryRowsResponse {
            input_handle_index: 2,
            outcome: RopOutcome::Success(QueriedRows {
                origin: bookmark::CURRENT,
                columns: columns.clone(),
                rows: vec![
                    PropertyRow::Standard(vec![
                        PropertyValue::Integer64(0x0001_0000_0000_0001),
                        PropertyValue::String("Inbox".into()),
                    ]),
                    PropertyRow::Standard(vec![
                        PropertyValue::Integer64(0x0001_0000_0000_0002),
                        PropertyValue::String("Outbox".into()),
                    ]),
                ],
            }),
        };
        let ctx = DecodeContext {
            logons: None,
            columns: Some(&columns),
        };
        let (_, decoded) = reencode(&response, &ctx);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_query_rows_unknown_columns() {
        let columns = columns();
        let response = QueryRowsResponse {
            input_handle_index: 2,
            outcome: RopOutcome::Success(QueriedRows {
                origin: bookmark::BEGINNING,
                columns,
                rows: vec![PropertyRow::Standard(vec![
                    PropertyValue::Integer64(1),
                    PropertyValue::String("x".into()),
                ])],
            }),
        };
        let mut buf = BytesMut::new();
        response.encode_body(&mut buf).unwrap();
        let mut src = Reader::new(buf.freeze());
        assert!(matches!(
            QueryRowsResponse::decode_body(&mut src, &DecodeContext::default()),
            Err(ProtocolError::UnknownColumns(2))
        ));
    }

    #[test]
    fn test_query_rows_empty_needs_no_columns() {
        let response = QueryRowsResponse {
            input_handle_index: 2,
            outcome: RopOutcome::Success(QueriedRows {
                origin: bookmark::END,
                columns: Vec::new(),
                rows: Vec::new(),
            }),
        };
        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4 + 1 + 2);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_sort_table_layout() {
        let request = SortTableRequest {
            logon_id: 0,
            input_handle_index: 1,
            sort_table_flags: 0,
            categorized_count: 0,
            expanded_count: 0,
            sort_orders: vec![SortOrder {
                property_tag: PropertyTag::new(0x0E06, property_type::TIME),
                order: 1,
            }],
        };
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        assert_eq!(bytes.len(), 3 + 6 + 5);
        assert_eq!(u16::from_le_bytes([bytes[3], bytes[4]]), 1);
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_seek_row_response() {
        let response = SeekRowResponse {
            input_handle_index: 0,
            outcome: RopOutcome::Success(RowsSought {
                has_sought_less: true,
                rows_sought: -3,
            }),
        };
        let (_, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_find_row_decoded_against_columns() {
        let columns = columns();
        let response = FindRowResponse {
            input_handle_index: 1,
            outcome: RopOutcome::Success(FoundRow {
                row_no_longer_visible: false,
                columns: columns.clone(),
                row: Some(PropertyRow::Standard(vec![
                    PropertyValue::Integer64(0x0001_0000_0000_0007),
                    PropertyValue::String("Drafts".into()),
                ])),
            }),
        };
        let ctx = DecodeContext {
            logons: None,
            columns: Some(&columns),
        };
        let (_, decoded) = reencode(&response, &ctx);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_find_row_without_match_needs_no_columns() {
        let response = FindRowResponse {
            input_handle_index: 1,
            outcome: RopOutcome::Success(FoundRow {
                row_no_longer_visible: true,
                columns: Vec::new(),
                row: None,
            }),
        };
        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4 + 2);
        assert_eq!(decoded, response);

        let request = FindRowRequest {
            logon_id: 0,
            input_handle_index: 1,
            find_row_flags: find_row_flags::BACKWARD,
            restriction: vec![0x08, 0x03, 0x00, 0x1F, 0x00, 0x37, 0x00],
            origin: bookmark::END,
            bookmark: Vec::new(),
        };
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        assert_eq!(bytes.len(), 3 + 2 + 7 + 1 + 2);
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_expand_row_needs_columns() {
        let columns = columns();
        let response = ExpandRowResponse {
            input_handle_index: 1,
            outcome: RopOutcome::Success(ExpandedRows {
                expanded_row_count: 12,
                columns: columns.clone(),
                rows: vec![PropertyRow::Standard(vec![
                    PropertyValue::Integer64(1),
                    PropertyValue::String("first".into()),
                ])],
            }),
        };
        let ctx = DecodeContext {
            logons: None,
            columns: Some(&columns),
        };
        let (_, decoded) = reencode(&response, &ctx);
        assert_eq!(decoded, response);

        let mut buf = BytesMut::new();
        response.encode_body(&mut buf).unwrap();
        let mut src = Reader::new(buf.freeze());
        assert!(matches!(
            ExpandRowResponse::decode_body(&mut src, &DecodeContext::default()),
            Err(ProtocolError::UnknownColumns(1))
        ));
    }

    #[test]
    fn test_collapse_and_seek_bookmark() {
        let response = CollapseRowResponse {
            input_handle_index: 1,
            outcome: RopOutcome::Success(12),
        };
        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4 + 4);
        assert_eq!(decoded, response);

        let request = SeekRowBookmarkRequest {
            logon_id: 0,
            input_handle_index: 1,
            bookmark: vec![9, 9, 9, 9],
            row_count: -2,
            want_row_moved_count: true,
        };
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        assert_eq!(bytes.len(), 2 + 2 + 4 + 4 + 1);
        assert_eq!(decoded, request);

        let response = SeekRowBookmarkResponse {
            input_handle_index: 1,
            outcome: RopOutcome::Success(BookmarkSought {
                row_no_longer_visible: true,
                has_sought_less: false,
                rows_sought: 2,
            }),
        };
        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4 + 2 + 4);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_bookmark_round_trip() {
        let request = FreeBookmarkRequest {
            logon_id: 0,
            input_handle_index: 1,
            bookmark: vec![1, 2, 3, 4],
        };
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        assert_eq!(bytes.len(), 2 + 2 + 4);
        assert_eq!(decoded, request);
    }
}
