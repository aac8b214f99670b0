//! Journal record types and payload encoding.

use crate::error::{CoreError, CoreResult};
use crate::model::{HistoryEntry, MembershipLink, Segment, Slug};
use crate::types::{SequenceNumber, TransactionId, UserId};
use serde::{Deserialize, Serialize};

/// Type byte of a journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JournalRecordType {
    /// Start of a committed batch.
    Begin = 1,
    /// Segment row inserted.
    SegmentPut = 2,
    /// Segment row removed.
    SegmentDelete = 3,
    /// Link row inserted.
    LinkPut = 4,
    /// Link row removed.
    LinkDelete = 5,
    /// History entry appended.
    History = 6,
    /// End of a committed batch.
    Commit = 7,
}

impl JournalRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::SegmentPut),
            3 => Some(Self::SegmentDelete),
            4 => Some(Self::LinkPut),
            5 => Some(Self::LinkDelete),
            6 => Some(Self::History),
            7 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A journal record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalRecord {
    /// Start of a committed batch.
    Begin {
        /// Transaction ID.
        txid: TransactionId,
    },

    /// Segment row inserted.
    SegmentPut {
        /// Transaction ID.
        txid: TransactionId,
        /// The new segment.
        segment: Segment,
    },

    /// Segment row removed.
    SegmentDelete {
        /// Transaction ID.
        txid: TransactionId,
        /// Slug of the removed segment.
        slug: Slug,
    },

    /// Link row inserted.
    LinkPut {
        /// Transaction ID.
        txid: TransactionId,
        /// The new link.
        link: MembershipLink,
    },

    /// Link row removed.
    LinkDelete {
        /// Transaction ID.
        txid: TransactionId,
        /// The user.
        user_id: UserId,
        /// The unlinked slug.
        slug: Slug,
    },

    /// History entry appended.
    History {
        /// Transaction ID.
        txid: TransactionId,
        /// The entry, with its ledger position already assigned.
        entry: HistoryEntry,
    },

    /// End of a committed batch.
    Commit {
        /// Transaction ID.
        txid: TransactionId,
        /// Sequence number assigned to this commit.
        sequence: SequenceNumber,
    },
}

impl JournalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> JournalRecordType {
        match self {
            Self::Begin { .. } => JournalRecordType::Begin,
            Self::SegmentPut { .. } => JournalRecordType::SegmentPut,
            Self::SegmentDelete { .. } => JournalRecordType::SegmentDelete,
            Self::LinkPut { .. } => JournalRecordType::LinkPut,
            Self::LinkDelete { .. } => JournalRecordType::LinkDelete,
            Self::History { .. } => JournalRecordType::History,
            Self::Commit { .. } => JournalRecordType::Commit,
        }
    }

    /// Returns the owning transaction.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        match self {
            Self::Begin { txid }
            | Self::SegmentPut { txid, .. }
            | Self::SegmentDelete { txid, .. }
            | Self::LinkPut { txid, .. }
            | Self::LinkDelete { txid, .. }
            | Self::History { txid, .. }
            | Self::Commit { txid, .. } => *txid,
        }
    }

    /// Serializes the record payload (without envelope).
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CoreError::codec(e.to_string()))?;
        Ok(buf)
    }

    /// Deserializes a record and checks it against the envelope's type byte.
    pub fn decode_payload(record_type: JournalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let record: Self =
            ciborium::from_reader(payload).map_err(|e| CoreError::codec(e.to_string()))?;
        if record.record_type() != record_type {
            return Err(CoreError::journal_corruption(format!(
                "record type byte {:?} does not match payload {:?}",
                record_type,
                record.record_type()
            )));
        }
        Ok(record)
    }
}

/// Computes the CRC-32 (IEEE) of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Operation;
    use chrono::{TimeZone, Utc};

    fn slug(s: &str) -> Slug {
        Slug::parse(s).unwrap()
    }

    #[test]
    fn record_type_bytes() {
        for byte in 1..=7u8 {
            let ty = JournalRecordType::from_byte(byte).unwrap();
            assert_eq!(ty.as_byte(), byte);
        }
        assert!(JournalRecordType::from_byte(0).is_none());
        assert!(JournalRecordType::from_byte(8).is_none());
    }

    #[test]
    fn history_record_payload_decodes() {
        let record = JournalRecord::History {
            txid: TransactionId::new(4),
            entry: HistoryEntry {
                position: 11,
                user_id: UserId::new(1000),
                slug: slug("voice-messages"),
                operation: Operation::Remove,
                timestamp: Utc.with_ymd_and_hms(2023, 8, 30, 12, 0, 0).unwrap(),
            },
        };
        let payload = record.encode_payload().unwrap();
        let decoded = JournalRecord::decode_payload(JournalRecordType::History, &payload).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.txid(), TransactionId::new(4));
    }

    #[test]
    fn mismatched_type_byte_is_corruption() {
        let record = JournalRecord::Begin {
            txid: TransactionId::new(1),
        };
        let payload = record.encode_payload().unwrap();
        let err = JournalRecord::decode_payload(JournalRecordType::Commit, &payload).unwrap_err();
        assert!(matches!(err, CoreError::JournalCorruption { .. }));
    }

    #[test]
    fn garbage_payload_is_codec_error() {
        let err = JournalRecord::decode_payload(JournalRecordType::Begin, &[0xFF, 0x00]).unwrap_err();
        assert!(matches!(err, CoreError::Codec { .. }));
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }
}
