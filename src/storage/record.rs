use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use lazy_static::lazy_static;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use crate::proto::Blog;
use crate::StoreError;

pub const RECORD_ID_LEN: usize = 12;

lazy_static! {
    /// Per-process random component of every generated id
    static ref PROCESS_UNIQUE: [u8; 5] = rand::thread_rng().gen();
    static ref ID_COUNTER: AtomicU32 = AtomicU32::new(rand::thread_rng().gen_range(0..0x00ff_ffff));
}

/// Store-assigned record identifier.
///
/// Layout: 4-byte big-endian seconds timestamp, 5 process-unique bytes and a
/// 3-byte counter. The canonical text form is 24 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId([u8; RECORD_ID_LEN]);

impl RecordId {
    pub fn generate() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; RECORD_ID_LEN];
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let raw: [u8; RECORD_ID_LEN] = bytes
            .try_into()
            .map_err(|_| StoreError::InvalidId(format!("expected {} bytes, got {}", RECORD_ID_LEN, bytes.len())))?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; RECORD_ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for RecordId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut raw = [0u8; RECORD_ID_LEN];
        hex::decode_to_slice(s, &mut raw).map_err(|e| StoreError::InvalidId(format!("{s:?}: {e}")))?;
        Ok(Self(raw))
    }
}

impl fmt::Display for RecordId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RecordId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "RecordId({})", self.to_hex())
    }
}

impl Serialize for RecordId {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Record fields supplied by a caller, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewRecord {
    pub author_id: String,
    pub title: String,
    pub content: String,
}

impl NewRecord {
    pub fn new(
        author_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author_id: author_id.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn with_id(
        self,
        id: RecordId,
    ) -> Record {
        Record {
            id,
            author_id: self.author_id,
            title: self.title,
            content: self.content,
        }
    }
}

/// A stored record. Serialized as the persisted document shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub author_id: String,
    pub title: String,
    pub content: String,
}

impl Record {
    pub fn fields(&self) -> NewRecord {
        NewRecord {
            author_id: self.author_id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }
}

impl From<Record> for Blog {
    fn from(r: Record) -> Self {
        Blog {
            id: r.id.to_hex(),
            author_id: r.author_id,
            title: r.title,
            content: r.content,
        }
    }
}

impl From<Blog> for NewRecord {
    fn from(b: Blog) -> Self {
        NewRecord {
            author_id: b.author_id,
            title: b.title,
            content: b.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_round_trip_through_hex() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);

        let text = a.to_hex();
        assert_eq!(text.len(), 24);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(text.parse::<RecordId>().unwrap(), a);
    }

    #[test]
    fn parse_accepts_uppercase_hex() {
        let id: RecordId = "65A1F0C2AB12CD34EF567890".parse().unwrap();
        assert_eq!(id.to_hex(), "65a1f0c2ab12cd34ef567890");
    }

    #[test]
    fn parse_rejects_malformed_text() {
        for bad in ["", "abc", "65a1f0c2ab12cd34ef56789", "65a1f0c2ab12cd34ef5678900", "zza1f0c2ab12cd34ef567890"] {
            assert!(matches!(bad.parse::<RecordId>(), Err(StoreError::InvalidId(_))), "{bad:?} should fail");
        }
    }

    #[test]
    fn record_serializes_with_underscore_id() {
        let record = NewRecord::new("a", "t", "c").with_id(RecordId::generate());
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["_id"], serde_json::Value::String(record.id.to_hex()));
        assert_eq!(value["author_id"], "a");
        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn record_converts_to_wire_blog() {
        let record = NewRecord::new("a", "t", "c").with_id(RecordId::generate());
        let blog: Blog = record.clone().into();

        assert_eq!(blog.id, record.id.to_hex());
        assert_eq!(blog.title, "t");
    }
}
