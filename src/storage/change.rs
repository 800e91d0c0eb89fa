use serde::Deserialize;
use serde::Serialize;

use super::Record;
use super::RecordId;

/// Mutation kind recorded in the oplog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Insert,
    Replace,
    Delete,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Insert => "insert",
            OperationType::Replace => "replace",
            OperationType::Delete => "delete",
        }
    }
}

/// Server-side filter applied by [`super::RecordStore::watch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchFilter {
    pub operation_types: Vec<OperationType>,
}

impl WatchFilter {
    pub fn inserts() -> Self {
        Self {
            operation_types: vec![OperationType::Insert],
        }
    }

    /// Matches a raw change document by its `operationType` field.
    pub fn matches(
        &self,
        doc: &serde_json::Value,
    ) -> bool {
        doc.get("operationType")
            .and_then(|v| v.as_str())
            .map(|op| self.operation_types.iter().any(|t| t.as_str() == op))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentKey {
    #[serde(rename = "_id")]
    pub id: RecordId,
}

/// Oplog entry shape, as persisted and as handed to watchers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDocument {
    pub operation_type: OperationType,
    pub document_key: DocumentKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_document: Option<Record>,
}

impl ChangeDocument {
    pub fn insert(record: &Record) -> Self {
        Self::with_document(OperationType::Insert, record)
    }

    pub fn replace(record: &Record) -> Self {
        Self::with_document(OperationType::Replace, record)
    }

    pub fn delete(id: RecordId) -> Self {
        Self {
            operation_type: OperationType::Delete,
            document_key: DocumentKey { id },
            full_document: None,
        }
    }

    fn with_document(
        operation_type: OperationType,
        record: &Record,
    ) -> Self {
        Self {
            operation_type,
            document_key: DocumentKey { id: record.id },
            full_document: Some(record.clone()),
        }
    }
}
