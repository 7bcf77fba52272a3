//! Ledger record model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::{normalize_text_option, parse_timestamp};

/// Local auto-assigned identifier. Never sent to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub i64);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned identifier of a canonical row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub i64);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Money in
    Income,
    /// Money out
    #[default]
    Expense,
}

impl EntryType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Lenient conversion for remote rows: anything but `income` is an expense.
    pub fn from_remote(value: Option<&str>) -> Self {
        match value.map(|value| value.trim().to_ascii_lowercase()) {
            Some(value) if value == "income" => Self::Income,
            _ => Self::Expense,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(Error::InvalidInput(format!(
                "entry type must be `income` or `expense`, got `{other}`"
            ))),
        }
    }
}

/// A ledger entry as entered by the user, before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "type", default)]
    pub entry_type: EntryType,
}

impl NewLedgerEntry {
    /// Build and validate an entry.
    pub fn new(
        description: impl Into<String>,
        amount: Decimal,
        category: Option<String>,
        entry_type: EntryType,
    ) -> Result<Self> {
        Self {
            description: description.into(),
            amount,
            category,
            entry_type,
        }
        .validated()
    }

    /// Normalize text fields and reject malformed shapes.
    pub fn validated(self) -> Result<Self> {
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return Err(Error::InvalidInput(
                "description must not be empty".to_string(),
            ));
        }

        Ok(Self {
            description,
            amount: self.amount,
            category: normalize_text_option(self.category),
            entry_type: self.entry_type,
        })
    }
}

/// One financial transaction in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Local identifier
    pub id: LocalId,
    /// Remote identity once the record is known to the remote store
    pub remote_id: Option<RemoteId>,
    /// Client-minted idempotency key sent with every push
    pub client_ref: Option<Uuid>,
    pub description: String,
    pub amount: Decimal,
    /// Assigned by the remote classifier; may be absent until synced
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub created_at: DateTime<Utc>,
    /// `false` until the remote store has confirmed the record
    pub synced: bool,
}

impl LedgerRecord {
    /// Payload for the remote write contract. Local id and synced flag are never sent.
    pub fn to_remote_entry(&self) -> RemoteEntry {
        RemoteEntry {
            description: self.description.clone(),
            amount: self.amount,
            category: self.category.clone(),
            entry_type: self.entry_type,
            client_ref: self.client_ref,
        }
    }

    /// Amount with the sign implied by the entry type.
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Income => self.amount,
            EntryType::Expense => -self.amount,
        }
    }

    /// Apply a partial update. Fields absent from the patch are retained.
    pub fn merge(&mut self, patch: &RecordPatch) {
        if let Some(remote_id) = patch.remote_id {
            self.remote_id = Some(remote_id);
        }
        if let Some(client_ref) = patch.client_ref {
            self.client_ref = Some(client_ref);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(category) = &patch.category {
            self.category = Some(category.clone());
        }
        if let Some(entry_type) = patch.entry_type {
            self.entry_type = entry_type;
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
        if let Some(synced) = patch.synced {
            self.synced = synced;
        }
    }
}

/// Record fields awaiting their first write (no local id yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub remote_id: Option<RemoteId>,
    pub client_ref: Option<Uuid>,
    pub entry: NewLedgerEntry,
    pub created_at: DateTime<Utc>,
    pub synced: bool,
}

impl PendingRecord {
    /// A freshly entered, not yet synced record with its own idempotency key.
    pub fn unsynced(entry: NewLedgerEntry, created_at: DateTime<Utc>) -> Self {
        Self {
            remote_id: None,
            client_ref: Some(Uuid::now_v7()),
            entry,
            created_at,
            synced: false,
        }
    }
}

/// Partial record: every field optional, `None` means "keep".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub remote_id: Option<RemoteId>,
    pub client_ref: Option<Uuid>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub entry_type: Option<EntryType>,
    pub created_at: Option<DateTime<Utc>>,
    pub synced: Option<bool>,
}

impl RecordPatch {
    /// Validate text fields the same way `NewLedgerEntry` does.
    pub fn validated(self) -> Result<Self> {
        let description = match self.description {
            Some(description) => {
                let trimmed = description.trim().to_string();
                if trimmed.is_empty() {
                    return Err(Error::InvalidInput(
                        "description must not be empty".to_string(),
                    ));
                }
                Some(trimmed)
            }
            None => None,
        };

        Ok(Self {
            description,
            category: normalize_text_option(self.category),
            ..self
        })
    }
}

impl From<&CanonicalRecord> for RecordPatch {
    /// `{...canonical, synced: true}`
    fn from(record: &CanonicalRecord) -> Self {
        Self {
            remote_id: Some(record.id),
            client_ref: record.client_ref,
            description: Some(record.description.clone()),
            amount: Some(record.amount),
            category: record.category.clone(),
            entry_type: Some(record.entry_type),
            created_at: Some(record.created_at),
            synced: Some(true),
        }
    }
}

/// Body of the remote write contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<Uuid>,
}

/// The remote store's authoritative version of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: RemoteId,
    pub description: String,
    pub amount: Decimal,
    #[serde(default, deserialize_with = "deserialize_category")]
    pub category: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "deserialize_entry_type")]
    pub entry_type: EntryType,
    #[serde(deserialize_with = "deserialize_created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub client_ref: Option<Uuid>,
}

fn deserialize_category<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(normalize_text_option(Option::<String>::deserialize(
        deserializer,
    )?))
}

fn deserialize_entry_type<'de, D>(deserializer: D) -> std::result::Result<EntryType, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(EntryType::from_remote(value.as_deref()))
}

fn deserialize_created_at<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid created_at timestamp `{raw}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn sample_record() -> LedgerRecord {
        LedgerRecord {
            id: LocalId(1),
            remote_id: None,
            client_ref: None,
            description: "coffee".to_string(),
            amount: dec("4.5"),
            category: None,
            entry_type: EntryType::Expense,
            created_at: Utc.with_ymd_and_hms(2024, 6, 14, 9, 30, 0).unwrap(),
            synced: false,
        }
    }

    #[test]
    fn new_entry_trims_and_rejects_empty_description() {
        let entry =
            NewLedgerEntry::new("  lunch  ", dec("120"), Some("  ".into()), EntryType::Expense)
                .unwrap();
        assert_eq!(entry.description, "lunch");
        assert_eq!(entry.category, None);

        let err = NewLedgerEntry::new("   ", dec("1"), None, EntryType::Income).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn entry_type_parsing() {
        assert_eq!("Income".parse::<EntryType>().unwrap(), EntryType::Income);
        assert_eq!("expense".parse::<EntryType>().unwrap(), EntryType::Expense);
        assert!("transfer".parse::<EntryType>().is_err());

        assert_eq!(EntryType::from_remote(Some("income")), EntryType::Income);
        assert_eq!(EntryType::from_remote(Some("other")), EntryType::Expense);
        assert_eq!(EntryType::from_remote(None), EntryType::Expense);
    }

    #[test]
    fn merge_keeps_fields_missing_from_patch() {
        let mut record = sample_record();
        record.merge(&RecordPatch {
            category: Some("餐飲".to_string()),
            synced: Some(true),
            ..RecordPatch::default()
        });

        assert_eq!(record.description, "coffee");
        assert_eq!(record.amount, dec("4.5"));
        assert_eq!(record.category.as_deref(), Some("餐飲"));
        assert!(record.synced);
    }

    #[test]
    fn merge_is_idempotent() {
        let patch = RecordPatch {
            remote_id: Some(RemoteId(101)),
            amount: Some(dec("5")),
            synced: Some(true),
            ..RecordPatch::default()
        };

        let mut once = sample_record();
        once.merge(&patch);
        let mut twice = once.clone();
        twice.merge(&patch);

        assert_eq!(once, twice);
    }

    #[test]
    fn remote_entry_omits_local_fields() {
        let mut record = sample_record();
        record.client_ref = Some(Uuid::nil());
        let json = serde_json::to_value(record.to_remote_entry()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "description": "coffee",
                "amount": 4.5,
                "type": "expense",
                "client_ref": "00000000-0000-0000-0000-000000000000",
            })
        );
    }

    #[test]
    fn canonical_record_parses_remote_rows_leniently() {
        let row: CanonicalRecord = serde_json::from_value(serde_json::json!({
            "id": 101,
            "description": "coffee",
            "amount": 4.5,
            "category": "餐飲",
            "type": "expense",
            "created_at": "2024-06-15T08:00:00+00:00",
            "embedding": [0.1, 0.2],
        }))
        .unwrap();

        assert_eq!(row.id, RemoteId(101));
        assert_eq!(row.amount, dec("4.5"));
        assert_eq!(row.category.as_deref(), Some("餐飲"));
        assert_eq!(
            row.created_at,
            Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap()
        );
        assert_eq!(row.client_ref, None);

        let sparse: CanonicalRecord = serde_json::from_value(serde_json::json!({
            "id": 7,
            "description": "salary",
            "amount": "3000.00",
            "category": null,
            "type": null,
            "created_at": "2024-06-01T00:00:00",
        }))
        .unwrap();
        assert_eq!(sparse.entry_type, EntryType::Expense);
        assert_eq!(sparse.category, None);
        assert_eq!(sparse.amount, dec("3000.00"));
    }

    #[test]
    fn canonical_patch_marks_synced() {
        let canonical = CanonicalRecord {
            id: RemoteId(101),
            description: "coffee".into(),
            amount: dec("4.5"),
            category: Some("餐飲".into()),
            entry_type: EntryType::Expense,
            created_at: Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap(),
            client_ref: None,
        };

        let patch = RecordPatch::from(&canonical);
        assert_eq!(patch.remote_id, Some(RemoteId(101)));
        assert_eq!(patch.synced, Some(true));
        assert_eq!(patch.client_ref, None);
    }

    #[test]
    fn signed_amount_follows_entry_type() {
        let mut record = sample_record();
        assert_eq!(record.signed_amount(), dec("-4.5"));
        record.entry_type = EntryType::Income;
        assert_eq!(record.signed_amount(), dec("4.5"));
    }
}
