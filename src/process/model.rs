use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SnapshotError;

/// Status of a pm2-managed process, as reported in `pm2_env.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Online,
    Stopped,
    Errored,
    Unknown,
}

impl ProcessStatus {
    pub fn from_pm2(status: &str) -> Self {
        match status {
            "online" => ProcessStatus::Online,
            "stopped" => ProcessStatus::Stopped,
            "errored" => ProcessStatus::Errored,
            _ => ProcessStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Online => "online",
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Errored => "errored",
            ProcessStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `pm2 jlist`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub name: String,
    pub status: ProcessStatus,
    /// Every other field pm2 reported, untouched
    pub raw: Map<String, Value>,
}

impl ProcessRecord {
    /// Map one jlist element; anything but an object with a string `name` is rejected
    fn from_jlist_entry(index: usize, entry: Value) -> Result<Self, SnapshotError> {
        let Value::Object(mut raw) = entry else {
            return Err(SnapshotError::Parse {
                reason: format!("entry {} is not an object", index),
            });
        };

        let name = match raw.remove("name") {
            Some(Value::String(name)) => name,
            _ => {
                return Err(SnapshotError::Parse {
                    reason: format!("entry {} has no name", index),
                })
            }
        };

        let status = raw
            .get("pm2_env")
            .and_then(|env| env.get("status"))
            .and_then(Value::as_str)
            .map(ProcessStatus::from_pm2)
            .unwrap_or(ProcessStatus::Unknown);

        Ok(Self { name, status, raw })
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    pub fn pm_id(&self) -> Option<u64> {
        self.raw.get("pm_id").and_then(Value::as_u64)
    }

    pub fn pid(&self) -> Option<u64> {
        self.raw.get("pid").and_then(Value::as_u64)
    }

    /// pm2's own status text, which may be finer grained than `status`
    /// ("launching", "stopping", ...)
    pub fn status_label(&self) -> &str {
        self.raw
            .get("pm2_env")
            .and_then(|env| env.get("status"))
            .and_then(Value::as_str)
            .unwrap_or(self.status.as_str())
    }

    /// "name (status)" as shown in the process list
    pub fn title(&self) -> String {
        format!("{} ({})", self.name, self.status_label())
    }
}

/// Point-in-time process list. Either populated (possibly empty) or failed,
/// never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSnapshot {
    records: Vec<ProcessRecord>,
    taken_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_error")]
    error: Option<SnapshotError>,
}

fn serialize_error<S>(error: &Option<SnapshotError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl ProcessSnapshot {
    pub fn loaded(records: Vec<ProcessRecord>) -> Self {
        Self {
            records,
            taken_at: Utc::now(),
            error: None,
        }
    }

    pub fn failed(error: SnapshotError) -> Self {
        Self {
            records: Vec::new(),
            taken_at: Utc::now(),
            error: Some(error),
        }
    }

    pub fn records(&self) -> &[ProcessRecord] {
        &self.records
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn error(&self) -> Option<&SnapshotError> {
        self.error.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse `pm2 jlist` output into records, keeping pm2's order
pub fn parse_jlist(output: &str) -> Result<Vec<ProcessRecord>, SnapshotError> {
    let value: Value = serde_json::from_str(output).map_err(|e| SnapshotError::Parse {
        reason: e.to_string(),
    })?;

    let Value::Array(entries) = value else {
        return Err(SnapshotError::Parse {
            reason: "expected a JSON array".to_string(),
        });
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| ProcessRecord::from_jlist_entry(index, entry))
        .collect()
}
