use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::decision::DecisionRecord;
use crate::error::{CloakError, Result};

use super::AuditSink;

/// `prevHash` of the first entry in a log.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

const PREV_HASH_KEY: &str = "prevHash";
const HASH_KEY: &str = "hash";

/// Append-only JSONL audit log with a SHA-256 hash chain.
///
/// Each line is the record's fields followed by `prevHash` and `hash`, where
/// `hash = sha256(prevHash || record fields as stored)`. Editing, dropping or
/// reordering a line breaks every later link.
pub struct JsonlAuditLog {
    path: PathBuf,
    /// Hash of the last appended entry; `None` until first read from disk.
    head: Mutex<Option<String>>,
}

/// One parsed line: the record fields exactly as written, plus the chain link.
struct ChainedLine {
    fields: Map<String, Value>,
    prev_hash: String,
    hash: String,
}

impl ChainedLine {
    fn parse(line: &str) -> std::result::Result<Self, String> {
        let mut fields: Map<String, Value> =
            serde_json::from_str(line).map_err(|e| format!("unreadable entry: {e}"))?;
        let mut take = |key: &str| match fields.shift_remove(key) {
            Some(Value::String(s)) => Ok(s),
            _ => Err(format!("missing {key}")),
        };
        let hash = take(HASH_KEY)?;
        let prev_hash = take(PREV_HASH_KEY)?;
        Ok(Self {
            fields,
            prev_hash,
            hash,
        })
    }

    /// The record text the hash was computed over.
    fn body(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }

    fn into_record(self) -> Result<DecisionRecord> {
        Ok(serde_json::from_value(Value::Object(self.fields))?)
    }
}

impl JsonlAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            head: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record, extending the chain.
    pub async fn append(&self, record: &DecisionRecord) -> Result<String> {
        let mut head = self.head.lock().await;
        let prev_hash = match head.as_ref() {
            Some(hash) => hash.clone(),
            None => self.read_head().await?,
        };

        let body = serde_json::to_string(record)?;
        let hash = chain_hash(&prev_hash, &body);
        let mut fields: Map<String, Value> = serde_json::from_str(&body)?;
        fields.insert(PREV_HASH_KEY.into(), Value::String(prev_hash));
        fields.insert(HASH_KEY.into(), Value::String(hash.clone()));
        let mut line = serde_json::to_string(&fields)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        *head = Some(hash.clone());
        Ok(hash)
    }

    /// Hash of the last well-formed entry on disk, or the genesis hash.
    async fn read_head(&self) -> Result<String> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(GENESIS_HASH.to_string())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(contents
            .lines()
            .rev()
            .filter(|l| !l.trim().is_empty())
            .find_map(|l| ChainedLine::parse(l.trim()).ok())
            .map(|entry| entry.hash)
            .unwrap_or_else(|| GENESIS_HASH.to_string()))
    }

    /// Reconstruct every readable record, oldest first. Malformed lines are
    /// skipped with a warning.
    pub fn load_records(&self) -> Result<Vec<DecisionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let parsed = ChainedLine::parse(trimmed)
                .and_then(|entry| entry.into_record().map_err(|e| e.to_string()));
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        "skipping malformed line {} in {}: {}",
                        line_num + 1,
                        self.path.display(),
                        e
                    );
                }
            }
        }

        Ok(records)
    }

    /// Walk the chain from the first line. Returns the number of verified
    /// entries, or the first line (1-based) where the chain breaks.
    pub fn verify(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut expected_prev = GENESIS_HASH.to_string();
        let mut verified = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let broken = |reason: String| CloakError::AuditChain {
                line: line_num + 1,
                reason,
            };
            let entry = ChainedLine::parse(trimmed).map_err(broken)?;
            if entry.prev_hash != expected_prev {
                return Err(broken("prevHash does not match previous entry".into()));
            }
            if chain_hash(&entry.prev_hash, &entry.body()?) != entry.hash {
                return Err(broken("hash does not match entry contents".into()));
            }
            expected_prev = entry.hash;
            verified += 1;
        }

        Ok(verified)
    }
}

#[async_trait]
impl AuditSink for JsonlAuditLog {
    async fn record(&self, record: &DecisionRecord) -> Result<()> {
        self.append(record).await.map(|_| ())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

fn chain_hash(prev_hash: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}
