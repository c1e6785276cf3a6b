//! Persistence gateway
//!
//! Durable sink boundary for everything the engine produces: sample
//! occurrence counts, per-commit attributions, final scores, discovered
//! emails, and company assignments. The storage schema behind this trait
//! is somebody else's problem. Implementations must be shareable across
//! workers (`&self` methods, internal locking).

use crate::models::{AttributionRecord, CompanyRecord, SampleRecord, ScoreRecord};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

/// Durable sink for mining output.
pub trait PersistenceGateway: Send + Sync {
    /// Drop all prior final-score and discovered-email records for the
    /// project. Every run is a full recompute, never incremental.
    fn purge_project(&self, project: &str) -> Result<()>;

    fn persist_sample(&self, record: &SampleRecord) -> Result<()>;

    /// One call per nonzero per-commit attribution.
    fn persist_attribution(&self, record: &AttributionRecord) -> Result<()>;

    /// One call per (file, author) edition entry, after the walk drains.
    fn persist_final_score(&self, record: &ScoreRecord) -> Result<()>;

    fn upsert_discovered_emails(&self, emails: &[String]) -> Result<()>;

    fn update_company(&self, email: &str, company: &str) -> Result<()>;
}

/// Tagged record line written by [`JsonLinesGateway`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordLine {
    Sample(SampleRecord),
    Attribution(AttributionRecord),
    Score(ScoreRecord),
    Emails { emails: Vec<String> },
    Company(CompanyRecord),
}

/// Gateway writing JSON-lines to a single file. Purge truncates it.
pub struct JsonLinesGateway {
    out: Mutex<File>,
}

impl JsonLinesGateway {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open output file {:?}", path))?;
        Ok(Self {
            out: Mutex::new(file),
        })
    }

    fn write_line(&self, line: &RecordLine) -> Result<()> {
        let mut buf = serde_json::to_vec(line)?;
        buf.push(b'\n');
        let mut out = self.out.lock().expect("gateway lock poisoned");
        out.write_all(&buf)?;
        Ok(())
    }
}

impl PersistenceGateway for JsonLinesGateway {
    fn purge_project(&self, _project: &str) -> Result<()> {
        let mut out = self.out.lock().expect("gateway lock poisoned");
        out.set_len(0)?;
        out.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    fn persist_sample(&self, record: &SampleRecord) -> Result<()> {
        self.write_line(&RecordLine::Sample(record.clone()))
    }

    fn persist_attribution(&self, record: &AttributionRecord) -> Result<()> {
        self.write_line(&RecordLine::Attribution(record.clone()))
    }

    fn persist_final_score(&self, record: &ScoreRecord) -> Result<()> {
        self.write_line(&RecordLine::Score(record.clone()))
    }

    fn upsert_discovered_emails(&self, emails: &[String]) -> Result<()> {
        self.write_line(&RecordLine::Emails {
            emails: emails.to_vec(),
        })
    }

    fn update_company(&self, email: &str, company: &str) -> Result<()> {
        self.write_line(&RecordLine::Company(CompanyRecord {
            email: email.to_string(),
            company: company.to_string(),
        }))
    }
}

/// In-memory gateway: test double and embedder-friendly sink.
#[derive(Default)]
pub struct MemoryGateway {
    pub samples: Mutex<Vec<SampleRecord>>,
    pub attributions: Mutex<Vec<AttributionRecord>>,
    pub scores: Mutex<Vec<ScoreRecord>>,
    pub emails: Mutex<Vec<String>>,
    pub companies: Mutex<Vec<CompanyRecord>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scores(&self) -> Vec<ScoreRecord> {
        self.scores.lock().expect("gateway lock poisoned").clone()
    }

    pub fn samples(&self) -> Vec<SampleRecord> {
        self.samples.lock().expect("gateway lock poisoned").clone()
    }

    pub fn attributions(&self) -> Vec<AttributionRecord> {
        self.attributions
            .lock()
            .expect("gateway lock poisoned")
            .clone()
    }

    pub fn emails(&self) -> Vec<String> {
        self.emails.lock().expect("gateway lock poisoned").clone()
    }

    pub fn companies(&self) -> Vec<CompanyRecord> {
        self.companies
            .lock()
            .expect("gateway lock poisoned")
            .clone()
    }
}

impl PersistenceGateway for MemoryGateway {
    fn purge_project(&self, _project: &str) -> Result<()> {
        self.scores.lock().expect("gateway lock poisoned").clear();
        self.emails.lock().expect("gateway lock poisoned").clear();
        Ok(())
    }

    fn persist_sample(&self, record: &SampleRecord) -> Result<()> {
        self.samples
            .lock()
            .expect("gateway lock poisoned")
            .push(record.clone());
        Ok(())
    }

    fn persist_attribution(&self, record: &AttributionRecord) -> Result<()> {
        self.attributions
            .lock()
            .expect("gateway lock poisoned")
            .push(record.clone());
        Ok(())
    }

    fn persist_final_score(&self, record: &ScoreRecord) -> Result<()> {
        self.scores
            .lock()
            .expect("gateway lock poisoned")
            .push(record.clone());
        Ok(())
    }

    fn upsert_discovered_emails(&self, emails: &[String]) -> Result<()> {
        let mut stored = self.emails.lock().expect("gateway lock poisoned");
        for email in emails {
            if !stored.contains(email) {
                stored.push(email.clone());
            }
        }
        Ok(())
    }

    fn update_company(&self, email: &str, company: &str) -> Result<()> {
        self.companies
            .lock()
            .expect("gateway lock poisoned")
            .push(CompanyRecord {
                email: email.to_string(),
                company: company.to_string(),
            });
        Ok(())
    }
}
