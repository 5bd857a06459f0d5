// Ingest module
// Loads FAQ records, embeds their questions and writes them to the vector store


use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::FaqError;
use crate::config::Config;
use crate::database::VectorStore;
use crate::embeddings::{Embedder, embed_texts};

/// A question and its canned answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqRecord {
    pub id: String,
    pub question: String,
    pub answer: String,
}

/// What ingestion does when the table already holds rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Leave a populated table untouched
    #[default]
    SkipIfPopulated,
    /// Drop and rebuild the table on every run
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Rows written by this run
    pub inserted: usize,
    /// True when a populated table was left alone
    pub skipped: bool,
    /// Rows in the table once ingestion finished
    pub total_rows: u64,
}

/// Sample FAQs served when no FAQ file is configured
#[inline]
pub fn builtin_faqs() -> Vec<FaqRecord> {
    [
        (
            "1",
            "What is your return policy?",
            "You can return items within 30 days.",
        ),
        (
            "2",
            "How long does shipping take?",
            "Standard shipping takes 3-5 business days.",
        ),
        (
            "3",
            "Do you ship internationally?",
            "Yes, we ship to over 50 countries worldwide.",
        ),
        (
            "4",
            "How can I track my order?",
            "Use the tracking link in your confirmation email.",
        ),
        (
            "5",
            "What payment methods do you accept?",
            "We accept credit cards, PayPal and bank transfers.",
        ),
    ]
    .into_iter()
    .map(|(id, question, answer)| FaqRecord {
        id: id.to_string(),
        question: question.to_string(),
        answer: answer.to_string(),
    })
    .collect()
}

/// Read a JSON array of `{"id", "question", "answer"}` objects
#[inline]
pub fn load_faqs(path: &Path) -> Result<Vec<FaqRecord>, FaqError> {
    let content = fs::read_to_string(path).map_err(|e| {
        FaqError::Ingest(format!("Failed to read FAQ file {}: {}", path.display(), e))
    })?;

    let records: Vec<FaqRecord> = serde_json::from_str(&content).map_err(|e| {
        FaqError::Ingest(format!("Failed to parse FAQ file {}: {}", path.display(), e))
    })?;

    debug!("Loaded {} FAQ records from {}", records.len(), path.display());
    Ok(records)
}

/// Records from the configured FAQ file, or the built-in list
#[inline]
pub fn configured_faqs(config: &Config) -> Result<Vec<FaqRecord>, FaqError> {
    match &config.ingest.faq_file {
        Some(path) => load_faqs(path),
        None => {
            debug!("No FAQ file configured, using built-in FAQs");
            Ok(builtin_faqs())
        }
    }
}

/// Check records are usable before anything is written
#[inline]
pub fn validate_records(records: &[FaqRecord]) -> Result<(), FaqError> {
    if records.is_empty() {
        return Err(FaqError::Ingest("No FAQ records to ingest".to_string()));
    }

    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if record.id.trim().is_empty() {
            return Err(FaqError::Ingest("FAQ record with empty id".to_string()));
        }
        if record.question.trim().is_empty() {
            return Err(FaqError::Ingest(format!(
                "FAQ record {} has an empty question",
                record.id
            )));
        }
        if !seen.insert(record.id.as_str()) {
            return Err(FaqError::Ingest(format!(
                "Duplicate FAQ id: {}",
                record.id
            )));
        }
    }

    Ok(())
}

/// Embed every question and load the records into `store`.
///
/// In [`IngestMode::SkipIfPopulated`] a table that already has rows is left
/// as is. Otherwise the table is reset and all records are inserted in one
/// write. A failure part way leaves the table in whatever state it reached.
#[inline]
pub async fn ingest_faqs(
    store: &mut VectorStore,
    embedder: &Arc<dyn Embedder>,
    records: &[FaqRecord],
    mode: IngestMode,
) -> Result<IngestReport, FaqError> {
    if mode == IngestMode::SkipIfPopulated {
        let existing = store.count_rows().await?;
        if existing > 0 {
            match store.table_dimension().await? {
                Some(stored) if stored != embedder.dimension() => warn!(
                    "Table {} holds {}-dimensional vectors but the embedder produces {}; rebuilding",
                    store.table_name(),
                    stored,
                    embedder.dimension()
                ),
                _ => {
                    info!(
                        "Table {} already holds {} rows, skipping ingestion",
                        store.table_name(),
                        existing
                    );
                    return Ok(IngestReport {
                        inserted: 0,
                        skipped: true,
                        total_rows: existing,
                    });
                }
            }
        }
    }

    validate_records(records)?;

    let started = Instant::now();
    store.reset_collection(embedder.dimension()).await?;

    let questions: Vec<String> = records.iter().map(|r| r.question.clone()).collect();
    let vectors = embed_texts(embedder, questions.clone()).await?;

    if vectors.len() != records.len() {
        return Err(FaqError::Embedding(format!(
            "Expected {} embeddings, got {}",
            records.len(),
            vectors.len()
        )));
    }

    let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
    let metadatas: Vec<Map<String, Value>> = records
        .iter()
        .map(|r| {
            let mut metadata = Map::new();
            metadata.insert("answer".to_string(), json!(r.answer));
            metadata
        })
        .collect();

    store.insert(&ids, &questions, &vectors, &metadatas).await?;

    let total_rows = store.count_rows().await?;
    info!(
        "Ingested {} FAQs into {} in {:.2?}",
        records.len(),
        store.table_name(),
        started.elapsed()
    );

    Ok(IngestReport {
        inserted: records.len(),
        skipped: false,
        total_rows,
    })
}

/// Connect to the configured store and run ingestion with the configured
/// FAQ source and mode
#[inline]
pub async fn prepare_store(
    config: &Config,
    embedder: &Arc<dyn Embedder>,
    mode: IngestMode,
) -> Result<(VectorStore, IngestReport), FaqError> {
    let mut store = VectorStore::connect(&config.vector_store, embedder.dimension()).await?;
    let records = configured_faqs(config)?;
    let report = ingest_faqs(&mut store, embedder, &records, mode).await?;
    Ok((store, report))
}
