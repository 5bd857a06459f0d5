// Query module
// Embed a question, find the nearest stored FAQ, shape it into an answer


use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::debug;

use crate::FaqError;
use crate::database::{QueryHit, VectorStore};
use crate::embeddings::{Embedder, embed_text};

/// Neighbors fetched per question by [`ask_loop`]
pub const INTERACTIVE_TOP_K: usize = 3;

/// Answer used when the matched row carries no `answer` metadata
pub const NO_ANSWER: &str = "No answer stored.";

/// The best stored FAQ for a question. Both fields are `None` when the
/// store had nothing to match against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqAnswer {
    pub question: Option<String>,
    pub answer: Option<String>,
}

impl FaqAnswer {
    #[inline]
    pub fn no_match() -> Self {
        Self {
            question: None,
            answer: None,
        }
    }

    #[inline]
    pub fn is_match(&self) -> bool {
        self.question.is_some()
    }
}

impl From<&QueryHit> for FaqAnswer {
    fn from(hit: &QueryHit) -> Self {
        Self {
            question: Some(hit.document.clone()),
            answer: Some(hit.metadata_str("answer").unwrap_or(NO_ANSWER).to_string()),
        }
    }
}

/// Find the stored FAQ closest to `question`.
///
/// `top_k` neighbors are fetched and the best one is used.
#[inline]
pub async fn query_faq(
    store: &VectorStore,
    embedder: &Arc<dyn Embedder>,
    question: &str,
    top_k: usize,
) -> Result<FaqAnswer, FaqError> {
    let hits = search(store, embedder, question, top_k).await?;

    Ok(hits.first().map_or_else(FaqAnswer::no_match, FaqAnswer::from))
}

/// Nearest stored rows for `question`, best first
#[inline]
pub async fn search(
    store: &VectorStore,
    embedder: &Arc<dyn Embedder>,
    question: &str,
    top_k: usize,
) -> Result<Vec<QueryHit>, FaqError> {
    let vector = embed_text(embedder, question).await?;
    let hits = store.query(&vector, top_k.max(1)).await?;

    match hits.first() {
        Some(best) => debug!(
            "Best match for {:?}: row {} (score {:.3})",
            question,
            best.id,
            best.score()
        ),
        None => debug!("No stored rows to match {:?}", question),
    }

    Ok(hits)
}

/// Prompt for questions on `input` and print the closest FAQ to `output`
/// until `exit`, `quit` or end of input. Returns how many questions were
/// answered.
#[inline]
pub async fn ask_loop<R, W>(
    store: &VectorStore,
    embedder: &Arc<dyn Embedder>,
    mut input: R,
    output: &mut W,
) -> Result<usize, FaqError>
where
    R: BufRead,
    W: Write,
{
    let mut asked = 0;
    let mut line = String::new();

    loop {
        write!(output, "\n🧐  Ask a question ('exit' to quit): ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }

        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        let hits = search(store, embedder, question, INTERACTIVE_TOP_K).await?;
        asked += 1;

        match hits.first().map(FaqAnswer::from) {
            Some(FaqAnswer {
                question: Some(stored),
                answer,
            }) => {
                writeln!(output, "🎯  Closest stored Q: {}", stored)?;
                writeln!(output, "💡  Answer: {}", answer.as_deref().unwrap_or(NO_ANSWER))?;
            }
            _ => writeln!(output, "🤷  No match found.")?,
        }
    }

    Ok(asked)
}
