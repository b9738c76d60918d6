use crate::award::{AwardDocument, AwardRecord};
use crate::database::{AwardStore, SearchHit, VectorQuery};
use crate::embeddings::Embedder;
use crate::prompt::{build_context, build_prompt, LanguageModel};
use anyhow::Result;
use clap::ValueEnum;
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use std::io::{self, Write};

/// What to do when a search returns no documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum EmptyResultPolicy {
    /// Do not call the model at all
    #[default]
    Skip,
    /// Call the model with an empty context
    #[value(name = "call")]
    CallWithEmptyContext,
}

/// A row that was accepted but could not be stored
#[derive(Debug, Clone)]
pub struct RowFailure {
    /// 1-based data row number (header excluded)
    pub row: usize,
    pub name: String,
    pub error: String,
}

/// Summary of one ingestion run
#[derive(Debug, Default)]
pub struct IngestReport {
    pub rows_read: usize,
    pub accepted: usize,
    pub skipped: usize,
    pub stored: usize,
    pub failures: Vec<RowFailure>,
}

/// Result of answering one question
#[derive(Debug)]
pub struct QueryOutcome {
    pub hits: Vec<SearchHit>,
    pub context: String,
    /// None when the model was not called
    pub answer: Option<String>,
}

/// RAG (Retrieval-Augmented Generation) engine
pub struct RagEngine<S, E, L> {
    store: S,
    embedder: E,
    model: L,
}

impl<S, E, L> RagEngine<S, E, L>
where
    S: AwardStore,
    E: Embedder,
    L: LanguageModel,
{
    /// Create a new RAG engine
    pub fn new(store: S, embedder: E, model: L) -> Self {
        RagEngine {
            store,
            embedder,
            model,
        }
    }

    /// Embed and store every accepted row, keeping at most `concurrency` writes in flight.
    ///
    /// Returns once all writes have settled. Rows that fail are recorded in the report
    /// and do not affect the others.
    pub async fn ingest<I>(&self, rows: I, concurrency: usize) -> IngestReport
    where
        I: IntoIterator<Item = Result<AwardRecord>>,
    {
        let mut rows_read = 0;
        let mut skipped = 0;

        let accepted = rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| {
                rows_read += 1;
                match row {
                    Ok(award) if award.is_accepted() => Some((index + 1, award)),
                    Ok(_) => {
                        skipped += 1;
                        None
                    }
                    Err(e) => {
                        warn!("Skipping row {}: {:#}", index + 1, e);
                        skipped += 1;
                        None
                    }
                }
            });

        // Rows are pulled on the runtime thread. CSV input is a buffered local file read
        // between network round trips, so it stays inline instead of using spawn_blocking.
        let outcomes: Vec<(usize, String, Result<()>)> = stream::iter(accepted)
            .map(|(row, award)| async move {
                let name = award.name.clone();
                let outcome = self.store_award(award).await;
                (row, name, outcome)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut report = IngestReport {
            rows_read,
            accepted: outcomes.len(),
            skipped,
            ..Default::default()
        };

        for (row, name, outcome) in outcomes {
            match outcome {
                Ok(()) => report.stored += 1,
                Err(e) => {
                    error!("Failed to ingest row {} ({}): {:#}", row, name, e);
                    report.failures.push(RowFailure {
                        row,
                        name,
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        // Row numbers make failure listings easier to follow
        report.failures.sort_by_key(|failure| failure.row);

        info!(
            "Ingestion finished: {} read, {} accepted, {} skipped, {} stored, {} failed",
            report.rows_read,
            report.accepted,
            report.skipped,
            report.stored,
            report.failures.len()
        );

        report
    }

    /// Describe, embed and insert a single award
    async fn store_award(&self, award: AwardRecord) -> Result<()> {
        let description = award.describe();
        let embedding = self.embedder.embed(&description).await?;
        let document = AwardDocument::new(award, embedding);

        self.store.insert_award(&document).await?;
        debug!("Stored award: {}", document.description);

        Ok(())
    }

    /// Retrieve the awards closest to a question
    pub async fn search(&self, question: &str) -> Result<Vec<SearchHit>> {
        let question_embedding = self.embedder.embed(question).await?;
        self.store
            .vector_search(&VectorQuery::new(question_embedding.values))
            .await
    }

    /// Answer a question from the stored awards
    pub async fn answer(&self, question: &str, policy: EmptyResultPolicy) -> Result<QueryOutcome> {
        let hits = self.search(question).await?;
        info!("Found {} matching awards", hits.len());

        let context = build_context(&hits);

        if hits.is_empty() && policy == EmptyResultPolicy::Skip {
            return Ok(QueryOutcome {
                hits,
                context,
                answer: None,
            });
        }

        let prompt = build_prompt(&context, question);
        let answer = self.model.complete(&prompt).await?;

        Ok(QueryOutcome {
            hits,
            context,
            answer: Some(answer),
        })
    }

    /// Run an interactive question loop on stdin
    pub async fn run_query_loop(&self, policy: EmptyResultPolicy) -> Result<()> {
        println!("Ask about the Oscar awards. Type 'exit' to quit.");

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut buffer = String::new();

        loop {
            print!("\nYour question: ");
            stdout.flush()?;

            buffer.clear();
            if stdin.read_line(&mut buffer)? == 0 {
                break;
            }

            let question = buffer.trim();

            if question.is_empty() {
                continue;
            }

            if question.eq_ignore_ascii_case("exit") {
                println!("Goodbye!");
                break;
            }

            let outcome = self.answer(question, policy).await?;
            print_outcome(&outcome);
        }

        Ok(())
    }
}

/// Print an answer, or a notice when the model was not consulted
pub fn print_outcome(outcome: &QueryOutcome) {
    match &outcome.answer {
        Some(answer) => println!("\n{}", answer),
        None => println!("No relevant awards found."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::Embedding;
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Deterministic embedder keyed on a few words
    struct KeywordEmbedder;

    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            let lower = text.to_lowercase();
            let values = ["supporting", "directing", "picture"]
                .iter()
                .map(|word| if lower.contains(word) { 1.0 } else { 0.0 })
                .chain(std::iter::once(0.1))
                .collect();
            Ok(Embedding { values })
        }
    }

    /// Fails for any description mentioning the given text
    struct FailingEmbedder {
        fail_on: &'static str,
    }

    impl Embedder for FailingEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            if text.contains(self.fail_on) {
                return Err(anyhow!("embedding quota exceeded"));
            }
            KeywordEmbedder.embed(text).await
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        documents: Mutex<Vec<AwardDocument>>,
        queries: Mutex<Vec<VectorQuery>>,
        reject_name: Option<String>,
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (norm(a) * norm(b))
    }

    impl AwardStore for MemoryStore {
        async fn insert_award(&self, award: &AwardDocument) -> Result<()> {
            if self.reject_name.as_deref() == Some(award.record.name.as_str()) {
                return Err(anyhow!("write rejected"));
            }
            self.documents.lock().unwrap().push(award.clone());
            Ok(())
        }

        async fn vector_search(&self, query: &VectorQuery) -> Result<Vec<SearchHit>> {
            self.queries.lock().unwrap().push(query.clone());
            let mut hits: Vec<SearchHit> = self
                .documents
                .lock()
                .unwrap()
                .iter()
                .map(|doc| SearchHit {
                    id: doc.record.id.clone(),
                    description: doc.description.clone(),
                    score: cosine(&doc.embedding.values, &query.vector),
                })
                .collect();
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
            hits.truncate(query.limit as usize);
            Ok(hits)
        }
    }

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
    }

    impl LanguageModel for RecordingModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("Robert Downey Jr.".to_string())
        }
    }

    fn award(year_ceremony: i64, category: &str, name: &str, film: &str, winner: bool) -> AwardRecord {
        AwardRecord {
            id: format!("{}-{}", category, name),
            year_film: year_ceremony - 1,
            year_ceremony,
            ceremony: "96".to_string(),
            category: category.to_string(),
            name: name.to_string(),
            film: film.to_string(),
            winner,
        }
    }

    fn sample_rows() -> Vec<Result<AwardRecord>> {
        vec![
            Ok(award(2024, "ACTOR IN A SUPPORTING ROLE", "Robert Downey Jr.", "Oppenheimer", true)),
            Ok(award(2024, "ACTOR IN A SUPPORTING ROLE", "Ryan Gosling", "Barbie", false)),
            Ok(award(2024, "DIRECTING", "Christopher Nolan", "Oppenheimer", true)),
            Ok(award(2020, "DIRECTING", "Bong Joon Ho", "Parasite", true)),
            Ok(award(2024, "HONORARY AWARD", "Angela Bassett", "", true)),
            Err(anyhow!("bad row")),
        ]
    }

    fn engine(store: MemoryStore) -> RagEngine<MemoryStore, KeywordEmbedder, RecordingModel> {
        RagEngine::new(store, KeywordEmbedder, RecordingModel::default())
    }

    #[tokio::test]
    async fn test_ingest_stores_only_accepted_rows() {
        let engine = engine(MemoryStore::default());
        let report = engine.ingest(sample_rows(), 2).await;

        assert_eq!(report.rows_read, 6);
        assert_eq!(report.accepted, 3);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.stored, 3);
        assert!(report.failures.is_empty());

        let documents = engine.store.documents.lock().unwrap();
        assert_eq!(documents.len(), 3);
        for document in documents.iter() {
            assert!(document.record.year_ceremony >= 2023);
            assert!(!document.record.name.is_empty());
            assert!(!document.record.film.is_empty());
            assert_eq!(document.description, document.record.describe());
        }
    }

    #[tokio::test]
    async fn test_ingest_twice_duplicates() {
        let engine = engine(MemoryStore::default());
        engine.ingest(sample_rows(), 1).await;
        engine.ingest(sample_rows(), 1).await;

        assert_eq!(engine.store.documents.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_ingest_captures_row_failures() {
        let store = MemoryStore {
            reject_name: Some("Ryan Gosling".to_string()),
            ..Default::default()
        };
        let engine = engine(store);
        let report = engine.ingest(sample_rows(), 4).await;

        assert_eq!(report.accepted, 3);
        assert_eq!(report.stored, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].row, 2);
        assert_eq!(report.failures[0].name, "Ryan Gosling");
        assert!(report.failures[0].error.contains("write rejected"));
    }

    #[tokio::test]
    async fn test_ingest_captures_embedding_failures() {
        let engine = RagEngine::new(
            MemoryStore::default(),
            FailingEmbedder {
                fail_on: "Christopher Nolan",
            },
            RecordingModel::default(),
        );
        let report = engine.ingest(sample_rows(), 3).await;

        assert_eq!(report.accepted, 3);
        assert_eq!(report.stored, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].row, 3);
        assert_eq!(report.failures[0].name, "Christopher Nolan");
        assert!(report.failures[0].error.contains("embedding quota exceeded"));

        let documents = engine.store.documents.lock().unwrap();
        assert_eq!(documents.len(), 2);
        assert!(documents
            .iter()
            .all(|document| document.record.name != "Christopher Nolan"));
    }

    #[tokio::test]
    async fn test_ingest_with_zero_concurrency_still_runs() {
        let engine = engine(MemoryStore::default());
        let report = engine.ingest(sample_rows(), 0).await;
        assert_eq!(report.stored, 3);
    }

    #[tokio::test]
    async fn test_answer_uses_closest_descriptions() {
        let engine = engine(MemoryStore::default());
        engine.ingest(sample_rows(), 2).await;

        let outcome = engine
            .answer(
                "Who won the best supporting role award?",
                EmptyResultPolicy::Skip,
            )
            .await
            .unwrap();

        assert_eq!(outcome.answer.as_deref(), Some("Robert Downey Jr."));
        assert_eq!(outcome.hits.len(), 3);
        assert!(outcome.hits[0].description.contains("SUPPORTING"));
        assert_eq!(
            outcome.context,
            outcome
                .hits
                .iter()
                .map(|hit| hit.description.clone())
                .collect::<Vec<_>>()
                .join("\n")
        );

        let queries = engine.store.queries.lock().unwrap();
        assert_eq!(queries[0].limit, 10);
        assert_eq!(queries[0].num_candidates, 200);

        let prompts = engine.model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Answer the question based on only the following context:\n"));
        assert!(prompts[0].ends_with("Question: Who won the best supporting role award?"));
    }

    #[tokio::test]
    async fn test_empty_results_skip_model() {
        let engine = engine(MemoryStore::default());
        let outcome = engine
            .answer("Who won?", EmptyResultPolicy::Skip)
            .await
            .unwrap();

        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.context, "");
        assert!(outcome.answer.is_none());
        assert!(engine.model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_results_call_model_with_empty_context() {
        let engine = engine(MemoryStore::default());
        let outcome = engine
            .answer("Who won?", EmptyResultPolicy::CallWithEmptyContext)
            .await
            .unwrap();

        assert_eq!(outcome.context, "");
        assert!(outcome.answer.is_some());

        let prompts = engine.model.prompts.lock().unwrap();
        assert_eq!(
            prompts[0],
            "Answer the question based on only the following context:\n\nQuestion: Who won?"
        );
    }
}
