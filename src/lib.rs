pub mod award;
pub mod csv_source;
pub mod database;
pub mod embeddings;
pub mod gemini;
pub mod prompt;
pub mod rag;
