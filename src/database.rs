use crate::award::AwardDocument;
use anyhow::{Context, Result};
use log::info;
use qdrant_client::qdrant::{
    with_payload_selector, CreateCollection, CreateCollectionBuilder, Distance, PointStruct,
    ScoredPoint, SearchParams, SearchPoints, UpsertPointsBuilder, Value, VectorParamsBuilder,
    VectorsConfigBuilder, WithPayloadSelector,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::env;
use uuid::Uuid;

const DEFAULT_VECTOR_SIZE: u64 = 768; // text-embedding-004 output dimension

/// Name of the vector holding award embeddings inside each point
pub const EMBEDDING_VECTOR_NAME: &str = "award_embeddings";

/// Number of matches fed into the prompt
pub const SEARCH_LIMIT: u64 = 10;
/// Breadth of the approximate nearest-neighbour candidate pool
pub const SEARCH_CANDIDATES: u64 = 200;

/// A similarity search request against stored award embeddings
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub num_candidates: u64,
    pub limit: u64,
}

impl VectorQuery {
    /// Query with the default candidate pool and result limit
    pub fn new(vector: Vec<f32>) -> Self {
        VectorQuery {
            vector,
            num_candidates: SEARCH_CANDIDATES,
            limit: SEARCH_LIMIT,
        }
    }
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub description: String,
    pub score: f32,
}

/// Document storage with vector similarity search
#[allow(async_fn_in_trait)]
pub trait AwardStore {
    /// Insert one award document; never deduplicates
    async fn insert_award(&self, award: &AwardDocument) -> Result<()>;

    /// Return the closest stored awards, best first
    async fn vector_search(&self, query: &VectorQuery) -> Result<Vec<SearchHit>>;
}

/// Configuration for Qdrant
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    /// Must match the output dimension of the embedding model
    pub vector_size: u64,
}

impl QdrantConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let url = env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6334".to_string());
        let api_key = env::var("QDRANT_API_KEY").ok();
        let collection = env::var("QDRANT_COLLECTION").unwrap_or_else(|_| "awards".to_string());
        let vector_size = match env::var("QDRANT_VECTOR_SIZE") {
            Ok(size) => size
                .parse()
                .with_context(|| format!("Invalid QDRANT_VECTOR_SIZE: {}", size))?,
            Err(_) => DEFAULT_VECTOR_SIZE,
        };

        Ok(QdrantConfig {
            url,
            api_key,
            collection,
            vector_size,
        })
    }
}

/// Client for interacting with Qdrant
pub struct QdrantClient {
    client: Qdrant,
    collection: String,
    vector_size: u64,
}

impl QdrantClient {
    /// Create a new Qdrant client
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let config_builder = Qdrant::from_url(&config.url);
        let config_builder = if let Some(api_key) = config.api_key {
            config_builder.api_key(api_key)
        } else {
            config_builder
        };

        let client = config_builder.build()?;

        Ok(QdrantClient {
            client,
            collection: config.collection,
            vector_size: config.vector_size,
        })
    }

    /// Check if the awards collection exists
    pub async fn collection_exists(&self) -> Result<bool> {
        self.client
            .collection_exists(self.collection.as_str())
            .await
            .with_context(|| format!("Failed to check collection {}", self.collection))
    }

    /// Create the awards collection unless it is already there
    pub async fn ensure_collection(&self) -> Result<()> {
        if self.collection_exists().await? {
            info!("Using existing collection: {}", self.collection);
            return Ok(());
        }

        self.client
            .create_collection(collection_request(&self.collection, self.vector_size))
            .await
            .with_context(|| format!("Failed to create collection {}", self.collection))?;

        info!(
            "Created collection: {} ({} dimensions)",
            self.collection, self.vector_size
        );
        Ok(())
    }
}

impl AwardStore for QdrantClient {
    async fn insert_award(&self, award: &AwardDocument) -> Result<()> {
        let point = to_point(award);
        let request = UpsertPointsBuilder::new(self.collection.clone(), vec![point])
            .wait(true)
            .build();

        self.client
            .upsert_points(request)
            .await
            .with_context(|| {
                format!(
                    "Failed to insert award {} into collection {}",
                    award.record.id, self.collection
                )
            })?;

        Ok(())
    }

    async fn vector_search(&self, query: &VectorQuery) -> Result<Vec<SearchHit>> {
        let search_request = SearchPoints {
            collection_name: self.collection.clone(),
            vector: query.vector.clone(),
            vector_name: Some(EMBEDDING_VECTOR_NAME.to_string()),
            limit: query.limit,
            params: Some(SearchParams {
                hnsw_ef: Some(query.num_candidates),
                ..Default::default()
            }),
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let search_response = self
            .client
            .search_points(search_request)
            .await
            .with_context(|| format!("Failed to search collection {}", self.collection))?;

        Ok(search_response
            .result
            .into_iter()
            .filter_map(to_search_hit)
            .collect())
    }
}

/// Cosine collection with a single named vector for award embeddings
fn collection_request(collection: &str, vector_size: u64) -> CreateCollection {
    let mut vectors_config = VectorsConfigBuilder::default();
    vectors_config.add_named_vector_params(
        EMBEDDING_VECTOR_NAME,
        VectorParamsBuilder::new(vector_size, Distance::Cosine),
    );

    CreateCollectionBuilder::new(collection)
        .vectors_config(vectors_config)
        .build()
}

/// Build the payload stored alongside an award's embedding
fn award_payload(award: &AwardDocument) -> HashMap<String, Value> {
    let record = &award.record;
    HashMap::from([
        ("id".to_string(), Value::from(record.id.clone())),
        ("year_film".to_string(), Value::from(record.year_film)),
        ("year_ceremony".to_string(), Value::from(record.year_ceremony)),
        ("ceremony".to_string(), Value::from(record.ceremony.clone())),
        ("category".to_string(), Value::from(record.category.clone())),
        ("name".to_string(), Value::from(record.name.clone())),
        ("film".to_string(), Value::from(record.film.clone())),
        ("winner".to_string(), Value::from(record.winner)),
        ("description".to_string(), Value::from(award.description.clone())),
    ])
}

/// Every insert gets a fresh point id, so re-ingesting duplicates documents
fn to_point(award: &AwardDocument) -> PointStruct {
    let payload = award_payload(award);
    let vectors: HashMap<String, Vec<f32>> = HashMap::from([(
        EMBEDDING_VECTOR_NAME.to_string(),
        award.embedding.values.clone(),
    )]);

    PointStruct::new(Uuid::new_v4().to_string(), vectors, payload)
}

fn to_search_hit(scored_point: ScoredPoint) -> Option<SearchHit> {
    let payload = scored_point.payload;
    let description = payload.get("description")?.as_str()?.to_string();
    let id = payload
        .get("id")
        .and_then(|v| v.as_str())
        .cloned()
        .unwrap_or_default();

    Some(SearchHit {
        id,
        description,
        score: scored_point.score,
    })
}
