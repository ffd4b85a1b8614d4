//! Navigator Store: embeddings and nearest-neighbour document retrieval.
//!
//! `Embedder` turns a query into a vector; `VectorStore` returns the
//! documents closest to it. Supabase is used when configured, otherwise an
//! in-memory store loaded from a JSON file.

pub mod embedder;
pub mod memory;
pub mod supabase;
pub mod types;
pub mod vector_store;

pub use embedder::{create_embedder, Embedder, EmbeddingProvider};
pub use memory::InMemoryStore;
pub use supabase::SupabaseStore;
pub use types::{RetrievedDocument, StoredDocument};
pub use vector_store::{create_vector_store, VectorStore};
