//! Document store
//!
//! Collections of schema-flexible documents with filtered queries and change listeners.

pub mod filter;
pub mod memory;
pub mod query;
pub mod repository;
pub mod store;

pub use filter::{build_query, Filter, FilterValue, Operator};
pub use memory::InMemoryDocumentStore;
pub use query::{FieldFilter, FieldOperator, Query};
pub use repository::DocumentRepository;
pub use store::{
    DocumentErrorCode, DocumentEvent, DocumentSnapshot, DocumentStore, DocumentStoreError, Fields,
    QueryEvent,
};
