//! rageval-vector
//!
//! LanceDB-backed document store: `writer` ingests embedded chunks, `store`
//! answers nearest-neighbour searches for the retriever, `hierarchy` lifts
//! chunk hits to their parent documents.

pub mod hierarchy;
pub mod schema;
pub mod store;
pub mod writer;

pub use store::LanceVectorStore;
pub use writer::LanceDbIndexer;
