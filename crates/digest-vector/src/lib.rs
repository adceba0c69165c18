//! Vector index for the digest archive: exact cosine search in memory,
//! persisted to LanceDB between runs.

pub mod builder;
pub mod handle;
pub mod index;
pub mod schema;
pub mod store;
pub mod table;

pub use builder::IndexBuilder;
pub use handle::IndexHandle;
pub use index::{cosine_similarity, IndexFingerprint, VectorIndex};
pub use store::{IndexManifest, IndexStore};
