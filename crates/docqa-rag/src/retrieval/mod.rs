//! Vector index, snapshots and retrieval

mod index;
mod search;
mod snapshot;

pub use index::{
    cosine_similarity, l2_distance, IndexEntry, IndexHeader, Metric, SearchHit, VectorIndex,
};
pub use search::Retriever;
pub use snapshot::{SnapshotManifest, SnapshotStore, FORMAT_VERSION, SNAPSHOT_FILE};
