pub mod common;
pub mod normalizer;

// Re-export commonly used items
pub use common::{CanonicalMessage, IngestionReport, NaturalKey, StoredMessage, TriageReport};
pub use normalizer::{normalize, normalize_parsed};
