pub mod extractor;
pub mod kv_store;
pub mod relay;

pub use extractor::{ExtractedRecord, FieldSelector, MarkupExtractor, RegexExtractor, Selector};
pub use kv_store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use relay::{MediaPreloader, RelayClient};
