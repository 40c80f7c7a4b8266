//! 业务能力层（Services）
//!
//! 每个服务只描述"我能做什么"，只处理单条任务，不关心队列游标和流程顺序

pub mod credential_store;
pub mod detail_service;
pub mod form_loader;
pub mod note_extractor;
pub mod prefetch_cache;

pub use credential_store::{extract_session_token, CredentialStore, RefreshOutcome};
pub use detail_service::DetailService;
pub use form_loader::{FormLoader, FALLBACK_OPTIONS};
pub use note_extractor::{append_first_party_sentence, NoteExtractor, FIRST_PARTY_SENTENCE};
pub use prefetch_cache::PrefetchCache;
