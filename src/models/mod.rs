pub mod approval;
pub mod credentials;
pub mod detail;
pub mod form;
pub mod submission;
pub mod task;

pub use approval::{format_authority_timestamp, ApprovalPayload, ApprovalStatus};
pub use credentials::{Credentials, SystemKind};
pub use detail::{DetailPayload, DetailView, MediaItem};
pub use form::{EvaluationField, FieldId, FormOptions};
pub use submission::SubmissionPayload;
pub use task::{CacheKey, Task};
