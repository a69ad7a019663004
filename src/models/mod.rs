pub mod document;
pub mod document_type;
pub mod lifecycle;
pub mod record;

pub use document::{AccessReference, BlobMetadata, Document, ObjectProperties, ResultLocation};
pub use document_type::{resolve_document_type, DocumentTypeMapping};
pub use lifecycle::{LifecycleEvent, LifecycleState, LifecycleStatus};
pub use record::{DocumentRecord, RecordFilter};
