pub mod analysis_client;
pub mod lifecycle_store;
pub mod object_store;

pub use analysis_client::{
    AnalysisClient, AnalysisSource, HttpAnalysisClient, JobHandle, JobStatus,
};
pub use lifecycle_store::{JsonFileLifecycleStore, LifecycleStore};
pub use object_store::{LocalFileStore, ObjectStore};
