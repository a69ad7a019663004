pub mod analysis_invoker;
pub mod document_locator;
pub mod error_classifier;
pub mod lifecycle_recorder;
pub mod state_transition;

pub use analysis_invoker::AnalysisInvoker;
pub use document_locator::{DocumentLocator, LocatedBatch, SkipReason, SkippedFile};
pub use error_classifier::ErrorClass;
pub use lifecycle_recorder::LifecycleRecorder;
pub use state_transition::StateTransitionManager;
