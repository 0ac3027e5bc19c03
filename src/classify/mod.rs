//! Frame classification.
//!
//! - `ClassifierBackend`: trait implemented by each inference engine
//! - `BackendRegistry`: name -> constructor, with optional stub fallback
//! - `ClassifierInvoker`: the worker that owns the backend and publishes labels
//! - `preprocess`: orientation and crop handling shared by backends

mod backend;
mod backends;
mod invoker;
pub mod preprocess;
mod registry;
mod result;

pub use backend::{ClassifierBackend, ComputeUnits, InferenceHints};
pub use backends::{StubBackend, STUB_LABELS};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use invoker::{ClassifierInvoker, InvokerStats};
pub use preprocess::{CropPolicy, DeviceOrientation, Orientation};
pub use registry::BackendRegistry;
pub use result::{Classification, ClassificationResult};
