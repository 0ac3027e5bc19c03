pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::{StubBackend, STUB_LABELS};

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
