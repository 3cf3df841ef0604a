pub mod accumulator;
pub mod config;
pub mod coordinator;
pub mod decoder;
pub mod error;
pub mod payload;
pub mod state;
pub mod transport;

// Re-export main types for convenience
pub use accumulator::{Fragments, StreamAccumulator};
pub use config::Config;
pub use coordinator::{RequestCoordinator, Submission};
pub use decoder::Utf8Decoder;
pub use error::{StreamError, SubmitError, TransportError};
pub use payload::{RequestPayload, RequiredField, AVAILABLE_MODELS, DEFAULT_MODEL};
pub use state::{Failure, FailureKind, Snapshot, StreamState};
pub use transport::{BodyStream, HttpTransport, Transport, DEFAULT_ENDPOINT};
