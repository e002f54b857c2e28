mod classify;
mod envelope;
mod failure;
mod normalizer;

pub use classify::{FailureClass, INTERNAL_ERROR_MESSAGE, classify};
pub use envelope::ErrorEnvelope;
pub use failure::{HandlerError, HttpFailure};
pub use normalizer::{ErrorNormalizer, NormalizedError, ReportContext};
