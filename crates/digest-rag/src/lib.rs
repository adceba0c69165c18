pub mod composer;
pub mod retriever;
pub mod service;

pub use composer::{AnswerComposer, INSUFFICIENT_EVIDENCE};
pub use retriever::Retriever;
pub use service::{index_handle_from_settings, AnswerStatus, QaResponse, QaService, Source, PROVIDER_UNAVAILABLE};
