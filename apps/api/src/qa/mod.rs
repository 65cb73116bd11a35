// Question answering: the two pipelines, answer post-processing and HTTP handlers.
// All chat calls go through llm_client; no direct API calls here.

pub mod answer;
pub mod handlers;
pub mod pipeline;
