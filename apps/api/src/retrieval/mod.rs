// Semantic retrieval: embed chunks, index them, find the closest ones to a question.

pub mod embedder;
pub mod index;
