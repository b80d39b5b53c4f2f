// Document generation: prompts, the four generation tasks, metadata and
// artifact naming, and cleaning of model output.
// All model calls go through llm_client; nothing here talks HTTP.

pub mod cleaning;
pub mod generator;
pub mod metadata;
pub mod prompts;
