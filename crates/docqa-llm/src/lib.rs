//! Answer generation over an OpenAI-compatible chat completions API.

mod openai;
mod prompt;

pub use openai::{parse_completion, parse_model_ids, OpenAiGenerator};
pub use prompt::{render_prompt, STUFF_TEMPLATE};
