//! Prompt expander port: turns one instruction into several image prompts.

use super::PortFuture;

/// Generates concrete image prompts from an instruction via a language model.
pub trait PromptExpander: Send + Sync {
    /// Ask for `count` prompts. Implementations may return fewer or more.
    fn expand(&self, instruction: &str, count: usize) -> PortFuture<'_, Vec<String>>;
}
