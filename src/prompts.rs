//! Prompt templates for the reasoning strategies.
//!
//! All strategies share one system instruction; the user prompts differ per
//! strategy and, for tree search, per depth.

/// System instruction sent with every strategy call.
pub const SYSTEM: &str =
    "You are a careful reasoning assistant. Think step by step and provide FINAL: <answer>.";

/// Rendered prompt ready for a backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInstance {
    pub template_slug: &'static str,
    pub system: &'static str,
    pub user: String,
}

impl PromptInstance {
    fn new(template_slug: &'static str, user: String) -> Self {
        Self {
            template_slug,
            system: SYSTEM,
            user,
        }
    }
}

/// Chain-of-thought prompt; also the per-sample prompt for self-consistency.
pub fn cot(question: &str) -> PromptInstance {
    PromptInstance::new(
        "cot",
        format!("{question}\n\nThink step by step, then provide 'FINAL: <answer>'."),
    )
}

/// Tree search, depth 0: propose first steps for the bare question.
pub fn tot_root(question: &str) -> PromptInstance {
    PromptInstance::new(
        "tot_root",
        format!("Problem: {question}\nPropose 2-3 short next steps, each under 2 sentences."),
    )
}

/// Tree search, depth > 0: extend or correct an accumulated partial.
pub fn tot_refine(question: &str, partial: &str) -> PromptInstance {
    PromptInstance::new(
        "tot_refine",
        format!(
            "Problem: {question}\nPartial:\n{partial}\nPropose 2-3 next steps to extend or correct."
        ),
    )
}

/// Chain-of-thought prompt seeded with a surviving tree-search path.
pub fn cot_with_path(question: &str, path: &str) -> PromptInstance {
    PromptInstance::new(
        "cot_with_path",
        format!(
            "{question}\n\nPromising reasoning so far:\n{path}\n\nThink step by step, then provide 'FINAL: <answer>'."
        ),
    )
}
