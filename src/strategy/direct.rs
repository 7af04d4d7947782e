//! Direct chain-of-thought: exactly one backend call.

use tracing::debug;

use crate::extract::extract_final;
use crate::gateway::Backend;
use crate::prompts::{self, PromptInstance};

use super::{StrategyError, StrategyOutcome};

pub async fn direct(
    backend: &dyn Backend,
    question: &str,
) -> Result<StrategyOutcome, StrategyError> {
    let final_answer = answer_with(backend, &prompts::cot(question)).await?;
    Ok(StrategyOutcome {
        final_answer,
        backend_calls: 1,
    })
}

/// One call with the given prompt, reduced to its extracted final answer.
pub(crate) async fn answer_with(
    backend: &dyn Backend,
    prompt: &PromptInstance,
) -> Result<String, StrategyError> {
    let raw = backend.complete(&prompt.user, Some(prompt.system)).await?;
    let answer = extract_final(&raw);
    debug!(
        template = prompt.template_slug,
        response_chars = raw.len(),
        answer = %answer,
        "extracted final answer"
    );
    Ok(answer)
}
