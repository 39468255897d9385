//! Answer Synthesis
//!
//! Builds a context block from retrieved passages and asks the completion
//! service for the final natural-language answer. Low temperature keeps the
//! output factual; the context (never the question) is truncated to a size
//! ceiling; a completion failure degrades to a fixed fallback string.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::retrieval::SearchResult;
use crate::services::CompletionService;

// ============================================================================
// PROMPTS
// ============================================================================

/// Which system prompt shapes the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    /// Substantive answer grounded in retrieved passages
    Content,
    /// Mixed-source answer when the intent is unclear
    Hybrid,
    /// Structured comparison of two or more provisions
    Comparison,
    /// Document overview
    Summary,
}

impl PromptVariant {
    fn system_prompt(&self) -> &'static str {
        match self {
            PromptVariant::Content => {
                "Eres un asistente legal experto. Responde la pregunta del usuario \
                 únicamente con base en el contexto proporcionado. Cita los artículos \
                 o secciones relevantes. Si el contexto no contiene la respuesta, \
                 indícalo claramente en lugar de especular."
            }
            PromptVariant::Hybrid => {
                "Eres un asistente legal experto. El contexto proviene de varias \
                 fuentes de búsqueda con distinta cobertura. Responde la pregunta \
                 integrando la información disponible y señala qué documento respalda \
                 cada afirmación."
            }
            PromptVariant::Comparison => {
                "Eres un asistente legal experto. Compara las disposiciones incluidas \
                 en el contexto. Presenta semejanzas y diferencias en una estructura \
                 clara, citando cada fuente por su nombre."
            }
            PromptVariant::Summary => {
                "Eres un asistente legal experto. Elabora un resumen ejecutivo del \
                 documento a partir de los extractos del contexto: objeto, ámbito de \
                 aplicación y disposiciones principales."
            }
        }
    }
}

/// Fallback answer when the completion service fails or returns nothing
pub const SYNTHESIS_FALLBACK: &str =
    "No fue posible generar una respuesta en este momento. Por favor intente nuevamente.";

// ============================================================================
// CONFIG
// ============================================================================

/// Configuration for answer synthesis
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Sampling temperature; low for factual consistency
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ceiling on context size; the context is truncated, never the query
    pub max_context_chars: usize,
    /// Deadline for the completion call
    pub timeout: Duration,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1024,
            max_context_chars: 12_000,
            timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// SYNTHESIZER
// ============================================================================

/// Completion-service front-end that turns retrieved context into an answer
pub struct Synthesizer {
    completion: Arc<dyn CompletionService>,
    config: SynthesisConfig,
}

impl Synthesizer {
    pub fn new(completion: Arc<dyn CompletionService>, config: SynthesisConfig) -> Self {
        Self { completion, config }
    }

    /// Synthesize an answer from a context block.
    ///
    /// Never errors: a failed, timed-out or empty completion yields the
    /// fixed fallback string.
    pub async fn synthesize(&self, query: &str, context: &str, variant: PromptVariant) -> String {
        let context = truncate_context(context, self.config.max_context_chars);
        let user_prompt = format!("Contexto:\n{context}\n\nPregunta: {query}");

        let call = self.completion.complete(
            variant.system_prompt(),
            &user_prompt,
            self.config.temperature,
            self.config.max_tokens,
        );

        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(Ok(answer)) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(Ok(_)) => {
                warn!("completion service returned empty content");
                SYNTHESIS_FALLBACK.to_string()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "completion service failed");
                SYNTHESIS_FALLBACK.to_string()
            }
            Err(_) => {
                warn!("completion service timed out");
                SYNTHESIS_FALLBACK.to_string()
            }
        }
    }

    /// Format the top results into a numbered context block.
    pub fn build_context(results: &[SearchResult], max_items: usize) -> String {
        results
            .iter()
            .take(max_items)
            .enumerate()
            .map(|(i, result)| {
                let title = result
                    .metadata
                    .get("documentTitle")
                    .and_then(|v| v.as_str())
                    .unwrap_or("fuente desconocida");
                format!("[{}] {}: {}", i + 1, title, result.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Truncate on a char boundary without splitting a code point
fn truncate_context(context: &str, max_chars: usize) -> String {
    if context.chars().count() <= max_chars {
        return context.to_string();
    }
    context.chars().take(max_chars).collect()
}

// ============================================================================
// TESTS
// ============================================================================
