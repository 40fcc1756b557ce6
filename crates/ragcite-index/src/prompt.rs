//! Prompt and context assembly.

use ragcite_core::Chunk;

const BASE_PROMPT: &str = "You are a helpful AI assistant that answers questions based on the provided context from uploaded documents.

Instructions:
1. Use the context provided to answer questions accurately
2. If the context doesn't contain relevant information, say so clearly
3. Provide specific, detailed answers when possible
4. If you're unsure about something, express uncertainty
5. Be concise but comprehensive in your responses";

const CITATION_PROMPT: &str = "
6. CITATION REQUIREMENTS:
   - Use numbered citations [1], [2], [3], etc. for ALL information from the provided context
   - Place citations immediately after the relevant information, not at the end of sentences
   - Every fact, quote, or piece of information from the context MUST be cited
   - Use block quotes for direct excerpts: > \"exact text from document\" [1]
   - For paraphrased information, still include the citation number
   - Multiple citations for the same source should use the same number
   - If referencing multiple sources for one point, use [1,2] or [1][2]

Citation Examples:
- Revenue increased by 15% [1] in the last quarter.
- The study found that > \"customer satisfaction improved significantly\" [2] after the implementation.
- Market analysis shows strong growth [1] and competitive positioning [3].
- According to the research [2], three key factors were identified.

Context from documents:
";

const PLAIN_PROMPT: &str = "

Context from documents:
";

const NO_CONTEXT: &str = "No relevant context found in the documents.";

/// Number ranked chunks `1..=n` the way citation markers refer to them.
#[must_use]
pub fn build_context(chunks: &[Chunk]) -> String {
    let mut lines = Vec::with_capacity(chunks.len() * 3);
    for (i, chunk) in chunks.iter().enumerate() {
        let name = chunk
            .metadata
            .document_name
            .clone()
            .unwrap_or_else(|| format!("Document_{}", chunk.document_id));
        let page = chunk
            .metadata
            .page_number
            .map_or_else(|| "Unknown".to_string(), |p| p.to_string());

        lines.push(format!(
            "[{}] Document: {name} (ID: {}, Page: {page})",
            i + 1,
            chunk.document_id
        ));
        lines.push(format!("Content: {}", chunk.content));
        lines.push("---".to_string());
    }
    lines.join("\n")
}

/// System prompt with answering rules, optional citation rules, and the context.
#[must_use]
pub fn system_prompt(context: &str, use_citations: bool) -> String {
    let rules = if use_citations {
        CITATION_PROMPT
    } else {
        PLAIN_PROMPT
    };
    let context = if context.is_empty() { NO_CONTEXT } else { context };
    format!("{BASE_PROMPT}{rules}\n{context}")
}
