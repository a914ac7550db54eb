//! Deterministic prompt construction for enhancement synthesis.
//!
//! The prompt is a fixed instruction preamble followed by the original
//! article and one excerpt block per reference. Same inputs, same prompt;
//! nothing here is randomized or time-dependent.

use redraft_shared::Reference;

/// System message framing the editor role.
pub const SYSTEM_MESSAGE: &str =
    "You are an expert content editor producing well-structured, accurate, and engaging articles.";

/// Longest reference excerpt included in the prompt.
const EXCERPT_CHARS: usize = 800;

/// Build the user prompt from the original text and gathered references.
pub fn build_prompt(original_text: &str, references: &[Reference]) -> String {
    let reference_blocks = references
        .iter()
        .enumerate()
        .map(|(i, reference)| reference_block(i + 1, reference))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a professional content editor. Enhance the ORIGINAL ARTICLE using insights and structure from the reference articles.\n\
         \n\
         Guidelines:\n\
         - Preserve all factual information and add relevant context\n\
         - Organize content with clear headings and subheadings (use markdown format)\n\
         - Break long paragraphs into shorter, readable chunks\n\
         - Use bullet points for lists and key takeaways\n\
         - Maintain a professional but accessible tone\n\
         - Do NOT invent facts; only use information from provided materials\n\
         - End with a \"References\" section listing the source URLs\n\
         \n\
         ORIGINAL ARTICLE:\n\
         {original_text}\n\
         \n\
         REFERENCE ARTICLES:\n\
         {reference_blocks}"
    )
}

/// One `Reference N: ...` block with a capped excerpt. The ellipsis is
/// unconditional, short excerpts included.
fn reference_block(index: usize, reference: &Reference) -> String {
    let excerpt: String = reference.content.chars().take(EXCERPT_CHARS).collect();
    format!(
        "Reference {index}: {}\nURL: {}\nExcerpt: {excerpt}...",
        reference.title, reference.url
    )
}
