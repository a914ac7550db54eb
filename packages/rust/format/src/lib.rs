//! Styled-markup rendering for LLM-enhanced article text.
//!
//! The synthesizer returns lightly-structured text (markdown headings,
//! emphasis, lists, blank-line paragraphs). Each rendering pass here is a
//! function `&str -> String` applied in sequence, ending with a cleanup pass
//! and the references appendix. The whole pipeline is pure: same input,
//! same output, no I/O.

use std::sync::LazyLock;

use regex::Regex;

use redraft_shared::ReferenceCandidate;

/// Render enhanced article text into final styled markup.
///
/// Empty input yields an empty string, references included or not.
pub fn format_content(text: &str, references: &[ReferenceCandidate]) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut result = text.to_string();

    result = render_headings(&result);
    result = render_emphasis(&result);
    result = render_list_items(&result);
    result = wrap_first_list_run(&result);
    result = wrap_paragraphs(&result);
    result = unwrap_block_elements(&result);

    if !references.is_empty() {
        result.push_str(&references_appendix(references));
    }

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Headings
// ---------------------------------------------------------------------------

/// Convert `#`-prefixed lines into styled heading elements, most specific
/// prefix first so `###` is never consumed by the `#` rule.
fn render_headings(text: &str) -> String {
    static H3_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^### (.*)$").expect("valid regex"));
    static H2_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^## (.*)$").expect("valid regex"));
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.*)$").expect("valid regex"));

    let result = H3_RE.replace_all(
        text,
        "<h3 style=\"font-size: 1.3em; font-weight: 700; margin: 1.5em 0 0.8em 0; color: #333;\">$1</h3>",
    );
    let result = H2_RE.replace_all(
        &result,
        "<h2 style=\"font-size: 1.6em; font-weight: 700; margin: 1.8em 0 1em 0; color: #222;\">$1</h2>",
    );
    let result = H1_RE.replace_all(
        &result,
        "<h1 style=\"font-size: 2em; font-weight: 700; margin: 1em 0 0.8em 0; color: #111;\">$1</h1>",
    );

    result.to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Emphasis
// ---------------------------------------------------------------------------

/// Convert `**`/`__` to strong and `*`/`_` to em. Bold runs first so the
/// single-delimiter rules only see what bold left behind.
fn render_emphasis(text: &str) -> String {
    static BOLD_STAR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"));
    static BOLD_UNDER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"__(.+?)__").expect("valid regex"));
    static EM_STAR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("valid regex"));
    static EM_UNDER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"_(.+?)_").expect("valid regex"));

    const STRONG: &str = "<strong style=\"font-weight: 700; color: #333;\">$1</strong>";
    const EM: &str = "<em style=\"font-style: italic; color: #555;\">$1</em>";

    let result = BOLD_STAR_RE.replace_all(text, STRONG);
    let result = BOLD_UNDER_RE.replace_all(&result, STRONG);
    let result = EM_STAR_RE.replace_all(&result, EM);
    let result = EM_UNDER_RE.replace_all(&result, EM);

    result.to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: List items
// ---------------------------------------------------------------------------

/// Convert `* `, `- `, and `1. ` line prefixes into styled list items.
fn render_list_items(text: &str) -> String {
    static STAR_ITEM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^\* (.*)$").expect("valid regex"));
    static DASH_ITEM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^- (.*)$").expect("valid regex"));
    static NUM_ITEM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^\d+\. (.*)$").expect("valid regex"));

    const ITEM: &str = "<li style=\"margin: 0.5em 0; line-height: 1.6;\">$1</li>";

    let result = STAR_ITEM_RE.replace_all(text, ITEM);
    let result = DASH_ITEM_RE.replace_all(&result, ITEM);
    let result = NUM_ITEM_RE.replace_all(&result, ITEM);

    result.to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: List wrapping
// ---------------------------------------------------------------------------

/// Wrap the first contiguous run of `<li>` elements in a styled `<ul>`.
///
/// Only the first run gets wrapped; later lists pass through bare. The run
/// pattern never consumes trailing blank lines, so paragraph splitting still
/// sees the block boundary after the list.
fn wrap_first_list_run(text: &str) -> String {
    static LIST_RUN_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)<li[^>]*>.*?</li>(?:\s*<li[^>]*>.*?</li>)*").expect("valid regex")
    });

    LIST_RUN_RE
        .replace(text, "<ul style=\"margin: 1em 0; padding-left: 2em;\">$0</ul>")
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Paragraphs
// ---------------------------------------------------------------------------

/// Split on blank-line boundaries and wrap plain-text blocks in styled
/// paragraphs. Blocks that already contain or start with markup pass through.
fn wrap_paragraphs(text: &str) -> String {
    static PARA_SPLIT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid regex"));
    static BLOCK_TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<h[1-6]|<ul|<ol|<blockquote").expect("valid regex"));
    static TAG_START_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^<[a-z]").expect("valid regex"));

    PARA_SPLIT_RE
        .split(text)
        .map(|block| {
            let block = block.trim();
            if block.is_empty() {
                return String::new();
            }
            if BLOCK_TAG_RE.is_match(block) || TAG_START_RE.is_match(block) {
                return block.to_string();
            }
            format!(
                "<p style=\"margin: 1em 0; line-height: 1.7; color: #444; font-size: 1em;\">{block}</p>"
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 6: Cleanup
// ---------------------------------------------------------------------------

/// Strip paragraph tags that ended up wrapped around heading or list
/// open/close tags.
fn unwrap_block_elements(text: &str) -> String {
    static P_BEFORE_HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<p[^>]*>(<h[1-6])").expect("valid regex"));
    static P_AFTER_HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(</h[1-6]>)</p>").expect("valid regex"));
    static P_BEFORE_LIST_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<p[^>]*>(<ul|<ol)").expect("valid regex"));
    static P_AFTER_LIST_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(</ul>|</ol>)</p>").expect("valid regex"));

    let result = P_BEFORE_HEADING_RE.replace_all(text, "$1");
    let result = P_AFTER_HEADING_RE.replace_all(&result, "$1");
    let result = P_BEFORE_LIST_RE.replace_all(&result, "$1");
    let result = P_AFTER_LIST_RE.replace_all(&result, "$1");

    result.to_string()
}

// ---------------------------------------------------------------------------
// Pass 7: References appendix
// ---------------------------------------------------------------------------

/// Build the trailing References section: a bordered heading plus one linked
/// list item per reference.
fn references_appendix(references: &[ReferenceCandidate]) -> String {
    let items = references
        .iter()
        .map(|r| {
            let url = if r.url.is_empty() { "#" } else { &r.url };
            let title = if r.title.is_empty() {
                "Reference"
            } else {
                &r.title
            };
            format!(
                "<li style=\"margin: 0.5em 0; line-height: 1.6;\"><a href=\"{url}\" target=\"_blank\" rel=\"noopener noreferrer\" style=\"color: #FF8C42; text-decoration: none; font-weight: 500;\">{title}</a></li>"
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\n<h2 style=\"font-size: 1.6em; font-weight: 700; margin: 2em 0 1em 0; color: #222; border-top: 2px solid #FF8C42; padding-top: 1em;\">References</h2>\n<ul style=\"margin: 1em 0; padding-left: 2em;\">\n{items}\n</ul>"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
