//! Prompt text for accessibility rewriting.
//!
//! Every string the model sees lives here: the shared system instruction, the
//! image describe-then-transform wrapper, and one template per accessibility
//! profile. Unit tests inspect these constants directly, so a prompt
//! regression shows up without a live model.
//!
//! Profile templates carry exactly one [`CONTENT_SLOT`]; the registry in
//! [`crate::profiles`] enforces that at test time.

/// The single substitution point inside every profile template.
pub const CONTENT_SLOT: &str = "{text_content}";

/// Placeholder fed to the template slot when the content is an image.
pub const IMAGE_PLACEHOLDER: &str = "[Image Description]";

/// Shared system instruction. The numbered constraints are repeated to the
/// model on every call; the sanitizer enforces them regardless.
pub const SYSTEM_INSTRUCTION: &str = r#"You are an expert AI Accessibility Agent and Content Restructuring Specialist. Your primary function is to transform the provided content into a clear, scannable, and accessible HTML fragment tailored to the requested accessibility profile. Prioritize readability, logical flow, accuracy of information, and safety in your output.

General formatting rules (apply to ALL profiles):
- Use semantic HTML: <p>, <h1>-<h3>, <ul>, <ol>, <li>, <strong>, <em>, <blockquote>.
- Preserve all factual information and core meaning. Do not add opinions.
- Keep a logical reading order.

Strict output format and safety constraints:
1. HTML FRAGMENT ONLY: respond with a single, self-contained HTML fragment. Do NOT include <html>, <head> or <body> wrapper tags. Do NOT wrap the answer in Markdown code fences.
2. NO SCRIPTS OR STYLES: no <script>, <style>, <link rel="stylesheet">, <iframe>, <embed> or <object>, and no event-handler attributes such as onclick, onload, onerror or onmouseover.
3. SAFE TAGS ONLY: headings, paragraphs, lists, <strong>, <em>, <b>, <i>, <blockquote>, <hr>, <br>, <div>, <span>, tables and links <a>. Nothing else.
4. SAFE LINKS ONLY: every href must use the http, https or mailto scheme.
5. VALID STRUCTURE: close every tag and nest them correctly."#;

/// Prefix for image inputs: the model first describes the image, then applies
/// the profile transformation to its own description.
pub const IMAGE_INSTRUCTION: &str = "First, describe the content of this image in detail. \
Then, apply the following accessibility transformation to your description:";

/// Dyslexia-friendly rewrite.
pub const DYSLEXIA_TEMPLATE: &str = r#"**Task:** Reformat and rewrite the provided text to be significantly easier to read and understand for individuals with dyslexia.
**Specific Instructions:**
1. **Simplify Vocabulary:** Replace complex or jargon-filled words with simpler, more common synonyms.
2. **Shorten Sentences:** Break down long, complex sentences into shorter, more direct ones.
3. **Use Active Voice:** Convert passive voice to active voice wherever possible.
4. **Bold Key Terms:** Wrap the most important keywords in <strong>. Do not over-bold.
5. **Use Clear Paragraphs:** Keep each <p> short and focused on a single idea. Break up dense blocks of text.
6. **Lists:** Use <ul> or <ol> when the text describes steps or related items.
7. **Provide a Summary (only if the text is very long):** Start with a 1-2 sentence core summary.
8. **Maintain Original Meaning:** Preserve the core information and intent of the original text.
9. **Output Format:** Provide the rewritten text as an HTML fragment.

**Original Text:**
{text_content}"#;

/// Cognitive-impairment simplification.
pub const COGNITIVE_IMPAIRMENT_TEMPLATE: &str = r#"**Task:** Summarize and simplify the provided text for individuals with cognitive impairments, focusing on clarity, brevity, and essential information.
**Specific Instructions:**
1. **Extract Core Ideas:** Present only the most critical information. Remove all non-essential details.
2. **Extremely Simple Language:** Use very basic vocabulary. Avoid metaphors, idioms, or abstract concepts.
3. **Shortest Possible Sentences:** One main idea per sentence.
4. **Use Lists:** Present information as simple <ul> or <ol> lists instead of continuous paragraphs whenever possible.
5. **Remove Ambiguity:** Make every statement unambiguous and easy to interpret.
6. **Focus on Actions and Direct Facts:** Emphasize what needs to be done or what the key facts are.
7. **No Inferences:** State everything explicitly. Do not require the reader to draw conclusions.
8. **Maintain Original Meaning (Simplified):** Keep the absolute core meaning and strip away all complexity.
9. **Output Format:** Provide the simplified summary as an HTML fragment with a strong emphasis on lists.

**Original Text:**
{text_content}"#;

/// Low-vision / screen-reader optimisation.
pub const VISUAL_IMPAIRMENT_TEMPLATE: &str = r#"**Task:** Reformat and rewrite the provided text to be highly optimized for screen readers and users with low vision. The output should be exceptionally clear, well-structured, and easy to navigate.
**Specific Instructions:**
1. **Clear Headings:** Use descriptive <h1>, <h2> and <h3> headings that accurately reflect the content that follows.
2. **Logical Flow:** Organize information with a clear hierarchy and progression of ideas.
3. **Descriptive Link Text:** Link text must make sense out of context. Never use "click here".
4. **No Visual-Only Cues:** Do not convey information solely through color or position.
5. **Elaborate on Visuals:** If the text refers to images or charts, describe their key content or findings in words.
6. **Concise Paragraphs:** Keep paragraphs short.
7. **Use Lists:** Use <ul> or <ol> for items in a series, steps, or features.
8. **Avoid Special Characters and Emojis:** Stick to standard text characters.
9. **Maintain Original Meaning:** Preserve the accuracy and completeness of the original information.
10. **Output Format:** Provide the optimized text as a well-structured HTML fragment.

**Original Text:**
{text_content}"#;

/// ADHD key-point highlighting.
pub const ADHD_TEMPLATE: &str = r#"**Task:** Process the provided text to extract and highlight the most critical information for individuals with ADHD, aiming for maximum clarity and minimal cognitive load.
**Specific Instructions:**
1. **Summary First:** If the text is substantial, begin with <h2>Summary</h2> followed by 3-5 key bullet points. Omit the summary for short input.
2. **Headings:** Use clear <h2> and <h3> headings to break the content into logical sections.
3. **Short Paragraphs:** Split paragraphs longer than 5-6 sentences into shorter, focused <p> elements.
4. **Lists:** Convert implicit or explicit lists, steps, or related points into <ul> or <ol>.
5. **Bolding:** Use <strong> SPARINGLY for truly key terms, concepts, or action items. Never bold full sentences.
6. **Direct Language:** Use direct, action-oriented language. Remove tangents and redundant phrasing.
7. **Focus on "What do I need to know or do?":** Frame the output to answer this immediately.
8. **Output Format:** Provide the condensed, emphasized content as an HTML fragment.

**Original Text:**
{text_content}"#;

/// Plain-language / ESL rewrite.
pub const ESL_SIMPLE_ENGLISH_TEMPLATE: &str = r#"**Task:** Rewrite the provided text into very simple, clear, and unambiguous English, suitable for English as a Second Language (ESL) learners or those who prefer plain language.
**Specific Instructions:**
1. **Common Vocabulary:** Replace complex words, idioms, slang, and jargon with widely understood basic English words.
2. **Direct Sentence Structure:** Use subject-verb-object sentences. Avoid inversions and complex grammar.
3. **Short Sentences:** Break compound and complex sentences into shorter ones.
4. **Explain Concepts:** If a concept is complex, explain it briefly in simple terms.
5. **Avoid Phrasal Verbs:** Prefer single-word verbs (for example "start" instead of "kick off").
6. **Clarity Over Eloquence:** Prioritize ease of understanding over style.
7. **Maintain Original Meaning:** Convey the core message and all factual information accurately.
8. **Output Format:** Provide the simplified English text as an HTML fragment.

**Original Text:**
{text_content}"#;

/// General accessibility improvement; the fallback profile.
pub const DEFAULT_TEMPLATE: &str = r#"**Task:** Improve the overall accessibility of the provided text, making it clearer, more organized, and easier to understand for a general audience with diverse needs.
**Specific Instructions:**
1. **Clarity and Conciseness:** Simplify complex sentences and vocabulary without losing meaning. Remove redundancy.
2. **Logical Structure:** Organize the text with clear headings and paragraphs.
3. **Use Lists:** Convert lists of items or steps into <ul> or <ol>.
4. **Active Voice:** Prefer active voice over passive voice.
5. **Highlight Key Information:** Use <strong> sparingly to emphasize truly important points.
6. **Output Format:** Provide the improved text as a well-structured HTML fragment.

**Original Text:**
{text_content}"#;

/// Source-context line for the user instruction.
pub fn origin_line(origin: Option<&str>) -> String {
    let origin = origin.map(str::trim).filter(|o| !o.is_empty()).unwrap_or("Direct Input");
    format!("**Source Context (informational only, do not include in output):** `{origin}`")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_instruction_carries_all_output_constraints() {
        assert!(SYSTEM_INSTRUCTION.contains("<html>"));
        assert!(SYSTEM_INSTRUCTION.contains("<script>"));
        assert!(SYSTEM_INSTRUCTION.contains("onclick"));
        assert!(SYSTEM_INSTRUCTION.contains("SAFE TAGS ONLY"));
        assert!(SYSTEM_INSTRUCTION.contains("http, https or mailto"));
    }

    #[test]
    fn origin_line_defaults_to_direct_input() {
        assert!(origin_line(None).contains("`Direct Input`"));
        assert!(origin_line(Some("   ")).contains("`Direct Input`"));
        assert!(origin_line(Some("Science Article")).contains("`Science Article`"));
    }
}
