//! Fixed prompt texts sent to the reasoning service.
//!
//! Static texts are constants; prompts that depend on configuration (counts,
//! delimiter, length caps) or on an anchor node are built by functions so
//! that the parsers in [`parser`](crate::insightgraph::parser) always look
//! for the same delimiter the prompt asked for.

use crate::insightgraph::config::InsightGraphConfig;
use crate::insightgraph::search::SearchResult;

/// System instructions for a freshly created reasoning identity.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You will use the attached data as the database for a mind map of findings. First perform basic \
analyses that derive correlations and distributions between the columns (variables) of the data \
and return them. The user will then ask for more open-ended analysis and for creative \
interpretations of the correlations and connections. Do not ask follow-up questions or suggest \
future directions; answer the instruction and only the instruction.
You are a data scientist focused on identifying valuable features in datasets and uncovering \
high-level causal relationships between variables. Techniques to use: correlation analysis \
(correlation coefficients between numerical columns), cross-tabulation (contingency tables for \
categorical variables), time series analysis (trends and seasonal patterns), and combining \
columns into more meaningful derived features.";

/// Formatting guidance appended to every level-1 candidate prompt.
pub const LEVEL_ONE_SUFFIX: &str = " Be precise with your results. Any plots should be made with \
matplotlib and seaborn, have clearly defined axes, and must not be convoluted by heat maps or \
alpha values where another graph type fits. Use histograms for continuous values and bar graphs \
for discrete values. Aggregate values that are very volatile over time.";

/// Score request appended to the title prompt when the surprise gate is on.
pub const SURPRISE_SUFFIX: &str = " Include a 'surprising' score from 1 to 10 at the end to \
indicate how boring or generic the finding is. Example format: \
{\"title\": \"...\", \"surprising\": 5}";

/// Root prompt asking for `candidate_prompt_count` delimited analysis instructions.
pub fn initial_prompt(config: &InsightGraphConfig) -> String {
    let n = config.candidate_prompt_count;
    let d = &config.delimiter;
    format!(
        "Generate {n} (it must be exactly {n}) possible instructions for the dataset provided. \
         Instructions should be unique and precise. Wrap each instruction in {d} before and {d} \
         after it (this is required). Be concise, and make every instruction different in nature."
    )
}

/// Level-1 branch prompt: candidate text followed by the formatting guidance.
pub fn level_one_prompt(candidate: &str) -> String {
    format!("{}{}", candidate, LEVEL_ONE_SUFFIX)
}

/// Title prompt, with the surprise-score request when the gate is enabled.
pub fn title_prompt(config: &InsightGraphConfig) -> String {
    let mut prompt = format!(
        "Summarize the key findings in one sentence <= {} characters.",
        config.one_liner_max_chars
    );
    if config.surprise_gate.enabled {
        prompt.push_str(SURPRISE_SUFFIX);
    }
    prompt
}

/// Prompt asking for `question_count` delimited follow-up questions.
pub fn question_prompt(config: &InsightGraphConfig) -> String {
    let d = &config.delimiter;
    format!(
        "Generate {} follow-up questions that a user might ask about the finding. The questions \
         should focus on clarifying difficult terms or on the implications of the causal \
         relationships found. Wrap each question in {d} before and {d} after it (this is \
         important).",
        config.question_count
    )
}

/// Level-1.5 prompt: the question or user text plus the answer constraints.
pub fn continuation_prompt(question: &str, config: &InsightGraphConfig) -> String {
    format!(
        "{} Use the previous responses in this thread to answer the question. Limit the \
         response to <= {} characters. Cite any sources or papers when referring to external \
         concepts or ideas.",
        question, config.answer_max_chars
    )
}

/// Level-2 prompt asking the service to phrase a search query from an anchor finding.
pub fn search_query_prompt(anchor_title: &str, anchor_text: &str) -> String {
    format!(
        "Our findings about {title} suggest the following trends:\n{text}\n\
         Now create a web search query that uses this information.\n\n\
         Include only relevant, trusted sources. Focus on journals or articles that delve into \
         statistical analyses or provide clear empirical evidence.\n\n\
         Example query: \"Here's a great article on the relationship between {title} and its \
         long-term implications:\"\n\n\
         Follow this guide when crafting the query:\n\
         1. Phrase it as a statement: \"Here's a great article about X:\" works better than \
         \"What is X?\"\n\
         2. Add context: include modifiers such as \"academic\" or specific websites to narrow \
         the results.\n\
         3. End with a colon: effective queries end with \":\", mimicking natural link sharing.\n\
         Reply with the query only.",
        title = anchor_title,
        text = anchor_text
    )
}

/// Level-2 branch prompt relating one search result back to the anchor finding.
///
/// The reply must contain a delimited summary followed by a delimited title.
pub fn relate_prompt(
    result: &SearchResult,
    anchor_title: &str,
    anchor_text: &str,
    config: &InsightGraphConfig,
) -> String {
    let d = &config.delimiter;
    format!(
        "You have a summary of a new source, {source}, which reads: {summary}. Explain how this \
         relates to the previous information \"{title}\" with text: {text}. Output a summary \
         enclosed in {d} and then a title based on that summary, one sentence <= {cap} \
         characters, also enclosed in {d} (both the summary and the title must be enclosed in \
         {d}). Heavily emphasize the connection to the previous information, and give a little \
         context about the new source.",
        source = result.title,
        summary = result.summary.as_deref().unwrap_or("(no summary available)"),
        title = anchor_title,
        text = anchor_text,
        cap = config.one_liner_max_chars,
    )
}
