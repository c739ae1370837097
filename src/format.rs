//! Turning raw completions into what the web client displays.
//!
//! Chat replies only get their newlines converted to `<br>`. Quiz replies are
//! expected to contain one JSON quiz document, possibly wrapped in prose; the
//! object is cut out by brace scanning, parsed, and rendered as an HTML form.
//! Course outlines are markdown and are rendered with `pulldown-cmark`.

use serde::Deserialize;

use crate::error::PipelineError;

/// Replace each `\n` with `<br>`. Nothing else is touched.
pub fn html_line_breaks(text: &str) -> String {
    text.replace('\n', "<br>")
}

/// The substring from the first `{` to the last `}` inclusive.
///
/// Brace scanning does not understand JSON strings, so a stray `}` after the
/// document (or a `{` in preamble prose) yields text that will not parse.
pub fn extract_json_object(text: &str) -> Result<&str, PipelineError> {
    let malformed = |reason: &str| PipelineError::MalformedQuizOutput {
        reason: reason.to_string(),
        raw: text.to_string(),
    };
    let start = text.find('{').ok_or_else(|| malformed("no '{' in output"))?;
    let end = text.rfind('}').ok_or_else(|| malformed("no '}' in output"))?;
    if end < start {
        return Err(malformed("'}' precedes '{'"));
    }
    Ok(&text[start..=end])
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuizDocument {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: QuizOptions,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuizOptions {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

impl QuizOptions {
    /// Options as `(label, text)` in A–D order.
    pub fn labeled(&self) -> [(&'static str, &str); 4] {
        [
            ("A", self.a.as_str()),
            ("B", self.b.as_str()),
            ("C", self.c.as_str()),
            ("D", self.d.as_str()),
        ]
    }
}

/// Extract and parse the quiz document embedded in a completion.
pub fn parse_quiz(text: &str) -> Result<QuizDocument, PipelineError> {
    let json = extract_json_object(text)?;
    serde_json::from_str(json).map_err(|e| PipelineError::MalformedQuizOutput {
        reason: e.to_string(),
        raw: text.to_string(),
    })
}

/// Render a quiz as a radio-button form. Question and option text are escaped.
pub fn render_quiz_form(doc: &QuizDocument) -> String {
    let mut html = String::from("<form>\n");
    for (index, q) in doc.questions.iter().enumerate() {
        html.push_str(&format!(
            "<fieldset>\n<legend>Question {}:</legend>\n",
            index + 1
        ));
        html.push_str(&format!("<p>{}</p>\n", html_escape::encode_text(&q.question)));
        for (label, text) in q.options.labeled() {
            html.push_str(&format!(
                "<label><input type=\"radio\" name=\"question{index}\" value=\"{label}\"> {label}. {}</label><br>\n",
                html_escape::encode_text(text)
            ));
        }
        html.push_str("</fieldset>\n");
    }
    html.push_str("<input type=\"submit\" value=\"Submit\">\n</form>");
    html
}

/// Markdown to HTML, with tables and strikethrough enabled.
pub fn render_markdown(text: &str) -> String {
    use pulldown_cmark::{html, Options, Parser};

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(text, options);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
