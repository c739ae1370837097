//! Prompt policies and prompt composition.
//!
//! A [`PromptPolicy`] decides three things for an assistant variant: its
//! system prompt, how retrieved context and the user's text are wrapped into
//! the outgoing user message, and which formatter its reply goes through.
//!
//! [`compose`] never touches the history it is given. It returns a new
//! message list (history plus one composed user message), and when there is
//! no retrieved context it uses the policy's context-free template verbatim.

use rand::seq::IndexedRandom;
use rand::Rng;
use crate::models::{Chunk, Message};

const GENERAL_SYSTEM_PROMPT: &str = "You are an assistant knowledgeable about AI and GPUs. \
You have access to a knowledge base of documents that you can reference to provide accurate information.";

const SOCRATIC_SYSTEM_PROMPT: &str = "You are a Socratic tutor who guides users to discover answers through questioning and critical thinking.
Your goal is to help users reach understanding through self-reflection and logical reasoning. If the user is referring to a specific subject matter, please ask questions regarding the subject only

Follow these principles:
1. Ask probing questions instead of giving direct answers
2. Help users examine their assumptions
3. Guide them to break down complex problems into simpler parts
4. Encourage users to find connections between ideas
5. Use analogies to relate abstract concepts to familiar ones

When you have access to relevant information from the knowledge base, use it to formulate better questions rather than simply stating facts.";

const QUIZ_SYSTEM_PROMPT: &str = r#"Task: Generate a string input format for a multiple-choice question (MCQ) quiz about a specified topic.

Instructions:
Generate 10 multiple-choice questions (MCQs) based on the specified topic.
Each question should begin with a question phrase (e.g., "What", "Which", "In what year", etc.).
Follow each question with four options labeled A, B, C, and D.
Each option should be a plausible answer to the question.
Conclude with the correct answer, labeled as "Answer: [Correct Option]".

Please format the output as follows:
{
    "questions": [
        {
            "question": "What year was Elon Musk born?",
            "options": {
                "A": "1970",
                "B": "1971",
                "C": "1972",
                "D": "1973"
            },
            "answer": "B"
        },
        ...
    ]
}
"#;

const COURSE_SYSTEM_PROMPT: &str = "You are an expert course creator and educator. You can create comprehensive courses \
on various topics, adapting the content's complexity, depth, and vocabulary to the specified requirements. \
Your courses include clear learning objectives, structured lessons, practical examples, exercises, and assessments.";

const PLAIN_SYSTEM_PROMPT: &str = "You are a helpful assistant";

/// Question templates the Socratic tutor suggests as an angle; `{topic}` is
/// replaced with a keyword from the user's question.
pub const SOCRATIC_TEMPLATES: [&str; 8] = [
    "What do you think are the key aspects of {topic}?",
    "How would you compare {topic} to something you're familiar with?",
    "What assumptions are we making about {topic}?",
    "Can you break down {topic} into its fundamental components?",
    "What evidence would support or challenge your view on {topic}?",
    "How might someone with a different perspective view {topic}?",
    "What are the implications if your understanding of {topic} is correct?",
    "How does {topic} relate to what you already know?",
];

/// Number of questions the quiz policy asks for.
pub const QUIZ_QUESTION_COUNT: usize = 10;

/// Parameters for a generated course outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseParams {
    pub level: String,
    pub audience: String,
    pub duration: String,
    pub depth: String,
}

impl Default for CourseParams {
    fn default() -> Self {
        Self {
            level: "intermediate".to_string(),
            audience: "general".to_string(),
            duration: "4 hours".to_string(),
            depth: "moderate".to_string(),
        }
    }
}

/// Per-variant rules for prompt composition and output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPolicy {
    /// Document-grounded general assistant.
    General,
    /// Tutor that only asks probing questions.
    Socratic,
    /// Ten-question multiple-choice quiz as JSON.
    Quiz,
    /// Markdown course outline.
    Course(CourseParams),
    /// One-shot helpful assistant with no document context.
    Plain,
}

impl PromptPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            PromptPolicy::General => "general",
            PromptPolicy::Socratic => "socratic",
            PromptPolicy::Quiz => "quiz",
            PromptPolicy::Course(_) => "course",
            PromptPolicy::Plain => "plain",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            PromptPolicy::General => GENERAL_SYSTEM_PROMPT,
            PromptPolicy::Socratic => SOCRATIC_SYSTEM_PROMPT,
            PromptPolicy::Quiz => QUIZ_SYSTEM_PROMPT,
            PromptPolicy::Course(_) => COURSE_SYSTEM_PROMPT,
            PromptPolicy::Plain => PLAIN_SYSTEM_PROMPT,
        }
    }

    /// Whether this policy uses retrieved document context at all.
    pub fn uses_context(&self) -> bool {
        !matches!(self, PromptPolicy::Plain)
    }
}

/// Build the outgoing message list: `history` followed by one composed user
/// message. `history` itself is left as it was.
pub fn compose<R: Rng + ?Sized>(
    policy: &PromptPolicy,
    history: &[Message],
    user_text: &str,
    context_chunks: &[Chunk],
    rng: &mut R,
) -> Vec<Message> {
    let context = join_context(context_chunks);
    let content = match policy {
        PromptPolicy::General => general_prompt(user_text, &context),
        PromptPolicy::Socratic => socratic_prompt(user_text, &context, rng),
        PromptPolicy::Quiz => quiz_prompt(user_text, &context),
        PromptPolicy::Course(params) => course_prompt(user_text, params, &context),
        PromptPolicy::Plain => user_text.to_string(),
    };

    let mut outgoing = Vec::with_capacity(history.len() + 1);
    outgoing.extend_from_slice(history);
    outgoing.push(Message::user(content));
    outgoing
}

fn join_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn general_prompt(query: &str, context: &str) -> String {
    if context.is_empty() {
        return query.to_string();
    }
    format!(
        "Based on the following context and the conversation history, please answer the user's question.

Context:
{context}

User Question: {query}

Please provide a detailed response, citing specific information from the context when relevant."
    )
}

fn socratic_prompt<R: Rng + ?Sized>(query: &str, context: &str, rng: &mut R) -> String {
    if context.is_empty() {
        return format!(
            "Guide the user through understanding their question using Socratic questioning:

User Question: {query}

Remember to ask thought-provoking questions that lead to deeper understanding."
        );
    }

    let suggestion = suggested_question(query, rng);
    format!(
        "Based on the following context and the conversation history, guide the user through understanding their question using Socratic questioning.

Context:
{context}

User Question: {query}

Remember to:
1. Ask thought-provoking questions that lead to deeper understanding
2. Use the context to inform your questions, but don't directly state the information
3. Help the user discover connections and insights on their own
4. Guide them to examine their assumptions and reasoning

Choose or adapt relevant questions from:
{suggestion}"
    )
}

/// Salient keywords: lowercased whitespace tokens longer than three characters.
pub fn key_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|term| term.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

/// A random template filled with a random keyword from `query`.
pub fn suggested_question<R: Rng + ?Sized>(query: &str, rng: &mut R) -> String {
    let terms = key_terms(query);
    let topic = terms
        .choose(rng)
        .map(String::as_str)
        .unwrap_or("this topic");
    let template = SOCRATIC_TEMPLATES
        .choose(rng)
        .copied()
        .unwrap_or(SOCRATIC_TEMPLATES[0]);
    template.replace("{topic}", topic)
}

fn quiz_prompt(topic: &str, context: &str) -> String {
    let request = format!(
        "Generate {QUIZ_QUESTION_COUNT} multiple-choice questions (MCQs) about the following topic:\n{topic}\n"
    );
    if context.is_empty() {
        return request;
    }
    format!("{request}\nUse the following reference material:\n{context}\n")
}

fn course_prompt(topic: &str, params: &CourseParams, context: &str) -> String {
    let mut prompt = format!(
        "Please create a comprehensive course on {topic} with the following specifications:

Level: {level}
Target Audience: {audience}
Estimated Duration: {duration}
Depth: {depth}

The course should include:
1. Course Overview and Learning Objectives
2. Prerequisites (if any)
3. Detailed Lesson Plans with:
   - Theoretical concepts
   - Practical examples
   - Code snippets (if applicable)
   - Exercises
   - Knowledge checks
4. Final Assessment
5. Additional Resources

Please format the content with:
- Code snippets in backticks
- Important terms in bold
- Key points in italics
- Clear section headers using markdown
- Numbered lists for steps
- Bullet points for lists

Context from available documents will be incorporated where relevant.",
        level = params.level,
        audience = params.audience,
        duration = params.duration,
        depth = params.depth,
    );
    if !context.is_empty() {
        prompt.push_str("\n\nRelevant Context:\n");
        prompt.push_str(context);
    }
    prompt
}
