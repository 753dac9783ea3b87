//! Prompt templates.
//!
//! Templates are opaque strings with positional `{}` placeholders, filled in
//! order. `{{` and `}}` render literal braces so templates can show JSON
//! examples.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A prompt with positional `{}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    /// Wrap a template string.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// The raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of `{}` placeholders.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        self.walk(|piece| {
            if piece.is_none() {
                count += 1;
            }
        });
        count
    }

    /// Fill the placeholders in order.
    ///
    /// Missing arguments render as empty strings; surplus ones are ignored.
    #[must_use]
    pub fn render(&self, args: &[&str]) -> String {
        let mut out = String::with_capacity(self.0.len() + args.iter().map(|a| a.len()).sum::<usize>());
        let mut args = args.iter();
        self.walk(|piece| match piece {
            Some(text) => out.push_str(text),
            None => out.push_str(args.next().copied().unwrap_or_default()),
        });
        out
    }

    // Calls `f` with literal runs (`Some`) and placeholders (`None`).
    fn walk<'a>(&'a self, mut f: impl FnMut(Option<&'a str>)) {
        let s = self.0.as_str();
        let bytes = s.as_bytes();
        let mut start = 0;
        let mut i = 0;
        while i < bytes.len() {
            let pair = bytes.get(i + 1).copied();
            match (bytes[i], pair) {
                (b'{', Some(b'{')) | (b'}', Some(b'}')) => {
                    f(Some(&s[start..=i]));
                    i += 2;
                    start = i;
                }
                (b'{', Some(b'}')) => {
                    f(Some(&s[start..i]));
                    f(None);
                    i += 2;
                    start = i;
                }
                _ => i += 1,
            }
        }
        f(Some(&s[start..]));
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PromptTemplate {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Answers an application question. Placeholders: user information, question.
pub const ANSWER_QUESTION: &str = r"You are filling in a job application on behalf of a candidate.
Answer the question below truthfully, using only the candidate information provided.
Keep the answer short: a number for numeric questions, one of the given options for
choice questions, and at most a few sentences for free-text questions.
Do not add explanations, greetings, or markdown.

Candidate information:
{}

Question:
{}
";

/// Extracts skills from a job description. Placeholder: job description.
pub const EXTRACT_SKILLS: &str = r#"Extract the skills a recruiter would look for in the job description below.
Return a JSON object with exactly these keys, each holding a list of short strings:
{{"tech_stack": [], "technical_skills": [], "other_skills": [], "required_skills": [], "nice_to_have": []}}

Job description:
{}
"#;

/// The templates a session renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplates {
    /// Question-answering prompt.
    pub answer_question: PromptTemplate,
    /// Skill-extraction prompt.
    pub extract_skills: PromptTemplate,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            answer_question: ANSWER_QUESTION.into(),
            extract_skills: EXTRACT_SKILLS.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_in_order() {
        let t = PromptTemplate::new("Hi {}, you are {}.");
        assert_eq!(t.render(&["Ann", "hired"]), "Hi Ann, you are hired.");
        assert_eq!(t.placeholder_count(), 2);
    }

    #[test]
    fn test_render_missing_and_surplus() {
        let t = PromptTemplate::new("[{}|{}]");
        assert_eq!(t.render(&["a"]), "[a|]");
        assert_eq!(t.render(&["a", "b", "c"]), "[a|b]");
    }

    #[test]
    fn test_render_escaped_braces() {
        let t = PromptTemplate::new(r#"{{"k": "{}"}}"#);
        assert_eq!(t.render(&["v"]), r#"{"k": "v"}"#);
        assert_eq!(t.placeholder_count(), 1);
    }

    #[test]
    fn test_render_unicode() {
        let t = PromptTemplate::new("café {} → ok");
        assert_eq!(t.render(&["naïve"]), "café naïve → ok");
    }

    #[test]
    fn test_default_templates() {
        let templates = PromptTemplates::default();
        assert_eq!(templates.answer_question.placeholder_count(), 2);
        assert_eq!(templates.extract_skills.placeholder_count(), 1);
        assert!(templates
            .extract_skills
            .render(&["Rust"])
            .contains(r#"{"tech_stack": []"#));
    }
}
