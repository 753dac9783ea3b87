//! Session facade used by the automation run.
//!
//! An [`AiSession`] bundles the connection with the alert state and prompt
//! templates. Its public operations never fail: any error is reported
//! through the [`AlertGate`] and turned into `None`, so one bad answer does
//! not stop the run.

use std::fmt::Write;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::alert::AlertGate;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::invoke::{CallOptions, CompletionRequest};
use crate::ladder::{OutputSchema, Resolution, StructuredRequest};
use crate::prompts::PromptTemplates;

/// Placeholder meaning "value unknown" in scraped job data.
const UNKNOWN: &str = "Unknown";

/// Form control a question is asked through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Single-line text input.
    #[default]
    Text,
    /// Multi-line text input.
    #[serde(rename = "textarea")]
    TextArea,
    /// Pick exactly one option.
    SingleSelect,
    /// Pick any number of options.
    MultipleSelect,
}

impl QuestionType {
    /// Whether answers must come from a list of options.
    #[must_use]
    pub const fn is_select(&self) -> bool {
        matches!(self, Self::SingleSelect | Self::MultipleSelect)
    }
}

/// An application question plus optional context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionRequest {
    /// The question text.
    pub question: String,
    /// Options for select questions.
    pub options: Vec<String>,
    /// How the question is asked.
    pub question_type: QuestionType,
    /// Job description, if scraped.
    pub job_description: Option<String>,
    /// Company description, if scraped.
    pub about_company: Option<String>,
    /// Résumé-like information about the candidate.
    pub user_information: Option<String>,
    /// Stream the reply; `None` uses the connection default.
    pub stream: Option<bool>,
}

impl QuestionRequest {
    /// Create a free-text question.
    #[must_use]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    /// Set the answer options and question type.
    #[must_use]
    pub fn with_options<I, S>(mut self, question_type: QuestionType, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.question_type = question_type;
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Attach the job description.
    #[must_use]
    pub fn with_job_description(mut self, text: impl Into<String>) -> Self {
        self.job_description = Some(text.into());
        self
    }

    /// Attach the company description.
    #[must_use]
    pub fn with_about_company(mut self, text: impl Into<String>) -> Self {
        self.about_company = Some(text.into());
        self
    }

    /// Attach candidate information.
    #[must_use]
    pub fn with_user_information(mut self, text: impl Into<String>) -> Self {
        self.user_information = Some(text.into());
        self
    }

    /// Force streaming on or off.
    #[must_use]
    pub const fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }
}

/// Skills extracted from a job description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RequiredSkills {
    /// Languages, frameworks and tools.
    pub tech_stack: Vec<String>,
    /// Technical abilities not tied to one tool.
    pub technical_skills: Vec<String>,
    /// Soft skills and domain knowledge.
    pub other_skills: Vec<String>,
    /// Skills the posting marks as mandatory.
    pub required_skills: Vec<String>,
    /// Skills the posting marks as a plus.
    pub nice_to_have: Vec<String>,
}

impl RequiredSkills {
    /// Schema declared to schema-capable backends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the generated schema cannot be converted.
    pub fn output_schema() -> Result<OutputSchema> {
        let mut schema = serde_json::to_value(schemars::schema_for!(RequiredSkills))?;
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("$schema");
        }
        Ok(OutputSchema::new("Skills_Extraction_Response", schema))
    }
}

/// Document-generation agents whose behavior is not defined yet.
///
/// Every method fails with [`Error::Unsupported`] unless an implementor
/// provides it.
#[async_trait]
pub trait DocumentAgents {
    /// Tailor the candidate's experience section to a job.
    async fn generate_experience(
        &self,
        _job_description: &str,
        _about_company: &str,
        _required_skills: &RequiredSkills,
        _user_experience: &Value,
    ) -> Result<Value> {
        Err(Error::unsupported("experience generation"))
    }

    /// Generate a résumé for a job.
    async fn generate_resume(
        &self,
        _job_description: &str,
        _about_company: &str,
        _required_skills: &RequiredSkills,
    ) -> Result<Value> {
        Err(Error::unsupported("resume generation"))
    }

    /// Generate a cover letter for a job.
    async fn generate_cover_letter(
        &self,
        _job_description: &str,
        _about_company: &str,
        _required_skills: &RequiredSkills,
    ) -> Result<Value> {
        Err(Error::unsupported("cover letter generation"))
    }

    /// Score a résumé against a job.
    async fn evaluate_resume(
        &self,
        _job_description: &str,
        _about_company: &str,
        _required_skills: &RequiredSkills,
        _resume: &str,
    ) -> Result<Value> {
        Err(Error::unsupported("resume evaluation"))
    }

    /// Judge whether a job is worth applying to.
    async fn check_job_relevance(&self, _job_description: &str, _about_company: &str) -> Result<Value> {
        Err(Error::unsupported("job relevance check"))
    }
}

/// Connection plus the per-run state around it.
#[derive(Debug)]
pub struct AiSession {
    connection: Connection,
    alerts: AlertGate,
    prompts: PromptTemplates,
    options: CallOptions,
}

impl AiSession {
    /// Create a session over an open connection.
    #[must_use]
    pub fn new(connection: Connection, alerts: AlertGate) -> Self {
        Self {
            connection,
            alerts,
            prompts: PromptTemplates::default(),
            options: CallOptions::default(),
        }
    }

    /// Replace the prompt templates.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptTemplates) -> Self {
        self.prompts = prompts;
        self
    }

    /// Use these call options (deadline, cancellation) for every request.
    #[must_use]
    pub fn with_call_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The alert state.
    #[must_use]
    pub const fn alerts(&self) -> &AlertGate {
        &self.alerts
    }

    /// Answer an application question, or `None` if no answer could be produced.
    pub async fn answer_question(&self, request: &QuestionRequest) -> Option<String> {
        match self.try_answer_question(request).await {
            Ok(answer) => Some(answer),
            Err(e) => {
                self.alerts.report("Error occurred while answering question.", &e).await;
                None
            }
        }
    }

    /// Answer an application question.
    ///
    /// # Errors
    ///
    /// Propagates any backend, cancellation, or timeout error.
    pub async fn try_answer_question(&self, request: &QuestionRequest) -> Result<String> {
        info!(question = %request.question, "answering question");
        let prompt = self.answer_prompt(request);
        debug!(%prompt, "answer prompt");

        let mut completion = CompletionRequest::user(prompt);
        completion.stream = request.stream;
        let result = self.connection.invoke(&completion, &self.options).await?;

        let answer = match result.as_text() {
            Some(text) => text.trim().to_owned(),
            None => result.into_value().to_string(),
        };
        Ok(answer)
    }

    /// Extract skills from a job description, or `None` on failure.
    ///
    /// The value may be the parse-failure sentinel.
    pub async fn extract_skills(&self, job_description: &str) -> Option<Value> {
        match self.try_extract_skills(job_description, None).await {
            Ok(resolution) => Some(resolution.value),
            Err(e) => {
                self.alerts
                    .report("Error occurred while extracting skills from job description.", &e)
                    .await;
                None
            }
        }
    }

    /// Extract skills through the fallback ladder.
    ///
    /// # Errors
    ///
    /// Propagates failures the ladder does not absorb.
    pub async fn try_extract_skills(&self, job_description: &str, stream: Option<bool>) -> Result<Resolution> {
        info!("extracting skills from job description");
        let prompt = self.prompts.extract_skills.render(&[job_description]);
        let mut request = StructuredRequest::new(prompt, RequiredSkills::output_schema()?);
        request.stream = stream;
        self.connection.resolve_structured(&request, &self.options).await
    }

    /// Close the underlying connection. Safe to call more than once.
    pub fn close(&self) {
        self.connection.close();
    }

    fn answer_prompt(&self, request: &QuestionRequest) -> String {
        let user_information = request
            .user_information
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("N/A");
        let mut prompt = self
            .prompts
            .answer_question
            .render(&[user_information, &request.question]);

        if request.question_type.is_select() && !request.options.is_empty() {
            let _ = write!(prompt, "\nOptions ({}):", select_hint(request.question_type));
            for option in &request.options {
                let _ = write!(prompt, "\n- {option}");
            }
        }
        if let Some(jd) = known(request.job_description.as_deref()) {
            let _ = write!(prompt, "\nJob Description:\n{jd}");
        }
        if let Some(company) = known(request.about_company.as_deref()) {
            let _ = write!(prompt, "\nAbout the Company:\n{company}");
        }
        prompt
    }
}

impl DocumentAgents for AiSession {}

fn known(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty() && *v != UNKNOWN)
}

const fn select_hint(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::MultipleSelect => "pick all that apply",
        _ => "pick exactly one",
    }
}
