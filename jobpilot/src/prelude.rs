//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use jobpilot::prelude::*;
//! ```

pub use crate::alert::{AlertGate, ConfirmSink, SilentSink};
pub use crate::capability::{CapabilityPolicy, ModelCapabilities};
pub use crate::config::{AiConfig, BackendFamily};
pub use crate::connection::Connection;
pub use crate::error::{BackendError, BackendErrorKind, ConfigError, Error, Result};
pub use crate::invoke::{CallOptions, CompletionRequest, CompletionResult};
pub use crate::ladder::{ErrorSignature, OutputSchema, Resolution, Strategy, StructuredRequest};
pub use crate::message::{Message, Role};
pub use crate::normalize::{is_sentinel, normalize};
pub use crate::prompts::{PromptTemplate, PromptTemplates};
pub use crate::session::{AiSession, DocumentAgents, QuestionRequest, QuestionType, RequiredSkills};
pub use crate::wire::ResponseFormat;
