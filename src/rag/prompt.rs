// file: src/rag/prompt.rs
// description: instruction prompt template with {context}, {question} and {language} slots
// reference: Internal code standards

use crate::config::PromptConfig;
use crate::error::{Result, WorkbenchError};
use crate::models::RetrievedChunk;

pub const DEFAULT_TEMPLATE: &str = "### [INST] \n Instructions: Answer in {language}, and take the following context in mind:\n\n{context}\n\n### Question to answer:\n{question} \n\n[/INST]";

const SLOTS: [&str; 3] = ["context", "question", "language"];

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    language: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>, language: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains("{question}") {
            return Err(WorkbenchError::Configuration(
                "prompt template must contain a {question} slot".to_string(),
            ));
        }
        Ok(Self {
            template,
            language: language.into(),
        })
    }

    pub fn from_config(config: &PromptConfig) -> Result<Self> {
        Self::new(
            config.template.as_deref().unwrap_or(DEFAULT_TEMPLATE),
            config.language.clone(),
        )
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn render(&self, question: &str, context: &[RetrievedChunk]) -> String {
        let context = context
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.fill(&context, question)
    }

    /// Single pass over the template: text substituted into a slot is never rescanned.
    fn fill(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let slot = after
                .find('}')
                .map(|close| &after[..close])
                .filter(|name| SLOTS.contains(name));
            match slot {
                Some(name) => {
                    out.push_str(match name {
                        "context" => context,
                        "question" => question,
                        _ => &self.language,
                    });
                    rest = &after[name.len() + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}
