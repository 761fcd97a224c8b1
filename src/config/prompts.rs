//! Prompt templates for Spana.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub agent: AgentPrompts,
    pub qualification: QualificationPrompts,
    pub outreach: OutreachPrompts,
    pub followup: FollowupPrompts,
    pub chat: ChatPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}


/// Prompts for the lead research agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub system: String,
    pub user: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a lead research agent. Your goal is to find, qualify, and enrich company leads that match the user's ideal customer profile (ICP).

You have three tools:

1. web_search - Search the web. Use specific queries to find company websites and profile pages that match the ICP.
2. web_ingest - Scrape a list of URLs and store their content in a searchable knowledge base. Run this on the URLs you found before trying to extract details from them.
3. vector_query - Ask questions against the ingested content. This is how you extract concrete details (name, location, industry, contacts, size) from the pages you ingested.

Work through this process:

Step 1: Derive an ICP from the user's request (target industry, company size, geography).
Step 2: Use web_search with several specific queries to build a list of candidate company URLs.
Step 3: Use web_ingest on the collected URLs and wait for confirmation.
Step 4: Use vector_query to pull out basic details for each candidate.
Step 5: For promising candidates, run further search/ingest/query cycles to enrich the record (contacts, size, anything notable).
Step 6: When you have enough, finish with the final answer.

Your final answer must be a single valid JSON object of this shape, with no surrounding prose:

{
    "companies": [
        {
            "name": "Harbor Point Suites",
            "location": "Charleston, SC",
            "industry": "Hospitality - Boutique Hotels",
            "contact": "frontdesk@harborpointsuites.com",
            "size": "50-200 employees",
            "extra_info": "Three properties, expanding to a fourth in 2025"
        }
    ]
}

Use null for fields you could not determine. Include only companies you actually found evidence for; never invent entries."#
                .to_string(),

            user: r#"Find leads for the following request.

{{objective}}"#
                .to_string(),
        }
    }
}

/// Prompts for the lead qualification stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualificationPrompts {
    pub system: String,
    pub user: String,
}

impl Default for QualificationPrompts {
    fn default() -> Self {
        Self {
            system: r#"You qualify sales leads. Given researched company data and excerpts from their web presence, decide how well each company fits the stated objective and enrich the record.

Respond with a single valid JSON object:

{
    "companies": [
        {
            "name": "...",
            "location": "...",
            "industry": "...",
            "contact": "...",
            "size": "...",
            "fit_score": 8,
            "fit_reason": "One sentence on why this company does or does not fit."
        }
    ]
}

fit_score is an integer from 1 (poor fit) to 10 (ideal fit). Keep every company from the input, even poor fits. No prose outside the JSON."#
                .to_string(),

            user: r#"Objective:
{{objective}}

Researched leads:
{{lead}}

Relevant excerpts from ingested pages:
{{context}}"#
                .to_string(),
        }
    }
}

/// Prompts for outreach email generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutreachPrompts {
    pub system: String,
    pub user: String,
}

impl Default for OutreachPrompts {
    fn default() -> Self {
        Self {
            system: r#"You write first-touch outreach emails for B2B sales. Write one short, personalized email to the best-fitting lead. Reference something specific about the company so it does not read as a mass send. No subject-line options, no placeholders like [Name] unless the contact name is genuinely unknown, no markdown. Output only the email text, starting with the subject on a "Subject:" line."#
                .to_string(),

            user: r#"Objective:
{{objective}}

Qualified leads (pick the best fit):
{{qualified_lead}}"#
                .to_string(),
        }
    }
}

/// Prompts for follow-up planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowupPrompts {
    pub system: String,
    pub user: String,
}

impl Default for FollowupPrompts {
    fn default() -> Self {
        Self {
            system: r#"You plan sales follow-up sequences. Given a qualified lead and the outreach email already sent, produce a short follow-up plan: 2-4 touches with timing (in days after the first email), channel, and a one-line angle for each. Plain text, one touch per line."#
                .to_string(),

            user: r#"Qualified leads:
{{qualified_lead}}

Outreach email that was sent:
{{outreach_email}}"#
                .to_string(),
        }
    }
}

/// Prompt for the interactive chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPrompts {
    pub system: String,
}

impl Default for ChatPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a lead research assistant. You help the user find and understand company leads using your tools: web_search to find pages, web_ingest to index them, and vector_query to extract details from indexed pages.

In this conversation:
- Use the tools when the user asks for research; answer directly when they ask about something already discussed
- Say what you found and where it came from
- If the knowledge base has nothing relevant, say so instead of guessing
- Ask a clarifying question when the target profile is too vague to search for"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        // Store custom variables
        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            // Load agent prompts if file exists
            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }

            // Load qualification prompts if file exists
            let qualification_path = custom_path.join("qualification.toml");
            if qualification_path.exists() {
                let content = std::fs::read_to_string(&qualification_path)?;
                prompts.qualification = toml::from_str(&content)?;
            }

            // Load outreach prompts if file exists
            let outreach_path = custom_path.join("outreach.toml");
            if outreach_path.exists() {
                let content = std::fs::read_to_string(&outreach_path)?;
                prompts.outreach = toml::from_str(&content)?;
            }

            // Load follow-up prompts if file exists
            let followup_path = custom_path.join("followup.toml");
            if followup_path.exists() {
                let content = std::fs::read_to_string(&followup_path)?;
                prompts.followup = toml::from_str(&content)?;
            }

            // Load chat prompts if file exists
            let chat_path = custom_path.join("chat.toml");
            if chat_path.exists() {
                let content = std::fs::read_to_string(&chat_path)?;
                prompts.chat = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        // Start with custom variables, then override with provided vars
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.agent.system.is_empty());
        assert!(!prompts.qualification.system.is_empty());
        assert!(!prompts.outreach.system.is_empty());
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = std::collections::HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }
}
