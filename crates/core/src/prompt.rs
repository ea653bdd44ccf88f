//! Prompt construction for behavioural analysis requests.
//!
//! Each [`ResponseFormat`] owns one static template. Templates contain `{behavior}`,
//! `{antecedent}`, `{consequence}` and `{previous_attempts}` placeholders which are substituted in
//! a single pass over the template, so caller text that happens to contain a placeholder is never
//! expanded a second time.

use crate::format::ResponseFormat;
use crate::llm::ChatMessage;
use crate::model::AnalysisRequest;

/// System persona sent ahead of every analysis prompt.
pub const SYSTEM_PERSONA: &str = "You are a psychologist specializing in behavioral analysis and radical behaviorism. Provide accurate analyses and practical suggestions based on scientific evidence.";

const ANALYSIS_PREAMBLE: &str = r#"Functional behavioral analysis based on radical behaviorism and intervention technique suggestions [or habits]

BEHAVIORAL DATA:
- Current behavior you want to analyze: "{behavior}"
- Context or environment in which the behavior occurs: "{antecedent}"
- Immediate consequences of the analyzed behavior (what happens right after the behavior): "{consequence}"
- Previous attempts to change the analyzed behavior: "{previous_attempts}"

INSTRUCTIONS:
1. First, perform a functional analysis based on radical behaviorism and show the behavioral pattern considering:
* The context/environment in which the behavior occurs and the immediate consequence of the behavior
- Frequency and intensity of the behavior
- Other contexts/environments where the same behavior occurs
- Short and long-term consequences
- Behavioral excesses and deficits resulting from the established pattern
- Impact on daily functioning
- Potential barriers to change
- Strengths from previous attempts

2. Based on this analysis, suggest 3-4 practical habits. For each habit, provide:
- Habit name: short and clear title
- Description: brief explanation of the habit
- Implementation: detailed step-by-step execution
- Scientific basis: reference or evidence supporting this habit
"#;

const V1_RESPONSE_FORMAT: &str = r#"
RESPONSE FORMAT (please use this format and the exact keywords - DO NOT CHANGE THE WORD 'Habits:'):
GENERAL:
[Behavioral analysis, more than 3 paragraphs]

Habits:
1. **[Habit name]**
   - **Description:** [brief description]
   - **Implementation:** [detailed steps]
   1. [first step]
   2. [second step]
   3. [third step]
   - **Scientific Basis:** [reference or evidence]

[Repeat format for each suggested habit, separated by one blank line]

IMPORTANT: You MUST use exactly "Habits:" as the section header for the habits list. Do not use any other variations like "Recommended habits", "Suggested habits", etc. Do not leave blank lines inside a habit. The exact keyword "Habits:" is required for proper parsing of the response."#;

const V2_RESPONSE_FORMAT: &str = r####"
RESPONSE FORMAT (please use this format and the exact keywords - DO NOT CHANGE THE HEADING '### Habit'):
GENERAL:
[Behavioral analysis, more than 3 paragraphs]

### Habit 1: [Habit name]
- **Description:** [brief description]
- **Implementation:**
1. [first step]
2. [second step]
3. [third step]
- **Scientific Basis:** [reference or evidence]

[Repeat the "### Habit N:" heading for each suggested habit]

IMPORTANT: Every habit MUST start with a level-3 heading beginning with exactly "### Habit". Do not use "###" for any other heading. The exact heading "### Habit" is required for proper parsing of the response."####;

/// Returns the full prompt template for a response format, placeholders unexpanded.
pub fn template(format: ResponseFormat) -> String {
    let tail = match format {
        ResponseFormat::V1 => V1_RESPONSE_FORMAT,
        ResponseFormat::V2 => V2_RESPONSE_FORMAT,
    };
    format!("{ANALYSIS_PREAMBLE}{tail}")
}

/// Builds prompts for one response format.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
}

impl PromptBuilder {
    pub fn new(format: ResponseFormat) -> Self {
        Self {
            template: template(format),
        }
    }

    /// Substitutes the request fields into the template.
    pub fn render(&self, request: &AnalysisRequest) -> String {
        render_template(
            &self.template,
            &[
                ("behavior", &request.behavior),
                ("antecedent", &request.antecedent),
                ("consequence", &request.consequence),
                ("previous_attempts", &request.previous_attempts),
            ],
        )
    }

    /// The ordered conversation sent to the model: persona, then the rendered prompt.
    pub fn messages(&self, request: &AnalysisRequest) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(SYSTEM_PERSONA),
            ChatMessage::user(self.render(request)),
        ]
    }
}

/// Expands `{name}` placeholders found in `template`. Unknown placeholders are left as written.
fn render_template(template: &str, fields: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let name = &after[..close];
            fields
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
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

#[cfg(test)]
mod tests {
    use super::*;
    use habit_types::PatientId;

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            patient_id: PatientId::parse("123").unwrap(),
            behavior: "Avoids social events".into(),
            antecedent: "Invitations from coworkers".into(),
            consequence: "Relief, then loneliness".into(),
            previous_attempts: "Forced attendance once".into(),
        }
    }

    #[test]
    fn render_substitutes_all_fields() {
        let prompt = PromptBuilder::new(ResponseFormat::V1).render(&request());
        assert!(prompt.contains(r#"analyze: "Avoids social events""#));
        assert!(prompt.contains(r#"occurs: "Invitations from coworkers""#));
        assert!(prompt.contains(r#"behavior): "Relief, then loneliness""#));
        assert!(prompt.contains(r#"behavior: "Forced attendance once""#));
        assert!(!prompt.contains("{behavior}"));
        assert!(!prompt.contains("{previous_attempts}"));
    }

    #[test]
    fn render_does_not_expand_placeholders_inside_caller_text() {
        let mut req = request();
        req.behavior = "literally {antecedent}".into();
        let prompt = PromptBuilder::new(ResponseFormat::V1).render(&req);
        assert!(prompt.contains(r#""literally {antecedent}""#));
    }

    #[test]
    fn render_keeps_unknown_braces() {
        assert_eq!(
            render_template("a {x} {y", &[("x", "1")]),
            "a 1 {y".to_string()
        );
    }

    #[test]
    fn each_template_names_its_own_marker() {
        for format in [ResponseFormat::V1, ResponseFormat::V2] {
            assert!(template(format).contains(format.marker()));
        }
        assert!(template(ResponseFormat::V1).contains("**Scientific Basis:**"));
        assert!(template(ResponseFormat::V2).contains("**Description:**"));
    }

    #[test]
    fn v2_template_reaches_its_closing_instruction() {
        let text = template(ResponseFormat::V2);
        assert!(text.contains(r####"[Repeat the "### Habit N:" heading for each suggested habit]"####));
        assert!(text.ends_with(r####"The exact heading "### Habit" is required for proper parsing of the response."####));
    }

    #[test]
    fn messages_are_persona_then_prompt() {
        let messages = PromptBuilder::new(ResponseFormat::V2).messages(&request());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system(SYSTEM_PERSONA));
        assert!(messages[1].content.contains("### Habit"));
    }
}
