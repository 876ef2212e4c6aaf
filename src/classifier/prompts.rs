//! Prompt rendering for the semantic classifier.

use crate::gateway::Message;

/// Escape XML special characters so inputs cannot break out of their tags.
fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Substitute placeholders in one left-to-right scan of `template`.
/// Substituted values are never rescanned, so user text that happens to
/// contain `{prompt}` or `{response}` comes through verbatim.
fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        match values.iter().find(|(name, _)| rest.starts_with(*name)) {
            Some(&(name, value)) => {
                out.push_str(value);
                rest = &rest[name.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// A classifier prompt with `{system_description}`, `{prompt}` and
/// `{response}` placeholders in the user message.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl ClassifierTemplate {
    pub fn render(&self, description: &str, prompt: &str, response: &str) -> Vec<Message> {
        let user = fill_placeholders(
            self.user,
            &[
                ("{system_description}", escape_xml_chars(description.trim()).as_str()),
                ("{prompt}", escape_xml_chars(prompt.trim()).as_str()),
                ("{response}", escape_xml_chars(response.trim()).as_str()),
            ],
        );

        vec![
            Message::system(self.system.trim()),
            Message::user(user.trim()),
        ]
    }
}

pub const CLASSIFIER_V1: ClassifierTemplate = ClassifierTemplate {
    slug: "psf_classifier_v1",
    system: r#"You assess how predictable an AI system's behaviour is for the people who use it, along three dimensions, each scored in [0,1]:
- T (temporal): would the same input produce the same output over time? 1 = always identical.
- C (confidence): can a user tell when the output is likely to be right? 1 = well calibrated, signals its certainty.
- L (learning): how quickly can a user build a correct mental model of what the system will do? 1 = immediately.

Then place the system on a five-level spectrum: 1 = fully predictable (deterministic), 2 = mostly predictable, 3 = bounded variability, 4 = high variability, 5 = open-ended.

Output only JSON:
{"T": 0.0-1.0, "C": 0.0-1.0, "L": 0.0-1.0, "level": 1-5, "note": "...", "rationale": {"overall": "...", "T": "...", "C": "...", "L": "...", "cues": ["..."]}}"#,
    user: r#"<system_description>
{system_description}
</system_description>

<prompt>
{prompt}
</prompt>

<example_response>
{response}
</example_response>

Return a JSON object with your assessment.
json:"#,
};

pub const DEFAULT_CLASSIFIER_TEMPLATE: ClassifierTemplate = CLASSIFIER_V1;
