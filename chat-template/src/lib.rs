//! Chat Template Engine (C10, §4.10): turns a message list into the single
//! prompt string a generation backend consumes.

mod family;
mod jinja;

pub use family::{detect, render_builtin, Detection, Family};

use depot_values::Message;

const DEFAULT_BOS_TOKEN: &str = "<s>";
const DEFAULT_EOS_TOKEN: &str = "</s>";

/// Model-side configuration the Chat Template Engine consults (§4.10).
#[derive(Debug, Clone, Default)]
pub struct TemplateConfig {
    pub chat_template: Option<String>,
    pub model_name: String,
    pub bos_token: Option<String>,
    pub eos_token: Option<String>,
}

/// Converts `messages` (+ an optional system prompt) into a single prompt
/// string per the detection priority and rendering rules of §4.10.
pub fn render(config: &TemplateConfig, messages: &[Message], system_prompt: Option<&str>) -> String {
    let bos = config.bos_token.as_deref().unwrap_or(DEFAULT_BOS_TOKEN);
    let eos = config.eos_token.as_deref().unwrap_or(DEFAULT_EOS_TOKEN);
    let system_message = system_prompt.unwrap_or("");

    match detect(&config.model_name, config.chat_template.as_deref()) {
        Detection::Explicit(template) => jinja::render(&template, messages, bos, eos, system_message)
            .unwrap_or_else(|| render_fallback(messages)),
        Detection::Builtin(family) => render_builtin(family, messages),
    }
}

/// `"{role}: {content}\n\n"` per message, trailing `"assistant: "` — used
/// whenever a custom template falls outside the restricted subset (§4.10).
fn render_fallback(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(&format!(
            "{}: {}\n\n",
            message.role.as_str(),
            message.readable_content()
        ));
    }
    out.push_str("assistant: ");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_values::MessageRole;

    #[test]
    fn falls_back_on_an_unsupported_custom_template() {
        let config = TemplateConfig {
            chat_template: Some("{% for m in messages %}{{ m.content }}{% endfor %}".to_string()),
            model_name: "anything".to_string(),
            ..Default::default()
        };
        let messages = vec![Message::new(MessageRole::User, "hi")];
        let out = render(&config, &messages, None);
        assert_eq!(out, "user: hi\n\nassistant: ");
    }

    #[test]
    fn uses_custom_template_when_within_the_restricted_subset() {
        let config = TemplateConfig {
            chat_template: Some(
                "{for message in messages}{{ message.role }}={{ message.content }};{endfor}".to_string(),
            ),
            model_name: "anything".to_string(),
            ..Default::default()
        };
        let messages = vec![Message::new(MessageRole::User, "hi")];
        let out = render(&config, &messages, None);
        assert_eq!(out, "user=hi;");
    }

    #[test]
    fn detects_llama3_by_name_when_no_explicit_template() {
        let config = TemplateConfig {
            chat_template: None,
            model_name: "Meta-Llama-3-8B".to_string(),
            ..Default::default()
        };
        let messages = vec![Message::new(MessageRole::User, "hi")];
        let out = render(&config, &messages, None);
        assert!(out.starts_with("<|begin_of_text|>"));
        assert!(out.ends_with("<|start_header_id|>assistant<|end_header_id|>\n\n"));
    }
}
