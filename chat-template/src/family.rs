//! Template family detection (§4.10 detection priority).

use depot_values::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Llama3,
    Mistral,
    Chatml,
    Alpaca,
    Codellama,
    Vicuna,
}

const FAMILY_PROBES: &[(&[&str], Family)] = &[
    (&["llama-3", "llama3"], Family::Llama3),
    (&["mistral", "mixtral"], Family::Mistral),
    (&["codellama", "code-llama"], Family::Codellama),
    (&["alpaca"], Family::Alpaca),
    (&["vicuna"], Family::Vicuna),
    (&["chatml"], Family::Chatml),
];

/// What decided the rendering path for a given call to [`crate::render`].
pub enum Detection {
    /// `config.chatTemplate` was present and non-empty (§4.10 priority 1).
    Explicit(String),
    /// A built-in family was selected (§4.10 priorities 2-3).
    Builtin(Family),
}

/// Detection priority: explicit template -> family-name substring probe ->
/// chatml marker -> llama3 fallback (§4.10).
pub fn detect(model_name: &str, explicit_template: Option<&str>) -> Detection {
    if let Some(template) = explicit_template {
        if !template.is_empty() {
            return Detection::Explicit(template.to_string());
        }
    }

    let lower = model_name.to_lowercase();
    for (needles, family) in FAMILY_PROBES {
        if needles.iter().any(|n| lower.contains(n)) {
            return Detection::Builtin(*family);
        }
    }

    if let Some(template) = explicit_template {
        if template.contains("<|im_start|>") {
            return Detection::Builtin(Family::Chatml);
        }
    }

    Detection::Builtin(Family::Llama3)
}

/// Renders one of the six exact built-in templates for `messages` (§4.10).
pub fn render_builtin(family: Family, messages: &[Message]) -> String {
    match family {
        Family::Llama3 => render_llama3(messages),
        Family::Mistral => render_mistral(messages),
        Family::Chatml => render_chatml(messages),
        Family::Alpaca => render_alpaca(messages),
        Family::Codellama => render_codellama(messages),
        Family::Vicuna => render_vicuna(messages),
    }
}

fn render_llama3(messages: &[Message]) -> String {
    let mut out = String::from("<|begin_of_text|>");
    for message in messages {
        out.push_str(&format!(
            "<|start_header_id|>{}<|end_header_id|>\n\n{}<|eot_id|>\n",
            message.role.as_str(),
            message.readable_content()
        ));
    }
    out.push_str("<|start_header_id|>assistant<|end_header_id|>\n\n");
    out
}

fn render_mistral(messages: &[Message]) -> String {
    let mut out = String::from("<s>");
    for message in messages {
        match message.role {
            depot_values::MessageRole::System => {
                out.push_str(&format!("<<SYS>>\n{}\n<</SYS>>\n\n", message.readable_content()));
            }
            depot_values::MessageRole::User => {
                out.push_str(&format!("[INST] {} [/INST]", message.readable_content()));
            }
            _ => {
                out.push_str(&format!("{}</s>", message.readable_content()));
            }
        }
    }
    out
}

fn render_chatml(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(&format!(
            "<|im_start|>{}\n{}<|im_end|>\n",
            message.role.as_str(),
            message.readable_content()
        ));
    }
    out.push_str("<|im_start|>assistant\n");
    out
}

fn render_alpaca(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        match message.role {
            depot_values::MessageRole::User => {
                out.push_str(&format!("### Instruction:\n{}\n\n", message.readable_content()));
            }
            depot_values::MessageRole::Assistant => {
                out.push_str(&format!("### Response:\n{}\n\n", message.readable_content()));
            }
            _ => out.push_str(&format!("{}\n\n", message.readable_content())),
        }
    }
    out.push_str("### Response:\n");
    out
}

fn render_codellama(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        match message.role {
            depot_values::MessageRole::User => {
                out.push_str(&format!("### Instruction:\n{}\n\n", message.readable_content()));
            }
            depot_values::MessageRole::Assistant => {
                out.push_str(&format!("### Response:\n{}\n\n", message.readable_content()));
            }
            _ => out.push_str(&format!("{}\n\n", message.readable_content())),
        }
    }
    out.push_str("### Response:\n");
    out
}

fn render_vicuna(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        match message.role {
            depot_values::MessageRole::System => {
                out.push_str(&format!("{}\n\n", message.readable_content()));
            }
            depot_values::MessageRole::User => {
                out.push_str(&format!("USER: {}\n", message.readable_content()));
            }
            _ => out.push_str(&format!("ASSISTANT: {}</s>\n", message.readable_content())),
        }
    }
    out.push_str("ASSISTANT: ");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_probes_take_priority_over_default() {
        assert!(matches!(
            detect("Meta-Llama-3-8B-Instruct", None),
            Detection::Builtin(Family::Llama3)
        ));
        assert!(matches!(
            detect("mistralai/Mistral-7B", None),
            Detection::Builtin(Family::Mistral)
        ));
        assert!(matches!(
            detect("lmsys/vicuna-13b", None),
            Detection::Builtin(Family::Vicuna)
        ));
    }

    #[test]
    fn explicit_non_empty_template_wins() {
        match detect("anything", Some("custom template")) {
            Detection::Explicit(t) => assert_eq!(t, "custom template"),
            _ => panic!("expected explicit"),
        }
    }

    #[test]
    fn unrecognized_name_falls_back_to_llama3() {
        assert!(matches!(
            detect("some-unknown-model", None),
            Detection::Builtin(Family::Llama3)
        ));
    }

    #[test]
    fn template_detection_matrix_matches_exact_token_contracts() {
        use depot_values::MessageRole;

        let messages = vec![
            Message::new(MessageRole::System, "You are helpful"),
            Message::new(MessageRole::User, "Hi"),
        ];
        let out = match detect("llama-3-8b-instruct", None) {
            Detection::Builtin(family) => render_builtin(family, &messages),
            _ => panic!("expected builtin"),
        };
        assert!(out.contains("<|start_header_id|>system<|end_header_id|>\n\nYou are helpful<|eot_id|>"));
        assert!(out.ends_with("<|start_header_id|>assistant<|end_header_id|>\n\n"));

        let messages = vec![Message::new(MessageRole::User, "Hi")];
        let out = match detect("mistral-7b-instruct", None) {
            Detection::Builtin(family) => render_builtin(family, &messages),
            _ => panic!("expected builtin"),
        };
        assert!(out.contains("[INST] Hi [/INST]"));

        let messages = vec![Message::new(MessageRole::User, "Write fn")];
        let out = match detect("codellama-13b", None) {
            Detection::Builtin(family) => render_builtin(family, &messages),
            _ => panic!("expected builtin"),
        };
        assert!(out.contains("### Instruction:\nWrite fn"));

        let out = match detect("unknown-model", None) {
            Detection::Builtin(family) => render_builtin(family, &[]),
            _ => panic!("expected builtin"),
        };
        assert!(!out.is_empty());
        assert!(out.contains("<|start_header_id|>"));
    }
}
