//! A restricted, non-reflective Jinja-like renderer (§4.10).
//!
//! Supports exactly: `{bos_token}`, `{eos_token}`, `{system_message}`,
//! `{for message in messages}...{endfor}`, `{if message.role == '...'}
//! ... {elif ...} ... {endif}`, `{{ message.role }}`, `{{ message.content }}`.
//! Anything else — in particular any `{%...%}` Jinja control tag — is
//! unsupported and causes the caller to fall back to plain rendering.

use depot_values::Message;
use regex::Regex;
use std::sync::OnceLock;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?s)\{\{\s*[^}]+?\s*\}\}|\{(?:for|endfor|if|elif|endif)[^}]*\}|\{(?:bos_token|eos_token|system_message)\}",
        )
        .unwrap()
    })
}

enum Token<'a> {
    Literal(&'a str),
    Expr(&'a str),
    For,
    EndFor,
    If(&'a str),
    Elif(&'a str),
    EndIf,
}

fn tokenize(template: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;
    for m in tag_regex().find_iter(template) {
        if m.start() > cursor {
            tokens.push(Token::Literal(&template[cursor..m.start()]));
        }
        let tag = m.as_str();
        if let Some(expr) = tag.strip_prefix("{{").and_then(|s| s.strip_suffix("}}")) {
            tokens.push(Token::Expr(expr.trim()));
        } else if tag.starts_with("{for ") {
            tokens.push(Token::For);
        } else if tag == "{endfor}" {
            tokens.push(Token::EndFor);
        } else if let Some(cond) = tag.strip_prefix("{if ").and_then(|s| s.strip_suffix('}')) {
            tokens.push(Token::If(cond.trim()));
        } else if let Some(cond) = tag.strip_prefix("{elif ").and_then(|s| s.strip_suffix('}')) {
            tokens.push(Token::Elif(cond.trim()));
        } else if tag == "{endif}" {
            tokens.push(Token::EndIf);
        } else if let Some(expr) = tag.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            tokens.push(Token::Expr(expr));
        }
        cursor = m.end();
    }
    if cursor < template.len() {
        tokens.push(Token::Literal(&template[cursor..]));
    }
    tokens
}

enum Node<'a> {
    Literal(&'a str),
    Expr(&'a str),
    For(Vec<Node<'a>>),
    If(Vec<(Option<&'a str>, Vec<Node<'a>>)>),
}

/// Parses a flat token stream into a tree, honoring `for`/`if` nesting.
/// Returns `None` if the template is malformed (unbalanced blocks) or
/// contains a real Jinja `{%...%}` tag our restricted subset doesn't cover.
fn parse(template: &str) -> Option<Vec<Node<'_>>> {
    if template.contains("{%") {
        return None;
    }
    let tokens = tokenize(template);
    let mut iter = tokens.into_iter().peekable();
    let nodes = parse_block(&mut iter)?;
    // Any leftover endfor/elif/endif at top level means unbalanced blocks.
    Some(nodes)
}

/// Parses until end-of-input or a matching `{endfor}`, whichever comes first.
fn parse_block<'a>(
    iter: &mut std::iter::Peekable<std::vec::IntoIter<Token<'a>>>,
) -> Option<Vec<Node<'a>>> {
    let mut nodes = Vec::new();
    while let Some(token) = iter.next() {
        match token {
            Token::Literal(s) => nodes.push(Node::Literal(s)),
            Token::Expr(e) => nodes.push(Node::Expr(e)),
            Token::For => {
                let body = parse_block(iter)?;
                nodes.push(Node::For(body));
            }
            Token::EndFor => return Some(nodes),
            Token::If(cond) => {
                let mut branches = Vec::new();
                let mut current_cond = Some(cond);
                loop {
                    let body = parse_if_branch(iter)?;
                    branches.push((current_cond.take(), body.0));
                    match body.1 {
                        Some(BranchEnd::Elif(next_cond)) => current_cond = Some(next_cond),
                        Some(BranchEnd::EndIf) => break,
                        None => return None,
                    }
                }
                nodes.push(Node::If(branches));
            }
            Token::Elif(_) | Token::EndIf => return None,
        }
    }
    Some(nodes)
}

enum BranchEnd<'a> {
    Elif(&'a str),
    EndIf,
}

fn parse_if_branch<'a>(
    iter: &mut std::iter::Peekable<std::vec::IntoIter<Token<'a>>>,
) -> Option<(Vec<Node<'a>>, Option<BranchEnd<'a>>)> {
    let mut nodes = Vec::new();
    loop {
        match iter.next()? {
            Token::Literal(s) => nodes.push(Node::Literal(s)),
            Token::Expr(e) => nodes.push(Node::Expr(e)),
            Token::For => {
                let body = parse_block(iter)?;
                nodes.push(Node::For(body));
            }
            Token::EndFor => return None,
            Token::If(cond) => {
                let mut branches = Vec::new();
                let mut current_cond = Some(cond);
                loop {
                    let (body, end) = parse_if_branch(iter)?;
                    branches.push((current_cond.take(), body));
                    match end {
                        Some(BranchEnd::Elif(next_cond)) => current_cond = Some(next_cond),
                        Some(BranchEnd::EndIf) => break,
                        None => return None,
                    }
                }
                nodes.push(Node::If(branches));
            }
            Token::Elif(cond) => return Some((nodes, Some(BranchEnd::Elif(cond)))),
            Token::EndIf => return Some((nodes, Some(BranchEnd::EndIf))),
        }
    }
}

fn eval_condition(cond: &str, role: &str) -> bool {
    // Only form supported: message.role == 'value'
    let Some((lhs, rhs)) = cond.split_once("==") else {
        return false;
    };
    if lhs.trim() != "message.role" {
        return false;
    }
    let rhs = rhs.trim().trim_matches(|c| c == '\'' || c == '"');
    rhs == role
}

fn render_nodes(
    nodes: &[Node<'_>],
    message: Option<&Message>,
    bos: &str,
    eos: &str,
    system_message: &str,
    out: &mut String,
) {
    for node in nodes {
        match node {
            Node::Literal(s) => out.push_str(s),
            Node::Expr(expr) => out.push_str(&eval_expr(expr, message, bos, eos, system_message)),
            Node::For(body) => {
                // `for message in messages` is the only supported loop; the
                // caller drives iteration via repeated calls into this fn.
                if let Some(message) = message {
                    render_nodes(body, Some(message), bos, eos, system_message, out);
                }
            }
            Node::If(branches) => {
                let role = message.map(|m| m.role.as_str()).unwrap_or("");
                for (cond, body) in branches {
                    let matches = match cond {
                        Some(c) => eval_condition(c, role),
                        None => true,
                    };
                    if matches {
                        render_nodes(body, message, bos, eos, system_message, out);
                        break;
                    }
                }
            }
        }
    }
}

fn eval_expr(expr: &str, message: Option<&Message>, bos: &str, eos: &str, system_message: &str) -> String {
    match expr {
        "bos_token" => bos.to_string(),
        "eos_token" => eos.to_string(),
        "system_message" => system_message.to_string(),
        "message.role" => message.map(|m| m.role.as_str().to_string()).unwrap_or_default(),
        "message.content" => message.map(|m| m.readable_content()).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Renders `template` against `messages`. Returns `None` if the template
/// uses anything outside the restricted subset — the caller should fall
/// back to plain per-message rendering in that case.
pub fn render(
    template: &str,
    messages: &[Message],
    bos: &str,
    eos: &str,
    system_message: &str,
) -> Option<String> {
    let nodes = parse(template)?;
    let mut out = String::new();
    render_top_level(&nodes, messages, bos, eos, system_message, &mut out);
    Some(out)
}

fn render_top_level(
    nodes: &[Node<'_>],
    messages: &[Message],
    bos: &str,
    eos: &str,
    system_message: &str,
    out: &mut String,
) {
    for node in nodes {
        match node {
            Node::Literal(s) => out.push_str(s),
            Node::Expr(expr) => out.push_str(&eval_expr(expr, None, bos, eos, system_message)),
            Node::For(body) => {
                for message in messages {
                    render_nodes(body, Some(message), bos, eos, system_message, out);
                }
            }
            Node::If(branches) => {
                for (cond, body) in branches {
                    let matches = match cond {
                        Some(_) => false,
                        None => true,
                    };
                    if matches {
                        render_top_level(body, messages, bos, eos, system_message, out);
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_values::MessageRole;

    #[test]
    fn renders_for_loop_with_role_and_content() {
        let template = "{for message in messages}{{ message.role }}: {{ message.content }}\n{endfor}";
        let messages = vec![
            Message::new(MessageRole::User, "hi"),
            Message::new(MessageRole::Assistant, "hello"),
        ];
        let out = render(template, &messages, "<s>", "</s>", "").unwrap();
        assert_eq!(out, "user: hi\nassistant: hello\n");
    }

    #[test]
    fn renders_if_elif_branches_by_role() {
        let template = "{for message in messages}{if message.role == 'system'}SYS:{{ message.content }}{elif message.role == 'user'}USR:{{ message.content }}{endif}{endfor}";
        let messages = vec![
            Message::new(MessageRole::System, "be nice"),
            Message::new(MessageRole::User, "hi"),
        ];
        let out = render(template, &messages, "<s>", "</s>", "").unwrap();
        assert_eq!(out, "SYS:be niceUSR:hi");
    }

    #[test]
    fn rejects_real_jinja_control_tags() {
        let template = "{% for m in messages %}{{ m.role }}{% endfor %}";
        assert!(render(template, &[], "<s>", "</s>", "").is_none());
    }

    #[test]
    fn substitutes_bos_and_eos_tokens() {
        let out = render("{bos_token}hi{eos_token}", &[], "<BOS>", "<EOS>", "").unwrap();
        assert_eq!(out, "<BOS>hi<EOS>");
    }
}
