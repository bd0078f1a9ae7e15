use crate::parser::metadata_types::{PromptVariable, RequestMetadata};

/// 已识别的元数据指令
#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
    Name(String),
    Note(String),
    NoRedirect,
    NoCookieJar,
    Prompt(PromptVariable),
}

impl Metadata {
    /// 从 (key, value) 构造，未识别的 key 或空的 `@name` 返回 None
    pub fn from_directive(key: &str, value: &str) -> Option<Self> {
        match key {
            "name" if value.is_empty() => None,
            "name" => Some(Metadata::Name(value.to_string())),
            "note" => Some(Metadata::Note(value.to_string())),
            "no-redirect" => Some(Metadata::NoRedirect),
            "no-cookie-jar" => Some(Metadata::NoCookieJar),
            "prompt" => parse_prompt(value).map(Metadata::Prompt),
            _ => None,
        }
    }
}

/// 应用一条指令到 RequestMetadata，返回该指令是否被识别
pub fn apply_directive(key: &str, value: &str, target: &mut RequestMetadata) -> bool {
    match Metadata::from_directive(key, value) {
        Some(metadata) => {
            apply_metadata(metadata, target);
            true
        }
        None => {
            tracing::debug!(key, value, "ignoring metadata directive");
            false
        }
    }
}

#[inline]
pub fn apply_metadata(metadata: Metadata, target: &mut RequestMetadata) {
    match metadata {
        Metadata::Name(name) => {
            target.name = Some(name);
        }
        Metadata::Note(note) => match &mut target.note {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(&note);
            }
            None => target.note = Some(note),
        },
        Metadata::NoRedirect => {
            target.no_redirect = true;
        }
        Metadata::NoCookieJar => {
            target.no_cookie_jar = true;
        }
        Metadata::Prompt(prompt) => {
            target.prompts.push(prompt);
        }
    }
}

/// `@prompt <变量名> [描述]`
fn parse_prompt(content: &str) -> Option<PromptVariable> {
    let content = content.trim();
    if content.is_empty() {
        return None;
    }
    let (name, description) = match content.split_once(' ') {
        Some((name, desc)) => {
            let desc = desc.trim();
            (name, (!desc.is_empty()).then(|| desc.to_string()))
        }
        None => (content, None),
    };
    Some(PromptVariable::new(name, description))
}
