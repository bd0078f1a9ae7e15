//! 行分类
//!
//! 请求文件中的一行可能是注释、元数据指令、文件变量、查询续行或脚本起始，
//! 这些类别在字面上有重叠，统一在这里判定，状态机只根据 [`LineKind`] 分派。

use regex::Regex;
use std::sync::OnceLock;

/// 脚本所处的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPhase {
    /// `<` 请求前脚本
    Pre,
    /// `>` 响应后脚本
    Post,
}

/// 脚本来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptSource<'a> {
    /// `{%` 之后的剩余文本
    Inline(&'a str),
    /// 外部 `.js` 文件路径
    File(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    /// `# @key value` 或 `// @key value`
    MetadataDirective { key: String, value: String },
    Comment,
    ScriptOpen {
        phase: ScriptPhase,
        source: ScriptSource<'a>,
    },
    /// `@name = value`，由其他工具处理，这里忽略
    FileVariable,
    /// 旧式 `@key value`（无注释前缀、无 `=`）
    LegacyDirective { key: String, value: String },
    /// 以 `?` 或 `&` 开头的查询续行
    QueryContinuation,
    Plain,
}

/// 对一行进行分类，优先级从上到下
pub fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if let Some((key, value)) = parse_metadata_directive(line) {
        return LineKind::MetadataDirective { key, value };
    }
    if is_comment(trimmed) {
        return LineKind::Comment;
    }
    if let Some((phase, source)) = script_open(trimmed) {
        return LineKind::ScriptOpen { phase, source };
    }
    if is_file_variable(trimmed) {
        return LineKind::FileVariable;
    }
    if let Some(rest) = trimmed.strip_prefix('@') {
        let (key, value) = match rest.split_once(char::is_whitespace) {
            Some((k, v)) => (k, v.trim()),
            None => (rest, ""),
        };
        if !key.is_empty() {
            return LineKind::LegacyDirective {
                key: key.to_lowercase(),
                value: value.to_string(),
            };
        }
    }
    if is_query_continuation(trimmed) {
        return LineKind::QueryContinuation;
    }
    LineKind::Plain
}

pub fn is_comment(line: &str) -> bool {
    let line = line.trim();
    line.starts_with('#') || line.starts_with("//")
}

pub fn is_file_variable(line: &str) -> bool {
    let line = line.trim();
    line.starts_with('@') && line.contains('=')
}

pub fn is_query_continuation(line: &str) -> bool {
    let line = line.trim();
    line.starts_with('?') || line.starts_with('&')
}

/// 解析元数据指令，返回 (小写 key, 去除首尾空白的 value)
pub fn parse_metadata_directive(line: &str) -> Option<(String, String)> {
    static DIRECTIVE_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = DIRECTIVE_REGEX
        .get_or_init(|| Regex::new(r"^\s*(?:#|//)\s*@([\w-]+)(?:\s+(.*))?$").unwrap());

    let caps = re.captures(line)?;
    let key = caps[1].to_lowercase();
    let value = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some((key, value))
}

fn script_open(trimmed: &str) -> Option<(ScriptPhase, ScriptSource<'_>)> {
    let (phase, rest) = if let Some(rest) = trimmed.strip_prefix('<') {
        (ScriptPhase::Pre, rest)
    } else if let Some(rest) = trimmed.strip_prefix('>') {
        (ScriptPhase::Post, rest)
    } else {
        return None;
    };

    let rest = rest.trim();
    if let Some(inline) = rest.strip_prefix("{%") {
        return Some((phase, ScriptSource::Inline(inline)));
    }
    if rest.ends_with(".js") {
        return Some((phase, ScriptSource::File(rest)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_comment() {
        assert!(is_comment("# comment"));
        assert!(is_comment("   // comment"));
        assert!(!is_comment("GET http://example.com"));
        assert!(!is_comment("/ path"));
    }

    #[test]
    fn test_is_file_variable() {
        assert!(is_file_variable("@host = example.com"));
        assert!(is_file_variable("  @token=abc"));
        assert!(!is_file_variable("@name login"));
        assert!(!is_file_variable("host = example.com"));
    }

    #[test]
    fn test_is_query_continuation() {
        assert!(is_query_continuation("?page=1"));
        assert!(is_query_continuation("    &limit=10"));
        assert!(!is_query_continuation("page=1"));
    }

    #[test]
    fn test_parse_metadata_directive() {
        assert_eq!(
            parse_metadata_directive("# @name login"),
            Some(("name".to_string(), "login".to_string()))
        );
        assert_eq!(
            parse_metadata_directive("//@No-Redirect"),
            Some(("no-redirect".to_string(), String::new()))
        );
        assert_eq!(
            parse_metadata_directive("  #   @note   spaced out   "),
            Some(("note".to_string(), "spaced out".to_string()))
        );
        assert_eq!(parse_metadata_directive("# plain comment"), None);
        assert_eq!(parse_metadata_directive("@name login"), None);
    }

    #[test]
    fn test_classify_priority() {
        assert_eq!(classify("   "), LineKind::Blank);
        assert!(matches!(
            classify("# @prompt password"),
            LineKind::MetadataDirective { ref key, .. } if key == "prompt"
        ));
        assert_eq!(classify("# just a comment"), LineKind::Comment);
        assert_eq!(classify("@base = http://x"), LineKind::FileVariable);
        assert_eq!(classify("&page=2"), LineKind::QueryContinuation);
        assert_eq!(classify("GET /users"), LineKind::Plain);
        assert!(matches!(
            classify("@name legacy"),
            LineKind::LegacyDirective { ref key, ref value } if key == "name" && value == "legacy"
        ));
    }

    #[test]
    fn test_classify_scripts() {
        assert_eq!(
            classify("< ./scripts/pre.js"),
            LineKind::ScriptOpen {
                phase: ScriptPhase::Pre,
                source: ScriptSource::File("./scripts/pre.js"),
            }
        );
        assert_eq!(
            classify("> {% client.test(); %}"),
            LineKind::ScriptOpen {
                phase: ScriptPhase::Post,
                source: ScriptSource::Inline(" client.test(); %}"),
            }
        );
        assert_eq!(
            classify("< {%"),
            LineKind::ScriptOpen {
                phase: ScriptPhase::Pre,
                source: ScriptSource::Inline(""),
            }
        );
        // 非 .js 的文件引用不是脚本
        assert_eq!(classify("< ./body.json"), LineKind::Plain);
    }

    #[test]
    fn test_script_opener_without_space() {
        assert_eq!(
            classify("<{% pre(); %}"),
            LineKind::ScriptOpen {
                phase: ScriptPhase::Pre,
                source: ScriptSource::Inline(" pre(); %}"),
            }
        );
        assert_eq!(
            classify(">{%"),
            LineKind::ScriptOpen {
                phase: ScriptPhase::Post,
                source: ScriptSource::Inline(""),
            }
        );
        assert_eq!(
            classify(">./after.js"),
            LineKind::ScriptOpen {
                phase: ScriptPhase::Post,
                source: ScriptSource::File("./after.js"),
            }
        );
    }
}
