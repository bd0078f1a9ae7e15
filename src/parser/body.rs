use crate::parser::headers::HeaderMap;
use crate::parser::multipart::{self, MultipartPart};
use crate::parser::resolver::FileLoader;
use crate::parser::types::media_type;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART_FORM_DATA: &str = "multipart/form-data";
const REQUEST_TYPE_HEADER: &str = "X-Request-Type";

/// 请求体的解释方式，每个请求只会走其中一种
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    #[default]
    Plain,
    Form,
    Multipart,
    GraphQl,
}

/// 规范化后的请求体
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBody {
    pub raw: String,
    pub parts: Vec<MultipartPart>,
    pub warnings: Vec<String>,
}

/// 根据 Content-Type（以及 GraphQL 的 URL 形态）判断请求体类型
///
/// `X-Request-Type: GraphQL` 会从 headers 中移除。
pub fn detect_kind(headers: &mut HeaderMap, url: &str) -> BodyKind {
    let graphql_header = headers
        .get(REQUEST_TYPE_HEADER)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("graphql"));
    if graphql_header {
        headers.remove(REQUEST_TYPE_HEADER);
        return BodyKind::GraphQl;
    }

    let content_type = headers.get("Content-Type").map(media_type);
    match content_type.as_deref() {
        Some(MULTIPART_FORM_DATA) => BodyKind::Multipart,
        Some(FORM_URLENCODED) => BodyKind::Form,
        None | Some("") | Some("application/json") if is_graphql_url(url) => BodyKind::GraphQl,
        _ => BodyKind::Plain,
    }
}

fn is_graphql_url(url: &str) -> bool {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        // 相对路径或含 {{变量}} 的 URL
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    path.to_ascii_lowercase().contains("/graphql")
}

/// 将原始请求体行转换为最终请求体
pub fn normalize(
    lines: &[String],
    kind: &BodyKind,
    headers: &HeaderMap,
    files: &FileLoader<'_>,
) -> NormalizedBody {
    let mut body = NormalizedBody::default();

    let Some(start) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return body;
    };
    let mut lines = &lines[start..];
    // 分隔符或后置脚本前的那一个空行不属于请求体
    if lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines = &lines[..lines.len() - 1];
    }

    let inlined: Vec<String> = lines
        .iter()
        .map(|line| inline_file_reference(line, files, &mut body.warnings))
        .collect();

    if *kind == BodyKind::Multipart {
        let joined = inlined.join("\r\n");
        body.parts = match headers.get("Content-Type").and_then(multipart::extract_boundary) {
            Some(boundary) => multipart::parse_multipart(&joined, &boundary),
            None => {
                body.warnings
                    .push("multipart body without boundary parameter".to_string());
                Vec::new()
            }
        };
        body.raw = joined;
        return body;
    }

    let joined = inlined.join("\n");
    body.raw = match kind {
        BodyKind::Form => compact_form(&joined),
        BodyKind::GraphQl => graphql_envelope(&joined),
        _ => joined,
    };
    body
}

/// `< path` / `<@encoding path` 行替换为文件内容，失败时保留原行并记录警告
fn inline_file_reference(line: &str, files: &FileLoader<'_>, warnings: &mut Vec<String>) -> String {
    static FILE_REF_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = FILE_REF_REGEX.get_or_init(|| Regex::new(r"^<(?:@(\w+)?)?\s+(.+?)\s*$").unwrap());

    let Some(caps) = re.captures(line.trim()) else {
        return line.to_string();
    };
    let path = &caps[2];
    if let Some(encoding) = caps.get(1) {
        tracing::debug!(path, encoding = encoding.as_str(), "reading body file as UTF-8");
    }

    match files.load(path) {
        Ok(content) => content,
        Err(e) => {
            warnings.push(format!("failed to read body file '{path}': {e}"));
            line.to_string()
        }
    }
}

/// 表单体去掉换行，用 `&` 连接
pub fn compact_form(body: &str) -> String {
    body.split('\n')
        .map(|fragment| fragment.trim())
        .map(|fragment| fragment.strip_prefix('&').unwrap_or(fragment))
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join("&")
}

/// 构造 GraphQL 请求 JSON，键顺序固定为 query、operationName、variables
pub fn graphql_envelope(body: &str) -> String {
    static OPERATION_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = OPERATION_REGEX
        .get_or_init(|| Regex::new(r"^\s*(query|mutation|subscription)\s+(\w+)").unwrap());

    let lines: Vec<&str> = body.split('\n').collect();
    let (query, variables) = match lines.iter().position(|l| l.trim().is_empty()) {
        Some(blank) => (lines[..blank].join("\n"), lines[blank + 1..].join("\n")),
        None => (body.to_string(), String::new()),
    };
    let query = query.trim_end();
    let variables = match variables.trim() {
        "" => "{}",
        vars => vars,
    };

    let mut envelope = format!("{{\"query\":\"{}\"", escape_json(query));
    if let Some(caps) = re.captures(query) {
        envelope.push_str(&format!(",\"operationName\":\"{}\"", &caps[2]));
    }
    envelope.push_str(&format!(",\"variables\":{variables}}}"));
    envelope
}

/// 只转义 `\`、`"`、换行、回车、制表符
pub fn escape_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}
