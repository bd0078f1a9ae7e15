use crate::parser::body::BodyKind;
use crate::parser::headers::HeaderMap;
use crate::parser::metadata_types::RequestMetadata;
use crate::parser::multipart::MultipartPart;
use serde::Serialize;
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;

/// 单个解析后的 HTTP 请求
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// HTTP 方法，缺省为 GET
    pub method: String,

    /// 请求 URL（原样保留，不解析 {{变量}}）
    pub url: String,

    /// 请求行末尾的协议版本，如 `HTTP/1.1`
    pub http_version: Option<String>,

    /// Headers，大小写不敏感，保持原始顺序
    pub headers: HeaderMap,

    /// 规范化后的请求体文本
    pub raw_body: String,

    /// 解析时判定的请求体类型，`X-Request-Type` 被移除后仍可据此识别 GraphQL
    pub body_kind: BodyKind,

    /// 旧式 `@name` 行给出的名称
    pub name: Option<String>,

    pub metadata: RequestMetadata,

    /// multipart/form-data 的各个部分
    pub multipart_parts: Vec<MultipartPart>,

    /// 仅与该请求相关的警告
    pub warnings: Vec<String>,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            http_version: None,
            headers: HeaderMap::new(),
            raw_body: String::new(),
            body_kind: BodyKind::default(),
            name: None,
            metadata: RequestMetadata::default(),
            multipart_parts: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// 有效名称：优先 `# @name`，否则为旧式名称；空名称视为没有名称
    pub fn effective_name(&self) -> Option<&str> {
        self.metadata
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.name.as_deref().filter(|name| !name.is_empty()))
    }

    /// 以只读流的形式按需读取请求体，空请求体返回 None
    pub fn body(&self) -> Option<Cursor<&[u8]>> {
        if self.raw_body.is_empty() {
            None
        } else {
            Some(Cursor::new(self.raw_body.as_bytes()))
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| media_type(ct) == "multipart/form-data")
    }
}

/// 取出 Content-Type 中 `;` 之前的媒体类型（小写）
pub(crate) fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// 解析过程中产生的警告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// 请求块在文件中的序号（从 0 开始）
    pub block_index: usize,

    /// 目前总是 0，仅精确到块
    pub line: usize,

    pub message: String,
}

impl ParseWarning {
    pub fn new(block_index: usize, message: impl Into<String>) -> Self {
        Self {
            block_index,
            line: 0,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {}: {}", self.block_index, self.message)
    }
}

/// 重复名称的诊断视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateName {
    pub name: String,
    pub method: String,
    pub url: String,
    /// 在 `ParseResult::requests` 中的位置
    pub index: usize,
}

/// 整个文件的解析结果
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParseResult {
    pub requests: Vec<Request>,
    pub warnings: Vec<ParseWarning>,

    /// 源文件路径（用于错误报告）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
}

impl ParseResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_path(mut self, path: PathBuf) -> Self {
        self.source_path = Some(path);
        self
    }

    /// 按名称查找，返回源文件顺序中的第一个匹配
    pub fn find_by_name(&self, name: &str) -> Option<&Request> {
        self.requests
            .iter()
            .find(|r| r.effective_name() == Some(name))
    }

    /// 所有名称重复的请求
    pub fn duplicate_names(&self) -> Vec<DuplicateName> {
        crate::parser::duplicates::find_duplicates(&self.requests)
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// 解析选项
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// 请求未设置时自动添加的 Header
    pub default_headers: Vec<(String, String)>,

    /// 解析相对文件引用时使用的基础目录
    pub base_dir: Option<PathBuf>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}

/// 解析错误类型
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 块中找不到请求行
    #[error("no request line found in block {block}")]
    NoRequestLine { block: usize },

    /// 请求行只有方法没有 URL
    #[error("missing URL in request line '{line}' (block {block})")]
    MissingUrl { block: usize, line: String },

    /// 空文件
    #[error("no requests found in content")]
    EmptyContent,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_request_new() {
        let req = Request::new("GET", "http://example.com");
        assert_eq!(req.method, "GET");
        assert_eq!(req.url, "http://example.com");
        assert!(req.headers.is_empty());
        assert!(req.body().is_none());
        assert_eq!(req.effective_name(), None);
    }

    #[test]
    fn test_effective_name_prefers_metadata() {
        let mut req = Request::new("GET", "/");
        req.name = Some("legacy".to_string());
        assert_eq!(req.effective_name(), Some("legacy"));

        req.metadata.name = Some("login".to_string());
        assert_eq!(req.effective_name(), Some("login"));

        req.metadata.name = Some(String::new());
        assert_eq!(req.effective_name(), Some("legacy"));
    }

    #[test]
    fn test_body_reader() {
        let mut req = Request::new("POST", "/");
        req.raw_body = "hello".to_string();
        let mut buf = String::new();
        req.body().unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
    }

    #[test]
    fn test_is_multipart() {
        let mut req = Request::new("POST", "/");
        assert!(!req.is_multipart());
        req.headers
            .insert("content-type", "Multipart/Form-Data; boundary=abc");
        assert!(req.is_multipart());
    }

    #[test]
    fn test_find_by_name_returns_first() {
        let mut first = Request::new("GET", "/1");
        first.metadata.name = Some("dup".to_string());
        let mut second = Request::new("GET", "/2");
        second.metadata.name = Some("dup".to_string());

        let result = ParseResult {
            requests: vec![first, second],
            ..ParseResult::new()
        };
        assert_eq!(result.find_by_name("dup").unwrap().url, "/1");
        assert!(result.find_by_name("other").is_none());
        assert_eq!(result.duplicate_names().len(), 2);
    }

    #[test]
    fn test_warning_display() {
        let warning = ParseWarning::new(3, "something odd");
        assert_eq!(warning.line, 0);
        assert_eq!(warning.to_string(), "block 3: something odd");
    }
}
