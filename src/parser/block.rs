//! 单个请求块的状态机
//!
//! 请求行之前只允许出现注释、元数据指令、文件变量和请求前脚本；请求行之后依次是
//! 查询续行、headers、空行、请求体，最后是可选的响应后脚本。脚本一旦闭合，
//! 状态机不会回到 Body，之后的非脚本行都被丢弃。

use crate::parser::body::{self, BodyKind};
use crate::parser::headers::HeaderMap;
use crate::parser::lexer::{self, LineKind, ScriptPhase, ScriptSource};
use crate::parser::metadata;
use crate::parser::metadata_types::RequestMetadata;
use crate::parser::resolver::FileLoader;
use crate::parser::script::{self, ScriptCapture};
use crate::parser::types::{ParseError, ParseOptions, Request};

const KNOWN_METHODS: [&str; 9] = [
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "CONNECT", "TRACE",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// 寻找请求行，找到之后继续收集查询续行
    Url,
    Header,
    Body,
    /// 捕获内联请求前脚本，闭合后回到 Url
    PreScript,
    /// 响应后脚本；`capturing` 为 false 表示已闭合，只接受新的脚本引用
    PostScript { capturing: bool },
}

/// 请求块解析器，每个块新建一个，不在块之间共享状态
pub struct BlockParser<'a> {
    block_index: usize,
    files: FileLoader<'a>,
    state: ParseState,
    request_line: Option<String>,
    header_lines: Vec<String>,
    body_lines: Vec<String>,
    metadata: RequestMetadata,
    legacy_name: Option<String>,
    capture: Option<ScriptCapture>,
    warnings: Vec<String>,
}

impl<'a> BlockParser<'a> {
    pub fn new(block_index: usize, files: FileLoader<'a>) -> Self {
        Self {
            block_index,
            files,
            state: ParseState::Url,
            request_line: None,
            header_lines: Vec::new(),
            body_lines: Vec::new(),
            metadata: RequestMetadata::default(),
            legacy_name: None,
            capture: None,
            warnings: Vec::new(),
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// 解析整个块
    pub fn parse(mut self, block: &str, options: &ParseOptions) -> Result<Request, ParseError> {
        for line in block.lines() {
            self.feed(line);
        }
        self.finish(options)
    }

    /// 处理一行
    pub fn feed(&mut self, line: &str) {
        let next = match self.state {
            ParseState::Url if self.request_line.is_none() => self.on_preamble(line),
            ParseState::Url => self.on_request_continuation(line),
            ParseState::Header => self.on_header(line),
            ParseState::Body => self.on_body(line),
            ParseState::PreScript => self.on_capture(line, ScriptPhase::Pre),
            ParseState::PostScript { capturing: true } => self.on_capture(line, ScriptPhase::Post),
            ParseState::PostScript { capturing: false } => self.on_after_post_script(line),
        };
        if next != self.state {
            tracing::trace!(block = self.block_index, from = ?self.state, to = ?next, "state transition");
            self.state = next;
        }
    }

    fn on_preamble(&mut self, line: &str) -> ParseState {
        match lexer::classify(line) {
            LineKind::ScriptOpen {
                phase: ScriptPhase::Pre,
                source,
            } => self.open_script(ScriptPhase::Pre, source),
            LineKind::ScriptOpen {
                phase: ScriptPhase::Post,
                ..
            } => {
                self.warnings
                    .push("post-request script before request line ignored".to_string());
                ParseState::Url
            }
            LineKind::MetadataDirective { key, value } => {
                metadata::apply_directive(&key, &value, &mut self.metadata);
                ParseState::Url
            }
            LineKind::LegacyDirective { key, value } => {
                if key == "name" && !value.is_empty() {
                    self.legacy_name = Some(value);
                }
                ParseState::Url
            }
            LineKind::Blank | LineKind::Comment | LineKind::FileVariable => ParseState::Url,
            LineKind::QueryContinuation | LineKind::Plain => {
                self.request_line = Some(line.trim().to_string());
                ParseState::Url
            }
        }
    }

    fn on_request_continuation(&mut self, line: &str) -> ParseState {
        match lexer::classify(line) {
            LineKind::QueryContinuation => {
                if let Some(request_line) = &mut self.request_line {
                    request_line.push_str(line.trim());
                }
                ParseState::Url
            }
            LineKind::Comment | LineKind::MetadataDirective { .. } => ParseState::Url,
            LineKind::Blank => ParseState::Body,
            LineKind::ScriptOpen {
                phase: ScriptPhase::Post,
                source,
            } => self.open_script(ScriptPhase::Post, source),
            _ => {
                self.header_lines.push(line.trim().to_string());
                ParseState::Header
            }
        }
    }

    fn on_header(&mut self, line: &str) -> ParseState {
        match lexer::classify(line) {
            LineKind::Blank => ParseState::Body,
            LineKind::Comment | LineKind::MetadataDirective { .. } => ParseState::Header,
            LineKind::ScriptOpen {
                phase: ScriptPhase::Post,
                source,
            } => self.open_script(ScriptPhase::Post, source),
            _ => {
                self.header_lines.push(line.trim().to_string());
                ParseState::Header
            }
        }
    }

    fn on_body(&mut self, line: &str) -> ParseState {
        if line.trim_start().starts_with('>') {
            if let LineKind::ScriptOpen {
                phase: ScriptPhase::Post,
                source,
            } = lexer::classify(line)
            {
                return self.open_script(ScriptPhase::Post, source);
            }
        }
        self.body_lines.push(line.to_string());
        ParseState::Body
    }

    fn on_capture(&mut self, line: &str, phase: ScriptPhase) -> ParseState {
        let closed = self.capture.as_mut().is_some_and(|c| c.feed(line));
        if !closed {
            return self.state;
        }
        self.close_capture(phase);
        match phase {
            ScriptPhase::Pre => ParseState::Url,
            ScriptPhase::Post => ParseState::PostScript { capturing: false },
        }
    }

    fn on_after_post_script(&mut self, line: &str) -> ParseState {
        match lexer::classify(line) {
            LineKind::ScriptOpen {
                phase: ScriptPhase::Post,
                source,
            } => self.open_script(ScriptPhase::Post, source),
            LineKind::Blank | LineKind::Comment => self.state,
            _ => {
                tracing::trace!(block = self.block_index, line, "discarding line after post-request script");
                self.state
            }
        }
    }

    fn open_script(&mut self, phase: ScriptPhase, source: ScriptSource<'_>) -> ParseState {
        match source {
            ScriptSource::File(path) => {
                if let Some(content) = script::load_script_file(&self.files, path) {
                    self.append_script(phase, &content);
                }
                match phase {
                    ScriptPhase::Pre => ParseState::Url,
                    ScriptPhase::Post => ParseState::PostScript { capturing: false },
                }
            }
            ScriptSource::Inline(rest) => {
                let (capture, closed) = ScriptCapture::open(rest);
                self.capture = Some(capture);
                if closed {
                    self.close_capture(phase);
                }
                match phase {
                    ScriptPhase::Pre if closed => ParseState::Url,
                    ScriptPhase::Pre => ParseState::PreScript,
                    ScriptPhase::Post => ParseState::PostScript { capturing: !closed },
                }
            }
        }
    }

    fn close_capture(&mut self, phase: ScriptPhase) {
        if let Some(capture) = self.capture.take() {
            let text = capture.finish();
            self.append_script(phase, &text);
        }
    }

    fn append_script(&mut self, phase: ScriptPhase, text: &str) {
        let target = match phase {
            ScriptPhase::Pre => &mut self.metadata.pre_script,
            ScriptPhase::Post => &mut self.metadata.post_script,
        };
        script::append_script(target, text);
    }

    /// 结束解析并构造请求
    pub fn finish(mut self, options: &ParseOptions) -> Result<Request, ParseError> {
        // 未闭合的脚本按已捕获的内容保留
        match self.state {
            ParseState::PreScript => self.close_capture(ScriptPhase::Pre),
            ParseState::PostScript { capturing: true } => self.close_capture(ScriptPhase::Post),
            _ => {}
        }

        let Some(request_line) = self.request_line.take() else {
            return Err(ParseError::NoRequestLine {
                block: self.block_index,
            });
        };

        let (method, url, http_version) = self.parse_request_line(&request_line)?;
        let mut request = Request::new(method, url);
        request.http_version = http_version;
        request.name = self.legacy_name.take();

        request.headers = self.parse_headers();
        for (name, value) in &options.default_headers {
            request.headers.set_default(name, value);
        }

        let kind = body::detect_kind(&mut request.headers, &request.url);
        let normalized = body::normalize(&self.body_lines, &kind, &request.headers, &self.files);
        request.raw_body = normalized.raw;
        request.body_kind = kind;
        if kind == BodyKind::Multipart {
            request.multipart_parts = normalized.parts;
        }
        self.warnings.extend(normalized.warnings);

        request.metadata = self.metadata;
        request.warnings = self.warnings;
        Ok(request)
    }

    /// `METHOD URL [HTTP/x.y]`，方法可省略（默认 GET）
    fn parse_request_line(
        &mut self,
        line: &str,
    ) -> Result<(String, String, Option<String>), ParseError> {
        let mut tokens: Vec<&str> = line.split_whitespace().collect();

        let has_version = tokens.len() >= 2
            && tokens
                .last()
                .is_some_and(|t| t.to_ascii_uppercase().starts_with("HTTP/"));
        let version = if has_version {
            tokens.pop().map(String::from)
        } else {
            None
        };

        let first = tokens.first().copied().unwrap_or_default();
        let upper = first.to_ascii_uppercase();

        if KNOWN_METHODS.contains(&upper.as_str()) {
            let url = tokens[1..].join(" ");
            if url.is_empty() {
                return Err(ParseError::MissingUrl {
                    block: self.block_index,
                    line: line.to_string(),
                });
            }
            return Ok((upper, url, version));
        }

        if tokens.len() >= 2 && first.chars().all(|c| c.is_ascii_alphabetic()) {
            self.warnings
                .push(format!("unrecognized HTTP method '{first}'"));
            return Ok((first.to_string(), tokens[1..].join(" "), version));
        }

        Ok(("GET".to_string(), tokens.join(" "), version))
    }

    fn parse_headers(&mut self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for line in &self.header_lines {
            match line.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    headers.append(name.trim(), value.trim());
                }
                _ => {
                    self.warnings
                        .push(format!("malformed header '{line}': expected 'Name: value'"));
                    headers.append(line.as_str(), "");
                }
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::resolver::MemoryResolver;

    fn parse_with(block: &str, resolver: &MemoryResolver) -> Result<Request, ParseError> {
        let files = FileLoader::new(resolver, None);
        BlockParser::new(0, files).parse(block, &ParseOptions::default())
    }

    fn parse(block: &str) -> Request {
        parse_with(block, &MemoryResolver::new()).unwrap()
    }

    #[test]
    fn test_simple_get() {
        let request = parse("GET https://api.example.com/users");
        assert_eq!(request.method, "GET");
        assert_eq!(request.url, "https://api.example.com/users");
        assert!(request.warnings.is_empty());
    }

    #[test]
    fn test_url_only_defaults_to_get() {
        let request = parse("https://example.com");
        assert_eq!(request.method, "GET");
        assert_eq!(request.url, "https://example.com");
    }

    #[test]
    fn test_lowercase_method_and_version() {
        let request = parse("post https://example.com/items HTTP/1.1");
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://example.com/items");
        assert_eq!(request.http_version.as_deref(), Some("HTTP/1.1"));
    }

    #[test]
    fn test_unrecognized_method_warns() {
        let request = parse("FETCH https://example.com");
        assert_eq!(request.method, "FETCH");
        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.warnings.len(), 1);
        assert!(request.warnings[0].contains("FETCH"));
    }

    #[test]
    fn test_missing_url() {
        let err = parse_with("DELETE", &MemoryResolver::new()).unwrap_err();
        assert!(matches!(err, ParseError::MissingUrl { .. }));
    }

    #[test]
    fn test_no_request_line() {
        let err = parse_with("# only a comment\n@host = x\n# @name lonely", &MemoryResolver::new())
            .unwrap_err();
        assert!(matches!(err, ParseError::NoRequestLine { block: 0 }));
    }

    #[test]
    fn test_query_continuation() {
        let request = parse("GET https://example.com/users\n    ?page=1\n    # comment\n    &limit=10\nAccept: */*");
        assert_eq!(request.url, "https://example.com/users?page=1&limit=10");
        assert_eq!(request.headers.get("accept"), Some("*/*"));
    }

    #[test]
    fn test_headers_and_body() {
        let request = parse(
            "POST https://example.com\nContent-Type: application/json\n# skipped\nX-Trace: 1\n\n{\n    \"name\": \"test\"\n}\n",
        );
        assert_eq!(request.headers.len(), 2);
        assert_eq!(request.raw_body, "{\n    \"name\": \"test\"\n}");
    }

    #[test]
    fn test_blank_after_request_line_starts_body() {
        let request = parse("POST https://example.com\n\nraw text");
        assert!(request.headers.is_empty());
        assert_eq!(request.raw_body, "raw text");
    }

    #[test]
    fn test_repeated_headers_combined() {
        let request = parse("GET https://example.com\nCookie: a=1\nAccept: text/html\ncookie: b=2\naccept: application/json");
        assert_eq!(request.headers.get("Cookie"), Some("a=1; b=2"));
        assert_eq!(request.headers.get("Accept"), Some("text/html, application/json"));
    }

    #[test]
    fn test_malformed_header_warns() {
        let request = parse("GET https://example.com\nNotAHeader");
        assert_eq!(request.warnings.len(), 1);
        assert!(request.warnings[0].contains("NotAHeader"));
        assert_eq!(request.headers.get("NotAHeader"), Some(""));
    }

    #[test]
    fn test_metadata_directives() {
        let request = parse(
            "# @name login\n// @note first\n# @note second\n# @no-redirect\n# @no-cookie-jar\n# @prompt password\n# @unknown thing\nPOST https://example.com/login",
        );
        let metadata = &request.metadata;
        assert_eq!(metadata.name.as_deref(), Some("login"));
        assert_eq!(metadata.note.as_deref(), Some("first\nsecond"));
        assert!(metadata.no_redirect);
        assert!(metadata.no_cookie_jar);
        assert_eq!(metadata.prompts.len(), 1);
        assert!(metadata.prompts[0].is_password);
    }

    #[test]
    fn test_legacy_name() {
        let request = parse("@name legacy-login\n@base = http://x\nGET https://example.com");
        assert_eq!(request.name.as_deref(), Some("legacy-login"));
        assert_eq!(request.metadata.name, None);
        assert_eq!(request.effective_name(), Some("legacy-login"));
    }

    #[test]
    fn test_inline_pre_script() {
        let request = parse("< {%\n  request.variables.set('a', 1);\n%}\nGET https://example.com");
        assert_eq!(
            request.metadata.pre_script.as_deref(),
            Some("  request.variables.set('a', 1);")
        );
        assert_eq!(request.url, "https://example.com");
    }

    #[test]
    fn test_same_line_pre_script() {
        let request = parse("< {% setup(); %}\nGET https://example.com");
        assert_eq!(request.metadata.pre_script.as_deref(), Some("setup();"));
    }

    #[test]
    fn test_external_scripts() {
        let resolver = MemoryResolver::new()
            .with_file("pre.js", "before();")
            .with_file("post.js", "after();");
        let request =
            parse_with("< pre.js\nGET https://example.com\n\n> post.js", &resolver).unwrap();
        assert_eq!(request.metadata.pre_script.as_deref(), Some("before();"));
        assert_eq!(request.metadata.post_script.as_deref(), Some("after();"));
        assert_eq!(request.raw_body, "");
    }

    #[test]
    fn test_missing_script_file_is_silent() {
        let request = parse("< missing.js\nGET https://example.com\n\n> gone.js");
        assert_eq!(request.metadata.pre_script, None);
        assert_eq!(request.metadata.post_script, None);
        assert!(request.warnings.is_empty());
    }

    #[test]
    fn test_post_script_after_body() {
        let request = parse(
            "POST https://example.com\nContent-Type: application/json\n\n{\"a\": 1}\n\n> {%\n  client.test('ok', () => {});\n%}\ntrailing line\n",
        );
        assert_eq!(request.raw_body, "{\"a\": 1}");
        assert_eq!(
            request.metadata.post_script.as_deref(),
            Some("  client.test('ok', () => {});")
        );
    }

    #[test]
    fn test_same_line_post_script_then_discard() {
        let resolver = MemoryResolver::new();
        let mut parser = BlockParser::new(0, FileLoader::new(&resolver, None));
        for line in ["GET https://example.com", "", "body", "> {% done(); %}"] {
            parser.feed(line);
        }
        assert_eq!(parser.state(), ParseState::PostScript { capturing: false });
        parser.feed("ignored body line");
        assert_eq!(parser.state(), ParseState::PostScript { capturing: false });

        let request = parser.finish(&ParseOptions::default()).unwrap();
        assert_eq!(request.raw_body, "body");
        assert_eq!(request.metadata.post_script.as_deref(), Some("done();"));
    }

    #[test]
    fn test_post_script_directly_after_headers() {
        let request = parse("GET https://example.com\nAccept: */*\n> {% check(); %}");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.metadata.post_script.as_deref(), Some("check();"));
    }

    #[test]
    fn test_state_transitions() {
        let resolver = MemoryResolver::new();
        let mut parser = BlockParser::new(0, FileLoader::new(&resolver, None));
        assert_eq!(parser.state(), ParseState::Url);
        parser.feed("< {%");
        assert_eq!(parser.state(), ParseState::PreScript);
        parser.feed("%}");
        assert_eq!(parser.state(), ParseState::Url);
        parser.feed("GET /x");
        assert_eq!(parser.state(), ParseState::Url);
        parser.feed("Accept: */*");
        assert_eq!(parser.state(), ParseState::Header);
        parser.feed("");
        assert_eq!(parser.state(), ParseState::Body);
        parser.feed("> {%");
        assert_eq!(parser.state(), ParseState::PostScript { capturing: true });
        parser.feed("%}");
        assert_eq!(parser.state(), ParseState::PostScript { capturing: false });
    }

    #[test]
    fn test_default_headers_do_not_override() {
        let resolver = MemoryResolver::new();
        let files = FileLoader::new(&resolver, None);
        let options = ParseOptions::new()
            .with_default_header("User-Agent", "reqfile")
            .with_default_header("Accept", "*/*");
        let request = BlockParser::new(0, files)
            .parse("GET https://example.com\naccept: application/json", &options)
            .unwrap();
        assert_eq!(request.headers.get("Accept"), Some("application/json"));
        assert_eq!(request.headers.get("user-agent"), Some("reqfile"));
    }

    #[test]
    fn test_graphql_request() {
        let request = parse(
            "POST https://api.example.com/graphql\nX-Request-Type: GraphQL\n\nquery GetUser {\n user(id:\"1\"){name}\n}",
        );
        assert!(!request.headers.contains("X-Request-Type"));
        assert_eq!(
            request.raw_body,
            r#"{"query":"query GetUser {\n user(id:\"1\"){name}\n}","operationName":"GetUser","variables":{}}"#
        );
    }

    #[test]
    fn test_multipart_request() {
        let request = parse(
            "POST https://example.com/upload\nContent-Type: multipart/form-data; boundary=----Bound\n\n------Bound\nContent-Disposition: form-data; name=\"text\"\n\nhello\n------Bound\nContent-Disposition: form-data; name=\"file\"; filename=\"a.png\"\nContent-Type: image/png\n\n< ./a.png\n------Bound--\n",
        );
        assert_eq!(request.multipart_parts.len(), 2);
        assert_eq!(request.multipart_parts[0].value, "hello");
        assert!(request.multipart_parts[1].is_file);
        assert_eq!(request.multipart_parts[1].file_path.as_deref(), Some("./a.png"));
        assert!(request.raw_body.starts_with("------Bound\r\n"));
        assert_eq!(request.warnings.len(), 1);
        assert!(request.warnings[0].contains("./a.png"));
    }

    #[test]
    fn test_body_keeps_interior_and_trailing_blank_lines() {
        let request = parse("POST https://example.com/x\nContent-Type: text/plain\n\nabc\n\n\n");
        assert_eq!(request.raw_body, "abc\n\n");

        let request = parse("POST https://example.com/x\nContent-Type: text/plain\n\nabc\n\n> {% done(); %}");
        assert_eq!(request.raw_body, "abc");
        assert_eq!(request.metadata.post_script.as_deref(), Some("done();"));
    }

    #[test]
    fn test_compact_script_openers() {
        let request = parse("<{% setup(); %}\nGET https://example.com\n\n>{%\ncheck();\n%}");
        assert_eq!(request.metadata.pre_script.as_deref(), Some("setup();"));
        assert_eq!(request.metadata.post_script.as_deref(), Some("check();"));
        assert!(request.raw_body.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let block = "# @name a\nPOST https://example.com\nContent-Type: application/x-www-form-urlencoded\n\na=1\n&b=2";
        assert_eq!(parse(block), parse(block));
    }
}
