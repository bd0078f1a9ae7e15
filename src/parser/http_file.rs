use crate::parser::block::BlockParser;
use crate::parser::duplicates;
use crate::parser::lexer::{self, LineKind};
use crate::parser::resolver::{FileLoader, FileResolver, FsResolver};
use crate::parser::types::{ParseError, ParseOptions, ParseResult, ParseWarning, Request};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// 分隔符之间的一段原始文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock<'a> {
    pub index: usize,
    pub text: &'a str,
}

impl RawBlock<'_> {
    /// 只包含空行、注释和文件变量的块不参与解析
    pub fn is_blank(&self) -> bool {
        self.text.lines().all(|line| {
            matches!(
                lexer::classify(line),
                LineKind::Blank
                    | LineKind::Comment
                    | LineKind::MetadataDirective { .. }
                    | LineKind::FileVariable
            )
        })
    }
}

/// 按 `###` 分隔行（三个及以上 `#` 开头，行尾文本忽略）切分文件
///
/// N 个分隔行产生 N+1 个块。
pub fn split_blocks(content: &str) -> Vec<RawBlock<'_>> {
    static SEPARATOR_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = SEPARATOR_REGEX.get_or_init(|| Regex::new(r"(?m)^#{3,}.*$").unwrap());

    re.split(content)
        .enumerate()
        .map(|(index, text)| RawBlock { index, text })
        .collect()
}

/// 解析整个文件内容，失败的块转为警告，不影响其他块
pub fn parse(content: &str, options: &ParseOptions, resolver: &dyn FileResolver) -> ParseResult {
    let files = FileLoader::new(resolver, options.base_dir.as_deref());
    let mut result = ParseResult::new();
    let mut block_indices = Vec::new();

    for block in split_blocks(content) {
        if block.is_blank() {
            continue;
        }

        match BlockParser::new(block.index, files).parse(block.text, options) {
            Ok(request) => {
                tracing::debug!(
                    block = block.index,
                    method = %request.method,
                    url = %request.url,
                    "parsed request"
                );
                result.warnings.extend(
                    request
                        .warnings
                        .iter()
                        .map(|w| ParseWarning::new(block.index, w.clone())),
                );
                block_indices.push(block.index);
                result.requests.push(request);
            }
            Err(e) => {
                tracing::debug!(block = block.index, error = %e, "skipping block");
                result.warnings.push(ParseWarning::new(
                    block.index,
                    format!("failed to parse request block: {e}"),
                ));
            }
        }
    }

    result
        .warnings
        .extend(duplicates::duplicate_warnings(&result.requests, &block_indices));
    result
}

/// HTTP 文件解析器
pub struct HttpFileParser;

impl HttpFileParser {
    /// 从文件路径解析，相对文件引用以该文件所在目录为基础目录
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ParseResult, ParseError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut options = ParseOptions::default();
        if let Some(parent) = path.parent() {
            options.base_dir = Some(parent.to_path_buf());
        }
        Ok(parse(&content, &options, &FsResolver).with_source_path(path.to_path_buf()))
    }

    /// 使用指定选项从文件路径解析；选项中没有基础目录时使用文件所在目录
    pub fn parse_file_with<P: AsRef<Path>>(
        path: P,
        options: &ParseOptions,
    ) -> Result<ParseResult, ParseError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut options = options.clone();
        if options.base_dir.is_none() {
            options.base_dir = path.parent().map(Path::to_path_buf);
        }
        Ok(parse(&content, &options, &FsResolver).with_source_path(path.to_path_buf()))
    }

    /// 从字符串内容解析（默认选项，本地文件系统）
    pub fn parse_content(content: &str) -> ParseResult {
        parse(content, &ParseOptions::default(), &FsResolver)
    }

    /// 解析单个请求块，找不到请求行时返回错误
    pub fn parse_request(
        block: &str,
        options: &ParseOptions,
        resolver: &dyn FileResolver,
    ) -> Result<Request, ParseError> {
        let files = FileLoader::new(resolver, options.base_dir.as_deref());
        BlockParser::new(0, files).parse(block, options)
    }

    /// 旧接口：任意块失败即返回错误
    pub fn parse_all(
        content: &str,
        options: &ParseOptions,
        resolver: &dyn FileResolver,
    ) -> Result<Vec<Request>, ParseError> {
        let files = FileLoader::new(resolver, options.base_dir.as_deref());
        let requests = split_blocks(content)
            .into_iter()
            .filter(|block| !block.is_blank())
            .map(|block| BlockParser::new(block.index, files).parse(block.text, options))
            .collect::<Result<Vec<_>, _>>()?;

        if requests.is_empty() {
            return Err(ParseError::EmptyContent);
        }
        Ok(requests)
    }
}
