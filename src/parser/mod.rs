pub mod block;
pub mod body;
pub mod duplicates;
pub mod headers;
pub mod http_file;
pub mod lexer;
pub mod metadata;
pub mod metadata_types;
pub mod multipart;
pub mod resolver;
pub mod script;
pub mod types;

// Re-export commonly used types
pub use headers::HeaderMap;
pub use http_file::{HttpFileParser, RawBlock, parse, split_blocks};
pub use metadata_types::{PromptVariable, RequestMetadata};
pub use multipart::MultipartPart;
pub use resolver::{FileResolver, FsResolver, MemoryResolver};
pub use types::{DuplicateName, ParseError, ParseOptions, ParseResult, ParseWarning, Request};

/// 从文件路径解析 HTTP 文件
pub fn parse_file<P: AsRef<std::path::Path>>(path: P) -> Result<ParseResult, ParseError> {
    HttpFileParser::parse_file(path)
}

/// 从字符串内容解析 HTTP 请求
pub fn parse_content(content: &str) -> ParseResult {
    HttpFileParser::parse_content(content)
}
