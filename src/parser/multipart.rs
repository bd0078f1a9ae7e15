use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// multipart/form-data 中的一个部分
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MultipartPart {
    pub name: String,
    pub value: String,
    pub file_name: Option<String>,
    /// `< path` 形式引用的外部文件
    pub file_path: Option<String>,
    pub content_type: Option<String>,
    pub is_file: bool,
}

/// 从 Content-Type 中取出 boundary 参数（key 不区分大小写，值保留大小写，去掉引号）
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// 按 boundary 拆分整个请求体
pub fn parse_multipart(body: &str, boundary: &str) -> Vec<MultipartPart> {
    let delimiter = format!("--{boundary}");
    let sections: Vec<&str> = body
        .split(delimiter.as_str())
        .filter(|s| {
            let t = s.trim();
            !t.is_empty() && t != "--"
        })
        .collect();

    let last = sections.len().saturating_sub(1);
    let mut parts: Vec<MultipartPart> = sections
        .iter()
        .enumerate()
        .filter_map(|(i, section)| {
            if i == last {
                let trimmed = section.trim_end();
                parse_section(trimmed.strip_suffix("--").unwrap_or(section))
            } else {
                parse_section(section)
            }
        })
        .collect();

    for part in &mut parts {
        let trimmed = part.value.trim();
        if let Some(path) = trimmed.strip_prefix("< ") {
            part.file_path = Some(path.trim().to_string());
            part.is_file = true;
            part.value.clear();
        }
    }

    parts
}

/// 解析单个部分：头部与值之间以第一个空行分隔；没有 name 的部分被丢弃
pub fn parse_section(section: &str) -> Option<MultipartPart> {
    let section = section
        .strip_prefix("\r\n")
        .or_else(|| section.strip_prefix('\n'))
        .unwrap_or(section);

    let (head, value) = match section.split_once("\r\n\r\n") {
        Some(split) => split,
        None => section.split_once("\n\n").unwrap_or((section, "")),
    };
    let value = value
        .strip_suffix("\r\n")
        .or_else(|| value.strip_suffix('\n'))
        .unwrap_or(value);

    let mut part = MultipartPart {
        value: value.to_string(),
        ..MultipartPart::default()
    };
    let mut has_name = false;

    for line in head.lines().map(|l| l.trim_end_matches('\r')) {
        let Some((key, header_value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            if let Some(name) = disposition_param(header_value, "name") {
                part.name = name;
                has_name = true;
            }
            part.file_name = disposition_param(header_value, "filename");
        } else if key.eq_ignore_ascii_case("content-type") {
            part.content_type = Some(header_value.trim().to_string());
        }
    }

    has_name.then_some(part)
}

fn disposition_param(header_value: &str, param: &str) -> Option<String> {
    static PARAM_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = PARAM_REGEX
        .get_or_init(|| Regex::new(r#"(?i)^\s*([\w*-]+)\s*=\s*(?:"([^"]*)"|([^;\s]*))"#).unwrap());

    header_value.split(';').skip(1).find_map(|segment| {
        let caps = re.captures(segment)?;
        if !caps[1].eq_ignore_ascii_case(param) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
    })
}
