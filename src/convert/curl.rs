use crate::parser::body::{self, BodyKind};
use crate::parser::{MultipartPart, Request};
use crate::{ReqfileError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// 将 curl 命令字符串转换为请求
pub fn parse_curl(command: &str) -> Result<Request> {
    let args = tokenize(command)?;
    let args = if args.first().is_some_and(|s| s == "curl") {
        args[1..].to_vec()
    } else {
        args
    };
    parse_curl_args(args)
}

/// 将已分词的 curl 参数转换为请求
pub fn parse_curl_args(args: Vec<String>) -> Result<Request> {
    let mut method: Option<String> = None;
    let mut url = String::new();
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut data: Vec<String> = Vec::new();
    let mut form: Vec<MultipartPart> = Vec::new();
    let mut force_get = false;

    let mut args_iter = args.into_iter();

    while let Some(arg) = args_iter.next() {
        // --flag=value 形式
        let (flag, inline_value) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String> {
            inline_value
                .clone()
                .or_else(|| args_iter.next())
                .ok_or_else(|| ReqfileError::Curl(format!("missing value for {name}")))
        };

        match flag.as_str() {
            "-X" | "--request" => method = Some(value(&flag)?.to_uppercase()),
            "-H" | "--header" => {
                let header = value(&flag)?;
                match header.split_once(':') {
                    Some((k, v)) => headers.push((k.trim().to_string(), v.trim().to_string())),
                    None => tracing::debug!(header = %header, "ignoring curl header without ':'"),
                }
            }
            "-d" | "--data" | "--data-raw" | "--data-binary" | "--data-ascii"
            | "--data-urlencode" => data.push(value(&flag)?),
            "-F" | "--form" => form.push(form_part(&value(&flag)?)),
            "-u" | "--user" => {
                let credentials = value(&flag)?;
                headers.push((
                    "Authorization".to_string(),
                    format!("Basic {}", STANDARD.encode(credentials)),
                ));
            }
            "-A" | "--user-agent" => headers.push(("User-Agent".to_string(), value(&flag)?)),
            "-e" | "--referer" => headers.push(("Referer".to_string(), value(&flag)?)),
            "-b" | "--cookie" => headers.push(("Cookie".to_string(), value(&flag)?)),
            "--url" => url = value(&flag)?,
            "-G" | "--get" => force_get = true,
            "-I" | "--head" => method = Some("HEAD".to_string()),
            // 带参数但与请求定义无关的选项
            "-o" | "--output" | "-m" | "--max-time" | "--connect-timeout" | "-x" | "--proxy" => {
                value(&flag)?;
            }
            s if s.starts_with('-') => {
                tracing::debug!(flag = s, "ignoring curl flag");
            }
            _ => {
                if url.is_empty() {
                    url = arg;
                }
            }
        }
    }

    if url.is_empty() {
        return Err(ReqfileError::Curl("URL is required".to_string()));
    }

    let payload = data.join("&");
    if force_get && !payload.is_empty() {
        let sep = if url.contains('?') { '&' } else { '?' };
        url = format!("{url}{sep}{payload}");
    }

    // 有请求体且没有强制 GET 时默认 POST
    let has_body = (!payload.is_empty() && !force_get) || !form.is_empty();
    let method = match method {
        Some(m) => m,
        None if has_body => "POST".to_string(),
        None => "GET".to_string(),
    };

    let mut request = Request::new(method, url);
    for (k, v) in headers {
        request.headers.append(k, v);
    }

    if !form.is_empty() {
        let boundary = "----ReqfileFormBoundary";
        request.headers.insert(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        );
        request.raw_body = render_multipart(&form, boundary);
        request.multipart_parts = form;
    } else if !force_get && !payload.is_empty() {
        if !request.headers.contains("Content-Type") {
            request
                .headers
                .insert("Content-Type", "application/x-www-form-urlencoded");
        }
        request.raw_body = payload;
    }

    request.body_kind = body::detect_kind(&mut request.headers, &request.url);
    Ok(request)
}

/// `-F name=value` / `-F name=@path[;type=mime]`
fn form_part(arg: &str) -> MultipartPart {
    let (name, rest) = arg.split_once('=').unwrap_or((arg, ""));
    let mut segments = rest.split(';');
    let value = segments.next().unwrap_or_default();
    let content_type = segments
        .filter_map(|s| s.trim().strip_prefix("type="))
        .map(String::from)
        .next();

    match value.strip_prefix('@') {
        Some(path) => MultipartPart {
            name: name.to_string(),
            file_name: std::path::Path::new(path)
                .file_name()
                .map(|f| f.to_string_lossy().into_owned()),
            file_path: Some(path.to_string()),
            content_type,
            is_file: true,
            ..MultipartPart::default()
        },
        None => MultipartPart {
            name: name.to_string(),
            value: value.to_string(),
            content_type,
            ..MultipartPart::default()
        },
    }
}

fn render_multipart(parts: &[MultipartPart], boundary: &str) -> String {
    let mut out = String::new();
    for part in parts {
        out.push_str(&format!("--{boundary}\r\n"));
        out.push_str(&format!(
            "Content-Disposition: form-data; name=\"{}\"",
            part.name
        ));
        if let Some(file_name) = &part.file_name {
            out.push_str(&format!("; filename=\"{file_name}\""));
        }
        out.push_str("\r\n");
        if let Some(ct) = &part.content_type {
            out.push_str(&format!("Content-Type: {ct}\r\n"));
        }
        out.push_str("\r\n");
        match &part.file_path {
            Some(path) if part.is_file => out.push_str(&format!("< {path}")),
            _ => out.push_str(&part.value),
        }
        out.push_str("\r\n");
    }
    out.push_str(&format!("--{boundary}--"));
    out
}

/// 按 shell 规则分词：支持单双引号、反斜杠转义和行尾 `\` 续行
pub fn tokenize(command: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(ReqfileError::Curl("unterminated single quote".into())),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\' | '$' | '`')) => current.push(ch),
                            Some('\n') => {}
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => {
                                return Err(ReqfileError::Curl("unterminated double quote".into()));
                            }
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(ReqfileError::Curl("unterminated double quote".into())),
                    }
                }
            }
            '\\' => match chars.next() {
                // 续行
                Some('\n') => {}
                Some('\r') if chars.peek() == Some(&'\n') => {
                    chars.next();
                }
                Some(ch) => {
                    in_token = true;
                    current.push(ch);
                }
                None => {}
            },
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
