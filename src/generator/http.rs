use crate::parser::Request;
use crate::parser::body::{self, BodyKind};

pub struct HttpGenerator;

impl HttpGenerator {
    /// Convert a list of requests back to .http file content
    pub fn generate(requests: &[Request]) -> String {
        let mut output = String::new();

        for (i, request) in requests.iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            output.push_str(&Self::format_request(request));
        }

        output
    }

    pub fn format_request(request: &Request) -> String {
        let mut block = String::new();
        let metadata = &request.metadata;

        // 1. Separator / Name
        match request.effective_name() {
            Some(name) => block.push_str(&format!("### {name}\n")),
            None => block.push_str("###\n"),
        }
        match (&metadata.name, &request.name) {
            (Some(name), _) => block.push_str(&format!("# @name {name}\n")),
            (None, Some(legacy)) => block.push_str(&format!("@name {legacy}\n")),
            (None, None) => {}
        }
        if let Some(note) = &metadata.note {
            for line in note.lines() {
                block.push_str(&format!("# @note {line}\n"));
            }
        }
        if metadata.no_redirect {
            block.push_str("# @no-redirect\n");
        }
        if metadata.no_cookie_jar {
            block.push_str("# @no-cookie-jar\n");
        }
        for prompt in &metadata.prompts {
            match &prompt.description {
                Some(desc) => block.push_str(&format!("# @prompt {} {}\n", prompt.name, desc)),
                None => block.push_str(&format!("# @prompt {}\n", prompt.name)),
            }
        }
        if let Some(script) = &metadata.pre_script {
            block.push_str(&format!("< {{%\n{script}\n%}}\n"));
        }

        // 2. Request Line
        match &request.http_version {
            Some(version) => {
                block.push_str(&format!("{} {} {}\n", request.method, request.url, version))
            }
            None => block.push_str(&format!("{} {}\n", request.method, request.url)),
        }

        // 3. Headers
        for (key, value) in request.headers.iter() {
            block.push_str(&format!("{key}: {value}\n"));
        }
        if request.body_kind == BodyKind::GraphQl && !Self::graphql_by_url(request) {
            block.push_str("X-Request-Type: GraphQL\n");
        }

        // 4. Body
        let body = Self::body_text(request);
        if !body.is_empty() {
            block.push('\n');
            block.push_str(&body);
            block.push('\n');
        }

        // 5. Post-request script
        if let Some(script) = &metadata.post_script {
            block.push_str(&format!("\n> {{%\n{script}\n%}}\n"));
        }

        block
    }

    fn body_text(request: &Request) -> String {
        if request.is_multipart() {
            return request.raw_body.replace("\r\n", "\n");
        }

        // GraphQL 请求体会在重新解析时再次封装，这里还原成查询文本
        if request.body_kind == BodyKind::GraphQl {
            if let Some(document) = Self::graphql_document(&request.raw_body) {
                return document;
            }
        }

        request.raw_body.clone()
    }

    /// 重新解析时仅凭 URL 和 Content-Type 能否识别为 GraphQL
    fn graphql_by_url(request: &Request) -> bool {
        let mut headers = request.headers.clone();
        body::detect_kind(&mut headers, &request.url) == BodyKind::GraphQl
    }

    fn graphql_document(envelope: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(envelope).ok()?;
        let query = value.get("query")?.as_str()?;
        match value.get("variables") {
            Some(vars) if vars.as_object().is_some_and(|o| !o.is_empty()) => {
                let vars = serde_json::to_string_pretty(vars).ok()?;
                Some(format!("{query}\n\n{vars}"))
            }
            _ => Some(query.to_string()),
        }
    }
}
