//! Postman Collection v2.1 导出
//!
//! 只做结构映射，脚本内容原样复制，不做语法转换。

use crate::parser::body::BodyKind;
use crate::parser::{MultipartPart, ParseResult, Request};
use serde::Serialize;
use serde_json::Value;

const SCHEMA_URL: &str = "https://schema.getpostman.com/json/collection/v2.1.0/collection.json";

#[derive(Debug, Serialize)]
pub struct Collection {
    pub info: Info,
    pub item: Vec<Item>,
}

#[derive(Debug, Serialize)]
pub struct Info {
    #[serde(rename = "_postman_id")]
    pub postman_id: String,
    pub name: String,
    pub schema: String,
}

#[derive(Debug, Serialize)]
pub struct Item {
    pub name: String,
    pub request: ItemRequest,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event: Vec<Event>,
}

#[derive(Debug, Serialize)]
pub struct ItemRequest {
    pub method: String,
    pub header: Vec<KeyValue>,
    pub url: RawUrl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct RawUrl {
    pub raw: String,
}

#[derive(Debug, Serialize)]
pub struct Event {
    pub listen: String,
    pub script: Script,
}

#[derive(Debug, Serialize)]
pub struct Script {
    #[serde(rename = "type")]
    pub kind: String,
    pub exec: Vec<String>,
}

/// 将解析结果转换为 Postman 集合
pub fn to_collection(name: &str, result: &ParseResult) -> Collection {
    Collection {
        info: Info {
            postman_id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            schema: SCHEMA_URL.to_string(),
        },
        item: result.requests.iter().map(to_item).collect(),
    }
}

/// 转换为 JSON 值
pub fn to_json(name: &str, result: &ParseResult) -> serde_json::Result<Value> {
    serde_json::to_value(to_collection(name, result))
}

fn to_item(request: &Request) -> Item {
    let name = request
        .effective_name()
        .map(String::from)
        .unwrap_or_else(|| format!("{} {}", request.method, request.url));

    let mut event = Vec::new();
    if let Some(script) = &request.metadata.pre_script {
        event.push(script_event("prerequest", script));
    }
    if let Some(script) = &request.metadata.post_script {
        event.push(script_event("test", script));
    }

    Item {
        name,
        request: ItemRequest {
            method: request.method.clone(),
            header: request
                .headers
                .iter()
                .map(|(k, v)| KeyValue {
                    key: k.to_string(),
                    value: v.to_string(),
                })
                .collect(),
            url: RawUrl {
                raw: request.url.clone(),
            },
            body: to_body(request),
            description: request.metadata.note.clone(),
        },
        event,
    }
}

fn script_event(listen: &str, script: &str) -> Event {
    Event {
        listen: listen.to_string(),
        script: Script {
            kind: "text/javascript".to_string(),
            exec: script.lines().map(String::from).collect(),
        },
    }
}

fn to_body(request: &Request) -> Option<Value> {
    if request.is_multipart() {
        let parts: Vec<Value> = request.multipart_parts.iter().map(form_data_entry).collect();
        return Some(serde_json::json!({ "mode": "formdata", "formdata": parts }));
    }
    if request.raw_body.is_empty() {
        return None;
    }

    match request.body_kind {
        BodyKind::Form => {
            let pairs: Vec<Value> = request
                .raw_body
                .split('&')
                .map(|pair| {
                    let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                    serde_json::json!({ "key": k, "value": v })
                })
                .collect();
            Some(serde_json::json!({ "mode": "urlencoded", "urlencoded": pairs }))
        }
        BodyKind::GraphQl => match serde_json::from_str::<Value>(&request.raw_body) {
            Ok(envelope) if envelope.get("query").is_some() => {
                let variables = envelope
                    .get("variables")
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "{}".to_string());
                Some(serde_json::json!({
                    "mode": "graphql",
                    "graphql": { "query": envelope["query"], "variables": variables }
                }))
            }
            _ => Some(raw_body(request)),
        },
        _ => Some(raw_body(request)),
    }
}

fn raw_body(request: &Request) -> Value {
    let language = match request.content_type().map(body_language) {
        Some(lang) => lang,
        None if serde_json::from_str::<Value>(&request.raw_body).is_ok() => "json",
        None => "text",
    };
    serde_json::json!({
        "mode": "raw",
        "raw": request.raw_body,
        "options": { "raw": { "language": language } }
    })
}

fn body_language(content_type: &str) -> &'static str {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("json") {
        "json"
    } else if ct.contains("xml") {
        "xml"
    } else if ct.contains("html") {
        "html"
    } else if ct.contains("javascript") {
        "javascript"
    } else {
        "text"
    }
}

fn form_data_entry(part: &MultipartPart) -> Value {
    let mut entry = if part.is_file {
        serde_json::json!({
            "key": part.name,
            "type": "file",
            "src": part.file_path.clone().unwrap_or_default(),
        })
    } else {
        serde_json::json!({ "key": part.name, "type": "text", "value": part.value })
    };
    if let (Some(ct), Some(obj)) = (&part.content_type, entry.as_object_mut()) {
        obj.insert("contentType".to_string(), Value::String(ct.clone()));
    }
    entry
}
