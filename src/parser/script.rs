use crate::parser::resolver::FileLoader;

/// 内联脚本 `{% ... %}` 的捕获缓冲
#[derive(Debug, Default)]
pub struct ScriptCapture {
    lines: Vec<String>,
}

impl ScriptCapture {
    /// 以 `{%` 之后的文本开始捕获，返回捕获器以及是否已在同一行闭合
    pub fn open(rest: &str) -> (Self, bool) {
        let mut capture = Self::default();
        if let Some(end) = rest.find("%}") {
            capture.push_fragment(rest[..end].trim_start());
            return (capture, true);
        }
        capture.push_fragment(rest.trim_start());
        (capture, false)
    }

    /// 喂入下一行，遇到 `%}` 时返回 true
    pub fn feed(&mut self, line: &str) -> bool {
        match line.find("%}") {
            Some(end) => {
                self.push_fragment(&line[..end]);
                true
            }
            None => {
                self.lines.push(line.to_string());
                false
            }
        }
    }

    pub fn finish(self) -> String {
        self.lines.join("\n")
    }

    // 开闭标记所在行上的空白片段不计入脚本
    fn push_fragment(&mut self, fragment: &str) {
        if !fragment.trim().is_empty() {
            self.lines.push(fragment.trim_end().to_string());
        }
    }
}

/// 追加脚本文本，多段之间以换行分隔
pub fn append_script(target: &mut Option<String>, script: &str) {
    if script.is_empty() {
        return;
    }
    match target {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(script);
        }
        None => *target = Some(script.to_string()),
    }
}

/// 读取外部脚本文件，读取失败时静默跳过（只记录日志）
pub fn load_script_file(files: &FileLoader<'_>, path: &str) -> Option<String> {
    match files.load(path) {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::warn!(path, error = %e, "skipping unreadable script file");
            None
        }
    }
}
