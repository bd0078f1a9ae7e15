use crate::parser::ParseOptions;
use crate::{ReqfileError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 配置文件内容
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct Defaults {
    /// 每个请求默认携带的 Header
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// 相对文件引用的基础目录
    pub base_dir: Option<PathBuf>,
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    const CONFIG_FILE: &'static str = "reqfile.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ReqfileError::Config(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录及其父目录
    /// 2. 用户配置目录 ~/.config/reqfile/
    pub fn find_and_load() -> Option<Config> {
        let path = std::env::current_dir()
            .ok()
            .and_then(|dir| Self::find_in_ancestors(&dir))
            .or_else(Self::user_config_path)?;

        match Self::load_from_path(&path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
                None
            }
        }
    }

    /// 从 start 开始逐级向上查找配置文件
    pub fn find_in_ancestors(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(Self::CONFIG_FILE))
            .find(|path| path.is_file())
    }

    fn user_config_path() -> Option<PathBuf> {
        let path = dirs::home_dir()?
            .join(".config")
            .join("reqfile")
            .join(Self::CONFIG_FILE);
        path.is_file().then_some(path)
    }

    /// 构建解析选项
    /// CLI 传入的 Header 覆盖配置文件中的同名 Header；
    /// 基础目录优先取 CLI，其次配置文件，都没有时由解析器使用文件所在目录
    pub fn build_options(
        config: Option<&Config>,
        cli_headers: &[(String, String)],
        cli_base_dir: Option<&Path>,
    ) -> ParseOptions {
        let mut options = ParseOptions::new();

        if let Some(config) = config {
            for (name, value) in &config.defaults.headers {
                if !cli_headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name)) {
                    options.default_headers.push((name.clone(), value.clone()));
                }
            }
            options.base_dir = config.defaults.base_dir.clone();
        }
        options
            .default_headers
            .extend(cli_headers.iter().cloned());

        if let Some(dir) = cli_base_dir {
            options.base_dir = Some(dir.to_path_buf());
        }
        options
    }

    /// 解析 CLI Header 参数 "Name: value"
    pub fn parse_cli_header(s: &str) -> Option<(String, String)> {
        let (name, value) = s.split_once(':')?;
        let name = name.trim();
        (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_path() {
        let config_content = r#"
[defaults]
base_dir = "/srv/requests"

[defaults.headers]
"User-Agent" = "reqfile/0.1"
Accept = "application/json"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = ConfigLoader::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.defaults.headers.len(), 2);
        assert_eq!(
            config.defaults.base_dir,
            Some(PathBuf::from("/srv/requests"))
        );
    }

    #[test]
    fn test_invalid_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[defaults\nbroken").unwrap();
        temp_file.flush().unwrap();

        let err = ConfigLoader::load_from_path(temp_file.path()).unwrap_err();
        assert!(matches!(err, ReqfileError::Toml(_)));
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_build_options() {
        let config: Config = toml::from_str(
            r#"
[defaults.headers]
"User-Agent" = "reqfile"
Accept = "*/*"
"#,
        )
        .unwrap();

        let cli_headers = vec![("accept".to_string(), "text/plain".to_string())];
        let options = ConfigLoader::build_options(Some(&config), &cli_headers, None);
        assert_eq!(
            options.default_headers,
            vec![
                ("User-Agent".to_string(), "reqfile".to_string()),
                ("accept".to_string(), "text/plain".to_string()),
            ]
        );
        assert_eq!(options.base_dir, None);

        let options = ConfigLoader::build_options(None, &[], Some(Path::new("/tmp/x")));
        assert!(options.default_headers.is_empty());
        assert_eq!(options.base_dir, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn test_parse_cli_header() {
        assert_eq!(
            ConfigLoader::parse_cli_header("Authorization: Bearer abc"),
            Some(("Authorization".to_string(), "Bearer abc".to_string()))
        );
        assert_eq!(
            ConfigLoader::parse_cli_header("X-Url: http://a:8080"),
            Some(("X-Url".to_string(), "http://a:8080".to_string()))
        );
        assert_eq!(ConfigLoader::parse_cli_header("invalid"), None);
        assert_eq!(ConfigLoader::parse_cli_header(": value"), None);
    }

    #[test]
    fn test_find_in_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("reqfile.toml"), "").unwrap();

        let found = ConfigLoader::find_in_ancestors(&nested).unwrap();
        assert_eq!(found, dir.path().join("reqfile.toml"));
    }
}
