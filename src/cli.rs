use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use reqfile::config::ConfigLoader;
use reqfile::convert::curl;
use reqfile::export::postman;
use reqfile::generator::HttpGenerator;
use reqfile::parser::{HttpFileParser, ParseResult};
use reqfile::utils::{OutputFormat, ResultFormatter};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 日志详细程度（-v info, -vv debug）
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// 关闭彩色输出
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Format {
    Table,
    Json,
    Http,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Table => OutputFormat::Table,
            Format::Json => OutputFormat::Json,
            Format::Http => OutputFormat::Http,
        }
    }
}

#[derive(clap::Args, Clone, Debug, Default)]
pub struct ParseArgs {
    /// 请求文件路径
    pub file: PathBuf,

    /// 默认 Header，可重复，格式 "Name: value"
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// 相对文件引用的基础目录
    #[arg(long)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 解析请求文件并输出
    Parse {
        #[command(flatten)]
        args: ParseArgs,

        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// 只检查警告，存在警告时以非零状态退出
    Check {
        #[command(flatten)]
        args: ParseArgs,
    },
    /// 导出为 Postman 集合
    Export {
        #[command(flatten)]
        args: ParseArgs,

        /// 输出文件，默认写到 stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 集合名称，默认使用文件名
        #[arg(short, long)]
        name: Option<String>,
    },
    /// 按名称显示单个请求
    Show {
        #[command(flatten)]
        args: ParseArgs,

        /// 请求名称（# @name）
        name: String,
    },
    /// 将 curl 命令转换为请求定义
    Curl {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
}

/// 命令执行结果：是否以失败状态退出
pub fn run(cli: Cli) -> Result<bool> {
    let color = !cli.no_color;
    if !color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Parse { args, format } => {
            let result = parse_with_config(&args)?;
            let output = ResultFormatter::new(format.into())
                .with_color(color)
                .format(&result)?;
            println!("{output}");
            Ok(false)
        }
        Commands::Check { args } => {
            let result = parse_with_config(&args)?;
            let formatter = ResultFormatter::new(OutputFormat::Table).with_color(color);
            if result.has_warnings() {
                eprintln!("{}", formatter.format_warnings(&result.warnings));
            }
            println!(
                "{} requests, {} warnings",
                result.requests.len(),
                result.warnings.len()
            );
            Ok(result.has_warnings())
        }
        Commands::Export { args, output, name } => {
            let result = parse_with_config(&args)?;
            let name = name.unwrap_or_else(|| collection_name(&args.file));
            let json = postman::to_json(&name, &result)?;
            let text = serde_json::to_string_pretty(&json)?;
            match output {
                Some(path) => std::fs::write(&path, text)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{text}"),
            }
            Ok(false)
        }
        Commands::Show { args, name } => {
            let result = parse_with_config(&args)?;
            let Some(request) = result.find_by_name(&name) else {
                bail!("no request named '{}' in {}", name, args.file.display());
            };
            print!("{}", HttpGenerator::format_request(request));
            Ok(false)
        }
        Commands::Curl { args } => {
            let args = if args.first().is_some_and(|s| s == "curl") {
                args[1..].to_vec()
            } else {
                args
            };
            // 整条命令作为一个参数传入时按 shell 规则分词
            let request = if args.len() == 1 && args[0].contains(char::is_whitespace) {
                curl::parse_curl(&args[0])?
            } else {
                curl::parse_curl_args(args)?
            };
            print!("{}", HttpGenerator::format_request(&request));
            Ok(false)
        }
    }
}

fn parse_with_config(args: &ParseArgs) -> Result<ParseResult> {
    let cli_headers = args
        .headers
        .iter()
        .map(|h| {
            ConfigLoader::parse_cli_header(h)
                .with_context(|| format!("invalid header '{h}', expected 'Name: value'"))
        })
        .collect::<Result<Vec<_>>>()?;

    let config = ConfigLoader::find_and_load();
    let options = ConfigLoader::build_options(config.as_ref(), &cli_headers, args.base_dir.as_deref());
    let result = HttpFileParser::parse_file_with(&args.file, &options)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    tracing::info!(
        file = %args.file.display(),
        requests = result.requests.len(),
        warnings = result.warnings.len(),
        "parsed request file"
    );
    Ok(result)
}

fn collection_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reqfile".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["reqfile", "-vv", "parse", "api.http", "-f", "json", "-H", "X-A: 1"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Parse { args, format } => {
                assert_eq!(args.file, PathBuf::from("api.http"));
                assert_eq!(args.headers, vec!["X-A: 1".to_string()]);
                assert!(matches!(format, Format::Json));
            }
            _ => panic!("expected parse command"),
        }
    }

    #[test]
    fn test_cli_curl_accepts_hyphen_args() {
        let cli = Cli::try_parse_from(["reqfile", "curl", "-X", "POST", "https://example.com"]).unwrap();
        match cli.command {
            Commands::Curl { args } => assert_eq!(args, vec!["-X", "POST", "https://example.com"]),
            _ => panic!("expected curl command"),
        }
    }

    #[test]
    fn test_collection_name() {
        assert_eq!(collection_name(Path::new("/a/b/users.http")), "users");
    }

    #[test]
    fn test_check_reports_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dup.http");
        std::fs::write(&file, "# @name a\nGET /1\n###\n# @name a\nGET /2\n").unwrap();

        let cli = Cli::try_parse_from(["reqfile", "--no-color", "check", file.to_str().unwrap()]).unwrap();
        assert!(run(cli).unwrap());
    }

    #[test]
    fn test_show_missing_name_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.http");
        std::fs::write(&file, "GET /1\n").unwrap();

        let cli = Cli::try_parse_from(["reqfile", "show", file.to_str().unwrap(), "nope"]).unwrap();
        assert!(run(cli).is_err());
    }
}
