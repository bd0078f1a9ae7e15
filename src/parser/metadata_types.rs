use serde::Serialize;

/// 请求元数据
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RequestMetadata {
    /// 请求名称（# @name），重复出现时后者覆盖前者
    pub name: Option<String>,

    /// 说明（# @note），多次出现时以换行拼接
    pub note: Option<String>,

    /// 不跟随重定向（# @no-redirect）
    pub no_redirect: bool,

    /// 不使用 Cookie Jar（# @no-cookie-jar）
    pub no_cookie_jar: bool,

    /// 请求前脚本
    pub pre_script: Option<String>,

    /// 响应后脚本
    pub post_script: Option<String>,

    /// 运行前需要提示输入的变量（# @prompt）
    pub prompts: Vec<PromptVariable>,
}

/// 需要在执行前向用户提示输入的变量
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptVariable {
    pub name: String,
    pub description: Option<String>,
    /// 输入时是否隐藏
    pub is_password: bool,
}

impl PromptVariable {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        let name = name.into();
        let is_password = matches!(
            name.to_lowercase().as_str(),
            "password" | "passwd" | "pass"
        );
        Self {
            name,
            description,
            is_password,
        }
    }
}
