use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

/// 文件读取能力，由调用方注入，测试中可替换为内存实现
pub trait FileResolver {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// 基于本地文件系统的实现
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

impl FileResolver for FsResolver {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// 内存文件表
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: HashMap<PathBuf, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(normalize(&path.into()), content.into());
        self
    }
}

// 去掉 `.` 分量，使 `base/./a` 与 `base/a` 视为同一文件
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

impl FileResolver for MemoryResolver {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(&normalize(path)).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )
        })
    }
}

/// 按顺序尝试：绝对路径、基础目录相对路径、当前工作目录相对路径，
/// 返回第一个成功的结果，全部失败时返回最后一个错误
pub fn resolve_file(
    resolver: &dyn FileResolver,
    base_dir: Option<&Path>,
    path: &str,
) -> io::Result<String> {
    let path = Path::new(path.trim());

    if path.is_absolute() {
        return resolver.read_to_string(path);
    }

    if let Some(base) = base_dir {
        match resolver.read_to_string(&base.join(path)) {
            Ok(content) => return Ok(content),
            Err(e) => {
                tracing::trace!(path = %path.display(), error = %e, "not found relative to base dir")
            }
        }
    }

    resolver.read_to_string(path)
}

/// 绑定了解析器和基础目录的文件加载器
#[derive(Clone, Copy)]
pub struct FileLoader<'a> {
    resolver: &'a dyn FileResolver,
    base_dir: Option<&'a Path>,
}

impl<'a> FileLoader<'a> {
    pub fn new(resolver: &'a dyn FileResolver, base_dir: Option<&'a Path>) -> Self {
        Self { resolver, base_dir }
    }

    pub fn load(&self, path: &str) -> io::Result<String> {
        resolve_file(self.resolver, self.base_dir, path)
    }
}
