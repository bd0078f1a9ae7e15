use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// 大小写不敏感的 Header 集合
///
/// 保留首次出现时的原始大小写和插入顺序；同名 Header 再次出现时
/// 合并到已有的值上，而不是覆盖。`Cookie` 使用 `; ` 连接，其他使用 `, `。
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
    /// 小写名称 -> entries 中的位置
    index: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加 Header，若已存在同名 Header 则合并值
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let key = name.to_ascii_lowercase();

        match self.index.get(&key) {
            Some(&pos) => {
                let (existing_name, existing) = &mut self.entries[pos];
                existing.push_str(separator(existing_name));
                existing.push_str(&value);
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    /// 设置 Header，覆盖已有的值（保留原有名称的大小写和位置）
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();

        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = value.into(),
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((name, value.into()));
            }
        }
    }

    /// 仅在 Header 不存在时设置（用于默认 Header）
    pub fn set_default(&mut self, name: &str, value: &str) {
        if !self.contains(name) {
            self.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(&name.to_ascii_lowercase())
            .map(|&pos| self.entries[pos].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_ascii_lowercase())
    }

    /// 删除 Header，返回被删除的值
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.index.remove(&name.to_ascii_lowercase())?;
        let (_, value) = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按插入顺序遍历 (原始名称, 值)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// 合并同名 Header 时的分隔符：Cookie 用 `; `，其他用 `, `
fn separator(name: &str) -> &'static str {
    if name.eq_ignore_ascii_case("cookie") {
        "; "
    } else {
        ", "
    }
}

impl PartialEq for HeaderMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in iter {
            map.append(k, v);
        }
        map
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
