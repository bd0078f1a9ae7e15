use crate::parser::types::{DuplicateName, ParseWarning, Request};
use std::collections::HashMap;

/// 按有效名称分组，只返回成员数大于 1 的组，组顺序与组内顺序均为源文件顺序
pub fn find_duplicates(requests: &[Request]) -> Vec<Vec<DuplicateName>> {
    let mut groups: Vec<Vec<DuplicateName>> = Vec::new();
    let mut by_name: HashMap<&str, usize> = HashMap::new();

    for (index, request) in requests.iter().enumerate() {
        let Some(name) = request.effective_name() else {
            continue;
        };
        let entry = DuplicateName {
            name: name.to_string(),
            method: request.method.clone(),
            url: request.url.clone(),
            index,
        };
        match by_name.get(name) {
            Some(&group) => groups[group].push(entry),
            None => {
                by_name.insert(name, groups.len());
                groups.push(vec![entry]);
            }
        }
    }

    groups.retain(|group| group.len() > 1);
    groups
}

/// 为每组重复名称生成一条警告，挂在第一个成员所在的块上
///
/// `block_indices[i]` 是 `requests[i]` 所在的块序号。
pub fn duplicate_warnings(requests: &[Request], block_indices: &[usize]) -> Vec<ParseWarning> {
    find_duplicates(requests)
        .into_iter()
        .map(|group| {
            let first = &group[0];
            let members = group
                .iter()
                .map(|d| format!("#{} {} {}", d.index + 1, d.method, d.url))
                .collect::<Vec<_>>()
                .join(", ");
            tracing::debug!(name = %first.name, count = group.len(), "duplicate request name");
            let block = block_indices.get(first.index).copied().unwrap_or(first.index);
            ParseWarning::new(
                block,
                format!(
                    "duplicate @name '{}' used by {} requests: {}",
                    first.name,
                    group.len(),
                    members
                ),
            )
        })
        .collect()
}
