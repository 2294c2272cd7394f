//! 包文件命名规则

/// 文件名最多保留的源字符数
const MAX_NAME_CHARS: usize = 40;

/// 把任意字符串清理为可用的文件名片段
///
/// 只看前 40 个字符；ASCII 字母和数字原样保留，其余每一段连续的
/// 字符合并为一个 `_`。
pub fn sanitize_file_name(text: &str) -> String {
    let mut out = String::new();
    let mut last_elided = false;
    for c in text.chars().take(MAX_NAME_CHARS) {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_elided = false;
        } else if !last_elided {
            out.push('_');
            last_elided = true;
        }
    }
    out
}

/// 包的基础文件名：`{title}_{author}_{id}`，ID 去掉 `assets_` 前缀
pub fn package_base_name(title: &str, author: &str, id: &str) -> String {
    format!(
        "{}_{}_{}",
        sanitize_file_name(title),
        sanitize_file_name(author),
        sanitize_file_name(id).replace("assets_", "")
    )
}

/// 规范化包内路径：去掉首尾空白，反斜杠转正斜杠，去掉末尾的斜杠
pub fn normalize_local_path(path: &str) -> String {
    let normalized = path.trim().replace('\\', "/");
    match normalized.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => normalized,
    }
}

/// 包路径最后一段去掉扩展名
pub(crate) fn file_stem(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_collapses_runs() {
        assert_eq!(sanitize_file_name("Cozy  Chair (v2)!"), "Cozy_Chair_v2_");
        assert_eq!(sanitize_file_name("Straße"), "Stra_e");
        assert_eq!(sanitize_file_name(""), "");
    }

    #[test]
    fn test_sanitize_truncates_to_40_chars() {
        let long = "a".repeat(60);
        assert_eq!(sanitize_file_name(&long).len(), 40);
    }

    #[test]
    fn test_package_base_name_strips_assets_prefix() {
        assert_eq!(
            package_base_name("Low Poly Tree", "Jane D.", "assets/5vbJ5vildOq"),
            "Low_Poly_Tree_Jane_D__5vbJ5vildOq"
        );
        assert_eq!(package_base_name("T", "A", "assets_abc"), "T_A_abc");
    }

    #[test]
    fn test_normalize_local_path() {
        assert_eq!(normalize_local_path("  Assets\\Foo\\Bar/  "), "Assets/Foo/Bar");
        assert_eq!(normalize_local_path("Assets/Foo"), "Assets/Foo");
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Assets/Prefabs/Chair_01.prefab"), "Chair_01");
        assert_eq!(file_stem("plain"), "plain");
    }
}
