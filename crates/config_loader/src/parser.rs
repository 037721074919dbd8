//! 配置解析模块
//!
//! 支持 JSON 和 TOML 格式，统一解析为 `serde_json::Value`，
//! sink 配置以同一种表示交给 dispatcher。

use std::path::Path;

use contracts::ContractError;
use serde_json::{Map, Value};
use tracing::debug;

/// 引用外部文件的键后缀
pub const INCLUDE_SUFFIX: &str = "-file";

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON 格式
    Json,
    /// TOML 格式
    Toml,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    /// 从路径扩展名推断格式
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse(format!(
                "cannot determine format of '{}' from its extension",
                path.display()
            ))
        })?;

        Self::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<Value, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<Value, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<Value, ContractError> {
    match format {
        ConfigFormat::Json => parse_json(content),
        ConfigFormat::Toml => parse_toml(content),
    }
}

/// 拆分顶层对象，内联 `<key>-file` 引用
///
/// 只有恰好含一个 `-` 且以 `-file` 结尾的键才算引用，值必须是路径字符串，
/// 相对 `base_dir` 解析。文件内容存放在 `<key>` 下，不递归展开。
pub fn resolve_includes(root: Value, base_dir: &Path) -> Result<Map<String, Value>, ContractError> {
    let Value::Object(entries) = root else {
        return Err(ContractError::config_validation(
            "<root>",
            "configuration must be an object",
        ));
    };

    let mut keys = Map::new();
    for (key, value) in entries {
        match include_target(&key) {
            Some(target) => {
                let file = value.as_str().ok_or_else(|| {
                    ContractError::config_validation(&key, "include value must be a file path")
                })?;
                let path = base_dir.join(file);
                let format = ConfigFormat::from_path(&path)?;
                let content = std::fs::read_to_string(&path).map_err(|e| ContractError::ConfigParse {
                    message: format!("cannot read '{}' for '{key}': {e}", path.display()),
                    source: Some(Box::new(e)),
                })?;
                debug!(key = target, path = %path.display(), "Inlined config include");
                keys.insert(target.to_string(), parse(&content, format)?);
            }
            None => {
                keys.insert(key, value);
            }
        }
    }
    Ok(keys)
}

fn include_target(key: &str) -> Option<&str> {
    let target = key.strip_suffix(INCLUDE_SUFFIX)?;
    (!target.is_empty() && !target.contains('-')).then_some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_parse_toml_into_json_tree() {
        let content = r#"
[relay]
max_forward = 10

[sinks.console]
type = "stdout"
format = "json"
"#;
        let value = parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(value["relay"]["max_forward"], 10);
        assert_eq!(value["sinks"]["console"]["type"], "stdout");
    }

    #[test]
    fn test_parse_errors_keep_source() {
        let err = parse("{not json", ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { source: Some(_), .. }));

        let err = parse("= nope", ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("TOML"));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_extension("JSON"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
        assert!(ConfigFormat::from_path(Path::new("relay")).is_err());
        assert!(ConfigFormat::from_path(Path::new("relay.yaml")).is_err());
    }

    #[test]
    fn test_include_target() {
        assert_eq!(include_target("sinks-file"), Some("sinks"));
        assert_eq!(include_target("sink-config-file"), None);
        assert_eq!(include_target("-file"), None);
        assert_eq!(include_target("sinks"), None);
    }

    #[test]
    fn test_resolve_includes() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("sinks.json"),
            r#"{"console": {"type": "stdout"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("relay.toml"), "max_forward = 5\n").unwrap();

        let root = json!({
            "sinks-file": "sinks.json",
            "relay-file": "relay.toml",
            "sink-extra-file": "ignored.json",
        });
        let keys = resolve_includes(root, dir.path()).unwrap();

        assert_eq!(keys["sinks"]["console"]["type"], "stdout");
        assert_eq!(keys["relay"]["max_forward"], 5);
        assert_eq!(keys["sink-extra-file"], "ignored.json");
        assert!(!keys.contains_key("sinks-file"));
    }

    #[test]
    fn test_resolve_includes_errors() {
        let dir = tempdir().unwrap();

        let err = resolve_includes(json!({"sinks-file": 3}), dir.path()).unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));

        let err = resolve_includes(json!({"sinks-file": "missing.json"}), dir.path()).unwrap_err();
        assert!(err.to_string().contains("missing.json"));

        let err = resolve_includes(json!([1]), dir.path()).unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
    }
}
