//! 配置校验模块
//!
//! 校验规则：
//! - `sinks` 存在时必须是 name → object 的对象
//! - `relay` 存在时可反序列化且通过范围检查
//!
//! 缺少 `type` 的 sink 不在此处拒绝，dispatcher 初始化时会跳过。
//! [`sink_warnings`] 为 `validate` 命令报告这些条目。

use serde_json::Value;
use validator::ValidationErrors;

use contracts::ContractError;

use crate::config::{RelayConfig, RELAY_KEY, SINKS_KEY};

/// 校验已加载的配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
    validate_sinks(config)?;
    validate_relay(config)?;
    Ok(())
}

/// 单个 sink 条目的非致命问题
pub fn sink_warnings(config: &RelayConfig) -> Vec<String> {
    let Some(Value::Object(sinks)) = config.get(SINKS_KEY) else {
        return Vec::new();
    };
    sinks
        .iter()
        .filter_map(|(name, blob)| match blob.get("type") {
            Some(Value::String(t)) if !t.is_empty() => None,
            Some(_) => Some(format!("sink '{name}': 'type' must be a non-empty string")),
            None => Some(format!("sink '{name}': missing 'type'")),
        })
        .collect()
}

/// 将 validator 错误合并为一个 `ConfigValidation` 错误
pub(crate) fn validation_error(section: &str, errors: &ValidationErrors) -> ContractError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let field = fields
        .first()
        .map(|(name, _)| format!("{section}.{name}"))
        .unwrap_or_else(|| section.to_string());
    let message = fields
        .iter()
        .flat_map(|(name, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => format!("{name}: {msg}"),
                None => format!("{name}: {}", e.code),
            })
        })
        .collect::<Vec<_>>()
        .join("; ");
    ContractError::config_validation(field, message)
}

fn validate_sinks(config: &RelayConfig) -> Result<(), ContractError> {
    let Some(sinks) = config.get(SINKS_KEY) else {
        return Ok(());
    };
    let Value::Object(entries) = sinks else {
        return Err(ContractError::config_validation(
            SINKS_KEY,
            "must be an object of name -> sink config",
        ));
    };
    for (name, blob) in entries {
        if name.is_empty() {
            return Err(ContractError::config_validation(
                SINKS_KEY,
                "sink name cannot be empty",
            ));
        }
        if !blob.is_object() {
            return Err(ContractError::config_validation(
                format!("{SINKS_KEY}.{name}"),
                "sink config must be an object",
            ));
        }
    }
    Ok(())
}

fn validate_relay(config: &RelayConfig) -> Result<(), ContractError> {
    if config.get(RELAY_KEY).is_some() {
        config.relay_settings()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> RelayConfig {
        match value {
            Value::Object(keys) => RelayConfig::new(keys),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_valid_config() {
        let cfg = config(json!({
            "sinks": {"console": {"type": "stdout"}},
            "relay": {"queue_capacity": 32},
        }));
        assert!(validate(&cfg).is_ok());
        assert!(sink_warnings(&cfg).is_empty());
        assert!(validate(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn test_sink_entry_must_be_object() {
        let cfg = config(json!({"sinks": {"console": "stdout"}}));
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("sinks.console"));
    }

    #[test]
    fn test_empty_sink_name() {
        let cfg = config(json!({"sinks": {"": {"type": "stdout"}}}));
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_relay_range_checked() {
        let cfg = config(json!({"relay": {"queue_capacity": 0}}));
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));
    }

    #[test]
    fn test_sink_warnings() {
        let cfg = config(json!({"sinks": {
            "a": {"type": "stdout"},
            "b": {},
            "c": {"type": 5},
        }}));
        let warnings = sink_warnings(&cfg);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("'b'"));
        assert!(warnings[1].contains("'c'"));
    }
}
