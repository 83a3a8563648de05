use std::env;

/// 读取布尔型环境变量：支持 true/false/1/0（大小写不敏感）
pub fn env_is_true(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v == "1"
        }
        Err(_) => default,
    }
}

/// 读取字符串环境变量，若不存在则返回默认值
pub fn env_or_default(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) => v,
        Err(_) => default.to_string(),
    }
}

/// 读取浮点型环境变量，解析失败时返回默认值
pub fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(default)
}

/// 读取整型环境变量，解析失败时返回默认值
pub fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

/// 读取逗号分隔的字符串列表环境变量
pub fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_helpers_fall_back_to_default() {
        assert!(!env_is_true("RUST_TRADER_NOT_SET", false));
        assert_eq!(env_or_default("RUST_TRADER_NOT_SET", "abc"), "abc");
        assert_eq!(env_f64("RUST_TRADER_NOT_SET", 1.5), 1.5);
        assert_eq!(env_u64("RUST_TRADER_NOT_SET", 3), 3);
        assert_eq!(env_list("RUST_TRADER_NOT_SET", &["BTC-USDT"]), vec!["BTC-USDT"]);
    }

    #[test]
    fn test_env_list_parses_csv() {
        std::env::set_var("RUST_TRADER_TEST_LIST", "BTC-USDT, ETH-USDT ,");
        assert_eq!(
            env_list("RUST_TRADER_TEST_LIST", &[]),
            vec!["BTC-USDT", "ETH-USDT"]
        );
        std::env::remove_var("RUST_TRADER_TEST_LIST");
    }
}
