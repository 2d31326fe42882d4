//! 현재 설정 출력 명령어.

use anyhow::Result;
use nge_core::AppConfig;

/// 병합된 설정을 들여쓰기한 JSON으로 변환합니다.
pub fn render_config(config: &AppConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_config() {
        let rendered = render_config(&AppConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["endpoint"]["host"], "trade");
        assert_eq!(value["endpoint"]["port"], 80);
        assert_eq!(value["pipeline"]["max_inflight_per_client"], 5);
    }
}
