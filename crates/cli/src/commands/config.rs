use std::env;

use skydesk_core::AppConfig;

/// Render the effective configuration with secrets redacted.
pub fn render(config: &AppConfig) -> String {
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "oracle.provider",
        &format!("{:?}", config.oracle.provider),
        "SKYDESK_ORACLE_PROVIDER",
    ));
    lines.push(render_line("oracle.model", &config.oracle.model, "SKYDESK_ORACLE_MODEL"));
    lines.push(render_line(
        "oracle.base_url",
        config.oracle.base_url.as_deref().unwrap_or("<unset>"),
        "SKYDESK_ORACLE_BASE_URL",
    ));
    let api_key = if config.oracle.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line("oracle.api_key", api_key, "SKYDESK_ORACLE_API_KEY"));
    lines.push(render_line(
        "oracle.timeout_secs",
        &config.oracle.timeout_secs.to_string(),
        "SKYDESK_ORACLE_TIMEOUT_SECS",
    ));

    lines.push(render_line(
        "runtime.max_rounds",
        &config.runtime.max_rounds.to_string(),
        "SKYDESK_RUNTIME_MAX_ROUNDS",
    ));
    lines.push(render_line(
        "runtime.tool_timeout_secs",
        &config.runtime.tool_timeout_secs.to_string(),
        "SKYDESK_RUNTIME_TOOL_TIMEOUT_SECS",
    ));

    lines.push(render_line("logging.level", &config.logging.level, "SKYDESK_LOG_LEVEL"));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        "SKYDESK_LOG_FORMAT",
    ));

    lines.join("\n")
}

fn render_line(key: &str, value: &str, env_key: &str) -> String {
    let source = if env::var_os(env_key).is_some() {
        format!("env ({env_key})")
    } else {
        "file or default".to_string()
    };
    format!("- {key} = {value} (source: {source})")
}
