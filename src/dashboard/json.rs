use super::Dashboard;

pub fn render(dashboard: &Dashboard) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(dashboard)?)
}
