use std::path::Path;

use crate::dashboard::Dashboard;

pub fn show_dashboard(format: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let dashboard = Dashboard::build();
    let rendered = dashboard.render(super::parse_dashboard_format(format)?)?;

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            println!("Dashboard written to {}", path.display());
        }
        None => {
            println!("{rendered}");
        }
    }

    Ok(())
}
