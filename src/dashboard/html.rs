use std::fmt::Write;

use super::Dashboard;

const STYLE: &str = "\
  body { font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; color: #1a1a1a; }
  h1 { border-bottom: 2px solid #333; padding-bottom: 0.5rem; }
  table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
  th, td { border: 1px solid #ddd; padding: 0.5rem; text-align: left; }
  th { background: #f5f5f5; font-weight: 600; }
  .cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 1rem; margin: 1rem 0; }
  .card { background: #f5f5f5; padding: 1rem; border-radius: 4px; }
  .card .value { font-size: 1.5rem; font-weight: 700; }
  .card .label { color: #666; font-size: 0.875rem; }
  .swatch { display: inline-block; width: 0.75rem; height: 0.75rem; border-radius: 2px; margin-right: 0.5rem; }
  .status-completed { color: #10b981; }
  .status-pending { color: #f59e0b; }
  .status-rejected { color: #ef4444; }
";

pub fn render(dashboard: &Dashboard) -> anyhow::Result<String> {
    let mut html = String::new();
    let summary = &dashboard.summary;

    writeln!(html, "<!DOCTYPE html>\n<html lang=\"en\">\n<head>")?;
    writeln!(html, "<meta charset=\"UTF-8\">")?;
    writeln!(html, "<title>Consent Dashboard</title>")?;
    writeln!(html, "<style>\n{STYLE}</style>\n</head>\n<body>")?;
    writeln!(
        html,
        "<h1>Consent Dashboard</h1>\n<p>Generated: {}</p>",
        escape_html(&dashboard.generated_at)
    )?;

    writeln!(html, "<div class=\"cards\">")?;
    write_card(&mut html, "Total Requests", &summary.total_requests.to_string())?;
    write_card(&mut html, "Completed", &summary.completed.to_string())?;
    write_card(&mut html, "Pending", &summary.pending.to_string())?;
    write_card(&mut html, "Success Rate", &format!("{}%", summary.success_rate))?;
    writeln!(html, "</div>")?;

    writeln!(html, "<h2>Requests Over Time</h2>")?;
    writeln!(
        html,
        "<table>\n<thead><tr><th>Month</th><th>Completed</th><th>Pending</th><th>Rejected</th></tr></thead>\n<tbody>"
    )?;
    for m in &dashboard.requests_over_time {
        writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            m.month, m.completed, m.pending, m.rejected
        )?;
    }
    writeln!(html, "</tbody></table>")?;

    writeln!(html, "<h2>Status Distribution</h2>")?;
    writeln!(
        html,
        "<table>\n<thead><tr><th>Status</th><th>Count</th></tr></thead>\n<tbody>"
    )?;
    for s in &dashboard.status_distribution {
        writeln!(
            html,
            "<tr><td><span class=\"swatch\" style=\"background: {}\"></span>{}</td><td>{}</td></tr>",
            s.color, s.name, s.value
        )?;
    }
    writeln!(html, "</tbody></table>")?;

    writeln!(html, "<h2>Recent Requests</h2>")?;
    writeln!(
        html,
        "<table>\n<thead><tr><th>Company</th><th>Type</th><th>Description</th><th>Amount</th><th>Status</th><th>Date</th></tr></thead>\n<tbody>"
    )?;
    for r in &dashboard.recent_requests {
        writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"status-{}\">{}</td><td>{}</td></tr>",
            escape_html(r.company),
            escape_html(r.kind),
            escape_html(r.description),
            escape_html(r.amount),
            r.status,
            escape_html(r.status),
            escape_html(r.date),
        )?;
    }
    writeln!(html, "</tbody></table>")?;

    writeln!(html, "</body>\n</html>")?;
    Ok(html)
}

fn write_card(html: &mut String, label: &str, value: &str) -> std::fmt::Result {
    writeln!(
        html,
        "<div class=\"card\"><div class=\"value\">{value}</div><div class=\"label\">{label}</div></div>"
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
