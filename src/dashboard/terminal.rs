use std::fmt::Write;

use comfy_table::{Cell, Table};

use super::Dashboard;

pub fn render(dashboard: &Dashboard) -> anyhow::Result<String> {
    let mut output = String::new();
    let summary = &dashboard.summary;

    writeln!(output, "=== Consent Dashboard ({}) ===\n", dashboard.generated_at)?;

    writeln!(output, "--- Summary ---")?;
    writeln!(output, "Total requests:   {}", summary.total_requests)?;
    writeln!(output, "  Completed:      {}", summary.completed)?;
    writeln!(output, "  Pending:        {}", summary.pending)?;
    writeln!(output, "  Rejected:       {}", summary.rejected)?;
    writeln!(output, "Success rate:     {}%", summary.success_rate)?;

    writeln!(output, "\n--- Requests Over Time ---")?;
    let mut table = Table::new();
    table.set_header(vec!["Month", "Completed", "Pending", "Rejected"]);
    for m in &dashboard.requests_over_time {
        table.add_row(vec![
            Cell::new(m.month),
            Cell::new(m.completed),
            Cell::new(m.pending),
            Cell::new(m.rejected),
        ]);
    }
    writeln!(output, "{table}")?;

    writeln!(output, "\n--- Status Distribution ---")?;
    let mut table = Table::new();
    table.set_header(vec!["Status", "Count"]);
    for s in &dashboard.status_distribution {
        table.add_row(vec![Cell::new(s.name), Cell::new(s.value)]);
    }
    writeln!(output, "{table}")?;

    writeln!(output, "\n--- Recent Requests ---")?;
    let mut table = Table::new();
    table.set_header(vec!["Company", "Type", "Amount", "Status", "Date"]);
    for r in &dashboard.recent_requests {
        table.add_row(vec![
            Cell::new(r.company),
            Cell::new(r.kind),
            Cell::new(r.amount),
            Cell::new(r.status),
            Cell::new(r.date),
        ]);
    }
    writeln!(output, "{table}")?;

    Ok(output)
}
