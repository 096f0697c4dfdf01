pub mod html;
pub mod json;
pub mod terminal;

use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardFormat {
    Terminal,
    Json,
    Html,
}

impl FromStr for DashboardFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "terminal" => Ok(Self::Terminal),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown dashboard format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyCounts {
    pub month: &'static str,
    pub completed: u32,
    pub pending: u32,
    pub rejected: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSlice {
    pub name: &'static str,
    pub value: u32,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentRequest {
    pub id: u32,
    pub company: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub amount: &'static str,
    pub status: &'static str,
    pub date: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_requests: u32,
    pub completed: u32,
    pub pending: u32,
    pub rejected: u32,
    /// Rounded percentage of completed over total.
    pub success_rate: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub generated_at: String,
    pub summary: DashboardSummary,
    pub requests_over_time: Vec<MonthlyCounts>,
    pub status_distribution: Vec<StatusSlice>,
    pub recent_requests: Vec<RecentRequest>,
}

const REQUESTS_OVER_TIME: [(&str, u32, u32, u32); 6] = [
    ("Jan", 12, 3, 2),
    ("Feb", 15, 5, 1),
    ("Mar", 18, 4, 3),
    ("Apr", 22, 6, 2),
    ("May", 25, 8, 4),
    ("Jun", 28, 5, 2),
];

const STATUS_DISTRIBUTION: [StatusSlice; 3] = [
    StatusSlice {
        name: "Completed",
        value: 120,
        color: "#10b981",
    },
    StatusSlice {
        name: "Pending",
        value: 31,
        color: "#f59e0b",
    },
    StatusSlice {
        name: "Rejected",
        value: 14,
        color: "#ef4444",
    },
];

const RECENT_REQUESTS: [RecentRequest; 5] = [
    RecentRequest {
        id: 1,
        company: "PayPal",
        kind: "Payment Authorization",
        amount: "$1,250.00",
        status: "completed",
        date: "2024-01-15",
        description: "Monthly subscription payment",
    },
    RecentRequest {
        id: 2,
        company: "Amazon",
        kind: "Data Access",
        amount: "-",
        status: "pending",
        date: "2024-01-14",
        description: "Transaction history access",
    },
    RecentRequest {
        id: 3,
        company: "Credit Karma",
        kind: "Credit Check",
        amount: "-",
        status: "completed",
        date: "2024-01-13",
        description: "Credit score monitoring",
    },
    RecentRequest {
        id: 4,
        company: "Stripe",
        kind: "Payment Authorization",
        amount: "$89.99",
        status: "rejected",
        date: "2024-01-12",
        description: "Suspicious transaction flagged",
    },
    RecentRequest {
        id: 5,
        company: "Plaid",
        kind: "Account Linking",
        amount: "-",
        status: "completed",
        date: "2024-01-11",
        description: "Bank account verification",
    },
];

impl Dashboard {
    pub fn build() -> Self {
        let status_distribution = STATUS_DISTRIBUTION.to_vec();
        let slice = |name: &str| {
            status_distribution
                .iter()
                .find(|s| s.name == name)
                .map_or(0, |s| s.value)
        };
        let completed = slice("Completed");
        let pending = slice("Pending");
        let rejected = slice("Rejected");
        let total_requests = completed + pending + rejected;

        let summary = DashboardSummary {
            total_requests,
            completed,
            pending,
            rejected,
            success_rate: success_rate(completed, total_requests),
        };

        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            summary,
            requests_over_time: REQUESTS_OVER_TIME
                .iter()
                .map(|&(month, completed, pending, rejected)| MonthlyCounts {
                    month,
                    completed,
                    pending,
                    rejected,
                })
                .collect(),
            status_distribution,
            recent_requests: RECENT_REQUESTS.to_vec(),
        }
    }

    pub fn render(&self, format: DashboardFormat) -> anyhow::Result<String> {
        match format {
            DashboardFormat::Terminal => terminal::render(self),
            DashboardFormat::Json => json::render(self),
            DashboardFormat::Html => html::render(self),
        }
    }
}

fn success_rate(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (f64::from(completed) * 100.0 / f64::from(total)).round() as u32
}
