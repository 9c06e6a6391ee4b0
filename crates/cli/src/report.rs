//! Final run report

use colored::Colorize;
use rvoip_dialer_engine::lead::{Lead, LeadState, PoolStats};
use rvoip_dialer_engine::agent::SessionReport;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct LeadRow {
    #[tabled(rename = "Phone")]
    phone: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Attempts")]
    attempts: u32,
}

#[derive(Tabled)]
struct AgentRow {
    #[tabled(rename = "Agent")]
    agent: String,
    #[tabled(rename = "Dialed")]
    dialed: u64,
    #[tabled(rename = "Connected")]
    connected: u64,
    #[tabled(rename = "Failed")]
    failed: u64,
    #[tabled(rename = "Abandoned")]
    abandoned: u64,
    #[tabled(rename = "Completed")]
    completed: u64,
}

/// Everything printed at the end of a run
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub mode: String,
    pub pool: PoolStats,
    pub agents: Vec<SessionReport>,
    pub leads: Vec<Lead>,
}

impl RunReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render(&self) -> String {
        let leads = self.leads.iter().map(|lead| LeadRow {
            phone: lead.phone.to_string(),
            state: lead.state.to_string(),
            attempts: lead.dial_attempts,
        });
        let agents = self.agents.iter().map(|report| AgentRow {
            agent: report.agent_id.to_string(),
            dialed: report.stats.dialed,
            connected: report.stats.connected,
            failed: report.stats.failed,
            abandoned: report.stats.abandoned,
            completed: report.stats.completed,
        });

        let mut out = String::new();
        out.push_str(&format!("{}\n", "Leads".bold()));
        out.push_str(&Table::new(leads).with(Style::rounded()).to_string());
        out.push_str(&format!("\n\n{}\n", "Agents".bold()));
        out.push_str(&Table::new(agents).with(Style::rounded()).to_string());
        out.push_str(&format!("\n\n{} ({} mode)\n", "Summary".bold(), self.mode));
        out.push_str(&summary_line(&self.pool));
        out
    }
}

fn summary_line(stats: &PoolStats) -> String {
    let parts = [
        (LeadState::Ended, stats.ended),
        (LeadState::Failed, stats.failed),
        (LeadState::Abandoned, stats.abandoned),
        (LeadState::Available, stats.available),
        (LeadState::Queued, stats.queued),
        (LeadState::Started, stats.started),
    ];
    let rendered: Vec<String> = parts
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(state, count)| {
            let text = format!("{} {}", count, state);
            match state {
                LeadState::Ended => text.green().to_string(),
                LeadState::Failed => text.red().to_string(),
                LeadState::Abandoned => text.yellow().to_string(),
                _ => text.normal().to_string(),
            }
        })
        .collect();
    format!("  {} leads: {}\n", stats.total, rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_nonzero_states() {
        colored::control::set_override(false);
        let stats = PoolStats {
            total: 5,
            ended: 2,
            failed: 3,
            ..Default::default()
        };
        assert_eq!(summary_line(&stats), "  5 leads: 2 ended, 3 failed\n");
    }
}
