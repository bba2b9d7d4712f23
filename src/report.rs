use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{MemberHealthScoreResult, RiskKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskSummary {
    pub kind: RiskKind,
    pub count: usize,
    pub members: Vec<String>,
}

pub fn summarize_by_risk(result: &MemberHealthScoreResult) -> Vec<RiskSummary> {
    let mut map: BTreeMap<RiskKind, Vec<String>> = BTreeMap::new();

    for item in &result.members {
        for risk in &item.risks {
            map.entry(risk.kind).or_default().push(item.name.clone());
        }
    }

    let mut summaries: Vec<RiskSummary> = map
        .into_iter()
        .map(|(kind, members)| RiskSummary {
            kind,
            count: members.len(),
            members,
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

pub fn build_report(group_label: &str, now: DateTime<Utc>, result: &MemberHealthScoreResult) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Member Health Report");
    let _ = writeln!(
        output,
        "Generated for {} as of {}",
        group_label,
        now.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);

    if !result.has_data {
        let _ = writeln!(output, "No members in this group.");
        return output;
    }

    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Members: {}", result.members.len());
    let _ = writeln!(
        output,
        "- Average score: {} ({})",
        result.average_score,
        result.average_grade().as_str()
    );
    let _ = writeln!(output, "- Members at risk: {}", result.at_risk_count);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Members (lowest score first)");
    let _ = writeln!(
        output,
        "| Member | Score | Grade | Attendance | RSVP | Board | Longevity | Recent | Risks |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
    for item in &result.members {
        let risks = if item.risks.is_empty() {
            "-".to_string()
        } else {
            item.risks
                .iter()
                .map(|risk| risk.label.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };
        let m = &item.metrics;
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            item.name,
            item.total_score,
            item.grade.as_str(),
            m.attendance,
            m.rsvp,
            m.board,
            m.longevity,
            m.recent_activity,
            risks
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Signals");
    let summaries = summarize_by_risk(result);
    if summaries.is_empty() {
        let _ = writeln!(output, "No risk signals detected.");
    } else {
        for summary in &summaries {
            let _ = writeln!(
                output,
                "- {}: {} ({})",
                summary.kind.as_str(),
                summary.count,
                summary.members.join(", ")
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        HealthGrade, HealthRisk, MemberHealthMetrics, MemberHealthScoreItem,
    };
    use chrono::TimeZone;
    use uuid::Uuid;

    fn item(name: &str, total: u32, risks: Vec<RiskKind>) -> MemberHealthScoreItem {
        MemberHealthScoreItem {
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            avatar_url: None,
            total_score: total,
            grade: HealthGrade::from_score(total),
            metrics: MemberHealthMetrics::default(),
            risks: risks
                .into_iter()
                .map(|kind| HealthRisk {
                    kind,
                    label: kind.as_str().to_string(),
                })
                .collect(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn risk_summary_orders_by_frequency() {
        let result = MemberHealthScoreResult {
            members: vec![
                item("Kiara Patel", 22, vec![RiskKind::Inactive14Days, RiskKind::RsvpNoResponse]),
                item("Jules Moreno", 41, vec![RiskKind::Inactive14Days]),
                item("Avery Lee", 88, vec![]),
            ],
            average_score: 50,
            at_risk_count: 2,
            has_data: true,
        };

        let summaries = summarize_by_risk(&result);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].kind, RiskKind::Inactive14Days);
        assert_eq!(summaries[0].members, vec!["Kiara Patel", "Jules Moreno"]);
        assert_eq!(summaries[1].count, 1);

        let report = build_report("Crew A", now(), &result);
        assert!(report.contains("- Average score: 50 (warning)"));
        assert!(report.contains("| Avery Lee | 88 | excellent |"));
        assert!(report.contains("- inactive_14days: 2 (Kiara Patel, Jules Moreno)"));
    }

    #[test]
    fn empty_group_report_is_short() {
        let report = build_report("Crew B", now(), &MemberHealthScoreResult::empty());
        assert!(report.contains("Generated for Crew B as of 2026-03-31 12:00 UTC"));
        assert!(report.contains("No members in this group."));
        assert!(!report.contains("## Summary"));
    }
}
