use rns_core::{full_name, DeploymentManifest};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::auction::{AuctionReport, AuctionStatus};
use crate::registrar::RegistrationReport;
use crate::suite::display_name;

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub manifest: DeploymentManifest,
    pub auction: AuctionReport,
    pub registrations: RegistrationReport,
}

impl RunReport {
    pub fn auction_status(&self) -> AuctionStatus {
        self.auction.status()
    }

    /// Table of deployed modules in deployment order.
    pub fn render_manifest(&self) -> String {
        let rule = format!("|{}|{}|\n", "=".repeat(28), "=".repeat(44));
        let mut out = String::new();
        out.push_str(&rule);
        let _ = writeln!(out, "| {:<26} | {:<42} |", "Contract", "Address");
        out.push_str(&rule);
        for record in self.manifest.records() {
            let _ = writeln!(
                out,
                "| {:<26} | {:<42} |",
                display_name(&record.module),
                record.address.to_string()
            );
        }
        out.push_str(&rule);
        out
    }

    /// One line per name with how it ended up.
    pub fn render_names(&self) -> String {
        let mut out = String::new();
        for entry in &self.registrations.entries {
            match (&entry.error, entry.owner) {
                (None, Some(owner)) => {
                    let _ = write!(out, "{} ({}) owned by {}", full_name(&entry.name), entry.kind.as_str(), owner);
                    if let Some(addr) = entry.addr {
                        let _ = write!(out, ", resolves to {}", addr);
                    }
                    out.push('\n');
                }
                (Some(error), _) => {
                    let _ = writeln!(out, "{} ({}) failed: {}", full_name(&entry.name), entry.kind.as_str(), error);
                }
                (None, None) => {
                    let _ = writeln!(out, "{} ({}) not registered", full_name(&entry.name), entry.kind.as_str());
                }
            }
        }

        match self.auction.status() {
            AuctionStatus::NotAttempted => out.push_str("auction: not attempted\n"),
            status => {
                let verdict = if status == AuctionStatus::Succeeded {
                    "succeeded"
                } else {
                    "failed"
                };
                let _ = writeln!(out, "auction: {}", verdict);
                for label in &self.auction.labels {
                    let _ = write!(out, "{} reached {}", label.full_name(), label.phase);
                    if let Some(owner) = label.owner {
                        let _ = write!(out, ", owned by {}", owner);
                    }
                    if let Some(error) = &label.last_error {
                        let _ = write!(out, " ({})", error);
                    }
                    out.push('\n');
                }
                if let Some(error) = &self.auction.error {
                    let _ = writeln!(out, "auction stopped: {}", error);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrar::RegistrationEntry;
    use rns_core::{Address, DeploymentRecord, RegistrationKind, B256};

    fn report() -> RunReport {
        let mut manifest = DeploymentManifest::new();
        manifest
            .insert(DeploymentRecord::new("RNS", Address::repeat_byte(1), B256::ZERO))
            .unwrap();
        manifest
            .insert(DeploymentRecord::new("TokenRegistrar", Address::repeat_byte(2), B256::ZERO))
            .unwrap();
        RunReport {
            manifest,
            auction: AuctionReport::not_attempted(),
            registrations: RegistrationReport {
                entries: vec![RegistrationEntry {
                    name: "alice".to_string(),
                    kind: RegistrationKind::Direct,
                    owner: Some(Address::repeat_byte(5)),
                    addr: None,
                    error: None,
                }],
            },
        }
    }

    #[test]
    fn test_manifest_table_uses_titles_in_order() {
        let table = report().render_manifest();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[3].starts_with("| RNS registry               | 0x"));
        assert!(lines[4].contains("Auction registrar (legacy)"));
        assert!(lines.iter().all(|l| l.len() == lines[0].len()));
    }

    #[test]
    fn test_names_summary() {
        let summary = report().render_names();
        assert!(summary.contains("alice.rsk (direct) owned by"));
        assert!(summary.contains("auction: not attempted"));
    }
}
