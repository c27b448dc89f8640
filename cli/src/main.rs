//! Thin driver placeholder.
//!
//! Loading a roster/issue configuration from disk, scenario generation, and
//! human-facing reporting are all external collaborators. This binary only
//! demonstrates the dependency boundary onto `round_table_core_rs`: it runs
//! a tiny built-in scenario to completion and prints the ledger.

use std::collections::BTreeSet;

use round_table_core_rs::orchestrator::{AgentRosterEntry, Orchestrator, RtcConfig};
use round_table_core_rs::Issue;

fn main() {
    let roster = vec![
        AgentRosterEntry {
            uid: "A1".to_string(),
            display_name: "Agent One".to_string(),
            credential: "secret-1".to_string(),
        },
        AgentRosterEntry {
            uid: "A2".to_string(),
            display_name: "Agent Two".to_string(),
            credential: "secret-2".to_string(),
        },
    ];
    let assigned: BTreeSet<String> = roster.iter().map(|a| a.uid.clone()).collect();
    let issue = Issue::new(
        "ISSUE-1".to_string(),
        "placeholder issue".to_string(),
        String::new(),
        assigned,
        0,
    );

    let mut orch = match Orchestrator::new(RtcConfig::default(), roster, issue) {
        Ok(orch) => orch,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(2);
        }
    };

    while !orch.is_finalized() {
        if orch.tick().is_err() {
            break;
        }
    }

    for row in orch.ledger().rows() {
        println!("[{:>4}] {:<16} {}", row.seq, row.event.event_type(), row.event.payload_json());
    }
}
