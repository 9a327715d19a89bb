//! Money-muling detection example
//!
//! This example builds a small ledger containing a laundering ring, a
//! distribution hub, a shell chain and a smurfing burst, then prints the
//! report the review dashboard consumes.

use rust_mule_detector::{MuleDetector, Transaction};

fn main() {
    println!("=== Money-Muling Detector ===\n");

    let detector = MuleDetector::new();
    let mut ledger = Vec::new();

    // Example 1: circular routing A -> B -> C -> A
    println!("1. Circular fund routing");
    ledger.push(Transaction::new("TXN-001", "ACC-A", "ACC-B", 9_500.0, "2024-11-01 09:00:00"));
    ledger.push(Transaction::new("TXN-002", "ACC-B", "ACC-C", 9_400.0, "2024-11-02 09:00:00"));
    ledger.push(Transaction::new("TXN-003", "ACC-C", "ACC-A", 9_300.0, "2024-11-03 09:00:00"));

    // Example 2: one account paying out to many mules
    println!("2. Fan-out distribution hub");
    for i in 0..12 {
        ledger.push(Transaction::new(
            &format!("TXN-1{:02}", i),
            "ACC-HUB",
            &format!("ACC-MULE-{:02}", i),
            800.0,
            &format!("2024-11-{:02} 14:00:00", i * 2 + 1),
        ));
    }

    // Example 3: layering through two thin shell accounts
    println!("3. Shell layering chain");
    ledger.push(Transaction::new("TXN-201", "ACC-ORIGIN", "ACC-SHELL-1", 25_000.0, "2024-11-05 10:00:00"));
    ledger.push(Transaction::new("TXN-202", "ACC-SHELL-1", "ACC-SHELL-2", 24_900.0, "2024-11-12 10:00:00"));
    ledger.push(Transaction::new("TXN-203", "ACC-SHELL-2", "ACC-EXIT", 24_800.0, "2024-11-19 10:00:00"));

    // Example 4: smurfing burst into one account
    println!("4. High-velocity deposits");
    for i in 0..7 {
        ledger.push(Transaction::new(
            &format!("TXN-3{:02}", i),
            &format!("ACC-SMURF-{}", i),
            "ACC-COLLECTOR",
            4_900.0,
            &format!("2024-11-20 {:02}:30:00", i + 8),
        ));
    }
    println!();

    let report = detector.analyze(&ledger);

    println!("Summary");
    println!("   Accounts analyzed: {}", report.summary.total_accounts_analyzed);
    println!("   Accounts flagged:  {}", report.summary.suspicious_accounts_flagged);
    println!("   Rings detected:    {}", report.summary.fraud_rings_detected);
    println!();

    println!("Fraud rings");
    for ring in &report.fraud_rings {
        println!(
            "   {} [{}] risk {:.1} ({}): {}",
            ring.ring_id,
            ring.pattern_type,
            ring.risk_score,
            ring.risk_level(),
            ring.member_accounts.join(" -> ")
        );
    }
    println!();

    println!("Suspicious accounts");
    for account in &report.suspicious_accounts {
        println!(
            "   {:<16} {:>5.1} {:<8} {:?} ring={}",
            account.account_id,
            account.suspicion_score,
            account.risk_level().to_string(),
            account.detected_patterns,
            account.ring_id.as_deref().unwrap_or("-")
        );
    }
    println!();

    match report.to_json() {
        Ok(json) => println!("JSON report:\n{}", json),
        Err(e) => eprintln!("Failed to serialize report: {}", e),
    }
}
