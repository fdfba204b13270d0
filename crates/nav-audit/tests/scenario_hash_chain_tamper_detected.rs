//! Audit hash chain integrity.
//!
//! GREEN when:
//! - a chained log of typed records verifies,
//! - editing one line's payload breaks the chain at that line,
//! - resuming a log continues the chain across writer instances.

use chrono::{NaiveDate, TimeZone, Utc};
use nav_audit::{verify_hash_chain, AuditRecord, AuditWriter, VerifyResult};
use nav_schemas::{CorrectionReason, EventCorrection};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn records() -> Vec<AuditRecord> {
    let d = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
    vec![
        AuditRecord::Correction(EventCorrection {
            external_id: "CT-77".to_string(),
            field: "cash_impact_local".to_string(),
            old_value: None,
            new_value: Some("2500.00".to_string()),
            reason: CorrectionReason::LateAmount,
            recorded_at: Utc.with_ymd_and_hms(2024, 6, 13, 6, 0, 0).unwrap(),
        }),
        AuditRecord::LiveSuperseded {
            external_id: "LIVE-1".to_string(),
            period_start: d,
            period_end: d,
        },
        AuditRecord::ImportApplied {
            period_key: "MTD:2024-06".to_string(),
            report_digest: "ab".repeat(32),
            inserted: 12,
            updated: 1,
            unchanged: 40,
        },
        AuditRecord::DriftEscalated {
            date: d,
            drift: dec!(131.02),
            threshold: dec!(50.00),
            unexplained: dec!(131.02),
        },
        AuditRecord::FetchFailed {
            period_key: "DAY:2024-06-12".to_string(),
            retryable: true,
            message: "poll budget exhausted".to_string(),
        },
    ]
}

#[test]
fn untampered_chain_verifies_valid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit/nav.jsonl");
    let run_id = Uuid::new_v4();

    let mut writer = AuditWriter::new(&path, true).unwrap();
    for r in records() {
        writer.append_record(run_id, &r).unwrap();
    }

    assert_eq!(verify_hash_chain(&path).unwrap(), VerifyResult::Valid { lines: 5 });
}

#[test]
fn tampered_payload_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nav.jsonl");
    let run_id = Uuid::new_v4();

    let mut writer = AuditWriter::new(&path, true).unwrap();
    for r in records() {
        writer.append_record(run_id, &r).unwrap();
    }

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    assert_eq!(lines.len(), 5);
    lines[3] = lines[3].replace("131.02", "31.02");
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();

    match verify_hash_chain(&path).unwrap() {
        VerifyResult::Broken { line, reason } => {
            assert_eq!(line, 4);
            assert!(reason.contains("hash_self mismatch"), "{reason}");
        }
        other => panic!("expected broken chain, got {other:?}"),
    }
}

#[test]
fn deleted_line_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nav.jsonl");
    let mut writer = AuditWriter::new(&path, true).unwrap();
    for r in records() {
        writer.append_record(Uuid::new_v4(), &r).unwrap();
    }

    let content = std::fs::read_to_string(&path).unwrap();
    let kept: Vec<&str> = content.lines().enumerate().filter(|(i, _)| *i != 1).map(|(_, l)| l).collect();
    std::fs::write(&path, kept.join("\n")).unwrap();

    match verify_hash_chain(&path).unwrap() {
        VerifyResult::Broken { line, reason } => {
            assert_eq!(line, 2);
            assert!(reason.contains("hash_prev mismatch"));
        }
        other => panic!("expected broken chain, got {other:?}"),
    }
}

#[test]
fn resumed_writer_continues_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nav.jsonl");
    let recs = records();

    {
        let mut day1 = AuditWriter::new(&path, true).unwrap();
        day1.append_record(Uuid::new_v4(), &recs[0]).unwrap();
        day1.append_record(Uuid::new_v4(), &recs[1]).unwrap();
    }
    {
        let mut day2 = AuditWriter::resume(&path, true).unwrap();
        assert_eq!(day2.seq(), 2);
        assert!(day2.last_hash().is_some());
        day2.append_record(Uuid::new_v4(), &recs[2]).unwrap();
    }

    assert_eq!(verify_hash_chain(&path).unwrap(), VerifyResult::Valid { lines: 3 });
}
