//! End-to-end gate scenarios against an in-memory revision source.

use event_schema_gate::{
    ChangeKind, Decision, GateError, MemorySource, OwnershipMap, PolicyConfig, PolicyResolver,
    Result, RevisionSource, RunAggregator, Severity,
};
use serde_json::json;

const ORDER: &str = "schemas/order_created.json";

fn order_schema(total_type: &str, required: &[&str], extra: Option<&str>) -> String {
    let mut properties = json!({
        "order_id": { "type": "string" },
        "total_amount": { "type": total_type },
        "payment_method": { "type": "string", "enum": ["card", "paypal"] }
    });
    if let Some(name) = extra {
        properties[name] = json!({ "type": "string" });
    }
    json!({ "type": "object", "properties": properties, "required": required }).to_string()
}

fn run_pair(base: String, head: String) -> event_schema_gate::RunReport {
    let source = MemorySource::new()
        .with_file("base", ORDER, base)
        .with_file("head", ORDER, head);
    let policy = PolicyResolver::default();
    let owners = OwnershipMap::default();
    RunAggregator::new(&source, &policy, &owners)
        .run_changed("base", "head", "schemas")
        .unwrap()
}

// =============================================================================
// Single-file scenarios
// =============================================================================

#[test]
fn test_type_change_fails_the_run() {
    let report = run_pair(
        order_schema("number", &["order_id"], None),
        order_schema("string", &["order_id"], None),
    );

    assert_eq!(report.reports.len(), 1);
    let changes = &report.reports[0].changes;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::TypeChanged);
    assert_eq!(changes[0].path, "total_amount");
    assert_eq!(changes[0].severity, Severity::Block);
    assert_eq!(report.summary.decision, Decision::Fail);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn test_nested_field_retype_fails_the_run() {
    let schema = |id_type: &str| {
        json!({
            "type": "object",
            "properties": {
                "customer": {
                    "type": "object",
                    "required": ["id"],
                    "properties": { "id": { "type": id_type } }
                }
            }
        })
        .to_string()
    };
    let report = run_pair(schema("string"), schema("integer"));

    let changes: Vec<_> = report.changes().collect();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::TypeChanged);
    assert_eq!(changes[0].path, "customer.id");
    assert_eq!(changes[0].severity, Severity::Block);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn test_required_dropped_warns_but_passes() {
    let report = run_pair(
        order_schema("number", &["order_id", "payment_method"], None),
        order_schema("number", &["order_id"], None),
    );

    let changes = &report.reports[0].changes;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::RequiredBecomesOptional);
    assert_eq!(changes[0].severity, Severity::Warn);
    assert_eq!(report.reports[0].summary.decision, Decision::Pass);
    assert_eq!(report.summary.label(), "WARN");
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn test_optional_field_added_passes() {
    let report = run_pair(
        order_schema("number", &["order_id"], None),
        order_schema("number", &["order_id"], Some("coupon_code")),
    );

    let changes = &report.reports[0].changes;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::FieldAdded);
    assert_eq!(changes[0].path, "coupon_code");
    assert_eq!(changes[0].severity, Severity::Pass);
    assert_eq!(report.summary.warns, 0);
    assert_eq!(report.summary.blocks, 0);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn test_file_removed_blocks() {
    let source = MemorySource::new()
        .with_file("base", ORDER, order_schema("number", &[], None))
        .with_revision("head");
    let policy = PolicyResolver::default();
    let owners = OwnershipMap::default();

    let report = RunAggregator::new(&source, &policy, &owners)
        .run_changed("base", "head", "schemas")
        .unwrap();

    let changes = &report.reports[0].changes;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::FileRemoved);
    assert_eq!(changes[0].severity, Severity::Block);
    assert_eq!(changes[0].message, "Schema file removed: schemas/order_created.json");
    assert_eq!(report.summary.decision, Decision::Fail);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn test_no_changes() {
    let schema = order_schema("number", &[], None);
    let report = run_pair(schema.clone(), schema);

    assert!(report.reports.is_empty());
    assert_eq!(report.summary.decision, Decision::Pass);
    assert_eq!(
        (report.summary.blocks, report.summary.warns, report.summary.passes),
        (0, 0, 0)
    );
}

// =============================================================================
// Multi-file runs
// =============================================================================

#[test]
fn test_invalid_file_does_not_stop_the_run() {
    let source = MemorySource::new()
        .with_file("base", "schemas/a.json", order_schema("number", &[], None))
        .with_file("head", "schemas/a.json", order_schema("number", &[], Some("note")))
        .with_file("base", "schemas/b.json", order_schema("number", &[], None))
        .with_file("head", "schemas/b.json", "{ \"type\": ")
        .with_file("head", "schemas/c.json", order_schema("number", &[], None));
    let policy = PolicyResolver::default();
    let owners = OwnershipMap::default();

    let report = RunAggregator::new(&source, &policy, &owners)
        .run_changed("base", "head", "schemas")
        .unwrap();

    let files: Vec<_> = report.reports.iter().map(|r| r.file.as_str()).collect();
    assert_eq!(files, vec!["schemas/a.json", "schemas/b.json", "schemas/c.json"]);

    let kinds: Vec<_> = report.changes().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![ChangeKind::FieldAdded, ChangeKind::InvalidJson, ChangeKind::FileAdded]
    );
    assert!(report.reports[1].changes[0].message.starts_with("Invalid JSON at head (head)"));
    assert_eq!(report.summary.blocks, 1);
    assert_eq!(report.summary.passes, 2);
    assert_eq!(report.summary.decision, Decision::Fail);
}

#[test]
fn test_reports_follow_input_order() {
    let source = MemorySource::new()
        .with_revision("base")
        .with_file("head", "schemas/z.json", "{}")
        .with_file("head", "schemas/a.json", "{}");
    let policy = PolicyResolver::default();
    let owners = OwnershipMap::default();

    let files = vec!["schemas/z.json".to_string(), "schemas/a.json".to_string()];
    let aggregator = RunAggregator::new(&source, &policy, &owners);
    let report = aggregator.run("base", "head", "schemas", &files);
    assert_eq!(report.reports[0].file, "schemas/z.json");
    assert_eq!(report.reports[1].file, "schemas/a.json");
}

#[test]
fn test_owner_override_applies_to_owned_events_only() {
    let config: PolicyConfig = serde_json::from_value(json!({
        "overridesByOwner": {
            "payments": { "REQUIRED_BECOMES_OPTIONAL": "block", "FIELD_ADDED_OPTIONAL": "pass" }
        }
    }))
    .unwrap();
    let policy = PolicyResolver::new(config);
    let owners: OwnershipMap =
        serde_json::from_value(json!({ "order_created": ["payments"] })).unwrap();

    let base = order_schema("number", &["payment_method"], None);
    let head = order_schema("number", &[], None);
    let source = MemorySource::new()
        .with_file("base", ORDER, base.clone())
        .with_file("head", ORDER, head.clone())
        .with_file("base", "schemas/refund.json", base)
        .with_file("head", "schemas/refund.json", head);

    let report = RunAggregator::new(&source, &policy, &owners)
        .run_changed("base", "head", "schemas")
        .unwrap();

    let severities: Vec<_> = report.changes().map(|c| c.severity).collect();
    // order_created is owned by payments, refund has no owner
    assert_eq!(severities, vec![Severity::Block, Severity::Warn]);
    assert_eq!(report.owners(&owners), vec!["payments".to_string()]);
}

/// Source whose listing works but every read fails
struct BrokenReads;

impl RevisionSource for BrokenReads {
    fn file_at(&self, revision: &str, _path: &str) -> Result<Option<String>> {
        Err(GateError::RevisionNotFound(revision.to_string()))
    }

    fn changed_files(&self, _base: &str, _head: &str, _dir: &str) -> Result<Vec<String>> {
        Ok(vec!["schemas/a.json".to_string(), "schemas/b.json".to_string()])
    }
}

#[test]
fn test_failed_retrievals_become_invalid_json() {
    let policy = PolicyResolver::default();
    let owners = OwnershipMap::default();

    let report = RunAggregator::new(&BrokenReads, &policy, &owners)
        .run_changed("v1", "v2", "schemas")
        .unwrap();

    assert_eq!(report.reports.len(), 2);
    for file in &report.reports {
        assert_eq!(file.changes[0].kind, ChangeKind::InvalidJson);
        assert!(file.changes[0].message.contains("at base (v1)"));
    }
    assert_eq!(report.summary.blocks, 2);
}

#[test]
fn test_listing_failure_is_an_error() {
    let source = MemorySource::new().with_revision("base");
    let policy = PolicyResolver::default();
    let owners = OwnershipMap::default();

    let aggregator = RunAggregator::new(&source, &policy, &owners);
    let result = aggregator.run_changed("base", "nope", "schemas");
    assert!(matches!(result, Err(GateError::RevisionNotFound(rev)) if rev == "nope"));
}
