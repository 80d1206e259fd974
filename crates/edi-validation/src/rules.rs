//! Syntax rule validators
//!
//! Each validator scans the positions of one rule against a structure
//! instance's usage snapshot and reports every violation it finds. A rule
//! whose positions do not address the structure's children, or that names a
//! position twice, is malformed and fails with [`Error::MalformedRule`]
//! before anything is reported.

use crate::reporter::{SyntaxErrorCode, ValidationEvent, ValidationEventHandler, Violation};
use crate::usage::StructureUsage;
use crate::{Error, Result};
use edi_schema::{SyntaxRule, SyntaxRuleKind, TypeKind};
use tracing::trace;

/// Used positions of a rule, in rule order
#[derive(Debug)]
struct SyntaxStatus {
    used: Vec<usize>,
    anchor_used: bool,
}

impl SyntaxStatus {
    fn count(&self) -> usize {
        self.used.len()
    }
}

/// Fail if `rule` addresses a child the structure does not declare or
/// repeats a position
pub fn check_rule(rule: &SyntaxRule, usage: &StructureUsage) -> Result<()> {
    match rule.invalid_position(usage.declared_children()) {
        Some(position) => Err(Error::MalformedRule {
            structure: usage.code().to_string(),
            kind: rule.kind().to_string(),
            position,
            children: usage.declared_children(),
        }),
        None => Ok(()),
    }
}

fn scan(rule: &SyntaxRule, usage: &StructureUsage) -> Result<SyntaxStatus> {
    check_rule(rule, usage)?;

    let used: Vec<usize> = rule
        .positions()
        .iter()
        .copied()
        .filter(|&position| usage.is_used(position))
        .collect();
    let anchor_used = usage.is_used(rule.positions()[0]);

    Ok(SyntaxStatus { used, anchor_used })
}

fn event(usage: &StructureUsage) -> ValidationEvent {
    if usage.kind() == TypeKind::Loop {
        ValidationEvent::SegmentOccurrenceError
    } else {
        ValidationEvent::ElementOccurrenceError
    }
}

fn missing_code(usage: &StructureUsage) -> SyntaxErrorCode {
    if usage.kind() == TypeKind::Loop {
        SyntaxErrorCode::ConditionalRequiredSegmentMissing
    } else {
        SyntaxErrorCode::ConditionalRequiredDataElementMissing
    }
}

fn exclusion_code(usage: &StructureUsage) -> SyntaxErrorCode {
    if usage.kind() == TypeKind::Loop {
        SyntaxErrorCode::SegmentExclusionConditionViolated
    } else {
        SyntaxErrorCode::ExclusionConditionViolated
    }
}

fn signal_position(
    usage: &StructureUsage,
    error: SyntaxErrorCode,
    position: usize,
    handler: &mut dyn ValidationEventHandler,
) {
    let code = usage.child(position).map(|node| node.code().to_string());
    handler.element_error(Violation::new(
        event(usage),
        error,
        code,
        usage.location_of(position),
    ));
}

/// One missing-child violation per unused position in `positions`
fn signal_missing(
    usage: &StructureUsage,
    positions: &[usize],
    handler: &mut dyn ValidationEventHandler,
) {
    for &position in positions {
        if !usage.is_used(position) {
            signal_position(usage, missing_code(usage), position, handler);
        }
    }
}

/// One exclusion violation per used position after the anchor
fn signal_exclusion(
    usage: &StructureUsage,
    status: &SyntaxStatus,
    handler: &mut dyn ValidationEventHandler,
) {
    for &position in status.used.iter().skip(1) {
        signal_position(usage, exclusion_code(usage), position, handler);
    }
}

fn signal_structure(usage: &StructureUsage, handler: &mut dyn ValidationEventHandler) {
    handler.element_error(Violation::new(
        event(usage),
        missing_code(usage),
        None,
        usage.location(),
    ));
}

/// Validate one rule against a usage snapshot
pub fn validate(
    rule: &SyntaxRule,
    usage: &StructureUsage,
    handler: &mut dyn ValidationEventHandler,
) -> Result<()> {
    trace!(
        structure = usage.code(),
        kind = %rule.kind(),
        positions = ?rule.positions(),
        "validating syntax rule"
    );

    match rule.kind() {
        SyntaxRuleKind::Required => validate_required(rule, usage, handler),
        SyntaxRuleKind::Exclusion => validate_exclusion(rule, usage, handler),
        SyntaxRuleKind::Conditional => validate_conditional(rule, usage, handler),
        SyntaxRuleKind::List => validate_list(rule, usage, handler),
        SyntaxRuleKind::Paired => validate_paired(rule, usage, handler),
        SyntaxRuleKind::Single => validate_single(rule, usage, handler),
    }
}

/// At least one position must be used
pub fn validate_required(
    rule: &SyntaxRule,
    usage: &StructureUsage,
    handler: &mut dyn ValidationEventHandler,
) -> Result<()> {
    let status = scan(rule, usage)?;
    if status.count() == 0 {
        signal_structure(usage, handler);
    }
    Ok(())
}

/// At most one position may be used; every used position after the first
/// used one is reported
pub fn validate_exclusion(
    rule: &SyntaxRule,
    usage: &StructureUsage,
    handler: &mut dyn ValidationEventHandler,
) -> Result<()> {
    let status = scan(rule, usage)?;
    if status.count() > 1 {
        signal_exclusion(usage, &status, handler);
    }
    Ok(())
}

/// If the first position is used, all others are required
pub fn validate_conditional(
    rule: &SyntaxRule,
    usage: &StructureUsage,
    handler: &mut dyn ValidationEventHandler,
) -> Result<()> {
    let status = scan(rule, usage)?;
    if status.anchor_used {
        signal_missing(usage, &rule.positions()[1..], handler);
    }
    Ok(())
}

/// If the first position is used, at least one other is required
pub fn validate_list(
    rule: &SyntaxRule,
    usage: &StructureUsage,
    handler: &mut dyn ValidationEventHandler,
) -> Result<()> {
    let status = scan(rule, usage)?;
    if status.anchor_used && status.count() < 2 {
        signal_missing(usage, &rule.positions()[1..], handler);
    }
    Ok(())
}

/// All or none of the positions are used
pub fn validate_paired(
    rule: &SyntaxRule,
    usage: &StructureUsage,
    handler: &mut dyn ValidationEventHandler,
) -> Result<()> {
    let status = scan(rule, usage)?;
    if status.count() > 0 {
        signal_missing(usage, rule.positions(), handler);
    }
    Ok(())
}

/// Exactly one position is used
pub fn validate_single(
    rule: &SyntaxRule,
    usage: &StructureUsage,
    handler: &mut dyn ValidationEventHandler,
) -> Result<()> {
    let status = scan(rule, usage)?;
    match status.count() {
        0 => signal_structure(usage, handler),
        1 => {}
        _ => signal_exclusion(usage, &status, handler),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::UsageNode;

    /// Segment snapshot declaring `declared` children with the given usage
    fn segment(declared: usize, used: &[bool]) -> StructureUsage {
        used.iter()
            .enumerate()
            .fold(
                StructureUsage::new("SEG", TypeKind::Segment, declared),
                |usage, (index, &used)| {
                    usage.with_child(
                        UsageNode::new(format!("E{}", index + 1), index + 1)
                            .with_count(u32::from(used)),
                    )
                },
            )
    }

    fn run(kind: SyntaxRuleKind, positions: &[usize], usage: &StructureUsage) -> Vec<Violation> {
        let mut violations: Vec<Violation> = Vec::new();
        validate(&SyntaxRule::new(kind, positions), usage, &mut violations).unwrap();
        violations
    }

    #[test]
    fn test_exclusion_all_used() {
        let usage = segment(4, &[true, false, true, true]);
        let violations = run(SyntaxRuleKind::Exclusion, &[1, 3, 4], &usage);

        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| {
            v.event == ValidationEvent::ElementOccurrenceError
                && v.error == SyntaxErrorCode::ExclusionConditionViolated
        }));
        assert_eq!(violations[0].code.as_deref(), Some("E3"));
        assert_eq!(violations[1].code.as_deref(), Some("E4"));
        assert_eq!(violations[1].element, Some(4));
    }

    #[test]
    fn test_exclusion_non_anchor_used() {
        let usage = segment(4, &[false, false, true]);
        assert!(run(SyntaxRuleKind::Exclusion, &[1, 3, 4], &usage).is_empty());
    }

    #[test]
    fn test_exclusion_none_used() {
        let usage = segment(4, &[false, false, false]);
        assert!(run(SyntaxRuleKind::Exclusion, &[1, 3, 4], &usage).is_empty());
    }

    #[test]
    fn test_exclusion_anchor_follows_rule_order() {
        // positions declared out of child order: 4 is the anchor
        let usage = segment(4, &[true, false, false, true]);
        let violations = run(SyntaxRuleKind::Exclusion, &[4, 1], &usage);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code.as_deref(), Some("E1"));
    }

    #[test]
    fn test_required() {
        let none = segment(3, &[false, false, false]);
        let violations = run(SyntaxRuleKind::Required, &[1, 2, 3], &none);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, None);
        assert_eq!(
            violations[0].error,
            SyntaxErrorCode::ConditionalRequiredDataElementMissing
        );

        let one = segment(3, &[false, true, false]);
        assert!(run(SyntaxRuleKind::Required, &[1, 2, 3], &one).is_empty());
    }

    #[test]
    fn test_conditional() {
        let trigger_only = segment(3, &[true, false, false]);
        let violations = run(SyntaxRuleKind::Conditional, &[1, 2, 3], &trigger_only);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].element, Some(2));
        assert_eq!(violations[1].element, Some(3));

        let partial = segment(3, &[true, false, true]);
        assert_eq!(run(SyntaxRuleKind::Conditional, &[1, 2, 3], &partial).len(), 1);

        let no_trigger = segment(3, &[false, true, false]);
        assert!(run(SyntaxRuleKind::Conditional, &[1, 2, 3], &no_trigger).is_empty());
    }

    #[test]
    fn test_paired() {
        let one_of_three = segment(3, &[false, true, false]);
        let violations = run(SyntaxRuleKind::Paired, &[1, 2, 3], &one_of_three);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].code.as_deref(), Some("E1"));
        assert_eq!(violations[1].code.as_deref(), Some("E3"));

        let all = segment(3, &[true, true, true]);
        assert!(run(SyntaxRuleKind::Paired, &[1, 2, 3], &all).is_empty());

        let none = segment(3, &[false, false, false]);
        assert!(run(SyntaxRuleKind::Paired, &[1, 2, 3], &none).is_empty());
    }

    #[test]
    fn test_list_differs_from_paired() {
        // first used plus one other: a list is satisfied, a pair is not
        let usage = segment(3, &[true, true, false]);
        assert!(run(SyntaxRuleKind::List, &[1, 2, 3], &usage).is_empty());
        assert_eq!(run(SyntaxRuleKind::Paired, &[1, 2, 3], &usage).len(), 1);

        // a non-first position alone does not trigger a list
        let usage = segment(3, &[false, true, false]);
        assert!(run(SyntaxRuleKind::List, &[1, 2, 3], &usage).is_empty());

        let trigger_only = segment(3, &[true, false, false]);
        assert_eq!(run(SyntaxRuleKind::List, &[1, 2, 3], &trigger_only).len(), 2);
    }

    #[test]
    fn test_single() {
        let none = segment(3, &[false, false, false]);
        let violations = run(SyntaxRuleKind::Single, &[1, 2, 3], &none);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, None);

        let one = segment(3, &[false, false, true]);
        assert!(run(SyntaxRuleKind::Single, &[1, 2, 3], &one).is_empty());

        let three = segment(3, &[true, true, true]);
        let violations = run(SyntaxRuleKind::Single, &[1, 2, 3], &three);
        assert_eq!(violations.len(), 2);
        assert!(violations
            .iter()
            .all(|v| v.error == SyntaxErrorCode::ExclusionConditionViolated));
    }

    #[test]
    fn test_loop_rules_report_segment_codes() {
        let usage = StructureUsage::new("SG2", TypeKind::Loop, 2)
            .with_child(UsageNode::new("NAD", 1).with_count(2))
            .with_child(UsageNode::new("LOC", 2).with_count(1));

        let violations = run(SyntaxRuleKind::Exclusion, &[1, 2], &usage);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].event, ValidationEvent::SegmentOccurrenceError);
        assert_eq!(
            violations[0].error,
            SyntaxErrorCode::SegmentExclusionConditionViolated
        );
        assert_eq!(violations[0].element, None);
    }

    #[test]
    fn test_composite_coordinates() {
        let usage = StructureUsage::new("C507", TypeKind::Composite, 3)
            .within_element(2, Some(1))
            .with_child(UsageNode::new("2005", 1).with_count(1))
            .with_child(UsageNode::new("2380", 2))
            .with_child(UsageNode::new("2379", 3));

        let violations = run(SyntaxRuleKind::Conditional, &[1, 3], &usage);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code.as_deref(), Some("2379"));
        assert_eq!(violations[0].element, Some(2));
        assert_eq!(violations[0].component, Some(3));
        assert_eq!(violations[0].repetition, Some(1));
    }

    #[test]
    fn test_malformed_rule_is_an_error() {
        let usage = segment(3, &[true, true, true]);
        let mut violations: Vec<Violation> = Vec::new();

        let result = validate(
            &SyntaxRule::new(SyntaxRuleKind::Exclusion, vec![1, 5]),
            &usage,
            &mut violations,
        );
        match result {
            Err(Error::MalformedRule {
                structure,
                position,
                children,
                ..
            }) => {
                assert_eq!(structure, "SEG");
                assert_eq!(position, 5);
                assert_eq!(children, 3);
            }
            other => panic!("Expected MalformedRule, got {:?}", other),
        }
        assert!(violations.is_empty());

        let zero = validate(
            &SyntaxRule::new(SyntaxRuleKind::Required, vec![0]),
            &usage,
            &mut violations,
        );
        assert!(matches!(zero, Err(Error::MalformedRule { position: 0, .. })));
    }

    #[test]
    fn test_repeated_position_is_an_error() {
        // without the check the anchor would be reported against itself
        let usage = segment(3, &[false, true, false]);
        let mut violations: Vec<Violation> = Vec::new();

        let result = validate(
            &SyntaxRule::new(SyntaxRuleKind::Exclusion, vec![2, 2]),
            &usage,
            &mut violations,
        );
        match result {
            Err(Error::MalformedRule { position, children, .. }) => {
                assert_eq!(position, 2);
                assert_eq!(children, 3);
            }
            other => panic!("Expected MalformedRule, got {:?}", other),
        }
        assert!(violations.is_empty());
    }
}
