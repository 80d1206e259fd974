//! Violation reporting
//!
//! Rule violations are data, not errors: validators hand each one to a
//! [`ValidationEventHandler`] and carry on.

use crate::usage::Location;
use std::collections::HashMap;
use std::fmt;

/// Kind of validation event being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationEvent {
    /// A child of a segment or composite is missing or not allowed
    ElementOccurrenceError,
    /// A child of a loop is missing or not allowed
    SegmentOccurrenceError,
}

/// Specific validation error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxErrorCode {
    ExclusionConditionViolated,
    ConditionalRequiredDataElementMissing,
    SegmentExclusionConditionViolated,
    ConditionalRequiredSegmentMissing,
    RequiredDataElementMissing,
    TooManyRepetitions,
    MandatorySegmentMissing,
    SegmentExceedsMaximumUse,
}

impl fmt::Display for SyntaxErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::ExclusionConditionViolated => "EXCLUSION_CONDITION_VIOLATED",
            Self::ConditionalRequiredDataElementMissing => {
                "CONDITIONAL_REQUIRED_DATA_ELEMENT_MISSING"
            }
            Self::SegmentExclusionConditionViolated => "SEGMENT_EXCLUSION_CONDITION_VIOLATED",
            Self::ConditionalRequiredSegmentMissing => "CONDITIONAL_REQUIRED_SEGMENT_MISSING",
            Self::RequiredDataElementMissing => "REQUIRED_DATA_ELEMENT_MISSING",
            Self::TooManyRepetitions => "TOO_MANY_REPETITIONS",
            Self::MandatorySegmentMissing => "MANDATORY_SEGMENT_MISSING",
            Self::SegmentExceedsMaximumUse => "SEGMENT_EXCEEDS_MAXIMUM_USE",
        };
        f.write_str(code)
    }
}

/// A single reported violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub event: ValidationEvent,
    pub error: SyntaxErrorCode,
    /// Offending child; `None` for structure-level violations
    pub code: Option<String>,
    pub element: Option<usize>,
    pub component: Option<usize>,
    pub repetition: Option<usize>,
}

impl Violation {
    pub fn new(
        event: ValidationEvent,
        error: SyntaxErrorCode,
        code: Option<String>,
        location: Location,
    ) -> Self {
        Self {
            event,
            error,
            code,
            element: location.element,
            component: location.component,
            repetition: location.repetition,
        }
    }

    pub fn location(&self) -> Location {
        Location {
            element: self.element,
            component: self.component,
            repetition: self.repetition,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        if let Some(element) = self.element {
            write!(f, " element {element}")?;
        }
        if let Some(component) = self.component {
            write!(f, " component {component}")?;
        }
        if let Some(repetition) = self.repetition {
            write!(f, " repetition {repetition}")?;
        }
        Ok(())
    }
}

/// Receives violations as they are found
pub trait ValidationEventHandler {
    fn element_error(&mut self, violation: Violation);
}

impl<H: ValidationEventHandler + ?Sized> ValidationEventHandler for &mut H {
    fn element_error(&mut self, violation: Violation) {
        (**self).element_error(violation);
    }
}

impl ValidationEventHandler for Vec<Violation> {
    fn element_error(&mut self, violation: Violation) {
        self.push(violation);
    }
}

/// Handler that passes each violation to a closure
pub struct FnHandler<F>(F);

/// Wrap a closure as a [`ValidationEventHandler`]
pub fn from_fn<F: FnMut(Violation)>(f: F) -> FnHandler<F> {
    FnHandler(f)
}

impl<F: FnMut(Violation)> ValidationEventHandler for FnHandler<F> {
    fn element_error(&mut self, violation: Violation) {
        (self.0)(violation);
    }
}

/// Collects violations reported for a document
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing has been reported
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations carrying a specific error code
    pub fn with_error(&self, error: SyntaxErrorCode) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(move |violation| violation.error == error)
    }

    /// Number of violations per error code
    pub fn counts(&self) -> HashMap<SyntaxErrorCode, usize> {
        let mut counts = HashMap::new();
        for violation in &self.violations {
            *counts.entry(violation.error).or_insert(0) += 1;
        }
        counts
    }

    pub fn clear(&mut self) {
        self.violations.clear();
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

impl ValidationEventHandler for ValidationReport {
    fn element_error(&mut self, violation: Violation) {
        self.violations.push(violation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(error: SyntaxErrorCode, code: Option<&str>) -> Violation {
        Violation::new(
            ValidationEvent::ElementOccurrenceError,
            error,
            code.map(str::to_string),
            Location {
                element: Some(2),
                component: None,
                repetition: None,
            },
        )
    }

    #[test]
    fn test_report_collects() {
        let mut report = ValidationReport::new();
        assert!(report.is_valid());

        report.element_error(violation(SyntaxErrorCode::ExclusionConditionViolated, Some("1004")));
        report.element_error(violation(SyntaxErrorCode::ExclusionConditionViolated, Some("1225")));
        report.element_error(violation(
            SyntaxErrorCode::ConditionalRequiredDataElementMissing,
            None,
        ));

        assert!(!report.is_valid());
        assert_eq!(report.len(), 3);
        assert_eq!(
            report
                .with_error(SyntaxErrorCode::ExclusionConditionViolated)
                .count(),
            2
        );
        assert_eq!(
            report.counts()[&SyntaxErrorCode::ConditionalRequiredDataElementMissing],
            1
        );

        report.clear();
        assert!(report.is_empty());
    }

    #[test]
    fn test_handler_through_mut_reference() {
        fn report_one(mut handler: impl ValidationEventHandler) {
            handler.element_error(violation(SyntaxErrorCode::TooManyRepetitions, None));
        }

        let mut violations: Vec<Violation> = Vec::new();
        report_one(&mut violations);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].location().element, Some(2));
    }

    #[test]
    fn test_closure_handler() {
        let mut codes = Vec::new();
        let mut handler = from_fn(|violation: Violation| codes.push(violation.code));
        handler.element_error(violation(SyntaxErrorCode::ExclusionConditionViolated, Some("1225")));
        handler.element_error(violation(SyntaxErrorCode::ExclusionConditionViolated, None));
        drop(handler);

        assert_eq!(codes, vec![Some("1225".to_string()), None]);
    }

    #[test]
    fn test_display() {
        let shown = violation(SyntaxErrorCode::ExclusionConditionViolated, Some("1004")).to_string();
        assert_eq!(shown, "EXCLUSION_CONDITION_VIOLATED [1004] element 2");
    }
}
