//! Validation engine for closed structure instances

use crate::reporter::{SyntaxErrorCode, ValidationEvent, ValidationEventHandler, Violation};
use crate::rules;
use crate::usage::StructureUsage;
use crate::{Error, Result};
use edi_schema::{ComplexType, TypeKind};
use tracing::{debug, warn};

/// Validation configuration
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Report children used fewer than `min_occurs` or more than `max_occurs` times
    pub check_occurrences: bool,
    /// Maximum violations reported per structure instance (0 = unlimited)
    pub max_violations: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_occurrences: true,
            max_violations: 0,
        }
    }
}

/// Forwards violations until the configured limit is reached
struct Limiter<'a> {
    inner: &'a mut dyn ValidationEventHandler,
    limit: usize,
    reported: usize,
    suppressed: usize,
}

impl ValidationEventHandler for Limiter<'_> {
    fn element_error(&mut self, violation: Violation) {
        if self.limit != 0 && self.reported >= self.limit {
            self.suppressed += 1;
            return;
        }
        self.reported += 1;
        self.inner.element_error(violation);
    }
}

/// Runs every check declared for a structure against one instance's usage
pub struct SyntaxValidationEngine {
    config: ValidationConfig,
}

impl SyntaxValidationEngine {
    /// Create a new validation engine
    pub fn new() -> Self {
        Self {
            config: ValidationConfig::default(),
        }
    }

    /// Create with specific configuration
    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a closed instance of `structure`.
    ///
    /// Occurrence bounds are checked first (when enabled), then each syntax
    /// rule in declaration order. Returns the number of violations passed to
    /// `handler`.
    ///
    /// # Errors
    ///
    /// Fails without reporting anything when the snapshot does not belong to
    /// `structure` or when one of its rules is malformed.
    pub fn validate_structure(
        &self,
        structure: &ComplexType,
        usage: &StructureUsage,
        handler: &mut dyn ValidationEventHandler,
    ) -> Result<usize> {
        if usage.declared_children() != structure.references().len() {
            return Err(Error::SnapshotMismatch {
                structure: structure.id().to_string(),
                expected: structure.references().len(),
                found: usage.declared_children(),
            });
        }

        for rule in structure.syntax_rules() {
            rules::check_rule(rule, usage).inspect_err(|e| {
                warn!(structure = structure.id(), "rejecting malformed rule: {}", e);
            })?;
        }

        let mut limiter = Limiter {
            inner: handler,
            limit: self.config.max_violations,
            reported: 0,
            suppressed: 0,
        };

        if self.config.check_occurrences {
            Self::validate_occurrences(structure, usage, &mut limiter);
        }

        for rule in structure.syntax_rules() {
            rules::validate(rule, usage, &mut limiter)?;
        }

        if limiter.suppressed > 0 {
            debug!(
                structure = structure.id(),
                suppressed = limiter.suppressed,
                "violation limit reached"
            );
        }

        Ok(limiter.reported)
    }

    fn validate_occurrences(
        structure: &ComplexType,
        usage: &StructureUsage,
        handler: &mut dyn ValidationEventHandler,
    ) {
        let is_loop = structure.kind() == TypeKind::Loop;
        let event = if is_loop {
            ValidationEvent::SegmentOccurrenceError
        } else {
            ValidationEvent::ElementOccurrenceError
        };

        for (index, reference) in structure.references().iter().enumerate() {
            let position = index + 1;
            let count = usage.usage_count(position);

            let error = if count < reference.min_occurs() {
                if is_loop {
                    SyntaxErrorCode::MandatorySegmentMissing
                } else {
                    SyntaxErrorCode::RequiredDataElementMissing
                }
            } else if count > reference.max_occurs() {
                if is_loop {
                    SyntaxErrorCode::SegmentExceedsMaximumUse
                } else {
                    SyntaxErrorCode::TooManyRepetitions
                }
            } else {
                continue;
            };

            handler.element_error(Violation::new(
                event,
                error,
                Some(reference.target_id().to_string()),
                usage.location_of(position),
            ));
        }
    }
}

impl Default for SyntaxValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}
