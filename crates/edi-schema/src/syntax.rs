//! Positional syntax rules declared on composites, segments and loops

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Constraint family of a syntax rule.
///
/// The kinds follow the EDIFACT dependency notes (D1-D6) and the X12 syntax
/// note letters; both spellings are accepted by [`SyntaxRuleKind::from_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxRuleKind {
    /// At least one of the positions must be present (X12 `R`, D3)
    Required,
    /// At most one of the positions may be present (X12 `E`, D4)
    Exclusion,
    /// If the first is present, all others are required (X12 `C`, D5)
    Conditional,
    /// If the first is present, at least one other is required (X12 `L`, D6)
    List,
    /// All or none (X12 `P`, D2)
    Paired,
    /// Exactly one (D1)
    Single,
}

impl FromStr for SyntaxRuleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REQUIRED" | "R" | "D3" => Ok(Self::Required),
            "EXCLUSION" | "E" | "D4" => Ok(Self::Exclusion),
            "CONDITIONAL" | "C" | "D5" => Ok(Self::Conditional),
            "LIST" | "L" | "D6" => Ok(Self::List),
            "PAIRED" | "P" | "D2" => Ok(Self::Paired),
            "SINGLE" | "D1" => Ok(Self::Single),
            _ => Err(Error::UnknownRuleKind(s.to_string())),
        }
    }
}

impl fmt::Display for SyntaxRuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Required => "required",
            Self::Exclusion => "exclusion",
            Self::Conditional => "conditional",
            Self::List => "list",
            Self::Paired => "paired",
            Self::Single => "single",
        };
        f.write_str(name)
    }
}

/// A constraint kind plus an ordered set of 1-based child positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxRule {
    kind: SyntaxRuleKind,
    positions: Vec<usize>,
}

impl SyntaxRule {
    pub fn new(kind: SyntaxRuleKind, positions: impl Into<Vec<usize>>) -> Self {
        Self {
            kind,
            positions: positions.into(),
        }
    }

    pub fn kind(&self) -> SyntaxRuleKind {
        self.kind
    }

    /// Positions in declaration order; the first one is the anchor/trigger
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// First position that does not address one of `child_count` children,
    /// or that repeats an earlier position
    pub fn invalid_position(&self, child_count: usize) -> Option<usize> {
        if self.positions.is_empty() {
            return Some(0);
        }
        self.positions
            .iter()
            .enumerate()
            .find(|&(index, &position)| {
                position == 0
                    || position > child_count
                    || self.positions[..index].contains(&position)
            })
            .map(|(_, &position)| position)
    }

    /// Copy of this rule with every position at or after `from` moved by
    /// `offset`, used when references are inserted ahead of those positions
    #[must_use]
    pub fn shifted(&self, from: usize, offset: usize) -> Self {
        let positions = self
            .positions
            .iter()
            .map(|&position| {
                if position >= from {
                    position + offset
                } else {
                    position
                }
            })
            .collect();

        Self {
            kind: self.kind,
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind_spellings() {
        assert_eq!("required".parse::<SyntaxRuleKind>().unwrap(), SyntaxRuleKind::Required);
        assert_eq!("E".parse::<SyntaxRuleKind>().unwrap(), SyntaxRuleKind::Exclusion);
        assert_eq!("d5".parse::<SyntaxRuleKind>().unwrap(), SyntaxRuleKind::Conditional);
        assert_eq!("L".parse::<SyntaxRuleKind>().unwrap(), SyntaxRuleKind::List);
        assert_eq!("D2".parse::<SyntaxRuleKind>().unwrap(), SyntaxRuleKind::Paired);
        assert_eq!("single".parse::<SyntaxRuleKind>().unwrap(), SyntaxRuleKind::Single);
    }

    #[test]
    fn test_parse_unknown_kind() {
        match "D9".parse::<SyntaxRuleKind>() {
            Err(Error::UnknownRuleKind(kind)) => assert_eq!(kind, "D9"),
            other => panic!("Expected UnknownRuleKind, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_position() {
        let rule = SyntaxRule::new(SyntaxRuleKind::Paired, vec![1, 3]);
        assert_eq!(rule.invalid_position(3), None);
        assert_eq!(rule.invalid_position(2), Some(3));

        let zero = SyntaxRule::new(SyntaxRuleKind::Required, vec![0, 1]);
        assert_eq!(zero.invalid_position(4), Some(0));

        let empty = SyntaxRule::new(SyntaxRuleKind::Required, Vec::new());
        assert_eq!(empty.invalid_position(4), Some(0));

        let repeated = SyntaxRule::new(SyntaxRuleKind::Exclusion, vec![2, 2]);
        assert_eq!(repeated.invalid_position(3), Some(2));

        let repeated_later = SyntaxRule::new(SyntaxRuleKind::List, vec![3, 1, 3]);
        assert_eq!(repeated_later.invalid_position(3), Some(3));
    }

    #[test]
    fn test_shifted_positions() {
        let rule = SyntaxRule::new(SyntaxRuleKind::Conditional, vec![1, 3, 4]);
        let shifted = rule.shifted(3, 2);
        assert_eq!(shifted.positions(), &[1, 5, 6]);
        assert_eq!(shifted.kind(), SyntaxRuleKind::Conditional);
    }
}
