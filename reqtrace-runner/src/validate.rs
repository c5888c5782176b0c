// Copyright (c) The reqtrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Requirement-tag validation.
//!
//! Tests declare the requirements they cover through a `requirements` marker
//! whose arguments are requirement tags: strings of the form `REQ-###-###`
//! (three-digit group, three-digit group), or the literal `NA` sentinel for
//! "not applicable". Tags on one test must be declared in non-decreasing
//! lexical order.
//!
//! Validation is a pure function over one test's raw marker arguments. All
//! violated rules for a test are reported, not just the first, so a single
//! run surfaces every defect.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// The sentinel tag meaning "no requirement applies to this test".
pub const NOT_APPLICABLE: &str = "NA";

static REQUIREMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Anchored at the start only, matching the established tag convention.
    Regex::new(r"^REQ-\d{3}-\d{3}").expect("requirement pattern is valid")
});

/// The outcome of validating one test's requirement tags.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequirementValidation {
    /// True iff no rule was violated.
    pub valid: bool,

    /// One message per violated rule, each naming the test and the exact
    /// defect.
    pub errors: Vec<String>,

    /// The tags that individually matched the pattern (or the sentinel), in
    /// declaration order.
    pub validated_requirements: Vec<String>,
}

/// Validates the raw `requirements` marker arguments attached to one test.
///
/// Marker arguments arrive untyped from the harness, so they are modelled as
/// JSON values; anything that is not a string violates rule 2.
pub fn validate_requirement_tags(node_id: &str, marker_args: &[Value]) -> RequirementValidation {
    if marker_args.is_empty() {
        return RequirementValidation {
            valid: false,
            errors: vec![format!("{node_id} missing `requirements` marker (or args)")],
            validated_requirements: Vec::new(),
        };
    }

    // Non-string arguments short-circuit the remaining checks: the test
    // contributes exactly one error.
    let Some(requirements) = marker_args
        .iter()
        .map(|arg| arg.as_str().map(str::to_owned))
        .collect::<Option<Vec<_>>>()
    else {
        return RequirementValidation {
            valid: false,
            errors: vec![format!("{node_id} requirements must all be strings")],
            validated_requirements: Vec::new(),
        };
    };

    let mut errors = Vec::new();

    // Sort order: e.g. REQ-001-001 must come before REQ-001-002. One error
    // for the first out-of-order adjacent pair.
    for pair in requirements.windows(2) {
        if pair[1] < pair[0] {
            errors.push(format!("{node_id} requirements are not sorted correctly"));
            break;
        }
    }

    let mut validated_requirements = Vec::new();
    for requirement in &requirements {
        if REQUIREMENT_PATTERN.is_match(requirement) || requirement == NOT_APPLICABLE {
            validated_requirements.push(requirement.clone());
        } else {
            errors.push(format!(
                "{node_id} requirement {requirement} does not match pattern REQ-###-###"
            ));
        }
    }

    if validated_requirements.is_empty() {
        errors.push(format!("{node_id} has no valid requirements"));
    }

    RequirementValidation {
        valid: errors.is_empty(),
        errors,
        validated_requirements,
    }
}
