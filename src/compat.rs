//! # Compatibility Rules
//!
//! A downstream step's candidates are narrowed by the components already selected for the
//! steps it depends on.  For every (dependency, dependent) category pair there is at most one
//! [`Rule`]: an upstream attribute whose value the candidate must repeat.
//!
//! | upstream    | dependent   | candidate must have                                      |
//! |-------------|-------------|----------------------------------------------------------|
//! | CPU         | MOTHERBOARD | `socket` equal to the CPU's `socket`                     |
//! | MOTHERBOARD | RAM         | `type` or `memoryType` equal to the board's `memoryType` |
//! | CPU         | COOLING     | `socket` equal, or `compatibility` listing the socket    |
//! | MOTHERBOARD | CASE        | `formFactor` equal, or `compatibility` listing it        |
//!
//! Pairs with no rule impose nothing.  An upstream component that lacks the attribute imposes
//! nothing either.
//!
//! ## Unresolved upstream components
//!
//! When the id selected upstream cannot be fetched the [`CompatibilityPolicy`] decides.
//! `fail_open` (the default) drops the constraint and logs a warning, so the step shows more
//! candidates rather than none.  `fail_closed` blocks the step until the upstream resolves.

use serde::{Deserialize, Serialize};

use crate::specs::{COMPATIBILITY, FORM_FACTOR, MEMORY_TYPE, SOCKET, Specifications, TYPE};
use crate::{Component, ComponentCategory, ComponentId};

/// What to do when an upstream component cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityPolicy {
    /// Ignore the constraint and show every candidate.
    #[default]
    FailOpen,
    /// Show no candidates.
    FailClosed,
}

/// Attribute-equality rule between an upstream category and a dependent category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// Attribute read from the upstream component.
    pub upstream_attribute: &'static str,
    /// Candidate attributes accepted as equivalent spellings.
    pub candidate_attributes: &'static [&'static str],
    /// Whether a `compatibility` list containing the value also satisfies the rule.
    pub list_fallback: bool,
}

/// Returns the rule relating `dependent` candidates to a selected `upstream` component.
pub fn rule_for(upstream: ComponentCategory, dependent: ComponentCategory) -> Option<Rule> {
    use ComponentCategory::*;
    match (upstream, dependent) {
        (Cpu, Motherboard) => Some(Rule {
            upstream_attribute: SOCKET,
            candidate_attributes: &[SOCKET],
            list_fallback: false,
        }),
        (Motherboard, Ram) => Some(Rule {
            upstream_attribute: MEMORY_TYPE,
            candidate_attributes: &[TYPE, MEMORY_TYPE],
            list_fallback: false,
        }),
        (Cpu, Cooling) => Some(Rule {
            upstream_attribute: SOCKET,
            candidate_attributes: &[SOCKET],
            list_fallback: true,
        }),
        (Motherboard, Case) => Some(Rule {
            upstream_attribute: FORM_FACTOR,
            candidate_attributes: &[FORM_FACTOR],
            list_fallback: true,
        }),
        (Cpu | Motherboard | Ram | Storage | Gpu | Psu | Case | Cooling, _) => None,
    }
}

/// A rule instantiated with the value read from a concrete upstream component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Constraint {
    /// Category of the upstream component the value came from.
    pub upstream: ComponentCategory,
    /// Candidate attributes that may carry the value.
    pub attributes: &'static [&'static str],
    /// The required value.
    pub expected: String,
    /// Whether a `compatibility` list containing the value also satisfies the constraint.
    pub list_fallback: bool,
}

impl Constraint {
    /// True when `specs` satisfy the constraint.
    ///
    /// Only text attributes are compared.  A number or flag never matches, even one whose
    /// rendering equals `expected`; the PostgreSQL listing applies the same restriction.  The
    /// `compatibility` fallback accepts either a list holding the value or a single string.
    pub fn admits(&self, specs: &Specifications) -> bool {
        self.attributes
            .iter()
            .any(|attr| specs.text(attr) == Some(self.expected.as_str()))
            || (self.list_fallback && specs.matches(COMPATIBILITY, &self.expected))
    }
}

/// Builds the constraint `rule` places on candidates, given the selected upstream component.
///
/// Returns `None` when the upstream component does not carry the rule's attribute.
pub fn constraint(rule: &Rule, upstream: &Component) -> Option<Constraint> {
    upstream
        .specifications
        .text(rule.upstream_attribute)
        .map(|value| Constraint {
            upstream: upstream.category,
            attributes: rule.candidate_attributes,
            expected: value.to_string(),
            list_fallback: rule.list_fallback,
        })
}

/// An upstream selection as seen by the predicate builder.
#[derive(Debug, Clone, Copy)]
pub enum Upstream<'a> {
    /// The selected component was fetched.
    Resolved(&'a Component),
    /// The id is selected but its record could not be fetched.
    Unresolved(ComponentCategory, ComponentId),
}

/// A conjunction of constraints over candidate components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Predicate {
    constraints: Vec<Constraint>,
    blocked: bool,
}

impl Predicate {
    /// The predicate that admits every candidate.
    pub fn always() -> Self {
        Self::default()
    }

    /// The predicate that admits nothing.
    pub fn never() -> Self {
        Self {
            constraints: Vec::new(),
            blocked: true,
        }
    }

    /// The individual constraints, all of which must hold.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// True when the predicate rejects everything.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// True when the predicate admits everything.
    pub fn is_unconstrained(&self) -> bool {
        !self.blocked && self.constraints.is_empty()
    }

    /// True when `component` satisfies every constraint.
    pub fn admits(&self, component: &Component) -> bool {
        !self.blocked
            && self
                .constraints
                .iter()
                .all(|c| c.admits(&component.specifications))
    }
}

/// Builds the predicate for `dependent` candidates from its upstream selections.
pub fn predicate_for(
    dependent: ComponentCategory,
    upstream: &[Upstream<'_>],
    policy: CompatibilityPolicy,
) -> Predicate {
    let mut predicate = Predicate::always();
    for up in upstream {
        match up {
            Upstream::Resolved(component) => {
                let Some(rule) = rule_for(component.category, dependent) else {
                    continue;
                };
                match constraint(&rule, component) {
                    Some(c) => predicate.constraints.push(c),
                    None => tracing::debug!(
                        upstream = %component.id,
                        attribute = rule.upstream_attribute,
                        "upstream component lacks compatibility attribute"
                    ),
                }
            }
            Upstream::Unresolved(category, id) => {
                if rule_for(*category, dependent).is_none() {
                    continue;
                }
                match policy {
                    CompatibilityPolicy::FailOpen => tracing::warn!(
                        upstream = %id,
                        category = %category,
                        dependent = %dependent,
                        "upstream component not found; not filtering candidates"
                    ),
                    CompatibilityPolicy::FailClosed => {
                        tracing::warn!(
                            upstream = %id,
                            category = %category,
                            dependent = %dependent,
                            "upstream component not found; blocking candidates"
                        );
                        return Predicate::never();
                    }
                }
            }
        }
    }
    predicate
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn component(id: i64, category: ComponentCategory, specs: Specifications) -> Component {
        let now = Utc::now();
        Component {
            id: ComponentId(id),
            category,
            name: format!("{category} {id}"),
            price: 100,
            image_url: None,
            specifications: specs,
            created_at: now,
            updated_at: now,
        }
    }

    fn cpu(socket: &str) -> Component {
        component(
            1,
            ComponentCategory::Cpu,
            Specifications::new().with(SOCKET, socket),
        )
    }

    fn board(memory_type: &str, form_factor: &str) -> Component {
        component(
            10,
            ComponentCategory::Motherboard,
            Specifications::new()
                .with(SOCKET, "AM5")
                .with(MEMORY_TYPE, memory_type)
                .with(FORM_FACTOR, form_factor),
        )
    }

    #[test]
    fn motherboard_socket_must_match() {
        let cpu = cpu("AM5");
        let p = predicate_for(
            ComponentCategory::Motherboard,
            &[Upstream::Resolved(&cpu)],
            CompatibilityPolicy::FailOpen,
        );
        let am5 = component(
            2,
            ComponentCategory::Motherboard,
            Specifications::new().with(SOCKET, "AM5"),
        );
        let am4 = component(
            3,
            ComponentCategory::Motherboard,
            Specifications::new().with(SOCKET, "AM4"),
        );
        assert!(p.admits(&am5));
        assert!(!p.admits(&am4));
    }

    #[test]
    fn ram_type_spellings_are_equivalent() {
        let board = board("DDR5", "ATX");
        let p = predicate_for(
            ComponentCategory::Ram,
            &[Upstream::Resolved(&board)],
            CompatibilityPolicy::FailOpen,
        );
        let by_type = component(
            20,
            ComponentCategory::Ram,
            Specifications::new().with(TYPE, "DDR5"),
        );
        let by_memory_type = component(
            21,
            ComponentCategory::Ram,
            Specifications::new().with(MEMORY_TYPE, "DDR5"),
        );
        let ddr4 = component(
            22,
            ComponentCategory::Ram,
            Specifications::new().with(TYPE, "DDR4"),
        );
        assert!(p.admits(&by_type));
        assert!(p.admits(&by_memory_type));
        assert!(!p.admits(&ddr4));
    }

    #[test]
    fn cooling_and_case_accept_compatibility_lists() {
        let cpu = cpu("AM5");
        let p = predicate_for(
            ComponentCategory::Cooling,
            &[Upstream::Resolved(&cpu)],
            CompatibilityPolicy::FailOpen,
        );
        let listed = component(
            30,
            ComponentCategory::Cooling,
            Specifications::new().with(COMPATIBILITY, &["AM4", "AM5"][..]),
        );
        let unlisted = component(
            31,
            ComponentCategory::Cooling,
            Specifications::new().with(COMPATIBILITY, &["LGA1700"][..]),
        );
        assert!(p.admits(&listed));
        assert!(!p.admits(&unlisted));

        let board = board("DDR5", "Micro-ATX");
        let p = predicate_for(
            ComponentCategory::Case,
            &[Upstream::Resolved(&board)],
            CompatibilityPolicy::FailOpen,
        );
        let same = component(
            40,
            ComponentCategory::Case,
            Specifications::new().with(FORM_FACTOR, "Micro-ATX"),
        );
        let listed = component(
            41,
            ComponentCategory::Case,
            Specifications::new()
                .with(FORM_FACTOR, "Mid Tower")
                .with(COMPATIBILITY, &["ATX", "Micro-ATX"][..]),
        );
        let neither = component(
            42,
            ComponentCategory::Case,
            Specifications::new().with(FORM_FACTOR, "Mini Tower"),
        );
        assert!(p.admits(&same));
        assert!(p.admits(&listed));
        assert!(!p.admits(&neither));
    }

    #[test]
    fn compatibility_may_be_a_single_value() {
        let cpu = cpu("AM5");
        let p = predicate_for(
            ComponentCategory::Cooling,
            &[Upstream::Resolved(&cpu)],
            CompatibilityPolicy::FailOpen,
        );
        let single = component(
            32,
            ComponentCategory::Cooling,
            Specifications::new().with(COMPATIBILITY, "AM5"),
        );
        let other = component(
            33,
            ComponentCategory::Cooling,
            Specifications::new().with(COMPATIBILITY, "LGA1700"),
        );
        assert!(p.admits(&single));
        assert!(!p.admits(&other));
    }

    #[test]
    fn numeric_attributes_never_match() {
        let cpu = cpu("1700");
        let p = predicate_for(
            ComponentCategory::Motherboard,
            &[Upstream::Resolved(&cpu)],
            CompatibilityPolicy::FailOpen,
        );
        let numeric = component(
            5,
            ComponentCategory::Motherboard,
            Specifications::new().with(SOCKET, 1700.0),
        );
        let text = component(
            6,
            ComponentCategory::Motherboard,
            Specifications::new().with(SOCKET, "1700"),
        );
        assert!(!p.admits(&numeric));
        assert!(p.admits(&text));
    }

    #[test]
    fn pairs_without_rules_are_unconstrained() {
        let cpu = cpu("AM5");
        for dependent in [
            ComponentCategory::Ram,
            ComponentCategory::Gpu,
            ComponentCategory::Storage,
            ComponentCategory::Psu,
            ComponentCategory::Case,
        ] {
            let p = predicate_for(
                dependent,
                &[Upstream::Resolved(&cpu)],
                CompatibilityPolicy::FailOpen,
            );
            assert!(p.is_unconstrained(), "{dependent}");
        }
    }

    #[test]
    fn upstream_without_attribute_is_unconstrained() {
        let bare = component(1, ComponentCategory::Cpu, Specifications::new());
        let p = predicate_for(
            ComponentCategory::Motherboard,
            &[Upstream::Resolved(&bare)],
            CompatibilityPolicy::FailOpen,
        );
        assert!(p.is_unconstrained());
    }

    #[test]
    fn unresolved_upstream_follows_policy() {
        let upstream = [Upstream::Unresolved(ComponentCategory::Cpu, ComponentId(404))];
        let candidate = component(
            2,
            ComponentCategory::Motherboard,
            Specifications::new().with(SOCKET, "AM4"),
        );

        let open = predicate_for(
            ComponentCategory::Motherboard,
            &upstream,
            CompatibilityPolicy::FailOpen,
        );
        assert!(open.admits(&candidate));

        let closed = predicate_for(
            ComponentCategory::Motherboard,
            &upstream,
            CompatibilityPolicy::FailClosed,
        );
        assert!(closed.is_blocked());
        assert!(!closed.admits(&candidate));

        let unrelated = predicate_for(
            ComponentCategory::Gpu,
            &upstream,
            CompatibilityPolicy::FailClosed,
        );
        assert!(unrelated.is_unconstrained());
    }
}
