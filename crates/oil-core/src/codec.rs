//! Parsing of controller and target attribute values.
//!
//! Both attributes are whitespace-separated token lists:
//!
//! - controller attribute: `"example other-controller"`
//! - target attribute: `"example.item other.item"`
//!
//! Target tokens split once on the first `.`; a token without a usable target
//! name parses with `target: None` and never matches anything.
//!
//! All functions are pure and never fail; malformed input yields fewer tokens.

use smallvec::SmallVec;

/// Controller names declared by a controller attribute, in first-seen order,
/// without duplicates.
#[must_use]
pub fn controllers_from_attribute(value: &str) -> SmallVec<[&str; 4]> {
    let mut names: SmallVec<[&str; 4]> = SmallVec::new();
    for token in value.split_whitespace() {
        if !names.contains(&token) {
            names.push(token);
        }
    }
    names
}

/// Whether a controller attribute value declares `name`.
#[must_use]
pub fn declares_controller(value: &str, name: &str) -> bool {
    value.split_whitespace().any(|token| token == name)
}

/// One `controller.target` token from a target attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetToken<'a> {
    pub controller: &'a str,
    pub target: Option<&'a str>,
}

impl<'a> TargetToken<'a> {
    fn parse(token: &'a str) -> Self {
        match token.split_once('.') {
            Some((controller, target)) if !target.is_empty() => Self {
                controller,
                target: Some(target),
            },
            Some((controller, _)) => Self {
                controller,
                target: None,
            },
            None => Self {
                controller: token,
                target: None,
            },
        }
    }

    /// Whether this token names exactly `(controller, target)`.
    #[must_use]
    pub fn names(&self, controller: &str, target: &str) -> bool {
        self.controller == controller && self.target == Some(target)
    }

    /// The `(controller, target)` pair, if the token is complete.
    #[must_use]
    pub fn pair(&self) -> Option<(&'a str, &'a str)> {
        self.target.map(|t| (self.controller, t))
    }
}

/// Every token of a target attribute, in order.
#[must_use]
pub fn targets_from_attribute(value: &str) -> Vec<TargetToken<'_>> {
    value.split_whitespace().map(TargetToken::parse).collect()
}

/// Complete `(controller, target)` pairs of a target attribute, deduplicated
/// in first-seen order.
#[must_use]
pub fn target_pairs(value: &str) -> SmallVec<[(&str, &str); 4]> {
    let mut pairs: SmallVec<[(&str, &str); 4]> = SmallVec::new();
    for pair in value
        .split_whitespace()
        .filter_map(|token| TargetToken::parse(token).pair())
    {
        if !pairs.contains(&pair) {
            pairs.push(pair);
        }
    }
    pairs
}

/// Whether a target attribute value declares `(controller, target)`.
#[must_use]
pub fn declares_target(value: &str, controller: &str, target: &str) -> bool {
    value
        .split_whitespace()
        .any(|token| TargetToken::parse(token).names(controller, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn controllers_split_on_any_whitespace() {
        let names = controllers_from_attribute("  example\tother-controller\n ");
        assert_eq!(names.as_slice(), &["example", "other-controller"]);
    }

    #[test]
    fn controllers_dedupe_in_order() {
        let names = controllers_from_attribute("b a b c a");
        assert_eq!(names.as_slice(), &["b", "a", "c"]);
    }

    #[test]
    fn empty_attribute_declares_nothing() {
        assert!(controllers_from_attribute("").is_empty());
        assert!(controllers_from_attribute("   ").is_empty());
        assert!(targets_from_attribute("").is_empty());
    }

    #[test]
    fn declares_controller_matches_whole_tokens() {
        assert!(declares_controller("a example b", "example"));
        assert!(!declares_controller("examples", "example"));
        assert!(!declares_controller("", "example"));
    }

    #[test]
    fn target_tokens_split_once() {
        let tokens = targets_from_attribute("example.item other.deep.name");
        assert_eq!(
            tokens,
            vec![
                TargetToken {
                    controller: "example",
                    target: Some("item"),
                },
                TargetToken {
                    controller: "other",
                    target: Some("deep.name"),
                },
            ]
        );
    }

    #[test]
    fn incomplete_target_tokens_fail_safe() {
        let tokens = targets_from_attribute("example example.");
        assert!(tokens.iter().all(|t| t.target.is_none()));
        assert!(target_pairs("example example.").is_empty());
        assert!(!declares_target("example", "example", ""));
    }

    #[test]
    fn declares_target_requires_both_halves() {
        let value = "example.item other.item";
        assert!(declares_target(value, "example", "item"));
        assert!(declares_target(value, "other", "item"));
        assert!(!declares_target(value, "example", "other"));
        assert!(!declares_target(value, "missing", "item"));
    }

    proptest! {
        #[test]
        fn controller_names_never_contain_whitespace(value in "[a-z \t\n-]{0,40}") {
            for name in controllers_from_attribute(&value) {
                prop_assert!(!name.is_empty());
                prop_assert!(!name.chars().any(char::is_whitespace));
                prop_assert!(declares_controller(&value, name));
            }
        }

        #[test]
        fn pairs_round_trip_through_declares(value in "[a-z. ]{0,40}") {
            for (controller, target) in target_pairs(&value) {
                prop_assert!(declares_target(&value, controller, target));
            }
        }
    }
}
