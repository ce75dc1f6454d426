//! Resource and command filtering.
//!
//! A [`FilterRule`] holds two regular expressions, one over resource names and one over command
//! names. A command is exposed only when *both* patterns match the *whole* name; a pattern that
//! merely matches a substring does not count.
//!
//! ```
//! use duplocloud_mcp::filter::FilterRule;
//!
//! let rule = FilterRule::new("tenant", "list|find").unwrap();
//! assert!(rule.admits("tenant", "list"));
//! assert!(!rule.admits("tenant", "create"));
//! // full match, not search
//! assert!(!rule.admits("tenants", "list"));
//! ```

use crate::error::Error;
use regex::Regex;

/// The pattern that admits every name.
pub const MATCH_ALL: &str = ".*";

/// A pair of full-match patterns deciding which commands are exposed.
#[derive(Debug, Clone)]
pub struct FilterRule {
    resource_pattern: String,
    command_pattern: String,
    resource: Regex,
    command: Regex,
}

impl FilterRule {
    /// Compiles both patterns.
    ///
    /// An invalid pattern is a [`Error::Configuration`]; the server refuses to start rather than
    /// fall back to exposing everything.
    pub fn new(resource_pattern: &str, command_pattern: &str) -> Result<Self, Error> {
        Ok(FilterRule {
            resource: compile_full_match("resource", resource_pattern)?,
            command: compile_full_match("command", command_pattern)?,
            resource_pattern: resource_pattern.to_string(),
            command_pattern: command_pattern.to_string(),
        })
    }

    /// True iff the resource fully matches the resource pattern and the command fully matches the
    /// command pattern.
    pub fn admits(&self, resource: &str, command: &str) -> bool {
        self.admits_resource(resource) && self.admits_command(command)
    }

    pub fn admits_resource(&self, resource: &str) -> bool {
        self.resource.is_match(resource)
    }

    pub fn admits_command(&self, command: &str) -> bool {
        self.command.is_match(command)
    }

    pub fn resource_pattern(&self) -> &str {
        &self.resource_pattern
    }

    pub fn command_pattern(&self) -> &str {
        &self.command_pattern
    }

    /// `(resource_pattern, command_pattern)` as given.
    pub fn patterns(&self) -> (&str, &str) {
        (&self.resource_pattern, &self.command_pattern)
    }

    /// True when neither pattern narrows anything.
    pub fn is_default(&self) -> bool {
        self.resource_pattern == MATCH_ALL && self.command_pattern == MATCH_ALL
    }
}

fn compile_full_match(which: &str, pattern: &str) -> Result<Regex, Error> {
    // Validate the raw pattern first so that a stray `)` cannot escape the anchoring group.
    Regex::new(pattern).map_err(|e| invalid(which, pattern, &e))?;
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| invalid(which, pattern, &e))
}

fn invalid(which: &str, pattern: &str, e: &regex::Error) -> Error {
    Error::Configuration(format!("invalid {which} filter pattern '{pattern}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case(".*", ".*", "tenant", "list", true)]
    #[case("tenant", "list|find", "tenant", "find", true)]
    #[case("tenant", "list|find", "tenant", "delete", false)]
    #[case("tenant", ".*", "service", "list", false)]
    #[case("ten", ".*", "tenant", "list", false)]
    #[case("ten.*", "li", "tenant", "list", false)]
    #[case("service|hosts", "logs|pods", "hosts", "pods", true)]
    #[case("a)|(b", ".*", "a", "list", false)]
    fn admits_cases(
        #[case] resource_pattern: &str,
        #[case] command_pattern: &str,
        #[case] resource: &str,
        #[case] command: &str,
        #[case] expected: bool,
    ) {
        match FilterRule::new(resource_pattern, command_pattern) {
            Ok(rule) => assert_eq!(rule.admits(resource, command), expected),
            Err(e) => {
                assert!(!expected);
                assert_eq!(e.kind(), ErrorKind::Configuration);
            }
        }
    }

    #[rstest]
    #[case("(", ".*")]
    #[case(".*", "[a-")]
    #[case("a)|(b", ".*")]
    fn invalid_patterns_are_configuration_errors(#[case] resource: &str, #[case] command: &str) {
        let err = FilterRule::new(resource, command).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("filter pattern"));
    }

    #[test]
    fn default_admits_everything() {
        let rule = FilterRule::new(MATCH_ALL, MATCH_ALL).unwrap();
        assert!(rule.is_default());
        assert!(rule.admits("anything", "at_all"));
        assert!(rule.admits("", ""));
    }

    mod proptest_tests {
        use super::super::*;
        use proptest::prelude::*;

        fn word() -> impl Strategy<Value = String> {
            "[a-z]{1,6}"
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            /// Alternations of literal words admit exactly the listed words.
            #[test]
            fn admits_iff_both_fully_match(
                resources in prop::collection::vec(word(), 1..4),
                commands in prop::collection::vec(word(), 1..4),
                resource in word(),
                command in word(),
            ) {
                let rule = FilterRule::new(&resources.join("|"), &commands.join("|")).unwrap();
                let expected = resources.contains(&resource) && commands.contains(&command);
                prop_assert_eq!(rule.admits(&resource, &command), expected);
            }

            /// A proper prefix pattern never admits a longer name.
            #[test]
            fn prefix_is_not_a_match(name in "[a-z]{2,10}", cut in 1usize..10) {
                let cut = cut.min(name.len() - 1);
                let rule = FilterRule::new(&name[..cut], MATCH_ALL).unwrap();
                prop_assert!(!rule.admits(&name, "list"));
                let regex_rule = FilterRule::new(&format!("{}.*", &name[..cut]), MATCH_ALL).unwrap();
                prop_assert!(regex_rule.admits(&name, "list"));
            }
        }
    }
}
