use regex::Regex;
use std::collections::HashMap;
use std::env as stdenv;
use std::sync::LazyLock;

/// `$NAME`, `${NAME}` and the legacy `{NAME` forms. The leading sigil is
/// either `$` or `{`; an enclosing `{...}` after it is stripped.
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[${](?:\{(?P<braced>.*)\}|(?P<bare>.+))$").expect("valid reference pattern")
});

/// Mutable, user-level variable table of the interpreter.
///
/// The table is owned by the [`Interpreter`](crate::Interpreter) and passed by
/// reference to the built-ins that mutate it and to argument expansion, which
/// only reads it. Variables set here are shell-local: launched programs see
/// the process environment, not this table.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Variables set with `set`.
    pub vars: HashMap<String, String>,
    /// When set to true, indicates that an interactive loop should exit.
    pub should_exit: bool,
}

impl Environment {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of a variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override a variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Remove a variable from `self.vars`, returning its previous value.
    pub fn unset_var(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// Replace every variable reference in `args` with its value.
    ///
    /// An argument is a reference when it starts with `$` or `{`. Arguments
    /// whose variable cannot be resolved are left untouched; the names of the
    /// missing variables are returned in order so the caller can report them.
    pub fn expand(&self, args: &mut [String]) -> Vec<String> {
        let mut missing = Vec::new();
        for arg in args.iter_mut() {
            let Some(name) = reference_name(arg) else {
                continue;
            };
            match self.get_var(name) {
                Some(value) => *arg = value,
                None => missing.push(name.to_owned()),
            }
        }
        missing
    }
}

fn reference_name(arg: &str) -> Option<&str> {
    let captures = REFERENCE.captures(arg)?;
    let name = captures
        .name("braced")
        .or_else(|| captures.name("bare"))?
        .as_str();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_env_set_get_and_unset_var() {
        let mut env = Environment::new();

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");
        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));

        assert_eq!(env.unset_var("KEY"), Some("VALUE".to_string()));
        assert_eq!(env.get_var("KEY"), None);
        assert_eq!(env.unset_var("KEY"), None);
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
    }

    #[test]
    fn expand_replaces_all_reference_forms() {
        let mut env = Environment::new();
        env.set_var("GREETING", "hello");

        let mut argv = args(&["$GREETING", "${GREETING}", "plain", "x$GREETING"]);
        let missing = env.expand(&mut argv);

        assert!(missing.is_empty());
        assert_eq!(argv, vec!["hello", "hello", "plain", "x$GREETING"]);
    }

    #[test]
    fn brace_sigil_keeps_the_closing_brace_in_the_name() {
        let mut env = Environment::new();
        env.set_var("A}", "odd");
        let mut argv = args(&["{A}"]);
        assert!(env.expand(&mut argv).is_empty());
        assert_eq!(argv, vec!["odd"]);
    }

    #[test]
    fn missing_variable_is_reported_and_left_as_is() {
        let env = Environment::new();
        let mut argv = args(&["$PIPESH_SURELY_MISSING_VAR", "${PIPESH_OTHER_MISSING}"]);
        let missing = env.expand(&mut argv);

        assert_eq!(
            missing,
            vec!["PIPESH_SURELY_MISSING_VAR", "PIPESH_OTHER_MISSING"]
        );
        assert_eq!(
            argv,
            vec!["$PIPESH_SURELY_MISSING_VAR", "${PIPESH_OTHER_MISSING}"]
        );
    }

    #[test]
    fn bare_sigils_are_not_references() {
        let env = Environment::new();
        let mut argv = args(&["$", "${}", "{"]);
        assert!(env.expand(&mut argv).is_empty());
        assert_eq!(argv, vec!["$", "${}", "{"]);
    }
}
