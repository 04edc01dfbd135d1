use std::sync::OnceLock;

use regex::{Captures, Regex};

/// `{{ env.NAME }}` or `{{ env.NAME | default("value") }}`
fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*env\.(?P<var>[A-Za-z_][A-Za-z0-9_]*)\s*(?:\|\s*default\("(?P<default>[^"]*)"\)\s*)?\}\}"#)
            .expect("must be valid regex")
    })
}

/// Substitute environment placeholders in raw config text
///
/// Comment lines are copied untouched so a commented-out secret never
/// has to be set. Line endings are preserved.
pub fn expand_env(input: &str) -> anyhow::Result<String> {
    let mut output = String::with_capacity(input.len());

    for line in input.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut missing: Option<String> = None;
        let expanded = placeholder().replace_all(line, |caps: &Captures<'_>| {
            let var = &caps["var"];
            std::env::var(var).unwrap_or_else(|_| match caps.name("default") {
                Some(default) => default.as_str().to_owned(),
                None => {
                    missing.get_or_insert_with(|| var.to_owned());
                    String::new()
                }
            })
        });

        if let Some(var) = missing {
            anyhow::bail!("environment variable `{var}` is not set");
        }
        output.push_str(&expanded);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_unchanged() {
        let input = "model = \"gpt-4o\"\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn substitutes_set_variable() {
        temp_env::with_var("COUNCIL_TEST_KEY", Some("sk-123"), || {
            let out = expand_env("api_key = \"{{ env.COUNCIL_TEST_KEY }}\"\n").unwrap();
            assert_eq!(out, "api_key = \"sk-123\"\n");
        });
    }

    #[test]
    fn unset_variable_without_default_is_an_error() {
        temp_env::with_var_unset("COUNCIL_TEST_UNSET", || {
            let err = expand_env("api_key = \"{{ env.COUNCIL_TEST_UNSET }}\"").unwrap_err();
            assert!(err.to_string().contains("COUNCIL_TEST_UNSET"));
        });
    }

    #[test]
    fn default_applies_only_when_unset() {
        let input = "url = \"{{ env.COUNCIL_TEST_URL | default(\"http://localhost\") }}\"";
        temp_env::with_var_unset("COUNCIL_TEST_URL", || {
            assert_eq!(expand_env(input).unwrap(), "url = \"http://localhost\"");
        });
        temp_env::with_var("COUNCIL_TEST_URL", Some("http://remote"), || {
            assert_eq!(expand_env(input).unwrap(), "url = \"http://remote\"");
        });
    }

    #[test]
    fn comment_lines_are_left_alone() {
        temp_env::with_var_unset("COUNCIL_TEST_UNSET", || {
            let input = "  # api_key = \"{{ env.COUNCIL_TEST_UNSET }}\"\nmodel = \"x\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }

    #[test]
    fn other_scopes_pass_through() {
        let input = "note = \"{{ vars.NAME }}\"";
        assert_eq!(expand_env(input).unwrap(), input);
    }
}
