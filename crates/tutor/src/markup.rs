//! Repairs math notation that the model sometimes wraps in square brackets,
//! e.g. `[ $$x^2$$ ]` instead of `$$x^2$$`.
//!
//! The cleanup works on one fragment at a time. A bracket pair whose halves
//! arrive in different fragments is left as is; fixing that would mean
//! holding fragments back, and every fragment is forwarded as soon as it
//! arrives.
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::borrow::Cow;

enum Action {
    /// Replace the bracketed match with its `inner` group
    Unwrap,
    /// As `Unwrap`, only when the `open` and `close` environment names agree
    UnwrapEnvironment,
    /// Plain substitution
    Substitute(&'static str),
}

/// One step of the cleanup pipeline
pub struct Rule {
    pub name: &'static str,
    pattern: Regex,
    action: Action,
}

// Commands that show up with a doubled backslash, e.g. `\\frac`
const COMMANDS: &str = "frac|dfrac|tfrac|sqrt|sum|int|iint|oint|prod|lim|infty|cdot|times|div|pm|leq?|geq?|neq|approx|pi|theta|alpha|beta|gamma|delta|lambda|mu|sigma|omega|text|mathrm|mathbf|boxed";

const ENVIRONMENTS: &str =
    "equation|align|aligned|gather|gathered|cases|split|array|matrix|pmatrix|bmatrix|vmatrix";

// Constructs worth unwrapping even without math delimiters
const CONSTRUCTS: &str = "frac|dfrac|tfrac|sqrt|sum|int|iint|oint|prod|lim";

fn rule(name: &'static str, pattern: &str, action: Action) -> Rule {
    Rule {
        name,
        pattern: Regex::new(pattern).unwrap_or_else(|e| panic!("invalid {} rule: {}", name, e)),
        action,
    }
}

lazy_static! {
    /// Applied in order. Later rules see the output of earlier ones.
    pub static ref RULES: Vec<Rule> = vec![
        rule(
            "display_math",
            r"(?s)\[\s*(?P<inner>\$\$.+?\$\$)\s*\]",
            Action::Unwrap,
        ),
        rule(
            "inline_math",
            r"\[\s*(?P<inner>\$[^$]+?\$)\s*\]",
            Action::Unwrap,
        ),
        rule(
            "environment",
            &format!(
                r"(?s)\[\s*(?P<inner>\\begin\{{(?P<open>(?:{env})\*?)\}}.*?\\end\{{(?P<close>(?:{env})\*?)\}})\s*\]",
                env = ENVIRONMENTS
            ),
            Action::UnwrapEnvironment,
        ),
        rule(
            "doubled_escape",
            &format!(r"\\{{2,}}(?P<cmd>{})\b", COMMANDS),
            Action::Substitute(r"\${cmd}"),
        ),
        rule(
            "construct",
            &format!(r"\[\s*(?P<inner>\\(?:{})\b[^\[\]]*?)\s*\]", CONSTRUCTS),
            Action::Unwrap,
        ),
    ];
}

impl Rule {
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match self.action {
            Action::Substitute(replacement) => self.pattern.replace_all(text, replacement),
            Action::Unwrap => self.unwrap_brackets(text, false),
            Action::UnwrapEnvironment => self.unwrap_brackets(text, true),
        }
    }

    fn unwrap_brackets<'t>(&self, text: &'t str, same_environment: bool) -> Cow<'t, str> {
        self.pattern.replace_all(text, |caps: &Captures| {
            let start = caps.get(0).map_or(0, |m| m.start());
            let before = &text[..start];
            let inner = &caps["inner"];

            // `\[`, `\left[` and `\right]` are LaTeX, not stray brackets
            let latex_bracket = before.ends_with('\\')
                || before.ends_with("\\left")
                || inner.ends_with("\\right")
                || inner.ends_with('\\');
            let mismatched = same_environment && caps["open"] != caps["close"];

            if latex_bracket || mismatched {
                caps[0].to_string()
            } else {
                inner.to_string()
            }
        })
    }
}

fn clean_pass(fragment: &str) -> String {
    let mut text = fragment.to_string();
    for rule in RULES.iter() {
        let rewritten = match rule.apply(&text) {
            Cow::Owned(rewritten) => Some(rewritten),
            Cow::Borrowed(_) => None,
        };
        if let Some(rewritten) = rewritten {
            text = rewritten;
        }
    }
    text
}

/// Run every rule over one content fragment until nothing changes.
///
/// Unwrapping one bracket pair can expose an enclosing one, so a single pass
/// is not enough for `[[ $x$ ]]`. Every real rewrite shortens the text, which
/// bounds the loop.
pub fn clean(fragment: &str) -> String {
    let mut text = clean_pass(fragment);
    loop {
        let next = clean_pass(&text);
        if next == text {
            return text;
        }
        text = next;
    }
}
