//! Code detection for captured clipboard text.

use regex::{Regex, RegexSet};
use std::sync::LazyLock;

/// Language-shaped patterns; any match marks multi-line text as code.
static LANGUAGE_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        // python
        r"(?m)\b(?:def|class|import|from|return|elif|try|except|lambda|async|await|raise|yield|nonlocal)\b",
        r#"(?s)""".*?""""#,
        r"(?m)^\s*@\w+",
        // c family, javascript, java
        r#"#include\s*[<"].+[>"]"#,
        r"\b(?:function|var|let|const|public|private|protected|static|void|boolean|namespace|template|typedef)\b",
        r"=>",
        r"(?m)//.*$",
        r"(?s)/\*.*?\*/",
        r"\b(?:console\.log|System\.out\.println|printf|scanf)\b",
        r"std::\w+",
        // php
        r"<\?php",
        // rust, go, elixir
        r"\b(?:fn|impl|struct|enum|trait|mut|func|chan|defer|defmodule)\b",
        r"\b\w+!\(",
        // sql
        r"\b(?:SELECT|INSERT|UPDATE|DELETE)\b[\s\S]*\b(?:FROM|INTO|SET|WHERE)\b",
        // markup and stylesheets
        r"(?i)<!DOCTYPE\s+html>",
        r"<(?:[a-zA-Z][\w-]*)(?:\s[^>]*)?>",
        r"@media\s+[^{]+\{",
        // shell
        r"(?m)^\s*\$\s+\w+",
    ])
    .unwrap_or_else(|_| RegexSet::empty())
});

/// Generic indicators; three or more distinct hits mark text as code.
static GENERIC_INDICATORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[{}]",
        r";",
        r"[=+\-*/%&|^<>!]=",
        r"\b\d+\b",
        r#"["']"#,
        r"\b(?:true|false|null|undefined|None)\b",
        r"\b(?:if|else|for|while|return)\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

const INDENTED_RATIO: f64 = 0.3;

/// Guess whether `text` is source code.
///
/// Single-line text is never code.
pub fn is_code(text: &str) -> bool {
    if !text.contains('\n') {
        return false;
    }

    if LANGUAGE_PATTERNS.is_match(text) {
        return true;
    }

    let indicators = GENERIC_INDICATORS.iter().filter(|re| re.is_match(text)).count();
    if indicators >= 3 {
        return true;
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let indented = lines
        .iter()
        .filter(|line| line.starts_with("    ") || line.starts_with('\t'))
        .count();
    (indented as f64) / (lines.len() as f64) > INDENTED_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_is_never_code() {
        assert!(!is_code("fn main() { println!(\"hi\"); }"));
        assert!(!is_code(""));
    }

    #[test]
    fn test_language_snippets() {
        assert!(is_code("def greet(name):\n    print(name)"));
        assert!(is_code("#include <stdio.h>\nint main() {}"));
        assert!(is_code("fn main() {\n    println!(\"hi\");\n}"));
        assert!(is_code("const x = 1\nconst y = 2"));
        assert!(is_code("SELECT id\nFROM history"));
    }

    #[test]
    fn test_generic_indicators() {
        assert!(is_code("total = 1;\nx != 2 {}"));
    }

    #[test]
    fn test_indentation() {
        assert!(is_code("steps\n    one\n    two\nthree"));
    }

    #[test]
    fn test_prose_is_not_code() {
        assert!(!is_code("Shopping list\nmilk\neggs and bread"));
        assert!(!is_code("Dear team,\nsee you at the meeting tomorrow."));
    }
}
