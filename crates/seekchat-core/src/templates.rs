/// A named system prompt that can replace the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    pub prompt: &'static str,
}

const TEMPLATES: &[Template] = &[
    Template {
        name: "assistant",
        description: "General helpful assistant",
        prompt: "You are a helpful assistant. Answer clearly and concisely.",
    },
    Template {
        name: "coder",
        description: "Programming help with runnable examples",
        prompt: "You are an expert software engineer. Prefer short explanations \
                 followed by complete, runnable code in fenced blocks tagged with \
                 their language.",
    },
    Template {
        name: "translator",
        description: "Translate between Chinese and English",
        prompt: "You are a translator. If the user writes Chinese, translate it to \
                 English; otherwise translate it to Chinese. Output only the translation.",
    },
    Template {
        name: "reviewer",
        description: "Critical reviewer for text and code",
        prompt: "You are a meticulous reviewer. Point out mistakes, risks and unclear \
                 parts, ordered by severity, and suggest concrete fixes.",
    },
];

pub fn templates() -> &'static [Template] {
    TEMPLATES
}

/// Case-insensitive lookup by name.
pub fn find_template(name: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.name.eq_ignore_ascii_case(name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_template_ignores_case() {
        assert_eq!(find_template(" Coder ").map(|t| t.name), Some("coder"));
        assert!(find_template("poet").is_none());
    }

    #[test]
    fn test_template_names_are_unique() {
        let mut names: Vec<_> = templates().iter().map(|t| t.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), templates().len());
    }
}
