//! Pure tree-walk rendering of parsed templates

use std::path::{Component, PathBuf};

use crate::{
    error::EngineError,
    models::AnswerSet,
    template::parser::{Element, TemplateParser},
};

/// Render template text against a resolved answer set
///
/// `origin` names the file rule being rendered and only appears in error
/// messages. Rendering is side-effect free: the same input and answer set
/// always produce the same output, and nothing touches the filesystem.
pub fn render_str(input: &str, answers: &AnswerSet, origin: &str) -> Result<String, EngineError> {
    let elements = TemplateParser::parse(input)?;
    render_elements(&elements, answers, origin)
}

/// Render a path expression and validate the result stays inside the project
///
/// Variable-driven path segments are allowed; a rendered path that is empty,
/// absolute, or contains `..` components is rejected rather than written
/// outside the target directory.
pub fn render_path(
    expression: &str,
    answers: &AnswerSet,
    origin: &str,
) -> Result<PathBuf, EngineError> {
    let rendered = render_str(expression, answers, origin)?;
    if rendered.trim().is_empty() {
        return Err(EngineError::Pack(format!(
            "rule `{}` rendered an empty output path",
            origin
        )));
    }

    let path = PathBuf::from(&rendered);
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(EngineError::Pack(format!(
                    "rule `{}` rendered path `{}` which escapes the project root",
                    origin, rendered
                )));
            }
        }
    }
    Ok(path)
}

fn render_elements(
    elements: &[Element],
    answers: &AnswerSet,
    origin: &str,
) -> Result<String, EngineError> {
    let mut output = String::new();
    for element in elements {
        match element {
            Element::Text(text) => output.push_str(text),
            Element::Placeholder { name, filter } => {
                let value = answers
                    .get(name)
                    .ok_or_else(|| EngineError::MissingVariable {
                        variable: name.clone(),
                        path: origin.to_string(),
                    })?;
                match filter {
                    Some(filter) => output.push_str(&filter.apply(value)),
                    None => output.push_str(value),
                }
            }
            Element::Conditional { condition, body } => {
                if condition.eval(answers) {
                    output.push_str(&render_elements(body, answers, origin)?);
                }
            }
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn answers(pairs: &[(&str, &str)]) -> AnswerSet {
        let values: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AnswerSet::from_values(values)
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let env = answers(&[("name", "demo"), ("author", "Sam")]);
        let out = render_str("{{name}} by {{author}}", &env, "README.md").unwrap();
        assert_eq!(out, "demo by Sam");
    }

    #[test]
    fn test_render_applies_case_filters() {
        let env = answers(&[("project_name", "my demo app")]);
        let out = render_str("{{project_name:snake}}", &env, "x").unwrap();
        assert_eq!(out, "my_demo_app");
    }

    #[test]
    fn test_render_conditional_region_included() {
        let env = answers(&[("use_ci", "true")]);
        let out = render_str("base{{#if use_ci}} +ci{{/if}}", &env, "x").unwrap();
        assert_eq!(out, "base +ci");
    }

    #[test]
    fn test_render_conditional_region_excluded() {
        let env = answers(&[("use_ci", "false")]);
        let out = render_str("base{{#if use_ci}} +ci{{/if}}", &env, "x").unwrap();
        assert_eq!(out, "base");
    }

    #[test]
    fn test_missing_variable_names_variable_and_path() {
        let env = answers(&[]);
        let err = render_str("{{ghost}}", &env, "src/lib.rs").unwrap_err();
        match err {
            EngineError::MissingVariable { variable, path } => {
                assert_eq!(variable, "ghost");
                assert_eq!(path, "src/lib.rs");
            }
            other => panic!("expected missing variable, got {:?}", other),
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let env = answers(&[("a", "1"), ("b", "2")]);
        let template = "{{a}}-{{b}}{{#if a}}!{{/if}}";
        let first = render_str(template, &env, "x").unwrap();
        for _ in 0..5 {
            assert_eq!(render_str(template, &env, "x").unwrap(), first);
        }
    }

    #[test]
    fn test_render_path_with_variable_segment() {
        let env = answers(&[("crate_name", "demo_app")]);
        let path = render_path("src/{{crate_name}}/lib.rs", &env, "x").unwrap();
        assert_eq!(path, PathBuf::from("src/demo_app/lib.rs"));
    }

    #[test]
    fn test_render_path_rejects_traversal() {
        let env = answers(&[("name", "..")]);
        assert!(render_path("{{name}}/escape.txt", &env, "x").is_err());
    }

    #[test]
    fn test_render_path_rejects_absolute() {
        let env = answers(&[]);
        assert!(render_path("/etc/passwd", &env, "x").is_err());
    }

    #[test]
    fn test_render_path_rejects_empty() {
        let env = answers(&[("name", "")]);
        assert!(render_path("{{name}}", &env, "x").is_err());
    }
}
