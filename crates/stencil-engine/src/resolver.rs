//! Variable resolution
//!
//! Turns raw user answers into the complete, validated, immutable
//! [`AnswerSet`] consumed by every later stage. Validation accumulates every
//! violation instead of stopping at the first, so one failed invocation gives
//! the caller a complete correction list. Derived variables are computed in
//! dependency order; a cycle is rejected before any computation runs.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use tracing::debug;

use crate::{
    error::{EngineError, FieldViolation},
    models::{AnswerSet, TemplatePack, VarKind, VariableDef},
    template::{render_str, TemplateParser},
};

/// Parse an answer into a boolean, accepting the common spellings
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Resolves raw answers against a template pack's variable definitions
pub struct AnswerResolver<'a> {
    pack: &'a TemplatePack,
}

impl<'a> AnswerResolver<'a> {
    /// Create a resolver for the given pack
    pub fn new(pack: &'a TemplatePack) -> Self {
        Self { pack }
    }

    /// Validate raw answers, apply defaults, compute derived variables, and
    /// freeze the result into an immutable answer set
    pub fn resolve(&self, raw: &BTreeMap<String, String>) -> Result<AnswerSet, EngineError> {
        let mut violations = Vec::new();
        let mut values: BTreeMap<String, String> = BTreeMap::new();

        for name in raw.keys() {
            match self.pack.variable(name) {
                None => violations.push(FieldViolation {
                    field: name.clone(),
                    message: "not declared by this template".to_string(),
                }),
                Some(def) if def.derived.is_some() => violations.push(FieldViolation {
                    field: name.clone(),
                    message: "derived variable, cannot be answered directly".to_string(),
                }),
                Some(_) => {}
            }
        }

        for def in self.pack.variables.iter().filter(|d| d.derived.is_none()) {
            let answer = raw.get(&def.name).cloned().or_else(|| def.default.clone());
            match answer {
                None => violations.push(FieldViolation {
                    field: def.name.clone(),
                    message: "required, no answer supplied".to_string(),
                }),
                Some(value) => match self.validate_value(def, &value)? {
                    Ok(normalized) => {
                        values.insert(def.name.clone(), normalized);
                    }
                    Err(violation) => violations.push(violation),
                },
            }
        }

        if !violations.is_empty() {
            return Err(EngineError::Validation(violations));
        }

        self.compute_derived(&mut values)?;

        debug!(variables = values.len(), "answer set resolved");
        Ok(AnswerSet::from_values(values))
    }

    /// Validate one raw value; the outer error is for broken templates, the
    /// inner result is the per-field accept/reject decision
    fn validate_value(
        &self,
        def: &VariableDef,
        value: &str,
    ) -> Result<Result<String, FieldViolation>, EngineError> {
        match def.kind {
            VarKind::Bool => match parse_bool(value) {
                Some(parsed) => Ok(Ok(parsed.to_string())),
                None => Ok(Err(FieldViolation {
                    field: def.name.clone(),
                    message: format!("`{}` is not a boolean", value),
                })),
            },
            VarKind::Enum => {
                if def.choices.iter().any(|c| c == value) {
                    Ok(Ok(value.to_string()))
                } else {
                    Ok(Err(FieldViolation {
                        field: def.name.clone(),
                        message: format!(
                            "`{}` is not one of: {}",
                            value,
                            def.choices.join(", ")
                        ),
                    }))
                }
            }
            VarKind::String => {
                if value.is_empty() && def.default.is_none() {
                    return Ok(Err(FieldViolation {
                        field: def.name.clone(),
                        message: "must not be empty".to_string(),
                    }));
                }
                if let Some(pattern) = &def.pattern {
                    let regex = Regex::new(pattern).map_err(|e| {
                        EngineError::Pack(format!(
                            "variable `{}` has an invalid pattern: {}",
                            def.name, e
                        ))
                    })?;
                    if !regex.is_match(value) {
                        return Ok(Err(FieldViolation {
                            field: def.name.clone(),
                            message: format!("`{}` does not match `{}`", value, pattern),
                        }));
                    }
                }
                Ok(Ok(value.to_string()))
            }
        }
    }

    /// Compute derived variables in topological order (Kahn's algorithm)
    fn compute_derived(&self, values: &mut BTreeMap<String, String>) -> Result<(), EngineError> {
        let derived: Vec<&VariableDef> = self
            .pack
            .variables
            .iter()
            .filter(|d| d.derived.is_some())
            .collect();
        if derived.is_empty() {
            return Ok(());
        }

        let derived_names: BTreeSet<&str> =
            derived.iter().map(|d| d.name.as_str()).collect();

        // Edges run from a referenced derived variable to its dependent.
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for def in &derived {
            let expression = def.derived.as_deref().unwrap_or_default();
            let elements = TemplateParser::parse(expression)?;
            let mut refs = BTreeSet::new();
            TemplateParser::variables(&elements, &mut refs);

            let upstream: usize = refs
                .iter()
                .filter(|r| derived_names.contains(r.as_str()))
                .count();
            in_degree.insert(def.name.as_str(), upstream);
            for reference in &refs {
                if let Some(upstream_def) = derived.iter().find(|d| d.name == *reference) {
                    dependents
                        .entry(upstream_def.name.as_str())
                        .or_default()
                        .push(def.name.as_str());
                }
            }
        }

        let mut ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut resolved_count = 0usize;

        while let Some(name) = ready.pop() {
            let def = derived
                .iter()
                .find(|d| d.name == name)
                .expect("derived definition present");
            let expression = def.derived.as_deref().unwrap_or_default();
            let env = AnswerSet::from_values(values.clone());
            let computed = render_str(expression, &env, &def.name)?;
            values.insert(def.name.clone(), computed);
            resolved_count += 1;

            if let Some(next) = dependents.get(name) {
                for dependent in next {
                    let degree = in_degree.get_mut(dependent).expect("known dependent");
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(dependent);
                    }
                }
            }
            ready.sort_unstable();
        }

        if resolved_count < derived.len() {
            let mut chain: Vec<String> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(name, _)| name.to_string())
                .collect();
            chain.sort();
            return Err(EngineError::Cycle { chain });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileRule;
    use crate::policy::FileCategory;

    fn var(name: &str) -> VariableDef {
        VariableDef {
            name: name.to_string(),
            kind: VarKind::String,
            default: None,
            choices: Vec::new(),
            pattern: None,
            derived: None,
            prompt: None,
        }
    }

    fn pack(variables: Vec<VariableDef>) -> TemplatePack {
        TemplatePack {
            name: "test".to_string(),
            revision: 1,
            variables,
            files: vec![FileRule {
                path: "README.md".to_string(),
                content: "x".to_string(),
                when: None,
                category: FileCategory::AlwaysUpdate,
            }],
        }
    }

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolves_plain_answers() {
        let pack = pack(vec![var("project_name")]);
        let answers = AnswerResolver::new(&pack)
            .resolve(&raw(&[("project_name", "demo")]))
            .unwrap();
        assert_eq!(answers.get("project_name"), Some("demo"));
    }

    #[test]
    fn test_default_applies_when_unanswered() {
        let mut def = var("license");
        def.default = Some("mit".to_string());
        let pack = pack(vec![def]);
        let answers = AnswerResolver::new(&pack).resolve(&raw(&[])).unwrap();
        assert_eq!(answers.get("license"), Some("mit"));
    }

    #[test]
    fn test_all_violations_are_accumulated() {
        let mut flag = var("use_ci");
        flag.kind = VarKind::Bool;
        let mut license = var("license");
        license.kind = VarKind::Enum;
        license.choices = vec!["mit".to_string(), "apache".to_string()];
        let pack = pack(vec![var("project_name"), flag, license]);

        let err = AnswerResolver::new(&pack)
            .resolve(&raw(&[
                ("use_ci", "maybe"),
                ("license", "gpl"),
                ("bogus", "1"),
            ]))
            .unwrap_err();

        match err {
            EngineError::Validation(violations) => {
                let fields: Vec<&str> =
                    violations.iter().map(|v| v.field.as_str()).collect();
                assert!(fields.contains(&"project_name"));
                assert!(fields.contains(&"use_ci"));
                assert!(fields.contains(&"license"));
                assert!(fields.contains(&"bogus"));
                assert_eq!(violations.len(), 4);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_bool_spellings_normalize() {
        let mut def = var("use_ci");
        def.kind = VarKind::Bool;
        let pack = pack(vec![def]);
        let answers = AnswerResolver::new(&pack)
            .resolve(&raw(&[("use_ci", "Yes")]))
            .unwrap();
        assert_eq!(answers.get("use_ci"), Some("true"));
    }

    #[test]
    fn test_pattern_is_enforced() {
        let mut def = var("project_name");
        def.pattern = Some("^[a-z][a-z0-9_]*$".to_string());
        let pack = pack(vec![def]);
        assert!(AnswerResolver::new(&pack)
            .resolve(&raw(&[("project_name", "9bad name")]))
            .is_err());
    }

    #[test]
    fn test_derived_computed_in_dependency_order() {
        let mut crate_name = var("crate_name");
        crate_name.derived = Some("{{project_name:snake}}".to_string());
        let mut lib_header = var("lib_header");
        lib_header.derived = Some("//! {{crate_name}}".to_string());
        let pack = pack(vec![var("project_name"), lib_header, crate_name]);

        let answers = AnswerResolver::new(&pack)
            .resolve(&raw(&[("project_name", "My Demo")]))
            .unwrap();
        assert_eq!(answers.get("crate_name"), Some("my_demo"));
        assert_eq!(answers.get("lib_header"), Some("//! my_demo"));
    }

    #[test]
    fn test_derivation_cycle_is_rejected() {
        let mut a = var("a");
        a.derived = Some("{{b}}".to_string());
        let mut b = var("b");
        b.derived = Some("{{a}}".to_string());
        let pack = pack(vec![a, b]);

        let err = AnswerResolver::new(&pack).resolve(&raw(&[])).unwrap_err();
        match err {
            EngineError::Cycle { chain } => {
                assert_eq!(chain, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_answering_a_derived_variable_is_rejected() {
        let mut derived = var("crate_name");
        derived.derived = Some("{{project_name:snake}}".to_string());
        let pack = pack(vec![var("project_name"), derived]);

        let err = AnswerResolver::new(&pack)
            .resolve(&raw(&[("project_name", "demo"), ("crate_name", "override")]))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let mut c = var("c");
        c.derived = Some("{{a}}-{{b}}".to_string());
        let pack = pack(vec![var("a"), var("b"), c]);
        let input = raw(&[("a", "1"), ("b", "2")]);

        let first = AnswerResolver::new(&pack).resolve(&input).unwrap();
        for _ in 0..5 {
            assert_eq!(AnswerResolver::new(&pack).resolve(&input).unwrap(), first);
        }
    }
}
