//! Template syntax parser
//!
//! Parses template text into an element tree, extracting placeholder
//! references and inline conditional regions. Placeholders are written
//! `{{name}}` or `{{name:filter}}` where `filter` is one of the case
//! transforms; conditional regions are `{{#if expr}}…{{/if}}` with the
//! condition grammar from [`crate::condition`].

use std::collections::BTreeSet;

use heck::{ToKebabCase, ToLowerCamelCase, ToPascalCase, ToSnakeCase};

use crate::{condition::Expr, error::EngineError};

/// Case transform applied to a placeholder value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFilter {
    /// snake_case
    Snake,
    /// PascalCase
    Pascal,
    /// camelCase
    Camel,
    /// kebab-case
    Kebab,
    /// UPPERCASE
    Upper,
    /// lowercase
    Lower,
}

impl CaseFilter {
    /// Look up a filter by its name in placeholder syntax
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "snake" => Some(CaseFilter::Snake),
            "pascal" => Some(CaseFilter::Pascal),
            "camel" => Some(CaseFilter::Camel),
            "kebab" => Some(CaseFilter::Kebab),
            "upper" => Some(CaseFilter::Upper),
            "lower" => Some(CaseFilter::Lower),
            _ => None,
        }
    }

    /// Apply the transform to a value
    pub fn apply(&self, input: &str) -> String {
        match self {
            CaseFilter::Snake => input.to_snake_case(),
            CaseFilter::Pascal => input.to_pascal_case(),
            CaseFilter::Camel => input.to_lower_camel_case(),
            CaseFilter::Kebab => input.to_kebab_case(),
            CaseFilter::Upper => input.to_uppercase(),
            CaseFilter::Lower => input.to_lowercase(),
        }
    }
}

/// A parsed template element
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Plain text
    Text(String),
    /// Placeholder with optional case filter: `{{name}}` / `{{name:snake}}`
    Placeholder {
        /// Referenced variable name
        name: String,
        /// Case transform, if any
        filter: Option<CaseFilter>,
    },
    /// Inline conditional region: `{{#if expr}}…{{/if}}`
    Conditional {
        /// Parsed inclusion condition
        condition: Expr,
        /// Elements rendered when the condition holds
        body: Vec<Element>,
    },
}

/// Template parser entry points
pub struct TemplateParser;

impl TemplateParser {
    /// Parse template text into an element tree
    pub fn parse(content: &str) -> Result<Vec<Element>, EngineError> {
        let mut parser = Parser::new(content);
        let elements = parser.parse_elements(None)?;
        Ok(elements)
    }

    /// Collect every variable name referenced by placeholders or conditions
    pub fn variables(elements: &[Element], out: &mut BTreeSet<String>) {
        for element in elements {
            match element {
                Element::Text(_) => {}
                Element::Placeholder { name, .. } => {
                    out.insert(name.clone());
                }
                Element::Conditional { condition, body } => {
                    condition.variables(out);
                    Self::variables(body, out);
                }
            }
        }
    }
}

/// Internal parser state machine
struct Parser {
    chars: Vec<char>,
    position: usize,
    line: usize,
}

impl Parser {
    fn new(content: &str) -> Self {
        Self {
            chars: content.chars().collect(),
            position: 0,
            line: 1,
        }
    }

    /// Parse elements until end of input or, inside a conditional, `{{/if}}`
    fn parse_elements(&mut self, until_end_of: Option<&str>) -> Result<Vec<Element>, EngineError> {
        let mut elements = Vec::new();

        while self.position < self.chars.len() {
            if self.starts_with("{{/") {
                match until_end_of {
                    Some(block) => {
                        self.expect(&format!("{{{{/{}}}}}", block))?;
                        return Ok(elements);
                    }
                    None => {
                        return Err(self.error("unmatched closing tag"));
                    }
                }
            }

            if self.starts_with("{{") {
                elements.push(self.parse_tag()?);
            } else {
                let text = self.parse_text();
                if !text.is_empty() {
                    elements.push(Element::Text(text));
                }
            }
        }

        match until_end_of {
            Some(block) => Err(self.error(&format!("unclosed {{{{#{}}}}}", block))),
            None => Ok(elements),
        }
    }

    fn parse_tag(&mut self) -> Result<Element, EngineError> {
        self.expect("{{")?;

        if self.peek() == Some('#') {
            self.position += 1;
            let keyword = self.read_word();
            if keyword != "if" {
                return Err(self.error(&format!("unknown block type `{}`", keyword)));
            }
            let condition_text = self.read_until("}}")?;
            self.expect("}}")?;
            let condition = Expr::parse(condition_text.trim())?;
            let body = self.parse_elements(Some("if"))?;
            return Ok(Element::Conditional { condition, body });
        }

        let inner = self.read_until("}}")?;
        self.expect("}}")?;
        let inner = inner.trim();
        if inner.is_empty() {
            return Err(self.error("empty placeholder"));
        }

        let (name, filter) = match inner.split_once(':') {
            Some((name, filter_name)) => {
                let filter = CaseFilter::from_name(filter_name.trim()).ok_or_else(|| {
                    self.error(&format!("unknown case filter `{}`", filter_name.trim()))
                })?;
                (name.trim(), Some(filter))
            }
            None => (inner, None),
        };

        if name.is_empty() || !is_identifier(name) {
            return Err(self.error(&format!("invalid placeholder name `{}`", name)));
        }

        Ok(Element::Placeholder {
            name: name.to_string(),
            filter,
        })
    }

    fn parse_text(&mut self) -> String {
        let mut text = String::new();
        while self.position < self.chars.len() {
            if self.starts_with("{{") {
                break;
            }
            let ch = self.chars[self.position];
            if ch == '\n' {
                self.line += 1;
            }
            text.push(ch);
            self.position += 1;
        }
        text
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                word.push(ch);
                self.position += 1;
            } else {
                break;
            }
        }
        word
    }

    fn read_until(&mut self, delimiter: &str) -> Result<String, EngineError> {
        let mut result = String::new();
        while self.position < self.chars.len() {
            if self.starts_with(delimiter) {
                return Ok(result);
            }
            let ch = self.chars[self.position];
            if ch == '\n' {
                self.line += 1;
            }
            result.push(ch);
            self.position += 1;
        }
        Err(self.error(&format!("unterminated tag, expected `{}`", delimiter)))
    }

    fn expect(&mut self, expected: &str) -> Result<(), EngineError> {
        if !self.starts_with(expected) {
            return Err(self.error(&format!("expected `{}`", expected)));
        }
        for _ in expected.chars() {
            if self.chars[self.position] == '\n' {
                self.line += 1;
            }
            self.position += 1;
        }
        Ok(())
    }

    fn starts_with(&self, prefix: &str) -> bool {
        let mut offset = self.position;
        for expected in prefix.chars() {
            match self.chars.get(offset) {
                Some(&ch) if ch == expected => offset += 1,
                _ => return false,
            }
        }
        true
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn error(&self, message: &str) -> EngineError {
        EngineError::Syntax {
            line: self.line,
            message: message.to_string(),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
