//! Minimal stylesheet templating.
//!
//! Templates are plain CSS with `{{ name }}` placeholders. Names are
//! `[A-Za-z0-9_]+` and must exist in the palette at render time.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::palette::Palette;

/// Built-in card template, used when no template path is configured.
pub const DEFAULT_TEMPLATE: &str = include_str!("../../../assets/media-card.css.tmpl");

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = text;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                return Err(Error::TemplateSyntax {
                    offset: offset + start,
                    reason: "unterminated '{{'".to_string(),
                });
            };

            let name = after_open[..end].trim();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(Error::TemplateSyntax {
                    offset: offset + start,
                    reason: format!("invalid variable name '{name}'"),
                });
            }
            segments.push(Segment::Variable(name.to_string()));

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Read and parse a template file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// The built-in template.
    pub fn builtin() -> Result<Self> {
        Self::parse(DEFAULT_TEMPLATE)
    }

    /// Names of all referenced variables, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, palette: &Palette) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = palette
                        .get(name)
                        .ok_or_else(|| Error::TemplateVariable(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Render `template` with `palette` and write the result to `output`,
/// replacing any previous content. Parent directories are created.
pub fn render_template(palette: &Palette, template: &Template, output: &Path) -> Result<()> {
    let css = template.render(palette)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, css)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Palette {
        let mut p = Palette::new();
        p.insert("primary", "#ff0000");
        p.insert("surface", "#101010");
        p
    }

    #[test]
    fn test_render_substitutes_variables() {
        let template = Template::parse(".card { color: {{primary}}; background: {{ surface }}; }")
            .unwrap();
        assert_eq!(
            template.render(&palette()).unwrap(),
            ".card { color: #ff0000; background: #101010; }"
        );
    }

    #[test]
    fn test_literal_only_template() {
        let template = Template::parse("label { font-weight: bold; }").unwrap();
        assert_eq!(template.variables().count(), 0);
        assert_eq!(
            template.render(&Palette::new()).unwrap(),
            "label { font-weight: bold; }"
        );
    }

    #[test]
    fn test_unknown_variable_is_an_error() {
        let template = Template::parse("{{ nope }}").unwrap();
        match template.render(&palette()) {
            Err(Error::TemplateVariable(name)) => assert_eq!(name, "nope"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_placeholder() {
        match Template::parse("a { color: {{ primary ; }") {
            Err(Error::TemplateSyntax { offset, .. }) => assert_eq!(offset, 11),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_variable_name() {
        assert!(Template::parse("{{ a-b }}").is_err());
        assert!(Template::parse("{{   }}").is_err());
    }

    #[test]
    fn test_builtin_template_parses() {
        let template = Template::builtin().unwrap();
        let vars: Vec<&str> = template.variables().collect();
        assert!(vars.contains(&"card_class"));
        assert!(vars.contains(&"art_uri"));
        assert!(vars.contains(&"primary"));
    }

    #[test]
    fn test_render_template_overwrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested/out.css");
        let template = Template::parse("x { color: {{ primary }}; }").unwrap();

        render_template(&palette(), &template, &output).unwrap();
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "x { color: #ff0000; }"
        );

        let mut other = palette();
        other.insert("primary", "#00ff00");
        render_template(&other, &template, &output).unwrap();
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "x { color: #00ff00; }"
        );
    }
}
