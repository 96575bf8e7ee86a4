use handlebars::{Handlebars, Helper, HelperResult, Output, RenderContext, RenderError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),
    #[error("Template syntax error: {0}")]
    Syntax(String),
    #[error("Template rendering error: {0}")]
    Rendering(#[from] RenderError),
    #[error("Variable validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub content: String,
    pub description: Option<String>,
    pub variables: Vec<TemplateVariable>,
}

impl Template {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            description: None,
            variables: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn require(mut self, names: &[&str]) -> Self {
        self.variables.extend(names.iter().map(|name| TemplateVariable {
            name: name.to_string(),
            required: true,
            description: None,
        }));
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub name: String,
    pub required: bool,
    pub description: Option<String>,
}

/// Named handlebars templates with required-variable checks. Output is plain
/// text, so HTML escaping is off.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
    templates: HashMap<String, Template>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars.register_helper("excerpt", Box::new(excerpt_helper));
        handlebars.register_helper("upper", Box::new(upper_helper));
        handlebars.register_helper("lower", Box::new(lower_helper));

        Self {
            handlebars,
            templates: HashMap::new(),
        }
    }

    pub fn register_template(&mut self, template: Template) -> Result<(), TemplateError> {
        self.handlebars
            .register_template_string(&template.name, &template.content)
            .map_err(|e| TemplateError::Syntax(format!("{}: {}", template.name, e)))?;

        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String, TemplateError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;

        let context = serde_json::to_value(context)?;
        validate_context(template, &context)?;

        Ok(self.handlebars.render(name, &context)?)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn list_templates(&self) -> Vec<&Template> {
        let mut templates: Vec<&Template> = self.templates.values().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        templates
    }

    /// Register every `*.hbs` file in `dir` under its file stem. A file whose
    /// stem matches an existing template replaces its content and keeps its
    /// declared variables. Returns how many files were loaded.
    pub fn load_from_dir(&mut self, dir: &Path) -> Result<usize, TemplateError> {
        let mut loaded = 0;

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("hbs") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let content = std::fs::read_to_string(&path)?;
            let template = match self.templates.get(name) {
                Some(existing) => Template {
                    content,
                    ..existing.clone()
                },
                None => Template::new(name, content),
            };

            self.register_template(template)?;
            tracing::debug!(template = name, path = %path.display(), "Loaded template override");
            loaded += 1;
        }

        Ok(loaded)
    }
}

fn validate_context(template: &Template, context: &Value) -> Result<(), TemplateError> {
    let context_obj = context
        .as_object()
        .ok_or_else(|| TemplateError::Validation("Context must be an object".to_string()))?;

    for var in template.variables.iter().filter(|var| var.required) {
        if !context_obj.contains_key(&var.name) {
            return Err(TemplateError::Validation(format!(
                "Required variable '{}' is missing for template '{}'",
                var.name, template.name
            )));
        }
    }

    Ok(())
}

/// First `n` characters of a string, with `...` appended when cut.
pub fn excerpt(text: &str, n: usize) -> String {
    match text.char_indices().nth(n) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn string_param<'a>(h: &'a Helper, name: &str) -> Result<&'a str, RenderError> {
    h.param(0)
        .ok_or_else(|| RenderError::new(format!("{} helper requires one parameter", name)))?
        .value()
        .as_str()
        .ok_or_else(|| RenderError::new(format!("{} helper parameter must be a string", name)))
}

fn excerpt_helper(
    h: &Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let value = string_param(h, "excerpt")?;
    let length = h
        .param(1)
        .and_then(|p| p.value().as_u64())
        .ok_or_else(|| RenderError::new("excerpt helper requires a length"))?;

    out.write(&excerpt(value, length as usize))?;
    Ok(())
}

fn upper_helper(
    h: &Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&string_param(h, "upper")?.to_uppercase())?;
    Ok(())
}

fn lower_helper(
    h: &Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&string_param(h, "lower")?.to_lowercase())?;
    Ok(())
}
