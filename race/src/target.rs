use std::{fmt, sync::Arc};

const PLACEHOLDER: &str = "{id}";

pub const DEFAULT_TEMPLATES: [&str; 2] = [
    "https://cdn.apicep.com/file/apicep/{id}.json",
    "http://viacep.com.br/ws/{id}/json/",
];

/// An endpoint address. Not validated until a request is built from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(Arc<str>);

impl Target {
    pub fn new(address: impl Into<Arc<str>>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Target {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A target address with an `{id}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTemplate {
    name: Option<String>,
    template: String,
}

impl TargetTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            name: None,
            template: template.into(),
        }
    }

    pub fn named(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            template: template.into(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn has_placeholder(&self) -> bool {
        self.template.contains(PLACEHOLDER)
    }

    pub fn render(&self, id: &str) -> Target {
        Target::new(self.template.replace(PLACEHOLDER, id))
    }

    pub fn defaults() -> Vec<TargetTemplate> {
        DEFAULT_TEMPLATES.into_iter().map(TargetTemplate::new).collect()
    }
}

pub fn render_all(templates: &[TargetTemplate], id: &str) -> Vec<Target> {
    templates
        .iter()
        .map(|template| {
            let target = template.render(id);
            tracing::debug!(
                target: "race",
                provider = template.name().unwrap_or("unnamed"),
                url = %target,
                "rendered target"
            );
            target
        })
        .collect()
}
