use crate::error::{Result, StorageError};
use crate::utils::validation::{file_extension, sanitize_filename, sanitize_segment};
use chrono::{Datelike, Utc};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

pub const ENTITY_TYPE: &str = "entity_type";
pub const ENTITY_ID: &str = "entity_id";

/// Auxiliary naming data supplied by the caller alongside an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatInfo {
    values: BTreeMap<String, String>,
}

impl FormatInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Info for files owned by a record, e.g. `("post", "42")`.
    pub fn for_entity(entity_type: impl Into<String>, entity_id: impl ToString) -> Self {
        Self::new()
            .with(ENTITY_TYPE, entity_type)
            .with(ENTITY_ID, entity_id.to_string())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.get(ENTITY_TYPE)
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.get(ENTITY_ID)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Strategy computing the storage key for one upload.
///
/// An instance holds the naming context of a single upload; the coordinator
/// hands every upload its own instance via [`PathFormatter::box_clone`].
pub trait PathFormatter: Send + Sync {
    /// Replace the naming context. Returns the formatter for chaining.
    fn set_info(&mut self, filename: &str, info: &FormatInfo) -> &mut dyn PathFormatter;

    /// Storage key for the current context.
    fn path(&self) -> Result<String>;

    /// A fresh instance with the same configuration.
    fn box_clone(&self) -> Box<dyn PathFormatter>;

    fn name(&self) -> &str;
}

/// `{YYYY}/{MM}/{random}.{ext}`: unique keys, info is ignored.
#[derive(Debug, Clone, Default)]
pub struct DefaultFormatter {
    filename: String,
}

impl DefaultFormatter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PathFormatter for DefaultFormatter {
    fn set_info(&mut self, filename: &str, _info: &FormatInfo) -> &mut dyn PathFormatter {
        self.filename = filename.to_string();
        self
    }

    fn path(&self) -> Result<String> {
        let now = Utc::now();
        let token = Uuid::new_v4().simple().to_string();
        // An extension that sanitizes to nothing is dropped.
        let ext = file_extension(&self.filename).and_then(|e| sanitize_segment(&e).ok());
        let name = match ext {
            Some(ext) => format!("{}.{}", token, ext),
            None => token,
        };
        Ok(format!("{:04}/{:02}/{}", now.year(), now.month(), name))
    }

    fn box_clone(&self) -> Box<dyn PathFormatter> {
        Box::new(Self::new())
    }

    fn name(&self) -> &str {
        "default"
    }
}

/// `{entity_type}/{entity_id}/{filename}`: groups files under the record
/// that owns them.
#[derive(Debug, Clone, Default)]
pub struct EntityFormatter {
    filename: String,
    info: FormatInfo,
}

impl EntityFormatter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PathFormatter for EntityFormatter {
    fn set_info(&mut self, filename: &str, info: &FormatInfo) -> &mut dyn PathFormatter {
        self.filename = filename.to_string();
        self.info = info.clone();
        self
    }

    fn path(&self) -> Result<String> {
        let entity_type = self.info.entity_type().ok_or_else(|| {
            StorageError::invalid_input("Entity formatter requires an 'entity_type'")
        })?;
        let entity_id = self.info.entity_id().ok_or_else(|| {
            StorageError::invalid_input("Entity formatter requires an 'entity_id'")
        })?;

        Ok(format!(
            "{}/{}/{}",
            sanitize_segment(entity_type)?,
            sanitize_segment(entity_id)?,
            sanitize_filename(&self.filename)?
        ))
    }

    fn box_clone(&self) -> Box<dyn PathFormatter> {
        Box::new(Self::new())
    }

    fn name(&self) -> &str {
        "entity"
    }
}

/// Names accepted by [`create_formatter`].
pub const BUILTIN_FORMATTERS: &[&str] = &["default", "entity"];

/// Resolves a built-in formatter by name.
pub fn create_formatter(name: &str) -> Result<Box<dyn PathFormatter>> {
    match name.trim().to_lowercase().as_str() {
        "default" | "" => Ok(Box::new(DefaultFormatter::new())),
        "entity" => Ok(Box::new(EntityFormatter::new())),
        other => Err(StorageError::configuration(format!(
            "Unknown formatter '{}' (expected one of: {})",
            other,
            BUILTIN_FORMATTERS.join(", ")
        ))),
    }
}

/// Formatter selection: a built-in by name, or a caller-supplied instance.
pub enum FormatterChoice {
    Named(String),
    Custom(Box<dyn PathFormatter>),
}

impl FormatterChoice {
    pub fn named(name: impl Into<String>) -> Self {
        FormatterChoice::Named(name.into())
    }

    pub fn custom(formatter: impl PathFormatter + 'static) -> Self {
        FormatterChoice::Custom(Box::new(formatter))
    }

    /// A fresh formatter instance for one upload. Unknown names fail here,
    /// on first use.
    pub fn resolve(&self) -> Result<Box<dyn PathFormatter>> {
        match self {
            FormatterChoice::Named(name) => create_formatter(name),
            FormatterChoice::Custom(formatter) => Ok(formatter.box_clone()),
        }
    }
}

impl Default for FormatterChoice {
    fn default() -> Self {
        FormatterChoice::Named("default".to_string())
    }
}

impl Clone for FormatterChoice {
    fn clone(&self) -> Self {
        match self {
            FormatterChoice::Named(name) => FormatterChoice::Named(name.clone()),
            FormatterChoice::Custom(formatter) => FormatterChoice::Custom(formatter.box_clone()),
        }
    }
}

impl fmt::Debug for FormatterChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatterChoice::Named(name) => f.debug_tuple("Named").field(name).finish(),
            FormatterChoice::Custom(formatter) => {
                f.debug_tuple("Custom").field(&formatter.name()).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_formatter_shape() {
        let mut formatter = DefaultFormatter::new();
        let path = formatter
            .set_info("Holiday Photo.JPG", &FormatInfo::new())
            .path()
            .unwrap();

        let parts: Vec<&str> = path.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 4);
        assert_eq!(parts[1].len(), 2);
        assert!(parts[2].ends_with(".jpg"));
        assert_eq!(parts[2].len(), 32 + 4);
    }

    #[test]
    fn test_default_formatter_is_unique_per_call() {
        let mut formatter = DefaultFormatter::new();
        formatter.set_info("a.txt", &FormatInfo::for_entity("post", 1));
        assert_ne!(formatter.path().unwrap(), formatter.path().unwrap());
    }

    #[test]
    fn test_default_formatter_without_extension() {
        let mut formatter = DefaultFormatter::new();
        let path = formatter.set_info("Makefile", &FormatInfo::new()).path().unwrap();
        assert!(!path.rsplit('/').next().unwrap().contains('.'));
    }

    #[test]
    fn test_default_formatter_drops_blank_extension() {
        let mut formatter = DefaultFormatter::new();
        let path = formatter.set_info("notes. ", &FormatInfo::new()).path().unwrap();
        let name = path.rsplit('/').next().unwrap();
        assert_eq!(name.len(), 32);
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_entity_formatter_is_deterministic() {
        let mut formatter = EntityFormatter::new();
        let info = FormatInfo::for_entity("post", 42);
        formatter.set_info("../cover:art.png", &info);
        assert_eq!(formatter.path().unwrap(), "post/42/cover_art.png");
        assert_eq!(formatter.path().unwrap(), formatter.path().unwrap());
    }

    #[test]
    fn test_entity_formatter_requires_info() {
        let mut formatter = EntityFormatter::new();
        let err = formatter
            .set_info("a.txt", &FormatInfo::new().with(ENTITY_TYPE, "post"))
            .path()
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));

        let err = formatter
            .set_info("a.txt", &FormatInfo::for_entity("..", 1))
            .path()
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));
    }

    #[test]
    fn test_create_formatter() {
        assert_eq!(create_formatter("default").unwrap().name(), "default");
        assert_eq!(create_formatter("Entity").unwrap().name(), "entity");
        assert!(matches!(
            create_formatter("flat"),
            Err(StorageError::Configuration(_))
        ));
    }

    #[test]
    fn test_choice_resolves_fresh_instances() {
        let mut template = EntityFormatter::new();
        template.set_info("kept.txt", &FormatInfo::for_entity("post", 1));
        let choice = FormatterChoice::custom(template);

        let resolved = choice.resolve().unwrap();
        assert!(resolved.path().is_err());

        let unknown = FormatterChoice::named("nope");
        assert!(matches!(
            unknown.resolve(),
            Err(StorageError::Configuration(_))
        ));
    }
}
