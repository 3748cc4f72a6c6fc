use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::FieldError;

/// A bookmark as stored and as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateBookmark {
    pub title: String,
    pub url: Url,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

/// A field in a partial update: left out, explicitly null, or given a value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Patch<T> {
    #[default]
    Missing,
    Null,
    Value(T),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateBookmark {
    pub title: Option<String>,
    pub url: Option<Url>,
    pub description: Patch<String>,
    pub tags: Option<Vec<String>>,
}

const DEFAULT_SKIP: u32 = 0;
const DEFAULT_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_skip")]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub tag: Option<String>,
}

fn default_skip() -> u32 {
    DEFAULT_SKIP
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl TryFrom<Value> for CreateBookmark {
    type Error = Vec<FieldError>;

    fn try_from(body: Value) -> Result<Self, Self::Error> {
        let mut fields = Fields::new(&body)?;

        let title = fields.required::<String>("title").and_then(|t| fields.non_empty("title", t));
        let url = fields
            .required::<String>("url")
            .and_then(|u| fields.http_url("url", &u));
        let description = match fields.optional::<String>("description") {
            Patch::Value(d) => Some(d),
            _ => None,
        };
        let tags = match fields.optional::<Vec<String>>("tags") {
            Patch::Value(tags) => tags,
            _ => vec![],
        };

        match (title, url, fields.finish()) {
            (Some(title), Some(url), Ok(())) => Ok(CreateBookmark {
                title,
                url,
                description,
                tags,
            }),
            (_, _, Err(errors)) => Err(errors),
            // a missing value always leaves an error behind
            _ => Err(vec![FieldError::body(&[], "invalid bookmark", "value_error")]),
        }
    }
}

impl TryFrom<Value> for UpdateBookmark {
    type Error = Vec<FieldError>;

    fn try_from(body: Value) -> Result<Self, Self::Error> {
        let mut fields = Fields::new(&body)?;

        let title = match fields.optional::<String>("title") {
            Patch::Value(t) => fields.non_empty("title", t),
            Patch::Null => fields.null_not_allowed("title"),
            Patch::Missing => None,
        };
        let url = match fields.optional::<String>("url") {
            Patch::Value(u) => fields.http_url("url", &u),
            Patch::Null => fields.null_not_allowed("url"),
            Patch::Missing => None,
        };
        let description = fields.optional::<String>("description");
        let tags = match fields.optional::<Vec<String>>("tags") {
            Patch::Value(tags) => Some(tags),
            Patch::Null => Some(vec![]),
            Patch::Missing => None,
        };

        fields.finish()?;

        Ok(UpdateBookmark {
            title,
            url,
            description,
            tags,
        })
    }
}

/// Walks a JSON object field by field, collecting every problem instead of
/// stopping at the first one.
struct Fields<'a> {
    obj: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> Fields<'a> {
    fn new(body: &'a Value) -> Result<Self, Vec<FieldError>> {
        match body {
            Value::Object(obj) => Ok(Fields { obj, errors: vec![] }),
            _ => Err(vec![FieldError::body(&[], "Input should be a valid object", "type_error")]),
        }
    }

    fn required<T: DeserializeOwned>(&mut self, name: &str) -> Option<T> {
        match self.lookup(name)? {
            Patch::Value(v) => Some(v),
            Patch::Missing => {
                self.errors.push(FieldError::body(&[name], "Field required", "missing"));
                None
            }
            Patch::Null => self.null_not_allowed(name),
        }
    }

    /// A value of the wrong type is reported here and then treated as absent.
    fn optional<T: DeserializeOwned>(&mut self, name: &str) -> Patch<T> {
        self.lookup(name).unwrap_or_default()
    }

    fn lookup<T: DeserializeOwned>(&mut self, name: &str) -> Option<Patch<T>> {
        match self.obj.get(name) {
            None => Some(Patch::Missing),
            Some(Value::Null) => Some(Patch::Null),
            Some(value) => match serde_json::from_value::<T>(value.clone()) {
                Ok(v) => Some(Patch::Value(v)),
                Err(e) => {
                    self.errors.push(FieldError::body(&[name], &e.to_string(), "type_error"));
                    None
                }
            },
        }
    }

    fn null_not_allowed<T>(&mut self, name: &str) -> Option<T> {
        self.errors
            .push(FieldError::body(&[name], "Field may not be null", "type_error"));
        None
    }

    fn non_empty(&mut self, name: &str, value: String) -> Option<String> {
        if value.is_empty() {
            self.errors.push(FieldError::body(
                &[name],
                "String should have at least 1 character",
                "string_too_short",
            ));
            return None;
        }
        Some(value)
    }

    fn http_url(&mut self, name: &str, raw: &str) -> Option<Url> {
        match Url::parse(raw) {
            Ok(url) if !matches!(url.scheme(), "http" | "https") => {
                self.errors.push(FieldError::body(
                    &[name],
                    "URL scheme should be 'http' or 'https'",
                    "url_scheme",
                ));
                None
            }
            Ok(url) if url.host_str().is_none_or(str::is_empty) => {
                self.errors
                    .push(FieldError::body(&[name], "URL should have a host", "url_parsing"));
                None
            }
            Ok(url) => Some(url),
            Err(e) => {
                self.errors.push(FieldError::body(
                    &[name],
                    &format!("Input should be a valid URL, {e}"),
                    "url_parsing",
                ));
                None
            }
        }
    }

    fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}
