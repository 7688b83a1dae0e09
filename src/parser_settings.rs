//! Settings forms generated from a parser/extractor's JSON-schema-like description.
//!
//! Each property becomes one control chosen by its type. Numeric inputs accept any
//! keystrokes and only flag out-of-range values; clamping happens when the field
//! loses focus.

use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::error::FieldError;

/// Shown first, in this order, whenever the schema has them.
pub const PINNED_KEYS: [&str; 3] = ["chunk_size", "chunk_overlap", "chunk_strategy"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyType {
    Boolean,
    String,
    Integer,
    Number,
    Array,
    #[default]
    Other,
}

impl PropertyType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "boolean" => Some(PropertyType::Boolean),
            "string" => Some(PropertyType::String),
            "integer" => Some(PropertyType::Integer),
            "number" => Some(PropertyType::Number),
            "array" => Some(PropertyType::Array),
            "null" => None,
            _ => Some(PropertyType::Other),
        }
    }
}

/// `"type": "integer"` or `"type": ["integer", "null"]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeSpec {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawProperty {
    #[serde(rename = "type")]
    kind: Option<TypeSpec>,
    #[serde(rename = "enum")]
    choices: Option<Vec<Value>>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    default: Option<Value>,
    description: Option<String>,
    #[serde(default)]
    nullable: bool,
    items: Option<Box<RawProperty>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaProperty {
    pub kind: PropertyType,
    pub choices: Option<Vec<String>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub nullable: bool,
    /// Element type for arrays.
    pub items: PropertyType,
}

impl From<RawProperty> for SchemaProperty {
    fn from(raw: RawProperty) -> Self {
        let (kind, null_in_type) = match raw.kind {
            Some(TypeSpec::One(t)) => (PropertyType::parse(&t).unwrap_or_default(), t == "null"),
            Some(TypeSpec::Many(types)) => (
                types.iter().find_map(|t| PropertyType::parse(t)).unwrap_or_default(),
                types.iter().any(|t| t == "null"),
            ),
            None => (PropertyType::Other, false),
        };
        let items = raw
            .items
            .map(|i| SchemaProperty::from(*i).kind)
            .unwrap_or(PropertyType::String);
        Self {
            kind,
            choices: raw.choices.map(|c| {
                c.into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect()
            }),
            minimum: raw.minimum,
            maximum: raw.maximum,
            default: raw.default,
            description: raw.description,
            nullable: raw.nullable || null_in_type,
            items,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    properties: Map<String, Value>,
}

/// Properties keep the order they appear in the schema.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawSchema")]
pub struct ParserSchema {
    pub title: Option<String>,
    pub properties: Vec<(String, SchemaProperty)>,
}

impl TryFrom<RawSchema> for ParserSchema {
    type Error = serde_json::Error;

    fn try_from(raw: RawSchema) -> Result<Self, Self::Error> {
        let properties = raw
            .properties
            .into_iter()
            .map(|(k, v)| Ok((k, SchemaProperty::from(serde_json::from_value::<RawProperty>(v)?))))
            .collect::<Result<_, serde_json::Error>>()?;
        Ok(Self { title: raw.title, properties })
    }
}

impl ParserSchema {
    pub fn property(&self, key: &str) -> Option<&SchemaProperty> {
        self.properties.iter().find(|(k, _)| k == key).map(|(_, p)| p)
    }
}

/// Field keys grouped into display rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Layout {
    pub pinned: Vec<String>,
    pub toggles: Vec<String>,
    pub rest: Vec<String>,
}

impl Layout {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pinned.iter().chain(&self.toggles).chain(&self.rest).map(String::as_str)
    }
}

/// Pinned chunking keys first, then booleans, then everything else in schema order.
pub fn layout(schema: &ParserSchema) -> Layout {
    let mut layout = Layout::default();
    for key in PINNED_KEYS {
        if schema.property(key).is_some() {
            layout.pinned.push(key.to_string());
        }
    }
    for (key, prop) in &schema.properties {
        if PINNED_KEYS.contains(&key.as_str()) {
            continue;
        }
        if prop.kind == PropertyType::Boolean {
            layout.toggles.push(key.clone());
        } else {
            layout.rest.push(key.clone());
        }
    }
    layout
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericInput {
    pub text: String,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub integer: bool,
}

impl NumericInput {
    pub fn new(prop: &SchemaProperty) -> Self {
        Self {
            text: String::new(),
            minimum: prop.minimum,
            maximum: prop.maximum,
            integer: prop.kind == PropertyType::Integer,
        }
    }

    /// Keeps what was typed. Integer fields drop anything from the first character
    /// that cannot belong to an integer.
    pub fn type_text(&mut self, text: &str) {
        if !self.integer {
            self.text = text.trim().to_string();
            return;
        }
        let mut out = String::new();
        for (i, c) in text.trim().chars().enumerate() {
            if c.is_ascii_digit() || (i == 0 && c == '-') {
                out.push(c);
            } else {
                break;
            }
        }
        self.text = out;
    }

    pub fn value(&self) -> Option<f64> {
        self.text.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Flagged while typing; not corrected until blur.
    pub fn out_of_bounds(&self) -> bool {
        let Some(v) = self.value() else {
            return false;
        };
        self.minimum.is_some_and(|min| v < min) || self.maximum.is_some_and(|max| v > max)
    }

    /// Clamps into range and normalizes the text.
    pub fn blur(&mut self) {
        let Some(mut v) = self.value() else {
            if self.text != "-" {
                return;
            }
            self.text.clear();
            return;
        };
        if let Some(min) = self.minimum {
            v = v.max(min);
        }
        if let Some(max) = self.maximum {
            v = v.min(max);
        }
        self.text = if self.integer { format!("{}", v.trunc() as i64) } else { format!("{v}") };
    }

    pub fn json(&self) -> Option<Value> {
        let v = self.value()?;
        if self.integer {
            return Some(Value::from(v.trunc() as i64));
        }
        Number::from_f64(v).map(Value::Number)
    }
}

/// Comma-separated text to a list. An empty list is `null` for nullable fields.
pub fn parse_list(text: &str, items: PropertyType, nullable: bool) -> Value {
    let values: Vec<Value> = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match items {
            PropertyType::Integer => s.parse::<i64>().map(Value::from).unwrap_or_else(|_| Value::from(s)),
            PropertyType::Number => s
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::from(s)),
            PropertyType::Boolean => s.parse::<bool>().map(Value::from).unwrap_or_else(|_| Value::from(s)),
            _ => Value::from(s),
        })
        .collect();
    if values.is_empty() && nullable {
        Value::Null
    } else {
        Value::Array(values)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Toggle(bool),
    Select { options: Vec<String>, value: Option<String> },
    Numeric(NumericInput),
    List { text: String, items: PropertyType, nullable: bool },
    Text { value: String, nullable: bool },
}

impl Control {
    pub fn for_property(prop: &SchemaProperty, current: Option<&Value>) -> Self {
        let value = current.or(prop.default.as_ref()).filter(|v| !v.is_null());
        match (prop.kind, &prop.choices) {
            (PropertyType::Boolean, _) => Control::Toggle(value.and_then(Value::as_bool).unwrap_or(false)),
            (PropertyType::String, Some(options)) => Control::Select {
                options: options.clone(),
                value: value.and_then(Value::as_str).map(str::to_string),
            },
            (PropertyType::Integer | PropertyType::Number, _) => {
                let mut input = NumericInput::new(prop);
                input.text = match value {
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::String(s)) => s.clone(),
                    _ => String::new(),
                };
                Control::Numeric(input)
            }
            (PropertyType::Array, _) => Control::List {
                text: match value {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect::<Vec<_>>()
                        .join(", "),
                    _ => String::new(),
                },
                items: prop.items,
                nullable: prop.nullable,
            },
            _ => Control::Text {
                value: match value {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                },
                nullable: prop.nullable,
            },
        }
    }

    pub fn json(&self) -> Value {
        match self {
            Control::Toggle(on) => Value::Bool(*on),
            Control::Select { value, .. } => value.clone().map(Value::String).unwrap_or(Value::Null),
            Control::Numeric(input) => input.json().unwrap_or(Value::Null),
            Control::List { text, items, nullable } => parse_list(text, *items, *nullable),
            Control::Text { value, nullable } if value.is_empty() && *nullable => Value::Null,
            Control::Text { value, .. } => Value::String(value.clone()),
        }
    }
}

/// Live state of one settings form.
#[derive(Debug, Clone)]
pub struct ParserSettingsForm {
    layout: Layout,
    controls: Vec<(String, Control)>,
    focused: Option<String>,
}

impl ParserSettingsForm {
    pub fn new(schema: &ParserSchema, current: &Map<String, Value>) -> Self {
        let layout = layout(schema);
        let controls = layout
            .keys()
            .filter_map(|key| {
                let prop = schema.property(key)?;
                Some((key.to_string(), Control::for_property(prop, current.get(key))))
            })
            .collect();
        Self { layout, controls, focused: None }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Controls in display order.
    pub fn controls(&self) -> impl Iterator<Item = (&str, &Control)> {
        self.controls.iter().map(|(k, c)| (k.as_str(), c))
    }

    pub fn control(&self, key: &str) -> Option<&Control> {
        self.controls.iter().find(|(k, _)| k == key).map(|(_, c)| c)
    }

    fn control_mut(&mut self, key: &str) -> Option<&mut Control> {
        self.controls.iter_mut().find(|(k, _)| k == key).map(|(_, c)| c)
    }

    /// Focuses `key` (blurring any other field) and applies typed text.
    pub fn input(&mut self, key: &str, text: &str) -> Result<(), FieldError> {
        if self.focused.as_deref() != Some(key) {
            self.blur();
        }
        let control = self
            .control_mut(key)
            .ok_or_else(|| FieldError::new("settings", format!("Unknown setting '{key}'")))?;
        match control {
            Control::Toggle(on) => {
                *on = match text.trim().to_lowercase().as_str() {
                    "true" | "on" | "yes" | "1" => true,
                    "false" | "off" | "no" | "0" => false,
                    _ => return Err(FieldError::new("settings", format!("'{key}' expects true or false"))),
                };
            }
            Control::Select { options, value } => {
                let text = text.trim();
                if text.is_empty() {
                    *value = None;
                } else if options.iter().any(|o| o == text) {
                    *value = Some(text.to_string());
                } else {
                    return Err(FieldError::new(
                        "settings",
                        format!("'{key}' must be one of: {}", options.join(", ")),
                    ));
                }
            }
            Control::Numeric(input) => input.type_text(text),
            Control::List { text: current, .. } => *current = text.to_string(),
            Control::Text { value, .. } => *value = text.to_string(),
        }
        self.focused = Some(key.to_string());
        Ok(())
    }

    pub fn blur(&mut self) {
        let Some(key) = self.focused.take() else {
            return;
        };
        if let Some(Control::Numeric(input)) = self.control_mut(&key) {
            input.blur();
        }
    }

    /// Keys whose numeric value is currently out of range.
    pub fn flagged(&self) -> Vec<&str> {
        self.controls
            .iter()
            .filter(|(_, c)| matches!(c, Control::Numeric(input) if input.out_of_bounds()))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// The config object in display order.
    pub fn values(&self) -> Map<String, Value> {
        self.controls.iter().map(|(k, c)| (k.clone(), c.json())).collect()
    }
}
