//! Validation of function arguments against their JSON schema.
//!
//! Schemas are compiled once into a tree of [`Node`]s by a [`SchemaCompiler`] and
//! the result is reused for every call. The built-in [`JsonSchemaCompiler`] covers
//! the subset of JSON Schema used to describe function parameters. Annotations such
//! as `description` or `title` are ignored; any other keyword it does not implement
//! is a compile error, so a schema is never silently weakened.
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::errors::SchemaViolation;

/// A compiled schema that can check instances
pub trait Validator: Send + Sync {
    /// Returns every violation found, or `Ok(())` if the instance matches
    fn validate(&self, instance: &Value) -> Result<(), Vec<SchemaViolation>>;
}

/// Turns a schema document into a reusable [`Validator`]
pub trait SchemaCompiler: Send + Sync {
    fn compile(&self, schema: &Value) -> Result<Arc<dyn Validator>, SchemaError>;
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at {path}")]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    fn new<S: Into<String>>(path: &str, message: S) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// The default schema engine
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaCompiler;

impl SchemaCompiler for JsonSchemaCompiler {
    fn compile(&self, schema: &Value) -> Result<Arc<dyn Validator>, SchemaError> {
        Ok(Arc::new(Node::compile(schema, "#")?))
    }
}

/// Keywords that carry no constraint
const ANNOTATIONS: &[&str] = &[
    "description",
    "title",
    "default",
    "examples",
    "deprecated",
    "readOnly",
    "writeOnly",
    "$schema",
    "$id",
    "$comment",
];

const KEYWORDS: &[&str] = &[
    "type",
    "properties",
    "required",
    "additionalProperties",
    "minProperties",
    "maxProperties",
    "items",
    "minItems",
    "maxItems",
    "uniqueItems",
    "enum",
    "const",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "null" => Some(JsonType::Null),
            "boolean" => Some(JsonType::Boolean),
            "integer" => Some(JsonType::Integer),
            "number" => Some(JsonType::Number),
            "string" => Some(JsonType::String),
            "array" => Some(JsonType::Array),
            "object" => Some(JsonType::Object),
            _ => None,
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            JsonType::Null => value.is_null(),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Integer => match value {
                Value::Number(n) => {
                    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
                }
                _ => false,
            },
            JsonType::Number => value.is_number(),
            JsonType::String => value.is_string(),
            JsonType::Array => value.is_array(),
            JsonType::Object => value.is_object(),
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
enum Additional {
    Allow,
    Deny,
    Schema(Box<Node>),
}

#[derive(Debug)]
struct Node {
    schema_path: String,
    reject_all: bool,
    types: Option<Vec<JsonType>>,
    properties: Vec<(String, Node)>,
    required: Vec<String>,
    additional: Additional,
    min_properties: Option<usize>,
    max_properties: Option<usize>,
    items: Option<Box<Node>>,
    unique_items: bool,
    allowed: Option<Vec<Value>>,
    constant: Option<Value>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    exclusive_minimum: Option<f64>,
    exclusive_maximum: Option<f64>,
    multiple_of: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min_items: Option<usize>,
    max_items: Option<usize>,
    pattern: Option<Regex>,
    all_of: Vec<Node>,
    any_of: Vec<Node>,
    one_of: Vec<Node>,
    not: Option<Box<Node>>,
}

impl Node {
    fn permissive(schema_path: &str) -> Self {
        Node {
            schema_path: schema_path.to_string(),
            reject_all: false,
            types: None,
            properties: Vec::new(),
            required: Vec::new(),
            additional: Additional::Allow,
            min_properties: None,
            max_properties: None,
            items: None,
            unique_items: false,
            allowed: None,
            constant: None,
            minimum: None,
            maximum: None,
            exclusive_minimum: None,
            exclusive_maximum: None,
            multiple_of: None,
            min_length: None,
            max_length: None,
            min_items: None,
            max_items: None,
            pattern: None,
            all_of: Vec::new(),
            any_of: Vec::new(),
            one_of: Vec::new(),
            not: None,
        }
    }

    fn compile(schema: &Value, path: &str) -> Result<Self, SchemaError> {
        let object = match schema {
            Value::Bool(accept) => {
                let mut node = Node::permissive(path);
                node.reject_all = !accept;
                return Ok(node);
            }
            Value::Object(object) => object,
            _ => return Err(SchemaError::new(path, "schema must be an object or a boolean")),
        };

        if let Some(keyword) = object
            .keys()
            .find(|k| !KEYWORDS.contains(&k.as_str()) && !ANNOTATIONS.contains(&k.as_str()))
        {
            return Err(SchemaError::new(
                path,
                format!("unsupported keyword \"{}\"", keyword),
            ));
        }

        let mut node = Node::permissive(path);
        node.types = compile_types(object, path)?;

        if let Some(properties) = object.get("properties") {
            let properties = properties
                .as_object()
                .ok_or_else(|| SchemaError::new(path, "properties must be an object"))?;
            for (name, sub) in properties {
                let sub_path = format!("{}/properties/{}", path, escape_pointer(name));
                node.properties
                    .push((name.clone(), Node::compile(sub, &sub_path)?));
            }
        }

        if let Some(required) = object.get("required") {
            let required = required
                .as_array()
                .ok_or_else(|| SchemaError::new(path, "required must be an array"))?;
            for name in required {
                let name = name
                    .as_str()
                    .ok_or_else(|| SchemaError::new(path, "required entries must be strings"))?;
                node.required.push(name.to_string());
            }
        }

        node.additional = match object.get("additionalProperties") {
            None | Some(Value::Bool(true)) => Additional::Allow,
            Some(Value::Bool(false)) => Additional::Deny,
            Some(sub) => Additional::Schema(Box::new(Node::compile(
                sub,
                &format!("{}/additionalProperties", path),
            )?)),
        };

        if let Some(items) = object.get("items") {
            if items.is_array() {
                return Err(SchemaError::new(path, "tuple items are not supported"));
            }
            node.items = Some(Box::new(Node::compile(items, &format!("{}/items", path))?));
        }
        match object.get("uniqueItems") {
            None => {}
            Some(Value::Bool(unique)) => node.unique_items = *unique,
            Some(_) => return Err(SchemaError::new(path, "uniqueItems must be a boolean")),
        }

        if let Some(allowed) = object.get("enum") {
            let allowed = allowed
                .as_array()
                .ok_or_else(|| SchemaError::new(path, "enum must be an array"))?;
            node.allowed = Some(allowed.clone());
        }
        node.constant = object.get("const").cloned();

        node.minimum = number_keyword(object, "minimum", path)?;
        node.maximum = number_keyword(object, "maximum", path)?;
        node.exclusive_minimum = number_keyword(object, "exclusiveMinimum", path)?;
        node.exclusive_maximum = number_keyword(object, "exclusiveMaximum", path)?;
        node.multiple_of = number_keyword(object, "multipleOf", path)?;
        if node.multiple_of.is_some_and(|m| m <= 0.0) {
            return Err(SchemaError::new(path, "multipleOf must be greater than 0"));
        }
        node.min_properties = count_keyword(object, "minProperties", path)?;
        node.max_properties = count_keyword(object, "maxProperties", path)?;
        node.min_length = count_keyword(object, "minLength", path)?;
        node.max_length = count_keyword(object, "maxLength", path)?;
        node.min_items = count_keyword(object, "minItems", path)?;
        node.max_items = count_keyword(object, "maxItems", path)?;

        if let Some(pattern) = object.get("pattern") {
            let pattern = pattern
                .as_str()
                .ok_or_else(|| SchemaError::new(path, "pattern must be a string"))?;
            let regex = Regex::new(pattern)
                .map_err(|e| SchemaError::new(path, format!("invalid pattern: {}", e)))?;
            node.pattern = Some(regex);
        }

        node.all_of = compile_list(object, "allOf", path)?;
        node.any_of = compile_list(object, "anyOf", path)?;
        node.one_of = compile_list(object, "oneOf", path)?;
        if let Some(not) = object.get("not") {
            node.not = Some(Box::new(Node::compile(not, &format!("{}/not", path))?));
        }

        Ok(node)
    }

    fn matches(&self, value: &Value, instance_path: &str) -> bool {
        let mut violations = Vec::new();
        self.check(value, instance_path, &mut violations);
        violations.is_empty()
    }

    fn check(&self, value: &Value, instance_path: &str, violations: &mut Vec<SchemaViolation>) {
        if self.reject_all {
            violations.push(SchemaViolation::new(
                instance_path,
                &self.schema_path,
                "false schema",
                "boolean schema is false",
            ));
            return;
        }

        if let Some(types) = &self.types {
            if !types.iter().any(|t| t.matches(value)) {
                let expected = types
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                violations.push(SchemaViolation::new(
                    instance_path,
                    format!("{}/type", self.schema_path),
                    "type",
                    format!("must be {}", expected),
                ));
                return;
            }
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.iter().any(|a| json_equal(a, value)) {
                violations.push(self.violation(
                    instance_path,
                    "enum",
                    "must be equal to one of the allowed values".to_string(),
                ));
            }
        }
        if let Some(constant) = &self.constant {
            if !json_equal(constant, value) {
                violations.push(self.violation(
                    instance_path,
                    "const",
                    "must be equal to constant".to_string(),
                ));
            }
        }

        self.check_combinators(value, instance_path, violations);

        match value {
            Value::Number(n) => self.check_number(n.as_f64(), instance_path, violations),
            Value::String(s) => self.check_string(s, instance_path, violations),
            Value::Array(items) => self.check_array(items, instance_path, violations),
            Value::Object(map) => self.check_object(map, instance_path, violations),
            _ => {}
        }
    }

    fn check_combinators(
        &self,
        value: &Value,
        instance_path: &str,
        violations: &mut Vec<SchemaViolation>,
    ) {
        for node in &self.all_of {
            node.check(value, instance_path, violations);
        }
        if !self.any_of.is_empty() && !self.any_of.iter().any(|n| n.matches(value, instance_path))
        {
            violations.push(self.violation(
                instance_path,
                "anyOf",
                "must match a schema in anyOf".to_string(),
            ));
        }
        if !self.one_of.is_empty() {
            let passing = self
                .one_of
                .iter()
                .filter(|n| n.matches(value, instance_path))
                .count();
            if passing != 1 {
                violations.push(self.violation(
                    instance_path,
                    "oneOf",
                    "must match exactly one schema in oneOf".to_string(),
                ));
            }
        }
        if let Some(not) = &self.not {
            if not.matches(value, instance_path) {
                violations.push(self.violation(
                    instance_path,
                    "not",
                    "must NOT be valid".to_string(),
                ));
            }
        }
    }

    fn check_number(
        &self,
        number: Option<f64>,
        instance_path: &str,
        violations: &mut Vec<SchemaViolation>,
    ) {
        let Some(number) = number else { return };
        if let Some(limit) = self.exclusive_minimum {
            if number <= limit {
                violations.push(self.violation(
                    instance_path,
                    "exclusiveMinimum",
                    format!("must be > {}", limit),
                ));
            }
        }
        if let Some(limit) = self.exclusive_maximum {
            if number >= limit {
                violations.push(self.violation(
                    instance_path,
                    "exclusiveMaximum",
                    format!("must be < {}", limit),
                ));
            }
        }
        if let Some(divisor) = self.multiple_of {
            let quotient = number / divisor;
            if quotient != quotient.trunc() {
                violations.push(self.violation(
                    instance_path,
                    "multipleOf",
                    format!("must be multiple of {}", divisor),
                ));
            }
        }
        if let Some(minimum) = self.minimum {
            if number < minimum {
                violations.push(self.violation(
                    instance_path,
                    "minimum",
                    format!("must be >= {}", minimum),
                ));
            }
        }
        if let Some(maximum) = self.maximum {
            if number > maximum {
                violations.push(self.violation(
                    instance_path,
                    "maximum",
                    format!("must be <= {}", maximum),
                ));
            }
        }
    }

    fn check_string(&self, s: &str, instance_path: &str, violations: &mut Vec<SchemaViolation>) {
        let length = s.chars().count();
        if let Some(min) = self.min_length {
            if length < min {
                violations.push(self.violation(
                    instance_path,
                    "minLength",
                    format!("must NOT have fewer than {} characters", min),
                ));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                violations.push(self.violation(
                    instance_path,
                    "maxLength",
                    format!("must NOT have more than {} characters", max),
                ));
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(s) {
                violations.push(self.violation(
                    instance_path,
                    "pattern",
                    format!("must match pattern \"{}\"", pattern.as_str()),
                ));
            }
        }
    }

    fn check_array(
        &self,
        items: &[Value],
        instance_path: &str,
        violations: &mut Vec<SchemaViolation>,
    ) {
        if let Some(min) = self.min_items {
            if items.len() < min {
                violations.push(self.violation(
                    instance_path,
                    "minItems",
                    format!("must NOT have fewer than {} items", min),
                ));
            }
        }
        if let Some(max) = self.max_items {
            if items.len() > max {
                violations.push(self.violation(
                    instance_path,
                    "maxItems",
                    format!("must NOT have more than {} items", max),
                ));
            }
        }
        if self.unique_items {
            let duplicate = items.iter().enumerate().find_map(|(i, item)| {
                items[..i]
                    .iter()
                    .position(|earlier| json_equal(earlier, item))
                    .map(|j| (j, i))
            });
            if let Some((j, i)) = duplicate {
                violations.push(self.violation(
                    instance_path,
                    "uniqueItems",
                    format!(
                        "must NOT have duplicate items (items ## {} and {} are identical)",
                        j, i
                    ),
                ));
            }
        }
        if let Some(node) = &self.items {
            for (index, item) in items.iter().enumerate() {
                node.check(item, &format!("{}/{}", instance_path, index), violations);
            }
        }
    }

    fn check_object(
        &self,
        map: &Map<String, Value>,
        instance_path: &str,
        violations: &mut Vec<SchemaViolation>,
    ) {
        if let Some(min) = self.min_properties {
            if map.len() < min {
                violations.push(self.violation(
                    instance_path,
                    "minProperties",
                    format!("must NOT have fewer than {} properties", min),
                ));
            }
        }
        if let Some(max) = self.max_properties {
            if map.len() > max {
                violations.push(self.violation(
                    instance_path,
                    "maxProperties",
                    format!("must NOT have more than {} properties", max),
                ));
            }
        }
        for name in &self.required {
            if !map.contains_key(name) {
                violations.push(self.violation(
                    instance_path,
                    "required",
                    format!("must have required property '{}'", name),
                ));
            }
        }

        for (key, value) in map {
            let child_path = format!("{}/{}", instance_path, escape_pointer(key));
            match self.properties.iter().find(|(name, _)| name == key) {
                Some((_, node)) => node.check(value, &child_path, violations),
                None => match &self.additional {
                    Additional::Allow => {}
                    Additional::Deny => violations.push(self.violation(
                        instance_path,
                        "additionalProperties",
                        format!("must NOT have additional property '{}'", key),
                    )),
                    Additional::Schema(node) => node.check(value, &child_path, violations),
                },
            }
        }
    }

    fn violation(&self, instance_path: &str, keyword: &str, message: String) -> SchemaViolation {
        SchemaViolation::new(
            instance_path,
            format!("{}/{}", self.schema_path, keyword),
            keyword,
            message,
        )
    }
}

impl Validator for Node {
    fn validate(&self, instance: &Value) -> Result<(), Vec<SchemaViolation>> {
        let mut violations = Vec::new();
        self.check(instance, "", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn compile_types(
    object: &Map<String, Value>,
    path: &str,
) -> Result<Option<Vec<JsonType>>, SchemaError> {
    let parse = |name: &Value| {
        name.as_str()
            .and_then(JsonType::parse)
            .ok_or_else(|| SchemaError::new(path, format!("unknown type {}", name)))
    };
    match object.get("type") {
        None => Ok(None),
        Some(Value::Array(names)) => names.iter().map(parse).collect::<Result<_, _>>().map(Some),
        Some(name) => Ok(Some(vec![parse(name)?])),
    }
}

fn number_keyword(
    object: &Map<String, Value>,
    keyword: &str,
    path: &str,
) -> Result<Option<f64>, SchemaError> {
    object
        .get(keyword)
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| SchemaError::new(path, format!("{} must be a number", keyword)))
        })
        .transpose()
}

fn count_keyword(
    object: &Map<String, Value>,
    keyword: &str,
    path: &str,
) -> Result<Option<usize>, SchemaError> {
    object
        .get(keyword)
        .map(|v| {
            v.as_u64().map(|n| n as usize).ok_or_else(|| {
                SchemaError::new(path, format!("{} must be a non-negative integer", keyword))
            })
        })
        .transpose()
}

fn compile_list(
    object: &Map<String, Value>,
    keyword: &str,
    path: &str,
) -> Result<Vec<Node>, SchemaError> {
    let Some(list) = object.get(keyword) else {
        return Ok(Vec::new());
    };
    let list = list
        .as_array()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| SchemaError::new(path, format!("{} must be a non-empty array", keyword)))?;
    list.iter()
        .enumerate()
        .map(|(i, sub)| Node::compile(sub, &format!("{}/{}/{}", path, keyword, i)))
        .collect()
}

/// Structural equality where numbers compare by value, so `1` equals `1.0`
fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, x)| y.get(key).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
