//! Schema model for the provider configuration, resources, data sources and
//! functions.
//!
//! A [`Schema`] is the single description of an object's attributes. The
//! validator, the planner and the documentation all read it; resources never
//! re-state which attributes are required or computed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of an attribute or function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// UTF-8 string.
    String,
    /// Whole number.
    Int64,
    /// `true` or `false`.
    Bool,
    /// Ordered values of one type.
    List(Box<AttributeType>),
    /// Unique values of one type, carried as a JSON array.
    Set(Box<AttributeType>),
    /// String keys to values of one type.
    Map(Box<AttributeType>),
    /// Fixed fields, each with its own type. Fields may be omitted.
    Object(BTreeMap<String, AttributeType>),
    /// Any JSON value. Used for opaque payloads such as warehouse settings.
    Dynamic,
}

impl AttributeType {
    /// `list(element_type)`
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// `set(element_type)`
    pub fn set(element_type: AttributeType) -> Self {
        Self::Set(Box::new(element_type))
    }

    /// `map(element_type)`
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }

    /// An object type from `(field, type)` pairs.
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, AttributeType)>,
        K: Into<String>,
    {
        Self::Object(
            fields
                .into_iter()
                .map(|(name, field_type)| (name.into(), field_type))
                .collect(),
        )
    }

    /// A set of strings: member UUIDs, tags.
    pub fn string_set() -> Self {
        Self::set(Self::String)
    }

    /// A list of strings.
    pub fn string_list() -> Self {
        Self::list(Self::String)
    }

    /// Short name used in diagnostics, e.g. `set`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int64 => "int64",
            Self::Bool => "bool",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Dynamic => "dynamic",
        }
    }
}

/// Who sets an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// The configuration must set it.
    Required,
    /// The configuration may set it.
    Optional,
    /// Only the provider sets it.
    Computed,
    /// The configuration may set it; otherwise the provider does.
    OptionalComputed,
}

/// One attribute of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Who sets the value.
    pub presence: Presence,
    /// Hidden in plan output and logs.
    #[serde(default)]
    pub sensitive: bool,
    /// A change replaces the remote object instead of updating it.
    #[serde(default)]
    pub force_new: bool,
    /// Planned value when the configuration leaves the attribute null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Markdown description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Attribute {
    /// An attribute of `attr_type` with the given presence.
    pub fn new(attr_type: AttributeType, presence: Presence) -> Self {
        Self {
            attr_type,
            presence,
            sensitive: false,
            force_new: false,
            default: None,
            description: None,
        }
    }

    /// Required in configuration.
    pub fn required(attr_type: AttributeType) -> Self {
        Self::new(attr_type, Presence::Required)
    }

    /// Optional in configuration.
    pub fn optional(attr_type: AttributeType) -> Self {
        Self::new(attr_type, Presence::Optional)
    }

    /// Set only by the provider.
    pub fn computed(attr_type: AttributeType) -> Self {
        Self::new(attr_type, Presence::Computed)
    }

    /// Optional in configuration, filled in by the provider when omitted.
    pub fn optional_computed(attr_type: AttributeType) -> Self {
        Self::new(attr_type, Presence::OptionalComputed)
    }

    /// Required string.
    pub fn required_string() -> Self {
        Self::required(AttributeType::String)
    }

    /// Optional string.
    pub fn optional_string() -> Self {
        Self::optional(AttributeType::String)
    }

    /// Computed string, typically an ID or UUID.
    pub fn computed_string() -> Self {
        Self::computed(AttributeType::String)
    }

    /// Optional int64.
    pub fn optional_int64() -> Self {
        Self::optional(AttributeType::Int64)
    }

    /// Optional bool.
    pub fn optional_bool() -> Self {
        Self::optional(AttributeType::Bool)
    }

    /// Computed bool.
    pub fn computed_bool() -> Self {
        Self::computed(AttributeType::Bool)
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the remote object when this attribute changes.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Plan `default` when the configuration leaves the attribute null.
    ///
    /// An optional attribute with a default becomes optional-computed.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        if self.presence == Presence::Optional {
            self.presence = Presence::OptionalComputed;
        }
        self
    }

    /// Hide the value in plan output and logs.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Whether the configuration must set the attribute.
    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }

    /// Whether the configuration may set the attribute at all.
    pub fn is_configurable(&self) -> bool {
        self.presence != Presence::Computed
    }

    /// Whether the provider may fill the attribute in.
    pub fn is_computed(&self) -> bool {
        matches!(self.presence, Presence::Computed | Presence::OptionalComputed)
    }
}

/// Attributes of the provider configuration, a resource or a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Bumped when the state layout changes; see `upgrade_resource_state`.
    #[serde(default)]
    pub version: u64,
    /// Markdown description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    /// An empty schema at `version`.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            description: None,
            attributes: BTreeMap::new(),
        }
    }

    /// An empty schema at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add or replace an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Look up an attribute.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Names of sensitive attributes.
    pub fn sensitive_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|(_, attr)| attr.sensitive)
            .map(|(name, _)| name.as_str())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// A positional parameter of a provider-defined function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name used in diagnostics and documentation.
    pub name: String,
    /// Expected argument type.
    #[serde(rename = "type")]
    pub param_type: AttributeType,
    /// Whether `null` is accepted.
    #[serde(default)]
    pub allow_null: bool,
    /// Markdown description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Parameter {
    /// A parameter that rejects `null`.
    pub fn new(name: impl Into<String>, param_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            param_type,
            allow_null: false,
            description: None,
        }
    }

    /// Accept `null`.
    pub fn allow_null(mut self) -> Self {
        self.allow_null = true;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Signature of a provider-defined function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    /// One-line summary.
    pub summary: String,
    /// Markdown description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parameters in call order.
    pub parameters: Vec<Parameter>,
    /// Type of the result.
    pub return_type: AttributeType,
}

impl FunctionSchema {
    /// A signature with no parameters yet.
    pub fn new(summary: impl Into<String>, return_type: AttributeType) -> Self {
        Self {
            summary: summary.into(),
            description: None,
            parameters: Vec::new(),
            return_type,
        }
    }

    /// Append a parameter.
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Everything the provider serves, by type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Provider configuration block.
    #[serde(default)]
    pub provider: Schema,
    /// Resource schemas.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    /// Data source schemas.
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
    /// Function signatures.
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionSchema>,
}

impl ProviderSchema {
    /// An empty provider schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Add a data source.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }

    /// Add a function.
    pub fn with_function(mut self, name: impl Into<String>, function: FunctionSchema) -> Self {
        self.functions.insert(name.into(), function);
        self
    }
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Blocks the operation.
    Error,
    /// Reported, but the operation continues.
    Warning,
}

/// A problem reported back to the user, optionally tied to an attribute path
/// such as `access.0.space_role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: DiagnosticSeverity,
    /// Short summary.
    pub summary: String,
    /// Longer explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted attribute path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn new(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// An error.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, summary)
    }

    /// A warning.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, summary)
    }

    /// Attach a longer explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach the attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// `summary: detail (at path)`
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        if let Some(attribute) = &self.attribute {
            write!(f, " (at {})", attribute)?;
        }
        Ok(())
    }
}

/// Whether any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
