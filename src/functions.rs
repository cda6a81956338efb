//! Provider-defined functions.
//!
//! Functions are pure: they never call the Lightdash API and work before the
//! provider is configured.

use serde_json::Value;

use crate::error::ProviderError;
use crate::members::{normalize_project_members, ProjectMembers};
use crate::schema::{AttributeType, FunctionSchema, Parameter};
use crate::validation;

/// A function callable from configuration as `provider::lightdash::<name>`.
pub trait Function: Send + Sync {
    /// Function name.
    fn name(&self) -> &'static str;

    /// Signature.
    fn schema(&self) -> FunctionSchema;

    /// Evaluate the function. Arguments have already passed
    /// [`check_arguments`].
    fn call(&self, arguments: Vec<Value>) -> Result<Value, ProviderError>;
}

/// Every function the provider serves.
pub fn all() -> Vec<Box<dyn Function>> {
    vec![Box::new(NormalizeProjectMembersFunction)]
}

/// Check argument count and types against a signature.
pub fn check_arguments(
    name: &str,
    schema: &FunctionSchema,
    arguments: &[Value],
) -> Result<(), ProviderError> {
    if arguments.len() != schema.parameters.len() {
        return Err(ProviderError::InvalidRequest(format!(
            "{} expects {} argument(s), got {}",
            name,
            schema.parameters.len(),
            arguments.len()
        )));
    }

    let mut diagnostics = Vec::new();
    for (parameter, argument) in schema.parameters.iter().zip(arguments) {
        if argument.is_null() {
            if !parameter.allow_null {
                return Err(ProviderError::InvalidRequest(format!(
                    "{}: argument '{}' must not be null",
                    name, parameter.name
                )));
            }
            continue;
        }
        validation::validate_value(&parameter.param_type, argument, &parameter.name, &mut diagnostics);
    }

    if diagnostics.is_empty() {
        return Ok(());
    }
    let problems: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
    Err(ProviderError::InvalidRequest(format!(
        "{}: {}",
        name,
        problems.join("; ")
    )))
}

const TIERS: [&str; 5] = ["admins", "developers", "editors", "interactive_viewers", "viewers"];

/// `normalize_project_members(admins, developers, editors, interactive_viewers, viewers)`
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeProjectMembersFunction;

impl Function for NormalizeProjectMembersFunction {
    fn name(&self) -> &'static str {
        "normalize_project_members"
    }

    fn schema(&self) -> FunctionSchema {
        let mut schema = FunctionSchema::new(
            "Keep each project member only in their highest role",
            AttributeType::object(TIERS.map(|tier| (tier, AttributeType::string_list()))),
        )
        .with_description(include_str!("../docs/functions/normalize_project_members.md"));
        for tier in TIERS {
            schema = schema.with_parameter(
                Parameter::new(tier, AttributeType::string_list())
                    .allow_null()
                    .with_description(format!("Identifiers requested for the {} tier.", tier)),
            );
        }
        schema
    }

    fn call(&self, arguments: Vec<Value>) -> Result<Value, ProviderError> {
        let mut lists = arguments.into_iter().map(|argument| match argument {
            Value::Null => Ok(Vec::new()),
            other => serde_json::from_value::<Vec<String>>(other).map_err(ProviderError::from),
        });
        let mut next = || lists.next().unwrap_or_else(|| Ok(Vec::new()));

        let input = ProjectMembers {
            admins: next()?,
            developers: next()?,
            editors: next()?,
            interactive_viewers: next()?,
            viewers: next()?,
        };
        Ok(serde_json::to_value(normalize_project_members(&input))?)
    }
}
