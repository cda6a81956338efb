//! Schema-driven planning shared by every resource.
//!
//! Resources only describe their attributes; the planner works out defaults,
//! which computed values carry over from prior state, which attributes
//! changed, and whether a `force_new` attribute forces replacement.

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult};

/// Plan a resource change from its prior state to the proposed configuration.
///
/// - `prior_state == None` plans a create.
/// - `proposed_state == null` plans a destroy.
/// - Otherwise an update is planned. Computed attributes left null in the
///   proposal keep their prior value, and a changed `force_new` attribute
///   is marked as forcing replacement.
pub fn plan_resource(
    schema: &Schema,
    prior_state: Option<&Value>,
    proposed_state: &Value,
) -> Result<PlanResult, ProviderError> {
    let prior = match prior_state {
        Some(Value::Null) | None => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            return Err(ProviderError::InvalidRequest(format!(
                "prior state must be an object, got {}",
                other
            )))
        }
    };

    let proposed = match proposed_state {
        Value::Null => return Ok(plan_destroy(prior)),
        Value::Object(map) => map,
        other => {
            return Err(ProviderError::InvalidRequest(format!(
                "proposed state must be an object, got {}",
                other
            )))
        }
    };

    let mut planned = Map::new();
    for (name, attr) in &schema.attributes {
        let mut value = proposed.get(name).cloned().unwrap_or(Value::Null);
        if value.is_null() {
            if let Some(default) = &attr.default {
                value = default.clone();
            } else if attr.is_computed() {
                if let Some(prior_value) = prior.and_then(|p| p.get(name)) {
                    value = prior_value.clone();
                }
            }
        }
        planned.insert(name.clone(), value);
    }

    let mut changes = Vec::new();
    for (name, attr) in &schema.attributes {
        let after = planned.get(name).filter(|v| !v.is_null());
        let before = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());

        let change = match (before, after) {
            (None, None) => None,
            (None, Some(after)) => Some(AttributeChange::added(name.as_str(), after.clone())),
            (Some(before), None) => Some(AttributeChange::removed(name.as_str(), before.clone())),
            (Some(before), Some(after)) if before != after => Some(AttributeChange::modified(
                name.as_str(),
                before.clone(),
                after.clone(),
            )),
            _ => None,
        };

        if let Some(change) = change {
            if prior.is_some() && attr.force_new {
                changes.push(change.forcing_replacement());
            } else {
                changes.push(change);
            }
        }
    }

    Ok(PlanResult::new(Value::Object(planned), changes))
}

fn plan_destroy(prior: Option<&Map<String, Value>>) -> PlanResult {
    let changes = prior
        .into_iter()
        .flatten()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| AttributeChange::removed(name.as_str(), value.clone()))
        .collect();
    PlanResult::new(Value::Null, changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("project_uuid", Attribute::required_string().with_force_new())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "is_private",
                Attribute::optional_bool().with_default(json!(true)),
            )
    }

    #[test]
    fn test_plan_create_applies_defaults() {
        let plan = plan_resource(&schema(), None, &json!({"project_uuid": "p", "name": "Sales"}))
            .unwrap();

        assert_eq!(plan.planned_state["is_private"], json!(true));
        assert!(plan.planned_state["id"].is_null());
        assert!(!plan.requires_replace());

        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["is_private", "name", "project_uuid"]);
    }

    #[test]
    fn test_plan_update_keeps_computed_values() {
        let prior = json!({"id": "projects/p/spaces/s", "project_uuid": "p", "name": "Sales", "is_private": true});
        let plan = plan_resource(
            &schema(),
            Some(&prior),
            &json!({"project_uuid": "p", "name": "Revenue", "is_private": true}),
        )
        .unwrap();

        assert_eq!(plan.planned_state["id"], "projects/p/spaces/s");
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "name");
        assert!(!plan.requires_replace());
    }

    #[test]
    fn test_plan_force_new_requires_replace() {
        let prior = json!({"id": "x", "project_uuid": "p1", "name": "Sales", "is_private": true});
        let plan = plan_resource(
            &schema(),
            Some(&prior),
            &json!({"project_uuid": "p2", "name": "Sales"}),
        )
        .unwrap();

        assert!(plan.requires_replace());
        assert_eq!(plan.replaced_paths(), vec!["project_uuid"]);
    }

    #[test]
    fn test_plan_no_changes() {
        let prior = json!({"id": "x", "project_uuid": "p", "name": "Sales", "is_private": false});
        let plan = plan_resource(
            &schema(),
            Some(&prior),
            &json!({"project_uuid": "p", "name": "Sales", "is_private": false}),
        )
        .unwrap();

        assert!(!plan.has_changes());
    }

    #[test]
    fn test_plan_destroy() {
        let prior = json!({"id": "x", "project_uuid": "p", "name": "Sales", "is_private": null});
        let plan = plan_resource(&schema(), Some(&prior), &Value::Null).unwrap();

        assert!(plan.is_destroy());
        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["id", "name", "project_uuid"]);
    }

    #[test]
    fn test_plan_rejects_non_object() {
        let err = plan_resource(&schema(), None, &json!("nope")).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }
}
