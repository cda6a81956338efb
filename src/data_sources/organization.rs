use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{required_str, string_object, DataSource};
use crate::client::{LightdashApi, OrganizationMember};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};

const MEMBER_FIELDS: [&str; 5] = ["user_uuid", "email", "first_name", "last_name", "role"];

fn member_value(member: &OrganizationMember) -> Value {
    json!({
        "user_uuid": member.user_uuid,
        "email": member.email,
        "first_name": member.first_name,
        "last_name": member.last_name,
        "role": member.role,
        "is_active": member.is_active,
    })
}

fn member_type() -> AttributeType {
    let mut object = string_object(&MEMBER_FIELDS);
    if let AttributeType::Object(fields) = &mut object {
        fields.insert("is_active".to_string(), AttributeType::Bool);
    }
    object
}

/// `lightdash_organization`
#[derive(Debug, Clone, Copy, Default)]
pub struct OrganizationDataSource;

#[async_trait]
impl DataSource for OrganizationDataSource {
    fn type_name(&self) -> &'static str {
        "lightdash_organization"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/data-sources/organization.md"))
            .with_attribute("organization_uuid", Attribute::computed_string())
            .with_attribute("name", Attribute::computed_string())
    }

    async fn read(&self, api: &dyn LightdashApi, _config: Value) -> Result<Value, ProviderError> {
        let org = api.get_organization().await?;
        debug!(organization_uuid = %org.organization_uuid, "Read organization");
        Ok(json!({
            "organization_uuid": org.organization_uuid,
            "name": org.name,
        }))
    }
}

/// `lightdash_organization_members`
#[derive(Debug, Clone, Copy, Default)]
pub struct OrganizationMembersDataSource;

#[async_trait]
impl DataSource for OrganizationMembersDataSource {
    fn type_name(&self) -> &'static str {
        "lightdash_organization_members"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/data-sources/organization_members.md"))
            .with_attribute(
                "members",
                Attribute::computed(AttributeType::list(member_type())),
            )
    }

    async fn read(&self, api: &dyn LightdashApi, _config: Value) -> Result<Value, ProviderError> {
        let mut members = api.list_organization_members().await?;
        members.sort_by(|a, b| a.email.cmp(&b.email));
        debug!(count = members.len(), "Read organization members");
        Ok(json!({
            "members": members.iter().map(member_value).collect::<Vec<_>>(),
        }))
    }
}

/// `lightdash_organization_member`: look up one member by email.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrganizationMemberDataSource;

#[async_trait]
impl DataSource for OrganizationMemberDataSource {
    fn type_name(&self) -> &'static str {
        "lightdash_organization_member"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/data-sources/organization_member.md"))
            .with_attribute(
                "email",
                Attribute::required_string().with_description("Email to look up. Case-insensitive."),
            )
            .with_attribute("user_uuid", Attribute::computed_string())
            .with_attribute("first_name", Attribute::computed_string())
            .with_attribute("last_name", Attribute::computed_string())
            .with_attribute("role", Attribute::computed_string())
            .with_attribute("is_active", Attribute::computed_bool())
    }

    async fn read(&self, api: &dyn LightdashApi, config: Value) -> Result<Value, ProviderError> {
        let email = required_str(&config, "email")?;
        let member = api
            .list_organization_members()
            .await?
            .into_iter()
            .find(|m| m.email.eq_ignore_ascii_case(email))
            .ok_or_else(|| {
                ProviderError::NotFound(format!("no organization member with email '{}'", email))
            })?;
        Ok(member_value(&member))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryLightdash;

    fn api() -> InMemoryLightdash {
        InMemoryLightdash::new()
            .with_organization_member("u2", "bob@example.com")
            .with_organization_member("u1", "ann@example.com")
    }

    #[tokio::test]
    async fn test_organization() {
        let state = OrganizationDataSource
            .read(&api(), Value::Null)
            .await
            .unwrap();
        assert_eq!(state["organization_uuid"], "org-1");
    }

    #[tokio::test]
    async fn test_members_sorted_by_email() {
        let state = OrganizationMembersDataSource
            .read(&api(), json!({}))
            .await
            .unwrap();
        let emails: Vec<_> = state["members"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["email"].as_str().unwrap())
            .collect();
        assert_eq!(emails, vec!["ann@example.com", "bob@example.com"]);
    }

    #[tokio::test]
    async fn test_member_by_email() {
        let state = OrganizationMemberDataSource
            .read(&api(), json!({"email": "BOB@example.com"}))
            .await
            .unwrap();
        assert_eq!(state["user_uuid"], "u2");
        assert_eq!(state["email"], "bob@example.com");

        let err = OrganizationMemberDataSource
            .read(&api(), json!({"email": "nobody@example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[test]
    fn test_member_type_has_is_active() {
        match member_type() {
            AttributeType::Object(fields) => {
                assert_eq!(fields.len(), 6);
                assert_eq!(fields["is_active"], AttributeType::Bool);
            }
            other => panic!("unexpected type {:?}", other),
        }
    }
}
