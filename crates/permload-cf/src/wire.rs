//! Request and response bodies of the Cloud Controller and UAA APIs.

use permload_core::{ApiError, ApiErrorEntry, AppHandle, OrgHandle, SpaceHandle};
use serde::{Deserialize, Serialize};

/// `GET /v2/info`
#[derive(Debug, Clone, Deserialize)]
pub struct Info {
    pub token_endpoint: String,
}

/// UAA `POST /oauth/token`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    600
}

// ---------------------------------------------------------------------------
// v2
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrgRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSpaceRequest<'a> {
    pub name: &'a str,
    pub organization_guid: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateUserRequest<'a> {
    pub guid: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    pub guid: String,
}

/// A v2 resource: `{metadata: {guid}, entity: {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct V2Resource<T> {
    pub metadata: Metadata,
    pub entity: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V2Org {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V2Space {
    pub name: String,
    pub organization_guid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V2Count {
    pub total_results: usize,
}

impl From<V2Resource<V2Org>> for OrgHandle {
    fn from(r: V2Resource<V2Org>) -> Self {
        OrgHandle {
            id: r.metadata.guid,
            name: r.entity.name,
        }
    }
}

impl From<V2Resource<V2Space>> for SpaceHandle {
    fn from(r: V2Resource<V2Space>) -> Self {
        SpaceHandle {
            id: r.metadata.guid,
            name: r.entity.name,
            org_id: r.entity.organization_guid,
        }
    }
}

/// v2 error body.
#[derive(Debug, Clone, Deserialize)]
pub struct V2Error {
    pub error_code: String,
    #[serde(default)]
    pub description: String,
}

// ---------------------------------------------------------------------------
// v3
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidRef {
    pub guid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub data: GuidRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relationships {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space: Option<Relationship>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<Relationship>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAppRequest<'a> {
    pub name: &'a str,
    pub relationships: Relationships,
}

impl<'a> CreateAppRequest<'a> {
    pub fn new(name: &'a str, space_id: &str) -> Self {
        Self {
            name,
            relationships: Relationships {
                space: Some(Relationship {
                    data: GuidRef {
                        guid: space_id.to_string(),
                    },
                }),
                organization: None,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct V3Resource {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub relationships: Relationships,
}

impl V3Resource {
    fn parent(rel: &Option<Relationship>) -> Option<String> {
        rel.as_ref().map(|r| r.data.guid.clone())
    }

    pub fn into_org(self) -> OrgHandle {
        OrgHandle {
            id: self.guid,
            name: self.name,
        }
    }

    pub fn into_space(self) -> Result<SpaceHandle, ApiError> {
        let org_id = Self::parent(&self.relationships.organization)
            .ok_or_else(|| ApiError::Decode(format!("space {} has no organization", self.guid)))?;
        Ok(SpaceHandle {
            id: self.guid,
            name: self.name,
            org_id,
        })
    }

    pub fn into_app(self) -> Result<AppHandle, ApiError> {
        let space_id = Self::parent(&self.relationships.space)
            .ok_or_else(|| ApiError::Decode(format!("app {} has no space", self.guid)))?;
        Ok(AppHandle {
            id: self.guid,
            name: self.name,
            space_id,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    pub total_results: usize,
    #[serde(default)]
    pub next: Option<Link>,
}

/// One page of a v3 list.
#[derive(Debug, Clone, Deserialize)]
pub struct V3Page {
    pub pagination: Pagination,
    #[serde(default)]
    pub resources: Vec<V3Resource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V3ErrorItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

/// v3 error body.
#[derive(Debug, Clone, Deserialize)]
pub struct V3Errors {
    pub errors: Vec<V3ErrorItem>,
}

/// Fold a non-2xx response body into an [`ApiError`]. Bodies in neither
/// format yield a status error with no entries.
pub fn status_error(status: u16, body: &str) -> ApiError {
    let entries = if let Ok(v3) = serde_json::from_str::<V3Errors>(body) {
        v3.errors
            .into_iter()
            .map(|e| ApiErrorEntry {
                code: e.title,
                detail: e.detail,
            })
            .collect()
    } else if let Ok(v2) = serde_json::from_str::<V2Error>(body) {
        vec![ApiErrorEntry {
            code: v2.error_code,
            detail: v2.description,
        }]
    } else {
        Vec::new()
    };
    ApiError::Status { status, entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_error_body() {
        let body = r#"{"code":30002,"description":"The organization name is taken: o","error_code":"CF-OrganizationNameTaken"}"#;
        let err = status_error(400, body);
        assert!(err.has_code("CF-OrganizationNameTaken"));
        assert!(matches!(err, ApiError::Status { status: 400, .. }));
    }

    #[test]
    fn test_v3_error_body() {
        let body = r#"{"errors":[{"code":10008,"title":"CF-UnprocessableEntity","detail":"name must be unique in space"}]}"#;
        let err = status_error(422, body);
        assert!(err.has_code("CF-UnprocessableEntity"));
        assert!(err.has_detail("name must be unique in space"));
    }

    #[test]
    fn test_unrecognised_body() {
        let err = status_error(502, "<html>bad gateway</html>");
        assert_eq!(
            err,
            ApiError::Status {
                status: 502,
                entries: Vec::new()
            }
        );
    }

    #[test]
    fn test_app_request_shape() {
        let body = serde_json::to_value(CreateAppRequest::new("a", "space-guid")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "name": "a",
                "relationships": { "space": { "data": { "guid": "space-guid" } } }
            })
        );
    }

    #[test]
    fn test_v3_space_needs_org() {
        let page: V3Page = serde_json::from_str(
            r#"{
                "pagination": {"total_results": 2, "next": null},
                "resources": [
                    {"guid": "s1", "name": "perm-external-space-0-in-org-0",
                     "relationships": {"organization": {"data": {"guid": "o1"}}}},
                    {"guid": "s2", "name": "orphan"}
                ]
            }"#,
        )
        .unwrap();
        let mut resources = page.resources.into_iter();
        let space = resources.next().unwrap().into_space().unwrap();
        assert_eq!(space.org_id, "o1");
        assert!(matches!(
            resources.next().unwrap().into_space(),
            Err(ApiError::Decode(_))
        ));
    }
}
