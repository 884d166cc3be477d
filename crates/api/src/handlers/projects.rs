//! Project administration routes, mounted under `/admin/projects`.
//!
//!   GET  /                                   projects the caller administers
//!   GET  /:projectId                         project summary + member list
//!   GET  /:projectId/members/:membershipId   one membership resource
//!   POST /:projectId/members/:membershipId   replace one membership resource

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

use fhir::{assert_ok, from_value, Operator, Project, ProjectMembership, SearchRequest};

use super::AppState;
use crate::admin::{bundle_resources, grants_admin, parse_memberships, verify_project_admin};
use crate::auth::CurrentUser;
use crate::error::ApiError;

/// Absent fields are left out of the JSON rather than sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<Project> for ProjectSummary {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            name: project.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectSummary>,
}

/// One row of the roster: reference strings plus the profile's display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<ProjectMembership> for MemberSummary {
    fn from(m: ProjectMembership) -> Self {
        let (profile, name) = match m.profile {
            Some(p) => (p.reference, p.display),
            None => (None, None),
        };
        Self {
            membership_id: m.id,
            profile,
            user: m.user.and_then(|u| u.reference),
            name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectDetailResponse {
    pub project: ProjectSummary,
    pub members: Vec<MemberSummary>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/:project_id", get(get_project))
        .route(
            "/:project_id/members/:membership_id",
            get(get_member).post(update_member),
        )
}

fn status_of(outcome: &fhir::Outcome) -> StatusCode {
    StatusCode::from_u16(outcome.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// GET /: projects where the caller holds an admin membership.
///
/// Projects are read one at a time, in membership discovery order.
#[instrument(skip_all, fields(user = %user.0))]
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ProjectListResponse>, ApiError> {
    let caller = format!("User/{}", user.0);
    let request =
        SearchRequest::new("ProjectMembership").filter("user", Operator::Equals, caller.clone());
    let (outcome, bundle) = state.repo.search(&request).await;
    assert_ok(&outcome)?;

    let admin_memberships = bundle_resources(bundle)
        .into_iter()
        .filter(|m| grants_admin(m, &caller))
        .collect();

    let mut projects = Vec::new();
    for membership in parse_memberships(admin_memberships) {
        let reference = membership.project.unwrap_or_default();
        let (outcome, project) = state.repo.read_reference(&reference).await;
        assert_ok(&outcome)?;
        let summary = match project {
            Some(project) => ProjectSummary::from(from_value::<Project>(project)?),
            None => ProjectSummary { id: None, name: None },
        };
        projects.push(summary);
    }

    info!("listing {} administered projects", projects.len());
    Ok(Json(ProjectListResponse { projects }))
}

/// GET /:projectId: project summary and flattened member list.
#[instrument(skip_all, fields(user = %user.0, project_id = %project_id))]
pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectDetailResponse>, ApiError> {
    let details = verify_project_admin(state.repo.as_ref(), &project_id, &user.0)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(ProjectDetailResponse {
        project: details.project.into(),
        members: details.memberships.into_iter().map(MemberSummary::from).collect(),
    }))
}

/// GET /:projectId/members/:membershipId: the membership resource as stored.
#[instrument(skip_all, fields(user = %user.0, project_id = %project_id, membership_id = %membership_id))]
pub async fn get_member(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((project_id, membership_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    verify_project_admin(state.repo.as_ref(), &project_id, &user.0)
        .await?
        .ok_or(ApiError::NotFound)?;

    let (outcome, membership) = state
        .repo
        .read_resource("ProjectMembership", &membership_id)
        .await;
    assert_ok(&outcome)?;
    Ok((status_of(&outcome), Json(membership.unwrap_or(Value::Null))))
}

/// POST /:projectId/members/:membershipId: store the request body verbatim.
///
/// The body is only checked once the caller is known to be an admin, so
/// non-admins get the same 404 whatever they send.
#[instrument(skip_all, fields(user = %user.0, project_id = %project_id, membership_id = %membership_id))]
pub async fn update_member(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((project_id, membership_id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    verify_project_admin(state.repo.as_ref(), &project_id, &user.0)
        .await?
        .ok_or(ApiError::NotFound)?;
    let Json(resource) = body?;

    let (outcome, result) = state.repo.update_resource(resource).await;
    assert_ok(&outcome)?;
    info!("membership update answered {}", outcome.id());
    Ok((status_of(&outcome), Json(result.unwrap_or(Value::Null))))
}
