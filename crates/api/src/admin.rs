//! Project-admin verification shared by every `/:projectId` route.

use serde_json::Value;
use tracing::{instrument, warn};

use db::Repository;
use fhir::{assert_ok, from_value, Bundle, Operator, Project, ProjectMembership, SearchRequest};

use crate::error::ApiError;

/// A project together with its full membership roster.
#[derive(Debug, Clone)]
pub struct ProjectDetails {
    pub project: Project,
    pub memberships: Vec<ProjectMembership>,
}

/// Raw resources of a search result, in discovery order.
pub(crate) fn bundle_resources(bundle: Option<Bundle>) -> Vec<Value> {
    bundle
        .map(|b| b.entry.into_iter().map(|e| e.resource).collect())
        .unwrap_or_default()
}

/// Whether a stored membership makes `caller` (`User/<id>`) an admin.
///
/// Read from the stored JSON. Only a literal `true` grants admin rights.
pub fn grants_admin(membership: &Value, caller: &str) -> bool {
    membership.get("admin") == Some(&Value::Bool(true))
        && membership
            .get("user")
            .and_then(|u| u.get("reference"))
            .and_then(Value::as_str)
            == Some(caller)
}

/// Typed memberships; entries that do not fit the model are skipped.
pub(crate) fn parse_memberships(resources: Vec<Value>) -> Vec<ProjectMembership> {
    resources
        .into_iter()
        .filter_map(|resource| match from_value::<ProjectMembership>(resource) {
            Ok(membership) => Some(membership),
            Err(e) => {
                warn!("skipping unreadable membership: {e}");
                None
            }
        })
        .collect()
}

/// Load `project_id` and its memberships if `user_id` administers it.
///
/// Returns `Ok(None)` when the project cannot be read or the user holds no
/// admin membership in it; both cases look the same to the caller. A failed
/// membership search is an error.
#[instrument(skip(repo))]
pub async fn verify_project_admin(
    repo: &dyn Repository,
    project_id: &str,
    user_id: &str,
) -> Result<Option<ProjectDetails>, ApiError> {
    let (outcome, project) = repo.read_resource("Project", project_id).await;
    let project = match project {
        Some(project) if outcome.is_ok() => from_value::<Project>(project)?,
        _ => {
            warn!("project {project_id} not readable ({})", outcome.id());
            return Ok(None);
        }
    };

    let request = SearchRequest::new("ProjectMembership").filter(
        "project",
        Operator::Equals,
        format!("Project/{project_id}"),
    );
    let (outcome, bundle) = repo.search(&request).await;
    assert_ok(&outcome)?;
    let resources = bundle_resources(bundle);

    let caller = format!("User/{user_id}");
    if !resources.iter().any(|m| grants_admin(m, &caller)) {
        warn!("user {user_id} is not an admin of project {project_id}");
        return Ok(None);
    }

    Ok(Some(ProjectDetails {
        project,
        memberships: parse_memberships(resources),
    }))
}
