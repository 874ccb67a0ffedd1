//! Application search.
//!
//! An [`AppFilter`] is built from at least one of id, label and label prefix.
//! A search by id is a direct lookup; otherwise the listing endpoint is
//! queried with the label (or the prefix) and every page is collected.

use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use validator::{ValidationError, ValidationErrors};

use crate::{
    client::{AppQuery, ClientError, DirectoryApi, NotFoundExt},
    models::Application,
};

/// Filter expression selecting active applications.
pub const ACTIVE_STATUS_FILTER: &str = r#"status eq "ACTIVE""#;

const ACTIVE_STATUS: &str = "ACTIVE";

/// Search criteria as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSearch {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub label_prefix: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

/// Validated application search criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppFilter {
    id: Option<String>,
    label: Option<String>,
    label_prefix: Option<String>,
    status: Option<&'static str>,
}

impl AppFilter {
    pub fn new(search: AppSearch) -> Result<Self, ValidationErrors> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        let id = non_empty(search.id);
        let label = non_empty(search.label);
        let label_prefix = non_empty(search.label_prefix);

        if id.is_none() && label.is_none() && label_prefix.is_none() {
            let mut err = ValidationError::new("missing_criteria");
            err.message = Some(Cow::Borrowed(
                "you must provide either a 'label_prefix', 'id', or 'label' for application search",
            ));
            let mut errors = ValidationErrors::new();
            errors.add("app_filter", err);
            return Err(errors);
        }

        Ok(Self {
            id,
            label,
            label_prefix,
            status: search.active_only.then_some(ACTIVE_STATUS_FILTER),
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Free-text search term: the exact label wins over the prefix.
    pub fn q(&self) -> Option<&str> {
        self.label.as_deref().or(self.label_prefix.as_deref())
    }

    pub fn status_filter(&self) -> Option<&str> {
        self.status
    }

    /// Listing parameters for this filter.
    pub fn query(&self, limit: Option<u32>) -> AppQuery {
        AppQuery {
            q: self.q().map(str::to_string),
            filter: self.status.map(str::to_string),
            limit,
        }
    }

    /// Whether a listed application satisfies the label criteria and the
    /// status filter. The id is not consulted: an id search is a direct
    /// lookup that ignores the label and the prefix.
    pub fn matches(&self, app: &Application) -> bool {
        if !self.status_matches(app) {
            return false;
        }
        match (&self.label, &self.label_prefix) {
            (Some(label), _) => app.label == *label,
            (None, Some(prefix)) => app.label.starts_with(prefix.as_str()),
            (None, None) => true,
        }
    }

    fn status_matches(&self, app: &Application) -> bool {
        self.status.is_none() || app.status.as_deref() == Some(ACTIVE_STATUS)
    }
}

impl fmt::Display for AppFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"id: "{}", label: "{}", label_prefix: "{}""#,
            self.id.as_deref().unwrap_or_default(),
            self.label.as_deref().unwrap_or_default(),
            self.label_prefix.as_deref().unwrap_or_default(),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppLookupError {
    #[error("no application found with {0}")]
    NotFound(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// List every application matching `query`, following next links until the
/// listing is exhausted.
pub async fn list_apps(
    client: &dyn DirectoryApi,
    query: &AppQuery,
) -> Result<Vec<Application>, ClientError> {
    let mut page = client.list_applications(query, None).await?;
    let mut apps = std::mem::take(&mut page.items);
    let mut pages = 1;
    let mut current: Option<String> = None;

    while let Some(next) = page.next.take() {
        if current.as_deref() == Some(next.as_str()) {
            warn!(next = %next, "Next link points at the current page");
            break;
        }
        page = client.list_applications(query, Some(&next)).await?;
        apps.append(&mut page.items);
        pages += 1;
        current = Some(next);
    }

    debug!(count = apps.len(), pages = pages, "Listed applications");
    Ok(apps)
}

/// Every application matching the filter.
pub async fn search_apps(
    client: &dyn DirectoryApi,
    filter: &AppFilter,
    limit: Option<u32>,
) -> Result<Vec<Application>, AppLookupError> {
    if let Some(id) = filter.id() {
        let app = client.get_application(id).await.ok_if_not_found()?;
        return Ok(app.into_iter().filter(|app| filter.status_matches(app)).collect());
    }

    let apps = list_apps(client, &filter.query(limit)).await?;
    Ok(apps.into_iter().filter(|app| filter.matches(app)).collect())
}

/// The single application the filter designates: the app with the given id,
/// else the first one with exactly the label, else the first one whose label
/// starts with the prefix.
pub async fn find_app(
    client: &dyn DirectoryApi,
    filter: &AppFilter,
    limit: Option<u32>,
) -> Result<Application, AppLookupError> {
    search_apps(client, filter, limit)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppLookupError::NotFound(filter.to_string()))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::reconciler::testing::{Call, FakeDirectory};

    fn app(id: &str, label: &str, status: &str) -> Application {
        Application {
            id: id.into(),
            name: "bookmark".into(),
            label: label.into(),
            status: Some(status.into()),
            sign_on_mode: None,
            created: None,
            last_updated: None,
        }
    }

    fn search(id: Option<&str>, label: Option<&str>, prefix: Option<&str>) -> AppSearch {
        AppSearch {
            id: id.map(str::to_string),
            label: label.map(str::to_string),
            label_prefix: prefix.map(str::to_string),
            active_only: false,
        }
    }

    #[test]
    fn test_missing_criteria_is_a_validation_error() {
        let err = AppFilter::new(AppSearch::default()).unwrap_err();
        assert!(err.to_string().contains("you must provide either"));

        let empty = search(Some(""), Some(""), Some(""));
        assert!(AppFilter::new(empty).is_err());
    }

    #[rstest]
    #[case(search(None, Some("Wiki"), Some("Wi")), Some("Wiki"))]
    #[case(search(None, None, Some("Wi")), Some("Wi"))]
    #[case(search(Some("0oa1"), None, None), None)]
    fn test_query_precedence(#[case] search: AppSearch, #[case] q: Option<&str>) {
        let filter = AppFilter::new(search).unwrap();
        assert_eq!(filter.q(), q);
        assert_eq!(filter.query(None).filter, None);
    }

    #[test]
    fn test_active_only_adds_status_clause() {
        let filter = AppFilter::new(AppSearch {
            active_only: true,
            ..search(None, Some("Wiki"), None)
        })
        .unwrap();
        let query = filter.query(Some(50));
        assert_eq!(query.filter.as_deref(), Some(r#"status eq "ACTIVE""#));
        assert_eq!(query.q.as_deref(), Some("Wiki"));
        assert_eq!(query.limit, Some(50));
    }

    #[test]
    fn test_display_lists_every_criterion() {
        let filter = AppFilter::new(search(None, None, Some("Wi"))).unwrap();
        assert_eq!(filter.to_string(), r#"id: "", label: "", label_prefix: "Wi""#);
    }

    #[tokio::test]
    async fn test_list_apps_accumulates_pages_in_order() {
        let fake = FakeDirectory::default();
        fake.push_app_page(vec![app("0oa1", "A", "ACTIVE"), app("0oa2", "B", "ACTIVE")]);
        fake.push_app_page(vec![app("0oa3", "C", "INACTIVE")]);
        fake.push_app_page(vec![app("0oa4", "D", "ACTIVE")]);

        let apps = list_apps(&fake, &AppQuery::default()).await.unwrap();
        let ids: Vec<_> = apps.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["0oa1", "0oa2", "0oa3", "0oa4"]);
        assert_eq!(
            fake.calls()
                .iter()
                .filter(|c| matches!(c, Call::ListApplications { .. }))
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn test_list_apps_stops_on_self_referencing_link() {
        let fake = FakeDirectory::default();
        fake.push_app_page(vec![app("0oa1", "A", "ACTIVE")]);
        fake.push_app_page(vec![app("0oa2", "B", "ACTIVE")]);
        fake.repeat_app_links();

        let apps = list_apps(&fake, &AppQuery::default()).await.unwrap();
        let ids: Vec<_> = apps.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["0oa1", "0oa2"]);
        assert_eq!(fake.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_find_app_by_label_prefers_exact_match() {
        let fake = FakeDirectory::default();
        fake.push_app_page(vec![
            app("0oa1", "Wiki Staging", "ACTIVE"),
            app("0oa2", "Wiki", "ACTIVE"),
        ]);

        let filter = AppFilter::new(search(None, Some("Wiki"), None)).unwrap();
        let found = find_app(&fake, &filter, None).await.unwrap();
        assert_eq!(found.id, "0oa2");
    }

    #[tokio::test]
    async fn test_find_app_by_prefix_takes_first_match() {
        let fake = FakeDirectory::default();
        fake.push_app_page(vec![
            app("0oa1", "Jira", "ACTIVE"),
            app("0oa2", "Wiki Staging", "ACTIVE"),
            app("0oa3", "Wiki", "ACTIVE"),
        ]);

        let filter = AppFilter::new(search(None, None, Some("Wiki"))).unwrap();
        let found = find_app(&fake, &filter, None).await.unwrap();
        assert_eq!(found.id, "0oa2");
    }

    #[tokio::test]
    async fn test_find_app_by_id_uses_direct_lookup() {
        let fake = FakeDirectory::default();
        fake.insert_app(app("0oa9", "Payroll", "ACTIVE"));

        let filter = AppFilter::new(search(Some("0oa9"), None, None)).unwrap();
        let found = find_app(&fake, &filter, None).await.unwrap();
        assert_eq!(found.label, "Payroll");
        assert_eq!(fake.calls(), [Call::GetApplication("0oa9".into())]);

        let missing = AppFilter::new(search(Some("0oa404"), None, None)).unwrap();
        assert!(matches!(
            find_app(&fake, &missing, None).await,
            Err(AppLookupError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_id_lookup_ignores_label_criteria() {
        let fake = FakeDirectory::default();
        fake.insert_app(app("0oa9", "Payroll", "ACTIVE"));

        let filter = AppFilter::new(search(Some("0oa9"), Some("Wiki"), Some("Wi"))).unwrap();
        let found = find_app(&fake, &filter, None).await.unwrap();
        assert_eq!(found.id, "0oa9");
        assert_eq!(fake.calls(), [Call::GetApplication("0oa9".into())]);
    }

    #[tokio::test]
    async fn test_active_only_skips_inactive_apps() {
        let fake = FakeDirectory::default();
        fake.push_app_page(vec![app("0oa1", "Wiki", "INACTIVE")]);

        let filter = AppFilter::new(AppSearch {
            active_only: true,
            ..search(None, Some("Wiki"), None)
        })
        .unwrap();
        assert!(find_app(&fake, &filter, None).await.is_err());
    }
}
