//! Tutorial domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use shared::pagination::Page;
use shared::validation::{validate_optional_text, validate_required_text, validate_short_text};
use validator::{Validate, ValidationErrors};

/// Represents a tutorial in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tutorial {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated tutorial ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTutorial {
    pub title: String,
    pub description: Option<String>,
    pub published: bool,
}

impl NewTutorial {
    /// Creates an unpublished tutorial with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            published: false,
        }
    }
}

/// A validated set of field changes. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TutorialChanges {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub published: Option<bool>,
}

impl TutorialChanges {
    /// Changes that only flip the published flag.
    pub fn published(published: bool) -> Self {
        Self {
            published: Some(published),
            ..Default::default()
        }
    }

    /// Whether no field would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.published.is_none()
    }
}

/// Request payload for creating a tutorial.
///
/// `title` is optional at the wire level so a missing title surfaces as a
/// validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTutorialRequest {
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,

    #[serde(default)]
    pub published: bool,
}

impl TryFrom<CreateTutorialRequest> for NewTutorial {
    type Error = ValidationErrors;

    fn try_from(request: CreateTutorialRequest) -> Result<Self, Self::Error> {
        request.validate()?;

        let mut errors = ValidationErrors::new();
        let title = match validate_required_text(request.title.as_deref()) {
            Ok(title) => title.to_string(),
            Err(mut err) => {
                err.message = Some("Title can not be empty".into());
                errors.add("title", err);
                return Err(errors);
            }
        };
        check_description(request.description.as_deref())?;

        Ok(Self {
            title,
            description: request.description,
            published: request.published,
        })
    }
}

fn check_description(description: Option<&str>) -> Result<(), ValidationErrors> {
    match description.map(validate_short_text) {
        Some(Err(mut err)) => {
            err.message = Some("Description must be at most 255 characters".into());
            let mut errors = ValidationErrors::new();
            errors.add("description", err);
            Err(errors)
        }
        _ => Ok(()),
    }
}

/// Request payload for updating a tutorial (partial update).
///
/// An absent field is left alone; `"description": null` clears the description.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTutorialRequest {
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,

    pub published: Option<bool>,
}

impl TryFrom<UpdateTutorialRequest> for TutorialChanges {
    type Error = ValidationErrors;

    fn try_from(request: UpdateTutorialRequest) -> Result<Self, Self::Error> {
        request.validate()?;

        if let Err(mut err) = validate_optional_text(request.title.as_deref()) {
            err.message = Some("Title can not be empty".into());
            let mut errors = ValidationErrors::new();
            errors.add("title", err);
            return Err(errors);
        }
        check_description(request.description.as_ref().and_then(Option::as_deref))?;

        Ok(Self {
            title: request.title,
            description: request.description,
            published: request.published,
        })
    }
}

/// Wraps whatever is present, `null` included, in `Some`. Paired with
/// `#[serde(default)]` an absent field stays `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Query parameters for listing tutorials.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTutorialsQuery {
    pub title: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl ListTutorialsQuery {
    /// Whether the client asked for a page rather than the full list.
    pub fn is_paged(&self) -> bool {
        self.page.is_some() || self.size.is_some()
    }

    /// The title filter, ignoring an empty `?title=`.
    pub fn title_filter(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.is_empty())
    }
}

/// Response for a paged tutorial listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorialPageResponse {
    pub total_items: i64,
    pub tutorials: Vec<Tutorial>,
    pub total_pages: i64,
    pub current_page: u32,
}

impl From<Page<Tutorial>> for TutorialPageResponse {
    fn from(page: Page<Tutorial>) -> Self {
        Self {
            total_items: page.total_items,
            tutorials: page.items,
            total_pages: page.total_pages,
            current_page: page.current_page,
        }
    }
}

/// Plain message body for write operations that do not return a tutorial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::lorem::en::Sentence;
    use fake::Fake;
    use shared::pagination::PageRequest;

    fn sample_tutorial() -> Tutorial {
        Tutorial {
            id: 1,
            title: "Learn X".to_string(),
            description: None,
            published: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_tutorial_serializes_camel_case() {
        let json = serde_json::to_value(sample_tutorial()).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["title"], "Learn X");
        assert!(json["description"].is_null());
        assert_eq!(json["published"], false);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn test_create_request_published_defaults_to_false() {
        let request: CreateTutorialRequest =
            serde_json::from_str(r#"{"title": "Learn X"}"#).unwrap();
        assert!(!request.published);
        assert!(request.description.is_none());
    }

    #[test]
    fn test_new_tutorial_from_valid_request() {
        let title: String = Sentence(2..5).fake();
        let request = CreateTutorialRequest {
            title: Some(title.clone()),
            description: Some("Some description".to_string()),
            published: true,
        };

        let new = NewTutorial::try_from(request).unwrap();
        assert_eq!(new.title, title);
        assert_eq!(new.description.as_deref(), Some("Some description"));
        assert!(new.published);
    }

    #[test]
    fn test_new_tutorial_requires_title() {
        let errors = NewTutorial::try_from(CreateTutorialRequest::default()).unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
    }

    #[test]
    fn test_new_tutorial_rejects_blank_title() {
        let request = CreateTutorialRequest {
            title: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(NewTutorial::try_from(request).is_err());
    }

    #[test]
    fn test_new_tutorial_rejects_long_title() {
        let request = CreateTutorialRequest {
            title: Some("x".repeat(256)),
            ..Default::default()
        };
        let errors = NewTutorial::try_from(request).unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
    }

    #[test]
    fn test_long_description_is_rejected_on_create_and_update() {
        let create = CreateTutorialRequest {
            title: Some("Learn X".to_string()),
            description: Some("d".repeat(256)),
            published: false,
        };
        let errors = NewTutorial::try_from(create).unwrap_err();
        assert!(errors.field_errors().contains_key("description"));

        let update = UpdateTutorialRequest {
            description: Some(Some("d".repeat(256))),
            ..Default::default()
        };
        assert!(TutorialChanges::try_from(update).is_err());
    }

    #[test]
    fn test_changes_from_partial_request() {
        let request: UpdateTutorialRequest =
            serde_json::from_str(r#"{"published": true}"#).unwrap();
        let changes = TutorialChanges::try_from(request).unwrap();
        assert_eq!(changes, TutorialChanges::published(true));
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_null_description_clears_and_absent_keeps() {
        let request: UpdateTutorialRequest =
            serde_json::from_str(r#"{"description": null}"#).unwrap();
        let changes = TutorialChanges::try_from(request).unwrap();
        assert_eq!(changes.description, Some(None));
        assert!(!changes.is_empty());

        let request: UpdateTutorialRequest =
            serde_json::from_str(r#"{"title": "Renamed"}"#).unwrap();
        let changes = TutorialChanges::try_from(request).unwrap();
        assert_eq!(changes.description, None);

        let request: UpdateTutorialRequest =
            serde_json::from_str(r#"{"description": "New"}"#).unwrap();
        let changes = TutorialChanges::try_from(request).unwrap();
        assert_eq!(changes.description, Some(Some("New".to_string())));
    }

    #[test]
    fn test_changes_reject_blank_title() {
        let request = UpdateTutorialRequest {
            title: Some(String::new()),
            ..Default::default()
        };
        assert!(TutorialChanges::try_from(request).is_err());
    }

    #[test]
    fn test_empty_changes() {
        let changes = TutorialChanges::try_from(UpdateTutorialRequest::default()).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_list_query_paging_detection() {
        let query: ListTutorialsQuery = serde_json::from_str(r#"{"title": ""}"#).unwrap();
        assert!(!query.is_paged());
        assert_eq!(query.title_filter(), None);

        let query: ListTutorialsQuery =
            serde_json::from_str(r#"{"title": "rust", "page": 1}"#).unwrap();
        assert!(query.is_paged());
        assert_eq!(query.title_filter(), Some("rust"));
    }

    #[test]
    fn test_page_response_uses_tutorials_key() {
        let page = Page::new(vec![sample_tutorial()], 4, PageRequest::new(Some(0), Some(3)));
        let json = serde_json::to_value(TutorialPageResponse::from(page)).unwrap();
        assert_eq!(json["totalItems"], 4);
        assert_eq!(json["totalPages"], 2);
        assert_eq!(json["currentPage"], 0);
        assert_eq!(json["tutorials"].as_array().unwrap().len(), 1);
    }
}
