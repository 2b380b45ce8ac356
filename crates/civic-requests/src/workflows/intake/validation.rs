//! Field rules for citizen submissions plus the stateless label predicates.

use mime::Mime;
use serde::{Serialize, Serializer};

use super::domain::{Category, Priority, RequestId, RequestStatus, RequestSubmission};
use super::ids;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MIN_REGION_CHARS: usize = 5;
pub const MAX_REGION_CHARS: usize = 200;
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// A single violated rule. `Display` yields the message shown to citizens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    #[error("Title is required")]
    MissingTitle,
    #[error("Title must be 100 characters or less")]
    TitleTooLong,
    #[error("Category must be one of: {}", category_list())]
    UnknownCategory,
    #[error("Region is required")]
    MissingRegion,
    #[error("Region must be between 5 and 200 characters")]
    RegionLength,
    #[error("City/Woreda is required")]
    MissingCity,
    #[error("User ID is required")]
    MissingUserId,
    #[error("Image must be JPEG or PNG format")]
    UnsupportedImageType,
    #[error("Image size must be less than 5MB")]
    ImageTooLarge,
}

fn category_list() -> String {
    Category::ALL
        .iter()
        .map(Category::label)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Serialize for ValidationIssue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of validating a submission; issues are kept in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn contains(&self, issue: &ValidationIssue) -> bool {
        self.errors.contains(issue)
    }
}

pub fn validate_submission(submission: &RequestSubmission) -> ValidationReport {
    let mut errors = Vec::new();

    let title = submission.title.as_str();
    if title.trim().is_empty() {
        errors.push(ValidationIssue::MissingTitle);
    } else if title.chars().count() > MAX_TITLE_CHARS {
        errors.push(ValidationIssue::TitleTooLong);
    }

    if Category::parse(&submission.category).is_none() {
        errors.push(ValidationIssue::UnknownCategory);
    }

    let region = submission.region.trim();
    if region.is_empty() {
        errors.push(ValidationIssue::MissingRegion);
    } else if !(MIN_REGION_CHARS..=MAX_REGION_CHARS).contains(&region.chars().count()) {
        errors.push(ValidationIssue::RegionLength);
    }

    if submission.city.trim().is_empty() {
        errors.push(ValidationIssue::MissingCity);
    }

    if submission.user_id.trim().is_empty() {
        errors.push(ValidationIssue::MissingUserId);
    }

    if let Some(image) = &submission.image {
        if !is_accepted_image_type(&image.content_type) {
            errors.push(ValidationIssue::UnsupportedImageType);
        }
        if image.size_bytes > MAX_IMAGE_BYTES {
            errors.push(ValidationIssue::ImageTooLarge);
        }
    }

    ValidationReport { errors }
}

/// JPEG (including the non-standard `image/jpg`) and PNG are the only accepted photos.
pub fn is_accepted_image_type(content_type: &str) -> bool {
    match content_type.trim().parse::<Mime>() {
        Ok(parsed) => {
            parsed.type_() == mime::IMAGE
                && (parsed.subtype() == mime::JPEG
                    || parsed.subtype() == mime::PNG
                    || parsed.subtype() == "jpg")
        }
        Err(_) => false,
    }
}

pub fn is_valid_request_id(value: &str) -> bool {
    ids::is_well_formed(value, RequestId::PREFIX)
}

pub fn is_valid_status(value: &str) -> bool {
    RequestStatus::parse(value).is_some()
}

pub fn is_valid_priority(value: &str) -> bool {
    Priority::parse(value).is_some()
}
