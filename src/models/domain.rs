use serde::{Deserialize, Serialize};

use crate::core::vocabulary::{
    Availability, Ethnicity, Gender, LocationCode, SkillCategory, TravelRadius, UnionStatus,
};

/// Sanitized structured intent extracted from a single user turn
///
/// Every enumerated field is either empty or a member of its closed
/// vocabulary. Heights are inches, weights are pounds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub gender: Option<Gender>,
    pub location: Option<LocationCode>,
    #[serde(default)]
    pub ethnicities: Vec<Ethnicity>,
    pub height_min: Option<u16>,
    pub height_max: Option<u16>,
    pub weight_min: Option<u16>,
    pub weight_max: Option<u16>,
    #[serde(default)]
    pub skills: Vec<SkillCategory>,
    pub union_status: Option<UnionStatus>,
    pub availability: Option<Availability>,
    pub travel_radius: Option<TravelRadius>,
    #[serde(default)]
    pub broad_search: bool,
    #[serde(default)]
    pub confidence: f64,
}

impl ParsedQuery {
    /// All-null query with zero confidence, used whenever interpretation fails
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether any optional filter is populated
    pub fn has_filters(&self) -> bool {
        self.gender.is_some()
            || self.location.is_some()
            || !self.ethnicities.is_empty()
            || self.height_min.is_some()
            || self.height_max.is_some()
            || self.weight_min.is_some()
            || self.weight_max.is_some()
            || !self.skills.is_empty()
            || self.union_status.is_some()
            || self.availability.is_some()
            || self.travel_radius.is_some()
    }
}

/// Performer profile as read from the candidate store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    pub id: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub ethnicity: Option<String>,
    #[serde(default)]
    pub height_inches: Option<u16>,
    #[serde(default)]
    pub weight_lbs: Option<u16>,
    /// Primary structured location code
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub secondary_location: Option<String>,
    /// Unstructured location as typed by the performer
    #[serde(default)]
    pub location_text: Option<String>,
    #[serde(default)]
    pub union_status: Option<String>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub travel_radius: Option<String>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub certifications: Vec<Certification>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub imdb_url: Option<String>,
    #[serde(default)]
    pub resume_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    pub roster_ids: Vec<String>,
}

impl CandidateProfile {
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref().filter(|name| !name.trim().is_empty()) {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }

    pub fn has_contact(&self) -> bool {
        has_text(&self.email) || has_text(&self.phone)
    }

    pub fn has_external_links(&self) -> bool {
        has_text(&self.website_url) || has_text(&self.imdb_url) || has_text(&self.resume_url)
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn default_true() -> bool { true }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Certification {
    pub name: String,
    #[serde(default)]
    pub issuer: Option<String>,
}

/// How a `QueryResult` was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Structured,
    Fallback,
    /// Reserved for semantic retrieval; never produced by this service
    Vector,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Structured => "structured",
            SearchMethod::Fallback => "fallback",
            SearchMethod::Vector => "vector",
        }
    }
}

/// Ranked retrieval output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub profiles: Vec<CandidateProfile>,
    pub method: SearchMethod,
    pub total_matched: usize,
    pub filters_applied: Vec<String>,
}

/// Final answer returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResult {
    pub response_text: String,
    pub profile_ids: Vec<String>,
    pub search_stats: SearchStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    pub method: SearchMethod,
    pub total_found: usize,
    pub filters_applied: Vec<String>,
    pub confidence: f64,
}

/// One prior conversation turn supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// Externally supplied context for one candidate, e.g. resume highlights
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrichment {
    pub profile_id: String,
    pub highlights: Vec<String>,
}

/// Completeness weights for ranking
#[derive(Debug, Clone, Copy)]
pub struct CompletenessWeights {
    pub bio: f64,
    pub contact: f64,
    pub physical: f64,
    pub location: f64,
    pub skills: f64,
    pub certifications: f64,
    pub photos: f64,
    pub links: f64,
}

impl Default for CompletenessWeights {
    fn default() -> Self {
        Self {
            bio: 10.0,
            contact: 5.0,
            physical: 10.0,
            location: 10.0,
            skills: 20.0,
            certifications: 10.0,
            photos: 25.0,
            links: 10.0,
        }
    }
}
