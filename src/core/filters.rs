use crate::core::vocabulary::{
    Availability, Ethnicity, Gender, LocationCode, SkillCategory, TravelRadius, UnionStatus,
};
use crate::models::{CandidateProfile, ParsedQuery};

/// Extra inches added on each side of a parsed height band
pub const HEIGHT_TOLERANCE_IN: u16 = 3;
/// Extra pounds added on each side of a parsed weight band
pub const WEIGHT_TOLERANCE_LBS: u16 = 10;
/// Absolute height domain in inches
pub const HEIGHT_DOMAIN: (u16, u16) = (48, 96);
/// Absolute weight domain in pounds
pub const WEIGHT_DOMAIN: (u16, u16) = (80, 400);

/// Inclusive numeric band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericRange {
    pub min: u16,
    pub max: u16,
}

impl NumericRange {
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Structured location predicate, optionally OR'd with a free-text match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationFilter {
    pub code: LocationCode,
    /// Lowercase fragment matched against the unstructured location field
    pub free_text: Option<String>,
}

/// Store-side candidate predicate
///
/// Visibility is always required. Everything else is optional and only
/// constrains when populated. `limit` is `None` for filtered reads so that
/// ranking sees the whole matched set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFilter {
    pub scope_id: Option<String>,
    pub gender: Option<Gender>,
    pub ethnicities: Vec<Ethnicity>,
    pub height: Option<NumericRange>,
    pub weight: Option<NumericRange>,
    pub availability: Option<Availability>,
    /// Tiers that satisfy the requested travel radius; empty means unconstrained
    pub travel_tiers: Vec<TravelRadius>,
    pub union_status: Option<UnionStatus>,
    pub location: Option<LocationFilter>,
    /// Any declared skill must overlap one of these categories
    pub skills: Vec<SkillCategory>,
    pub limit: Option<usize>,
}

/// Everything the retriever needs for one filtered read
#[derive(Debug, Clone)]
pub struct FilterPlan {
    pub filter: CandidateFilter,
    /// Human-readable audit trail, in application order
    pub filters_applied: Vec<String>,
}

/// Widen a parsed band by `tolerance` on each populated side, clamped to `domain`
///
/// A missing side extends to the domain bound. Returns `None` when neither
/// side is populated.
pub fn widen_range(
    min: Option<u16>,
    max: Option<u16>,
    tolerance: u16,
    domain: (u16, u16),
) -> Option<NumericRange> {
    if min.is_none() && max.is_none() {
        return None;
    }

    let lo = min
        .map(|v| v.saturating_sub(tolerance))
        .unwrap_or(domain.0)
        .clamp(domain.0, domain.1);
    let hi = max
        .map(|v| v.saturating_add(tolerance))
        .unwrap_or(domain.1)
        .clamp(domain.0, domain.1);

    Some(if lo <= hi {
        NumericRange { min: lo, max: hi }
    } else {
        NumericRange { min: hi, max: lo }
    })
}

/// Translate a parsed query into a store predicate plus audit trail
pub fn build_filter_plan(parsed: &ParsedQuery, scope_id: Option<&str>) -> FilterPlan {
    let mut applied = Vec::new();
    let mut filter = CandidateFilter::default();

    if let Some(scope) = scope_id.map(str::trim).filter(|s| !s.is_empty()) {
        filter.scope_id = Some(scope.to_string());
        applied.push(format!("scope: {}", scope));
    }

    if let Some(gender) = parsed.gender {
        filter.gender = Some(gender);
        applied.push(format!("gender: {}", gender));
    }

    if let Some(code) = parsed.location {
        let free_text = parsed.broad_search.then(|| code.city().to_string());
        match &free_text {
            Some(text) => applied.push(format!("location: {} (or mentions '{}')", code, text)),
            None => applied.push(format!("location: {}", code)),
        }
        filter.location = Some(LocationFilter { code, free_text });
    }

    if !parsed.ethnicities.is_empty() {
        filter.ethnicities = parsed.ethnicities.clone();
        applied.push(format!("ethnicity: {}", join_codes(&parsed.ethnicities)));
    }

    filter.height = widen_range(
        parsed.height_min,
        parsed.height_max,
        HEIGHT_TOLERANCE_IN,
        HEIGHT_DOMAIN,
    );
    if let Some(range) = filter.height {
        applied.push(format!("height: {}-{} in", range.min, range.max));
    }

    filter.weight = widen_range(
        parsed.weight_min,
        parsed.weight_max,
        WEIGHT_TOLERANCE_LBS,
        WEIGHT_DOMAIN,
    );
    if let Some(range) = filter.weight {
        applied.push(format!("weight: {}-{} lbs", range.min, range.max));
    }

    if !parsed.skills.is_empty() {
        filter.skills = parsed.skills.clone();
        applied.push(format!("skills: {}", join_codes(&parsed.skills)));
    }

    if let Some(status) = parsed.union_status {
        filter.union_status = Some(status);
        applied.push(format!("union: {}", status));
    }

    if let Some(availability) = parsed.availability {
        filter.availability = Some(availability);
        applied.push(format!("availability: {}", availability));
    }

    if let Some(tier) = parsed.travel_radius {
        filter.travel_tiers = tier.at_least();
        applied.push(format!("travel radius: {} or wider", tier));
    }

    if parsed.broad_search {
        applied.push("broad search".to_string());
    }

    FilterPlan {
        filter,
        filters_applied: applied,
    }
}

fn join_codes<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check a profile against every store-side predicate
#[inline]
pub fn matches_filter(profile: &CandidateProfile, filter: &CandidateFilter) -> bool {
    if !profile.is_visible {
        return false;
    }

    if let Some(scope) = &filter.scope_id {
        if !profile.roster_ids.iter().any(|id| id == scope) {
            return false;
        }
    }

    if let Some(gender) = filter.gender {
        if !code_matches(profile.gender.as_deref(), gender.code()) {
            return false;
        }
    }

    if !filter.ethnicities.is_empty()
        && !filter
            .ethnicities
            .iter()
            .any(|e| code_matches(profile.ethnicity.as_deref(), e.code()))
    {
        return false;
    }

    if let Some(range) = filter.height {
        if !profile.height_inches.is_some_and(|h| range.contains(h)) {
            return false;
        }
    }

    if let Some(range) = filter.weight {
        if !profile.weight_lbs.is_some_and(|w| range.contains(w)) {
            return false;
        }
    }

    if let Some(availability) = filter.availability {
        if !code_matches(profile.availability.as_deref(), availability.code()) {
            return false;
        }
    }

    if !filter.travel_tiers.is_empty() {
        let tier = profile.travel_radius.as_deref().and_then(TravelRadius::from_code);
        if !tier.is_some_and(|t| filter.travel_tiers.contains(&t)) {
            return false;
        }
    }

    if let Some(status) = filter.union_status {
        if !matches_union(profile.union_status.as_deref(), status) {
            return false;
        }
    }

    if let Some(location) = &filter.location {
        if !matches_location(profile, location) {
            return false;
        }
    }

    matches_skills(profile, &filter.skills)
}

fn code_matches(value: Option<&str>, code: &str) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case(code))
}

/// Approximate union match on recorded union names
pub fn matches_union(recorded: Option<&str>, status: UnionStatus) -> bool {
    match recorded.map(str::trim).filter(|r| !r.is_empty()) {
        None => status.matches_unrecorded(),
        Some(value) => {
            let value = value.to_lowercase();
            status
                .name_fragments()
                .iter()
                .any(|fragment| value.contains(fragment))
        }
    }
}

/// Structured code on either location slot, OR loose free-text mention
pub fn matches_location(profile: &CandidateProfile, location: &LocationFilter) -> bool {
    let code = location.code.code();
    if code_matches(profile.location.as_deref(), code)
        || code_matches(profile.secondary_location.as_deref(), code)
    {
        return true;
    }

    match (&location.free_text, profile.location_text.as_deref()) {
        (Some(fragment), Some(text)) => text.to_lowercase().contains(fragment.as_str()),
        _ => false,
    }
}

/// Whether any declared skill overlaps any requested category
///
/// Overlap is a bidirectional case-insensitive substring test against the
/// category code itself or any of its synonyms. An empty request matches
/// every profile.
pub fn matches_skills(profile: &CandidateProfile, categories: &[SkillCategory]) -> bool {
    if categories.is_empty() {
        return true;
    }

    profile
        .skills
        .iter()
        .flat_map(|skill| skill_tokens(&skill.name))
        .any(|token| {
            categories
                .iter()
                .any(|category| skill_matches_category(&token, *category))
        })
}

/// Shortest skill token considered for substring overlap
const MIN_TOKEN_LEN: usize = 3;

fn skill_tokens(name: &str) -> Vec<String> {
    name.split([',', '/', ';', '&'])
        .map(|part| part.trim().to_lowercase())
        .filter(|part| part.chars().count() >= MIN_TOKEN_LEN)
        .collect()
}

/// Direct or synonym overlap between one skill token and a category
pub fn skill_matches_category(token: &str, category: SkillCategory) -> bool {
    let token = token.trim().to_lowercase();
    if token.chars().count() < MIN_TOKEN_LEN {
        return false;
    }

    let direct = category.code().replace('-', " ");
    if overlaps(&token, &direct) || overlaps(&token, category.code()) {
        return true;
    }

    category
        .synonyms()
        .iter()
        .any(|synonym| overlaps(&token, synonym))
}

/// Lowercase terms a skill token is compared against, for store-side matching
pub fn skill_terms(categories: &[SkillCategory]) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for category in categories {
        let candidates = [category.code().to_string(), category.code().replace('-', " ")];
        for term in candidates
            .into_iter()
            .chain(category.synonyms().iter().map(|s| s.to_lowercase()))
        {
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
    }
    terms
}

#[inline]
fn overlaps(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}
