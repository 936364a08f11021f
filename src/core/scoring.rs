use crate::models::{CandidateProfile, CompletenessWeights};

/// Calculate a completeness score (0-100) for a profile
///
/// Scoring formula:
/// score = (
///     bio            +    # non-empty bio
///     contact        +    # email or phone
///     physical       +    # height and weight both recorded
///     location       +    # structured or free-text location
///     skills         +    # at least one skill
///     certifications +    # at least one certification
///     photos         +    # at least one photo
///     links               # website, IMDb or resume
/// ) / sum(weights) * 100
pub fn calculate_completeness_score(
    profile: &CandidateProfile,
    weights: &CompletenessWeights,
) -> f64 {
    let total_weight = weights.bio
        + weights.contact
        + weights.physical
        + weights.location
        + weights.skills
        + weights.certifications
        + weights.photos
        + weights.links;

    if total_weight <= 0.0 {
        return 0.0;
    }

    let earned = flag(has_bio(profile)) * weights.bio
        + flag(profile.has_contact()) * weights.contact
        + flag(has_physical(profile)) * weights.physical
        + flag(has_location(profile)) * weights.location
        + flag(!profile.skills.is_empty()) * weights.skills
        + flag(!profile.certifications.is_empty()) * weights.certifications
        + flag(!profile.photo_urls.is_empty()) * weights.photos
        + flag(profile.has_external_links()) * weights.links;

    (earned / total_weight * 100.0).clamp(0.0, 100.0)
}

#[inline]
fn flag(present: bool) -> f64 {
    if present { 1.0 } else { 0.0 }
}

fn has_bio(profile: &CandidateProfile) -> bool {
    profile.bio.as_deref().is_some_and(|b| !b.trim().is_empty())
}

fn has_physical(profile: &CandidateProfile) -> bool {
    profile.height_inches.is_some() && profile.weight_lbs.is_some()
}

fn has_location(profile: &CandidateProfile) -> bool {
    [&profile.location, &profile.secondary_location, &profile.location_text]
        .iter()
        .any(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()))
}
