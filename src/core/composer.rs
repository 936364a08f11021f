use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::core::pipeline::StageOutcome;
use crate::core::trailer::{parse_trailer, render_trailer, strip_trailer};
use crate::core::vocabulary::LocationCode;
use crate::models::{
    CandidateProfile, Enrichment, ParsedQuery, QueryResult, RecommendationResult, SearchMethod,
    SearchStats, Turn,
};
use crate::services::llm::{
    ChatMessage, GenerationError, GenerationPurpose, GenerationRequest, TextGenerator,
};

const BIO_EXCERPT_CHARS: usize = 240;

#[derive(Debug, Clone)]
pub struct ComposerSettings {
    /// Upper bound on identifiers accepted from the model
    pub max_recommendations: usize,
    /// Identifiers returned when the model output is unusable
    pub fallback_count: usize,
    pub history_window: usize,
    pub dossier_limit: usize,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            max_recommendations: 4,
            fallback_count: 3,
            history_window: 6,
            dossier_limit: 15,
            timeout: Duration::from_secs(30),
            max_tokens: 700,
        }
    }
}

/// Writes the recommendation prose and picks the recommended identifiers
pub struct RecommendationComposer {
    generator: Arc<dyn TextGenerator>,
    settings: ComposerSettings,
}

impl RecommendationComposer {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: ComposerSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    /// Compose a recommendation. Never fails.
    ///
    /// Identifiers always come from `result.profiles`; the list is empty only
    /// when the candidate pool is empty.
    pub async fn compose(
        &self,
        original_message: &str,
        parsed: &ParsedQuery,
        result: &QueryResult,
        history: &[Turn],
        enrichment: &[Enrichment],
    ) -> RecommendationResult {
        self.compose_with_outcome(original_message, parsed, result, history, enrichment)
            .await
            .0
    }

    /// Like `compose`, also reporting whether the deterministic fallback was used
    pub async fn compose_with_outcome(
        &self,
        original_message: &str,
        parsed: &ParsedQuery,
        result: &QueryResult,
        history: &[Turn],
        enrichment: &[Enrichment],
    ) -> (RecommendationResult, StageOutcome) {
        let search_stats = SearchStats {
            method: result.method,
            total_found: result.total_matched,
            filters_applied: result.filters_applied.clone(),
            confidence: parsed.confidence,
        };

        if result.profiles.is_empty() {
            let empty = RecommendationResult {
                response_text: no_matches_message(result),
                profile_ids: Vec::new(),
                search_stats,
            };
            return (empty, StageOutcome::Fallback);
        }

        let dossier = &result.profiles[..result.profiles.len().min(self.settings.dossier_limit)];

        let ((response_text, profile_ids), outcome) = match self
            .generate(original_message, parsed, result, dossier, history, enrichment)
            .await
        {
            Ok(text) => match self.accept(&text, dossier) {
                Some(accepted) => (accepted, StageOutcome::Success),
                None => {
                    tracing::warn!("Composer output had no usable profile trailer, using fallback");
                    (self.fallback(dossier), StageOutcome::Fallback)
                }
            },
            Err(e) => {
                tracing::warn!("Composition failed, using fallback: {}", e);
                (self.fallback(dossier), StageOutcome::Fallback)
            }
        };

        let recommendation = RecommendationResult {
            response_text,
            profile_ids,
            search_stats,
        };
        (recommendation, outcome)
    }

    async fn generate(
        &self,
        original_message: &str,
        parsed: &ParsedQuery,
        result: &QueryResult,
        dossier: &[CandidateProfile],
        history: &[Turn],
        enrichment: &[Enrichment],
    ) -> Result<String, GenerationError> {
        let start = history.len().saturating_sub(self.settings.history_window);
        let mut messages: Vec<ChatMessage> = history[start..]
            .iter()
            .map(|turn| ChatMessage::new(turn.role.as_str(), turn.content.clone()))
            .collect();
        messages.push(ChatMessage::new(
            "user",
            build_context(original_message, parsed, result, dossier, enrichment),
        ));

        let request = GenerationRequest {
            purpose: GenerationPurpose::Compose,
            system: composer_prompt(self.settings.max_recommendations),
            messages,
            json_mode: false,
            max_tokens: self.settings.max_tokens,
            temperature: Some(0.7),
        };

        tokio::time::timeout(self.settings.timeout, self.generator.generate(&request))
            .await
            .map_err(|_| GenerationError::Timeout(self.settings.timeout))?
    }

    /// Prose and ids from model output, or `None` when no dossier id survives
    fn accept(&self, text: &str, dossier: &[CandidateProfile]) -> Option<(String, Vec<String>)> {
        let mut ids = parse_trailer(text)?;
        ids.retain(|id| dossier.iter().any(|p| &p.id == id));
        ids.truncate(self.settings.max_recommendations);

        if ids.is_empty() {
            return None;
        }

        let prose = strip_trailer(text);
        if prose.is_empty() {
            let chosen: Vec<&CandidateProfile> = ids
                .iter()
                .filter_map(|id| dossier.iter().find(|p| &p.id == id))
                .collect();
            return Some((summary_sentence(&chosen), ids));
        }

        Some((prose, ids))
    }

    /// First ranked dossier entries with a templated sentence
    fn fallback(&self, dossier: &[CandidateProfile]) -> (String, Vec<String>) {
        let chosen: Vec<&CandidateProfile> = dossier
            .iter()
            .take(self.settings.fallback_count)
            .collect();
        let ids = chosen.iter().map(|p| p.id.clone()).collect();
        (summary_sentence(&chosen), ids)
    }
}

fn composer_prompt(max_recommendations: usize) -> String {
    let example = render_trailer(&["id1".to_string(), "id2".to_string()]);
    format!(
        r#"You are a casting assistant recommending stunt performers and actors.

You receive the casting request, the filters that were applied and a dossier of candidates.
Recommend at most {max} candidates, drawn ONLY from the dossier. Never invent people, credits or ids.
Explain briefly why each one fits. If the filters were relaxed, say so plainly.

End your reply with exactly one line in this format, listing the ids you recommended:
{example}"#,
        max = max_recommendations,
        example = example
    )
}

fn build_context(
    original_message: &str,
    parsed: &ParsedQuery,
    result: &QueryResult,
    dossier: &[CandidateProfile],
    enrichment: &[Enrichment],
) -> String {
    let highlights: HashMap<&str, &[String]> = enrichment
        .iter()
        .map(|e| (e.profile_id.as_str(), e.highlights.as_slice()))
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "Casting request: {}", original_message.trim());

    if result.filters_applied.is_empty() {
        let _ = writeln!(out, "Filters applied: none");
    } else {
        let _ = writeln!(out, "Filters applied: {}", result.filters_applied.join("; "));
    }
    if result.method == SearchMethod::Fallback {
        let _ = writeln!(out, "Note: the filtered search failed, these are general candidates.");
    }
    let _ = writeln!(out, "Interpretation confidence: {:.2}", parsed.confidence);
    let _ = writeln!(
        out,
        "Candidates ({} shown of {} matched):",
        dossier.len(),
        result.total_matched
    );

    for profile in dossier {
        out.push('\n');
        out.push_str(&dossier_entry(
            profile,
            highlights.get(profile.id.as_str()).copied().unwrap_or(&[]),
        ));
    }

    out
}

/// One candidate serialized for the model
pub fn dossier_entry(profile: &CandidateProfile, highlights: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "- id: {}", profile.id);
    let _ = writeln!(out, "  name: {}", profile.display_name());

    let mut places: Vec<String> = [&profile.location, &profile.secondary_location]
        .iter()
        .filter_map(|code| code.as_deref())
        .map(location_label)
        .collect();
    if let Some(text) = profile.location_text.as_deref().filter(|t| !t.trim().is_empty()) {
        places.push(text.trim().to_string());
    }
    if !places.is_empty() {
        let _ = writeln!(out, "  location: {}", places.join(" / "));
    }

    let mut physical = Vec::new();
    if let Some(gender) = &profile.gender {
        physical.push(gender.clone());
    }
    if let Some(ethnicity) = &profile.ethnicity {
        physical.push(ethnicity.clone());
    }
    if let Some(height) = profile.height_inches {
        physical.push(format_height(height));
    }
    if let Some(weight) = profile.weight_lbs {
        physical.push(format!("{} lbs", weight));
    }
    if !physical.is_empty() {
        let _ = writeln!(out, "  physical: {}", physical.join(", "));
    }

    let status: Vec<String> = [
        ("union", &profile.union_status),
        ("availability", &profile.availability),
        ("travel", &profile.travel_radius),
    ]
    .iter()
    .filter_map(|(label, value)| value.as_deref().map(|v| format!("{} {}", label, v)))
    .collect();
    if !status.is_empty() {
        let _ = writeln!(out, "  status: {}", status.join(", "));
    }

    if !profile.skills.is_empty() {
        let skills: Vec<String> = profile
            .skills
            .iter()
            .map(|s| match &s.level {
                Some(level) => format!("{} ({})", s.name, level),
                None => s.name.clone(),
            })
            .collect();
        let _ = writeln!(out, "  skills: {}", skills.join(", "));
    }

    if !profile.certifications.is_empty() {
        let certs: Vec<String> = profile
            .certifications
            .iter()
            .map(|c| match &c.issuer {
                Some(issuer) => format!("{} ({})", c.name, issuer),
                None => c.name.clone(),
            })
            .collect();
        let _ = writeln!(out, "  certifications: {}", certs.join(", "));
    }

    if let Some(bio) = profile.bio.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        let excerpt: String = bio.chars().take(BIO_EXCERPT_CHARS).collect();
        let ellipsis = if bio.chars().count() > BIO_EXCERPT_CHARS { "..." } else { "" };
        let _ = writeln!(out, "  bio: {}{}", excerpt, ellipsis);
    }

    if !highlights.is_empty() {
        let _ = writeln!(out, "  highlights: {}", highlights.join("; "));
    }

    out
}

fn location_label(code: &str) -> String {
    LocationCode::from_code(code)
        .map(|c| c.display_name().to_string())
        .unwrap_or_else(|| code.to_string())
}

/// 68 -> 5'8"
pub fn format_height(inches: u16) -> String {
    format!("{}'{}\"", inches / 12, inches % 12)
}

fn summary_sentence(chosen: &[&CandidateProfile]) -> String {
    let names: Vec<String> = chosen.iter().map(|p| p.display_name()).collect();
    match names.as_slice() {
        [] => "I couldn't find performers matching that request.".to_string(),
        [only] => format!("Here is a performer who may fit your request: {}.", only),
        [init @ .., last] => format!(
            "Here are {} performers who may fit your request: {} and {}.",
            names.len(),
            init.join(", "),
            last
        ),
    }
}

fn no_matches_message(result: &QueryResult) -> String {
    if result.method == SearchMethod::Fallback {
        "I couldn't reach the performer directory just now. Please try again in a moment.".to_string()
    } else {
        "I couldn't find any performers matching that request. Try loosening a requirement such as height, location or skills.".to_string()
    }
}
