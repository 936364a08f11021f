//! Free text to `ParsedQuery`.
//!
//! Two implementations share one trait: `LlmInterpreter` asks the generative
//! service for a closed-vocabulary JSON object and re-validates every field,
//! `KeywordInterpreter` is a deterministic rule-based parser used offline and
//! in tests. Neither ever fails outward: any error yields `ParsedQuery::empty()`.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use crate::core::filters::{HEIGHT_DOMAIN, WEIGHT_DOMAIN};
use crate::core::vocabulary::{
    Availability, Ethnicity, Gender, LocationCode, SkillCategory, TravelRadius, UnionStatus,
};
use crate::models::{ParsedQuery, Turn};
use crate::services::llm::{
    ChatMessage, GenerationError, GenerationPurpose, GenerationRequest, TextGenerator,
};

/// Half-width of the band a single explicit height is expanded into
pub const SINGLE_HEIGHT_BAND_IN: u16 = 2;

#[async_trait]
pub trait QueryInterpreter: Send + Sync {
    /// Interpret one user utterance. Never fails; degrades to an empty query.
    async fn interpret(&self, message: &str, history: &[Turn]) -> ParsedQuery;
}

/// A field value dropped or nulled during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRejection {
    pub field: &'static str,
    pub value: String,
}

/// Output of the validation pass
#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    pub query: ParsedQuery,
    pub rejections: Vec<ValidationRejection>,
}

/// Interpreter backed by the generative text service
pub struct LlmInterpreter {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    history_window: usize,
}

impl LlmInterpreter {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self {
            generator,
            timeout,
            history_window: 4,
        }
    }

    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    /// Interpret, surfacing generation failures to the caller
    pub async fn try_interpret(
        &self,
        message: &str,
        history: &[Turn],
    ) -> Result<ParsedQuery, GenerationError> {
        let start = history.len().saturating_sub(self.history_window);
        let mut messages: Vec<ChatMessage> = history[start..]
            .iter()
            .map(|turn| ChatMessage::new(turn.role.as_str(), turn.content.clone()))
            .collect();
        messages.push(ChatMessage::new("user", message));

        let request = GenerationRequest {
            purpose: GenerationPurpose::Interpret,
            system: INTERPRETER_PROMPT.clone(),
            messages,
            json_mode: true,
            max_tokens: 400,
            temperature: Some(0.0),
        };

        let raw = tokio::time::timeout(self.timeout, self.generator.generate(&request))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))??;

        let value = extract_json_object(&raw)?;
        let validated = validate_parsed_query(&value);
        for rejection in &validated.rejections {
            tracing::debug!(
                "Rejected out-of-vocabulary value for {}: {}",
                rejection.field,
                rejection.value
            );
        }

        Ok(validated.query)
    }
}

#[async_trait]
impl QueryInterpreter for LlmInterpreter {
    async fn interpret(&self, message: &str, history: &[Turn]) -> ParsedQuery {
        match self.try_interpret(message, history).await {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!("Query interpretation failed, continuing unfiltered: {}", e);
                ParsedQuery::empty()
            }
        }
    }
}

/// Pull the outermost JSON object out of model output
///
/// Tolerates markdown fences and surrounding prose.
pub fn extract_json_object(raw: &str) -> Result<Value, GenerationError> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let unfenced = unfenced.strip_suffix("```").unwrap_or(unfenced).trim();

    let start = unfenced
        .find('{')
        .ok_or_else(|| GenerationError::Malformed("no JSON object in output".to_string()))?;
    let end = unfenced
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| GenerationError::Malformed("unterminated JSON object".to_string()))?;

    let value: Value = serde_json::from_str(&unfenced[start..=end])
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;

    if value.is_object() {
        Ok(value)
    } else {
        Err(GenerationError::Malformed("output is not a JSON object".to_string()))
    }
}

/// Re-check every field of raw model output against its vocabulary
///
/// Invalid scalars become null, invalid array members are dropped,
/// `confidence` is clamped to [0, 1] and a non-boolean `broad_search` becomes
/// `false`. Returns a sanitized copy; the input is never modified.
pub fn validate_parsed_query(raw: &Value) -> ValidatedQuery {
    let mut rejections = Vec::new();

    let Some(obj) = raw.as_object() else {
        rejections.push(ValidationRejection {
            field: "*",
            value: raw.to_string(),
        });
        return ValidatedQuery {
            query: ParsedQuery::empty(),
            rejections,
        };
    };

    let mut query = ParsedQuery {
        gender: scalar(obj, "gender", Gender::from_code, &mut rejections),
        location: scalar(obj, "location", LocationCode::from_code, &mut rejections),
        ethnicities: members(obj, "ethnicities", Ethnicity::from_code, &mut rejections),
        height_min: number(obj, "height_min", HEIGHT_DOMAIN, &mut rejections),
        height_max: number(obj, "height_max", HEIGHT_DOMAIN, &mut rejections),
        weight_min: number(obj, "weight_min", WEIGHT_DOMAIN, &mut rejections),
        weight_max: number(obj, "weight_max", WEIGHT_DOMAIN, &mut rejections),
        skills: members(obj, "skills", SkillCategory::from_code, &mut rejections),
        union_status: scalar(obj, "union_status", UnionStatus::from_code, &mut rejections),
        availability: scalar(obj, "availability", Availability::from_code, &mut rejections),
        travel_radius: scalar(obj, "travel_radius", TravelRadius::from_code, &mut rejections),
        broad_search: match obj.get("broad_search") {
            Some(Value::Bool(flag)) => *flag,
            None | Some(Value::Null) => false,
            Some(other) => {
                rejections.push(rejection("broad_search", other));
                false
            }
        },
        confidence: confidence(obj.get("confidence"), &mut rejections),
    };

    normalize_bands(&mut query);

    ValidatedQuery { query, rejections }
}

fn rejection(field: &'static str, value: &Value) -> ValidationRejection {
    ValidationRejection {
        field,
        value: value.to_string(),
    }
}

fn scalar<T>(
    obj: &Map<String, Value>,
    field: &'static str,
    parse: fn(&str) -> Option<T>,
    rejections: &mut Vec<ValidationRejection>,
) -> Option<T> {
    match obj.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value @ Value::String(s)) => {
            let parsed = parse(s);
            if parsed.is_none() {
                rejections.push(rejection(field, value));
            }
            parsed
        }
        Some(other) => {
            rejections.push(rejection(field, other));
            None
        }
    }
}

fn members<T: PartialEq>(
    obj: &Map<String, Value>,
    field: &'static str,
    parse: fn(&str) -> Option<T>,
    rejections: &mut Vec<ValidationRejection>,
) -> Vec<T> {
    let items: Vec<&Value> = match obj.get(field) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::String(_)) => vec![single],
        Some(other) => {
            rejections.push(rejection(field, other));
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for item in items {
        match item.as_str().and_then(parse) {
            Some(member) if !out.contains(&member) => out.push(member),
            Some(_) => {}
            None => rejections.push(rejection(field, item)),
        }
    }
    out
}

fn number(
    obj: &Map<String, Value>,
    field: &'static str,
    domain: (u16, u16),
    rejections: &mut Vec<ValidationRejection>,
) -> Option<u16> {
    let value = obj.get(field)?;
    let parsed = match value {
        Value::Null => return None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed.map(f64::round) {
        Some(n) if n >= domain.0 as f64 && n <= domain.1 as f64 => Some(n as u16),
        _ => {
            rejections.push(rejection(field, value));
            None
        }
    }
}

fn confidence(value: Option<&Value>, rejections: &mut Vec<ValidationRejection>) -> f64 {
    let parsed = match value {
        None | Some(Value::Null) => return 0.0,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed.filter(|c| c.is_finite()) {
        Some(c) => c.clamp(0.0, 1.0),
        None => {
            if let Some(value) = value {
                rejections.push(rejection("confidence", value));
            }
            0.0
        }
    }
}

/// Order swapped bounds and widen a single explicit height into a band
fn normalize_bands(query: &mut ParsedQuery) {
    if let (Some(lo), Some(hi)) = (query.height_min, query.height_max) {
        if lo > hi {
            query.height_min = Some(hi);
            query.height_max = Some(lo);
        } else if lo == hi {
            query.height_min = Some(lo.saturating_sub(SINGLE_HEIGHT_BAND_IN).max(HEIGHT_DOMAIN.0));
            query.height_max = Some((hi + SINGLE_HEIGHT_BAND_IN).min(HEIGHT_DOMAIN.1));
        }
    }

    if let (Some(lo), Some(hi)) = (query.weight_min, query.weight_max) {
        if lo > hi {
            query.weight_min = Some(hi);
            query.weight_max = Some(lo);
        }
    }
}

static INTERPRETER_PROMPT: LazyLock<String> = LazyLock::new(build_interpreter_prompt);

fn build_interpreter_prompt() -> String {
    let locations = LocationCode::ALL
        .iter()
        .map(|code| format!("{} ({})", code.code(), code.display_name()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You convert casting requests for performers into a JSON search filter.

Respond with ONE JSON object and nothing else, using exactly these keys:
{{"gender": null, "location": null, "ethnicities": [], "height_min": null, "height_max": null,
  "weight_min": null, "weight_max": null, "skills": [], "union_status": null,
  "availability": null, "travel_radius": null, "broad_search": false, "confidence": 0.0}}

Allowed values (use these literal codes only, otherwise null or an empty list):
- gender: {genders}
- location: {locations}
- ethnicities: {ethnicities}
- skills: {skills}
- union_status: {unions}
- availability: {availability}
- travel_radius (smallest to largest): {travel}

Rules:
- Only fill a field when the request states it explicitly. Never infer unstated filters.
- Heights are inches, weights are pounds. Convert feet and inches (5'8" = 68).
- A single height becomes a band of +/-2 inches (5'8" -> height_min 66, height_max 70).
- Map real skills to the closest category (boxing, muay thai, swordplay -> fight).
- Set broad_search true for vague or exploratory requests such as "Atlanta performers".
- confidence is your certainty in the extraction, from 0.0 to 1.0."#,
        genders = Gender::codes().join(", "),
        locations = locations,
        ethnicities = Ethnicity::codes().join(", "),
        skills = SkillCategory::codes().join(", "),
        unions = UnionStatus::codes().join(", "),
        availability = Availability::codes().join(", "),
        travel = TravelRadius::codes().join(", "),
    )
}

/// Deterministic rule-based interpreter
///
/// Recognizes heights, weights, locations, gender, ethnicity, skills, union,
/// availability and travel phrases. A request with nothing but a location
/// (or nothing at all) is treated as a broad search.
#[derive(Debug, Clone, Default)]
pub struct KeywordInterpreter;

impl KeywordInterpreter {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, message: &str) -> ParsedQuery {
        let text = message.to_lowercase();

        let mut query = ParsedQuery {
            location: find_location(&text),
            gender: find_gender(&text),
            ethnicities: find_ethnicities(&text),
            skills: find_skills(&text),
            union_status: find_union(&text),
            availability: find_availability(&text),
            travel_radius: find_travel(&text),
            ..Default::default()
        };

        apply_heights(&text, &mut query);
        if let Some(weight) = find_weight(&text) {
            query.weight_min = Some(weight);
            query.weight_max = Some(weight);
        }
        normalize_bands(&mut query);

        let mut narrowing = query.clone();
        narrowing.location = None;
        query.broad_search = !narrowing.has_filters();

        let populated = count_populated(&query);
        query.confidence = if populated == 0 {
            0.0
        } else {
            (0.4 + 0.1 * populated as f64).min(0.9)
        };

        query
    }
}

#[async_trait]
impl QueryInterpreter for KeywordInterpreter {
    async fn interpret(&self, message: &str, _history: &[Turn]) -> ParsedQuery {
        self.parse(message)
    }
}

fn count_populated(query: &ParsedQuery) -> usize {
    [
        query.gender.is_some(),
        query.location.is_some(),
        !query.ethnicities.is_empty(),
        query.height_min.is_some() || query.height_max.is_some(),
        query.weight_min.is_some() || query.weight_max.is_some(),
        !query.skills.is_empty(),
        query.union_status.is_some(),
        query.availability.is_some(),
        query.travel_radius.is_some(),
    ]
    .iter()
    .filter(|present| **present)
    .count()
}

fn word_regex(phrase: &str) -> Regex {
    Regex::new(&format!(r"\b{}\b", regex::escape(phrase))).expect("escaped phrase is a valid regex")
}

fn stem_regex(stem: &str) -> Regex {
    Regex::new(&format!(r"\b{}", regex::escape(stem))).expect("escaped stem is a valid regex")
}

static LOCATION_PATTERNS: LazyLock<Vec<(LocationCode, Regex)>> = LazyLock::new(|| {
    LocationCode::ALL
        .iter()
        .flat_map(|code| {
            std::iter::once(code.city())
                .chain(code.aliases().iter().copied())
                .map(move |phrase| (*code, word_regex(phrase)))
        })
        .collect()
});

fn find_location(text: &str) -> Option<LocationCode> {
    LOCATION_PATTERNS
        .iter()
        .filter_map(|(code, pattern)| pattern.find(text).map(|m| (m.start(), *code)))
        .min_by_key(|(start, _)| *start)
        .map(|(_, code)| code)
}

fn find_gender(text: &str) -> Option<Gender> {
    static PATTERNS: LazyLock<Vec<(Gender, Regex)>> = LazyLock::new(|| {
        let table: &[(Gender, &[&str])] = &[
            (Gender::NonBinary, &["non-binary", "nonbinary", "enby"]),
            (Gender::Female, &["woman", "women", "female", "actress", "girl", "lady", "stuntwoman"]),
            (Gender::Male, &["man", "men", "male", "guy", "stuntman"]),
        ];
        table
            .iter()
            .flat_map(|(gender, words)| words.iter().map(move |w| (*gender, word_regex(w))))
            .collect()
    });

    let mut found: Vec<Gender> = Vec::new();
    for (gender, pattern) in PATTERNS.iter() {
        if pattern.is_match(text) && !found.contains(gender) {
            found.push(*gender);
        }
    }

    match found.as_slice() {
        [only] => Some(*only),
        [Gender::NonBinary, ..] => Some(Gender::NonBinary),
        _ => None,
    }
}

fn find_ethnicities(text: &str) -> Vec<Ethnicity> {
    const TABLE: &[(Ethnicity, &[&str])] = &[
        (Ethnicity::SouthAsian, &["south asian", "indian", "pakistani", "bangladeshi"]),
        (Ethnicity::MiddleEastern, &["middle eastern", "arab", "persian"]),
        (Ethnicity::NativeAmerican, &["native american", "indigenous", "first nations"]),
        (Ethnicity::PacificIslander, &["pacific islander", "polynesian", "samoan", "hawaiian"]),
        (Ethnicity::HispanicLatino, &["hispanic", "latino", "latina", "latinx"]),
        (Ethnicity::Black, &["black", "african american"]),
        (Ethnicity::White, &["white", "caucasian"]),
        (Ethnicity::Asian, &["asian", "east asian"]),
        (Ethnicity::Mixed, &["mixed race", "biracial", "multiracial"]),
    ];

    // Longer phrases are consumed first so "south asian" does not also yield "asian".
    let mut remaining = text.to_string();
    let mut found = Vec::new();
    for (ethnicity, phrases) in TABLE {
        for phrase in *phrases {
            let pattern = word_regex(phrase);
            if pattern.is_match(&remaining) {
                remaining = pattern.replace_all(&remaining, " ").into_owned();
                if !found.contains(ethnicity) {
                    found.push(*ethnicity);
                }
            }
        }
    }
    found
}

fn find_skills(text: &str) -> Vec<SkillCategory> {
    static PATTERNS: LazyLock<Vec<(SkillCategory, Regex)>> = LazyLock::new(|| {
        SkillCategory::ALL
            .iter()
            .flat_map(|category| {
                let direct = category.code().replace('-', " ");
                std::iter::once(direct)
                    .chain(category.synonyms().iter().map(|s| s.to_string()))
                    .chain(extra_stems(*category).iter().map(|s| s.to_string()))
                    .map(move |stem| (*category, stem_regex(&stem)))
            })
            .collect()
    });

    let mut found = Vec::new();
    for (category, pattern) in PATTERNS.iter() {
        if !found.contains(category) && pattern.is_match(text) {
            found.push(*category);
        }
    }
    found
}

fn extra_stems(category: SkillCategory) -> &'static [&'static str] {
    match category {
        SkillCategory::Fight => &["fighter", "martial art", "boxer", "brawl"],
        SkillCategory::Driving => &["stunt driver", "precision driver", "wheelman"],
        SkillCategory::Motorcycle => &["motorcycl", "biker"],
        SkillCategory::Water => &["swimmer", "diver"],
        SkillCategory::Equestrian => &["horseman", "rider"],
        SkillCategory::Gymnastics => &["gymnast"],
        SkillCategory::Dance => &["dancer"],
        SkillCategory::Climbing => &["climber"],
        _ => &[],
    }
}

fn find_union(text: &str) -> Option<UnionStatus> {
    const TABLE: &[(UnionStatus, &[&str])] = &[
        (UnionStatus::NonUnion, &["non-union", "non union", "nonunion"]),
        (UnionStatus::SagEligible, &["sag-eligible", "sag eligible", "union eligible"]),
        (UnionStatus::Actra, &["actra"]),
        (UnionStatus::SagAftra, &["sag-aftra", "sag aftra", "sag", "union member"]),
    ];

    TABLE.iter().find_map(|(status, phrases)| {
        phrases
            .iter()
            .any(|phrase| word_regex(phrase).is_match(text))
            .then_some(*status)
    })
}

fn find_availability(text: &str) -> Option<Availability> {
    if word_regex("unavailable").is_match(text) {
        Some(Availability::Unavailable)
    } else if word_regex("limited availability").is_match(text) {
        Some(Availability::Limited)
    } else if word_regex("available").is_match(text) {
        Some(Availability::Available)
    } else {
        None
    }
}

fn find_travel(text: &str) -> Option<TravelRadius> {
    static MILES: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b(\d{1,4})\s*(?:mi|miles?)\b").expect("valid regex"));

    if word_regex("international").is_match(text) || word_regex("overseas").is_match(text) {
        return Some(TravelRadius::International);
    }
    if ["nationwide", "national", "anywhere in the country", "willing to travel"]
        .iter()
        .any(|p| word_regex(p).is_match(text))
    {
        return Some(TravelRadius::National);
    }
    if word_regex("regional").is_match(text) {
        return Some(TravelRadius::Regional);
    }
    if word_regex("statewide").is_match(text) {
        return Some(TravelRadius::State);
    }
    if let Some(miles) = MILES
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        return Some(match miles {
            0..=50 => TravelRadius::Miles50,
            51..=100 => TravelRadius::Miles100,
            101..=200 => TravelRadius::Miles200,
            _ => TravelRadius::State,
        });
    }
    if word_regex("local").is_match(text) || word_regex("locals").is_match(text) {
        return Some(TravelRadius::Local);
    }
    None
}

static HEIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b([4-7])\s*(?:'|’|ft\b|feet\b|foot\b)\s*(?:(\d{1,2})\s*(?:"|”|''|in\b|inches\b)?)?"#)
        .expect("valid regex")
});

fn apply_heights(text: &str, query: &mut ParsedQuery) {
    let mut found: Vec<(usize, u16)> = Vec::new();
    for caps in HEIGHT.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let feet: u16 = caps[1].parse().unwrap_or(0);
        let inches: u16 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .filter(|i| *i < 12)
            .unwrap_or(0);
        let total = feet * 12 + inches;
        if total >= HEIGHT_DOMAIN.0 && total <= HEIGHT_DOMAIN.1 {
            found.push((whole.start(), total));
        }
    }

    match found.as_slice() {
        [] => {}
        [(start, height)] => {
            let prefix = &text[text[..*start].char_indices().rev().nth(16).map_or(0, |(i, _)| i)..*start];
            if ["under", "below", "shorter", "max", "at most"].iter().any(|w| prefix.contains(w)) {
                query.height_max = Some(*height);
            } else if ["over", "above", "taller", "min", "at least"].iter().any(|w| prefix.contains(w)) {
                query.height_min = Some(*height);
            } else {
                query.height_min = Some(*height);
                query.height_max = Some(*height);
            }
        }
        many => {
            query.height_min = many.iter().map(|(_, h)| *h).min();
            query.height_max = many.iter().map(|(_, h)| *h).max();
        }
    }
}

fn find_weight(text: &str) -> Option<u16> {
    static WEIGHT: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b(\d{2,3})\s*(?:lbs?|pounds)\b").expect("valid regex"));

    WEIGHT
        .captures(text)
        .and_then(|caps| caps[1].parse::<u16>().ok())
        .filter(|w| *w >= WEIGHT_DOMAIN.0 && *w <= WEIGHT_DOMAIN.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedGenerator {
        output: Mutex<Option<Result<String, GenerationError>>>,
        delay: Option<Duration>,
    }

    impl ScriptedGenerator {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                output: Mutex::new(Some(Ok(text.to_string()))),
                delay: None,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                output: Mutex::new(Some(Err(GenerationError::ApiError {
                    status: 503,
                    message: "down".to_string(),
                }))),
                delay: None,
            })
        }

        fn slow(text: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                output: Mutex::new(Some(Ok(text.to_string()))),
                delay: Some(delay),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.output
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(GenerationError::Malformed("exhausted".to_string())))
        }
    }

    #[test]
    fn test_validation_keeps_vocabulary_members() {
        let raw = json!({
            "gender": "female",
            "location": "atlanta-ga",
            "ethnicities": ["black", "asian"],
            "height_min": 66,
            "height_max": 70,
            "skills": ["fight"],
            "union_status": "sag-aftra",
            "availability": "available",
            "travel_radius": "100",
            "broad_search": false,
            "confidence": 0.85
        });

        let validated = validate_parsed_query(&raw);
        assert!(validated.rejections.is_empty());
        let q = validated.query;
        assert_eq!(q.gender, Some(Gender::Female));
        assert_eq!(q.location, Some(LocationCode::AtlantaGa));
        assert_eq!(q.ethnicities, vec![Ethnicity::Black, Ethnicity::Asian]);
        assert_eq!((q.height_min, q.height_max), (Some(66), Some(70)));
        assert_eq!(q.skills, vec![SkillCategory::Fight]);
        assert_eq!(q.travel_radius, Some(TravelRadius::Miles100));
        assert!((q.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_validation_nulls_invalid_scalars_and_drops_invalid_members() {
        let raw = json!({
            "gender": "robot",
            "location": "Atlanta",
            "ethnicities": ["black", "martian", 7],
            "skills": ["fight", "juggling", "fight"],
            "union_status": 42,
            "travel_radius": "galactic"
        });

        let validated = validate_parsed_query(&raw);
        let q = &validated.query;
        assert_eq!(q.gender, None);
        assert_eq!(q.location, None);
        assert_eq!(q.ethnicities, vec![Ethnicity::Black]);
        assert_eq!(q.skills, vec![SkillCategory::Fight]);
        assert_eq!(q.union_status, None);
        assert_eq!(q.travel_radius, None);

        let fields: Vec<_> = validated.rejections.iter().map(|r| r.field).collect();
        assert!(fields.contains(&"gender"));
        assert!(fields.contains(&"location"));
        assert!(fields.contains(&"skills"));
        assert!(fields.contains(&"union_status"));
    }

    #[test]
    fn test_validation_clamps_confidence_and_forces_boolean() {
        let q = validate_parsed_query(&json!({"confidence": 7.5, "broad_search": "yes"})).query;
        assert_eq!(q.confidence, 1.0);
        assert!(!q.broad_search);

        let q = validate_parsed_query(&json!({"confidence": -2, "broad_search": true})).query;
        assert_eq!(q.confidence, 0.0);
        assert!(q.broad_search);

        let q = validate_parsed_query(&json!({"confidence": "high"})).query;
        assert_eq!(q.confidence, 0.0);
    }

    #[test]
    fn test_validation_expands_single_height_and_orders_bounds() {
        let q = validate_parsed_query(&json!({"height_min": 68, "height_max": 68})).query;
        assert_eq!((q.height_min, q.height_max), (Some(66), Some(70)));

        let q = validate_parsed_query(&json!({"height_min": 72, "height_max": 65})).query;
        assert_eq!((q.height_min, q.height_max), (Some(65), Some(72)));

        let q = validate_parsed_query(&json!({"weight_min": "180", "weight_max": 150.4})).query;
        assert_eq!((q.weight_min, q.weight_max), (Some(150), Some(180)));
    }

    #[test]
    fn test_validation_rejects_out_of_domain_numbers() {
        let q = validate_parsed_query(&json!({"height_min": 20, "height_max": 140, "weight_min": true})).query;
        assert_eq!(q.height_min, None);
        assert_eq!(q.height_max, None);
        assert_eq!(q.weight_min, None);
    }

    #[test]
    fn test_validation_of_non_object_is_empty() {
        let validated = validate_parsed_query(&json!(["fight"]));
        assert_eq!(validated.query, ParsedQuery::empty());
        assert_eq!(validated.rejections.len(), 1);
    }

    #[test]
    fn test_extract_json_from_fenced_output() {
        let value = extract_json_object("```json\n{\"gender\": \"male\"}\n```").unwrap();
        assert_eq!(value["gender"], "male");

        let value = extract_json_object("Sure! {\"skills\": [\"fight\"]} hope that helps").unwrap();
        assert_eq!(value["skills"][0], "fight");

        assert!(extract_json_object("no json here").is_err());
        assert!(extract_json_object("{not valid}").is_err());
    }

    #[tokio::test]
    async fn test_llm_interpreter_validates_model_output() {
        let generator = ScriptedGenerator::ok(
            r#"{"location": "atlanta-ga", "height_min": 66, "height_max": 70, "skills": ["fight", "kung-fu"], "confidence": 0.9}"#,
        );
        let interpreter = LlmInterpreter::new(generator, Duration::from_secs(1));

        let q = interpreter.interpret("5'8 martial artist in Atlanta", &[]).await;
        assert_eq!(q.location, Some(LocationCode::AtlantaGa));
        assert_eq!(q.skills, vec![SkillCategory::Fight]);
        assert_eq!(q.gender, None);
    }

    #[tokio::test]
    async fn test_llm_interpreter_failure_yields_empty_query() {
        let interpreter = LlmInterpreter::new(ScriptedGenerator::failing(), Duration::from_secs(1));
        let q = interpreter.interpret("anything", &[]).await;
        assert_eq!(q, ParsedQuery::empty());
        assert_eq!(q.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_llm_interpreter_garbage_yields_empty_query() {
        let interpreter = LlmInterpreter::new(ScriptedGenerator::ok("I am not JSON"), Duration::from_secs(1));
        assert_eq!(interpreter.interpret("anything", &[]).await, ParsedQuery::empty());
    }

    #[tokio::test]
    async fn test_llm_interpreter_timeout_yields_empty_query() {
        let generator = ScriptedGenerator::slow(r#"{"gender": "male"}"#, Duration::from_millis(200));
        let interpreter = LlmInterpreter::new(generator, Duration::from_millis(10));

        let err = interpreter.try_interpret("a man", &[]).await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
    }

    #[test]
    fn test_keyword_interpreter_martial_artist() {
        let q = KeywordInterpreter::new().parse("I need a 5'8 martial artist in Atlanta");
        assert_eq!(q.location, Some(LocationCode::AtlantaGa));
        assert_eq!((q.height_min, q.height_max), (Some(66), Some(70)));
        assert_eq!(q.skills, vec![SkillCategory::Fight]);
        assert_eq!(q.gender, None);
        assert!(q.ethnicities.is_empty());
        assert!(!q.broad_search);
        assert!(q.confidence > 0.0 && q.confidence <= 1.0);
    }

    #[test]
    fn test_keyword_interpreter_vague_location_is_broad() {
        let q = KeywordInterpreter::new().parse("atlanta performers");
        assert_eq!(q.location, Some(LocationCode::AtlantaGa));
        assert!(q.broad_search);
        assert_eq!(q.gender, None);
        assert!(q.skills.is_empty());
        assert_eq!(q.height_min, None);
        assert_eq!(q.travel_radius, None);
    }

    #[test]
    fn test_keyword_interpreter_compound_request() {
        let q = KeywordInterpreter::new()
            .parse("Non-union South Asian woman, between 5'4\" and 5'7\", willing to travel, horse riding");
        assert_eq!(q.gender, Some(Gender::Female));
        assert_eq!(q.ethnicities, vec![Ethnicity::SouthAsian]);
        assert_eq!(q.union_status, Some(UnionStatus::NonUnion));
        assert_eq!(q.travel_radius, Some(TravelRadius::National));
        assert_eq!((q.height_min, q.height_max), (Some(64), Some(67)));
        assert!(q.skills.contains(&SkillCategory::Equestrian));
    }

    #[test]
    fn test_keyword_interpreter_height_bounds_and_miles() {
        let q = KeywordInterpreter::new().parse("stuntman under 6'0 within 80 miles, 190 lbs");
        assert_eq!(q.gender, Some(Gender::Male));
        assert_eq!((q.height_min, q.height_max), (None, Some(72)));
        assert_eq!(q.travel_radius, Some(TravelRadius::Miles100));
        assert_eq!((q.weight_min, q.weight_max), (Some(190), Some(190)));
    }

    #[test]
    fn test_interpreter_prompt_lists_every_vocabulary() {
        let prompt = build_interpreter_prompt();
        for code in LocationCode::ALL {
            assert!(prompt.contains(code.code()));
        }
        for skill in SkillCategory::ALL {
            assert!(prompt.contains(skill.code()));
        }
        assert!(prompt.contains("international"));
        assert!(prompt.contains("non-union"));
    }
}
