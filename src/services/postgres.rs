use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use std::time::Duration;

use crate::core::filters::{skill_terms, CandidateFilter};
use crate::models::{CandidateProfile, Certification, Enrichment, Skill};
use crate::services::store::{CandidateStore, EnrichmentSource, StoreError};

const SELECT_PROFILES: &str = r#"
    SELECT
        p.id::text AS id,
        p.first_name,
        p.last_name,
        p.bio,
        p.email,
        p.phone,
        p.gender,
        p.ethnicity,
        p.height_inches,
        p.weight_lbs,
        p.location,
        p.secondary_location,
        p.location_text,
        p.union_status,
        p.availability,
        p.travel_radius,
        p.website_url,
        p.imdb_url,
        p.resume_url,
        p.is_visible,
        ARRAY(
            SELECT ph.url FROM profile_photos ph
            WHERE ph.profile_id = p.id
            ORDER BY ph.position
        ) AS photo_urls,
        ARRAY(
            SELECT rm.roster_id::text FROM roster_members rm
            WHERE rm.profile_id = p.id
        ) AS roster_ids
    FROM profiles p
    WHERE p.is_visible = TRUE"#;

/// Most recent credits attached to each candidate as enrichment
const CREDITS_PER_PROFILE: usize = 3;

/// Read-only PostgreSQL candidate store
///
/// Profiles live in `profiles`; photos, skills, certifications, credits and
/// roster membership live in their own tables keyed by `profile_id`. This
/// client never writes.
pub struct PostgresCandidateStore {
    pool: PgPool,
}

impl PostgresCandidateStore {
    /// Create a new store from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL candidate store");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Load skills and certifications for the given profiles
    async fn attach_sub_collections(
        &self,
        profiles: &mut [CandidateProfile],
    ) -> Result<(), StoreError> {
        if profiles.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = profiles.iter().map(|p| p.id.clone()).collect();

        let skill_rows = sqlx::query(
            r#"
            SELECT profile_id::text AS profile_id, name, level
            FROM profile_skills
            WHERE profile_id::text = ANY($1)
            ORDER BY name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut skills: HashMap<String, Vec<Skill>> = HashMap::new();
        for row in &skill_rows {
            skills
                .entry(row.try_get("profile_id")?)
                .or_default()
                .push(Skill {
                    name: row.try_get("name")?,
                    level: row.try_get("level")?,
                });
        }

        let cert_rows = sqlx::query(
            r#"
            SELECT profile_id::text AS profile_id, name, issuer
            FROM profile_certifications
            WHERE profile_id::text = ANY($1)
            ORDER BY name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut certifications: HashMap<String, Vec<Certification>> = HashMap::new();
        for row in &cert_rows {
            certifications
                .entry(row.try_get("profile_id")?)
                .or_default()
                .push(Certification {
                    name: row.try_get("name")?,
                    issuer: row.try_get("issuer")?,
                });
        }

        for profile in profiles.iter_mut() {
            profile.skills = skills.remove(&profile.id).unwrap_or_default();
            profile.certifications = certifications.remove(&profile.id).unwrap_or_default();
        }

        tracing::debug!(
            "Attached {} skills and {} certifications to {} profiles",
            skill_rows.len(),
            cert_rows.len(),
            profiles.len()
        );

        Ok(())
    }
}

/// Build the filtered profile query
///
/// Mirrors `core::filters::matches_filter` predicate for predicate.
pub fn build_candidate_query(filter: &CandidateFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<'static, Postgres> = QueryBuilder::new(SELECT_PROFILES);

    if let Some(scope) = &filter.scope_id {
        qb.push(
            " AND EXISTS (SELECT 1 FROM roster_members rm WHERE rm.profile_id = p.id AND rm.roster_id::text = ",
        );
        qb.push_bind(scope.clone());
        qb.push(")");
    }

    if let Some(gender) = filter.gender {
        qb.push(" AND LOWER(TRIM(p.gender)) = ");
        qb.push_bind(gender.code());
    }

    if !filter.ethnicities.is_empty() {
        let codes: Vec<String> = filter.ethnicities.iter().map(|e| e.code().to_string()).collect();
        qb.push(" AND LOWER(TRIM(p.ethnicity)) = ANY(");
        qb.push_bind(codes);
        qb.push(")");
    }

    if let Some(range) = filter.height {
        qb.push(" AND p.height_inches BETWEEN ");
        qb.push_bind(range.min as i32);
        qb.push(" AND ");
        qb.push_bind(range.max as i32);
    }

    if let Some(range) = filter.weight {
        qb.push(" AND p.weight_lbs BETWEEN ");
        qb.push_bind(range.min as i32);
        qb.push(" AND ");
        qb.push_bind(range.max as i32);
    }

    if let Some(availability) = filter.availability {
        qb.push(" AND LOWER(TRIM(p.availability)) = ");
        qb.push_bind(availability.code());
    }

    if !filter.travel_tiers.is_empty() {
        let tiers: Vec<String> = filter.travel_tiers.iter().map(|t| t.code().to_string()).collect();
        qb.push(" AND LOWER(TRIM(p.travel_radius)) = ANY(");
        qb.push_bind(tiers);
        qb.push(")");
    }

    if let Some(status) = filter.union_status {
        qb.push(" AND (");
        for (i, fragment) in status.name_fragments().iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("p.union_status ILIKE ");
            qb.push_bind(format!("%{}%", fragment));
        }
        if status.matches_unrecorded() {
            qb.push(" OR p.union_status IS NULL OR TRIM(p.union_status) = ''");
        }
        qb.push(")");
    }

    if let Some(location) = &filter.location {
        qb.push(" AND (LOWER(TRIM(p.location)) = ");
        qb.push_bind(location.code.code());
        qb.push(" OR LOWER(TRIM(p.secondary_location)) = ");
        qb.push_bind(location.code.code());
        if let Some(fragment) = &location.free_text {
            qb.push(" OR p.location_text ILIKE ");
            qb.push_bind(format!("%{}%", fragment));
        }
        qb.push(")");
    }

    if !filter.skills.is_empty() {
        let terms = skill_terms(&filter.skills);
        let patterns: Vec<String> = terms.iter().map(|t| format!("%{}%", t)).collect();
        qb.push(
            " AND EXISTS (SELECT 1 FROM profile_skills ps WHERE ps.profile_id = p.id \
             AND LENGTH(TRIM(ps.name)) >= 3 AND (LOWER(ps.name) LIKE ANY(",
        );
        qb.push_bind(patterns);
        qb.push(") OR EXISTS (SELECT 1 FROM UNNEST(");
        qb.push_bind(terms);
        qb.push(") AS t(term) WHERE t.term LIKE '%' || LOWER(TRIM(ps.name)) || '%')))");
    }

    if let Some(limit) = filter.limit {
        qb.push(" ORDER BY p.id LIMIT ");
        qb.push_bind(limit as i64);
    }

    qb
}

fn profile_from_row(row: &PgRow) -> Result<CandidateProfile, StoreError> {
    Ok(CandidateProfile {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        bio: row.try_get("bio")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        gender: row.try_get("gender")?,
        ethnicity: row.try_get("ethnicity")?,
        height_inches: to_u16(row.try_get("height_inches")?),
        weight_lbs: to_u16(row.try_get("weight_lbs")?),
        location: row.try_get("location")?,
        secondary_location: row.try_get("secondary_location")?,
        location_text: row.try_get("location_text")?,
        union_status: row.try_get("union_status")?,
        availability: row.try_get("availability")?,
        travel_radius: row.try_get("travel_radius")?,
        skills: Vec::new(),
        certifications: Vec::new(),
        photo_urls: row.try_get("photo_urls")?,
        website_url: row.try_get("website_url")?,
        imdb_url: row.try_get("imdb_url")?,
        resume_url: row.try_get("resume_url")?,
        is_visible: row.try_get("is_visible")?,
        roster_ids: row.try_get("roster_ids")?,
    })
}

fn to_u16(value: Option<i32>) -> Option<u16> {
    value.and_then(|v| u16::try_from(v).ok())
}

#[async_trait]
impl CandidateStore for PostgresCandidateStore {
    async fn query_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<CandidateProfile>, StoreError> {
        let mut qb = build_candidate_query(filter);
        let rows = qb.build().fetch_all(&self.pool).await?;

        let mut profiles = rows
            .iter()
            .map(profile_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        self.attach_sub_collections(&mut profiles).await?;

        tracing::debug!("Queried {} candidates (limit: {:?})", profiles.len(), filter.limit);

        Ok(profiles)
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

#[async_trait]
impl EnrichmentSource for PostgresCandidateStore {
    /// Most recent credits per profile, formatted as resume highlights
    async fn enrich(&self, profile_ids: &[String]) -> Result<Vec<Enrichment>, StoreError> {
        if profile_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT profile_id::text AS profile_id, title, role, year
            FROM profile_credits
            WHERE profile_id::text = ANY($1)
            ORDER BY year DESC NULLS LAST, title
            "#,
        )
        .bind(profile_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut highlights: HashMap<String, Vec<String>> = HashMap::new();
        for row in &rows {
            let profile_id: String = row.try_get("profile_id")?;
            let entry = highlights.entry(profile_id).or_default();
            if entry.len() >= CREDITS_PER_PROFILE {
                continue;
            }

            let title: String = row.try_get("title")?;
            let role: Option<String> = row.try_get("role")?;
            let year: Option<i32> = row.try_get("year")?;
            entry.push(format_credit(&title, role.as_deref(), year));
        }

        Ok(profile_ids
            .iter()
            .filter_map(|id| {
                highlights.remove(id).map(|highlights| Enrichment {
                    profile_id: id.clone(),
                    highlights,
                })
            })
            .collect())
    }
}

fn format_credit(title: &str, role: Option<&str>, year: Option<i32>) -> String {
    let mut credit = title.to_string();
    if let Some(role) = role.filter(|r| !r.trim().is_empty()) {
        credit.push_str(&format!(" ({})", role.trim()));
    }
    if let Some(year) = year {
        credit.push_str(&format!(", {}", year));
    }
    credit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filters::{LocationFilter, NumericRange};
    use crate::core::vocabulary::{Gender, LocationCode, SkillCategory, TravelRadius, UnionStatus};

    #[test]
    fn test_unfiltered_query_only_requires_visibility() {
        let filter = CandidateFilter {
            limit: Some(20),
            ..Default::default()
        };
        let qb = build_candidate_query(&filter);
        let sql = qb.sql();

        assert!(sql.contains("p.is_visible = TRUE"));
        assert!(!sql.contains("EXISTS"));
        assert!(sql.trim_end().ends_with("LIMIT $1"));
    }

    #[test]
    fn test_filtered_read_is_unbounded_and_matches_skills() {
        let filter = CandidateFilter {
            skills: vec![SkillCategory::Fight],
            ..Default::default()
        };
        let qb = build_candidate_query(&filter);
        let sql = qb.sql();

        assert!(sql.contains("FROM profile_skills ps"));
        assert!(sql.contains("LOWER(ps.name) LIKE ANY($1)"));
        assert!(sql.contains("UNNEST($2)"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_filtered_query_contains_every_predicate() {
        let filter = CandidateFilter {
            scope_id: Some("roster-1".to_string()),
            gender: Some(Gender::Female),
            height: Some(NumericRange { min: 63, max: 73 }),
            travel_tiers: TravelRadius::Miles100.at_least(),
            union_status: Some(UnionStatus::NonUnion),
            location: Some(LocationFilter {
                code: LocationCode::AtlantaGa,
                free_text: Some("atlanta".to_string()),
            }),
            ..Default::default()
        };
        let qb = build_candidate_query(&filter);
        let sql = qb.sql();

        assert!(sql.contains("rm.roster_id::text = $1"));
        assert!(sql.contains("LOWER(TRIM(p.gender)) = $2"));
        assert!(sql.contains("p.height_inches BETWEEN $3 AND $4"));
        assert!(sql.contains("LOWER(TRIM(p.travel_radius)) = ANY($5)"));
        assert!(sql.contains("p.union_status IS NULL"));
        assert!(sql.contains("OR p.location_text ILIKE"));
    }

    #[test]
    fn test_location_without_broad_search_has_no_free_text() {
        let filter = CandidateFilter {
            location: Some(LocationFilter {
                code: LocationCode::AtlantaGa,
                free_text: None,
            }),
            ..Default::default()
        };
        let qb = build_candidate_query(&filter);
        assert!(!qb.sql().contains("location_text ILIKE"));
    }

    #[test]
    fn test_format_credit() {
        assert_eq!(format_credit("Night Run", Some("stunt double"), Some(2023)), "Night Run (stunt double), 2023");
        assert_eq!(format_credit("Night Run", None, None), "Night Run");
    }
}
