//! Closed vocabularies for every enumerated search field.
//!
//! Parsed queries only ever carry members of these sets. Each vocabulary
//! exposes its wire codes so the interpreter prompt, the validation pass and
//! the HTTP vocabulary endpoint all read from the same table.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! closed_vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl $name {
            /// Every member, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire code for this member
            pub fn code(self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            /// Case-insensitive lookup of a wire code
            pub fn from_code(value: &str) -> Option<Self> {
                let value = value.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|member| member.code().eq_ignore_ascii_case(value))
            }

            pub fn codes() -> Vec<&'static str> {
                Self::ALL.iter().map(|member| member.code()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

closed_vocabulary! {
    pub enum Gender {
        Male => "male",
        Female => "female",
        NonBinary => "non-binary",
    }
}

closed_vocabulary! {
    /// Structured location codes (`city-state` slugs)
    pub enum LocationCode {
        AtlantaGa => "atlanta-ga",
        SavannahGa => "savannah-ga",
        LosAngelesCa => "los-angeles-ca",
        SanFranciscoCa => "san-francisco-ca",
        NewYorkNy => "new-york-ny",
        ChicagoIl => "chicago-il",
        NewOrleansLa => "new-orleans-la",
        AustinTx => "austin-tx",
        DallasTx => "dallas-tx",
        HoustonTx => "houston-tx",
        AlbuquerqueNm => "albuquerque-nm",
        LasVegasNv => "las-vegas-nv",
        MiamiFl => "miami-fl",
        OrlandoFl => "orlando-fl",
        NashvilleTn => "nashville-tn",
        CharlotteNc => "charlotte-nc",
        WilmingtonNc => "wilmington-nc",
        BostonMa => "boston-ma",
        PhiladelphiaPa => "philadelphia-pa",
        PittsburghPa => "pittsburgh-pa",
        DetroitMi => "detroit-mi",
        SeattleWa => "seattle-wa",
        VancouverBc => "vancouver-bc",
        TorontoOn => "toronto-on",
    }
}

closed_vocabulary! {
    /// Ethnicity buckets
    pub enum Ethnicity {
        White => "white",
        Black => "black",
        HispanicLatino => "hispanic-latino",
        Asian => "asian",
        SouthAsian => "south-asian",
        MiddleEastern => "middle-eastern",
        NativeAmerican => "native-american",
        PacificIslander => "pacific-islander",
        Mixed => "mixed",
    }
}

closed_vocabulary! {
    /// Skill categories a request can ask for
    pub enum SkillCategory {
        Fight => "fight",
        Driving => "driving",
        Motorcycle => "motorcycle",
        HighFalls => "high-falls",
        StairFalls => "stair-falls",
        Fire => "fire",
        WireWork => "wire-work",
        Water => "water",
        Equestrian => "equestrian",
        Parkour => "parkour",
        Gymnastics => "gymnastics",
        Weapons => "weapons",
        Rigging => "rigging",
        Dance => "dance",
        Climbing => "climbing",
    }
}

closed_vocabulary! {
    pub enum UnionStatus {
        SagAftra => "sag-aftra",
        SagEligible => "sag-eligible",
        Actra => "actra",
        NonUnion => "non-union",
    }
}

closed_vocabulary! {
    pub enum Availability {
        Available => "available",
        Limited => "limited",
        Unavailable => "unavailable",
    }
}

closed_vocabulary! {
    /// Travel radius tiers. Declaration order is the tier order.
    pub enum TravelRadius {
        Local => "local",
        Miles50 => "50",
        Miles100 => "100",
        Miles200 => "200",
        State => "state",
        Regional => "regional",
        National => "national",
        International => "international",
    }
}

impl LocationCode {
    /// Human-readable name, e.g. "Atlanta, GA"
    pub fn display_name(self) -> &'static str {
        self.entry().1
    }

    /// Lowercase city name used for loose free-text matching
    pub fn city(self) -> &'static str {
        self.entry().2
    }

    /// Extra spellings recognized in free text
    pub fn aliases(self) -> &'static [&'static str] {
        self.entry().3
    }

    fn entry(self) -> &'static LocationEntry {
        LOCATIONS
            .iter()
            .find(|entry| entry.0 == self)
            .unwrap_or(&LOCATIONS[0])
    }
}

type LocationEntry = (LocationCode, &'static str, &'static str, &'static [&'static str]);

const LOCATIONS: &[LocationEntry] = &[
    (LocationCode::AtlantaGa, "Atlanta, GA", "atlanta", &["atl", "hotlanta"]),
    (LocationCode::SavannahGa, "Savannah, GA", "savannah", &[]),
    (LocationCode::LosAngelesCa, "Los Angeles, CA", "los angeles", &["la", "l.a.", "hollywood"]),
    (LocationCode::SanFranciscoCa, "San Francisco, CA", "san francisco", &["sf", "bay area"]),
    (LocationCode::NewYorkNy, "New York, NY", "new york", &["nyc", "manhattan", "brooklyn"]),
    (LocationCode::ChicagoIl, "Chicago, IL", "chicago", &["chi-town"]),
    (LocationCode::NewOrleansLa, "New Orleans, LA", "new orleans", &["nola"]),
    (LocationCode::AustinTx, "Austin, TX", "austin", &["atx"]),
    (LocationCode::DallasTx, "Dallas, TX", "dallas", &["dfw"]),
    (LocationCode::HoustonTx, "Houston, TX", "houston", &["htx"]),
    (LocationCode::AlbuquerqueNm, "Albuquerque, NM", "albuquerque", &["abq"]),
    (LocationCode::LasVegasNv, "Las Vegas, NV", "las vegas", &["vegas"]),
    (LocationCode::MiamiFl, "Miami, FL", "miami", &[]),
    (LocationCode::OrlandoFl, "Orlando, FL", "orlando", &[]),
    (LocationCode::NashvilleTn, "Nashville, TN", "nashville", &[]),
    (LocationCode::CharlotteNc, "Charlotte, NC", "charlotte", &[]),
    (LocationCode::WilmingtonNc, "Wilmington, NC", "wilmington", &[]),
    (LocationCode::BostonMa, "Boston, MA", "boston", &[]),
    (LocationCode::PhiladelphiaPa, "Philadelphia, PA", "philadelphia", &["philly"]),
    (LocationCode::PittsburghPa, "Pittsburgh, PA", "pittsburgh", &[]),
    (LocationCode::DetroitMi, "Detroit, MI", "detroit", &[]),
    (LocationCode::SeattleWa, "Seattle, WA", "seattle", &[]),
    (LocationCode::VancouverBc, "Vancouver, BC", "vancouver", &[]),
    (LocationCode::TorontoOn, "Toronto, ON", "toronto", &[]),
];

impl SkillCategory {
    /// Real-world skill names that count as this category
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            SkillCategory::Fight => &[
                "boxing", "muay thai", "mma", "martial arts", "karate", "kung fu",
                "jiu jitsu", "jiu-jitsu", "judo", "taekwondo", "kickboxing", "wrestling",
                "combat", "swordplay", "sword", "fencing", "stage combat", "krav maga",
                "capoeira", "wushu", "fight choreography",
            ],
            SkillCategory::Driving => &[
                "precision driving", "stunt driving", "car chase", "car work", "drift", "drifting",
                "pursuit", "vehicle", "rally", "reverse 180", "j-turn",
            ],
            SkillCategory::Motorcycle => &["motorbike", "dirt bike", "motocross", "moto", "bike"],
            SkillCategory::HighFalls => &["high fall", "descender", "airbag", "free fall", "fall"],
            SkillCategory::StairFalls => &["stair fall", "stairs", "tumble", "fall"],
            SkillCategory::Fire => &["fire burn", "full burn", "partial burn", "burn", "pyro"],
            SkillCategory::WireWork => &["wire", "wires", "harness", "flying", "ratchet"],
            SkillCategory::Water => &[
                "swimming", "scuba", "diving", "free diving", "underwater", "surfing",
                "boat", "lifeguard",
            ],
            SkillCategory::Equestrian => &["horse", "horseback", "riding", "rodeo", "jousting"],
            SkillCategory::Parkour => &["freerunning", "free running", "tricking", "acrobatics"],
            SkillCategory::Gymnastics => &["tumbling", "acrobatics", "trampoline", "cheer", "flips"],
            SkillCategory::Weapons => &[
                "firearms", "firearm", "handgun", "knife", "archery", "bo staff", "nunchaku",
                "sword", "swordplay",
            ],
            SkillCategory::Rigging => &["rigger", "rope", "ratchet", "pulley"],
            SkillCategory::Dance => &["ballet", "hip hop", "contemporary", "breakdance", "choreography"],
            SkillCategory::Climbing => &["rock climbing", "bouldering", "rappelling", "rope climbing"],
        }
    }
}

impl UnionStatus {
    /// Lowercase fragments of union names recorded on profiles
    pub fn name_fragments(self) -> &'static [&'static str] {
        match self {
            UnionStatus::SagAftra => &["sag-aftra", "sag aftra", "sagaftra", "screen actors"],
            UnionStatus::SagEligible => &["eligible"],
            UnionStatus::Actra => &["actra"],
            UnionStatus::NonUnion => &["non-union", "non union", "nonunion"],
        }
    }

    /// Whether a profile with no union value recorded counts as a match
    pub fn matches_unrecorded(self) -> bool {
        matches!(self, UnionStatus::NonUnion)
    }
}

impl TravelRadius {
    /// Every tier that satisfies a request for `self`
    pub fn at_least(self) -> Vec<TravelRadius> {
        Self::ALL.iter().copied().filter(|tier| *tier >= self).collect()
    }
}

/// Serializable listing of every closed vocabulary
#[derive(Debug, Clone, Serialize)]
pub struct VocabularySnapshot {
    pub genders: Vec<&'static str>,
    pub locations: Vec<LocationOption>,
    pub ethnicities: Vec<&'static str>,
    pub skills: Vec<&'static str>,
    #[serde(rename = "unionStatuses")]
    pub union_statuses: Vec<&'static str>,
    pub availability: Vec<&'static str>,
    #[serde(rename = "travelRadius")]
    pub travel_radius: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationOption {
    pub code: &'static str,
    pub name: &'static str,
}

impl VocabularySnapshot {
    pub fn current() -> Self {
        Self {
            genders: Gender::codes(),
            locations: LocationCode::ALL
                .iter()
                .map(|code| LocationOption {
                    code: code.code(),
                    name: code.display_name(),
                })
                .collect(),
            ethnicities: Ethnicity::codes(),
            skills: SkillCategory::codes(),
            union_statuses: UnionStatus::codes(),
            availability: Availability::codes(),
            travel_radius: TravelRadius::codes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_case_insensitively() {
        assert_eq!(Gender::from_code("Female"), Some(Gender::Female));
        assert_eq!(LocationCode::from_code(" ATLANTA-GA "), Some(LocationCode::AtlantaGa));
        assert_eq!(SkillCategory::from_code("fight"), Some(SkillCategory::Fight));
        assert_eq!(TravelRadius::from_code("100"), Some(TravelRadius::Miles100));
        assert_eq!(Gender::from_code("robot"), None);
        assert_eq!(LocationCode::from_code("Atlanta"), None);
    }

    #[test]
    fn test_travel_tiers_are_ordered() {
        assert!(TravelRadius::Local < TravelRadius::Miles50);
        assert!(TravelRadius::Miles200 < TravelRadius::State);
        assert!(TravelRadius::National < TravelRadius::International);

        let qualifying = TravelRadius::Miles100.at_least();
        assert!(qualifying.contains(&TravelRadius::National));
        assert!(!qualifying.contains(&TravelRadius::Local));
        assert_eq!(TravelRadius::Local.at_least().len(), TravelRadius::ALL.len());
    }

    #[test]
    fn test_every_location_has_an_entry() {
        for code in LocationCode::ALL {
            assert!(LOCATIONS.iter().any(|entry| entry.0 == *code), "{} missing", code);
            assert!(!code.city().is_empty());
        }
        assert_eq!(LocationCode::AtlantaGa.display_name(), "Atlanta, GA");
    }

    #[test]
    fn test_serde_uses_wire_codes() {
        let json = serde_json::to_string(&TravelRadius::Miles50).unwrap();
        assert_eq!(json, "\"50\"");
        let parsed: UnionStatus = serde_json::from_str("\"non-union\"").unwrap();
        assert_eq!(parsed, UnionStatus::NonUnion);
    }

    #[test]
    fn test_fight_synonyms_cover_common_disciplines() {
        let synonyms = SkillCategory::Fight.synonyms();
        assert!(synonyms.contains(&"boxing"));
        assert!(synonyms.contains(&"muay thai"));
        assert!(synonyms.contains(&"swordplay"));
    }
}
