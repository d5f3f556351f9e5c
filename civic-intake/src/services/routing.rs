//! Department Routing
//!
//! Maps classification tags to exactly one department.
//!
//! Each tag belongs to at most one department bucket. When tags hit several
//! buckets the first bucket in this fixed order wins:
//!
//! ```text
//! Municipality > WaterAuthority > PowerBoard > PublicWorks > Other
//! ```
//!
//! Empty or unrecognized tag sets route to `Other`.

use civic_common::Department;
use tracing::debug;

const MUNICIPALITY_TAGS: &[&str] = &[
    "municipality",
    "garbage",
    "trash",
    "dumping",
    "waste",
    "litter",
    "illegal_dumping",
    "overflowing_bin",
    "plastic_waste",
    "food_waste",
    "street_litter",
    "sanitation",
    "cleaning",
];

const WATER_AUTHORITY_TAGS: &[&str] = &[
    "water_authority",
    "water",
    "leak",
    "pipe",
    "sewage",
    "drain",
    "drainage",
    "flooding",
    "waterlogging",
    "drainage_issue",
];

const POWER_BOARD_TAGS: &[&str] = &[
    "kseb",
    "light",
    "pole",
    "wire",
    "electricity",
    "electrical",
    "power",
    "streetlight",
    "transformer",
    "cable",
    "broken_streetlight",
];

const PUBLIC_WORKS_TAGS: &[&str] = &[
    "pwd",
    "road",
    "pothole",
    "tar",
    "pavement",
    "bridge",
    "highway",
    "footpath",
    "road_damage",
    "broken_infrastructure",
];

/// Buckets in priority order
const BUCKETS: [(Department, &[&str]); 4] = [
    (Department::Municipality, MUNICIPALITY_TAGS),
    (Department::WaterAuthority, WATER_AUTHORITY_TAGS),
    (Department::PowerBoard, POWER_BOARD_TAGS),
    (Department::PublicWorks, PUBLIC_WORKS_TAGS),
];

/// Canonical tag form: trimmed, lowercase, spaces and hyphens as `_`
pub fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Department responsible for an issue with these tags
pub fn assign_department<I, S>(tags: I) -> Department
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let normalized: Vec<String> = tags
        .into_iter()
        .map(|t| normalize_tag(t.as_ref()))
        .collect();

    let department = BUCKETS
        .iter()
        .find(|(_, vocabulary)| normalized.iter().any(|t| vocabulary.contains(&t.as_str())))
        .map(|(department, _)| *department)
        .unwrap_or(Department::Other);

    debug!(tags = ?normalized, department = %department, "Routed by tags");
    department
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_bucket_tags() {
        assert_eq!(assign_department(["garbage"]), Department::Municipality);
        assert_eq!(assign_department(["sewage"]), Department::WaterAuthority);
        assert_eq!(assign_department(["streetlight"]), Department::PowerBoard);
        assert_eq!(assign_department(["pothole"]), Department::PublicWorks);
    }

    #[test]
    fn test_department_tag_itself_routes() {
        assert_eq!(assign_department(["kseb"]), Department::PowerBoard);
        assert_eq!(assign_department(["pwd"]), Department::PublicWorks);
    }

    #[test]
    fn test_mixed_buckets_use_priority_order() {
        for _ in 0..10 {
            assert_eq!(
                assign_department(["garbage", "pothole"]),
                Department::Municipality
            );
            assert_eq!(
                assign_department(["pothole", "garbage"]),
                Department::Municipality
            );
        }
        assert_eq!(
            assign_department(["wire", "flooding"]),
            Department::WaterAuthority
        );
    }

    #[test]
    fn test_unmatched_and_empty_route_to_other() {
        assert_eq!(assign_department(Vec::<String>::new()), Department::Other);
        assert_eq!(
            assign_department(["graffiti", "stray_animal"]),
            Department::Other
        );
        assert_eq!(assign_department(["other"]), Department::Other);
    }

    #[test]
    fn test_tags_are_normalized() {
        assert_eq!(assign_department(["  Pothole "]), Department::PublicWorks);
        assert_eq!(
            assign_department(["Broken Streetlight"]),
            Department::PowerBoard
        );
        assert_eq!(assign_department(["road-damage"]), Department::PublicWorks);
    }
}
