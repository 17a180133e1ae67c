//! Scene-graph identifier sanitization.

use std::collections::HashSet;

/// Name used when sanitization leaves nothing behind.
pub const UNNAMED: &str = "_unnamed";

/// Map an arbitrary source name to a valid scene node identifier.
///
/// `-`, `.` and spaces become `_`. Any other character that is neither a
/// Unicode letter or digit nor `_` is dropped, and a leading digit gets a
/// `_` prefix.
/// Distinct inputs may map to the same identifier; callers that need unique
/// names must disambiguate themselves.
///
/// ```
/// use sim_sdf::sanitize_name;
///
/// assert_eq!(sanitize_name("left-leg.01"), "left_leg_01");
/// assert_eq!(sanitize_name("9wheel"), "_9wheel");
/// assert_eq!(sanitize_name(""), "_unnamed");
/// ```
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .filter_map(|c| match c {
            '-' | '.' | ' ' => Some('_'),
            c if c.is_alphanumeric() || c == '_' => Some(c),
            _ => None,
        })
        .collect();

    if out.is_empty() {
        return UNNAMED.to_string();
    }
    if out.starts_with(char::is_numeric) {
        out.insert(0, '_');
    }
    out
}

/// Hands out names unique within one scope.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `base`, or `base_1`, `base_2`, ... if it is taken.
    pub fn claim(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut counter = 1;
        while self.used.contains(&name) {
            name = format!("{base}_{counter}");
            counter += 1;
        }
        self.used.insert(name.clone());
        name
    }

    /// Mark a name as taken without suffixing it.
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replacements() {
        assert_eq!(sanitize_name("left-leg.01"), "left_leg_01");
        assert_eq!(sanitize_name("base link"), "base_link");
    }

    #[test]
    fn test_sanitize_leading_digit() {
        assert_eq!(sanitize_name("9wheel"), "_9wheel");
        assert_eq!(sanitize_name("#9wheel"), "_9wheel");
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize_name(""), UNNAMED);
        assert_eq!(sanitize_name("@#$"), UNNAMED);
    }

    #[test]
    fn test_sanitize_drops_invalid() {
        assert_eq!(sanitize_name("arm/joint(1)"), "armjoint1");
        assert_eq!(sanitize_name("wheel#2!"), "wheel2");
    }

    #[test]
    fn test_sanitize_keeps_unicode_letters() {
        assert_eq!(sanitize_name("ümlaut"), "ümlaut");
        assert_eq!(sanitize_name("grüße-arm"), "grüße_arm");
        assert_eq!(sanitize_name("関節 1"), "関節_1");
        assert_eq!(sanitize_name("²nd"), "_²nd");
        assert_eq!(sanitize_name("☃"), UNNAMED);
    }

    #[test]
    fn test_sanitize_already_valid() {
        assert_eq!(sanitize_name("chassis_2"), "chassis_2");
    }

    #[test]
    fn test_sanitize_collision_not_disambiguated() {
        assert_eq!(sanitize_name("a-b"), sanitize_name("a.b"));
    }

    #[test]
    fn test_registry_suffixes() {
        let mut names = NameRegistry::new();
        names.reserve("Looks");
        assert_eq!(names.claim("base"), "base");
        assert_eq!(names.claim("base"), "base_1");
        assert_eq!(names.claim("Looks"), "Looks_1");
        assert_eq!(names.claim("base"), "base_2");
    }
}
