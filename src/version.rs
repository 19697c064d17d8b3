// Package version

/// Crate version as declared in Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `(major, minor, patch)` of [`VERSION`]
pub fn version_tuple() -> (u32, u32, u32) {
    parse_version(VERSION).unwrap_or((0, 0, 0))
}

/// Parse the leading `major.minor[.patch]` of a version string, ignoring any suffix
fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
    let core = version.split(['-', '+']).next()?;
    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    Some((major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_tuple_matches_manifest() {
        let (major, minor, patch) = version_tuple();
        assert_eq!(
            format!("{}.{}.{}", major, minor, patch),
            VERSION.split(['-', '+']).next().unwrap()
        );
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("1.2.3"), Some((1, 2, 3)));
        assert_eq!(parse_version("0.9"), Some((0, 9, 0)));
        assert_eq!(parse_version("2.0.1-rc.1"), Some((2, 0, 1)));
        assert_eq!(parse_version("garbage"), None);
    }
}
