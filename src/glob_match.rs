//! `match-glob-pieces` collaborator: does a basename match a single
//! path-component glob pattern?
//!
//! Matches one basename per call rather than a whole relative path, since
//! each piece here covers exactly one path component (see `model::Glob`).

use globset::Glob;

/// Compiles `pieces` as a glob pattern and tests it against `basename`.
pub fn matches(pieces: &str, basename: &str) -> Result<bool, globset::Error> {
    let matcher = Glob::new(pieces)?.compile_matcher();
    Ok(matcher.is_match(basename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_simple_extension_glob() {
        assert!(matches("*.txt", "a.txt").unwrap());
        assert!(!matches("*.txt", "a.rs").unwrap());
    }

    #[test]
    fn matches_exact_name() {
        assert!(matches("Cargo.toml", "Cargo.toml").unwrap());
        assert!(!matches("Cargo.toml", "cargo.toml").unwrap());
    }

    #[test]
    fn rejects_invalid_pattern() {
        assert!(matches("[", "a").is_err());
    }
}
