/// Loose dotted version ("1.20.1", "1.19.4-pre1", "47.2.0")
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Version(String);

impl Version {
    pub fn new(v: &str) -> Self {
        Version(v.trim().to_string())
    }

    fn release(&self) -> &str {
        match self.0.split_once('-') {
            Some((base, _)) => base,
            None => self.0.as_str(),
        }
    }

    /// Whether this version belongs to `series`: "1.20" covers "1.20" and
    /// "1.20.x" but not "1.21" or "1.2".
    pub fn in_series(&self, series: &str) -> bool {
        let series = series.trim();
        if series.is_empty() {
            return false;
        }
        let base = self.release();
        base == series
            || base
                .strip_prefix(series)
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// Shorthand for `Version::in_series`
pub fn version_in_series(version: &str, series: &str) -> bool {
    Version::new(version).in_series(series)
}
