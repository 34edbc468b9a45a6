//! Map free-text addresses to Taiwanese cities and counties.
//!
//! This is a containment scan, not an address parser: the first canonical
//! name (in declaration order) that appears anywhere in the text wins.

/// Canonical city/county names, in match priority order.
///
/// Both the `台` and `臺` spellings are listed where the portal uses them
/// interchangeably.
pub const REGIONS: &[&str] = &[
    "台北市", "臺北市", "新北市", "基隆市", "桃園市", "新竹市", "新竹縣", "宜蘭縣", "苗栗縣",
    "台中市", "臺中市", "彰化縣", "南投縣", "雲林縣", "嘉義市", "嘉義縣", "台南市", "臺南市",
    "高雄市", "屏東縣", "花蓮縣", "台東縣", "臺東縣", "澎湖縣", "金門縣", "連江縣",
];

/// The regions this monitor reports on.
pub const NORTHERN_REGIONS: &[&str] = &[
    "台北市", "臺北市", "新北市", "基隆市", "桃園市", "宜蘭縣", "新竹市", "新竹縣",
];

/// Classifies addresses against a fixed region table.
#[derive(Debug, Clone)]
pub struct RegionClassifier {
    regions: &'static [&'static str],
    northern: &'static [&'static str],
}

impl Default for RegionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionClassifier {
    pub fn new() -> Self {
        Self {
            regions: REGIONS,
            northern: NORTHERN_REGIONS,
        }
    }

    /// Return the first known region name contained in `text`.
    pub fn classify(&self, text: &str) -> Option<&'static str> {
        if text.is_empty() {
            return None;
        }
        self.regions.iter().copied().find(|r| text.contains(r))
    }

    /// Whether `region` is one of the northern regions.
    pub fn is_northern(&self, region: &str) -> bool {
        self.northern.contains(&region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_finds_embedded_city() {
        let c = RegionClassifier::new();
        assert_eq!(c.classify("220新北市板橋區中山路一段161號"), Some("新北市"));
        assert_eq!(c.classify("[臺北市]"), Some("臺北市"));
        assert_eq!(c.classify("高雄市苓雅區四維三路2號"), Some("高雄市"));
    }

    #[test]
    fn test_classify_none() {
        let c = RegionClassifier::new();
        assert_eq!(c.classify(""), None);
        assert_eq!(c.classify("No. 1, Some Road"), None);
        assert_eq!(c.classify("板橋區中山路"), None);
    }

    #[test]
    fn test_classify_first_declared_wins() {
        let c = RegionClassifier::new();
        // Both names occur; 台北市 is declared before 新竹縣.
        assert_eq!(c.classify("新竹縣竹北市 (台北市辦事處)"), Some("台北市"));
    }

    #[test]
    fn test_is_northern() {
        let c = RegionClassifier::new();
        assert!(c.is_northern("新北市"));
        assert!(c.is_northern("臺北市"));
        assert!(c.is_northern("宜蘭縣"));
        assert!(!c.is_northern("高雄市"));
        assert!(!c.is_northern("苗栗縣"));
        assert!(!c.is_northern(""));
    }

    #[test]
    fn test_northern_regions_are_known_regions() {
        for r in NORTHERN_REGIONS {
            assert!(REGIONS.contains(r), "{r} missing from REGIONS");
        }
    }
}
