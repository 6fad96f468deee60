use std::env;

#[derive(Clone, Debug)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn from_env() -> Self {
        Self::parse(
            &env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string()),
        )
    }

    /// Comma separated origins; blanks are ignored.
    pub fn parse(origins: &str) -> Self {
        let allowed_origins = origins
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self { allowed_origins }
    }

    pub fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_skips_blanks() {
        let config = CorsConfig::parse(" https://a.school.edu/ , ,http://localhost:5173");
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.school.edu", "http://localhost:5173"]
        );
        assert!(!config.allows_any());
    }

    #[test]
    fn test_wildcard() {
        assert!(CorsConfig::parse("*").allows_any());
    }
}
