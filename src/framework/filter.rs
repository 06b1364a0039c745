use crate::framework::core::DEFAULT_RESOURCE_TYPES;

/// Selects which traffic categories are worth correlating
#[derive(Debug, Clone)]
pub struct ResourceFilter {
    allowed: Vec<String>,
}

impl ResourceFilter {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|t| {
                    let t: String = t.into();
                    t.trim().to_string()
                })
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_relevant(&self, resource_type: &str) -> bool {
        self.allowed
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(resource_type))
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

impl Default for ResourceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_RESOURCE_TYPES)
    }
}
