use crate::provider::{ProviderConfig, ProviderStatus};

/// Partial update applied by [`ProviderRegistry::update`].
///
/// `None` fields are left untouched. Status is reconciled with the new
/// thresholds after the patch is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderPatch {
    pub name: Option<String>,
    pub priority: Option<i64>,
    pub quota_limit: Option<u64>,
    pub max_errors: Option<u32>,
}

impl ProviderPatch {
    pub fn priority(priority: i64) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn quota_limit(quota_limit: u64) -> Self {
        Self {
            quota_limit: Some(quota_limit),
            ..Self::default()
        }
    }

    pub fn max_errors(max_errors: u32) -> Self {
        Self {
            max_errors: Some(max_errors),
            ..Self::default()
        }
    }

    /// Apply the set fields to `provider` and reconcile its status.
    /// Returns the previous status.
    pub fn apply_to(self, provider: &mut ProviderConfig) -> ProviderStatus {
        let previous = provider.status;

        if let Some(name) = self.name {
            provider.name = name;
        }
        if let Some(priority) = self.priority {
            provider.priority = priority;
        }
        if let Some(quota_limit) = self.quota_limit {
            provider.quota_limit = quota_limit;
        }
        if let Some(max_errors) = self.max_errors {
            provider.max_errors = max_errors;
        }
        provider.reconcile_status();

        previous
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Updated,
    NotFound,
}

/// Ordered set of configured providers.
///
/// Insertion order is preserved and is the tie-break for equal priorities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Build a registry from an ordered list, rejecting duplicate ids.
    pub fn from_providers(providers: Vec<ProviderConfig>) -> Result<Self, String> {
        let mut registry = Self::new();
        for provider in providers {
            registry.insert(provider)?;
        }
        Ok(registry)
    }

    /// Append a provider. Ids are unique and never change after creation.
    pub fn insert(&mut self, provider: ProviderConfig) -> Result<(), String> {
        if provider.id.is_empty() {
            return Err("provider id cannot be empty".to_string());
        }
        if self.contains(&provider.id) {
            return Err(format!("provider id '{}' is duplicated", provider.id));
        }
        self.providers.push(provider);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.iter().any(|p| p.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ProviderConfig> {
        self.providers.iter_mut().find(|p| p.id == id)
    }

    /// Apply a partial update. Unknown ids are a no-op reported as `NotFound`.
    pub fn update(&mut self, id: &str, patch: ProviderPatch) -> UpdateStatus {
        let Some(provider) = self.get_mut(id) else {
            return UpdateStatus::NotFound;
        };

        patch.apply_to(provider);
        UpdateStatus::Updated
    }

    /// Eligible providers sorted by ascending priority, ties in insertion order.
    pub fn eligible(&self) -> Vec<&ProviderConfig> {
        let mut eligible: Vec<&ProviderConfig> =
            self.providers.iter().filter(|p| p.is_eligible()).collect();
        // sort_by_key is stable, so equal priorities keep registry order
        eligible.sort_by_key(|p| p.priority);
        eligible
    }

    pub fn next(&self) -> Option<&ProviderConfig> {
        self.eligible().into_iter().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id.as_str()).collect()
    }
}
