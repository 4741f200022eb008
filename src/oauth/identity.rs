//! Verified identity of the page a gadget is rendered on

use serde::{Deserialize, Serialize};

/// Owner/viewer identity plus the gadget instance it was issued for.
///
/// Produced by the container after verifying its own security token; this
/// crate treats it as trusted input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityToken {
    /// Page owner
    pub owner_id: Option<String>,
    /// Current viewer
    pub viewer_id: Option<String>,
    /// Application id
    pub app_id: String,
    /// Gadget spec URL
    pub app_url: String,
    /// Module (gadget instance) id
    pub module_id: u64,
    /// Container domain, used as consumer key when no default key names one
    pub domain: String,
}

impl SecurityToken {
    /// Anonymous token for a gadget
    #[must_use]
    pub fn new(app_url: &str) -> Self {
        Self {
            app_id: app_url.to_string(),
            app_url: app_url.to_string(),
            ..Self::default()
        }
    }

    /// Set the owner
    #[must_use]
    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner_id = Some(owner.to_string());
        self
    }

    /// Set the viewer
    #[must_use]
    pub fn with_viewer(mut self, viewer: &str) -> Self {
        self.viewer_id = Some(viewer.to_string());
        self
    }

    /// Set the module id
    #[must_use]
    pub fn with_module(mut self, module_id: u64) -> Self {
        self.module_id = module_id;
        self
    }

    /// Set the container domain
    #[must_use]
    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = domain.to_string();
        self
    }

    /// Whether the viewer is the page owner
    #[must_use]
    pub fn viewer_is_owner(&self) -> bool {
        matches!((&self.owner_id, &self.viewer_id), (Some(o), Some(v)) if o == v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_viewing_requires_both_ids() {
        let token = SecurityToken::new("http://gadget.example.com/g.xml");
        assert!(!token.viewer_is_owner());

        let token = token.with_owner("alice");
        assert!(!token.viewer_is_owner());

        assert!(token.clone().with_viewer("alice").viewer_is_owner());
        assert!(!token.with_viewer("bob").viewer_is_owner());
    }
}
