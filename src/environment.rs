//! Ambient page context supplied by the host.

use std::sync::RwLock;

/// Page and client context stamped onto every record.
pub trait Environment: Send + Sync {
    /// URL of the page the event was observed on.
    fn page_url(&self) -> Result<String, EnvironmentError>;

    /// Client agent string.
    fn user_agent(&self) -> Result<String, EnvironmentError>;

    /// Host name of the current page, empty when the URL has none.
    fn domain(&self) -> String {
        self.page_url()
            .ok()
            .and_then(|u| url::Url::parse(&u).ok())
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }
}

/// Environment errors.
#[derive(Debug)]
pub enum EnvironmentError {
    Unavailable(String),
}

impl std::fmt::Display for EnvironmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentError::Unavailable(e) => write!(f, "Environment unavailable: {e}"),
        }
    }
}

impl std::error::Error for EnvironmentError {}

/// Environment with a mutable current URL and a fixed client agent.
#[derive(Debug)]
pub struct PageEnvironment {
    page_url: RwLock<String>,
    user_agent: String,
}

impl PageEnvironment {
    pub fn new(page_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            page_url: RwLock::new(page_url.into()),
            user_agent: user_agent.into(),
        }
    }

    /// Environment for a headless agent on this machine.
    pub fn local() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Self::new(
            "about:blank",
            format!("vakaru-pixel/{} ({hostname})", crate::VERSION),
        )
    }

    /// Move to a new page.
    pub fn navigate(&self, url: impl Into<String>) {
        let mut current = self.page_url.write().unwrap_or_else(|e| e.into_inner());
        *current = url.into();
    }
}

impl Environment for PageEnvironment {
    fn page_url(&self) -> Result<String, EnvironmentError> {
        Ok(self
            .page_url
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn user_agent(&self) -> Result<String, EnvironmentError> {
        Ok(self.user_agent.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_from_url() {
        let env = PageEnvironment::new("https://shop.example.com/products/hat?x=1", "agent");
        assert_eq!(env.domain(), "shop.example.com");
    }

    #[test]
    fn test_domain_without_host() {
        let env = PageEnvironment::new("about:blank", "agent");
        assert_eq!(env.domain(), "");
    }

    #[test]
    fn test_navigate_updates_url() {
        let env = PageEnvironment::new("https://a.example/", "agent");
        env.navigate("https://b.example/cart");
        assert_eq!(env.page_url().unwrap(), "https://b.example/cart");
        assert_eq!(env.domain(), "b.example");
    }
}
