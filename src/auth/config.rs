use std::time::Duration;

/// Configuration of the client cookie and the sign-in redirect.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Name of the cookie carrying the client identifier
    pub cookie_name: String,
    /// The path unauthenticated or unauthorized clients are sent to
    pub sign_in_path: String,
    /// Whether to use secure cookies (HTTPS only)
    pub secure_cookies: bool,
    /// Cookie domain restriction
    pub cookie_domain: Option<String>,
    /// Cookie path restriction
    pub cookie_path: String,
    /// Cookie SameSite policy
    pub same_site: Option<cookie::SameSite>,
    /// Lifetime of the client cookie; `None` makes it a browser-session cookie
    pub max_age: Option<Duration>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            cookie_name: "eventhive_sid".to_string(),
            sign_in_path: "/signin".to_string(),
            secure_cookies: true,
            cookie_domain: None,
            cookie_path: "/".to_string(),
            same_site: Some(cookie::SameSite::Lax),
            max_age: Some(Duration::from_secs(60 * 60 * 24 * 30)),
        }
    }
}
