use super::{
    directory::{NewAccount, UserDirectory},
    error::{AuthError, AuthResult, SignupInvalid},
    password::Passwords,
    user::{Role, User},
};
use crate::notifications::Notifications;
use crate::session::Session;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MIN_PASSWORD_LEN: usize = 6;
const LANDING_PATH: &str = "/";

/// Where the client should go next. Auth redirects replace the current
/// history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub to: String,
    pub replace: bool,
}

impl Navigation {
    fn replace(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            replace: true,
        }
    }
}

#[derive(Debug)]
pub enum AuthOutcome {
    Navigate(Navigation),
    /// Already reported on the notification channel.
    Failed(AuthError),
}

impl AuthOutcome {
    pub fn navigation(&self) -> Option<&Navigation> {
        match self {
            AuthOutcome::Navigate(nav) => Some(nav),
            AuthOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&AuthError> {
        match self {
            AuthOutcome::Navigate(_) => None,
            AuthOutcome::Failed(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: String,
    /// Requested role; anything but `admin` or `host` signs up a `user`.
    #[serde(default, alias = "userType")]
    pub user_type: String,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), SignupInvalid> {
        if self.name.trim().is_empty() {
            return Err(SignupInvalid::MissingName);
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(SignupInvalid::InvalidEmail),
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SignupInvalid::PasswordTooShort(MIN_PASSWORD_LEN));
        }
        if self.password != self.confirm_password {
            return Err(SignupInvalid::PasswordMismatch);
        }
        Ok(())
    }
}

/// Login, sign-up and logout: the only writer of a client's [`Session`].
///
/// Every failure is pushed to the client's [`Notifications`] and returned as
/// [`AuthOutcome::Failed`]; nothing propagates as an error.
pub struct AuthOperations {
    directory: Arc<dyn UserDirectory>,
    passwords: Passwords,
}

impl AuthOperations {
    pub fn new(directory: Arc<dyn UserDirectory>, passwords: Passwords) -> Self {
        Self {
            directory,
            passwords,
        }
    }

    pub async fn login(
        &self,
        session: &Session,
        notifications: &Notifications,
        email: &str,
        password: &str,
    ) -> AuthOutcome {
        let Some(_loading) = session.begin_operation() else {
            return report(notifications, "Authentication failed", AuthError::Busy);
        };

        match self.try_login(session, email.trim(), password).await {
            Ok(user) => {
                info!("{} signed in as {}", user.email, user.role);
                notifications.info(
                    "Signed in successfully",
                    Some(format!("Welcome back, {}!", user.name)),
                );
                AuthOutcome::Navigate(Navigation::replace(user.role.home_path()))
            }
            Err(e) => {
                warn!("sign-in failed for {}: {}", email.trim(), e);
                report(notifications, "Authentication failed", e)
            }
        }
    }

    async fn try_login(&self, session: &Session, email: &str, password: &str) -> AuthResult<User> {
        let found = self
            .directory
            .authenticate(email, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let user = found.into_user();
        session.establish(user.clone())?;
        Ok(user)
    }

    pub async fn signup(
        &self,
        session: &Session,
        notifications: &Notifications,
        request: SignupRequest,
    ) -> AuthOutcome {
        let Some(_loading) = session.begin_operation() else {
            return report(notifications, "Registration failed", AuthError::Busy);
        };

        match self.try_signup(session, request).await {
            Ok(user) => {
                info!("{} signed up as {}", user.email, user.role);
                notifications.info(
                    "Account created successfully",
                    Some(format!("Welcome to EventHive, {}!", user.name)),
                );
                AuthOutcome::Navigate(Navigation::replace(user.role.home_path()))
            }
            Err(e) => {
                warn!("sign-up failed: {}", e);
                report(notifications, "Registration failed", e)
            }
        }
    }

    async fn try_signup(&self, session: &Session, request: SignupRequest) -> AuthResult<User> {
        request.validate()?;

        let email = request.email.trim();
        if self.directory.email_exists(email).await? {
            return Err(AuthError::EmailAlreadyRegistered);
        }

        let user = User::new(
            request.name.trim(),
            email,
            Role::for_signup(request.user_type.trim()),
        );
        let password_hash = self.passwords.hash_blocking(&request.password).await?;

        self.directory
            .register(NewAccount {
                user: user.clone(),
                password_hash,
            })
            .await?;
        session.establish(user.clone())?;
        Ok(user)
    }

    pub fn logout(&self, session: &Session, notifications: &Notifications) -> AuthOutcome {
        let Some(_loading) = session.begin_operation() else {
            return report(notifications, "Sign out failed", AuthError::Busy);
        };

        if let Some(user) = session.current_user() {
            info!("{} signed out", user.email);
        }

        match session.end() {
            Ok(()) => {
                notifications.info("Signed out successfully", None);
                AuthOutcome::Navigate(Navigation::replace(LANDING_PATH))
            }
            Err(e) => report(notifications, "Sign out failed", e.into()),
        }
    }
}

fn report(notifications: &Notifications, title: &str, error: AuthError) -> AuthOutcome {
    notifications.error(title, Some(error.to_string()));
    AuthOutcome::Failed(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::directory::{BackendDirectory, DirectoryUser, SeedUser};
    use crate::backend::{BackendError, BackendResult, MemoryBackend};
    use crate::notifications::Variant;
    use crate::session::{
        Snapshot,
        storage::{KeyValueStore, MemoryStorage},
        store::{SESSION_KEY, SessionStore},
    };
    use async_trait::async_trait;

    struct Fixture {
        auth: AuthOperations,
        session: Session,
        storage: Arc<MemoryStorage>,
        notifications: Notifications,
    }

    async fn fixture() -> Fixture {
        let passwords = Passwords::fast();
        let seed = ["admin", "host", "user"]
            .into_iter()
            .map(|role| SeedUser {
                id: Some("1".into()),
                name: format!("{role} name"),
                email: format!("{role}@eventhive.com"),
                password: "password".into(),
                role: role.parse().unwrap(),
            })
            .collect();
        let directory = BackendDirectory::new(Arc::new(MemoryBackend::new()), passwords.clone());
        directory.seed(seed).await.unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let session = Session::new(SessionStore::new(storage.clone()));
        session.hydrate();

        Fixture {
            auth: AuthOperations::new(Arc::new(directory), passwords),
            session,
            storage,
            notifications: Notifications::new(),
        }
    }

    fn signup_request(email: &str, user_type: &str) -> SignupRequest {
        SignupRequest {
            name: "New Person".into(),
            email: email.into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            user_type: user_type.into(),
        }
    }

    #[tokio::test]
    async fn login_navigates_by_role_and_persists() {
        for (role, path) in [
            ("admin", "/dashboard"),
            ("host", "/manage-events"),
            ("user", "/events"),
        ] {
            let f = fixture().await;
            let outcome = f
                .auth
                .login(
                    &f.session,
                    &f.notifications,
                    &format!("{role}@eventhive.com"),
                    "password",
                )
                .await;

            assert_eq!(outcome.navigation().map(|n| n.to.as_str()), Some(path));
            let user = f.session.current_user().unwrap();
            assert_eq!(user.role.as_str(), role);
            // the seeded "1" id was not a UUID and got replaced
            assert_ne!(user.id.to_string(), "1");

            let stored = f.storage.get(SESSION_KEY).unwrap().unwrap();
            assert!(!stored.contains("password"));
            assert!(!f.session.is_loading());
        }
    }

    #[tokio::test]
    async fn bad_credentials_leave_session_unchanged() {
        let f = fixture().await;
        let outcome = f
            .auth
            .login(&f.session, &f.notifications, "user@eventhive.com", "nope")
            .await;

        assert!(matches!(outcome.error(), Some(AuthError::InvalidCredentials)));
        assert_eq!(f.session.snapshot(), Snapshot::Anonymous);
        assert_eq!(f.storage.get(SESSION_KEY).unwrap(), None);
        assert!(!f.session.is_loading());

        let notices = f.notifications.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Authentication failed");
        assert_eq!(notices[0].variant, Variant::Destructive);
        assert_eq!(
            notices[0].description.as_deref(),
            Some("Invalid email or password")
        );
    }

    #[tokio::test]
    async fn signup_with_existing_email_leaves_session_unchanged() {
        let f = fixture().await;
        f.auth
            .login(&f.session, &f.notifications, "host@eventhive.com", "password")
            .await;
        let before = f.session.snapshot();

        let outcome = f
            .auth
            .signup(
                &f.session,
                &f.notifications,
                signup_request("user@eventhive.com", "user"),
            )
            .await;

        assert!(matches!(
            outcome.error(),
            Some(AuthError::EmailAlreadyRegistered)
        ));
        assert_eq!(f.session.snapshot(), before);
        assert!(!f.session.is_loading());
    }

    #[tokio::test]
    async fn signup_registers_and_signs_in() {
        let f = fixture().await;
        let outcome = f
            .auth
            .signup(
                &f.session,
                &f.notifications,
                signup_request("new@eventhive.com", "host"),
            )
            .await;

        assert_eq!(
            outcome.navigation(),
            Some(&Navigation::replace("/manage-events"))
        );
        assert_eq!(f.session.current_user().unwrap().role, Role::Host);

        // the new account can sign in again
        f.auth.logout(&f.session, &f.notifications);
        let outcome = f
            .auth
            .login(&f.session, &f.notifications, "new@eventhive.com", "secret1")
            .await;
        assert!(outcome.navigation().is_some());
    }

    #[tokio::test]
    async fn signup_unknown_role_becomes_user() {
        let f = fixture().await;
        let outcome = f
            .auth
            .signup(
                &f.session,
                &f.notifications,
                signup_request("root@eventhive.com", "superuser"),
            )
            .await;

        assert_eq!(outcome.navigation().map(|n| n.to.as_str()), Some("/events"));
        assert_eq!(f.session.current_user().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn signup_validation_runs_first() {
        let f = fixture().await;
        let mut request = signup_request("new@eventhive.com", "user");
        request.confirm_password = "different".into();

        let outcome = f
            .auth
            .signup(&f.session, &f.notifications, request)
            .await;
        assert!(matches!(
            outcome.error(),
            Some(AuthError::Validation(SignupInvalid::PasswordMismatch))
        ));
        assert_eq!(f.session.snapshot(), Snapshot::Anonymous);
    }

    #[test]
    fn signup_request_validation() {
        let ok = signup_request("a@b.io", "");
        assert_eq!(ok.validate(), Ok(()));

        let mut r = ok.clone();
        r.name = "  ".into();
        assert_eq!(r.validate(), Err(SignupInvalid::MissingName));

        let mut r = ok.clone();
        r.email = "not-an-email".into();
        assert_eq!(r.validate(), Err(SignupInvalid::InvalidEmail));

        let mut r = ok.clone();
        r.password = "abc".into();
        r.confirm_password = "abc".into();
        assert_eq!(
            r.validate(),
            Err(SignupInvalid::PasswordTooShort(MIN_PASSWORD_LEN))
        );
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let f = fixture().await;
        f.auth
            .login(&f.session, &f.notifications, "admin@eventhive.com", "password")
            .await;
        assert!(f.session.is_authenticated());

        let outcome = f.auth.logout(&f.session, &f.notifications);

        assert_eq!(outcome.navigation(), Some(&Navigation::replace("/")));
        assert_eq!(f.session.snapshot(), Snapshot::Anonymous);
        let reloaded = SessionStore::new(f.storage.clone());
        assert_eq!(reloaded.load(), None);
    }

    #[tokio::test]
    async fn concurrent_operation_is_rejected() {
        let f = fixture().await;
        let _held = f.session.begin_operation().unwrap();

        let outcome = f
            .auth
            .login(&f.session, &f.notifications, "admin@eventhive.com", "password")
            .await;
        assert!(matches!(outcome.error(), Some(AuthError::Busy)));
        assert!(!f.session.is_authenticated());
    }

    struct DownDirectory;

    #[async_trait]
    impl UserDirectory for DownDirectory {
        async fn authenticate(&self, _: &str, _: &str) -> BackendResult<Option<DirectoryUser>> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        async fn email_exists(&self, _: &str) -> BackendResult<bool> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        async fn register(&self, _: NewAccount) -> BackendResult<()> {
            Err(BackendError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn backend_failure_is_reported_not_raised() {
        let storage = Arc::new(MemoryStorage::new());
        let session = Session::new(SessionStore::new(storage));
        session.hydrate();
        let notifications = Notifications::new();
        let auth = AuthOperations::new(Arc::new(DownDirectory), Passwords::fast());

        let outcome = auth
            .login(&session, &notifications, "a@b.io", "password")
            .await;

        assert!(matches!(
            outcome.error(),
            Some(AuthError::Backend(BackendError::Unavailable(_)))
        ));
        assert!(!session.is_loading());
        assert_eq!(notifications.drain().len(), 1);
    }
}
