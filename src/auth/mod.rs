//! Session establishment and pre-crawl auth validation
//!
//! [`establish`] opens the first browsing context with the configured
//! credentials and probes the base URL once. Anything but an authenticated
//! verdict is fatal: the crawl never starts on a login page.

mod descriptor;
pub mod probe;

use crate::browser::{BrowserEngine, BrowsingContext};
use crate::AtlasError;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub use descriptor::{AuthCookie, AuthDescriptor};

/// Verdict of the validation probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    RedirectedToLogin { final_url: String },
    Unauthorized { status: u16 },
    Unreachable { reason: String },
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }

    /// Converts a failed verdict into its error; `None` when authenticated
    pub fn into_error(self) -> Option<AuthError> {
        match self {
            Self::Authenticated => None,
            Self::RedirectedToLogin { final_url } => Some(AuthError::RedirectedToLogin { final_url }),
            Self::Unauthorized { status } => Some(AuthError::Unauthorized { status }),
            Self::Unreachable { reason } => Some(AuthError::Unreachable { reason }),
        }
    }
}

/// Fatal auth failures, with a message the operator can act on
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error(
        "redirected to a login page ({final_url}); the session credentials are missing, \
         expired or scoped to another domain. Refresh the cookies or token in [crawl.auth]"
    )]
    RedirectedToLogin { final_url: String },

    #[error(
        "the application rejected the credentials with HTTP {status}; check that the token \
         or cookies in [crawl.auth] belong to an account with access to the base URL"
    )]
    Unauthorized { status: u16 },

    #[error("the application is unreachable: {reason}. Check crawl.base-url and network access")]
    Unreachable { reason: String },
}

impl AuthError {
    pub fn outcome(&self) -> AuthOutcome {
        match self {
            Self::RedirectedToLogin { final_url } => AuthOutcome::RedirectedToLogin {
                final_url: final_url.clone(),
            },
            Self::Unauthorized { status } => AuthOutcome::Unauthorized { status: *status },
            Self::Unreachable { reason } => AuthOutcome::Unreachable {
                reason: reason.clone(),
            },
        }
    }
}

/// Opens an authenticated browsing context and validates it against `base`
///
/// # Arguments
///
/// * `engine` - The browser engine
/// * `auth` - Credentials, or `None` for an unauthenticated crawl
/// * `base` - The crawl's base URL
/// * `page_timeout` - Bound on the probe navigation
/// * `settle` - Wait-stable budget before reading the DOM
///
/// # Returns
///
/// * `Ok(Context)` - A validated context, positioned on the base URL
/// * `Err(AtlasError::Auth)` - The probe did not classify as authenticated
/// * `Err(AtlasError::Browser)` - The context could not be opened
pub async fn establish<E: BrowserEngine>(
    engine: &E,
    auth: Option<&AuthDescriptor>,
    base: &Url,
    page_timeout: Duration,
    settle: Duration,
) -> Result<E::Context, AtlasError> {
    match auth {
        Some(descriptor) => tracing::info!(
            "Validating {} session against {}",
            descriptor.strategy(),
            base
        ),
        None => tracing::info!("Validating unauthenticated access to {}", base),
    }

    let mut context = engine.open_context(auth).await?;

    let navigation = match tokio::time::timeout(page_timeout, context.navigate(base)).await {
        Ok(result) => result,
        Err(_) => Err(crate::browser::BrowserError::Timeout(page_timeout)),
    };

    let dom = match &navigation {
        Ok(_) => {
            if let Err(e) = context.wait_stable(settle).await {
                tracing::debug!("wait_stable failed during auth probe: {}", e);
            }
            context.read_dom().await.ok()
        }
        Err(_) => None,
    };

    let outcome = probe::classify(base, navigation.as_ref(), dom.as_deref());

    match outcome.into_error() {
        None => {
            tracing::info!("Auth check passed for {}", base);
            Ok(context)
        }
        Some(error) => {
            tracing::error!("Auth check failed: {}", error);
            if let Err(e) = context.close().await {
                tracing::debug!("Failed to close probe context: {}", e);
            }
            Err(error.into())
        }
    }
}
