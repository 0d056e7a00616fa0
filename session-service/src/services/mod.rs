pub mod action_store;
pub mod audit;
pub mod error;
pub mod mailer;
pub mod principal_store;
pub mod session;
pub mod token;
pub mod token_store;

pub use action_store::{ActionTokenStore, MemoryActionTokenStore, PgActionTokenStore};
pub use audit::{AuditLog, AuthEventSink, MemoryAuthEventSink, PgAuthEventSink};
pub use error::ServiceError;
pub use mailer::{LogMailer, Mailer};
pub use principal_store::{MemoryPrincipalStore, PgPrincipalStore, PrincipalStore};
pub use session::{EstablishedSession, SessionService};
pub use token::{Claims, TokenError, TokenKind, TokenService};
pub use token_store::{MemoryRefreshTokenStore, PgRefreshTokenStore, RefreshTokenStore};
