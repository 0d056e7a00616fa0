pub mod action_token;
pub mod auth_event;
pub mod principal;
pub mod refresh_token;

pub use action_token::{ActionKind, ActionToken};
pub use auth_event::{AuthEvent, AuthEventKind};
pub use principal::{Principal, PrincipalView, Role};
pub use refresh_token::{ClientMeta, RefreshTokenRecord};
