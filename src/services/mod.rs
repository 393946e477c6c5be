pub mod auth_service;
pub mod auth_service_impl;

pub use auth_service::{AuthError, AuthService, AuthenticatedUser, UserInfo};
pub use auth_service_impl::SeaOrmAuthService;
