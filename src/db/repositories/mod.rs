// Repositories Module
// sqlx-backed implementations of the repository traits

pub mod domain_repository;
pub mod endpoint_repository;
pub mod preference_repository;

// Re-export for convenience
pub use domain_repository::DomainRepositoryImpl;
pub use endpoint_repository::EndpointRepositoryImpl;
pub use preference_repository::PreferenceRepositoryImpl;
