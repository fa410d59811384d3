pub mod authorizer;
pub mod callback_listener;
pub mod classroom;
pub mod config_repository;
pub mod configuration;
pub mod network;
pub mod oauth;
pub mod telemetry;
pub mod token_store;

// Re-exports for convenience
pub use authorizer::{LoopbackAuthorizer, UserPrompt};
pub use callback_listener::CallbackListener;
pub use classroom::{ClassroomClient, RetryPolicy};
pub use config_repository::FileConfigRepository;
pub use oauth::GoogleOAuthProvider;
pub use token_store::FileTokenStore;
