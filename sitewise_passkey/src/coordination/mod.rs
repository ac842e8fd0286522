mod authentication;
mod client_error;
mod management;
mod registration;
mod service;
mod sweeper;

pub use authentication::{AuthenticationFinishRequest, AuthenticationOutcome};
pub use client_error::{ClientCeremonyFailure, ClientFailureKind, report_client_failure};
pub use registration::{RegistrationFinishRequest, RegistrationUser};
pub use service::PasskeyService;
pub use sweeper::{spawn_challenge_sweeper, sweep_until_clean};
