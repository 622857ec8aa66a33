pub mod alerts;
pub mod budget_maintainer;
pub mod log_consumer;
pub mod mail;
pub mod mailer;
pub mod runner;
pub mod supervisor;
pub mod window;

pub use mailer::{MailError, Mailer, TracingMailer};
pub use supervisor::BackgroundLoops;
