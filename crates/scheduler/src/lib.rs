pub mod config;
pub mod repository;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use repository::{AgentRepository, BotRepository, SignalSink};
pub use scheduler::Scheduler;
