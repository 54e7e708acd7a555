// Export components
pub mod agent;
pub mod google_calendar;
pub mod llm;

// Re-export the agent entry point
pub use agent::CalendarAgent;
