mod client;
pub mod models;
mod provider;
mod session;
mod simulation;
pub mod time;
pub mod token;

pub use client::{CredentialSource, GoogleCalendarClient, CALENDAR_API_BASE};
pub use models::{CalendarEvent, EventDateTime, EventPayload, EventQuery, OrderBy};
pub use provider::CalendarProvider;
pub use session::{validate_bearer, GoogleSessionFactory, SessionFactory};
pub use simulation::SimulatedCalendar;
pub use token::{StoredToken, TokenManager};
