/// API route handlers
///
/// Handlers are thin: they extract, call a service and wrap the result.
///
/// - `health`: Health check endpoint
/// - `auth`: Login, signup and token validation
/// - `users`: User administration
/// - `states`, `towns`, `businesses`, `venues`, `bands`: The directory
/// - `calendars`, `events`: The event calendar

pub mod auth;
pub mod bands;
pub mod businesses;
pub mod calendars;
pub mod events;
pub mod health;
pub mod states;
pub mod towns;
pub mod users;
pub mod venues;
