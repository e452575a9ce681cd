/// Router Module Index
///
/// Splits the HTTP surface by who may reach it. Access control is applied per
/// module through Axum layers and repeated inside the handlers.

/// Routes reachable by anyone (anonymous or logged in).
pub mod public;

/// Routes behind the `login_required` layer. Owner-only pages are here too; their
/// handlers additionally answer 404 to everyone but the owner.
pub mod authenticated;

/// Routes restricted to users with the 'admin' role.
pub mod admin;
