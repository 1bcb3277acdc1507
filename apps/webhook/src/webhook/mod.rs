// RChilli webhook: body decoding, envelope extraction, attachment decoding.
// All Vincere calls go through the vincere module.

pub mod archive;
pub mod body;
pub mod extract;
pub mod handlers;
