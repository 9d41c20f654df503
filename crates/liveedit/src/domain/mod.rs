//! Domain types: identifiers, patches and their failure taxonomy.

pub mod errors;
pub mod location;
pub mod model;
