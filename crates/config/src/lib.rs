pub mod profile;

pub use profile::{default_db_path, Profile, ProfileError};
