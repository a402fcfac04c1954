pub mod layout;
pub mod manifest;
pub mod profile;
pub mod run;
