pub mod admin;
pub mod assets;
pub mod auth;
pub mod billing;
pub mod comments;
pub mod favorites;
pub mod home;
pub mod peptides;
pub mod public;
pub mod stacks;
pub mod ugc;
