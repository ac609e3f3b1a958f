pub mod events;
pub mod prompts;
pub mod seeds;
pub mod status;
