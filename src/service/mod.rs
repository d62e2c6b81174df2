pub mod assistant;
pub mod freebusy;
pub mod gateway;
pub mod prompts;
pub mod retry;
