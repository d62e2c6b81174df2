pub mod event;
pub mod intent;
