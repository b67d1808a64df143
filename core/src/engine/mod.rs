pub mod copier;
pub mod scanner;
pub mod session;
pub mod task;
