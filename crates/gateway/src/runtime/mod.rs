pub mod cancel;
pub mod scheduler_runtime;
pub mod turn;
