pub mod mongo;
pub mod repo;
