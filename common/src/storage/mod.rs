pub mod session_store;
pub mod types;
pub mod vector_index;
