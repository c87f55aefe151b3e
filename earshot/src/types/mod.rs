mod debounce;
pub mod timestamp;

pub use debounce::EdgeDebouncer;
pub use timestamp::Timestamp;
