pub mod analyzer;
pub mod job_service;
pub mod job_store;
pub mod queue;
pub mod storage;
pub mod worker;
