pub mod enquiries;
pub mod jobs;
pub mod memory;
pub mod notifications;

#[cfg(test)]
pub(crate) mod testing;
