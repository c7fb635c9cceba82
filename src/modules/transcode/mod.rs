pub mod job;
pub mod pipeline;
pub mod scratch;

#[cfg(test)]
pub mod testing;
