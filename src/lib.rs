pub mod app;
pub mod error;
pub mod ndn;
pub mod net;
pub mod queue;
pub mod report;
pub mod sim;
pub mod topo;

#[cfg(test)]
mod test;
