mod consumer;
mod content_store;
mod forwarding;
mod limits;
mod pit;
mod sim_time;
