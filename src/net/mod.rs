//! 网络模拟模块
//!
//! 节点（服务器、交换机）、链路、报文信封和网络拓扑。

mod deliver_packet;
mod id;
mod link;
mod link_ready;
mod net_world;
mod network;
mod node;
mod packet;
mod server;
mod stats;
mod timers;

pub use deliver_packet::DeliverPacket;
pub use id::{LinkId, NodeId};
pub use link::Link;
pub use link_ready::LinkReady;
pub use net_world::NetWorld;
pub use network::Network;
pub use node::{Node, Switch};
pub use packet::{Packet, WirePacket};
pub use server::Server;
pub use stats::Stats;
pub use timers::{FibTick, LimitsTick, PitSweep};
