mod node;

pub use node::*;


/// Lifecycle of one cluster member
///
/// `Created -> Starting -> Ready -> Stopping -> Stopped`. A failed start goes
/// straight from `Starting` to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Created,
    Starting,
    Ready,
    Stopping,
    Stopped,
}
