/// A dense `n x n` matrix indexed by `[[from, to]]`. Used for IGP weights, link loads and
/// traffic demands.
pub type Matrix = ndarray::Array2<f64>;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub id: NodeId,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self { id }
    }
}

identifier!(NodeId, usize);

/// A bidirectional link. Each direction gets its own [`Channel`] with the same bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    pub bandwidth: f64,
}

impl Link {
    pub fn new(a: NodeId, b: NodeId, bandwidth: f64) -> Self {
        Self { a, b, bandwidth }
    }
}

/// A unidirectional channel.
#[derive(Debug, Clone, PartialEq, derive_new::new, serde::Serialize)]
pub struct Channel {
    pub src: NodeId,
    pub dst: NodeId,
    pub bandwidth: f64,
    #[new(value = "true")]
    pub up: bool,
}
