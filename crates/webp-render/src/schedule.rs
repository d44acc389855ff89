//! Tile dependency graphs and their execution on a thread pool.
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use webp_threadpool::{WebpScope, WebpThreadPool};

use crate::{Error, Result, TileError};

/// Flag to cancel an in-progress decode from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Tiles which haven't started yet are skipped.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Which neighbours a tile waits for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// Every tile is ready immediately.
    Independent,
    /// Each tile depends on its left and above neighbours, and optionally the above-right one.
    Causal { above_right: bool },
}

/// Rectangular region of a [`TileGrid`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tile {
    pub tx: u32,
    pub ty: u32,
    pub left: usize,
    pub top: usize,
    pub width: usize,
    pub height: usize,
}

/// Partition of an image into fixed-size tiles in raster order.
///
/// Tiles on the right and bottom edges are clipped to the image bounds.
#[derive(Debug, Clone)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tile_width: usize,
    tile_height: usize,
    tiles_x: usize,
    tiles_y: usize,
    dependency: Dependency,
}

impl TileGrid {
    /// # Panics
    /// Panics if `tile_width` or `tile_height` is zero.
    pub fn new(
        width: usize,
        height: usize,
        tile_width: usize,
        tile_height: usize,
        dependency: Dependency,
    ) -> Self {
        assert!(tile_width > 0 && tile_height > 0);
        Self {
            width,
            height,
            tile_width,
            tile_height,
            tiles_x: width.div_ceil(tile_width),
            tiles_y: height.div_ceil(tile_height),
            dependency,
        }
    }

    #[inline]
    pub fn tiles_x(&self) -> usize {
        self.tiles_x
    }

    #[inline]
    pub fn tiles_y(&self) -> usize {
        self.tiles_y
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tiles_x * self.tiles_y
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn tile_width(&self) -> usize {
        self.tile_width
    }

    #[inline]
    pub fn tile_height(&self) -> usize {
        self.tile_height
    }

    /// Returns the raster order index of the tile.
    #[inline]
    pub fn index(&self, tx: usize, ty: usize) -> usize {
        ty * self.tiles_x + tx
    }

    pub fn tile(&self, tx: usize, ty: usize) -> Tile {
        let left = tx * self.tile_width;
        let top = ty * self.tile_height;
        Tile {
            tx: tx as u32,
            ty: ty as u32,
            left,
            top,
            width: self.tile_width.min(self.width - left),
            height: self.tile_height.min(self.height - top),
        }
    }

    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..self.tiles_y)
            .flat_map(move |ty| (0..self.tiles_x).map(move |tx| self.tile(tx, ty)))
    }

    /// Returns raster order indices of the tiles the given tile depends on.
    pub fn dependencies(&self, tx: usize, ty: usize) -> Vec<usize> {
        let Dependency::Causal { above_right } = self.dependency else {
            return Vec::new();
        };

        let mut deps = Vec::with_capacity(3);
        if ty > 0 {
            deps.push(self.index(tx, ty - 1));
            if above_right && tx + 1 < self.tiles_x {
                deps.push(self.index(tx + 1, ty - 1));
            }
        }
        if tx > 0 {
            deps.push(self.index(tx - 1, ty));
        }
        deps
    }
}

/// Index of a node in a [`TaskGraph`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Node<P> {
    tile: (u32, u32),
    payload: Mutex<Option<P>>,
    num_deps: usize,
    dependents: Vec<usize>,
}

/// Dependency graph of tasks, each carrying a payload such as a disjoint output region.
#[derive(Debug)]
pub struct TaskGraph<P> {
    nodes: Vec<Node<P>>,
}

impl<P> Default for TaskGraph<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> TaskGraph<P> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Creates a graph with one node per tile, with dependencies given by the grid.
    ///
    /// `payloads` are in raster order of the tiles.
    ///
    /// # Panics
    /// Panics if the number of payloads doesn't match the number of tiles.
    pub fn from_tile_grid(grid: &TileGrid, payloads: impl IntoIterator<Item = P>) -> Self {
        let payloads = payloads.into_iter().collect::<Vec<_>>();
        assert_eq!(payloads.len(), grid.len(), "payload count mismatch");

        let mut graph = Self::with_capacity(grid.len());
        for (tile, payload) in grid.tiles().zip(payloads) {
            let deps = grid
                .dependencies(tile.tx as usize, tile.ty as usize)
                .into_iter()
                .map(NodeId)
                .collect::<Vec<_>>();
            graph.add_node((tile.tx, tile.ty), payload, &deps);
        }
        graph
    }

    /// Adds a node which runs after every node in `deps` completes.
    ///
    /// # Panics
    /// Panics if any of `deps` is not an existing node.
    pub fn add_node(&mut self, tile: (u32, u32), payload: P, deps: &[NodeId]) -> NodeId {
        let id = self.nodes.len();
        for &NodeId(dep) in deps {
            assert!(dep < id, "dependency must be added before its dependents");
            self.nodes[dep].dependents.push(id);
        }
        self.nodes.push(Node {
            tile,
            payload: Mutex::new(Some(payload)),
            num_deps: deps.len(),
            dependents: Vec::new(),
        });
        NodeId(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Information about the node being run, passed to the task function.
#[derive(Debug, Copy, Clone)]
pub struct TaskContext {
    pub node: NodeId,
    pub tx: u32,
    pub ty: u32,
}

/// Runs [`TaskGraph`]s on a thread pool.
#[derive(Debug, Clone)]
pub struct Scheduler<'p> {
    pool: &'p WebpThreadPool,
    cancellation: Option<&'p CancellationToken>,
}

struct RunState<'t, P, F> {
    nodes: Vec<Node<P>>,
    remaining: Vec<AtomicUsize>,
    task_fn: &'t F,
    failed: AtomicBool,
    first_error: Mutex<Option<TileError>>,
    cancellation: Option<&'t CancellationToken>,
}

impl<'p> Scheduler<'p> {
    pub fn new(pool: &'p WebpThreadPool, cancellation: Option<&'p CancellationToken>) -> Self {
        Self { pool, cancellation }
    }

    #[inline]
    pub fn pool(&self) -> &'p WebpThreadPool {
        self.pool
    }

    /// Returns `Err(Error::Cancelled)` if the caller has cancelled decoding.
    pub fn check_cancelled(&self) -> Result<()> {
        match self.cancellation {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    /// Runs every node of `graph`, each after all of its dependencies have completed.
    ///
    /// When a task fails, nodes which haven't started are skipped, and the first error is
    /// returned with the coordinates of its tile.
    pub fn run<P, F>(&self, graph: TaskGraph<P>, task_fn: F) -> Result<()>
    where
        P: Send,
        F: Fn(TaskContext, P) -> Result<()> + Sync,
    {
        let num_nodes = graph.nodes.len();
        let remaining = graph
            .nodes
            .iter()
            .map(|node| AtomicUsize::new(node.num_deps))
            .collect();
        let initial = graph
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.num_deps == 0)
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();

        let state = RunState {
            nodes: graph.nodes,
            remaining,
            task_fn: &task_fn,
            failed: AtomicBool::new(false),
            first_error: Mutex::new(None),
            cancellation: self.cancellation,
        };

        let _guard = tracing::trace_span!("Run task graph", num_nodes).entered();
        if self.pool.is_multithreaded() {
            self.pool.scope(|scope| {
                for idx in initial {
                    spawn_node(&state, scope, idx);
                }
            });
        } else {
            let mut queue = VecDeque::from(initial);
            while let Some(idx) = queue.pop_front() {
                state.execute(idx, |next| queue.push_back(next));
            }
        }

        let first_error = state
            .first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(err) = first_error {
            return Err(Error::Tile(err));
        }
        self.check_cancelled()
    }
}

fn spawn_node<'r, 'scope, P, F>(
    state: &'scope RunState<'scope, P, F>,
    scope: WebpScope<'r, 'scope>,
    idx: usize,
) where
    P: Send,
    F: Fn(TaskContext, P) -> Result<()> + Sync,
{
    scope.spawn(move |scope| {
        state.execute(idx, |next| spawn_node(state, scope, next));
    });
}

impl<P, F> RunState<'_, P, F>
where
    F: Fn(TaskContext, P) -> Result<()>,
{
    fn should_skip(&self) -> bool {
        self.failed.load(Ordering::Acquire)
            || self.cancellation.is_some_and(|token| token.is_cancelled())
    }

    /// Runs the node, then passes each dependent which became ready to `on_ready`.
    fn execute(&self, idx: usize, mut on_ready: impl FnMut(usize)) {
        if self.should_skip() {
            return;
        }

        let node = &self.nodes[idx];
        let payload = node
            .payload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(payload) = payload else {
            return;
        };

        let (tx, ty) = node.tile;
        tracing::trace!(idx, tx, ty, "Run node");
        let ctx = TaskContext {
            node: NodeId(idx),
            tx,
            ty,
        };
        if let Err(err) = (self.task_fn)(ctx, payload) {
            tracing::debug!(tx, ty, %err, "Task failed; cancelling remaining tasks");
            let mut first_error = self
                .first_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if first_error.is_none() {
                *first_error = Some(TileError {
                    tx,
                    ty,
                    source: Box::new(err),
                });
            }
            self.failed.store(true, Ordering::Release);
            return;
        }

        for &dependent in &node.dependents {
            if self.remaining[dependent].fetch_sub(1, Ordering::AcqRel) == 1 {
                on_ready(dependent);
            }
        }
    }
}
