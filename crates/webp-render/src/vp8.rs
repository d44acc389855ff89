//! Macroblock row scheduling of VP8 frames.
//!
//! Each tile of `tile_width` macroblocks in a macroblock row has two nodes. `Parse` reads modes
//! and coefficients, and is chained in raster order since the partitions are read sequentially.
//! `Recon` predicts and reconstructs samples once the macroblocks it predicts from are done.
use std::sync::{Mutex, OnceLock, PoisonError};

use webp_coding::BoolDecoder;
use webp_grid::{AllocTracker, MutableSubgrid};
use webp_vp8::{
    AboveSamples, FilterInfo, FrameHeader, LeftSamples, Macroblock, MacroblockParser,
    Reconstructor, Vp8Frame, YuvPlanes, filter_frame,
};

use crate::{
    Result, YuvImage,
    schedule::{Dependency, NodeId, Scheduler, TaskGraph, TileGrid},
};

/// Default width of a tile, in macroblocks.
pub const DEFAULT_TILE_WIDTH: usize = 4;

/// Number of tile rows parsing may run ahead of reconstruction.
const LOOKAHEAD: usize = 2;

struct ParseState<'buf> {
    parser: MacroblockParser,
    modes: BoolDecoder<'buf>,
    partitions: Vec<BoolDecoder<'buf>>,
}

/// Unfiltered bottom rows of a reconstructed tile.
#[derive(Debug)]
struct EdgeRow {
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
}

struct FrameState<'a, 'buf> {
    header: &'a FrameHeader,
    grid: &'a TileGrid,
    parse: Mutex<ParseState<'buf>>,
    parsed: Vec<Mutex<Option<Vec<Macroblock>>>>,
    bottom: Vec<OnceLock<EdgeRow>>,
    right: Vec<OnceLock<LeftSamples>>,
}

enum Vp8Task<'g> {
    Parse,
    Recon {
        y: MutableSubgrid<'g>,
        u: MutableSubgrid<'g>,
        v: MutableSubgrid<'g>,
        filter: &'g mut [FilterInfo],
    },
}

/// Decodes a VP8 key frame into YUV planes, and applies the loop filter.
pub fn decode_frame(
    frame: Vp8Frame<'_>,
    scheduler: &Scheduler,
    tracker: Option<&AllocTracker>,
    tile_width: usize,
) -> Result<YuvImage> {
    let Vp8Frame {
        header,
        modes,
        partitions,
    } = frame;
    let mb_width = header.mb_width();
    let mb_height = header.mb_height();
    let tile_width = tile_width.clamp(1, mb_width.max(1));

    let mut planes = YuvPlanes::new(mb_width, mb_height, tracker)?;
    let mut filter_infos = vec![FilterInfo::default(); mb_width * mb_height];

    let grid = TileGrid::new(
        mb_width,
        mb_height,
        tile_width,
        1,
        Dependency::Causal { above_right: true },
    );
    let num_tiles = grid.len();
    tracing::debug!(
        mb_width,
        mb_height,
        tile_width,
        num_tiles,
        "Scheduling macroblock tiles"
    );

    let state = FrameState {
        header: &header,
        grid: &grid,
        parse: Mutex::new(ParseState {
            parser: MacroblockParser::new(&header),
            modes,
            partitions,
        }),
        parsed: (0..num_tiles).map(|_| Mutex::new(None)).collect(),
        bottom: (0..num_tiles).map(|_| OnceLock::new()).collect(),
        right: (0..num_tiles).map(|_| OnceLock::new()).collect(),
    };

    {
        let _guard = tracing::trace_span!("Parse and reconstruct macroblocks").entered();
        let graph = build_graph(&grid, mb_width, &mut planes, &mut filter_infos);
        scheduler.run(graph, |ctx, task| match task {
            Vp8Task::Parse => state.parse_tile(ctx.tx as usize, ctx.ty as usize),
            Vp8Task::Recon { y, u, v, filter } => {
                state.recon_tile(ctx.tx as usize, ctx.ty as usize, [y, u, v], filter);
                Ok(())
            }
        })?;
    }

    scheduler.check_cancelled()?;
    tracing::trace_span!("Loop filter").in_scope(|| {
        filter_frame(&mut planes, header.filter_type(), &filter_infos, mb_width);
    });

    Ok(YuvImage {
        planes,
        width: header.width() as usize,
        height: header.height() as usize,
    })
}

fn build_graph<'g>(
    grid: &TileGrid,
    mb_width: usize,
    planes: &'g mut YuvPlanes,
    filter_infos: &'g mut [FilterInfo],
) -> TaskGraph<Vp8Task<'g>> {
    let tile_width = grid.tile_width();
    let YuvPlanes { y, u, v } = planes;
    let y_tiles = y.as_subgrid_mut().into_groups(tile_width * 16, 16);
    let u_tiles = u.as_subgrid_mut().into_groups(tile_width * 8, 8);
    let v_tiles = v.as_subgrid_mut().into_groups(tile_width * 8, 8);
    let filter_tiles = filter_infos
        .chunks_mut(mb_width)
        .flat_map(|row| row.chunks_mut(tile_width));
    let regions = y_tiles.into_iter().zip(u_tiles).zip(v_tiles).zip(filter_tiles);

    let tiles_x = grid.tiles_x();
    let mut graph = TaskGraph::with_capacity(grid.len() * 2);
    // (parse, recon) node of each tile
    let mut nodes: Vec<(NodeId, NodeId)> = Vec::with_capacity(grid.len());
    for (tile, (((y, u), v), filter)) in grid.tiles().zip(regions) {
        let tx = tile.tx as usize;
        let ty = tile.ty as usize;

        let mut parse_deps = Vec::with_capacity(2);
        if tx > 0 {
            parse_deps.push(nodes[grid.index(tx - 1, ty)].0);
        } else if ty > 0 {
            parse_deps.push(nodes[grid.index(tiles_x - 1, ty - 1)].0);
        }
        if ty >= LOOKAHEAD {
            parse_deps.push(nodes[grid.index(tx, ty - LOOKAHEAD)].1);
        }
        let parse = graph.add_node((tile.tx, tile.ty), Vp8Task::Parse, &parse_deps);

        let mut recon_deps = vec![parse];
        recon_deps.extend(grid.dependencies(tx, ty).into_iter().map(|idx| nodes[idx].1));
        let recon = graph.add_node(
            (tile.tx, tile.ty),
            Vp8Task::Recon { y, u, v, filter },
            &recon_deps,
        );
        nodes.push((parse, recon));
    }
    graph
}

impl FrameState<'_, '_> {
    fn parse_tile(&self, tx: usize, ty: usize) -> Result<()> {
        let header = self.header;
        let tile = self.grid.tile(tx, ty);

        let mut guard = self.parse.lock().unwrap_or_else(PoisonError::into_inner);
        let ParseState {
            parser,
            modes,
            partitions,
        } = &mut *guard;
        if tx == 0 {
            parser.parse_mode_row(header, modes, ty)?;
        }

        let num_partitions = partitions.len();
        let partition = &mut partitions[ty % num_partitions];
        let mbs = (tile.left..tile.left + tile.width)
            .map(|mb_x| parser.parse_macroblock(header, partition, mb_x))
            .collect::<webp_vp8::Result<Vec<_>>>()?;
        drop(guard);

        *self.parsed[self.grid.index(tx, ty)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(mbs);
        Ok(())
    }

    fn recon_tile(
        &self,
        tx: usize,
        ty: usize,
        [mut y, mut u, mut v]: [MutableSubgrid; 3],
        filter: &mut [FilterInfo],
    ) {
        let grid = self.grid;
        let idx = grid.index(tx, ty);
        let tile = grid.tile(tx, ty);
        let mb_width = self.header.mb_width();

        let mbs = self.parsed[idx]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mbs) = mbs else {
            unreachable!("macroblocks are parsed before reconstruction");
        };

        // Dependencies have completed, so their edges are already published.
        let above = (ty > 0).then(|| self.bottom[grid.index(tx, ty - 1)].wait());
        let above_left =
            (ty > 0 && tx > 0).then(|| self.bottom[grid.index(tx - 1, ty - 1)].wait());
        let above_right = (ty > 0 && tx + 1 < grid.tiles_x())
            .then(|| self.bottom[grid.index(tx + 1, ty - 1)].wait());
        let mut left = (tx > 0).then(|| *self.right[grid.index(tx - 1, ty)].wait());

        let mut edge = EdgeRow {
            y: vec![0; tile.width * 16],
            u: vec![0; tile.width * 8],
            v: vec![0; tile.width * 8],
        };
        let mut recon = Reconstructor::new();
        for (k, mb) in mbs.iter().enumerate() {
            let mb_x = tile.left + k;
            let above_samples = above.map(|row| {
                let y_right = if mb_x + 1 >= mb_width {
                    None
                } else if k + 1 < tile.width {
                    Some(&row.y[(k + 1) * 16..][..4])
                } else {
                    above_right.map(|next| &next.y[..4])
                };
                let corner = if k > 0 {
                    Some([row.y[k * 16 - 1], row.u[k * 8 - 1], row.v[k * 8 - 1]])
                } else {
                    above_left.map(|prev| {
                        let (y, u, v) = (&prev.y, &prev.u, &prev.v);
                        [y[y.len() - 1], u[u.len() - 1], v[v.len() - 1]]
                    })
                };
                AboveSamples {
                    y: &row.y[k * 16..][..16],
                    u: &row.u[k * 8..][..8],
                    v: &row.v[k * 8..][..8],
                    y_right,
                    corner,
                }
            });

            recon.reconstruct(mb, above_samples.as_ref(), left.as_ref());
            recon.write_to(&mut y, &mut u, &mut v, k);
            edge.y[k * 16..][..16].copy_from_slice(recon.y_row(15));
            edge.u[k * 8..][..8].copy_from_slice(recon.u_row(7));
            edge.v[k * 8..][..8].copy_from_slice(recon.v_row(7));
            left = Some(recon.right_samples());
            filter[k] = mb.filter;
        }

        if let Some(left) = left {
            let _ = self.right[idx].set(left);
        }
        let _ = self.bottom[idx].set(edge);
    }
}
