//! Row sums of a matrix, one actor per column.
//!
//! The input is `k n` followed by `k` rows of `n` cells, each cell a pair
//! `value time_ms`. The coordinator spawns a column actor per column and
//! chains them in the order they greeted it. Every row travels along the
//! chain; each column adds its cell after pretending to work for `time_ms`.
//! Once every row came back the coordinator prints the sums and tells every
//! actor to die.

use anyhow::{anyhow, bail, Context as _, Result};
use clap::Args;
use crossbeam_channel::Sender;
use log::{debug, error, info};
use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use troupe_runtime::{
    ActorId, ActorSystem, Context, MailboxPolicy, Message, MessageTag, PoolStats, Role,
    RuntimeConfig,
};

use super::deliver;

const MSG_START: MessageTag = 0x1;
const MSG_HI_BACK: MessageTag = 0x2;
const MSG_SETUP: MessageTag = 0x3;
const MSG_COMPUTE: MessageTag = 0x4;
const MSG_ROW_DONE: MessageTag = 0x5;

/// Arguments for the matrix command
#[derive(Args)]
pub struct MatrixArgs {
    /// Print the pool statistics after the run
    #[clap(long)]
    pub stats: bool,
}

/// One matrix cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Value added to the row sum
    pub value: i64,
    /// Simulated work before the value is added
    pub time_ms: u64,
}

/// A `rows` x `columns` matrix stored row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    columns: usize,
    cells: Vec<Cell>,
}

impl Matrix {
    /// Parse the `k n` header followed by `k * n` cells.
    pub fn parse(input: &str) -> Result<Self> {
        let mut numbers = input.split_whitespace();
        let mut next = |what: &str| {
            numbers
                .next()
                .ok_or_else(|| anyhow!("unexpected end of input, expected {}", what))
        };

        let rows: usize = next("row count")?.parse().context("invalid row count")?;
        let columns: usize = next("column count")?
            .parse()
            .context("invalid column count")?;

        let total = rows
            .checked_mul(columns)
            .ok_or_else(|| anyhow!("matrix of {} x {} is too large", rows, columns))?;
        let mut cells = Vec::with_capacity(total);
        for index in 0..total {
            let (row, column) = (index / columns, index % columns);
            let value = next("cell value")?
                .parse()
                .with_context(|| format!("invalid value in row {} column {}", row, column))?;
            let time_ms = next("cell time")?
                .parse()
                .with_context(|| format!("invalid time in row {} column {}", row, column))?;
            cells.push(Cell { value, time_ms });
        }

        if let Some(extra) = numbers.next() {
            bail!("trailing input after the last cell: {:?}", extra);
        }

        Ok(Self {
            rows,
            columns,
            cells,
        })
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn columns(&self) -> usize {
        self.columns
    }

    fn column(&self, column: usize) -> Vec<Cell> {
        (0..self.rows)
            .map(|row| self.cells[row * self.columns + column])
            .collect()
    }
}

/// Per-actor state
#[derive(Debug)]
pub enum MatrixState {
    /// The coordinator
    Coordinator(Coordinator),
    /// A column actor
    Column(ColumnSetup),
}

/// Bookkeeping of the coordinator
#[derive(Debug)]
pub struct Coordinator {
    matrix: Matrix,
    columns: Vec<ActorId>,
    sums: Vec<Option<i64>>,
    pending: usize,
    next_row: usize,
    window: usize,
}

/// What a column actor needs to do its part
#[derive(Debug, Clone)]
pub struct ColumnSetup {
    index: usize,
    cells: Vec<Cell>,
    next: ActorId,
    last: bool,
}

/// A row on its way along the chain
#[derive(Debug, Clone, Copy)]
pub struct RowSum {
    row: usize,
    sum: i64,
}

/// Payloads exchanged by the coordinator and the columns
#[derive(Debug)]
pub enum MatrixMsg {
    /// Matrix handed to the coordinator
    Start(Matrix),
    /// A column actor announcing itself
    HiBack(ActorId),
    /// Column assignment
    Setup(ColumnSetup),
    /// Partial row sum
    Compute(RowSum),
    /// Finished row sum
    RowDone(RowSum),
}

type MatrixRole = Role<MatrixState, MatrixMsg>;
type MatrixContext<'a> = Context<'a, MatrixState, MatrixMsg>;

/// Sum the rows of `matrix` on an actor system built from `config`.
pub fn row_sums(matrix: Matrix, config: RuntimeConfig) -> Result<Vec<i64>> {
    Ok(run(matrix, config)?.0)
}

fn run(matrix: Matrix, config: RuntimeConfig) -> Result<(Vec<i64>, PoolStats)> {
    let (results, sums) = crossbeam_channel::bounded(1);

    // Rows in flight never outnumber what one mailbox holds, so the last
    // column can always report to the coordinator
    let window = match config.mailbox {
        MailboxPolicy::Bounded(capacity) => capacity,
        MailboxPolicy::Unbounded => usize::MAX,
    };

    let system = ActorSystem::create(config, Arc::new(coordinator_role(results, window)))?;
    let handle = system.handle();
    deliver(&handle, system.root(), || {
        Message::user(MSG_START, MatrixMsg::Start(matrix.clone()))
    })?;
    system.join();

    let sums = sums
        .try_recv()
        .map_err(|_| anyhow!("interrupted before every row was summed"))?;
    Ok((sums, handle.stats()))
}

/// Run the matrix command on the matrix read from stdin
pub fn execute(args: &MatrixArgs, config: RuntimeConfig) -> Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read the matrix from stdin")?;
    let matrix = Matrix::parse(&input)?;

    let (sums, stats) = run(matrix, config)?;
    for sum in sums {
        println!("{}", sum);
    }

    if args.stats {
        eprintln!(
            "{} messages dispatched by {} actors, {} spawned, max callback {}us",
            stats.messages_dispatched, stats.actors, stats.spawns, stats.max_execution_time_us
        );
    }
    Ok(())
}

/// Deliver from inside a callback; any failure other than a full mailbox
/// stops the whole system so `join` returns.
fn forward<F>(ctx: &MatrixContext<'_>, to: ActorId, make: F) -> bool
where
    F: Fn() -> Message<MatrixState, MatrixMsg>,
{
    match deliver(ctx.system(), to, make) {
        Ok(()) => true,
        Err(e) => {
            error!("Actor {} cannot reach actor {}: {}", ctx.id(), to, e);
            ctx.system().interrupt();
            false
        }
    }
}

fn coordinator_role(results: Sender<Vec<i64>>, window: usize) -> MatrixRole {
    let column = Arc::new(column_role());
    let column_on_greeting = Arc::clone(&column);
    let results_on_start = results.clone();

    MatrixRole::new()
        .on(MSG_START, move |ctx, state, _, payload| match payload {
            MatrixMsg::Start(matrix) => {
                start(ctx, state, matrix, window, &column, &results_on_start)
            }
            other => error!("Coordinator expected a matrix, got {:?}", other),
        })
        .on(MSG_HI_BACK, move |ctx, state, _, payload| match payload {
            MatrixMsg::HiBack(id) => register_column(ctx, state, id, &column_on_greeting),
            other => error!("Coordinator expected a greeting, got {:?}", other),
        })
        .on(MSG_ROW_DONE, move |ctx, state, _, payload| match payload {
            MatrixMsg::RowDone(row) => row_done(ctx, state, row, &results),
            other => error!("Coordinator expected a row sum, got {:?}", other),
        })
}

fn column_role() -> MatrixRole {
    MatrixRole::new()
        .on_hello(|ctx, _, parent| {
            forward(ctx, parent, || {
                Message::user(MSG_HI_BACK, MatrixMsg::HiBack(ctx.id()))
            });
        })
        .on(MSG_SETUP, |ctx, state, _, payload| match payload {
            MatrixMsg::Setup(setup) => {
                debug!("Actor {} handles column {}", ctx.id(), setup.index);
                *state = Some(MatrixState::Column(setup));
            }
            other => error!("Column actor expected its setup, got {:?}", other),
        })
        .on(MSG_COMPUTE, |ctx, state, _, payload| match payload {
            MatrixMsg::Compute(row) => add_cell(ctx, state, row),
            other => error!("Column actor expected a row, got {:?}", other),
        })
}

fn start(
    ctx: &MatrixContext<'_>,
    state: &mut Option<MatrixState>,
    matrix: Matrix,
    window: usize,
    column: &Arc<MatrixRole>,
    results: &Sender<Vec<i64>>,
) {
    info!("Summing {} rows over {} columns", matrix.rows, matrix.columns);

    if matrix.columns == 0 || matrix.rows == 0 {
        let _ = results.try_send(vec![0; matrix.rows]);
        let _ = ctx.die();
        return;
    }

    *state = Some(MatrixState::Coordinator(Coordinator {
        columns: Vec::with_capacity(matrix.columns),
        sums: vec![None; matrix.rows],
        pending: matrix.rows,
        next_row: 0,
        window: window.max(1),
        matrix,
    }));

    // Columns are spawned one at a time: the next SPAWN goes out when the
    // previous column greeted
    forward(ctx, ctx.id(), || Message::Spawn(Arc::clone(column)));
}

/// Record a greeting column; once all greeted, set up the chain and feed it
/// the first rows.
fn register_column(
    ctx: &MatrixContext<'_>,
    state: &mut Option<MatrixState>,
    column: ActorId,
    role: &Arc<MatrixRole>,
) {
    let coordinator = match state {
        Some(MatrixState::Coordinator(coordinator)) => coordinator,
        _ => {
            error!("Actor {} got a column greeting without a matrix", ctx.id());
            return;
        }
    };

    coordinator.columns.push(column);
    if coordinator.columns.len() < coordinator.matrix.columns {
        forward(ctx, ctx.id(), || Message::Spawn(Arc::clone(role)));
        return;
    }

    // Setups go out before any row so every column is ready when rows arrive
    for (index, &actor) in coordinator.columns.iter().enumerate() {
        let successor = coordinator.columns.get(index + 1).copied();
        let setup = ColumnSetup {
            index,
            cells: coordinator.matrix.column(index),
            next: successor.unwrap_or_else(|| ctx.id()),
            last: successor.is_none(),
        };
        if !forward(ctx, actor, || {
            Message::user(MSG_SETUP, MatrixMsg::Setup(setup.clone()))
        }) {
            return;
        }
    }

    while coordinator.next_row < coordinator.matrix.rows
        && coordinator.next_row < coordinator.window
    {
        if !feed_next_row(ctx, coordinator) {
            return;
        }
    }
}

/// Send the next unsent row into the chain.
fn feed_next_row(ctx: &MatrixContext<'_>, coordinator: &mut Coordinator) -> bool {
    let row = RowSum {
        row: coordinator.next_row,
        sum: 0,
    };
    coordinator.next_row += 1;
    forward(ctx, coordinator.columns[0], || {
        Message::user(MSG_COMPUTE, MatrixMsg::Compute(row))
    })
}

fn add_cell(ctx: &MatrixContext<'_>, state: &mut Option<MatrixState>, mut row: RowSum) {
    let setup = match state {
        Some(MatrixState::Column(setup)) => setup,
        _ => {
            error!("Actor {} got a row before its setup", ctx.id());
            return;
        }
    };

    let cell = setup.cells[row.row];
    if cell.time_ms > 0 {
        thread::sleep(Duration::from_millis(cell.time_ms));
    }
    row.sum += cell.value;

    if setup.last {
        forward(ctx, setup.next, || {
            Message::user(MSG_ROW_DONE, MatrixMsg::RowDone(row))
        });
    } else {
        forward(ctx, setup.next, || {
            Message::user(MSG_COMPUTE, MatrixMsg::Compute(row))
        });
    }
}

fn row_done(
    ctx: &MatrixContext<'_>,
    state: &mut Option<MatrixState>,
    row: RowSum,
    results: &Sender<Vec<i64>>,
) {
    let coordinator = match state {
        Some(MatrixState::Coordinator(coordinator)) => coordinator,
        _ => {
            error!("Actor {} got a row sum without a matrix", ctx.id());
            return;
        }
    };

    if coordinator.sums[row.row].replace(row.sum).is_none() {
        coordinator.pending -= 1;
    }
    if coordinator.next_row < coordinator.matrix.rows {
        feed_next_row(ctx, coordinator);
    }
    if coordinator.pending > 0 {
        return;
    }

    let sums = coordinator.sums.iter().map(|sum| sum.unwrap_or(0)).collect();
    let _ = results.try_send(sums);

    for &column in &coordinator.columns {
        forward(ctx, column, || Message::GoDie);
    }
    let _ = ctx.die();
}
