//! Integration tests for the actor system.
//!
//! These tests run complete systems: per-actor ordering, exclusive dispatch,
//! spawning, and both ways a system can end.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use troupe_runtime::{
    ActorId, ActorSystem, MailboxPolicy, Message, Role, RuntimeConfig, SchedulerStatus, SendError,
    MSG_GODIE, MSG_HELLO,
};

const MSG_WORK: u64 = 1;
const MSG_BLOCK: u64 = 2;
const MSG_REPORT: u64 = 3;
const MSG_BOOM: u64 = 4;

const WAIT: Duration = Duration::from_secs(5);

fn config() -> RuntimeConfig {
    RuntimeConfig::default()
        .with_worker_threads(4)
        .with_signals(Vec::<String>::new())
}

/// Role whose BLOCK handler reports that it started and then waits on a gate.
fn gated_role(
    started: Sender<()>,
    gate: Receiver<()>,
    processed: Arc<AtomicUsize>,
) -> Arc<Role<(), u32>> {
    Arc::new(
        Role::new()
            .on(MSG_BLOCK, move |_, _, _, _| {
                started.send(()).unwrap();
                let _ = gate.recv_timeout(WAIT);
            })
            .on(MSG_WORK, move |_, _, _, _| {
                processed.fetch_add(1, Ordering::SeqCst);
            }),
    )
}

#[test]
fn test_root_dies_immediately() {
    let role: Arc<Role<(), u32>> = Arc::new(Role::new());
    let system = ActorSystem::create(config(), role).unwrap();
    let handle = system.handle();

    system.send(system.root(), Message::GoDie).unwrap();
    system.join();

    let stats = handle.stats();
    assert_eq!(stats.status, SchedulerStatus::Draining);
    assert_eq!(stats.actors, 1);
    assert_eq!(stats.finished_actors, 1);
    assert_eq!(stats.busy_workers, 0);

    // A finished system refuses mail
    assert_eq!(
        handle.send(ActorId::ROOT, Message::user(MSG_WORK, 1)),
        Err(SendError::ActorFinished(ActorId::ROOT))
    );
}

#[test]
fn test_root_is_greeted_with_its_own_id() {
    let (hello_tx, hello_rx) = unbounded();

    let role: Arc<Role<(), u32>> = Arc::new(Role::new().on_hello(move |ctx, _, creator| {
        hello_tx.send((ctx.id(), creator)).unwrap();
        ctx.die().unwrap();
    }));

    let system = ActorSystem::create(config(), role).unwrap();
    let (id, creator) = hello_rx.recv_timeout(WAIT).unwrap();
    system.join();

    assert_eq!(id, ActorId::ROOT);
    assert_eq!(creator, ActorId::ROOT);
    // The greeting arrives exactly once
    assert!(hello_rx.try_recv().is_err());
}

#[test]
fn test_reserved_tag_in_user_message_is_refused() {
    let processed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&processed);

    let role: Arc<Role<(), u32>> = Arc::new(Role::new().on(MSG_WORK, move |_, _, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let system = ActorSystem::create(config(), role).unwrap();
    let root = system.root();

    assert_eq!(
        system.send(root, Message::user(MSG_GODIE, 0)),
        Err(SendError::ReservedTag(MSG_GODIE))
    );
    assert_eq!(
        system.send(root, Message::user(MSG_HELLO, 0)),
        Err(SendError::ReservedTag(MSG_HELLO))
    );

    // The actor keeps accepting mail and still ends normally
    system.send(root, Message::user(MSG_WORK, 1)).unwrap();
    system.send(root, Message::GoDie).unwrap();
    system.join();

    assert_eq!(processed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_spawned_child_greets_parent() {
    let (hello_tx, hello_rx) = unbounded();

    let child: Arc<Role<(), u32>> = Arc::new(Role::new().on_hello(move |ctx, _, parent| {
        hello_tx.send((ctx.id(), parent)).unwrap();
    }));

    let parent: Arc<Role<(), u32>> = Arc::new(Role::new().on(MSG_WORK, move |ctx, _, _, _| {
        ctx.spawn(Arc::clone(&child)).unwrap();
    }));

    let system = ActorSystem::create(config(), parent).unwrap();
    let handle = system.handle();
    system
        .send(system.root(), Message::user(MSG_WORK, 0))
        .unwrap();

    let (child_id, parent_id) = hello_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(child_id, ActorId(1));
    assert_eq!(parent_id, ActorId::ROOT);

    system.send(child_id, Message::GoDie).unwrap();
    system.send(system.root(), Message::GoDie).unwrap();
    system.join();

    let stats = handle.stats();
    assert_eq!(stats.spawns, 1);
    assert_eq!(stats.actors, 2);
    assert_eq!(stats.finished_actors, 2);
}

#[test]
fn test_bounded_mailbox_rejects_overflow() {
    let (started_tx, started_rx) = unbounded();
    let (gate_tx, gate_rx) = unbounded();
    let processed = Arc::new(AtomicUsize::new(0));

    let role = gated_role(started_tx, gate_rx, Arc::clone(&processed));
    let system =
        ActorSystem::create(config().with_mailbox(MailboxPolicy::Bounded(2)), role).unwrap();
    let root = system.root();

    // Keep the actor busy so nothing drains its mailbox
    system.send(root, Message::user(MSG_BLOCK, 0)).unwrap();
    started_rx.recv_timeout(WAIT).unwrap();

    assert_eq!(system.send(root, Message::user(MSG_WORK, 1)), Ok(()));
    assert_eq!(system.send(root, Message::user(MSG_WORK, 2)), Ok(()));
    assert_eq!(
        system.send(root, Message::user(MSG_WORK, 3)),
        Err(SendError::MailboxFull {
            actor: root,
            capacity: 2
        })
    );

    gate_tx.send(()).unwrap();

    // Retry until the worker made room for the GODIE
    loop {
        match system.send(root, Message::GoDie) {
            Ok(()) => break,
            Err(SendError::MailboxFull { .. }) => thread::sleep(Duration::from_millis(1)),
            Err(e) => panic!("unexpected send error: {}", e),
        }
    }
    system.join();

    assert_eq!(processed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_interrupt_abandons_queued_messages() {
    let (started_tx, started_rx) = unbounded();
    let (gate_tx, gate_rx) = unbounded();
    let processed = Arc::new(AtomicUsize::new(0));

    let role = gated_role(started_tx, gate_rx, Arc::clone(&processed));
    let system = ActorSystem::create(config(), role).unwrap();
    let handle = system.handle();
    let root = system.root();

    system.send(root, Message::user(MSG_BLOCK, 0)).unwrap();
    started_rx.recv_timeout(WAIT).unwrap();
    for i in 0..5 {
        system.send(root, Message::user(MSG_WORK, i)).unwrap();
    }

    system.interrupt();
    assert_eq!(
        system.send(root, Message::user(MSG_WORK, 9)),
        Err(SendError::Interrupted)
    );

    drop(gate_tx);
    system.join();

    assert!(processed.load(Ordering::SeqCst) < 5);
    assert_eq!(handle.status(), SchedulerStatus::Interrupted);
    assert_eq!(
        handle.send(root, Message::user(MSG_WORK, 10)),
        Err(SendError::Interrupted)
    );
}

#[test]
fn test_messages_arrive_in_send_order() {
    let (report_tx, report_rx) = unbounded();

    let role: Arc<Role<Vec<u32>, u32>> = Arc::new(
        Role::<Vec<u32>, u32>::new()
            .on(MSG_WORK, |_, state, _, n| {
                state.get_or_insert_with(Vec::new).push(n);
            })
            .on(MSG_REPORT, move |ctx, state, _, _| {
                report_tx.send(state.take().unwrap_or_default()).unwrap();
                ctx.die().unwrap();
            }),
    );

    let system = ActorSystem::create(config(), role).unwrap();
    for n in 0..2000 {
        system
            .send(system.root(), Message::user(MSG_WORK, n))
            .unwrap();
    }
    system
        .send(system.root(), Message::user(MSG_REPORT, 0))
        .unwrap();

    let seen = report_rx.recv_timeout(WAIT).unwrap();
    system.join();

    assert_eq!(seen, (0..2000).collect::<Vec<_>>());
}

#[test]
fn test_concurrent_senders_keep_per_sender_order() {
    const SENDERS: usize = 4;
    const PER_SENDER: usize = 500;

    let (report_tx, report_rx) = unbounded();

    let role: Arc<Role<Vec<(usize, usize)>, (usize, usize)>> = Arc::new(
        Role::<Vec<(usize, usize)>, (usize, usize)>::new()
            .on(MSG_WORK, |_, state, _, item| {
                state.get_or_insert_with(Vec::new).push(item);
            })
            .on(MSG_REPORT, move |ctx, state, _, _| {
                report_tx.send(state.take().unwrap_or_default()).unwrap();
                ctx.die().unwrap();
            }),
    );

    let system = ActorSystem::create(config(), role).unwrap();
    let senders: Vec<_> = (0..SENDERS)
        .map(|sender| {
            let handle = system.handle();
            thread::spawn(move || {
                for seq in 0..PER_SENDER {
                    handle
                        .send(ActorId::ROOT, Message::user(MSG_WORK, (sender, seq)))
                        .unwrap();
                }
            })
        })
        .collect();
    for sender in senders {
        sender.join().unwrap();
    }
    system
        .send(system.root(), Message::user(MSG_REPORT, (0, 0)))
        .unwrap();

    let seen = report_rx.recv_timeout(WAIT).unwrap();
    system.join();

    assert_eq!(seen.len(), SENDERS * PER_SENDER);
    for sender in 0..SENDERS {
        let sequence: Vec<usize> = seen
            .iter()
            .filter(|(from, _)| *from == sender)
            .map(|(_, seq)| *seq)
            .collect();
        assert_eq!(sequence, (0..PER_SENDER).collect::<Vec<_>>());
    }
}

#[test]
fn test_no_actor_runs_on_two_workers() {
    const ACTORS: usize = 4;
    const SENDERS: usize = 4;
    const PER_SENDER: u32 = 200;

    let active: Arc<Vec<AtomicUsize>> = Arc::new((0..ACTORS).map(|_| AtomicUsize::new(0)).collect());
    let overlaps = Arc::new(AtomicUsize::new(0));
    let processed = Arc::new(AtomicUsize::new(0));

    let role: Arc<Role<(), u32>> = {
        let active = Arc::clone(&active);
        let overlaps = Arc::clone(&overlaps);
        let processed = Arc::clone(&processed);
        Arc::new(Role::new().on(MSG_WORK, move |ctx, _, _, _| {
            let slot = &active[ctx.id().index()];
            if slot.fetch_add(1, Ordering::SeqCst) != 0 {
                overlaps.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_micros(20));
            slot.fetch_sub(1, Ordering::SeqCst);
            processed.fetch_add(1, Ordering::SeqCst);
        }))
    };

    let system = ActorSystem::create(config(), Arc::clone(&role)).unwrap();
    for _ in 1..ACTORS {
        system
            .send(system.root(), Message::Spawn(Arc::clone(&role)))
            .unwrap();
    }
    while system.stats().actors < ACTORS {
        thread::sleep(Duration::from_millis(1));
    }

    let senders: Vec<_> = (0..SENDERS)
        .map(|_| {
            let handle = system.handle();
            thread::spawn(move || {
                for n in 0..PER_SENDER {
                    for actor in 0..ACTORS {
                        handle
                            .send(ActorId(actor), Message::user(MSG_WORK, n))
                            .unwrap();
                    }
                }
            })
        })
        .collect();
    for sender in senders {
        sender.join().unwrap();
    }
    for actor in 0..ACTORS {
        system.send(ActorId(actor), Message::GoDie).unwrap();
    }
    system.join();

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(
        processed.load(Ordering::SeqCst),
        ACTORS * SENDERS * PER_SENDER as usize
    );
}

#[test]
fn test_spawn_chain_grows_registry() {
    const LENGTH: usize = 40;

    let finished = Arc::new(AtomicUsize::new(0));

    // Each link spawns the next until the chain is long enough, then every
    // link dies once its successor greeted it.
    fn link(finished: Arc<AtomicUsize>) -> Arc<Role<(), u32>> {
        Arc::new_cyclic(|me| {
            let me = me.clone();
            Role::<(), u32>::new()
                .on_hello(move |ctx, _, parent| {
                    if ctx.id() != parent {
                        ctx.send(parent, Message::GoDie).unwrap();
                    }
                    if ctx.id().index() + 1 < LENGTH {
                        ctx.spawn(me.upgrade().unwrap()).unwrap();
                    } else {
                        finished.fetch_add(1, Ordering::SeqCst);
                        ctx.die().unwrap();
                    }
                })
        })
    }

    let config = RuntimeConfig {
        initial_actor_capacity: 1,
        ..config()
    };
    let system = ActorSystem::create(config, link(Arc::clone(&finished))).unwrap();
    let handle = system.handle();
    system.join();

    let stats = handle.stats();
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(stats.actors, LENGTH);
    assert_eq!(stats.spawns, LENGTH - 1);
    assert_eq!(stats.finished_actors, LENGTH);
}

#[test]
fn test_messages_before_godie_are_processed() {
    let processed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&processed);

    let role: Arc<Role<(), u32>> = Arc::new(Role::new().on(MSG_WORK, move |_, _, _, _| {
        thread::sleep(Duration::from_millis(1));
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let system = ActorSystem::create(config(), role).unwrap();
    let root = system.root();
    for n in 0..10 {
        system.send(root, Message::user(MSG_WORK, n)).unwrap();
    }
    system.send(root, Message::GoDie).unwrap();
    assert_eq!(
        system.send(root, Message::user(MSG_WORK, 11)),
        Err(SendError::ActorFinished(root))
    );
    assert_eq!(
        system.send(ActorId(3), Message::user(MSG_WORK, 0)),
        Err(SendError::NoSuchActor(ActorId(3)))
    );
    system.join();

    assert_eq!(processed.load(Ordering::SeqCst), 10);
}

#[test]
fn test_panicking_callback_is_contained() {
    let (report_tx, report_rx) = unbounded();

    let role: Arc<Role<u32, u32>> = Arc::new(
        Role::<u32, u32>::new()
            .on(MSG_BOOM, |_, state, _, _| {
                *state = Some(41);
                panic!("callback failure");
            })
            .on(MSG_REPORT, move |ctx, state, _, _| {
                report_tx.send(*state).unwrap();
                ctx.die().unwrap();
            }),
    );

    let system = ActorSystem::create(config(), role).unwrap();
    let handle = system.handle();
    system.send(system.root(), Message::user(MSG_BOOM, 0)).unwrap();
    system
        .send(system.root(), Message::user(MSG_REPORT, 0))
        .unwrap();

    // State written before the panic is kept
    assert_eq!(report_rx.recv_timeout(WAIT).unwrap(), Some(41));
    system.join();

    assert_eq!(handle.stats().callbacks_panicked, 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let role: Arc<Role<(), u32>> = Arc::new(Role::new());
    let result = ActorSystem::create(config().with_worker_threads(0), role);
    assert!(matches!(
        result,
        Err(troupe_runtime::RuntimeError::InvalidConfig(_))
    ));
}
